//! Root-relative file paths, the unit of identity when comparing two trees

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Serialize, Serializer};

/// A file path relative to a scan root
///
/// Only normal components are kept, so `a/./b` and `a/b/` compare equal to
/// `a/b` and the same relative path resolves to the matching file under any
/// root it is joined to.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativePath(PathBuf);

impl RelativePath {
    /// Normalize a path that is already relative to its root
    ///
    /// Returns `None` for absolute paths, paths escaping the root via `..`,
    /// and paths with no normal component.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let mut normalized = PathBuf::new();
        for component in path.as_ref().components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }

        if normalized.as_os_str().is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    /// Strip `root` from a path produced by walking `root`
    #[must_use]
    pub fn from_root(root: &Path, full: &Path) -> Option<Self> {
        full.strip_prefix(root).ok().and_then(Self::new)
    }

    /// Resolve against a root directory
    #[must_use]
    pub fn join_to(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }

    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    #[must_use]
    pub fn to_path_buf(&self) -> PathBuf {
        self.0.clone()
    }

    /// Separator-normalized form (`/` on every platform)
    #[must_use]
    pub fn to_slash_string(&self) -> String {
        let parts: Vec<_> = self
            .0
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        parts.join("/")
    }
}

impl AsRef<Path> for RelativePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Debug for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelativePath({:?})", self.to_slash_string())
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_slash_string())
    }
}

impl Serialize for RelativePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_slash_string())
    }
}

/// Serialize any path as a string, replacing invalid UTF-8
pub(crate) fn serialize_lossy<P, S>(path: &P, serializer: S) -> Result<S::Ok, S::Error>
where
    P: AsRef<Path>,
    S: Serializer,
{
    serializer.serialize_str(&path.as_ref().to_string_lossy())
}

/// [`serialize_lossy`] for optional paths
pub(crate) fn serialize_lossy_opt<S: Serializer>(
    path: &Option<PathBuf>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match path {
        Some(path) => serializer.serialize_some(&*path.to_string_lossy()),
        None => serializer.serialize_none(),
    }
}
