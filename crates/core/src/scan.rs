//! Recursive file discovery via the `ignore` crate's walker
//!
//! Unlike a source-tree scanner this walks *everything*: hidden files and
//! `.gitignore`d paths are part of a backup. Filtering is limited to the
//! configured suffixes and excluded directories.

use std::path::{Path, PathBuf};

use ignore::{Walk, WalkBuilder};
use tracing::{debug, warn};

use crate::config::FilterConfig;
use crate::error::{Anomaly, AnomalyKind, Error, Result};
use crate::path::RelativePath;

/// Directory pruning rules resolved against one scan root
#[derive(Debug)]
struct ExcludeSet {
    /// Entries as given, compared against root-joined walker paths
    joined: Vec<PathBuf>,
    /// Relative entries normalized, compared against root-relative paths
    relative: Vec<RelativePath>,
}

impl ExcludeSet {
    fn new(excluded: &[PathBuf]) -> Self {
        Self {
            joined: excluded.to_vec(),
            relative: excluded.iter().filter_map(RelativePath::new).collect(),
        }
    }

    fn is_empty(&self) -> bool {
        self.joined.is_empty()
    }

    fn matches(&self, root: &Path, dir: &Path) -> bool {
        if self.joined.iter().any(|ex| ex.as_path() == dir) {
            return true;
        }
        RelativePath::from_root(root, dir).is_some_and(|rel| self.relative.contains(&rel))
    }
}

/// Walks one root and yields the relative paths of files passing the filters
pub struct PathCollector {
    root: PathBuf,
    filters: FilterConfig,
}

impl PathCollector {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, filters: FilterConfig) -> Self {
        Self {
            root: root.into(),
            filters,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check that the root is a readable directory
    ///
    /// # Errors
    /// Returns [`Error::InvalidRoot`] if it is missing, not a directory, or unreadable
    pub fn validate_root(&self) -> Result<()> {
        let invalid = |source| Error::InvalidRoot {
            path: self.root.clone(),
            source,
        };

        let metadata = std::fs::metadata(&self.root).map_err(invalid)?;
        if !metadata.is_dir() {
            return Err(invalid(std::io::Error::from(
                std::io::ErrorKind::NotADirectory,
            )));
        }
        std::fs::read_dir(&self.root).map_err(invalid)?;
        Ok(())
    }

    /// Start a lazy walk of the root
    ///
    /// Items are either a discovered file or a non-fatal traversal anomaly.
    /// Ordering is unspecified.
    ///
    /// # Errors
    /// Returns [`Error::InvalidRoot`] before walking if the root is unusable
    pub fn walk(&self) -> Result<Paths> {
        self.validate_root()?;

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .standard_filters(false) // Backups include hidden and gitignored files
            .follow_links(self.filters.follow_symlinks);

        let excludes = ExcludeSet::new(&self.filters.excluded_dirs);
        if !excludes.is_empty() {
            let root = self.root.clone();
            builder.filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                if is_dir && entry.depth() > 0 && excludes.matches(&root, entry.path()) {
                    debug!("Pruning excluded directory {}", entry.path().display());
                    return false;
                }
                true
            });
        }

        Ok(Paths {
            root: self.root.clone(),
            filters: self.filters.clone(),
            walk: builder.build(),
        })
    }

    /// Walk the whole root, splitting files from anomalies
    ///
    /// # Errors
    /// Returns [`Error::InvalidRoot`] if the root is unusable
    pub fn collect_all(&self) -> Result<(Vec<RelativePath>, Vec<Anomaly>)> {
        let mut paths = Vec::new();
        let mut anomalies = Vec::new();
        for item in self.walk()? {
            match item {
                Ok(path) => paths.push(path),
                Err(anomaly) => anomalies.push(anomaly),
            }
        }
        Ok((paths, anomalies))
    }
}

/// Walk `root` with `filters`; see [`PathCollector::walk`]
///
/// # Errors
/// Returns [`Error::InvalidRoot`] if the root is unusable
pub fn collect(root: &Path, filters: &FilterConfig) -> Result<Paths> {
    PathCollector::new(root, filters.clone()).walk()
}

/// Lazy sequence of discovered files under one root
pub struct Paths {
    root: PathBuf,
    filters: FilterConfig,
    walk: Walk,
}

impl Paths {
    fn traversal_warning(&self, err: &ignore::Error) -> Anomaly {
        let path = error_path(err).map(|p| {
            RelativePath::from_root(&self.root, p)
                .map_or_else(|| p.to_path_buf(), |r| r.to_path_buf())
        });
        warn!("Skipping unreadable entry under {}: {err}", self.root.display());
        Anomaly::new(AnomalyKind::TraversalWarning, path, err.to_string())
    }

    fn broken_link(&self, link: &Path, err: &std::io::Error) -> Anomaly {
        warn!("Skipping broken symlink {}: {err}", link.display());
        let path = RelativePath::from_root(&self.root, link)
            .map_or_else(|| link.to_path_buf(), |r| r.to_path_buf());
        Anomaly::new(
            AnomalyKind::TraversalWarning,
            Some(path),
            format!("broken symlink: {err}"),
        )
    }
}

impl Iterator for Paths {
    type Item = std::result::Result<RelativePath, Anomaly>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walk.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(Err(self.traversal_warning(&err))),
            };

            if entry.depth() == 0 {
                continue;
            }

            let Some(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() || !self.filters.matches_name(entry.file_name()) {
                continue;
            }

            // Without follow_links the walker reports symlinks as such; a link to a
            // regular file is still collected, a link to a directory is not expanded
            if file_type.is_symlink() {
                match std::fs::metadata(entry.path()) {
                    Ok(target) if target.is_file() => {}
                    Ok(_) => continue,
                    Err(err) => return Some(Err(self.broken_link(entry.path(), &err))),
                }
            } else if !file_type.is_file() {
                continue;
            }

            if let Some(relative) = RelativePath::from_root(&self.root, entry.path()) {
                return Some(Ok(relative));
            }
        }
    }
}

/// Innermost path attached to a walker error, if any
fn error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.as_path()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        ignore::Error::Loop { child, .. } => Some(child.as_path()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("dir1")).unwrap();
        fs::create_dir_all(dir.path().join("dir2")).unwrap();
        fs::create_dir_all(dir.path().join(".hidden")).unwrap();
        fs::write(dir.path().join("file1.txt"), "test").unwrap();
        fs::write(dir.path().join("dir1/file2.txt"), "test").unwrap();
        fs::write(dir.path().join("dir2/file3.txt"), "test").unwrap();
        fs::write(dir.path().join(".hidden/file4.txt"), "test").unwrap();
        fs::write(dir.path().join("dir1/photo.jpg"), "jpeg").unwrap();
        dir
    }

    fn paths(root: &Path, filters: FilterConfig) -> HashSet<String> {
        let (paths, anomalies) = PathCollector::new(root, filters).collect_all().unwrap();
        assert!(anomalies.is_empty(), "anomalies: {anomalies:?}");
        paths.iter().map(ToString::to_string).collect()
    }

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_collect_includes_hidden_files() {
        let dir = tree();
        assert_eq!(
            paths(dir.path(), FilterConfig::default()),
            set(&[
                "file1.txt",
                "dir1/file2.txt",
                "dir1/photo.jpg",
                "dir2/file3.txt",
                ".hidden/file4.txt",
            ])
        );
    }

    #[test]
    fn test_collect_ignores_gitignore() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();
        fs::write(dir.path().join("keep.log"), "kept").unwrap();

        let found = paths(dir.path(), FilterConfig::default());
        assert!(found.contains("keep.log"), "paths: {found:?}");
        assert!(found.contains(".gitignore"), "paths: {found:?}");
    }

    #[test]
    fn test_extension_filter_is_subset() {
        let dir = tree();
        let all = paths(dir.path(), FilterConfig::default());
        let txt = paths(
            dir.path(),
            FilterConfig {
                extensions: vec![".txt".into()],
                ..FilterConfig::default()
            },
        );

        let expected: HashSet<_> = all.iter().filter(|p| p.ends_with(".txt")).cloned().collect();
        assert_eq!(txt, expected);
        assert!(!txt.contains("dir1/photo.jpg"));
    }

    #[test]
    fn test_exclude_root_joined_directory() {
        let dir = tree();
        let found = paths(
            dir.path(),
            FilterConfig {
                excluded_dirs: vec![dir.path().join("dir2")],
                ..FilterConfig::default()
            },
        );
        assert!(found.iter().all(|p| !p.starts_with("dir2/")), "paths: {found:?}");
        assert!(found.contains("dir1/file2.txt"));
    }

    #[test]
    fn test_exclude_root_relative_directory() {
        let dir = tree();
        let found = paths(
            dir.path(),
            FilterConfig {
                extensions: vec![".hidden".into(), ".txt".into()],
                excluded_dirs: vec![PathBuf::from(".hidden")],
                ..FilterConfig::default()
            },
        );
        // `.hidden` matches a suffix filter but the directory is still pruned
        assert!(!found.contains(".hidden/file4.txt"), "paths: {found:?}");
        assert!(found.contains("file1.txt"));
    }

    #[test]
    fn test_exclude_nested_directory_only() {
        let dir = tree();
        fs::create_dir_all(dir.path().join("dir1/cache")).unwrap();
        fs::write(dir.path().join("dir1/cache/thumb.jpg"), "t").unwrap();

        let found = paths(
            dir.path(),
            FilterConfig {
                excluded_dirs: vec![PathBuf::from("dir1/cache")],
                ..FilterConfig::default()
            },
        );
        assert!(!found.contains("dir1/cache/thumb.jpg"));
        assert!(found.contains("dir1/photo.jpg"));
    }

    #[test]
    fn test_missing_root_is_invalid() {
        let dir = TempDir::new().unwrap();
        let err = PathCollector::new(dir.path().join("missing"), FilterConfig::default())
            .walk()
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidRoot { .. }));
    }

    #[test]
    fn test_file_root_is_invalid() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("plain"), "x").unwrap();
        let err = collect(&dir.path().join("plain"), &FilterConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidRoot { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_not_followed_by_default() {
        let dir = tree();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("linked.txt"), "x").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let found = paths(dir.path(), FilterConfig::default());
        assert!(!found.contains("link/linked.txt"), "paths: {found:?}");

        let found = paths(
            dir.path(),
            FilterConfig {
                follow_symlinks: true,
                ..FilterConfig::default()
            },
        );
        assert!(found.contains("link/linked.txt"), "paths: {found:?}");
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_and_cyclic_symlinks_do_not_abort() {
        let dir = tree();
        std::os::unix::fs::symlink(dir.path().join("nowhere"), dir.path().join("broken")).unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("dir1/loop")).unwrap();

        for follow_symlinks in [false, true] {
            let (found, anomalies) = PathCollector::new(
                dir.path(),
                FilterConfig {
                    follow_symlinks,
                    ..FilterConfig::default()
                },
            )
            .collect_all()
            .unwrap();
            let found: HashSet<_> = found.iter().map(ToString::to_string).collect();
            assert!(found.contains("dir2/file3.txt"), "paths: {found:?}");
            assert!(!found.contains("broken"));

            assert!(
                anomalies
                    .iter()
                    .all(|a| a.kind == AnomalyKind::TraversalWarning),
                "anomalies: {anomalies:?}"
            );
            let broken = RelativePath::new("broken").unwrap();
            assert!(
                anomalies.iter().any(|a| a.concerns(&broken)),
                "follow_symlinks={follow_symlinks}: {anomalies:?}"
            );
            if follow_symlinks {
                let looped = RelativePath::new("dir1/loop").unwrap();
                assert!(
                    anomalies.iter().any(|a| a.concerns(&looped)),
                    "anomalies: {anomalies:?}"
                );
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_collected_without_following() {
        let dir = tree();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("target.jpg"), "jpeg").unwrap();
        std::os::unix::fs::symlink(outside.path().join("target.jpg"), dir.path().join("linked.jpg"))
            .unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("linked_dir.jpg")).unwrap();

        let found = paths(
            dir.path(),
            FilterConfig {
                extensions: vec![".jpg".into()],
                ..FilterConfig::default()
            },
        );
        assert_eq!(found, set(&["dir1/photo.jpg", "linked.jpg"]));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdirectory_is_a_warning() {
        use std::os::unix::fs::PermissionsExt as _;

        let dir = tree();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("secret.txt"), "x").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users read through mode bits; nothing to observe then
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let (found, anomalies) = PathCollector::new(dir.path(), FilterConfig::default())
            .collect_all()
            .unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(found.iter().any(|p| p.to_string() == "file1.txt"));
        assert!(!anomalies.is_empty());
        assert!(
            anomalies
                .iter()
                .all(|a| a.kind == AnomalyKind::TraversalWarning),
            "anomalies: {anomalies:?}"
        );
        assert!(!found.iter().any(|p| p.to_string() == "locked/secret.txt"));
    }
}
