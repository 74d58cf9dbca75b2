//! Fatal errors and the non-fatal anomalies collected into a run's report

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::path::RelativePath;

/// Errors that stop a run
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Source or destination root is missing, not a directory, or unreadable
    #[error("invalid root {}: {source}", .path.display())]
    InvalidRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The output directory could not be created
    #[error("cannot create output root {}: {source}", .path.display())]
    OutputRootFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The worker pool could not be started
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Configuration file could not be read or parsed
    #[error("config {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    /// A file explicitly requested by the caller (e.g. the missing list) could not be written
    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Classification of a non-fatal problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnomalyKind {
    /// A directory below a root could not be read; traversal continued without it
    TraversalWarning,
    /// A file vanished between discovery and stat, hash or copy
    RaceAnomaly,
    /// A discovered file could not be stat'ed or hashed (other than vanishing)
    Unreadable,
    /// Copying a delta file into the output root failed
    CopyFailure,
}

impl AnomalyKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TraversalWarning => "traversal-warning",
            Self::RaceAnomaly => "race-anomaly",
            Self::Unreadable => "unreadable",
            Self::CopyFailure => "copy-failure",
        }
    }

    /// Pick `RaceAnomaly` for vanished files, `fallback` otherwise
    #[must_use]
    pub fn for_io(err: &std::io::Error, fallback: Self) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::RaceAnomaly
        } else {
            fallback
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal problem recorded during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    /// Affected path; relative to its root when one is known
    #[serde(serialize_with = "crate::path::serialize_lossy_opt")]
    pub path: Option<PathBuf>,
    pub message: String,
}

impl Anomaly {
    #[must_use]
    pub fn new(kind: AnomalyKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    /// Anomaly for a file identified by its relative path
    #[must_use]
    pub fn for_file(kind: AnomalyKind, path: &RelativePath, message: impl Into<String>) -> Self {
        Self::new(kind, Some(path.to_path_buf()), message)
    }

    /// Whether this anomaly concerns the given relative path
    #[must_use]
    pub fn concerns(&self, path: &RelativePath) -> bool {
        self.path.as_deref() == Some(path.as_path())
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "[{}] {}: {}", self.kind, path.display(), self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}
