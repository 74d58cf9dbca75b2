//! Run configuration, optionally loaded from a TOML file

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::compare::ComparisonMode;
use crate::error::{Error, Result};

/// Which files a scan considers
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Filename suffixes to keep (e.g. `".jpg"`); empty keeps every file.
    /// Matching is case-sensitive and literal, so the dot is part of the suffix.
    pub extensions: Vec<String>,

    /// Descend into symlinked directories
    pub follow_symlinks: bool,

    /// Directories pruned before descent, absolute or relative to the scan root
    #[serde(rename = "exclude")]
    pub excluded_dirs: Vec<PathBuf>,
}

impl FilterConfig {
    /// Whether a file name passes the extension filter
    #[must_use]
    pub fn matches_name(&self, name: &std::ffi::OsStr) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let name = name.as_encoded_bytes();
        self.extensions
            .iter()
            .any(|ext| name.ends_with(ext.as_bytes()))
    }
}

/// Knobs for one orchestrated run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Worker threads for stat, hash and copy work
    pub threads: NonZeroUsize,

    /// Emit a progress signal every N processed files
    pub progress: Option<NonZeroUsize>,

    /// How source and destination files are compared
    pub mode: ComparisonMode,

    /// Compute and report the delta without copying anything
    pub dry_run: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            threads: NonZeroUsize::MIN,
            progress: None,
            mode: ComparisonMode::default(),
            dry_run: false,
        }
    }
}

/// Contents of a `backfill.toml` file
///
/// ```toml
/// extensions = [".jpg", ".CR2"]
/// exclude = ["/photos/.thumbnails"]
///
/// [run]
/// threads = 8
/// mode = "size-only"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    #[serde(flatten)]
    pub filters: FilterConfig,

    pub run: RunConfig,
}

/// Conventional config file name
pub const CONFIG_FILE: &str = "backfill.toml";

impl BackfillConfig {
    /// Load config from an explicit file path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&content).map_err(|message| Error::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Load `backfill.toml` from `dir` if present, defaults otherwise.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.is_file() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    fn parse(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
extensions = [".jpg", ".CR2"]
follow_symlinks = true
exclude = ["/photos/.thumbnails", "cache"]

[run]
threads = 8
progress = 500
mode = "size-only"
dry_run = true
"#;

        let config = BackfillConfig::parse(toml).unwrap();
        assert_eq!(config.filters.extensions, vec![".jpg", ".CR2"]);
        assert!(config.filters.follow_symlinks);
        assert_eq!(config.filters.excluded_dirs.len(), 2);
        assert_eq!(config.run.threads.get(), 8);
        assert_eq!(config.run.progress.map(NonZeroUsize::get), Some(500));
        assert_eq!(config.run.mode, ComparisonMode::SizeOnly);
        assert!(config.run.dry_run);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = BackfillConfig::parse("").unwrap();
        assert_eq!(config, BackfillConfig::default());
        assert_eq!(config.run.threads.get(), 1);
        assert_eq!(config.run.mode, ComparisonMode::ContentHash);
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(BackfillConfig::parse("[run]\nthreads = 0\n").is_err());
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(BackfillConfig::parse("[run]\nmode = \"mtime\"\n").is_err());
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = TempDir::new().unwrap();
        let config = BackfillConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config, BackfillConfig::default());
    }

    #[test]
    fn test_load_missing_explicit_file_errors() {
        let dir = TempDir::new().unwrap();
        let err = BackfillConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_extension_match_is_literal_suffix() {
        let filters = FilterConfig {
            extensions: vec![".txt".into()],
            ..FilterConfig::default()
        };
        assert!(filters.matches_name(OsStr::new("notes.txt")));
        assert!(!filters.matches_name(OsStr::new("notes.TXT")));
        assert!(!filters.matches_name(OsStr::new("notes.txt.bak")));
        // no dot in the configured suffix means a plain suffix match
        let filters = FilterConfig {
            extensions: vec!["txt".into()],
            ..FilterConfig::default()
        };
        assert!(filters.matches_name(OsStr::new("mytxt")));
    }

    #[test]
    fn test_no_extensions_matches_everything() {
        assert!(FilterConfig::default().matches_name(OsStr::new("anything")));
    }
}
