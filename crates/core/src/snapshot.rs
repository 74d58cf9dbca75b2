//! Per-root scan results: the records a comparison works from

use std::collections::HashMap;
use std::path::Path;

use crate::hash::{self, ContentHash};
use crate::path::RelativePath;

/// Metadata for a single discovered file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Relative path from scan root
    pub path: RelativePath,
    /// File size in bytes
    pub size: u64,
    /// Content digest, present only when a comparison needed it
    pub digest: Option<ContentHash>,
}

impl FileRecord {
    /// Stat the file at `path` under `root`
    ///
    /// # Errors
    /// Returns an error if the file cannot be stat'ed
    pub fn stat(root: &Path, path: RelativePath) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path.join_to(root))?;
        Ok(Self {
            path,
            size: metadata.len(),
            digest: None,
        })
    }

    /// Copy of this record carrying the file's content digest
    ///
    /// # Errors
    /// Returns an error if the file cannot be read
    pub fn hashed(&self, root: &Path) -> std::io::Result<Self> {
        let digest = hash::digest(root, &self.path)?;
        Ok(Self {
            digest: Some(digest),
            ..self.clone()
        })
    }
}

/// All records of one root, keyed by relative path
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    files: HashMap<RelativePath, FileRecord>,
}

impl ScanResult {
    /// Create a result from records
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = FileRecord>) -> Self {
        let files = records.into_iter().map(|r| (r.path.clone(), r)).collect();
        Self { files }
    }

    /// Get the number of files
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Get a file by path
    #[must_use]
    pub fn get(&self, path: &RelativePath) -> Option<&FileRecord> {
        self.files.get(path)
    }

    #[must_use]
    pub fn contains(&self, path: &RelativePath) -> bool {
        self.files.contains_key(path)
    }

    /// Swap in a newer record for the same path, e.g. one carrying a digest
    pub(crate) fn replace(&mut self, record: FileRecord) {
        self.files.insert(record.path.clone(), record);
    }

    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.values()
    }

    /// Sum of all file sizes
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.values().map(|r| r.size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn rel(path: &str) -> RelativePath {
        RelativePath::new(path).unwrap()
    }

    #[test]
    fn test_stat_records_size_without_digest() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/b.txt"), "twelve bytes").unwrap();

        let record = FileRecord::stat(dir.path(), rel("a/b.txt")).unwrap();
        assert_eq!(record.size, 12);
        assert!(record.digest.is_none());

        let hashed = record.hashed(dir.path()).unwrap();
        assert_eq!(hashed.size, 12);
        assert_eq!(hashed.digest, Some(ContentHash::from_bytes(b"twelve bytes")));
        assert!(record.digest.is_none());
    }

    #[test]
    fn test_stat_vanished_file() {
        let dir = TempDir::new().unwrap();
        let err = FileRecord::stat(dir.path(), rel("gone.txt")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_scan_result_lookup() {
        let result = ScanResult::from_records([
            FileRecord {
                path: rel("a.txt"),
                size: 10,
                digest: None,
            },
            FileRecord {
                path: rel("b/c.txt"),
                size: 20,
                digest: None,
            },
        ]);

        assert_eq!(result.len(), 2);
        assert_eq!(result.total_size(), 30);
        assert_eq!(result.get(&rel("b/c.txt")).map(|r| r.size), Some(20));
        assert!(!result.contains(&rel("c.txt")));
    }
}
