//! Replicates delta files into the output root, preserving relative paths
//!
//! Each file is streamed into a temporary file next to its final location,
//! stamped with the source's permissions and times, then renamed into place.
//! An interrupted run never leaves a truncated file under a final name.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use rayon::prelude::*;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::compare::DeltaSet;
use crate::context::ScanContext;
use crate::error::{Anomaly, AnomalyKind, Error, Result};
use crate::path::RelativePath;
use crate::progress::Phase;

/// One file that could not be copied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedCopy {
    pub path: RelativePath,
    pub error: String,
    /// `RaceAnomaly` when the source vanished, `CopyFailure` otherwise
    pub kind: AnomalyKind,
}

impl FailedCopy {
    #[must_use]
    pub fn to_anomaly(&self) -> Anomaly {
        Anomaly::for_file(self.kind, &self.path, self.error.clone())
    }
}

/// What a materialization pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CopyReport {
    /// Copied paths, sorted
    pub copied: Vec<RelativePath>,
    /// Paths that failed, sorted
    pub failed: Vec<FailedCopy>,
    /// Bytes written across all copied files
    pub bytes: u64,
}

impl CopyReport {
    /// True when every delta file was copied
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Copies delta files from a source root into an output root
pub struct Materializer {
    source_root: PathBuf,
    output_root: PathBuf,
}

impl Materializer {
    #[must_use]
    pub fn new(source_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            output_root: output_root.into(),
        }
    }

    /// Copy every path of `delta`; individual failures are recorded, not raised
    ///
    /// # Errors
    /// Returns [`Error::OutputRootFailure`] if the output root cannot be created
    pub fn copy(&self, ctx: &ScanContext, delta: DeltaSet) -> Result<CopyReport> {
        fs::create_dir_all(&self.output_root).map_err(|source| Error::OutputRootFailure {
            path: self.output_root.clone(),
            source,
        })?;

        info!(
            "Copying {} files into {}",
            delta.len(),
            self.output_root.display()
        );

        let counter = ctx.progress().phase(Phase::Copy);
        let paths: Vec<RelativePath> = delta.into_iter().collect();
        let results: Vec<_> = ctx.install(|| {
            paths
                .into_par_iter()
                .map(|path| {
                    let result = self.copy_one(&path);
                    counter.tick();
                    (path, result)
                })
                .collect()
        });

        let mut report = CopyReport::default();
        for (path, result) in results {
            match result {
                Ok(bytes) => {
                    report.bytes += bytes;
                    report.copied.push(path);
                }
                Err(e) => {
                    warn!("Failed to copy {path}: {e}");
                    report.failed.push(FailedCopy {
                        kind: AnomalyKind::for_io(&e, AnomalyKind::CopyFailure),
                        error: e.to_string(),
                        path,
                    });
                }
            }
        }

        report.copied.sort();
        report.failed.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(report)
    }

    /// Copy one file, returning the number of bytes written
    fn copy_one(&self, path: &RelativePath) -> io::Result<u64> {
        let source = path.join_to(&self.source_root);
        let target = path.join_to(&self.output_root);
        let parent = target
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no parent"))?;

        // Sibling workers may create the same parent concurrently
        fs::create_dir_all(parent)?;

        let mut input = File::open(&source)?;
        let metadata = input.metadata()?;

        let mut staged = NamedTempFile::new_in(parent)?;
        let bytes = io::copy(&mut input, staged.as_file_mut())?;
        staged.as_file().sync_all()?;

        fs::set_permissions(staged.path(), metadata.permissions())?;
        let atime = FileTime::from_last_access_time(&metadata);
        let mtime = FileTime::from_last_modification_time(&metadata);
        filetime::set_file_handle_times(staged.as_file(), Some(atime), Some(mtime))?;

        staged.persist(&target).map_err(|e| e.error)?;
        debug!("Copied {path} ({bytes} bytes)");
        Ok(bytes)
    }
}

/// Copy `delta` from `source_root` into `output_root`; see [`Materializer::copy`]
///
/// # Errors
/// Returns [`Error::OutputRootFailure`] if the output root cannot be created
pub fn copy(
    ctx: &ScanContext,
    source_root: &Path,
    output_root: &Path,
    delta: DeltaSet,
) -> Result<CopyReport> {
    Materializer::new(source_root, output_root).copy(ctx, delta)
}

/// Write the delta as a newline-terminated list of relative paths
///
/// # Errors
/// Returns [`Error::Write`] if the list file cannot be written
pub fn write_missing_list(path: &Path, delta: &DeltaSet) -> Result<()> {
    let mut contents = String::new();
    for relative in delta.iter() {
        contents.push_str(&relative.to_slash_string());
        contents.push('\n');
    }
    fs::write(path, contents).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })
}
