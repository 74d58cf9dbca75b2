//! Drives a full run: collect both roots, diff, materialize, summarize

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::compare::{Comparator, ComparisonMode, DeltaSet};
use crate::config::{FilterConfig, RunConfig};
use crate::context::ScanContext;
use crate::error::{Anomaly, Result};
use crate::materialize::{CopyReport, Materializer};
use crate::path::RelativePath;
use crate::progress::{Phase, Progress};
use crate::scan::PathCollector;

/// Everything a run did, including every non-fatal anomaly
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    #[serde(serialize_with = "crate::path::serialize_lossy")]
    pub source_root: PathBuf,
    #[serde(serialize_with = "crate::path::serialize_lossy")]
    pub dest_root: PathBuf,
    /// `None` for dry runs
    #[serde(serialize_with = "crate::path::serialize_lossy_opt")]
    pub output_root: Option<PathBuf>,
    pub mode: ComparisonMode,
    /// Files discovered under the source root
    pub source_files: usize,
    /// Files discovered under the destination root
    pub dest_files: usize,
    /// Destination files with no source counterpart (left untouched)
    pub dest_only: usize,
    /// Source files missing from or changed in the destination
    pub delta: DeltaSet,
    /// Total size of the delta's source files
    pub delta_bytes: u64,
    /// Outcome of materialization; `None` for dry runs
    pub copy: Option<CopyReport>,
    /// Traversal, stat, hash and copy problems, in that order of discovery
    pub anomalies: Vec<Anomaly>,
    pub elapsed: Duration,
}

impl Summary {
    /// No anomalies at all
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    /// Paths that failed to copy
    pub fn failed(&self) -> impl Iterator<Item = &RelativePath> {
        self.copy.iter().flat_map(|c| c.failed.iter().map(|f| &f.path))
    }
}

/// Runs the pipeline against one worker context
pub struct ScanOrchestrator<'a> {
    ctx: &'a ScanContext,
    filters: FilterConfig,
    mode: ComparisonMode,
    dry_run: bool,
}

impl<'a> ScanOrchestrator<'a> {
    #[must_use]
    pub fn new(ctx: &'a ScanContext, filters: FilterConfig, config: &RunConfig) -> Self {
        Self {
            ctx,
            filters,
            mode: config.mode,
            dry_run: config.dry_run,
        }
    }

    /// Collect, compare and (unless dry-running) copy the delta into `output_root`
    ///
    /// # Errors
    /// Fails before doing any work if either root is invalid, and before
    /// copying if the output root cannot be created. Everything else is
    /// reported through the summary.
    pub fn run(&self, source_root: &Path, dest_root: &Path, output_root: &Path) -> Result<Summary> {
        let start = Instant::now();

        let source = PathCollector::new(source_root, self.filters.clone());
        let destination = PathCollector::new(dest_root, self.filters.clone());
        source.validate_root()?;
        destination.validate_root()?;

        info!("Scanning {} and {}", source_root.display(), dest_root.display());
        let (source_scan, dest_scan) = self.ctx.join(
            || self.collect(&source, Phase::CollectSource),
            || self.collect(&destination, Phase::CollectDestination),
        );
        let (source_paths, mut anomalies) = source_scan?;
        let (dest_paths, dest_anomalies) = dest_scan?;
        anomalies.extend(dest_anomalies);

        let source_files = source_paths.len();
        let dest_files = dest_paths.len();
        info!("Found {source_files} source files and {dest_files} destination files");

        let comparison = Comparator::new(self.ctx, self.mode).diff(
            source_paths,
            dest_paths,
            source_root,
            dest_root,
        );
        anomalies.extend(comparison.anomalies);

        let delta_bytes = comparison
            .delta
            .iter()
            .filter_map(|p| comparison.source.get(p))
            .map(|r| r.size)
            .sum::<u64>();

        let copy = if self.dry_run {
            info!("Dry run: skipping copy of {} files", comparison.delta.len());
            None
        } else {
            let report = Materializer::new(source_root, output_root)
                .copy(self.ctx, comparison.delta.clone())?;
            anomalies.extend(report.failed.iter().map(|f| f.to_anomaly()));
            Some(report)
        };

        Ok(Summary {
            source_root: source_root.to_path_buf(),
            dest_root: dest_root.to_path_buf(),
            output_root: (!self.dry_run).then(|| output_root.to_path_buf()),
            mode: self.mode,
            source_files,
            dest_files,
            dest_only: comparison.dest_only,
            delta: comparison.delta,
            delta_bytes,
            copy,
            anomalies,
            elapsed: start.elapsed(),
        })
    }

    /// Walk one root; traversal itself stays on a single thread
    fn collect(
        &self,
        collector: &PathCollector,
        phase: Phase,
    ) -> Result<(Vec<RelativePath>, Vec<Anomaly>)> {
        let counter = self.ctx.progress().phase(phase);
        let mut paths = Vec::new();
        let mut anomalies = Vec::new();
        for item in collector.walk()? {
            match item {
                Ok(path) => {
                    paths.push(path);
                    counter.tick();
                }
                Err(anomaly) => anomalies.push(anomaly),
            }
        }
        Ok((paths, anomalies))
    }
}

/// One-shot run with its own worker pool of `config.threads` workers
///
/// # Errors
/// See [`ScanOrchestrator::run`]; also fails if the pool cannot be built
pub fn run(
    source_root: &Path,
    dest_root: &Path,
    output_root: &Path,
    filters: FilterConfig,
    config: &RunConfig,
    progress: Progress,
) -> Result<Summary> {
    let ctx = ScanContext::new(config.threads, progress)?;
    ScanOrchestrator::new(&ctx, filters, config).run(source_root, dest_root, output_root)
}
