//! Decides which source files are missing from, or differ in, the destination

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::ScanContext;
use crate::error::{Anomaly, AnomalyKind};
use crate::path::RelativePath;
use crate::progress::Phase;
use crate::snapshot::{FileRecord, ScanResult};

/// How a source file is judged equal to its destination counterpart
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonMode {
    /// Equal sizes mean equal files. Fast, but a same-size edit goes unnoticed.
    SizeOnly,
    /// Equal sizes and equal BLAKE3 digests
    #[default]
    ContentHash,
}

impl ComparisonMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SizeOnly => "size-only",
            Self::ContentHash => "content-hash",
        }
    }
}

impl fmt::Display for ComparisonMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source paths that must be copied out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeltaSet(BTreeSet<RelativePath>);

impl DeltaSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn contains(&self, path: &RelativePath) -> bool {
        self.0.contains(path)
    }

    /// Paths in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &RelativePath> {
        self.0.iter()
    }
}

impl FromIterator<RelativePath> for DeltaSet {
    fn from_iter<I: IntoIterator<Item = RelativePath>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for DeltaSet {
    type Item = RelativePath;
    type IntoIter = std::collections::btree_set::IntoIter<RelativePath>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Outcome of comparing two trees
#[derive(Debug)]
pub struct Comparison {
    pub delta: DeltaSet,
    /// Records of every source file that could be read
    pub source: ScanResult,
    /// Records of destination files that have a source counterpart
    pub destination: ScanResult,
    /// Destination files with no source counterpart; reported, never acted on
    pub dest_only: usize,
    /// Files excluded from the delta because they could not be read
    pub anomalies: Vec<Anomaly>,
}

/// The decision for one source path once both sides are known
enum Verdict {
    Same,
    Missing,
    Differs,
    Hash,
}

/// Computes the delta between a source and a destination tree
pub struct Comparator<'a> {
    ctx: &'a ScanContext,
    mode: ComparisonMode,
}

impl<'a> Comparator<'a> {
    #[must_use]
    pub fn new(ctx: &'a ScanContext, mode: ComparisonMode) -> Self {
        Self { ctx, mode }
    }

    /// Compare collected paths of both roots
    ///
    /// A source path lands in the delta when it is absent from `dest_paths`
    /// or its record differs under the configured mode. Files that vanish or
    /// cannot be read on either side are left out and reported as anomalies.
    #[must_use]
    pub fn diff(
        &self,
        source_paths: Vec<RelativePath>,
        dest_paths: Vec<RelativePath>,
        source_root: &Path,
        dest_root: &Path,
    ) -> Comparison {
        let wanted: HashSet<&RelativePath> = source_paths.iter().collect();
        let (shared, dest_only): (Vec<_>, Vec<_>) =
            dest_paths.into_iter().partition(|p| wanted.contains(p));
        drop(wanted);

        let counter = self.ctx.progress().phase(Phase::Compare);
        let ((source, mut anomalies), (destination, dest_anomalies)) = self.ctx.join(
            || self.stat_all(source_root, source_paths),
            || self.stat_all(dest_root, shared),
        );
        // Source files that failed to stat still count as processed
        for _ in &anomalies {
            counter.tick();
        }
        anomalies.extend(dest_anomalies);

        let unreadable: HashSet<RelativePath> = anomalies
            .iter()
            .filter_map(|a| a.path.as_deref().and_then(RelativePath::new))
            .collect();

        let mut delta = BTreeSet::new();
        let mut to_hash = Vec::new();

        for record in source.records() {
            match self.verdict(record, destination.get(&record.path), &unreadable) {
                Some(Verdict::Same) => counter.tick(),
                Some(Verdict::Missing) => {
                    debug!("{} missing from destination", record.path);
                    delta.insert(record.path.clone());
                    counter.tick();
                }
                Some(Verdict::Differs) => {
                    debug!("{} differs in size", record.path);
                    delta.insert(record.path.clone());
                    counter.tick();
                }
                Some(Verdict::Hash) => to_hash.push(record.path.clone()),
                None => counter.tick(),
            }
        }

        let mut source = source;
        let mut destination = destination;
        if !to_hash.is_empty() {
            info!("Hashing {} same-size file pairs", to_hash.len());
            let hashed: Vec<_> = self.ctx.install(|| {
                to_hash
                    .into_par_iter()
                    .map(|path| {
                        let pair =
                            Self::hash_pair(&source, &destination, source_root, dest_root, &path);
                        counter.tick();
                        (path, pair)
                    })
                    .collect()
            });

            for (path, pair) in hashed {
                match pair {
                    Ok((src, dst)) => {
                        if src.digest != dst.digest {
                            debug!("{path} differs in content");
                            delta.insert(path);
                        }
                        source.replace(src);
                        destination.replace(dst);
                    }
                    Err(anomaly) => anomalies.push(anomaly),
                }
            }
        }

        anomalies.sort_by(|a, b| (a.kind, &a.path).cmp(&(b.kind, &b.path)));
        info!(
            "{} of {} source files missing or changed ({} mode)",
            delta.len(),
            source.len(),
            self.mode
        );

        Comparison {
            delta: DeltaSet(delta),
            source,
            destination,
            dest_only: dest_only.len(),
            anomalies,
        }
    }

    fn verdict(
        &self,
        source: &FileRecord,
        dest: Option<&FileRecord>,
        unreadable: &HashSet<RelativePath>,
    ) -> Option<Verdict> {
        let Some(dest) = dest else {
            // Destination copy exists but could not be stat'ed: not eligible
            if unreadable.contains(&source.path) {
                return None;
            }
            return Some(Verdict::Missing);
        };

        if source.size != dest.size {
            return Some(Verdict::Differs);
        }

        Some(match self.mode {
            ComparisonMode::SizeOnly => Verdict::Same,
            ComparisonMode::ContentHash => Verdict::Hash,
        })
    }

    /// Stat every path under `root` on the worker pool
    fn stat_all(&self, root: &Path, paths: Vec<RelativePath>) -> (ScanResult, Vec<Anomaly>) {
        let results: Vec<_> = self.ctx.install(|| {
            paths
                .into_par_iter()
                .map(|path| {
                    FileRecord::stat(root, path.clone()).map_err(|e| {
                        let kind = AnomalyKind::for_io(&e, AnomalyKind::Unreadable);
                        warn!("Cannot stat {}: {e}", path.join_to(root).display());
                        Anomaly::for_file(kind, &path, e.to_string())
                    })
                })
                .collect()
        });

        let mut records = Vec::with_capacity(results.len());
        let mut anomalies = Vec::new();
        for result in results {
            match result {
                Ok(record) => records.push(record),
                Err(anomaly) => anomalies.push(anomaly),
            }
        }
        (ScanResult::from_records(records), anomalies)
    }

    fn hash_pair(
        source: &ScanResult,
        destination: &ScanResult,
        source_root: &Path,
        dest_root: &Path,
        path: &RelativePath,
    ) -> Result<(FileRecord, FileRecord), Anomaly> {
        let hash = |result: &ScanResult, root: &Path| {
            let record = result.get(path).ok_or_else(|| {
                Anomaly::for_file(AnomalyKind::RaceAnomaly, path, "record disappeared")
            })?;
            record.hashed(root).map_err(|e| {
                let kind = AnomalyKind::for_io(&e, AnomalyKind::Unreadable);
                warn!("Cannot hash {}: {e}", path.join_to(root).display());
                Anomaly::for_file(kind, path, e.to_string())
            })
        };
        Ok((hash(source, source_root)?, hash(destination, dest_root)?))
    }
}

/// Size-then-digest comparison of two roots; see [`Comparator::diff`]
#[must_use]
pub fn diff(
    ctx: &ScanContext,
    source_paths: Vec<RelativePath>,
    dest_paths: Vec<RelativePath>,
    source_root: &Path,
    dest_root: &Path,
    mode: ComparisonMode,
) -> Comparison {
    Comparator::new(ctx, mode).diff(source_paths, dest_paths, source_root, dest_root)
}
