//! backfill-core: Directory reconciliation engine
//!
//! Finds files under a source root that are missing from, or differ in, a
//! destination root and copies them into a separate output root, keeping
//! their relative paths. One-directional: nothing is ever deleted, and no
//! file under either root is modified.

pub mod compare;
pub mod config;
pub mod context;
pub mod error;
pub mod hash;
pub mod materialize;
pub mod orchestrator;
pub mod path;
pub mod progress;
pub mod scan;
pub mod snapshot;

pub use compare::{Comparator, Comparison, ComparisonMode, DeltaSet};
pub use config::{BackfillConfig, FilterConfig, RunConfig};
pub use context::ScanContext;
pub use error::{Anomaly, AnomalyKind, Error, Result};
pub use hash::ContentHash;
pub use materialize::{CopyReport, FailedCopy, Materializer, write_missing_list};
pub use orchestrator::{ScanOrchestrator, Summary, run};
pub use path::RelativePath;
pub use progress::{Phase, Progress, ProgressSink};
pub use scan::{PathCollector, Paths};
pub use snapshot::{FileRecord, ScanResult};
