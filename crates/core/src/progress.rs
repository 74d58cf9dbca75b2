//! Periodic progress signal
//!
//! Purely observational: emitting (or not) never changes a run's outcome.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tracing::info;

/// Pipeline stage a progress update belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    CollectSource,
    CollectDestination,
    Compare,
    Copy,
}

impl Phase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CollectSource => "collect-source",
            Self::CollectDestination => "collect-destination",
            Self::Compare => "compare",
            Self::Copy => "copy",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver of progress updates; called from worker threads
pub trait ProgressSink: Send + Sync {
    fn update(&self, phase: Phase, processed: usize);
}

impl<F> ProgressSink for F
where
    F: Fn(Phase, usize) + Send + Sync,
{
    fn update(&self, phase: Phase, processed: usize) {
        self(phase, processed);
    }
}

/// Logs updates through `tracing`
struct LogSink;

impl ProgressSink for LogSink {
    fn update(&self, phase: Phase, processed: usize) {
        info!(%phase, processed, "progress");
    }
}

/// Progress configuration shared by every phase of a run
#[derive(Clone)]
pub struct Progress {
    interval: Option<NonZeroUsize>,
    sink: Arc<dyn ProgressSink>,
}

impl Progress {
    /// No progress signal at all
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            interval: None,
            sink: Arc::new(LogSink),
        }
    }

    /// Emit through `tracing` every `interval` items
    #[must_use]
    pub fn every(interval: Option<NonZeroUsize>) -> Self {
        Self {
            interval,
            sink: Arc::new(LogSink),
        }
    }

    /// Replace the default log sink
    #[must_use]
    pub fn with_sink(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    #[must_use]
    pub fn interval(&self) -> Option<NonZeroUsize> {
        self.interval
    }

    /// Fresh counter for one phase
    #[must_use]
    pub fn phase(&self, phase: Phase) -> PhaseCounter<'_> {
        PhaseCounter {
            progress: self,
            phase,
            processed: AtomicUsize::new(0),
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::disabled()
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// Counts processed items of one phase, safe to tick from many workers
pub struct PhaseCounter<'a> {
    progress: &'a Progress,
    phase: Phase,
    processed: AtomicUsize,
}

impl PhaseCounter<'_> {
    /// Record one processed item, emitting on every interval boundary
    pub fn tick(&self) {
        let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(interval) = self.progress.interval {
            if processed % interval.get() == 0 {
                self.progress.sink.update(self.phase, processed);
            }
        }
    }

    #[must_use]
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording(interval: usize) -> (Progress, Arc<Mutex<Vec<(Phase, usize)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let progress = Progress::every(NonZeroUsize::new(interval)).with_sink(
            move |phase: Phase, processed: usize| {
                sink_seen.lock().unwrap().push((phase, processed));
            },
        );
        (progress, seen)
    }

    #[test]
    fn test_emits_every_interval() {
        let (progress, seen) = recording(3);
        let counter = progress.phase(Phase::Compare);
        for _ in 0..10 {
            counter.tick();
        }

        assert_eq!(counter.processed(), 10);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(Phase::Compare, 3), (Phase::Compare, 6), (Phase::Compare, 9)]
        );
    }

    #[test]
    fn test_disabled_never_emits() {
        let (progress, seen) = recording(1);
        let progress = Progress {
            interval: None,
            ..progress
        };
        let counter = progress.phase(Phase::Copy);
        counter.tick();
        counter.tick();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_phase_counters_are_independent() {
        let (progress, seen) = recording(2);
        let source = progress.phase(Phase::CollectSource);
        let dest = progress.phase(Phase::CollectDestination);
        source.tick();
        dest.tick();
        source.tick();

        assert_eq!(*seen.lock().unwrap(), vec![(Phase::CollectSource, 2)]);
    }
}
