//! Cargo-style status output for backfill
//!
//! ```text
//!     Scanning /photos -> /mnt/backup
//!    Comparing 4000 files
//!      Copying 12 files (48.21 MiB) into /tmp/missing
//!       Copied 12 files in 3.20s
//! ```

use std::io::Write as _;
use std::path::Path;
use std::time::Duration;

use backfill_core::{Phase, Summary};

/// Status verbs (right-aligned to 12 chars)
struct Status;

impl Status {
    const SCANNING: &str = "Scanning";
    const COMPARING: &str = "Comparing";
    const COPYING: &str = "Copying";
    const COPIED: &str = "Copied";
    const MISSING: &str = "Missing";
    const FINISHED: &str = "Finished";
    const WARNING: &str = "Warning";
}

/// Print a cargo-style status line
fn print_status(status: &str, message: &str) {
    let mut term = console::Term::stderr();
    let style = console::Style::new().green().bold();
    let _ = writeln!(term, "{:>12} {}", style.apply_to(status), message);
}

fn print_warning(status: &str, message: &str) {
    let mut term = console::Term::stderr();
    let style = console::Style::new().yellow().bold();
    let _ = writeln!(term, "{:>12} {}", style.apply_to(status), message);
}

fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

fn format_elapsed(elapsed: Duration) -> String {
    if elapsed.as_secs() >= 1 {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

/// Announce the two roots being reconciled
pub fn scanning(source: &Path, dest: &Path) {
    print_status(
        Status::SCANNING,
        &format!("{} -> {}", source.display(), dest.display()),
    );
}

/// Progress sink printing one line per interval
pub fn phase_update(phase: Phase, processed: usize) {
    let (status, what) = match phase {
        Phase::CollectSource => (Status::SCANNING, "source files"),
        Phase::CollectDestination => (Status::SCANNING, "destination files"),
        Phase::Compare => (Status::COMPARING, "files"),
        Phase::Copy => (Status::COPYING, "files"),
    };
    print_status(status, &format!("{processed} {what}..."));
}

/// Final summary, itemizing every anomaly
pub fn finish(summary: &Summary, verbose: bool) {
    let elapsed = format_elapsed(summary.elapsed);
    print_status(
        Status::COMPARING,
        &format!(
            "{} source files against {} destination files ({})",
            summary.source_files, summary.dest_files, summary.mode
        ),
    );

    if verbose || summary.output_root.is_none() {
        for path in summary.delta.iter() {
            print_status(Status::MISSING, &path.to_string());
        }
    }

    for anomaly in &summary.anomalies {
        print_warning(Status::WARNING, &anomaly.to_string());
    }

    match &summary.copy {
        None => print_status(
            Status::FINISHED,
            &format!(
                "dry run: {} files ({}) would be copied in {elapsed}",
                summary.delta.len(),
                format_size(summary.delta_bytes)
            ),
        ),
        Some(report) if report.is_complete() => {
            let output = summary
                .output_root
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            print_status(
                Status::COPIED,
                &format!(
                    "{} files ({}) into {output} in {elapsed}",
                    report.copied.len(),
                    format_size(report.bytes)
                ),
            );
        }
        Some(report) => print_warning(
            Status::FINISHED,
            &format!(
                "{} copied, {} failed in {elapsed}",
                report.copied.len(),
                report.failed.len()
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(250)), "250ms");
        assert_eq!(format_elapsed(Duration::from_millis(3200)), "3.20s");
    }

    #[test]
    fn test_format_size_binary_units() {
        assert_eq!(format_size(2048), "2 KiB");
    }
}
