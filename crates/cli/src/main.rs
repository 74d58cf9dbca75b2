//! backfill: copy out the files a backup is missing
//!
//! Compares a source tree against a destination tree and copies every file
//! that is absent from (or different in) the destination into a separate
//! output directory, preserving relative paths.

mod progress;

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, ValueEnum, builder::Styles};
use color_eyre::Result;
use tracing::{debug, info};

use backfill_core::{BackfillConfig, ComparisonMode, Progress, write_missing_list};

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default())
    .valid(AnsiColor::Green.on_default())
    .invalid(AnsiColor::Red.on_default());

#[derive(Parser, Debug)]
#[command(name = "backfill")]
#[command(version)]
#[command(styles = STYLES)]
#[command(about = "Compare directories and copy out missing files")]
#[command(long_about = r#"
backfill finds files under SRC that are missing from DEST (or differ from
their DEST counterpart) and copies them into OUTPUT, keeping their relative
paths. Nothing under SRC or DEST is ever modified or deleted.

Files are compared by size and BLAKE3 content hash. --skip-hash compares
sizes only: faster, but a same-size edit is not detected.

Examples:
  backfill ~/Photos /mnt/backup/Photos -o ~/to-backup
  backfill ~/Photos /mnt/backup/Photos -o out -e .jpg .CR2 --threads 8
  backfill src dest -o out --dry-run --list missing.txt
"#)]
struct Cli {
    /// Source directory
    src: PathBuf,

    /// Destination directory
    dest: PathBuf,

    /// Output directory for missing files
    #[arg(short, long)]
    output: PathBuf,

    /// Filename suffixes to consider, e.g. `.jpg` (default: all files)
    #[arg(short, long = "ext", num_args = 1..)]
    extensions: Vec<String>,

    /// Directories to skip, absolute or relative to each root
    #[arg(long, num_args = 1..)]
    exclude: Vec<PathBuf>,

    /// Compare sizes only, skipping content hashes
    #[arg(long)]
    skip_hash: bool,

    /// Descend into symlinked directories
    #[arg(long)]
    follow_symlinks: bool,

    /// Worker threads for stat, hash and copy work
    #[arg(long)]
    threads: Option<NonZeroUsize>,

    /// Show progress every N files
    #[arg(long, value_name = "N")]
    progress: Option<NonZeroUsize>,

    /// Report what would be copied without copying
    #[arg(long)]
    dry_run: bool,

    /// Also write the missing paths to FILE, one per line
    #[arg(long, value_name = "FILE")]
    list: Option<PathBuf>,

    /// Config file (default: ./backfill.toml if present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = Format::Summary)]
    format: Format,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Summary,
    Json,
}

impl Cli {
    /// Layer command-line flags over file configuration
    fn merge_into(&self, mut config: BackfillConfig) -> BackfillConfig {
        config
            .filters
            .extensions
            .extend(self.extensions.iter().cloned());
        config
            .filters
            .excluded_dirs
            .extend(self.exclude.iter().cloned());
        config.filters.follow_symlinks |= self.follow_symlinks;

        if self.skip_hash {
            config.run.mode = ComparisonMode::SizeOnly;
        }
        if let Some(threads) = self.threads {
            config.run.threads = threads;
        }
        if self.progress.is_some() {
            config.run.progress = self.progress;
        }
        config.run.dry_run |= self.dry_run;
        config
    }
}

fn load_config(explicit: Option<&Path>) -> Result<BackfillConfig> {
    let config = match explicit {
        Some(path) => BackfillConfig::load(path)?,
        None => BackfillConfig::load_or_default(Path::new("."))?,
    };
    Ok(config)
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.merge_into(load_config(cli.config.as_deref())?);
    debug!("Effective config: {config:?}");

    let mut reporter = Progress::every(config.run.progress);
    if cli.format == Format::Summary {
        progress::scanning(&cli.src, &cli.dest);
        reporter = reporter.with_sink(progress::phase_update);
    }

    let summary = backfill_core::run(
        &cli.src,
        &cli.dest,
        &cli.output,
        config.filters,
        &config.run,
        reporter,
    )?;

    if let Some(list) = &cli.list {
        write_missing_list(list, &summary.delta)?;
        info!("Wrote {} paths to {}", summary.delta.len(), list.display());
    }

    match cli.format {
        Format::Json => {
            let json = serde_json::to_string_pretty(&summary)?;
            println!("{json}");
        }
        Format::Summary => progress::finish(&summary, cli.verbose),
    }

    Ok(())
}
