use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use iolens::analysis::{self, AnalysisOptions};
use iolens::config::Config;
use iolens::input::{self, TraceInput};
use iolens::normalize::normalize;
use iolens::thresholds::ThresholdPolicy;

/// I/O access-pattern analyzer for HPC application traces.
#[derive(Parser)]
#[command(name = "iolens", about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Counter-table trace bundle (JSON).
    #[arg(long)]
    counters: Option<PathBuf>,

    /// Interval-table bundle prefix; expects <prefix>.intervals.csv,
    /// <prefix>.records.csv, and <prefix>.filemap.csv.
    #[arg(long)]
    intervals: Option<PathBuf>,

    /// Write the JSON report to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Logging verbosity level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print version information and exit.
    Version,
}

/// Build-time version info.
mod version {
    /// Release version string (set at build time).
    pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

    /// Git commit hash (set at build time via env, or "unknown").
    pub fn git_commit() -> &'static str {
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    }

    /// Full version string with platform info.
    pub fn full() -> String {
        format!(
            "{} (commit: {}, {}/{})",
            RELEASE,
            git_commit(),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle version subcommand before anything else.
    if let Some(Command::Version) = &cli.command {
        println!("iolens {}", version::full());
        return Ok(());
    }

    // Initialize tracing.
    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;

    fmt().with_env_filter(filter).with_target(true).init();

    // Configuration is optional; thresholds fall back to their defaults.
    let (policy, options) = match &cli.config {
        Some(path) => {
            let cfg = Config::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?;
            let policy = cfg.policy()?;
            (
                policy,
                AnalysisOptions {
                    full_paths: cfg.full_path,
                },
            )
        }
        None => (ThresholdPolicy::default(), AnalysisOptions::default()),
    };

    let input = match (&cli.counters, &cli.intervals) {
        (Some(path), None) => TraceInput::Counters(input::load_counter_bundle(path)?),
        (None, Some(prefix)) => TraceInput::Intervals(input::load_interval_bundle(prefix)?),
        (Some(_), Some(_)) => bail!("--counters and --intervals are mutually exclusive"),
        (None, None) => bail!("one of --counters or --intervals is required"),
    };

    tracing::info!(version = version::RELEASE, "starting iolens");

    let trace = normalize(input)?;

    let usage = trace.catalog.usage_counts();
    tracing::info!(
        records = trace.records.len(),
        files = trace.catalog.len(),
        stdio_files = usage.stdio,
        posix_files = usage.posix,
        mpiio_files = usage.mpiio,
        nprocs = trace.job.nprocs,
        "trace normalized"
    );

    let report = analysis::run(&trace, policy, options);

    let json = serde_json::to_string_pretty(&report).context("serializing report")?;
    match &cli.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("writing report to {}", path.display()))?,
        None => println!("{json}"),
    }

    Ok(())
}
