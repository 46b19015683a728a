//! ContLab CLI — sanitize vendor data and stitch continuous futures series.
//!
//! Commands:
//! - `sanitize`: raw vendor OHLCV CSVs -> cleaned bar table
//! - `ticks`: directory of vendor tick CSVs -> one sorted tick table
//! - `roll`: cleaned bar table -> continuous series
//! - `run`: `sanitize` + `roll` in one pass

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use contlab_core::DecadePolicy;
use contlab_runner::{
    run_all, run_rollover, run_sanitize, sanitize_ticks, FailurePolicy, IngestConfig,
    IngestReport, OutputFormat, PipelineConfig, RunSummary, TickJob, TickReport, TracingObserver,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "contlab",
    about = "ContLab CLI — volume-based futures rollover and continuous series stitching"
)]
struct Cli {
    /// Debug-level logging (per-day volume comparisons).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Parquet,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Parquet => OutputFormat::Parquet,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FailureArg {
    Abort,
    Warn,
}

impl From<FailureArg> for FailurePolicy {
    fn from(arg: FailureArg) -> Self {
        match arg {
            FailureArg::Abort => FailurePolicy::Abort,
            FailureArg::Warn => FailurePolicy::Warn,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Clean raw vendor OHLCV files into a single bar table.
    Sanitize {
        /// Raw vendor CSV files.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Asset root (e.g. ES, NQ, MES).
        #[arg(long)]
        asset: String,

        #[arg(long, default_value = "sanitized_data.csv")]
        output: PathBuf,

        /// IANA exchange timezone.
        #[arg(long, default_value = "America/New_York")]
        exchange_tz: String,

        #[arg(long, default_value_t = 8)]
        workers: usize,

        #[arg(long, value_enum, default_value = "abort")]
        on_failure: FailureArg,

        /// Output format; inferred from the output extension when omitted.
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
    },
    /// Merge and clean a directory of vendor tick files.
    Ticks {
        #[arg(long)]
        asset: String,

        #[arg(long, default_value = "input")]
        input_dir: PathBuf,

        #[arg(long, value_enum, default_value = "csv")]
        format: FormatArg,

        /// Defaults to `{asset}_ticks.{csv|parquet}`.
        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long, default_value_t = 8)]
        workers: usize,

        #[arg(long, value_enum, default_value = "abort")]
        on_failure: FailureArg,
    },
    /// Build a continuous series from a cleaned bar table.
    Roll {
        #[arg(long, default_value = "sanitized_data.csv")]
        input: PathBuf,

        #[arg(long, default_value = "continuous_futures.csv")]
        output: PathBuf,

        #[command(flatten)]
        overrides: RollOverrides,
    },
    /// Sanitize raw vendor files and build the continuous series in one pass.
    Run {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(long, default_value = "continuous_futures.csv")]
        output: PathBuf,

        #[command(flatten)]
        overrides: RollOverrides,

        #[arg(long)]
        exchange_tz: Option<String>,

        #[arg(long)]
        workers: Option<usize>,

        #[arg(long, value_enum)]
        on_failure: Option<FailureArg>,
    },
}

/// Rollover settings; each flag overrides the config file.
#[derive(clap::Args)]
struct RollOverrides {
    /// TOML pipeline config.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    asset: Option<String>,

    #[arg(long)]
    window_days: Option<u32>,

    #[arg(long)]
    consecutive_days: Option<u32>,

    #[arg(long)]
    fallback_days: Option<u32>,

    /// Fix the decade instead of inferring it from the data (e.g. 2020).
    #[arg(long)]
    decade_start: Option<i32>,

    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Write manifest.json beside the output.
    #[arg(long, default_value_t = false)]
    manifest: bool,
}

impl RollOverrides {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut cfg = match (&self.config, &self.asset) {
            (Some(path), _) => PipelineConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            (None, Some(asset)) => PipelineConfig::for_asset(asset.clone()),
            (None, None) => bail!("one of --config or --asset is required"),
        };

        if let Some(asset) = self.asset {
            cfg.rollover.asset_root = asset;
        }
        if let Some(days) = self.window_days {
            cfg.rollover.rollover_window_days = days;
        }
        if let Some(days) = self.consecutive_days {
            cfg.rollover.consecutive_days_threshold = days;
        }
        if let Some(days) = self.fallback_days {
            cfg.rollover.fallback_offset_days = days;
        }
        if let Some(decade_start) = self.decade_start {
            cfg.rollover.decade = DecadePolicy::Fixed { decade_start };
        }
        if let Some(format) = self.format {
            cfg.output.format = Some(format.into());
        }
        if self.manifest {
            cfg.output.manifest = true;
        }
        Ok(cfg)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Sanitize {
            inputs,
            asset,
            output,
            exchange_tz,
            workers,
            on_failure,
            format,
        } => {
            let ingest = IngestConfig {
                exchange_tz,
                max_workers: workers,
                on_failure: on_failure.into(),
            };
            let format = format.map_or_else(|| OutputFormat::from_path(&output), Into::into);
            let report = run_sanitize(&inputs, &output, &asset, &ingest, format)?;
            print_ingest(&report);
            println!("Output saved to: {}", output.display());
            Ok(())
        }
        Commands::Ticks {
            asset,
            input_dir,
            format,
            output,
            workers,
            on_failure,
        } => {
            let job = TickJob {
                asset_root: asset,
                input_dir,
                format: format.into(),
                output,
                max_workers: workers,
                on_failure: on_failure.into(),
            };
            let report = sanitize_ticks(&job)?;
            print_ticks(&report);
            Ok(())
        }
        Commands::Roll {
            input,
            output,
            overrides,
        } => {
            let cfg = overrides.into_config()?;
            cfg.validate()?;
            let summary = run_rollover(&input, &output, &cfg, &TracingObserver)?;
            print_summary(&summary);
            Ok(())
        }
        Commands::Run {
            inputs,
            output,
            overrides,
            exchange_tz,
            workers,
            on_failure,
        } => {
            let mut cfg = overrides.into_config()?;
            if let Some(tz) = exchange_tz {
                cfg.ingest.exchange_tz = tz;
            }
            if let Some(workers) = workers {
                cfg.ingest.max_workers = workers;
            }
            if let Some(policy) = on_failure {
                cfg.ingest.on_failure = policy.into();
            }
            let summary = run_all(&inputs, &output, &cfg, &TracingObserver)?;
            if let Some(report) = &summary.ingest {
                print_ingest(report);
            }
            print_summary(&summary);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_ingest(report: &IngestReport) {
    println!("Files read: {}", report.files_read);
    if report.spread_rows > 0 {
        println!("Removed {} spread data rows", report.spread_rows);
    }
    println!("Total bars: {}", report.kept_rows);
    if let Some((first, last)) = report.date_range {
        println!("Date range: {first} to {last}");
    }
    println!("Unique symbols: {}", report.symbols.join(", "));
    for failed in &report.failed {
        println!("SKIPPED {}: {}", failed.path.display(), failed.error);
    }
}

fn print_ticks(report: &TickReport) {
    for file in report.per_file.iter().filter(|f| f.ticks > 0) {
        println!("  {}: {} ticks", file.file, file.ticks);
    }
    for failed in &report.failed {
        println!("SKIPPED {}: {}", failed.path.display(), failed.error);
    }
    println!("Total ticks: {}", report.total_ticks);
    println!("Date range: {} to {}", report.first_ts, report.last_ts);
    println!("Output saved to: {}", report.output.display());
}

fn print_summary(summary: &RunSummary) {
    let rule = "=".repeat(60);

    println!("\nContract Expiry Schedule:");
    println!("{rule}");
    for contract in &summary.contracts {
        println!("{}: Expires {}", contract.symbol, contract.expiry);
    }
    println!("{rule}");

    println!("\nROLLOVER SCHEDULE:");
    println!("{rule}");
    for roll in &summary.rollovers {
        let method = match roll.method {
            contlab_core::RolloverMethod::Crossover { .. } => "volume crossover",
            contlab_core::RolloverMethod::Fallback => "fallback",
            contlab_core::RolloverMethod::Clamped { .. } => "clamped",
        };
        println!(
            "{} -> {} roll on {} ({method})",
            roll.from_symbol, roll.to_symbol, roll.rollover_date
        );
    }
    println!("{rule}");

    println!("\nSegments:");
    for seg in &summary.segments {
        match (seg.first_date, seg.last_date) {
            (Some(first), Some(last)) => println!(
                "{}: {first} to {last} ({} bars)",
                seg.segment.symbol, seg.bar_count
            ),
            _ => println!("{}: no bars", seg.segment.symbol),
        }
    }

    println!("\n{rule}");
    println!("Input rows: {}", summary.input_rows);
    println!("Output rows: {}", summary.output_rows);
    println!("Removed rows: {}", summary.removed_rows());
    println!("Output saved to: {}", summary.output.display());
    println!("BLAKE3: {}", summary.output_blake3);
    if let Some(manifest) = &summary.manifest {
        println!("Manifest: {}", manifest.display());
    }
    println!("{rule}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn roll_flags_override_defaults() {
        let cli = Cli::parse_from([
            "contlab",
            "roll",
            "--asset",
            "NQ",
            "--window-days",
            "10",
            "--decade-start",
            "2010",
            "--format",
            "parquet",
            "--manifest",
        ]);
        let Commands::Roll { overrides, .. } = cli.command else {
            panic!("expected roll");
        };
        let cfg = overrides.into_config().unwrap();
        assert_eq!(cfg.rollover.asset_root, "NQ");
        assert_eq!(cfg.rollover.rollover_window_days, 10);
        assert_eq!(cfg.rollover.consecutive_days_threshold, 2);
        assert_eq!(cfg.rollover.decade, DecadePolicy::Fixed { decade_start: 2010 });
        assert_eq!(cfg.output.format, Some(OutputFormat::Parquet));
        assert!(cfg.output.manifest);
    }

    #[test]
    fn roll_requires_config_or_asset() {
        let cli = Cli::parse_from(["contlab", "roll"]);
        let Commands::Roll { overrides, .. } = cli.command else {
            panic!("expected roll");
        };
        assert!(overrides.into_config().is_err());
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::parse_from(["contlab", "ticks", "--asset", "NQ", "-v"]);
        assert!(cli.verbose);
    }
}
