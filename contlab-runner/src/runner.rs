//! Pipeline orchestration: sanitize, roll, or both.

use crate::config::{ConfigError, IngestConfig, OutputFormat, PipelineConfig};
use crate::export::{hash_file, manifest_path_for, write_manifest, RunManifest};
use crate::raw::IngestError;
use crate::sanitize::{IngestReport, Sanitizer};
use crate::table::{read_bars, write_bars, TableError};
use contlab_core::pipeline::date_range;
use contlab_core::{
    build_continuous_series, Bar, Contract, RollError, RollObserver, RolloverEvent, SegmentStats,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Roll(#[from] RollError),

    #[error("manifest: {0:#}")]
    Manifest(anyhow::Error),
}

/// What a rollover run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output: PathBuf,
    pub format: OutputFormat,
    pub input_rows: usize,
    pub output_rows: usize,
    pub contracts: Vec<Contract>,
    pub rollovers: Vec<RolloverEvent>,
    pub segments: Vec<SegmentStats>,
    pub output_blake3: String,
    pub manifest: Option<PathBuf>,
    /// Present when the run started from raw vendor files.
    pub ingest: Option<IngestReport>,
}

impl RunSummary {
    pub fn removed_rows(&self) -> usize {
        self.input_rows.saturating_sub(self.output_rows)
    }
}

/// Raw vendor files -> cleaned bar table on disk.
pub fn run_sanitize(
    inputs: &[PathBuf],
    output: &Path,
    asset_root: &str,
    ingest: &IngestConfig,
    format: OutputFormat,
) -> Result<IngestReport, RunError> {
    let sanitizer = Sanitizer::new(asset_root, ingest)?;
    let sanitized = sanitizer.sanitize_files(inputs)?;
    write_bars(output, &sanitized.bars, format)?;
    tracing::info!(
        output = %output.display(),
        bars = sanitized.report.kept_rows,
        "cleaned table written"
    );
    Ok(sanitized.report)
}

/// Cleaned bar table -> continuous series on disk.
///
/// The input format follows the input file's extension; the output format
/// follows `config.output`.
pub fn run_rollover(
    input: &Path,
    output: &Path,
    config: &PipelineConfig,
    observer: &dyn RollObserver,
) -> Result<RunSummary, RunError> {
    let bars = read_bars(input, OutputFormat::from_path(input))?;
    tracing::info!(input = %input.display(), rows = bars.len(), "loaded cleaned table");
    roll_bars(&bars, &[input.to_path_buf()], output, config, observer)
}

/// Raw vendor files -> continuous series, without an intermediate file.
pub fn run_all(
    inputs: &[PathBuf],
    output: &Path,
    config: &PipelineConfig,
    observer: &dyn RollObserver,
) -> Result<RunSummary, RunError> {
    config.validate()?;
    let sanitizer = Sanitizer::new(&config.rollover.asset_root, &config.ingest)?;
    let sanitized = sanitizer.sanitize_files(inputs)?;

    let mut summary = roll_bars(&sanitized.bars, inputs, output, config, observer)?;
    summary.ingest = Some(sanitized.report);
    Ok(summary)
}

fn roll_bars(
    bars: &[Bar],
    inputs: &[PathBuf],
    output: &Path,
    config: &PipelineConfig,
    observer: &dyn RollObserver,
) -> Result<RunSummary, RunError> {
    let series = build_continuous_series(bars, &config.rollover, observer)?;

    let format = config.output.format_for(output);
    write_bars(output, &series.bars, format)?;
    let output_blake3 = hash_file(output).map_err(RunError::Manifest)?;

    let manifest = if config.output.manifest {
        let path = manifest_path_for(output);
        let manifest = RunManifest::new(
            &config.rollover,
            inputs,
            output,
            format,
            bars.len(),
            date_range(bars),
            &series,
            output_blake3.clone(),
        );
        write_manifest(&path, &manifest).map_err(RunError::Manifest)?;
        Some(path)
    } else {
        None
    };

    tracing::info!(
        input_rows = bars.len(),
        output_rows = series.bars.len(),
        removed_rows = bars.len().saturating_sub(series.bars.len()),
        output = %output.display(),
        "continuous series written"
    );

    Ok(RunSummary {
        output: output.to_path_buf(),
        format,
        input_rows: bars.len(),
        output_rows: series.bars.len(),
        contracts: series.contracts,
        rollovers: series.rollovers,
        segments: series.segments,
        output_blake3,
        manifest,
        ingest: None,
    })
}
