//! Raw vendor OHLCV files -> cleaned bar table.
//!
//! Per file: keep the asset's rows, drop calendar spreads, parse `ts_event`
//! as UTC and derive the exchange-local wall-clock time. Files are parsed in
//! a bounded pool, then merged and stably sorted by UTC timestamp.

use crate::config::{ConfigError, FailurePolicy, IngestConfig};
use crate::pool::{ingest_files, FailedSource};
use crate::raw::{open_csv, parse_utc_timestamp, AssetFilter, FilterVerdict, IngestError, RawOhlcvRecord};
use chrono::NaiveDate;
use chrono_tz::Tz;
use contlab_core::pipeline::date_range;
use contlab_core::Bar;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Bars and counters from one file.
#[derive(Debug, Default)]
pub struct FileBars {
    pub bars: Vec<Bar>,
    pub rows_read: usize,
    pub other_asset_rows: usize,
    pub spread_rows: usize,
}

/// Summary of a sanitize run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files_read: usize,
    pub rows_read: usize,
    pub other_asset_rows: usize,
    pub spread_rows: usize,
    pub kept_rows: usize,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub symbols: Vec<String>,
    /// Files skipped under the `warn` failure policy.
    pub failed: Vec<FailedSource>,
}

#[derive(Debug)]
pub struct Sanitized {
    pub bars: Vec<Bar>,
    pub report: IngestReport,
}

pub struct Sanitizer {
    filter: AssetFilter,
    tz: Tz,
    max_workers: usize,
    on_failure: FailurePolicy,
}

impl Sanitizer {
    pub fn new(asset_root: &str, ingest: &IngestConfig) -> Result<Self, ConfigError> {
        if asset_root.trim().is_empty() {
            return Err(ConfigError::Invalid("asset root must not be empty".into()));
        }
        Ok(Self {
            filter: AssetFilter::new(asset_root),
            tz: ingest.timezone()?,
            max_workers: ingest.max_workers,
            on_failure: ingest.on_failure,
        })
    }

    pub fn asset_root(&self) -> &str {
        self.filter.root()
    }

    /// Parse one vendor file. Any unreadable row fails the whole file.
    pub fn sanitize_file(&self, path: &Path) -> Result<FileBars, IngestError> {
        let mut reader = open_csv(path)?;
        let mut out = FileBars::default();

        for (i, record) in reader.deserialize::<RawOhlcvRecord>().enumerate() {
            let row = (i + 1) as u64;
            let record = record.map_err(|e| IngestError::Malformed {
                path: path.to_path_buf(),
                record: row,
                reason: e.to_string(),
            })?;
            out.rows_read += 1;

            match self.filter.classify(&record.symbol) {
                FilterVerdict::OtherAsset => {
                    out.other_asset_rows += 1;
                    continue;
                }
                FilterVerdict::Spread => {
                    out.spread_rows += 1;
                    continue;
                }
                FilterVerdict::Keep => {}
            }

            let ts_utc = parse_utc_timestamp(&record.ts_event).ok_or_else(|| {
                IngestError::BadTimestamp {
                    path: path.to_path_buf(),
                    record: row,
                    value: record.ts_event.clone(),
                }
            })?;

            out.bars.push(Bar {
                symbol: record.symbol,
                ts_exchange: ts_utc.with_timezone(&self.tz).naive_local(),
                ts_utc,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume,
            });
        }

        tracing::info!(
            path = %path.display(),
            rows = out.rows_read,
            kept = out.bars.len(),
            spreads = out.spread_rows,
            "parsed vendor file"
        );
        Ok(out)
    }

    /// Parse every file, merge, and sort by UTC timestamp.
    pub fn sanitize_files(&self, paths: &[PathBuf]) -> Result<Sanitized, IngestError> {
        let outcome = ingest_files(paths, self.max_workers, self.on_failure, |path| {
            self.sanitize_file(path)
        })?;

        let mut report = IngestReport {
            files_read: outcome.results.len(),
            failed: outcome.failed,
            ..IngestReport::default()
        };
        let mut bars = Vec::new();
        for (_, file) in outcome.results {
            report.rows_read += file.rows_read;
            report.other_asset_rows += file.other_asset_rows;
            report.spread_rows += file.spread_rows;
            bars.extend(file.bars);
        }

        if bars.is_empty() {
            return Err(IngestError::NoRows {
                asset_root: self.filter.root().to_string(),
            });
        }

        bars.sort_by_key(|b| b.ts_utc);

        report.kept_rows = bars.len();
        report.date_range = date_range(&bars);
        report.symbols = bars
            .iter()
            .map(|b| b.symbol.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();

        if report.spread_rows > 0 {
            tracing::info!(removed = report.spread_rows, "removed calendar-spread rows");
        }
        if !report.failed.is_empty() {
            tracing::warn!(
                failed = report.failed.len(),
                "sanitize completed with skipped files"
            );
        }

        Ok(Sanitized { bars, report })
    }
}
