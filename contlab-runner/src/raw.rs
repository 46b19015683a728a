//! Vendor (Databento-style) CSV records and timestamp parsing.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from reading and filtering raw vendor files.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: malformed record {record}: {reason}")]
    Malformed {
        path: PathBuf,
        record: u64,
        reason: String,
    },

    #[error("{path}: record {record}: unparseable ts_event '{value}'")]
    BadTimestamp {
        path: PathBuf,
        record: u64,
        value: String,
    },

    #[error("no input files given")]
    NoInputs,

    #[error("all {count} input files failed")]
    AllSourcesFailed { count: usize },

    #[error("no {asset_root} rows found in the input")]
    NoRows { asset_root: String },

    #[error("failed to build worker pool: {0}")]
    Pool(String),

    #[error("failed to write {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

/// One OHLCV row from a vendor export. Extra columns are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawOhlcvRecord {
    pub ts_event: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub symbol: String,
}

/// One order-book event row from a vendor MBO/MBP export.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTickRecord {
    pub ts_event: String,
    pub action: String,
    pub side: String,
    #[serde(default)]
    pub depth: Option<i64>,
    pub price: Option<f64>,
    pub size: u64,
    pub sequence: u64,
    pub symbol: String,
}

/// Parse a vendor timestamp as UTC.
///
/// Accepts integer nanoseconds since the Unix epoch, RFC 3339 text, and
/// naive `YYYY-MM-DD HH:MM:SS[.f]` text (taken as UTC).
pub fn parse_utc_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.parse::<i64>().ok().map(DateTime::from_timestamp_nanos);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Keep rows for one asset root and split off calendar spreads.
#[derive(Debug, Clone)]
pub struct AssetFilter {
    root: String,
}

/// Outcome of filtering one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    Keep,
    OtherAsset,
    Spread,
}

impl AssetFilter {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn classify(&self, symbol: &str) -> FilterVerdict {
        if !symbol.starts_with(&self.root) {
            FilterVerdict::OtherAsset
        } else if symbol.contains('-') {
            FilterVerdict::Spread
        } else {
            FilterVerdict::Keep
        }
    }
}

pub(crate) fn open_csv(path: &Path) -> Result<csv::Reader<std::fs::File>, IngestError> {
    let file = std::fs::File::open(path).map_err(|source| IngestError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::Reader::from_reader(file))
}
