//! Cleaned bar table I/O (CSV and Parquet).
//!
//! Column layout, shared by both formats:
//! `DateTime_ET, Open, High, Low, Close, Volume, DateTime_UTC, Symbol`.
//! In CSV the timestamps are `%Y-%m-%d %H:%M:%S` text; in Parquet they are
//! microsecond `Datetime` columns.
//!
//! Writes are atomic: write to `.tmp` then rename into place.

use crate::config::OutputFormat;
use crate::raw::parse_utc_timestamp;
use chrono::{DateTime, NaiveDateTime, Utc};
use contlab_core::Bar;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Parquet error in {path}: {reason}")]
    Parquet { path: PathBuf, reason: String },

    #[error("{path}: row {row}: unparseable {column} '{value}'")]
    BadTimestamp {
        path: PathBuf,
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("{path}: row {row}: null {column}")]
    NullValue {
        path: PathBuf,
        row: usize,
        column: &'static str,
    },

    #[error("{path}: missing column '{column}'")]
    MissingColumn { path: PathBuf, column: &'static str },
}

/// One row of the cleaned CSV table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarRow {
    #[serde(rename = "DateTime_ET")]
    pub datetime_exchange: String,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: u64,
    #[serde(rename = "DateTime_UTC")]
    pub datetime_utc: String,
    #[serde(rename = "Symbol")]
    pub symbol: String,
}

impl From<&Bar> for BarRow {
    fn from(bar: &Bar) -> Self {
        Self {
            datetime_exchange: bar.ts_exchange.format(TIMESTAMP_FORMAT).to_string(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            datetime_utc: bar.ts_utc.format(TIMESTAMP_FORMAT).to_string(),
            symbol: bar.symbol.clone(),
        }
    }
}

impl BarRow {
    /// Convert to a [`Bar`]; `row` is 1-based and only used for errors.
    pub fn into_bar(self, path: &Path, row: usize) -> Result<Bar, TableError> {
        let ts_utc = parse_utc_timestamp(&self.datetime_utc).ok_or_else(|| {
            TableError::BadTimestamp {
                path: path.to_path_buf(),
                row,
                column: "DateTime_UTC",
                value: self.datetime_utc.clone(),
            }
        })?;
        let ts_exchange = parse_exchange_timestamp(&self.datetime_exchange).ok_or_else(|| {
            TableError::BadTimestamp {
                path: path.to_path_buf(),
                row,
                column: "DateTime_ET",
                value: self.datetime_exchange.clone(),
            }
        })?;
        Ok(Bar {
            symbol: self.symbol,
            ts_exchange,
            ts_utc,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        })
    }
}

/// Exchange-local wall-clock time. An explicit offset, if present, is dropped.
fn parse_exchange_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_local());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Read a cleaned bar table.
pub fn read_bars(path: &Path, format: OutputFormat) -> Result<Vec<Bar>, TableError> {
    match format {
        OutputFormat::Csv => read_csv(path),
        OutputFormat::Parquet => read_parquet(path),
    }
}

/// Write a bar table; the file is replaced atomically.
pub fn write_bars(path: &Path, bars: &[Bar], format: OutputFormat) -> Result<(), TableError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| TableError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let tmp_path = tmp_path_for(path);
    let written = match format {
        OutputFormat::Csv => write_csv(&tmp_path, bars),
        OutputFormat::Parquet => write_parquet(&tmp_path, bars),
    };
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    fs::rename(&tmp_path, path).map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        TableError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

pub(crate) fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn read_csv(path: &Path) -> Result<Vec<Bar>, TableError> {
    let csv_err = |source| TableError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let mut bars = Vec::new();
    for (i, row) in reader.deserialize::<BarRow>().enumerate() {
        let row = row.map_err(csv_err)?;
        bars.push(row.into_bar(path, i + 1)?);
    }
    Ok(bars)
}

fn write_csv(path: &Path, bars: &[Bar]) -> Result<(), TableError> {
    let csv_err = |source| TableError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for bar in bars {
        writer.serialize(BarRow::from(bar)).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn bars_to_dataframe(bars: &[Bar]) -> PolarsResult<DataFrame> {
    let micros = DataType::Datetime(TimeUnit::Microseconds, None);
    let exchange: Vec<i64> = bars
        .iter()
        .map(|b| b.ts_exchange.and_utc().timestamp_micros())
        .collect();
    let utc: Vec<i64> = bars.iter().map(|b| b.ts_utc.timestamp_micros()).collect();

    DataFrame::new(vec![
        Column::new("DateTime_ET".into(), exchange).cast(&micros)?,
        Column::new("Open".into(), bars.iter().map(|b| b.open).collect::<Vec<f64>>()),
        Column::new("High".into(), bars.iter().map(|b| b.high).collect::<Vec<f64>>()),
        Column::new("Low".into(), bars.iter().map(|b| b.low).collect::<Vec<f64>>()),
        Column::new("Close".into(), bars.iter().map(|b| b.close).collect::<Vec<f64>>()),
        Column::new("Volume".into(), bars.iter().map(|b| b.volume).collect::<Vec<u64>>()),
        Column::new("DateTime_UTC".into(), utc).cast(&micros)?,
        Column::new(
            "Symbol".into(),
            bars.iter().map(|b| b.symbol.clone()).collect::<Vec<String>>(),
        ),
    ])
}

fn write_parquet(path: &Path, bars: &[Bar]) -> Result<(), TableError> {
    let pq_err = |e: PolarsError| TableError::Parquet {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    let mut df = bars_to_dataframe(bars).map_err(pq_err)?;
    let file = fs::File::create(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ParquetWriter::new(file).finish(&mut df).map_err(pq_err)?;
    Ok(())
}

fn read_parquet(path: &Path) -> Result<Vec<Bar>, TableError> {
    let pq_err = |e: PolarsError| TableError::Parquet {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    let file = fs::File::open(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let df = ParquetReader::new(file).finish().map_err(pq_err)?;

    let column = |name: &'static str| {
        df.column(name).map_err(|_| TableError::MissingColumn {
            path: path.to_path_buf(),
            column: name,
        })
    };
    let micros = DataType::Datetime(TimeUnit::Microseconds, None);
    let exchange = column("DateTime_ET")?
        .cast(&micros)
        .and_then(|c| c.cast(&DataType::Int64))
        .map_err(pq_err)?;
    let utc = column("DateTime_UTC")?
        .cast(&micros)
        .and_then(|c| c.cast(&DataType::Int64))
        .map_err(pq_err)?;
    let open = column("Open")?.cast(&DataType::Float64).map_err(pq_err)?;
    let high = column("High")?.cast(&DataType::Float64).map_err(pq_err)?;
    let low = column("Low")?.cast(&DataType::Float64).map_err(pq_err)?;
    let close = column("Close")?.cast(&DataType::Float64).map_err(pq_err)?;
    let volume = column("Volume")?.cast(&DataType::UInt64).map_err(pq_err)?;
    let symbol = column("Symbol")?;

    let exchange_ca = exchange.i64().map_err(pq_err)?;
    let utc_ca = utc.i64().map_err(pq_err)?;
    let open_ca = open.f64().map_err(pq_err)?;
    let high_ca = high.f64().map_err(pq_err)?;
    let low_ca = low.f64().map_err(pq_err)?;
    let close_ca = close.f64().map_err(pq_err)?;
    let vol_ca = volume.u64().map_err(pq_err)?;
    let sym_ca = symbol.str().map_err(pq_err)?;

    let bad = |row: usize, column: &'static str, value: Option<i64>| TableError::BadTimestamp {
        path: path.to_path_buf(),
        row,
        column,
        value: value.map_or_else(|| "null".to_string(), |v| v.to_string()),
    };

    let n = df.height();
    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let raw_utc = utc_ca.get(i);
        let ts_utc = raw_utc
            .and_then(DateTime::<Utc>::from_timestamp_micros)
            .ok_or_else(|| bad(i + 1, "DateTime_UTC", raw_utc))?;
        let raw_exchange = exchange_ca.get(i);
        let ts_exchange = raw_exchange
            .and_then(DateTime::<Utc>::from_timestamp_micros)
            .map(|t| t.naive_utc())
            .ok_or_else(|| bad(i + 1, "DateTime_ET", raw_exchange))?;

        let row = i + 1;
        bars.push(Bar {
            symbol: non_null(sym_ca.get(i), path, row, "Symbol")?.to_string(),
            ts_exchange,
            ts_utc,
            open: non_null(open_ca.get(i), path, row, "Open")?,
            high: non_null(high_ca.get(i), path, row, "High")?,
            low: non_null(low_ca.get(i), path, row, "Low")?,
            close: non_null(close_ca.get(i), path, row, "Close")?,
            volume: non_null(vol_ca.get(i), path, row, "Volume")?,
        });
    }
    Ok(bars)
}

fn non_null<T>(
    value: Option<T>,
    path: &Path,
    row: usize,
    column: &'static str,
) -> Result<T, TableError> {
    value.ok_or_else(|| TableError::NullValue {
        path: path.to_path_buf(),
        row,
        column,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn sample_bars() -> Vec<Bar> {
        let ts = NaiveDate::from_ymd_opt(2020, 12, 10)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        vec![
            Bar {
                symbol: "ESZ0".into(),
                ts_exchange: ts,
                ts_utc: Utc.with_ymd_and_hms(2020, 12, 10, 14, 30, 0).unwrap(),
                open: 3660.25,
                high: 3665.0,
                low: 3658.5,
                close: 3662.75,
                volume: 1234,
            },
            Bar {
                symbol: "ESH1".into(),
                ts_exchange: ts + chrono::Duration::minutes(1),
                ts_utc: Utc.with_ymd_and_hms(2020, 12, 10, 14, 31, 0).unwrap(),
                open: 3650.0,
                high: 3651.0,
                low: 3649.25,
                close: 3650.5,
                volume: 99,
            },
        ]
    }

    #[test]
    fn csv_write_uses_cleaned_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_bars(&path, &sample_bars(), OutputFormat::Csv).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "DateTime_ET,Open,High,Low,Close,Volume,DateTime_UTC,Symbol"
        );
        assert_eq!(
            lines.next().unwrap(),
            "2020-12-10 09:30:00,3660.25,3665.0,3658.5,3662.75,1234,2020-12-10 14:30:00,ESZ0"
        );
        assert!(!tmp_path_for(&path).exists());
    }

    #[test]
    fn csv_read_restores_bars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bars.csv");
        write_bars(&path, &sample_bars(), OutputFormat::Csv).unwrap();
        assert_eq!(read_bars(&path, OutputFormat::Csv).unwrap(), sample_bars());
    }

    #[test]
    fn parquet_read_restores_bars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bars.parquet");
        write_bars(&path, &sample_bars(), OutputFormat::Parquet).unwrap();
        assert_eq!(read_bars(&path, OutputFormat::Parquet).unwrap(), sample_bars());
    }

    #[test]
    fn parquet_null_volume_names_row_and_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nulls.parquet");
        let mut df = bars_to_dataframe(&sample_bars()).unwrap();
        df.with_column(Column::new("Volume".into(), vec![Some(1234u64), None]))
            .unwrap();
        ParquetWriter::new(fs::File::create(&path).unwrap())
            .finish(&mut df)
            .unwrap();

        match read_bars(&path, OutputFormat::Parquet).unwrap_err() {
            TableError::NullValue { row, column, .. } => {
                assert_eq!(row, 2);
                assert_eq!(column, "Volume");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_timestamp_names_row_and_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(
            &path,
            "DateTime_ET,Open,High,Low,Close,Volume,DateTime_UTC,Symbol\n\
             2020-12-10 09:30:00,1,1,1,1,1,2020-12-10 14:30:00,ESZ0\n\
             2020-12-10 09:31:00,1,1,1,1,1,not-a-time,ESZ0\n",
        )
        .unwrap();

        let err = read_bars(&path, OutputFormat::Csv).unwrap_err();
        match err {
            TableError::BadTimestamp { row, column, .. } => {
                assert_eq!(row, 2);
                assert_eq!(column, "DateTime_UTC");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_utc_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_utc.csv");
        fs::write(
            &path,
            "DateTime_ET,Open,High,Low,Close,Volume,Symbol\n\
             2020-12-10 09:30:00,1,1,1,1,1,ESZ0\n",
        )
        .unwrap();
        assert!(matches!(
            read_bars(&path, OutputFormat::Csv),
            Err(TableError::Csv { .. })
        ));
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.csv");
        write_bars(&path, &sample_bars(), OutputFormat::Csv).unwrap();
        assert!(path.exists());
    }
}
