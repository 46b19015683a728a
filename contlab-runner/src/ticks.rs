//! Tick-data sanitization: a directory of vendor MBO/MBP files -> one
//! time-ordered tick table for a single asset.

use crate::config::{FailurePolicy, OutputFormat};
use crate::pool::{ingest_files, FailedSource};
use crate::raw::{open_csv, parse_utc_timestamp, AssetFilter, FilterVerdict, IngestError, RawTickRecord};
use crate::table::tmp_path_for;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const TICK_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// One order-book event, reduced to the columns kept in the output.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub ts_event: DateTime<Utc>,
    pub action: String,
    pub side: String,
    pub depth: Option<i64>,
    pub price: Option<f64>,
    pub size: u64,
    pub sequence: u64,
}

#[derive(Serialize)]
struct TickRow<'a> {
    ts_event: String,
    action: &'a str,
    side: &'a str,
    depth: Option<i64>,
    price: Option<f64>,
    size: u64,
    sequence: u64,
}

/// Per-file tick counts, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickFileCount {
    pub file: String,
    pub ticks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub output: PathBuf,
    pub files_found: usize,
    pub per_file: Vec<TickFileCount>,
    pub total_ticks: usize,
    pub first_ts: DateTime<Utc>,
    pub last_ts: DateTime<Utc>,
    pub failed: Vec<FailedSource>,
}

/// Options for one tick sanitization run.
#[derive(Debug, Clone)]
pub struct TickJob {
    pub asset_root: String,
    pub input_dir: PathBuf,
    pub format: OutputFormat,
    /// Defaults to `{asset_lower}_ticks.{ext}` in the working directory.
    pub output: Option<PathBuf>,
    pub max_workers: usize,
    pub on_failure: FailurePolicy,
}

impl TickJob {
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_tick_output(&self.asset_root, self.format))
    }
}

pub fn default_tick_output(asset_root: &str, format: OutputFormat) -> PathBuf {
    PathBuf::from(format!(
        "{}_ticks.{}",
        asset_root.to_lowercase(),
        format.extension()
    ))
}

/// `*.csv` files directly inside `dir`, sorted by name.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let entries = fs::read_dir(dir).map_err(|source| IngestError::Open {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| IngestError::Open {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Filter one tick file to the asset's outright contracts.
pub fn read_tick_file(path: &Path, filter: &AssetFilter) -> Result<Vec<Tick>, IngestError> {
    let mut reader = open_csv(path)?;
    let mut ticks = Vec::new();
    for (i, record) in reader.deserialize::<RawTickRecord>().enumerate() {
        let row = (i + 1) as u64;
        let record = record.map_err(|e| IngestError::Malformed {
            path: path.to_path_buf(),
            record: row,
            reason: e.to_string(),
        })?;
        if filter.classify(&record.symbol) != FilterVerdict::Keep {
            continue;
        }
        let ts_event = parse_utc_timestamp(&record.ts_event).ok_or_else(|| {
            IngestError::BadTimestamp {
                path: path.to_path_buf(),
                record: row,
                value: record.ts_event.clone(),
            }
        })?;
        ticks.push(Tick {
            ts_event,
            action: record.action,
            side: record.side,
            depth: record.depth,
            price: record.price,
            size: record.size,
            sequence: record.sequence,
        });
    }
    Ok(ticks)
}

/// Sanitize every CSV in the job's input directory and write the merged table.
pub fn sanitize_ticks(job: &TickJob) -> Result<TickReport, IngestError> {
    let files = list_csv_files(&job.input_dir)?;
    tracing::info!(
        files = files.len(),
        workers = job.max_workers,
        dir = %job.input_dir.display(),
        "processing tick files"
    );

    let filter = AssetFilter::new(job.asset_root.clone());
    let outcome = ingest_files(&files, job.max_workers, job.on_failure, |path| {
        read_tick_file(path, &filter)
    })?;

    let mut per_file = Vec::with_capacity(outcome.results.len());
    let mut ticks = Vec::new();
    for (path, file_ticks) in outcome.results {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !file_ticks.is_empty() {
            tracing::info!(file = %file, ticks = file_ticks.len(), "tick file");
        }
        per_file.push(TickFileCount {
            file,
            ticks: file_ticks.len(),
        });
        ticks.extend(file_ticks);
    }

    let (Some(first), Some(last)) = (
        ticks.iter().map(|t| t.ts_event).min(),
        ticks.iter().map(|t| t.ts_event).max(),
    ) else {
        return Err(IngestError::NoRows {
            asset_root: job.asset_root.clone(),
        });
    };

    ticks.sort_by_key(|t| t.ts_event);

    let output = job.output_path();
    write_ticks(&output, &ticks, job.format)?;

    Ok(TickReport {
        output,
        files_found: files.len(),
        per_file,
        total_ticks: ticks.len(),
        first_ts: first,
        last_ts: last,
        failed: outcome.failed,
    })
}

/// Write ticks atomically in the requested format.
pub fn write_ticks(path: &Path, ticks: &[Tick], format: OutputFormat) -> Result<(), IngestError> {
    let tmp = tmp_path_for(path);
    let written = match format {
        OutputFormat::Csv => write_ticks_csv(&tmp, ticks),
        OutputFormat::Parquet => write_ticks_parquet(&tmp, ticks),
    };
    let result = written.and_then(|()| {
        fs::rename(&tmp, path).map_err(|e| e.to_string())
    });
    result.map_err(|reason| {
        let _ = fs::remove_file(&tmp);
        IngestError::Write {
            path: path.to_path_buf(),
            reason,
        }
    })
}

fn write_ticks_csv(path: &Path, ticks: &[Tick]) -> Result<(), String> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| e.to_string())?;
    for t in ticks {
        writer
            .serialize(TickRow {
                ts_event: t.ts_event.format(TICK_TIMESTAMP_FORMAT).to_string(),
                action: &t.action,
                side: &t.side,
                depth: t.depth,
                price: t.price,
                size: t.size,
                sequence: t.sequence,
            })
            .map_err(|e| e.to_string())?;
    }
    writer.flush().map_err(|e| e.to_string())
}

fn ticks_to_dataframe(ticks: &[Tick]) -> Result<DataFrame, String> {
    let nanos = ticks
        .iter()
        .map(|t| {
            t.ts_event.timestamp_nanos_opt().ok_or_else(|| {
                format!(
                    "ts_event {} (sequence {}) is outside the nanosecond range",
                    t.ts_event, t.sequence
                )
            })
        })
        .collect::<Result<Vec<i64>, String>>()?;
    tick_columns(ticks, nanos).map_err(|e| e.to_string())
}

fn tick_columns(ticks: &[Tick], nanos: Vec<i64>) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Column::new("ts_event".into(), nanos)
            .cast(&DataType::Datetime(TimeUnit::Nanoseconds, None))?,
        Column::new(
            "action".into(),
            ticks.iter().map(|t| t.action.clone()).collect::<Vec<String>>(),
        ),
        Column::new(
            "side".into(),
            ticks.iter().map(|t| t.side.clone()).collect::<Vec<String>>(),
        ),
        Column::new("depth".into(), ticks.iter().map(|t| t.depth).collect::<Vec<Option<i64>>>()),
        Column::new("price".into(), ticks.iter().map(|t| t.price).collect::<Vec<Option<f64>>>()),
        Column::new("size".into(), ticks.iter().map(|t| t.size).collect::<Vec<u64>>()),
        Column::new("sequence".into(), ticks.iter().map(|t| t.sequence).collect::<Vec<u64>>()),
    ])
}

fn write_ticks_parquet(path: &Path, ticks: &[Tick]) -> Result<(), String> {
    let mut df = ticks_to_dataframe(ticks)?;
    let file = fs::File::create(path).map_err(|e| e.to_string())?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .map_err(|e| e.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "ts_recv,ts_event,rtype,publisher_id,instrument_id,action,side,depth,price,size,flags,ts_in_delta,sequence,symbol\n";

    fn write_file(dir: &Path, name: &str, rows: &[&str]) {
        let mut body = HEADER.to_string();
        for row in rows {
            body.push_str(row);
            body.push('\n');
        }
        fs::write(dir.join(name), body).unwrap();
    }

    fn job(input_dir: &Path, output: PathBuf, format: OutputFormat) -> TickJob {
        TickJob {
            asset_root: "NQ".into(),
            input_dir: input_dir.to_path_buf(),
            format,
            output: Some(output),
            max_workers: 2,
            on_failure: FailurePolicy::Abort,
        }
    }

    fn fixture(dir: &Path) {
        write_file(
            dir,
            "b.csv",
            &[
                "x,2025-03-03T14:30:00.000002Z,10,1,1,A,B,0,21000.25,2,0,0,7,NQH5",
                "x,2025-03-03T14:30:00.000001Z,10,1,1,T,A,0,21000.50,1,0,0,6,NQH5",
            ],
        );
        write_file(
            dir,
            "a.csv",
            &[
                "x,2025-03-03T14:29:59.500000Z,10,1,1,C,N,,,0,0,0,5,NQH5",
                "x,2025-03-03T14:30:00.000000Z,10,1,1,A,B,0,5.5,3,0,0,4,NQH5-NQM5",
                "x,2025-03-03T14:30:00.000000Z,10,1,1,A,B,0,5800.0,3,0,0,3,ESH5",
            ],
        );
        fs::write(dir.join("notes.txt"), "ignored").unwrap();
    }

    #[test]
    fn default_output_name_uses_lowercase_asset() {
        assert_eq!(
            default_tick_output("NQ", OutputFormat::Parquet),
            PathBuf::from("nq_ticks.parquet")
        );
        assert_eq!(
            default_tick_output("MES", OutputFormat::Csv),
            PathBuf::from("mes_ticks.csv")
        );
    }

    #[test]
    fn lists_only_csv_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path());
        let files = list_csv_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn merges_filters_and_sorts_to_csv() {
        let input = tempfile::tempdir().unwrap();
        fixture(input.path());
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("nq_ticks.csv");

        let report = sanitize_ticks(&job(input.path(), output.clone(), OutputFormat::Csv)).unwrap();
        assert_eq!(report.files_found, 2);
        assert_eq!(report.total_ticks, 3);
        assert_eq!(
            report.per_file,
            vec![
                TickFileCount { file: "a.csv".into(), ticks: 1 },
                TickFileCount { file: "b.csv".into(), ticks: 2 },
            ]
        );

        let text = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ts_event,action,side,depth,price,size,sequence");
        assert_eq!(lines[1], "2025-03-03 14:29:59.500000,C,N,,,0,5");
        assert_eq!(lines[2], "2025-03-03 14:30:00.000001,T,A,0,21000.5,1,6");
        assert_eq!(lines[3], "2025-03-03 14:30:00.000002,A,B,0,21000.25,2,7");
    }

    #[test]
    fn writes_parquet() {
        let input = tempfile::tempdir().unwrap();
        fixture(input.path());
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("ticks.parquet");

        sanitize_ticks(&job(input.path(), output.clone(), OutputFormat::Parquet)).unwrap();

        let df = ParquetReader::new(fs::File::open(&output).unwrap())
            .finish()
            .unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(
            df.get_column_names_str(),
            vec!["ts_event", "action", "side", "depth", "price", "size", "sequence"]
        );
    }

    #[test]
    fn parquet_rejects_timestamps_past_nanosecond_range() {
        use chrono::TimeZone;

        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("far.parquet");
        let ticks = vec![Tick {
            ts_event: Utc.with_ymd_and_hms(2300, 1, 2, 14, 30, 0).unwrap(),
            action: "A".into(),
            side: "B".into(),
            depth: Some(0),
            price: Some(100.0),
            size: 1,
            sequence: 7,
        }];

        let err = write_ticks(&output, &ticks, OutputFormat::Parquet).unwrap_err();
        assert!(matches!(err, IngestError::Write { .. }));
        assert!(err.to_string().contains("sequence 7"));
        assert!(!output.exists());
        assert!(!tmp_path_for(&output).exists());
    }

    #[test]
    fn no_matching_ticks_is_an_error() {
        let input = tempfile::tempdir().unwrap();
        write_file(
            input.path(),
            "es.csv",
            &["x,2025-03-03T14:30:00Z,10,1,1,A,B,0,5800.0,3,0,0,3,ESH5"],
        );
        let out_dir = tempfile::tempdir().unwrap();
        let output = out_dir.path().join("nq_ticks.csv");

        let err = sanitize_ticks(&job(input.path(), output.clone(), OutputFormat::Csv)).unwrap_err();
        assert!(matches!(err, IngestError::NoRows { .. }));
        assert!(!output.exists());
    }

    #[test]
    fn empty_directory_has_no_inputs() {
        let input = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let err = sanitize_ticks(&job(
            input.path(),
            out_dir.path().join("x.csv"),
            OutputFormat::Csv,
        ))
        .unwrap_err();
        assert!(matches!(err, IngestError::NoInputs));
    }
}
