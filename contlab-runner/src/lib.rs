//! ContLab Runner — ingestion, table I/O and pipeline orchestration.
//!
//! This crate builds on `contlab-core` to provide:
//! - Vendor CSV parsing with asset/spread filtering and timezone conversion
//! - Bounded parallel file ingestion with an abort/warn failure policy
//! - Cleaned-table and continuous-series I/O (CSV and Parquet)
//! - Tick-data sanitization
//! - Pipeline runner with a JSON run manifest
//! - A `tracing` observer for engine events

pub mod config;
pub mod export;
pub mod observer;
pub mod pool;
pub mod raw;
pub mod runner;
pub mod sanitize;
pub mod table;
pub mod ticks;

pub use config::{ConfigError, FailurePolicy, IngestConfig, OutputConfig, OutputFormat, PipelineConfig};
pub use export::{hash_file, read_manifest, RunManifest};
pub use observer::TracingObserver;
pub use pool::FailedSource;
pub use raw::{parse_utc_timestamp, AssetFilter, IngestError};
pub use runner::{run_all, run_rollover, run_sanitize, RunError, RunSummary};
pub use sanitize::{IngestReport, Sanitized, Sanitizer};
pub use table::{read_bars, write_bars, TableError};
pub use ticks::{default_tick_output, sanitize_ticks, TickJob, TickReport};
