//! Pipeline configuration loaded from TOML.
//!
//! ```toml
//! [rollover]
//! asset_root = "ES"
//! rollover_window_days = 14
//! consecutive_days_threshold = 2
//! fallback_offset_days = 3
//! decade = "from_data"
//!
//! [ingest]
//! exchange_tz = "America/New_York"
//! max_workers = 8
//! on_failure = "warn"
//!
//! [output]
//! format = "parquet"
//! manifest = true
//! ```

use chrono_tz::Tz;
use contlab_core::RolloverConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown exchange timezone '{0}'")]
    UnknownTimezone(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// What to do when one input file cannot be ingested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run on the first failed file.
    #[default]
    Abort,
    /// Skip the file, log it, and list it in the ingest report.
    Warn,
}

/// Table format for cleaned and continuous outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }

    /// Infer the format from a file extension; anything but `.parquet` is CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => OutputFormat::Parquet,
            _ => OutputFormat::Csv,
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "parquet" => Ok(OutputFormat::Parquet),
            other => Err(ConfigError::Invalid(format!(
                "unknown output format '{other}' (expected csv or parquet)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// IANA name of the exchange timezone used for trading dates.
    #[serde(default = "default_exchange_tz")]
    pub exchange_tz: String,

    /// Upper bound on concurrently parsed files.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default)]
    pub on_failure: FailurePolicy,
}

fn default_exchange_tz() -> String {
    "America/New_York".to_string()
}

fn default_max_workers() -> usize {
    8
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            exchange_tz: default_exchange_tz(),
            max_workers: default_max_workers(),
            on_failure: FailurePolicy::default(),
        }
    }
}

impl IngestConfig {
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.exchange_tz
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.exchange_tz.clone()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Explicit format; inferred from the output path when absent.
    #[serde(default)]
    pub format: Option<OutputFormat>,

    /// Write `manifest.json` next to the continuous series.
    #[serde(default)]
    pub manifest: bool,
}

impl OutputConfig {
    pub fn format_for(&self, path: &Path) -> OutputFormat {
        self.format.unwrap_or_else(|| OutputFormat::from_path(path))
    }
}

/// Complete configuration for `sanitize` + `roll`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub rollover: RolloverConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl PipelineConfig {
    pub fn for_asset(asset_root: impl Into<String>) -> Self {
        Self {
            rollover: RolloverConfig::for_asset(asset_root),
            ingest: IngestConfig::default(),
            output: OutputConfig::default(),
        }
    }

    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rollover
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.ingest.max_workers == 0 {
            return Err(ConfigError::Invalid("max_workers must be at least 1".into()));
        }
        self.ingest.timezone()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contlab_core::DecadePolicy;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = PipelineConfig::from_toml("[rollover]\nasset_root = \"NQ\"\n").unwrap();
        assert_eq!(cfg.rollover.asset_root, "NQ");
        assert_eq!(cfg.rollover.rollover_window_days, 14);
        assert_eq!(cfg.ingest.exchange_tz, "America/New_York");
        assert_eq!(cfg.ingest.max_workers, 8);
        assert_eq!(cfg.ingest.on_failure, FailurePolicy::Abort);
        assert_eq!(cfg.output.format, None);
        assert!(!cfg.output.manifest);
    }

    #[test]
    fn full_config_parses() {
        let toml = r#"
            [rollover]
            asset_root = "ES"
            rollover_window_days = 10
            consecutive_days_threshold = 3
            fallback_offset_days = 5
            decade = { fixed = { decade_start = 2020 } }

            [ingest]
            exchange_tz = "America/Chicago"
            max_workers = 2
            on_failure = "warn"

            [output]
            format = "parquet"
            manifest = true
        "#;
        let cfg = PipelineConfig::from_toml(toml).unwrap();
        assert_eq!(cfg.rollover.consecutive_days_threshold, 3);
        assert_eq!(cfg.rollover.decade, DecadePolicy::Fixed { decade_start: 2020 });
        assert_eq!(cfg.ingest.timezone().unwrap(), chrono_tz::America::Chicago);
        assert_eq!(cfg.ingest.on_failure, FailurePolicy::Warn);
        assert_eq!(cfg.output.format, Some(OutputFormat::Parquet));
        assert!(cfg.output.manifest);
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let toml = "[rollover]\nasset_root = \"ES\"\n[ingest]\nexchange_tz = \"Mars/Olympus\"\n";
        assert!(matches!(
            PipelineConfig::from_toml(toml),
            Err(ConfigError::UnknownTimezone(tz)) if tz == "Mars/Olympus"
        ));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let toml = "[rollover]\nasset_root = \"ES\"\n[ingest]\nmax_workers = 0\n";
        assert!(matches!(
            PipelineConfig::from_toml(toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn invalid_rollover_section_is_rejected() {
        let toml = "[rollover]\nasset_root = \"ES\"\nconsecutive_days_threshold = 0\n";
        assert!(PipelineConfig::from_toml(toml).is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/contlab.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/contlab.toml"));
    }

    #[test]
    fn format_inferred_from_extension() {
        let out = OutputConfig::default();
        assert_eq!(out.format_for(Path::new("a/b.parquet")), OutputFormat::Parquet);
        assert_eq!(out.format_for(Path::new("a/b.csv")), OutputFormat::Csv);
        assert_eq!(out.format_for(Path::new("a/b")), OutputFormat::Csv);

        let forced = OutputConfig {
            format: Some(OutputFormat::Parquet),
            manifest: false,
        };
        assert_eq!(forced.format_for(Path::new("x.csv")), OutputFormat::Parquet);
        assert_eq!("PARQUET".parse::<OutputFormat>().unwrap(), OutputFormat::Parquet);
        assert!("xlsx".parse::<OutputFormat>().is_err());
    }
}
