//! Run manifest export (JSON) and output hashing.
//!
//! The manifest carries no wall-clock fields, so two runs over the same input
//! and config produce byte-identical manifests.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use contlab_core::{ContinuousSeries, Contract, RolloverConfig, RolloverEvent, SegmentStats};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::OutputFormat;

pub const MANIFEST_SCHEMA_VERSION: u32 = 1;
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub config: RolloverConfig,
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub input_rows: usize,
    pub output_rows: usize,
    pub removed_rows: usize,
    pub input_date_range: Option<(NaiveDate, NaiveDate)>,
    pub output_date_range: Option<(NaiveDate, NaiveDate)>,
    pub expiry_schedule: Vec<Contract>,
    pub rollovers: Vec<RolloverEvent>,
    pub segments: Vec<SegmentStats>,
    /// BLAKE3 of the written output file, hex-encoded.
    pub output_blake3: String,
}

impl RunManifest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &RolloverConfig,
        inputs: &[PathBuf],
        output: &Path,
        format: OutputFormat,
        input_rows: usize,
        input_date_range: Option<(NaiveDate, NaiveDate)>,
        series: &ContinuousSeries,
        output_blake3: String,
    ) -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION,
            config: config.clone(),
            inputs: inputs.to_vec(),
            output: output.to_path_buf(),
            format,
            input_rows,
            output_rows: series.bars.len(),
            removed_rows: input_rows.saturating_sub(series.bars.len()),
            input_date_range,
            output_date_range: series.date_range(),
            expiry_schedule: series.contracts.clone(),
            rollovers: series.rollovers.clone(),
            segments: series.segments.clone(),
            output_blake3,
        }
    }
}

/// `manifest.json` in the output file's directory.
pub fn manifest_path_for(output: &Path) -> PathBuf {
    output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from(MANIFEST_FILE_NAME), |p| p.join(MANIFEST_FILE_NAME))
}

/// BLAKE3 hash of a file's contents.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file =
        fs::File::open(path).with_context(|| format!("failed to open {} for hashing", path.display()))?;
    let mut hasher = blake3::Hasher::new();
    std::io::copy(&mut file, &mut hasher)
        .with_context(|| format!("failed to hash {}", path.display()))?;
    Ok(hasher.finalize().to_hex().to_string())
}

pub fn write_manifest(path: &Path, manifest: &RunManifest) -> Result<()> {
    let json =
        serde_json::to_string_pretty(manifest).context("failed to serialize run manifest")?;
    fs::write(path, json)
        .with_context(|| format!("failed to write manifest to {}", path.display()))?;
    Ok(())
}

/// Load a manifest, rejecting unknown schema versions.
pub fn read_manifest(path: &Path) -> Result<RunManifest> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let manifest: RunManifest =
        serde_json::from_str(&json).context("failed to deserialize run manifest")?;
    if manifest.schema_version > MANIFEST_SCHEMA_VERSION {
        bail!(
            "unsupported manifest schema version {} (max supported: {})",
            manifest.schema_version,
            MANIFEST_SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_lives_beside_output() {
        assert_eq!(
            manifest_path_for(Path::new("out/continuous.csv")),
            PathBuf::from("out/manifest.json")
        );
        assert_eq!(
            manifest_path_for(Path::new("continuous.csv")),
            PathBuf::from("manifest.json")
        );
    }

    #[test]
    fn file_hash_is_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        fs::write(&a, "same").unwrap();
        fs::write(&b, "same").unwrap();
        assert_eq!(hash_file(&a).unwrap(), hash_file(&b).unwrap());

        fs::write(&b, "different").unwrap();
        assert_ne!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
        assert_eq!(hash_file(&a).unwrap(), blake3::hash(b"same").to_hex().to_string());
    }

    #[test]
    fn newer_schema_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let manifest = RunManifest {
            schema_version: MANIFEST_SCHEMA_VERSION + 1,
            config: RolloverConfig::for_asset("ES"),
            inputs: vec!["in.csv".into()],
            output: "out.csv".into(),
            format: OutputFormat::Csv,
            input_rows: 0,
            output_rows: 0,
            removed_rows: 0,
            input_date_range: None,
            output_date_range: None,
            expiry_schedule: vec![],
            rollovers: vec![],
            segments: vec![],
            output_blake3: String::new(),
        };
        write_manifest(&path, &manifest).unwrap();
        assert!(read_manifest(&path).is_err());
    }
}
