//! Bounded parallel file ingestion.
//!
//! Each worker owns one file exclusively; nothing is shared between workers.
//! Results are collected in input-path order once every worker has finished,
//! then the failure policy is applied.

use crate::config::FailurePolicy;
use crate::raw::IngestError;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A file that could not be ingested under [`FailurePolicy::Warn`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedSource {
    pub path: PathBuf,
    pub error: String,
}

/// Successful per-file results plus skipped files.
#[derive(Debug)]
pub struct PoolOutcome<T> {
    pub results: Vec<(PathBuf, T)>,
    pub failed: Vec<FailedSource>,
}

/// Run `work` over `paths` on at most `max_workers` threads.
///
/// Under `Abort` the first failure in path order is returned. Under `Warn`
/// failures are logged and listed in the outcome; the run still fails when
/// every file failed.
pub fn ingest_files<T, F>(
    paths: &[PathBuf],
    max_workers: usize,
    policy: FailurePolicy,
    work: F,
) -> Result<PoolOutcome<T>, IngestError>
where
    T: Send,
    F: Fn(&Path) -> Result<T, IngestError> + Sync,
{
    if paths.is_empty() {
        return Err(IngestError::NoInputs);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(max_workers.max(1))
        .build()
        .map_err(|e| IngestError::Pool(e.to_string()))?;

    let outcomes: Vec<(PathBuf, Result<T, IngestError>)> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| (path.clone(), work(path)))
            .collect()
    });

    let mut results = Vec::with_capacity(outcomes.len());
    let mut failed = Vec::new();
    for (path, outcome) in outcomes {
        match outcome {
            Ok(value) => results.push((path, value)),
            Err(e) => match policy {
                FailurePolicy::Abort => return Err(e),
                FailurePolicy::Warn => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping input file");
                    failed.push(FailedSource {
                        path,
                        error: e.to_string(),
                    });
                }
            },
        }
    }

    if results.is_empty() {
        return Err(IngestError::AllSourcesFailed {
            count: failed.len(),
        });
    }

    Ok(PoolOutcome { results, failed })
}
