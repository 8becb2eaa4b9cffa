// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Parallel age estimation over a list of files

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::codec::prepare_for_inference;
use crate::estimator::{AgeEstimate, AgeEstimator};
use crate::scan::display_name;
use crate::Result;

/// Outcome for one input file
#[derive(Debug)]
pub struct EstimateOutcome {
    pub path: PathBuf,
    pub result: Result<AgeEstimate>,
}

impl EstimateOutcome {
    pub fn age(&self) -> Option<i64> {
        self.result.as_ref().ok().map(|e| e.years())
    }
}

/// Per-file line of a batch report
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub age: Option<i64>,
    pub destination: Option<PathBuf>,
    pub error: Option<String>,
}

/// Counters for one batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub skipped: usize,
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn record_done(&mut self, path: &Path, age: Option<i64>, destination: PathBuf) {
        self.processed += 1;
        self.files.push(FileReport {
            path: path.to_path_buf(),
            age,
            destination: Some(destination),
            error: None,
        });
    }

    pub fn record_skipped(&mut self, path: &Path, age: Option<i64>, error: String) {
        self.skipped += 1;
        self.files.push(FileReport {
            path: path.to_path_buf(),
            age,
            destination: None,
            error: Some(error),
        });
    }
}

/// Estimate the age for every file with at most `workers` in flight.
///
/// Outcomes come back in the order of `paths`; a failure of one file does
/// not affect the others.
pub async fn estimate_all(
    paths: Vec<PathBuf>,
    estimator: Arc<dyn AgeEstimator>,
    max_width: u32,
    workers: usize,
) -> Vec<EstimateOutcome> {
    let total = paths.len();
    info!("Estimating ages for {} images with {} workers", total, workers.max(1));

    stream::iter(paths.into_iter().enumerate())
        .map(|(i, path)| {
            let estimator = Arc::clone(&estimator);
            async move {
                debug!("{}/{} Analyzing {}", i + 1, total, display_name(&path));
                let result = estimate_one(&path, estimator.as_ref(), max_width).await;
                if let Err(ref e) = result {
                    warn!("Error processing {}: {}", display_name(&path), e);
                }
                EstimateOutcome { path, result }
            }
        })
        .buffered(workers.max(1))
        .collect()
        .await
}

/// Decode on the blocking pool, then ask the estimator
pub async fn estimate_one(path: &Path, estimator: &dyn AgeEstimator, max_width: u32) -> Result<AgeEstimate> {
    let owned = path.to_path_buf();
    let jpeg = tokio::task::spawn_blocking(move || prepare_for_inference(&owned, max_width)).await??;
    estimator.estimate(&jpeg).await
}
