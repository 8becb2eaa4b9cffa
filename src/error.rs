// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for agesort

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for agesort operations
pub type Result<T> = std::result::Result<T, AgesortError>;

/// agesort error types
#[derive(Error, Debug)]
pub enum AgesortError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("Input directory not found: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Age estimator not available: {0}")]
    EstimatorUnavailable(String),

    #[error("No face detected")]
    NoFaceDetected,

    #[error("Could not read an age from estimator reply: {0:?}")]
    UnparsableReply(String),

    #[error("Estimated age {0} is out of range")]
    AgeOutOfRange(f64),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("HEIC decode error: {0}")]
    Heic(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
