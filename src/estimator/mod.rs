// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Age estimation backends
//!
//! An estimator receives a JPEG-encoded, already downscaled image and
//! returns the apparent age of the face it contains. Backends differ only
//! in how they reach the model: an Ollama vision model over HTTP, or an
//! external program (for example a DeepFace wrapper) that prints its result.

pub mod command;
pub mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{EstimatorBackend, EstimatorConfig};
use crate::{AgesortError, Result};

/// Highest age accepted from a model
pub const MAX_PLAUSIBLE_AGE: f64 = 120.0;

/// Result of one estimation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgeEstimate {
    /// Age in years as reported by the model
    pub age: f64,
}

impl AgeEstimate {
    /// Whole years, truncated toward zero
    pub fn years(&self) -> i64 {
        self.age.trunc() as i64
    }
}

/// Trait for age estimators
#[async_trait]
pub trait AgeEstimator: Send + Sync {
    /// Name of this backend
    fn name(&self) -> &'static str;

    /// Check that the backend can be reached before a batch starts
    async fn health_check(&self) -> Result<()>;

    /// Estimate the age of the face in a JPEG image
    async fn estimate(&self, image_jpeg: &[u8]) -> Result<AgeEstimate>;
}

/// Build the estimator selected in the configuration
pub fn from_config(config: &EstimatorConfig) -> Result<Arc<dyn AgeEstimator>> {
    match config.backend {
        EstimatorBackend::Ollama => Ok(Arc::new(ollama::OllamaEstimator::new(config)?)),
        EstimatorBackend::Command => Ok(Arc::new(command::CommandEstimator::new(config)?)),
    }
}

/// Read an age out of a model reply.
///
/// Accepts a bare number, a number inside prose, or JSON carrying an `age`
/// field (either an object or an array of objects). When `enforce_detection`
/// is set, a reply that says no face was found is an error even if it also
/// contains a number.
///
/// Programs often log progress before their answer, so the reply is read
/// from its last line upwards: the last JSON line wins, then the last line
/// holding a number.
pub fn parse_age_reply(reply: &str, enforce_detection: bool) -> Result<AgeEstimate> {
    let text = reply.trim();
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let json_age = std::iter::once(text)
        .chain(lines.iter().rev().copied())
        .filter_map(|candidate| serde_json::from_str::<serde_json::Value>(candidate).ok())
        .find_map(|value| age_from_json(&value));
    if let Some(age) = json_age {
        return check_range(age);
    }

    let refused = is_refusal(text);
    if refused && enforce_detection {
        return Err(AgesortError::NoFaceDetected);
    }

    match lines.iter().rev().find_map(|line| first_number(line)) {
        Some(age) => check_range(age),
        None if refused => Err(AgesortError::NoFaceDetected),
        None => Err(AgesortError::UnparsableReply(text.to_string())),
    }
}

fn age_from_json(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::Object(map) => map.get("age").and_then(|a| a.as_f64()),
        serde_json::Value::Array(items) => items.first().and_then(age_from_json),
        _ => None,
    }
}

fn is_refusal(text: &str) -> bool {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    words.iter().any(|w| *w == "none")
        || words.windows(2).any(|pair| pair == ["no", "face"] || pair == ["no", "faces"])
        || words.windows(3).any(|triple| triple[0] == "no" && triple[2] == "face")
}

/// First decimal number in `text`, e.g. "about 34.5 years" gives 34.5
fn first_number(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in rest.char_indices() {
        if c.is_ascii_digit() {
            end = i + 1;
        } else if c == '.' && !seen_dot {
            seen_dot = true;
        } else {
            break;
        }
    }
    rest[..end].parse().ok()
}

fn check_range(age: f64) -> Result<AgeEstimate> {
    if age.is_finite() && (0.0..=MAX_PLAUSIBLE_AGE).contains(&age) {
        Ok(AgeEstimate { age })
    } else {
        Err(AgesortError::AgeOutOfRange(age))
    }
}
