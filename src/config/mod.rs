// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for agesort

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::buckets::AgeBuckets;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Folder containing the images to process
    pub input_dir: String,

    /// Folder receiving sorted, renamed or converted images
    pub output_dir: String,

    /// Age estimation backend
    pub estimator: EstimatorConfig,

    /// Age bucket layout
    #[serde(default)]
    pub buckets: AgeBuckets,

    /// Extension allow-lists
    #[serde(default)]
    pub formats: FormatConfig,

    /// JPEG conversion settings
    #[serde(default)]
    pub convert: ConvertConfig,

    /// Operation journal settings
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorBackend {
    /// Vision model served by a local Ollama instance
    Ollama,
    /// External program printing an age on stdout
    Command,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EstimatorConfig {
    pub backend: EstimatorBackend,
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Program run by the command backend
    #[serde(default)]
    pub command: String,
    /// Arguments placed before the image path
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Treat "no face" replies as errors
    #[serde(default = "default_true")]
    pub enforce_detection: bool,
    /// Images wider than this are downscaled before estimation
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FormatConfig {
    #[serde(default = "default_estimate_formats")]
    pub estimate: Vec<String>,
    #[serde(default = "default_convert_formats")]
    pub convert: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConvertConfig {
    #[serde(default = "default_quality")]
    pub quality: u8,
    #[serde(default = "default_compress_quality")]
    pub compress_quality: u8,
    /// Strip extended attributes from inputs before recompression
    #[serde(default = "default_true")]
    pub strip_xattrs: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_history_path")]
    pub path: String,
}

// Default value functions
fn default_url() -> String { "http://localhost:11434".to_string() }
fn default_model() -> String { "llava".to_string() }
fn default_timeout() -> u64 { 120 }
fn default_true() -> bool { true }
fn default_max_width() -> u32 { 640 }
fn default_workers() -> usize { 6 }
fn default_quality() -> u8 { 75 }
fn default_compress_quality() -> u8 { 60 }
fn default_history_path() -> String { "agesort_history.jsonl".to_string() }

fn default_estimate_formats() -> Vec<String> {
    ["jpg", "jpeg", "png", "webp", "heic"].into_iter().map(String::from).collect()
}

fn default_convert_formats() -> Vec<String> {
    ["jpg", "jpeg", "png", "webp", "heic"].into_iter().map(String::from).collect()
}

fn default_prompt() -> String {
    "Estimate the age in years of the person whose face is shown in this photo. \
     Reply with a single integer and nothing else. \
     If no human face is visible, reply NONE.".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input_dir: "./Face".to_string(),
            output_dir: "./Organised".to_string(),
            estimator: EstimatorConfig::default(),
            buckets: AgeBuckets::default(),
            formats: FormatConfig::default(),
            convert: ConvertConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            backend: EstimatorBackend::Ollama,
            url: default_url(),
            model: default_model(),
            prompt: default_prompt(),
            command: String::new(),
            args: Vec::new(),
            timeout_secs: default_timeout(),
            enforce_detection: true,
            max_width: default_max_width(),
            workers: default_workers(),
        }
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            estimate: default_estimate_formats(),
            convert: default_convert_formats(),
        }
    }
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            quality: default_quality(),
            compress_quality: default_compress_quality(),
            strip_xattrs: true,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::AgesortError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values that would make a run meaningless
    pub fn validate(&self) -> crate::Result<()> {
        use crate::AgesortError::Config;

        if self.buckets.width == 0 {
            return Err(Config("buckets.width must be at least 1".to_string()));
        }
        if self.estimator.workers == 0 {
            return Err(Config("estimator.workers must be at least 1".to_string()));
        }
        if self.estimator.max_width == 0 {
            return Err(Config("estimator.max_width must be at least 1".to_string()));
        }
        for (name, q) in [("quality", self.convert.quality), ("compress_quality", self.convert.compress_quality)] {
            if !(1..=100).contains(&q) {
                return Err(Config(format!("convert.{} must be within 1-100, got {}", name, q)));
            }
        }
        if self.estimator.backend == EstimatorBackend::Command && self.estimator.command.trim().is_empty() {
            return Err(Config("estimator.command is required for the command backend".to_string()));
        }
        Ok(())
    }
}
