// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Ollama vision model backend

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{parse_age_reply, AgeEstimate, AgeEstimator};
use crate::config::EstimatorConfig;
use crate::{AgesortError, Result};

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    images: Vec<String>,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: normalize_url(base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);

        self.client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                AgesortError::EstimatorUnavailable(format!(
                    "Cannot connect to Ollama at {}: {}",
                    self.base_url, e
                ))
            })?;

        Ok(())
    }

    /// List available models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let tags: TagsResponse = self.client.get(&url).send().await?.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Generate with image (for vision models)
    pub async fn generate_with_image(&self, model: &str, prompt: &str, image_base64: String) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
            images: vec![image_base64],
            options: GenerateOptions { temperature: 0.0 },
        };

        debug!("Sending vision request to Ollama: model={}", model);

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(AgesortError::EstimatorUnavailable(format!(
                "Ollama returned status {}",
                response.status()
            )));
        }

        let result: GenerateResponse = response.json().await?;
        Ok(result.response)
    }
}

/// Accept both the server root and a full endpoint URL
fn normalize_url(base_url: &str) -> String {
    base_url
        .trim_end_matches('/')
        .replace("/api/generate", "")
        .replace("/api/chat", "")
}

/// Age estimator backed by an Ollama vision model
pub struct OllamaEstimator {
    client: OllamaClient,
    model: String,
    prompt: String,
    enforce_detection: bool,
}

impl OllamaEstimator {
    pub fn new(config: &EstimatorConfig) -> Result<Self> {
        Ok(Self {
            client: OllamaClient::new(&config.url, Duration::from_secs(config.timeout_secs))?,
            model: config.model.clone(),
            prompt: config.prompt.clone(),
            enforce_detection: config.enforce_detection,
        })
    }

    pub fn client(&self) -> &OllamaClient {
        &self.client
    }
}

#[async_trait]
impl AgeEstimator for OllamaEstimator {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn health_check(&self) -> Result<()> {
        info!("Checking Ollama availability at {}...", self.client.base_url());
        self.client.health_check().await?;

        let models = self.client.list_models().await?;
        if models.iter().any(|m| m.starts_with(&self.model)) {
            info!("Vision model '{}' available", self.model);
        } else {
            warn!("Vision model '{}' not found. Available: {:?}", self.model, models);
            warn!("Try: ollama pull {}", self.model);
        }
        Ok(())
    }

    async fn estimate(&self, image_jpeg: &[u8]) -> Result<AgeEstimate> {
        let encoded = general_purpose::STANDARD.encode(image_jpeg);
        let reply = self
            .client
            .generate_with_image(&self.model, &self.prompt, encoded)
            .await?;
        debug!("Model reply: {:?}", reply);
        parse_age_reply(&reply, self.enforce_detection)
    }
}
