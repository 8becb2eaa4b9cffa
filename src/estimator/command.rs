// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! External program backend
//!
//! The configured program is run once per image with the path of a temporary
//! JPEG as its last argument. Whatever it prints on stdout is parsed with
//! [`parse_age_reply`], so a DeepFace one-liner printing `[{"age": 31}]`
//! works as well as a script printing `31`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use super::{parse_age_reply, AgeEstimate, AgeEstimator};
use crate::config::EstimatorConfig;
use crate::{AgesortError, Result};

/// Age estimator that shells out to another program
pub struct CommandEstimator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    enforce_detection: bool,
}

/// JPEG written for the external program, removed on drop
struct TempImage {
    path: PathBuf,
}

impl TempImage {
    async fn write(data: &[u8]) -> Result<Self> {
        let path = std::env::temp_dir().join(format!("agesort-{}.jpg", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, data).await?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("Failed to remove temporary image {:?}: {}", self.path, e);
        }
    }
}

impl CommandEstimator {
    pub fn new(config: &EstimatorConfig) -> Result<Self> {
        if config.command.trim().is_empty() {
            return Err(AgesortError::Config(
                "estimator.command is required for the command backend".to_string(),
            ));
        }
        Ok(Self {
            program: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            enforce_detection: config.enforce_detection,
        })
    }

    async fn run(&self, image: &Path) -> Result<String> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(image)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AgesortError::EstimatorUnavailable(format!("Cannot start {}: {}", self.program, e))
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                AgesortError::EstimatorUnavailable(format!(
                    "{} timed out after {:?}",
                    self.program, self.timeout
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr.lines().last().unwrap_or("").trim();
            // DeepFace reports a missing face by raising ValueError
            if last_line.contains("Face could not be detected") {
                return Err(AgesortError::NoFaceDetected);
            }
            return Err(AgesortError::EstimatorUnavailable(format!(
                "{} exited with {}: {}",
                self.program, output.status, last_line
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl AgeEstimator for CommandEstimator {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn health_check(&self) -> Result<()> {
        info!("Checking estimator program: {}", self.program);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("--help")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AgesortError::EstimatorUnavailable(format!("Cannot start {}: {}", self.program, e))
            })?;

        let status = tokio::time::timeout(self.timeout, child.wait())
            .await
            .map_err(|_| {
                AgesortError::EstimatorUnavailable(format!(
                    "{} did not answer --help within {:?}",
                    self.program, self.timeout
                ))
            })??;
        debug!("{} --help exited with {}", self.program, status);
        Ok(())
    }

    async fn estimate(&self, image_jpeg: &[u8]) -> Result<AgeEstimate> {
        let temp = TempImage::write(image_jpeg).await?;
        let stdout = self.run(temp.path()).await?;
        debug!("Estimator output: {:?}", stdout.trim());
        parse_age_reply(&stdout, self.enforce_detection)
    }
}
