// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! agesort: sort photos into folders by estimated facial age
//!
//! Batch jobs over a single directory: estimate the age of the face in each
//! image with an external model, then move, copy or rename the file
//! accordingly. Also converts HEIC/PNG/WEBP to JPEG and recompresses.

pub mod buckets;
pub mod codec;
pub mod config;
pub mod convert;
pub mod error;
pub mod estimator;
pub mod history;
pub mod organize;
pub mod pipeline;
pub mod scan;

pub use config::AppConfig;
pub use error::{AgesortError, Result};
