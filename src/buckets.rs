// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Age bucket arithmetic
//!
//! A bucket is a fixed-width, inclusive range of ages starting at 1
//! (`1-5`, `6-10`, ...). Its label is used verbatim as a folder name.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One inclusive age range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgeBucket {
    pub lower: i64,
    pub upper: i64,
}

impl AgeBucket {
    pub fn contains(&self, age: i64) -> bool {
        (self.lower..=self.upper).contains(&age)
    }
}

impl fmt::Display for AgeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.lower, self.upper)
    }
}

/// Bucket layout shared by `sort` and `scaffold`
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AgeBuckets {
    #[serde(default = "default_width")]
    pub width: u32,
    /// Prepended to every folder label, e.g. "age" gives "age21-25"
    #[serde(default)]
    pub prefix: String,
    /// Highest age covered by `all_buckets`
    #[serde(default = "default_max_age")]
    pub max_age: u32,
}

fn default_width() -> u32 { 5 }
fn default_max_age() -> u32 { 100 }

impl Default for AgeBuckets {
    fn default() -> Self {
        Self {
            width: default_width(),
            prefix: String::new(),
            max_age: default_max_age(),
        }
    }
}

impl AgeBuckets {
    pub fn new(width: u32) -> Self {
        Self {
            width,
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Bucket containing `age`. Ages below 1 fall into the first bucket.
    pub fn bucket_for(&self, age: i64) -> AgeBucket {
        let width = i64::from(self.width.max(1));
        let age = age.max(1);
        let lower = (age - 1).div_euclid(width) * width + 1;
        AgeBucket {
            lower,
            upper: lower + width - 1,
        }
    }

    /// Folder name for a bucket
    pub fn label(&self, bucket: AgeBucket) -> String {
        format!("{}{}", self.prefix, bucket)
    }

    /// Folder name for the bucket containing `age`
    pub fn label_for(&self, age: i64) -> String {
        self.label(self.bucket_for(age))
    }

    /// Every bucket from 1 up to the one holding `max_age`
    pub fn all_buckets(&self) -> Vec<AgeBucket> {
        let last = self.bucket_for(i64::from(self.max_age));
        let mut buckets = Vec::new();
        let mut current = self.bucket_for(1);
        loop {
            buckets.push(current);
            if current == last {
                break;
            }
            current = self.bucket_for(current.upper + 1);
        }
        buckets
    }
}
