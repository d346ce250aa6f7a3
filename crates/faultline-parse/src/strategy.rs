// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! Capture strategy selection
//!
//! Large suites must not hold full context for every running test, so the
//! per-test buffer shrinks as the number of started tests grows.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of newly started tests between two strategy re-evaluations
pub const REEVALUATE_EVERY: usize = 100;

/// Context buffer sizing policy, ordered by suite size
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStrategy {
    /// Fewer than 100 tests
    Full,
    /// Fewer than 1,000 tests
    #[default]
    Smart,
    /// Fewer than 5,000 tests
    Efficient,
    /// 5,000 tests or more
    Streaming,
}

impl CaptureStrategy {
    /// Pick the tier for a number of started tests
    #[must_use]
    pub fn select(test_count: usize) -> Self {
        match test_count {
            0..100 => Self::Full,
            100..1000 => Self::Smart,
            1000..5000 => Self::Efficient,
            _ => Self::Streaming,
        }
    }

    /// Ring buffer size for a test started under this tier
    ///
    /// A result of zero means "use the buffer's default capacity".
    #[must_use]
    pub fn buffer_size(self, context_lines: usize) -> usize {
        let size = context_lines * 2;
        match self {
            Self::Full | Self::Smart => size,
            Self::Efficient => size.min(10),
            Self::Streaming => size.min(5),
        }
    }

    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Smart => "smart",
            Self::Efficient => "efficient",
            Self::Streaming => "streaming",
        }
    }
}

impl fmt::Display for CaptureStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown strategy name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown capture strategy: {0}")]
pub struct UnknownStrategy(pub String);

impl FromStr for CaptureStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "smart" => Ok(Self::Smart),
            "efficient" => Ok(Self::Efficient),
            "streaming" => Ok(Self::Streaming),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}
