// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! Failure and run result types
//!
//! [`Failure`] is the unit every parser produces and every sink consumes.
//! [`RunResult`] aggregates one run: counts, the final failure list, and the
//! CI metadata the run was started with.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a test failure
///
/// When several patterns match the same output the classifier picks, in
/// order: timeout, race, panic, build, fuzz, test. Timeout output usually
/// also contains `panic:`, so it has to win over panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Assertion failure inside a test
    #[default]
    Test,
    /// Compilation error
    Build,
    /// Runtime panic
    Panic,
    /// Data race reported by the race detector
    Race,
    /// Fuzz target found a failing input
    Fuzz,
    /// Test exceeded its deadline
    Timeout,
    /// Test binary crashed (signal, fatal runtime error)
    Fatal,
}

impl FailureKind {
    /// Lowercase name, as used in reports and signatures
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Build => "build",
            Self::Panic => "panic",
            Self::Race => "race",
            Self::Fuzz => "fuzz",
            Self::Timeout => "timeout",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fuzz-specific details attached to a `fuzz` failure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzInfo {
    /// Path of the failing corpus entry
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub corpus_path: String,
    /// Failing input, only when it is printable text
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub input: String,
    /// The corpus entry contains control bytes
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_binary: bool,
    /// The failure came from the seed corpus rather than generated input
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub from_seed: bool,
}

/// A classified test failure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Package (import path) the test belongs to
    pub package: String,
    /// Test name, empty for synthesized crash failures
    pub test: String,
    /// Concise error message
    pub error: String,
    /// Captured output
    pub output: String,
    /// Failure classification
    #[serde(rename = "type")]
    pub kind: FailureKind,
    /// Source file of the failure, empty when unknown
    pub file: String,
    /// Line in `file`, 0 when unknown
    pub line: u32,
    /// Column, only known for build errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Goroutine stack (panic, race and fatal failures)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Source lines around `file:line`, the failing line marked with `>`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
    /// Deduplication signature, see [`crate::classify::signature`]
    pub signature: String,
    /// Elapsed time of the test
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub duration: String,
    /// A race report was found next to a panic
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub race_related: bool,
    /// Fuzz details, only for fuzz failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzz_info: Option<FuzzInfo>,
}

impl Failure {
    /// `file:line` if a location was captured
    #[must_use]
    pub fn location(&self) -> Option<String> {
        if self.file.is_empty() {
            return None;
        }
        if self.line > 0 {
            Some(format!("{}:{}", self.file, self.line))
        } else {
            Some(self.file.clone())
        }
    }
}

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every test passed
    #[default]
    Passed,
    /// At least one test failed
    Failed,
    /// The test binary crashed
    Error,
}

impl RunStatus {
    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Test counts for a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Overall status
    pub status: RunStatus,
    /// Test runs, including repeats of the same test
    pub total: usize,
    /// Distinct tests
    pub unique_total: usize,
    /// Tests passed
    pub passed: usize,
    /// Tests failed
    pub failed: usize,
    /// Tests skipped
    pub skipped: usize,
    /// Human-readable wall-clock duration
    pub duration: String,
}

/// Where and on what a run executed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Branch being built
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Commit being built
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// CI run identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// CI workflow or pipeline name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    /// CI platform (`github`, `gitlab`, ..., `local`)
    pub platform: String,
    /// Toolchain that produced the test output
    pub toolchain: String,
}

/// Aggregated result of a run
///
/// Built once when a run is finalized. Holders never mutate a published
/// instance; a new one replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Counts and status
    pub summary: RunSummary,
    /// Final, deduplicated failures
    pub failures: Vec<Failure>,
    /// When the run started
    pub timestamp: DateTime<Utc>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// CI metadata
    pub metadata: RunMetadata,
}

impl RunResult {
    /// Create an empty result
    #[must_use]
    pub fn empty() -> Self {
        Self {
            summary: RunSummary::default(),
            failures: Vec::new(),
            timestamp: Utc::now(),
            duration_ms: 0,
            metadata: RunMetadata::default(),
        }
    }

    /// Check if the run had no failures
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.summary.status == RunStatus::Passed && self.failures.is_empty()
    }

    /// Nothing was observed: no tests, no failures
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.summary.total == 0 && self.failures.is_empty()
    }
}

impl Default for RunResult {
    fn default() -> Self {
        Self::empty()
    }
}

/// Format a per-test elapsed time given in seconds
#[must_use]
pub fn format_test_duration(seconds: f64) -> String {
    if seconds < 0.001 {
        "<1ms".to_string()
    } else if seconds < 1.0 {
        format!("{:.0}ms", seconds * 1000.0)
    } else {
        format!("{seconds:.2}s")
    }
}

/// Format a run's wall-clock duration
#[must_use]
pub fn format_run_duration(duration: Duration) -> String {
    if duration < Duration::from_secs(1) {
        format!("{}ms", duration.as_millis())
    } else if duration < Duration::from_secs(60) {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m{}s", secs / 60, secs % 60)
    }
}
