// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! Crash detection for the test binary itself
//!
//! When the process dies (segfault, runtime fatal error, unrecovered panic
//! outside a test) there is no fail event to classify. The runner keeps a
//! bounded copy of stderr and asks [`detect_crash`] whether it describes a
//! crash.

use crate::classify::{extract_crash_location, signature};
use crate::parser::TRUNCATION_MARKER;
use crate::result::{Failure, FailureKind};

/// Default stderr retention (10 MiB)
pub const DEFAULT_MAX_STDERR_BYTES: usize = 10 * 1024 * 1024;

/// Substrings that identify a crash dump
pub const CRASH_MARKERS: [&str; 5] = [
    "SIGSEGV",
    "fatal error:",
    "unexpected signal",
    "signal:",
    "panic:",
];

/// Error message of a synthesized crash failure
pub const CRASH_MESSAGE: &str = "test binary crashed";

/// Bounded accumulator for the child's stderr
///
/// Bytes past the cap are dropped and the truncation marker is appended
/// exactly once.
#[derive(Debug, Clone)]
pub struct ErrorStreamBuffer {
    data: Vec<u8>,
    max_bytes: usize,
    truncated: bool,
}

impl ErrorStreamBuffer {
    /// Create a buffer keeping at most `max_bytes` of input
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            data: Vec::new(),
            max_bytes,
            truncated: false,
        }
    }

    /// Append a chunk
    pub fn push(&mut self, chunk: &[u8]) {
        if self.truncated {
            return;
        }
        let room = self.max_bytes.saturating_sub(self.data.len());
        if chunk.len() <= room {
            self.data.extend_from_slice(chunk);
            return;
        }
        self.data.extend_from_slice(&chunk[..room]);
        self.data.extend_from_slice(TRUNCATION_MARKER.as_bytes());
        self.truncated = true;
    }

    /// Whether input was dropped
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Bytes retained, marker included
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if nothing was captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Captured text, invalid UTF-8 replaced
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

impl Default for ErrorStreamBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STDERR_BYTES)
    }
}

/// Check whether `stderr` contains a crash marker
#[must_use]
pub fn has_crash_marker(stderr: &str) -> bool {
    CRASH_MARKERS.iter().any(|marker| stderr.contains(marker))
}

/// Synthesize a `fatal` failure for a crashed test binary
///
/// Returns `None` when the process exited successfully, when stderr is
/// empty, or when it carries no crash marker.
#[must_use]
pub fn detect_crash(stderr: &str, exit_success: bool) -> Option<Failure> {
    if exit_success || stderr.trim().is_empty() || !has_crash_marker(stderr) {
        return None;
    }

    let kind = FailureKind::Fatal;
    let mut failure = Failure {
        error: CRASH_MESSAGE.to_string(),
        output: stderr.to_string(),
        stack: Some(stderr.to_string()),
        kind,
        ..Failure::default()
    };
    if let Some(location) = extract_crash_location(stderr) {
        failure.file = location.file;
        failure.line = location.line;
    }
    failure.signature = signature("", "", &failure.file, failure.line, kind);
    Some(failure)
}
