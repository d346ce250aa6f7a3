// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! Error types for faultline-parse

use thiserror::Error;

/// Errors that can occur while reading a test output stream
///
/// Malformed lines are never errors: the parsers skip them. These variants
/// only cover the stream itself going wrong.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Error decoding a single structured event
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Error reading the underlying stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
