// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! Error types for faultline-report

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while writing reports
#[derive(Debug, Error)]
pub enum ReportError {
    /// The sink was already closed
    #[error("reporter is closed")]
    Closed,

    /// Error serializing a report line
    #[error("JSON serialize error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error writing report output
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The output directory could not be created
    #[error("Failed to create output directory {path}: {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The output file could not be created
    #[error("Failed to create output file {path}: {source}")]
    FileCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
