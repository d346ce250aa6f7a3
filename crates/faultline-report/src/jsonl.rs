// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! Durable JSON Lines sink
//!
//! Writes one JSON object per line. Each object carries a `type` field:
//!
//! - `start`: `timestamp` and run `metadata`
//! - `failure`: one `failure` record
//! - `summary`: the final `summary` counts
//!
//! A full disk never fails the run: the first "no space" error is logged
//! once and every later write becomes a no-op.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use faultline_parse::{Failure, RunMetadata, RunResult, RunSummary};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ReportError;
use crate::sink::ReportSink;

/// Default location of the durable report
pub const DEFAULT_OUTPUT_PATH: &str = ".faultline/ci-results.jsonl";

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum LineKind {
    Start,
    Failure,
    Summary,
}

#[derive(Debug, Serialize)]
struct Line<'a> {
    #[serde(rename = "type")]
    kind: LineKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a RunMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<&'a Failure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a RunSummary>,
}

impl Line<'_> {
    fn new(kind: LineKind) -> Self {
        Self {
            kind,
            timestamp: None,
            metadata: None,
            failure: None,
            summary: None,
        }
    }
}

#[derive(Debug)]
struct Inner {
    file: File,
    closed: bool,
    disk_full: bool,
}

/// Sink writing JSON Lines to a file
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    inner: Mutex<Inner>,
}

/// Check for the platform's "no space left" error class
#[must_use]
pub fn is_disk_full(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::StorageFull | io::ErrorKind::QuotaExceeded
    )
}

fn create_dir(dir: &Path) -> Result<(), ReportError> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|source| ReportError::DirectoryCreate {
        path: dir.to_path_buf(),
        source,
    })
}

fn create_file(path: &Path) -> Result<File, ReportError> {
    File::create(path).map_err(|source| ReportError::FileCreate {
        path: path.to_path_buf(),
        source,
    })
}

impl JsonLinesSink {
    /// Create (or truncate) the report file at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory or the file cannot be
    /// created.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, ReportError> {
        Self::create_with_fallback(path, None::<PathBuf>)
    }

    /// Create the report file, falling back to `fallback_dir` if the
    /// primary location is unusable
    ///
    /// The fallback keeps the primary file name.
    ///
    /// # Errors
    ///
    /// Returns the primary error if there is no fallback, or the fallback
    /// error if the fallback fails too.
    pub fn create_with_fallback(
        path: impl Into<PathBuf>,
        fallback_dir: Option<impl AsRef<Path>>,
    ) -> Result<Self, ReportError> {
        let path = path.into();
        let primary = create_dir(path.parent().unwrap_or(Path::new("")))
            .and_then(|()| create_file(&path));

        let (path, file) = match (primary, fallback_dir) {
            (Ok(file), _) => (path, file),
            (Err(e), None) => return Err(e),
            (Err(e), Some(dir)) => {
                let dir = dir.as_ref();
                let name = path.file_name().unwrap_or(path.as_os_str());
                let fallback = dir.join(name);
                create_dir(dir)?;
                let file = create_file(&fallback)?;
                warn!(primary = %path.display(), fallback = %fallback.display(), error = %e, "Using fallback report path");
                (fallback, file)
            }
        };

        info!(path = %path.display(), "Writing JSON Lines report");
        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                file,
                closed: false,
                disk_full: false,
            }),
        })
    }

    /// Path of the report file actually in use
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn write_line(&self, line: &Line<'_>) -> Result<(), ReportError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(ReportError::Closed);
        }
        if inner.disk_full {
            return Ok(());
        }

        let mut data = serde_json::to_vec(line)?;
        data.push(b'\n');
        match inner.file.write_all(&data) {
            Ok(()) => Ok(()),
            Err(e) if is_disk_full(&e) => {
                warn!(path = %self.path.display(), error = %e, "Disk full, skipping remaining JSON Lines output");
                inner.disk_full = true;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl ReportSink for JsonLinesSink {
    fn start(&self, metadata: &RunMetadata) -> Result<(), ReportError> {
        self.write_line(&Line {
            timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            metadata: Some(metadata),
            ..Line::new(LineKind::Start)
        })
    }

    fn report_failure(&self, failure: &Failure) -> Result<(), ReportError> {
        self.write_line(&Line {
            failure: Some(failure),
            ..Line::new(LineKind::Failure)
        })
    }

    fn write_summary(&self, result: &RunResult) -> Result<(), ReportError> {
        self.write_line(&Line {
            summary: Some(&result.summary),
            ..Line::new(LineKind::Summary)
        })
    }

    fn flush(&self) -> Result<(), ReportError> {
        let inner = self.lock();
        if inner.closed || inner.disk_full {
            return Ok(());
        }
        inner.file.sync_data()?;
        Ok(())
    }

    fn close(&self) -> Result<(), ReportError> {
        let mut inner = self.lock();
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;
        if !inner.disk_full {
            inner.file.sync_data()?;
        }
        Ok(())
    }
}
