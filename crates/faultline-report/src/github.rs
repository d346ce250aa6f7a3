// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! GitHub Actions sink
//!
//! Failures become workflow `::error` annotations on stdout. The summary is
//! appended as Markdown to the step summary file, and key/value outputs can
//! be appended to the step outputs file.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use faultline_parse::{Failure, RunMetadata, RunResult, RunStatus};
use tracing::debug;

use crate::error::ReportError;
use crate::sink::ReportSink;

/// Set to `true` to leave the step summary alone
pub const SKIP_STEP_SUMMARY_ENV: &str = "FAULTLINE_CI_SKIP_STEP_SUMMARY";

/// Escape an annotation parameter value
#[must_use]
pub fn escape_property(value: &str) -> String {
    escape_data(value).replace(',', "%2C")
}

/// Escape an annotation message
#[must_use]
pub fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Format a failure as a workflow `::error` command
#[must_use]
pub fn annotation(failure: &Failure) -> String {
    let mut params = Vec::new();
    if !failure.file.is_empty() {
        params.push(format!("file={}", escape_property(&failure.file)));
    }
    if failure.line > 0 {
        params.push(format!("line={}", failure.line));
    }
    if let Some(column) = failure.column.filter(|&c| c > 0) {
        params.push(format!("col={column}"));
    }
    let title = if failure.test.is_empty() {
        format!("{} error", failure.kind)
    } else {
        failure.test.clone()
    };
    params.push(format!("title={}", escape_property(&title)));

    format!("::error {}::{}", params.join(","), escape_data(&failure.error))
}

fn status_icon(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Passed => "✅",
        RunStatus::Failed => "❌",
        RunStatus::Error => "💥",
    }
}

/// Render a result as step-summary Markdown
#[must_use]
pub fn step_summary_markdown(result: &RunResult) -> String {
    let summary = &result.summary;
    let mut md = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(md, "## Test Results\n");
    let _ = writeln!(md, "**Status**: {} {}\n", status_icon(summary.status), summary.status);
    let _ = writeln!(md, "| Metric | Count |");
    let _ = writeln!(md, "|--------|-------|");
    let _ = writeln!(md, "| ✅ Passed | {} |", summary.passed);
    let _ = writeln!(md, "| ❌ Failed | {} |", summary.failed);
    let _ = writeln!(md, "| ⏭️ Skipped | {} |", summary.skipped);
    let _ = writeln!(md, "| ⏱️ Duration | {} |", summary.duration);
    md.push('\n');

    if !result.failures.is_empty() {
        md.push_str("### Failed Tests\n\n");
        for failure in &result.failures {
            let _ = writeln!(
                md,
                "<details>\n<summary>{} ({})</summary>\n",
                failure.test, failure.package
            );
            if let Some(location) = failure.location() {
                let _ = writeln!(md, "**File**: `{location}`");
            }
            let _ = writeln!(md, "**Type**: {}", failure.kind);
            if !failure.error.is_empty() {
                let _ = writeln!(md, "**Error**: {}", failure.error);
            }
            if !failure.context.is_empty() {
                let _ = writeln!(md, "\n```go\n{}\n```", failure.context.join("\n"));
            }
            md.push_str("\n</details>\n\n");
        }
    }

    md
}

fn append(path: &Path, contents: &str) -> Result<(), ReportError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}

/// Sink for GitHub Actions
pub struct GitHubSink {
    writer: Mutex<Box<dyn Write + Send>>,
    step_summary: Option<PathBuf>,
    outputs: Option<PathBuf>,
    skip_step_summary: bool,
}

impl std::fmt::Debug for GitHubSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubSink")
            .field("step_summary", &self.step_summary)
            .field("outputs", &self.outputs)
            .field("skip_step_summary", &self.skip_step_summary)
            .finish_non_exhaustive()
    }
}

impl GitHubSink {
    /// Create a sink writing annotations to `writer`, with no step files
    #[must_use]
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
            step_summary: None,
            outputs: None,
            skip_step_summary: false,
        }
    }

    /// Create a sink configured from the runner environment
    ///
    /// Annotations go to stdout; `GITHUB_STEP_SUMMARY` and `GITHUB_OUTPUT`
    /// name the step files.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Same as [`GitHubSink::from_env`] with a custom variable lookup
    #[must_use]
    pub fn from_env_with(get: impl Fn(&str) -> Option<String>) -> Self {
        let path = |key: &str| get(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        Self {
            step_summary: path("GITHUB_STEP_SUMMARY"),
            outputs: path("GITHUB_OUTPUT"),
            skip_step_summary: get(SKIP_STEP_SUMMARY_ENV).is_some_and(|v| v == "true"),
            ..Self::new(io::stdout())
        }
    }

    /// Append the summary to this file
    #[must_use]
    pub fn with_step_summary(mut self, path: impl Into<PathBuf>) -> Self {
        self.step_summary = Some(path.into());
        self
    }

    /// Append outputs to this file
    #[must_use]
    pub fn with_outputs(mut self, path: impl Into<PathBuf>) -> Self {
        self.outputs = Some(path.into());
        self
    }

    /// Never write the step summary
    #[must_use]
    pub fn skip_step_summary(mut self, skip: bool) -> Self {
        self.skip_step_summary = skip;
        self
    }

    fn writer(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append the Markdown summary to the step summary file
    ///
    /// Does nothing outside Actions, when skipping is requested, or when
    /// the result is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or written.
    pub fn write_step_summary(&self, result: &RunResult) -> Result<(), ReportError> {
        let Some(path) = &self.step_summary else {
            return Ok(());
        };
        if self.skip_step_summary {
            debug!("Step summary skipped by {SKIP_STEP_SUMMARY_ENV}");
            return Ok(());
        }
        if result.is_empty() {
            debug!("Empty result, step summary skipped");
            return Ok(());
        }
        append(path, &step_summary_markdown(result))
    }

    /// Append key/value pairs to the step outputs file
    ///
    /// Multi-line values use the heredoc form `key<<EOF_key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or written.
    pub fn write_outputs(&self, outputs: &BTreeMap<String, String>) -> Result<(), ReportError> {
        let Some(path) = &self.outputs else {
            return Ok(());
        };

        let mut contents = String::new();
        for (key, value) in outputs {
            if value.contains('\n') {
                let delimiter = format!("EOF_{key}");
                let _ = writeln!(contents, "{key}<<{delimiter}\n{value}\n{delimiter}");
            } else {
                let _ = writeln!(contents, "{key}={value}");
            }
        }
        append(path, &contents)
    }
}

impl ReportSink for GitHubSink {
    fn start(&self, _metadata: &RunMetadata) -> Result<(), ReportError> {
        Ok(())
    }

    fn report_failure(&self, failure: &Failure) -> Result<(), ReportError> {
        writeln!(self.writer(), "{}", annotation(failure))?;
        Ok(())
    }

    fn write_summary(&self, result: &RunResult) -> Result<(), ReportError> {
        self.write_step_summary(result)
    }

    fn flush(&self) -> Result<(), ReportError> {
        self.writer().flush()?;
        Ok(())
    }

    fn close(&self) -> Result<(), ReportError> {
        self.flush()
    }
}
