// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! Human-readable sink for local runs

use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};

use faultline_parse::{Failure, RunMetadata, RunResult};

use crate::error::ReportError;
use crate::sink::ReportSink;

struct Inner {
    writer: Box<dyn Write + Send>,
    failures: Vec<Failure>,
}

/// Sink printing a preview header and a final summary
pub struct TerminalSink {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for TerminalSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalSink")
            .field("failures", &self.lock().failures.len())
            .finish_non_exhaustive()
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new(io::stderr())
    }
}

impl TerminalSink {
    /// Create a sink printing to `writer`
    #[must_use]
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Mutex::new(Inner {
                writer: Box::new(writer),
                failures: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of failures reported so far
    #[must_use]
    pub fn reported(&self) -> usize {
        self.lock().failures.len()
    }
}

fn write_failure(out: &mut dyn Write, index: usize, failure: &Failure) -> io::Result<()> {
    let name = if failure.test.is_empty() {
        "(test binary)"
    } else {
        failure.test.as_str()
    };
    write!(out, "  {}. {name}", index + 1)?;
    if !failure.package.is_empty() {
        write!(out, " ({})", failure.package)?;
    }
    writeln!(out, " [{}]", failure.kind)?;

    if let Some(location) = failure.location() {
        writeln!(out, "     at {location}")?;
    }
    if !failure.error.is_empty() {
        writeln!(out, "     {}", failure.error)?;
    }
    if !failure.context.is_empty() {
        writeln!(out, "     Context:")?;
        for line in &failure.context {
            writeln!(out, "       {line}")?;
        }
    }
    writeln!(out)
}

impl ReportSink for TerminalSink {
    fn start(&self, metadata: &RunMetadata) -> Result<(), ReportError> {
        let mut inner = self.lock();
        let out = &mut inner.writer;
        writeln!(out, "CI Mode Preview")?;
        writeln!(out, "  Platform: {}", metadata.platform)?;
        if let Some(branch) = &metadata.branch {
            writeln!(out, "  Branch: {branch}")?;
        }
        writeln!(out)?;
        Ok(())
    }

    fn report_failure(&self, failure: &Failure) -> Result<(), ReportError> {
        self.lock().failures.push(failure.clone());
        Ok(())
    }

    fn write_summary(&self, result: &RunResult) -> Result<(), ReportError> {
        let mut inner = self.lock();
        let Inner { writer, failures } = &mut *inner;
        let summary = &result.summary;

        writeln!(writer, "Test Results Summary")?;
        writeln!(writer, "  Status:   {}", summary.status.as_str().to_uppercase())?;
        writeln!(writer, "  Total:    {}", summary.total)?;
        writeln!(writer, "  Passed:   {}", summary.passed)?;
        writeln!(writer, "  Failed:   {}", summary.failed)?;
        if summary.skipped > 0 {
            writeln!(writer, "  Skipped:  {}", summary.skipped)?;
        }
        writeln!(writer, "  Duration: {}", summary.duration)?;
        writeln!(writer)?;

        let shown: &[Failure] = if result.failures.is_empty() {
            failures.as_slice()
        } else {
            &result.failures
        };
        if !shown.is_empty() {
            writeln!(writer, "Failed Tests")?;
            for (index, failure) in shown.iter().enumerate() {
                write_failure(&mut **writer, index, failure)?;
            }
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), ReportError> {
        self.lock().writer.flush()?;
        Ok(())
    }

    fn close(&self) -> Result<(), ReportError> {
        self.flush()
    }
}
