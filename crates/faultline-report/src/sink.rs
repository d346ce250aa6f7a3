// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! The sink capability and its combinators

use std::sync::Arc;

use faultline_parse::{Failure, RunMetadata, RunResult};
use tracing::warn;

use crate::error::ReportError;

/// A destination for run reports
///
/// Sinks are internally synchronized and may be shared between runners.
/// A sink never deduplicates on its own: callers report each logical
/// failure once.
pub trait ReportSink: Send + Sync {
    /// A run is starting
    fn start(&self, metadata: &RunMetadata) -> Result<(), ReportError>;

    /// Report one failure
    fn report_failure(&self, failure: &Failure) -> Result<(), ReportError>;

    /// Write the final summary
    fn write_summary(&self, result: &RunResult) -> Result<(), ReportError>;

    /// Push buffered output to its destination
    fn flush(&self) -> Result<(), ReportError>;

    /// Release resources; further writes fail with [`ReportError::Closed`]
    /// where the sink tracks closing
    fn close(&self) -> Result<(), ReportError>;
}

impl<T: ReportSink + ?Sized> ReportSink for Arc<T> {
    fn start(&self, metadata: &RunMetadata) -> Result<(), ReportError> {
        (**self).start(metadata)
    }

    fn report_failure(&self, failure: &Failure) -> Result<(), ReportError> {
        (**self).report_failure(failure)
    }

    fn write_summary(&self, result: &RunResult) -> Result<(), ReportError> {
        (**self).write_summary(result)
    }

    fn flush(&self) -> Result<(), ReportError> {
        (**self).flush()
    }

    fn close(&self) -> Result<(), ReportError> {
        (**self).close()
    }
}

/// Sink that accepts everything and writes nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn start(&self, _metadata: &RunMetadata) -> Result<(), ReportError> {
        Ok(())
    }

    fn report_failure(&self, _failure: &Failure) -> Result<(), ReportError> {
        Ok(())
    }

    fn write_summary(&self, _result: &RunResult) -> Result<(), ReportError> {
        Ok(())
    }

    fn flush(&self) -> Result<(), ReportError> {
        Ok(())
    }

    fn close(&self) -> Result<(), ReportError> {
        Ok(())
    }
}

/// Fans every call out to an ordered list of sinks
///
/// Every sink is called even when an earlier one fails. Each error is
/// logged and the last one is returned.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl MultiSink {
    /// Create a fan-out over `sinks`
    #[must_use]
    pub fn new(sinks: Vec<Box<dyn ReportSink>>) -> Self {
        Self { sinks }
    }

    /// Append a sink
    pub fn push(&mut self, sink: impl ReportSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    /// Number of sinks
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Check if there are no sinks
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn each(
        &self,
        operation: &'static str,
        call: impl Fn(&dyn ReportSink) -> Result<(), ReportError>,
    ) -> Result<(), ReportError> {
        let mut last = None;
        for (index, sink) in self.sinks.iter().enumerate() {
            if let Err(e) = call(sink.as_ref()) {
                warn!(operation, sink = index, error = %e, "Report sink failed");
                last = Some(e);
            }
        }
        last.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for MultiSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl ReportSink for MultiSink {
    fn start(&self, metadata: &RunMetadata) -> Result<(), ReportError> {
        self.each("start", |sink| sink.start(metadata))
    }

    fn report_failure(&self, failure: &Failure) -> Result<(), ReportError> {
        self.each("report_failure", |sink| sink.report_failure(failure))
    }

    fn write_summary(&self, result: &RunResult) -> Result<(), ReportError> {
        self.each("write_summary", |sink| sink.write_summary(result))
    }

    fn flush(&self) -> Result<(), ReportError> {
        self.each("flush", |sink| sink.flush())
    }

    fn close(&self) -> Result<(), ReportError> {
        self.each("close", |sink| sink.close())
    }
}

/// Collapse a list of sinks into one
///
/// No sinks become a [`NullSink`], a single sink is used directly, and
/// several are combined in a [`MultiSink`].
#[must_use]
pub fn combine(mut sinks: Vec<Box<dyn ReportSink>>) -> Box<dyn ReportSink> {
    match sinks.len() {
        0 => Box::new(NullSink),
        1 => sinks.remove(0),
        _ => Box::new(MultiSink::new(sinks)),
    }
}
