// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! Orchestrating runner
//!
//! The runner starts the test process, copies its stdout to the console
//! while feeding the same lines to a [`StreamParser`], and
//! keeps a bounded copy of stderr for crash detection. When the process
//! exits it publishes a fresh [`RunResult`]; [`Runner::finish`] delivers
//! that result to the report sink.
//!
//! A panic inside the parser never stops the copy: the remaining output is
//! still drained and echoed, so the child cannot block on a full pipe.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::future::{self, Future};
use std::io::{self, BufRead, Write};
use std::panic::{self, AssertUnwindSafe};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use faultline_parse::crash::DEFAULT_MAX_STDERR_BYTES;
use faultline_parse::result::format_run_duration;
use faultline_parse::{
    ErrorStreamBuffer, Failure, ParseError, ParseMode, ParserOptions, RunMetadata, RunResult,
    RunStatus, StreamParser, detect_crash, new_parser,
};
use faultline_report::{ReportError, ReportSink};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Errors raised while running or parsing a test process
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The parser panicked; the output stream was still drained
    #[error("parser fault: {message}")]
    ParserFault { message: String },

    /// The test process could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The child was spawned without a captured stream
    #[error("{0} of the test process was not captured")]
    MissingPipe(&'static str),

    /// IO error talking to the test process
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Error reading captured output
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error from the report sink
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Settings for one runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Input shape
    pub mode: ParseMode,
    /// Parser settings
    pub parser: ParserOptions,
    /// Cap on the stderr copy used for crash detection
    pub max_stderr_bytes: usize,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            mode: ParseMode::default(),
            parser: ParserOptions::default(),
            max_stderr_bytes: DEFAULT_MAX_STDERR_BYTES,
        }
    }
}

/// How a test process ended
#[derive(Debug)]
pub struct RunOutcome {
    /// Exit code, `None` when killed by a signal
    pub exit_code: Option<i32>,
    /// The run was cancelled before the process exited
    pub cancelled: bool,
    /// Set when the parser panicked mid-stream
    pub parser_fault: Option<RunError>,
}

impl RunOutcome {
    /// Exit code to hand back to the caller's shell
    #[must_use]
    pub fn code(&self) -> i32 {
        self.exit_code.unwrap_or(1)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Copies output to the console and assembles lines for a parser
///
/// Every byte reaches the console. A line longer than `max_line_bytes` is
/// cut at that length before parsing and the rest is dropped up to the next
/// newline. After the first parser panic the parser is no longer called;
/// the console copy continues regardless.
struct Tee<'a, W: Write> {
    parser: &'a dyn StreamParser,
    console: W,
    console_failed: bool,
    fault: Option<String>,
    line: Vec<u8>,
    max_line_bytes: usize,
    line_truncated: bool,
}

impl<'a, W: Write> Tee<'a, W> {
    fn new(parser: &'a dyn StreamParser, console: W, max_line_bytes: usize) -> Self {
        Self {
            parser,
            console,
            console_failed: false,
            fault: None,
            line: Vec::new(),
            max_line_bytes,
            line_truncated: false,
        }
    }

    fn push(&mut self, mut chunk: &[u8]) {
        if !self.console_failed {
            if let Err(e) = self.console.write_all(chunk) {
                warn!(error = %e, "Console echo failed, continuing without it");
                self.console_failed = true;
            }
        }

        while let Some(i) = chunk.iter().position(|&b| b == b'\n') {
            self.append(&chunk[..=i]);
            self.end_line();
            chunk = &chunk[i + 1..];
        }
        self.append(chunk);
    }

    fn append(&mut self, bytes: &[u8]) {
        let room = self.max_line_bytes.saturating_sub(self.line.len());
        if bytes.len() > room {
            if !self.line_truncated {
                debug!(max_line_bytes = self.max_line_bytes, "Output line over cap, truncating");
                self.line_truncated = true;
            }
            self.line.extend_from_slice(&bytes[..room]);
        } else {
            self.line.extend_from_slice(bytes);
        }
    }

    fn end_line(&mut self) {
        let line = std::mem::take(&mut self.line);
        self.line_truncated = false;
        self.parse(&line);
        self.line = line;
        self.line.clear();
    }

    fn parse(&mut self, line: &[u8]) {
        if self.fault.is_some() {
            return;
        }
        let text = String::from_utf8_lossy(line);
        let parser = self.parser;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| parser.process_line(&text))) {
            let message = panic_message(payload.as_ref());
            error!(error = %message, "Parser fault, draining remaining output");
            self.fault = Some(message);
        }
    }

    fn finish(mut self) -> Result<(), RunError> {
        // A final line without a newline
        if !self.line.is_empty() {
            self.end_line();
        }
        if !self.console_failed {
            let _ = self.console.flush();
        }
        match self.fault {
            Some(message) => Err(RunError::ParserFault { message }),
            None => Ok(()),
        }
    }
}

/// Copies stderr to the console, giving up after the first write error
struct ErrorEcho<W: Write> {
    console: W,
    failed: bool,
}

impl<W: Write> ErrorEcho<W> {
    fn new(console: W) -> Self {
        Self {
            console,
            failed: false,
        }
    }

    fn write(&mut self, chunk: &[u8]) {
        if self.failed {
            return;
        }
        if let Err(e) = self.console.write_all(chunk) {
            warn!(error = %e, "Stderr echo failed, continuing without it");
            self.failed = true;
        }
    }
}

/// Copy `reader` to `console`, feeding each line to `parser`
///
/// Lines are cut at `max_line_bytes` before parsing; the console still gets
/// all of them. Reads to end of input even if the parser panics.
///
/// # Errors
///
/// Returns `RunError::ParserFault` if the parser panicked and
/// `RunError::Io` if reading fails.
pub fn tee_output<R: BufRead, W: Write>(
    mut reader: R,
    console: W,
    parser: &dyn StreamParser,
    max_line_bytes: usize,
) -> Result<(), RunError> {
    let mut tee = Tee::new(parser, console, max_line_bytes);
    loop {
        let available = match reader.fill_buf() {
            Ok(available) => available,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if available.is_empty() {
            break;
        }
        tee.push(available);
        let used = available.len();
        reader.consume(used);
    }
    tee.finish()
}

/// Drives a test process and reports its failures
pub struct Runner {
    sink: Arc<dyn ReportSink>,
    options: RunnerOptions,
    metadata: RunMetadata,
    parser: Box<dyn StreamParser>,
    result: Mutex<Arc<RunResult>>,
    crashes: Mutex<Vec<Failure>>,
    delivered: Arc<Mutex<HashSet<String>>>,
    started: Arc<AtomicBool>,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("options", &self.options)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Runner {
    /// Create a runner reporting to `sink`
    #[must_use]
    pub fn new(sink: Arc<dyn ReportSink>, options: RunnerOptions, metadata: RunMetadata) -> Self {
        let parser = new_parser(options.mode, options.parser.clone());
        Self {
            sink,
            options,
            result: Mutex::new(Arc::new(RunResult {
                metadata: metadata.clone(),
                ..RunResult::empty()
            })),
            metadata,
            parser,
            crashes: Mutex::new(Vec::new()),
            delivered: Arc::new(Mutex::new(HashSet::new())),
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A runner with its own parser and result, sharing this one's sink
    ///
    /// Scoped runners may execute concurrently. Failures already delivered
    /// by any of them are not delivered again.
    #[must_use]
    pub fn scoped(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            options: self.options.clone(),
            metadata: self.metadata.clone(),
            parser: new_parser(self.options.mode, self.options.parser.clone()),
            result: Mutex::new(Arc::new(RunResult {
                metadata: self.metadata.clone(),
                ..RunResult::empty()
            })),
            crashes: Mutex::new(Vec::new()),
            delivered: Arc::clone(&self.delivered),
            started: Arc::clone(&self.started),
        }
    }

    /// Latest published result
    #[must_use]
    pub fn results(&self) -> Arc<RunResult> {
        Arc::clone(&lock(&self.result))
    }

    fn ensure_started(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.sink.start(&self.metadata) {
            warn!(error = %e, "Report sink failed to start");
        }
    }

    /// Run `cmd` to completion
    ///
    /// # Errors
    ///
    /// See [`Runner::run_with_cancel`].
    pub async fn run(&self, cmd: Command) -> Result<RunOutcome, RunError> {
        self.run_with_cancel(cmd, future::pending()).await
    }

    /// Run `cmd` until it exits or `cancel` completes
    ///
    /// On cancellation the child is killed and its remaining output is
    /// still read and parsed. A parser panic is returned in
    /// [`RunOutcome::parser_fault`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or waited on.
    pub async fn run_with_cancel(
        &self,
        mut cmd: Command,
        cancel: impl Future<Output = ()>,
    ) -> Result<RunOutcome, RunError> {
        let program = cmd.as_std().get_program().to_string_lossy().into_owned();
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        self.ensure_started();
        let begin = Instant::now();
        let mut child = cmd.spawn().map_err(|source| RunError::Spawn {
            program: program.clone(),
            source,
        })?;
        info!(program = %program, pid = ?child.id(), "Started test process");

        let mut stdout = child.stdout.take().ok_or(RunError::MissingPipe("stdout"))?;
        let mut stderr = child.stderr.take().ok_or(RunError::MissingPipe("stderr"))?;

        let mut tee = Tee::new(
            self.parser.as_ref(),
            io::stdout(),
            self.options.parser.max_output_bytes,
        );
        let mut errors = ErrorStreamBuffer::new(self.options.max_stderr_bytes);
        let mut console_err = ErrorEcho::new(io::stderr());
        let mut out_chunk = vec![0u8; 8192];
        let mut err_chunk = vec![0u8; 8192];
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut cancelled = false;
        tokio::pin!(cancel);

        while stdout_open || stderr_open {
            tokio::select! {
                read = stdout.read(&mut out_chunk), if stdout_open => match read {
                    Ok(0) => stdout_open = false,
                    Ok(n) => tee.push(&out_chunk[..n]),
                    Err(e) => {
                        warn!(error = %e, "Reading test stdout failed");
                        stdout_open = false;
                    }
                },
                read = stderr.read(&mut err_chunk), if stderr_open => match read {
                    Ok(0) => stderr_open = false,
                    Ok(n) => {
                        console_err.write(&err_chunk[..n]);
                        errors.push(&err_chunk[..n]);
                    }
                    Err(e) => {
                        warn!(error = %e, "Reading test stderr failed");
                        stderr_open = false;
                    }
                },
                () = &mut cancel, if !cancelled => {
                    info!(program = %program, "Run cancelled, stopping test process");
                    cancelled = true;
                    if let Err(e) = child.start_kill() {
                        warn!(error = %e, "Failed to kill test process");
                    }
                }
            }
        }

        let status = child.wait().await?;
        let parser_fault = tee.finish().err();
        debug!(status = %status, cancelled, "Test process exited");

        if let Some(crash) = detect_crash(&errors.contents(), status.success()) {
            warn!(file = %crash.file, line = crash.line, "Test binary crashed");
            lock(&self.crashes).push(crash);
        }
        self.publish(begin.elapsed());

        Ok(RunOutcome {
            exit_code: status.code(),
            cancelled,
            parser_fault,
        })
    }

    /// Parse previously captured output from `reader`
    ///
    /// Nothing is echoed. The published result is returned.
    ///
    /// # Errors
    ///
    /// Returns `RunError::Io` if reading fails. A parser panic is logged
    /// and the partial result is still published.
    pub fn parse_input<R: BufRead>(&self, reader: R) -> Result<Arc<RunResult>, RunError> {
        self.ensure_started();
        let begin = Instant::now();
        match tee_output(
            reader,
            io::sink(),
            self.parser.as_ref(),
            self.options.parser.max_output_bytes,
        ) {
            Ok(()) => {}
            Err(e @ RunError::ParserFault { .. }) => warn!(error = %e, "Partial parse"),
            Err(e) => return Err(e),
        }
        self.publish(begin.elapsed());
        Ok(self.results())
    }

    /// Build a new result from the parser and replace the published one
    fn publish(&self, elapsed: Duration) {
        let stats = self.parser.stats();
        let crashes = lock(&self.crashes).clone();

        let status = if !crashes.is_empty() {
            RunStatus::Error
        } else if stats.failed > 0 {
            RunStatus::Failed
        } else {
            RunStatus::Passed
        };

        let mut result = RunResult {
            metadata: self.metadata.clone(),
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            ..RunResult::empty()
        };
        result.failures = self.parser.flush();
        result.failures.extend(crashes);
        result.summary.status = status;
        result.summary.total = stats.total;
        result.summary.unique_total = self.parser.unique_test_count();
        result.summary.passed = stats.passed;
        result.summary.failed = stats.failed;
        result.summary.skipped = stats.skipped;
        result.summary.duration = format_run_duration(elapsed);

        info!(
            status = %result.summary.status,
            total = result.summary.total,
            failed = result.summary.failed,
            failures = result.failures.len(),
            "Run finished"
        );
        *lock(&self.result) = Arc::new(result);
    }

    /// Deliver the latest result to the sink
    ///
    /// Each failure is delivered at most once across repeated calls and
    /// across scoped runners; the summary is written every time. Sink
    /// errors are logged and do not fail the run.
    pub fn finish(&self) -> Arc<RunResult> {
        self.ensure_started();
        let result = self.results();

        let mut fresh = Vec::new();
        {
            let mut delivered = lock(&self.delivered);
            let mut occurrences = HashMap::new();
            for failure in &result.failures {
                let n = occurrences.entry(failure.signature.as_str()).or_insert(0usize);
                *n += 1;
                if delivered.insert(format!("{}#{n}", failure.signature)) {
                    fresh.push(failure);
                }
            }
        }
        debug!(new = fresh.len(), total = result.failures.len(), "Delivering failures");

        for failure in fresh {
            if let Err(e) = self.sink.report_failure(failure) {
                warn!(test = %failure.test, error = %e, "Failed to report failure");
            }
        }
        if let Err(e) = self.sink.write_summary(&result) {
            warn!(error = %e, "Failed to write summary");
        }
        if let Err(e) = self.sink.flush() {
            warn!(error = %e, "Failed to flush reports");
        }
        result
    }

    /// Close the sink
    ///
    /// # Errors
    ///
    /// Returns the sink's close error.
    pub fn close(&self) -> Result<(), RunError> {
        self.sink.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_parse::{FailureKind, TestStats};
    use similar_asserts::assert_eq;

    /// Counts lines and panics on the first line containing `boom`
    #[derive(Default)]
    struct Exploding {
        lines: Mutex<Vec<String>>,
    }

    impl StreamParser for Exploding {
        fn process_line(&self, line: &str) {
            assert!(!line.contains("boom"), "parser exploded");
            lock(&self.lines).push(line.to_string());
        }

        fn failures(&self) -> Vec<Failure> {
            Vec::new()
        }

        fn stats(&self) -> TestStats {
            TestStats::default()
        }

        fn unique_test_count(&self) -> usize {
            0
        }

        fn flush(&self) -> Vec<Failure> {
            Vec::new()
        }
    }

    /// Sink recording every call
    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<String>>,
    }

    impl Recording {
        fn calls(&self) -> Vec<String> {
            lock(&self.calls).clone()
        }
    }

    impl ReportSink for Recording {
        fn start(&self, metadata: &RunMetadata) -> Result<(), ReportError> {
            lock(&self.calls).push(format!("start {}", metadata.platform));
            Ok(())
        }

        fn report_failure(&self, failure: &Failure) -> Result<(), ReportError> {
            lock(&self.calls).push(format!("failure {}", failure.test));
            Ok(())
        }

        fn write_summary(&self, result: &RunResult) -> Result<(), ReportError> {
            lock(&self.calls).push(format!("summary {}", result.summary.status));
            Ok(())
        }

        fn flush(&self) -> Result<(), ReportError> {
            Ok(())
        }

        fn close(&self) -> Result<(), ReportError> {
            lock(&self.calls).push("close".to_string());
            Ok(())
        }
    }

    const FAILING_STREAM: &str = concat!(
        r#"{"Action":"run","Package":"example.com/a","Test":"TestOne"}"#,
        "\n",
        r#"{"Action":"output","Package":"example.com/a","Test":"TestOne","Output":"    one_test.go:7: wrong answer\n"}"#,
        "\n",
        r#"{"Action":"fail","Package":"example.com/a","Test":"TestOne","Elapsed":0.01}"#,
        "\n",
        r#"{"Action":"run","Package":"example.com/a","Test":"TestTwo"}"#,
        "\n",
        r#"{"Action":"pass","Package":"example.com/a","Test":"TestTwo","Elapsed":0.01}"#,
        "\n",
    );

    fn runner(sink: Arc<dyn ReportSink>) -> Runner {
        Runner::new(
            sink,
            RunnerOptions {
                max_stderr_bytes: 4096,
                ..Default::default()
            },
            RunMetadata {
                platform: "local".to_string(),
                toolchain: "go".to_string(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_tee_copies_every_line() {
        let parser = Exploding::default();
        let mut console = Vec::new();
        tee_output("a\nb\nc".as_bytes(), &mut console, &parser, 1024).expect("tee");
        assert_eq!(String::from_utf8(console).expect("utf8"), "a\nb\nc");
        assert_eq!(lock(&parser.lines).len(), 3);
    }

    #[test]
    fn test_tee_caps_long_line_for_parser_only() {
        let parser = Exploding::default();
        let mut console = Vec::new();
        let long = "x".repeat(5 * 1024 * 1024);
        let input = format!("{long}\nnext\n{long}");
        let reader = io::BufReader::with_capacity(4096, input.as_bytes());

        tee_output(reader, &mut console, &parser, 64).expect("tee");

        assert_eq!(console.len(), input.len());
        let lines = lock(&parser.lines).clone();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "x".repeat(64));
        assert_eq!(lines[1], "next\n");
        assert_eq!(lines[2], "x".repeat(64));
    }

    /// Writer that fails every write and counts the attempts
    struct Broken<'a>(&'a mut usize);

    impl Write for Broken<'_> {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            *self.0 += 1;
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_stderr_echo_stops_after_first_error() {
        let mut attempts = 0;
        let mut echo = ErrorEcho::new(Broken(&mut attempts));
        echo.write(b"first\n");
        echo.write(b"second\n");
        echo.write(b"third\n");
        assert!(echo.failed);
        drop(echo);
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_tee_keeps_parsing_when_console_breaks() {
        let parser = Exploding::default();
        let mut attempts = 0;
        tee_output("a\nb\n".as_bytes(), Broken(&mut attempts), &parser, 1024).expect("tee");
        assert_eq!(attempts, 1);
        assert_eq!(lock(&parser.lines).len(), 2);
    }

    #[test]
    fn test_tee_drains_after_parser_fault() {
        let parser = Exploding::default();
        let mut console = Vec::new();
        let input = "one\nboom\nthree\nfour\n";

        let err = tee_output(input.as_bytes(), &mut console, &parser, 1024).expect_err("fault");
        match err {
            RunError::ParserFault { message } => assert!(message.contains("parser exploded")),
            other => panic!("unexpected error: {other}"),
        }
        // Everything still reached the console, the parser stopped at the fault
        assert_eq!(String::from_utf8(console).expect("utf8"), input);
        assert_eq!(*lock(&parser.lines), vec!["one\n".to_string()]);
    }

    #[test]
    fn test_parse_input_publishes_result() {
        let sink = Arc::new(Recording::default());
        let runner = runner(sink.clone());
        let result = runner.parse_input(FAILING_STREAM.as_bytes()).expect("parse");

        assert_eq!(result.summary.status, RunStatus::Failed);
        assert_eq!(result.summary.total, 2);
        assert_eq!(result.summary.passed, 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.metadata.platform, "local");
        assert!(Arc::ptr_eq(&result, &runner.results()));
    }

    #[test]
    fn test_results_replaced_not_mutated() {
        let runner = runner(Arc::new(Recording::default()));
        let before = runner.results();
        runner.parse_input(FAILING_STREAM.as_bytes()).expect("parse");
        assert!(before.is_empty());
        assert_eq!(runner.results().failures.len(), 1);
    }

    #[test]
    fn test_finish_delivers_at_most_once() {
        let sink = Arc::new(Recording::default());
        let runner = runner(sink.clone());
        runner.parse_input(FAILING_STREAM.as_bytes()).expect("parse");

        runner.finish();
        runner.finish();
        runner.close().expect("close");

        assert_eq!(
            sink.calls(),
            vec![
                "start local".to_string(),
                "failure TestOne".to_string(),
                "summary failed".to_string(),
                "summary failed".to_string(),
                "close".to_string(),
            ]
        );
    }

    #[test]
    fn test_scoped_runners_have_own_state() {
        let sink = Arc::new(Recording::default());
        let first = runner(sink.clone());
        let second = first.scoped();

        first.parse_input(FAILING_STREAM.as_bytes()).expect("parse");
        assert_eq!(first.results().failures.len(), 1);
        assert!(second.results().is_empty());

        second.parse_input(FAILING_STREAM.as_bytes()).expect("parse");
        first.finish();
        second.finish();

        // One start for the shared sink, and the shared failure once
        let calls = sink.calls();
        assert_eq!(calls.iter().filter(|c| c.starts_with("start")).count(), 1);
        assert_eq!(calls.iter().filter(|c| c.starts_with("failure")).count(), 1);
    }

    #[test]
    fn test_passing_run() {
        let runner = runner(Arc::new(Recording::default()));
        let stream = concat!(
            r#"{"Action":"run","Package":"p","Test":"TestA"}"#,
            "\n",
            r#"{"Action":"pass","Package":"p","Test":"TestA","Elapsed":0}"#,
            "\n",
        );
        let result = runner.parse_input(stream.as_bytes()).expect("parse");
        assert_eq!(result.summary.status, RunStatus::Passed);
        assert!(result.all_passed());
    }

    #[test]
    fn test_outcome_code() {
        let outcome = RunOutcome {
            exit_code: None,
            cancelled: true,
            parser_fault: None,
        };
        assert_eq!(outcome.code(), 1);
    }

    #[cfg(unix)]
    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_parses_child_output() {
        let sink = Arc::new(Recording::default());
        let runner = runner(sink.clone());
        let script = format!("cat <<'EOF'\n{FAILING_STREAM}EOF\nexit 1");

        let outcome = runner.run(sh(&script)).await.expect("run");
        assert_eq!(outcome.exit_code, Some(1));
        assert!(!outcome.cancelled);
        assert!(outcome.parser_fault.is_none());

        let result = runner.finish();
        assert_eq!(result.summary.status, RunStatus::Failed);
        assert_eq!(result.failures[0].test, "TestOne");
        assert_eq!(result.failures[0].error, "wrong answer");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_crash_on_stderr_becomes_fatal_failure() {
        let runner = runner(Arc::new(Recording::default()));
        let script = "echo 'fatal error: concurrent map writes' >&2; \
                      echo '\t/build/app/cache.go:88 +0x1d' >&2; exit 2";

        let outcome = runner.run(sh(script)).await.expect("run");
        assert_eq!(outcome.code(), 2);

        let result = runner.results();
        assert_eq!(result.summary.status, RunStatus::Error);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].kind, FailureKind::Fatal);
        assert!(result.failures[0].output.contains("concurrent map writes"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stderr_without_marker_is_not_a_crash() {
        let runner = runner(Arc::new(Recording::default()));
        let outcome = runner
            .run(sh("echo 'just a warning' >&2; exit 1"))
            .await
            .expect("run");
        assert_eq!(outcome.code(), 1);
        assert_eq!(runner.results().summary.status, RunStatus::Passed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_kills_child_and_keeps_parsed_output() {
        let runner = runner(Arc::new(Recording::default()));
        let script = r#"echo '{"Action":"run","Package":"p","Test":"TestSlow"}'; exec sleep 30"#;

        let begin = Instant::now();
        let outcome = runner
            .run_with_cancel(sh(script), tokio::time::sleep(Duration::from_millis(300)))
            .await
            .expect("run");

        assert!(outcome.cancelled);
        assert!(begin.elapsed() < Duration::from_secs(20));
        assert_eq!(runner.results().summary.total, 1);
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let runner = runner(Arc::new(Recording::default()));
        let err = runner
            .run(Command::new("faultline-definitely-missing-binary"))
            .await
            .expect_err("spawn should fail");
        assert!(matches!(err, RunError::Spawn { .. }));
    }
}
