// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! Structured event parsing
//!
//! Consumes `go test -json` output: one [`TestEvent`] per line. Each test
//! moves through `started -> passed | failed | skipped`; its output is held
//! in a bounded ring buffer until the terminal event, at which point a
//! failing test is classified and the state is dropped.
//!
//! # Example
//!
//! ```
//! use faultline_parse::{EventParser, ParserOptions, StreamParser};
//!
//! let parser = EventParser::new(ParserOptions::default());
//! parser.process_line(r#"{"Action":"run","Package":"p","Test":"TestA"}"#);
//! parser.process_line(r#"{"Action":"output","Package":"p","Test":"TestA","Output":"    a_test.go:3: boom\n"}"#);
//! parser.process_line(r#"{"Action":"fail","Package":"p","Test":"TestA","Elapsed":0.1}"#);
//!
//! let failures = parser.flush();
//! assert_eq!(failures[0].error, "boom");
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use xxhash_rust::xxh3::xxh3_64;

use crate::classify;
use crate::error::ParseError;
use crate::parser::{ParserOptions, StreamParser, TRUNCATION_MARKER, TestStats};
use crate::result::Failure;
use crate::ring::RingBuffer;
use crate::strategy::{CaptureStrategy, REEVALUATE_EVERY};

/// One line of `go test -json` output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TestEvent {
    /// RFC 3339 timestamp
    #[serde(default)]
    pub time: Option<String>,
    /// `run`, `output`, `pass`, `fail`, `skip`, ...
    #[serde(default)]
    pub action: String,
    /// Package import path
    #[serde(default)]
    pub package: String,
    /// Test name, empty for package-level events
    #[serde(default)]
    pub test: String,
    /// Seconds elapsed, on terminal events
    #[serde(default)]
    pub elapsed: f64,
    /// Output fragment, newline included
    #[serde(default)]
    pub output: String,
}

/// Parse a single event
///
/// # Errors
///
/// Returns `ParseError::JsonParse` if the line is not a JSON event.
pub fn parse_event(line: &str) -> Result<TestEvent, ParseError> {
    serde_json::from_str(line).map_err(ParseError::from)
}

type TestKey = (String, String);

/// Output retained for a running test
#[derive(Debug)]
struct TestState {
    output: RingBuffer,
    bytes: usize,
    truncated: bool,
}

#[derive(Debug)]
struct EventState {
    strategy: CaptureStrategy,
    running: HashMap<TestKey, TestState>,
    failures: Vec<Failure>,
    signatures: HashSet<String>,
    /// Hashes of `package:test`.
    ///
    /// Only used for counting. A 64-bit hash keeps memory flat for huge
    /// suites; the birthday bound puts the chance of any collision at about
    /// 3e-12 for 10,000 tests and 3e-10 for 100,000. Failure identity goes
    /// through `signatures`, never through this set.
    unique: HashSet<u64>,
}

/// Parser for structured (`go test -json`) output
#[derive(Debug)]
pub struct EventParser {
    options: ParserOptions,
    state: Mutex<EventState>,
    started: AtomicUsize,
    passed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl EventParser {
    /// Create a parser
    #[must_use]
    pub fn new(options: ParserOptions) -> Self {
        Self {
            state: Mutex::new(EventState {
                strategy: options.strategy,
                running: HashMap::new(),
                failures: Vec::new(),
                signatures: HashSet::new(),
                unique: HashSet::new(),
            }),
            options,
            started: AtomicUsize::new(0),
            passed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EventState> {
        // A poisoned lock only means a previous call panicked; the state
        // itself is still consistent enough to keep counting.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current capture strategy
    #[must_use]
    pub fn strategy(&self) -> CaptureStrategy {
        self.lock().strategy
    }

    /// Dispatch a decoded event
    pub fn handle_event(&self, event: &TestEvent) {
        match event.action.as_str() {
            "run" | "start" => self.on_start(&event.package, &event.test),
            "output" => self.on_output(&event.package, &event.test, &event.output),
            "pass" => self.on_pass(&event.package, &event.test),
            "fail" => self.on_fail(&event.package, &event.test, event.elapsed, &event.output),
            "skip" => self.on_skip(&event.package, &event.test),
            _ => {}
        }
    }

    /// A test started
    pub fn on_start(&self, package: &str, test: &str) {
        if test.is_empty() {
            return;
        }

        let mut state = self.lock();
        let size = state.strategy.buffer_size(self.options.context_lines);
        state.running.insert(
            (package.to_string(), test.to_string()),
            TestState {
                output: RingBuffer::new(size),
                bytes: 0,
                truncated: false,
            },
        );
        state.unique.insert(xxh3_64(format!("{package}:{test}").as_bytes()));

        let started = self.started.fetch_add(1, Ordering::Relaxed) + 1;
        if self.options.adaptive && started % REEVALUATE_EVERY == 0 {
            let next = CaptureStrategy::select(started);
            if next != state.strategy {
                debug!(from = %state.strategy, to = %next, tests = started, "Capture strategy changed");
                state.strategy = next;
            }
        }
    }

    /// A test printed output
    pub fn on_output(&self, package: &str, test: &str, output: &str) {
        if test.is_empty() {
            return;
        }

        let max = self.options.max_output_bytes;
        let mut state = self.lock();
        let Some(test_state) = state.running.get_mut(&(package.to_string(), test.to_string()))
        else {
            return;
        };
        if test_state.truncated {
            return;
        }

        let bytes = test_state.bytes + output.len();
        if bytes > max {
            trace!(package, test, "Output cap reached, truncating");
            test_state.truncated = true;
            test_state.output.push(TRUNCATION_MARKER);
            return;
        }
        test_state.bytes = bytes;
        test_state.output.push(output);
    }

    /// A test passed
    pub fn on_pass(&self, package: &str, test: &str) {
        if test.is_empty() {
            return;
        }
        self.passed.fetch_add(1, Ordering::Relaxed);
        self.lock()
            .running
            .remove(&(package.to_string(), test.to_string()));
    }

    /// A test was skipped
    pub fn on_skip(&self, package: &str, test: &str) {
        if test.is_empty() {
            return;
        }
        self.skipped.fetch_add(1, Ordering::Relaxed);
        self.lock()
            .running
            .remove(&(package.to_string(), test.to_string()));
    }

    /// A test failed
    ///
    /// `trailing` is the output carried by the fail event itself; it is
    /// only used when nothing was accumulated for the test.
    pub fn on_fail(&self, package: &str, test: &str, elapsed: f64, trailing: &str) {
        if test.is_empty() {
            return;
        }
        self.failed.fetch_add(1, Ordering::Relaxed);

        let mut state = self.lock();
        let output = match state
            .running
            .remove(&(package.to_string(), test.to_string()))
        {
            Some(test_state) if !test_state.output.is_empty() => test_state.output.join(""),
            _ => trailing.to_string(),
        };

        let failure = classify::classify(package, test, elapsed, &output, self.options.context_lines);

        if self.options.dedup
            && !failure.signature.is_empty()
            && !state.signatures.insert(failure.signature.clone())
        {
            debug!(package, test, signature = %failure.signature, "Duplicate failure suppressed");
            return;
        }

        state.failures.push(failure);
    }
}

impl StreamParser for EventParser {
    fn process_line(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        // Banners and other non-JSON noise are expected
        if let Ok(event) = parse_event(line) {
            self.handle_event(&event);
        }
    }

    fn failures(&self) -> Vec<Failure> {
        filter_parent_failures(&self.lock().failures)
    }

    fn stats(&self) -> TestStats {
        TestStats {
            total: self.started.load(Ordering::Relaxed),
            passed: self.passed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }

    fn unique_test_count(&self) -> usize {
        self.lock().unique.len()
    }

    fn flush(&self) -> Vec<Failure> {
        self.failures()
    }
}

/// Drop failures of parent tests whose subtests also failed
///
/// Go reports `TestA` as failed whenever `TestA/sub` fails; only the leaf
/// is useful.
#[must_use]
pub fn filter_parent_failures(failures: &[Failure]) -> Vec<Failure> {
    if failures.len() <= 1 {
        return failures.to_vec();
    }

    let names: HashSet<(&str, &str)> = failures
        .iter()
        .map(|f| (f.package.as_str(), f.test.as_str()))
        .collect();

    failures
        .iter()
        .filter(|f| {
            let prefix = format!("{}/", f.test);
            !names
                .iter()
                .any(|(package, test)| *package == f.package && test.starts_with(&prefix))
        })
        .cloned()
        .collect()
}
