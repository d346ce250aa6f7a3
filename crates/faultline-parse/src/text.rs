// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! Plain-text parsing
//!
//! Fallback for runs that print the human-readable `go test` output
//! instead of JSON events. A failure record opens at `--- FAIL:` and stays
//! open, collecting lines into a ring buffer, until the next test header or
//! package result line closes it.
//!
//! Text mode has no start events, so `stats().total` counts reported tests
//! and `stats().skipped` is always zero.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, MutexGuard};

use regex::Regex;
use tracing::trace;

use crate::classify::{
    self, CORPUS_PATH, PANIC_LOCATION, capture_context, extract_stack_trace, fuzz_info_for,
};
use crate::parser::{ParserOptions, StreamParser, TRUNCATION_MARKER, TestStats};
use crate::result::{Failure, FailureKind, format_test_duration};
use crate::ring::RingBuffer;

static FAIL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^---\s*FAIL:\s+([A-Za-z][A-Za-z0-9_/]*)\s*\(([0-9.]+)([a-z]*)\)").unwrap()
});
static PASS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^---\s*PASS:\s+([A-Za-z][A-Za-z0-9_/]*)\s*\(([0-9.]+)([a-z]*)\)").unwrap()
});
static PACKAGE_FAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^FAIL\s+(\S+)\s+([0-9.]+)s").unwrap());
static PACKAGE_OK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ok\s+(\S+)\s+([0-9.]+)s").unwrap());

static PANIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^panic:\s*(.+)").unwrap());
static FATAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^fatal error:\s*(.+)").unwrap());
static RUNTIME_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^runtime error:\s*(.+)").unwrap());
static DATA_RACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"WARNING:\s*DATA\s*RACE").unwrap());
static LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\S+\.go):(\d+):\s*(.*)").unwrap());

/// Convert a printed elapsed time to seconds
///
/// `unit` is the suffix following the number: `ms`, `s`, `m`, or nothing
/// (seconds). Unknown units are read as seconds; unparsable values yield
/// `0.0`.
#[must_use]
pub fn parse_elapsed(value: &str, unit: &str) -> f64 {
    let Ok(number) = value.parse::<f64>() else {
        return 0.0;
    };
    match unit {
        "" | "s" => number,
        "ms" => number / 1000.0,
        "m" => number * 60.0,
        _ => number,
    }
}

/// A failure being collected
#[derive(Debug)]
struct OpenFailure {
    package: String,
    test: String,
    elapsed: f64,
    output: RingBuffer,
    bytes: usize,
    truncated: bool,
    kind: FailureKind,
    error: String,
    file: String,
    line: u32,
    corpus_path: String,
    crashed: bool,
}

#[derive(Debug)]
struct Recorded {
    elapsed: f64,
    failure: Failure,
}

#[derive(Debug, Default)]
struct TextState {
    current: Option<OpenFailure>,
    recorded: Vec<Recorded>,
    /// Largest finalized elapsed time per test name
    seen: HashMap<String, f64>,
    stats: TestStats,
}

/// Parser for plain `go test` console output
#[derive(Debug)]
pub struct TextParser {
    options: ParserOptions,
    state: Mutex<TextState>,
}

impl TextParser {
    /// Create a parser
    #[must_use]
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            state: Mutex::new(TextState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TextState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn finalize(&self, state: &mut TextState) {
        let Some(open) = state.current.take() else {
            return;
        };

        let output = open.output.join("\n");
        let error = if open.error.is_empty() {
            classify::extract_error_message(&output)
        } else {
            open.error
        };

        let mut failure = Failure {
            package: open.package,
            test: open.test,
            error,
            kind: open.kind,
            file: open.file,
            line: open.line,
            duration: format_test_duration(open.elapsed),
            ..Failure::default()
        };

        if open.crashed {
            failure.stack = extract_stack_trace(&output);
        }
        if !open.corpus_path.is_empty() {
            failure.fuzz_info = Some(fuzz_info_for(&open.corpus_path, output.contains("/seed#")));
        }
        if !failure.file.is_empty() && failure.line > 0 {
            failure.context = capture_context(&failure.file, failure.line, self.options.context_lines);
        }
        failure.signature = classify::signature(
            &failure.package,
            &failure.test,
            &failure.file,
            failure.line,
            failure.kind,
        );
        failure.output = output;

        state.seen.insert(failure.test.clone(), open.elapsed);
        state.recorded.push(Recorded {
            elapsed: open.elapsed,
            failure,
        });
    }

    fn on_fail_line(&self, state: &mut TextState, test: &str, elapsed: f64) {
        self.finalize(state);

        // A later, slower report of the same test replaces the earlier one
        // at dedup time; an equal or faster one is ignored outright.
        if state.seen.get(test).is_some_and(|&previous| elapsed <= previous) {
            trace!(test, "Repeated failure report ignored");
            return;
        }

        state.stats.total += 1;
        state.stats.failed += 1;
        state.current = Some(OpenFailure {
            package: String::new(),
            test: test.to_string(),
            elapsed,
            output: RingBuffer::new(self.options.context_lines * 2),
            bytes: 0,
            truncated: false,
            kind: FailureKind::Fuzz,
            error: String::new(),
            file: String::new(),
            line: 0,
            corpus_path: String::new(),
            crashed: false,
        });
    }

    fn on_pass_line(&self, state: &mut TextState, test: &str) {
        self.finalize(state);
        if !state.seen.contains_key(test) {
            state.stats.total += 1;
            state.stats.passed += 1;
        }
    }

    fn on_package_line(&self, state: &mut TextState, package: &str) {
        self.finalize(state);
        for recorded in state.recorded.iter_mut().filter(|r| r.failure.package.is_empty()) {
            let failure = &mut recorded.failure;
            failure.package = package.to_string();
            failure.signature = classify::signature(
                &failure.package,
                &failure.test,
                &failure.file,
                failure.line,
                failure.kind,
            );
        }
    }
}

impl OpenFailure {
    fn capture(&mut self, line: &str, max_bytes: usize) {
        self.keep(line, max_bytes);

        let trimmed = line.trim_start();
        if let Some(caps) = PANIC.captures(trimmed) {
            self.kind = FailureKind::Panic;
            self.crashed = true;
            self.set_error(&caps[1]);
        } else if let Some(caps) = FATAL.captures(trimmed) {
            self.kind = FailureKind::Fatal;
            self.crashed = true;
            self.set_error(&caps[1]);
        } else if let Some(caps) = RUNTIME_ERROR.captures(trimmed) {
            self.kind = FailureKind::Panic;
            self.set_error(&format!("runtime error: {}", &caps[1]));
        } else if DATA_RACE.is_match(line) {
            self.kind = FailureKind::Race;
            self.set_error("data race detected");
        } else if let Some(caps) = CORPUS_PATH.captures(line) {
            self.kind = FailureKind::Fuzz;
            self.corpus_path = caps[1].to_string();
        }

        if self.file.is_empty() {
            if let Some(caps) = LOCATION.captures(line) {
                self.file = caps[1].to_string();
                self.line = caps[2].parse().unwrap_or(0);
                let message = caps[3].trim();
                if !message.is_empty() {
                    self.set_error(message);
                }
            } else if let Some(caps) = PANIC_LOCATION.captures(line) {
                self.file = caps[1].to_string();
                self.line = caps[2].parse().unwrap_or(0);
            }
        }
    }

    /// Retain `line` unless the record's output cap is reached
    ///
    /// Lines past the cap are still classified, only not stored.
    fn keep(&mut self, line: &str, max_bytes: usize) {
        if self.truncated {
            return;
        }
        let bytes = self.bytes + line.len();
        if bytes > max_bytes {
            trace!(test = %self.test, "Output cap reached, truncating");
            self.truncated = true;
            self.output.push(TRUNCATION_MARKER);
            return;
        }
        self.bytes = bytes;
        self.output.push(line);
    }

    fn set_error(&mut self, message: &str) {
        if self.error.is_empty() {
            self.error = message.to_string();
        }
    }
}

impl StreamParser for TextParser {
    fn process_line(&self, line: &str) {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut state = self.lock();

        if let Some(caps) = FAIL_LINE.captures(line) {
            let elapsed = parse_elapsed(&caps[2], &caps[3]);
            self.on_fail_line(&mut state, &caps[1], elapsed);
        } else if let Some(caps) = PASS_LINE.captures(line) {
            self.on_pass_line(&mut state, &caps[1]);
        } else if let Some(caps) = PACKAGE_FAIL.captures(line) {
            self.on_package_line(&mut state, &caps[1]);
        } else if let Some(caps) = PACKAGE_OK.captures(line) {
            self.on_package_line(&mut state, &caps[1]);
        } else if let Some(open) = state.current.as_mut() {
            open.capture(line, self.options.max_output_bytes);
        }
    }

    fn failures(&self) -> Vec<Failure> {
        let state = self.lock();
        if !self.options.dedup {
            return state.recorded.iter().map(|r| r.failure.clone()).collect();
        }

        // Longest run per test name, in first-seen order
        let mut order: Vec<&str> = Vec::new();
        let mut best: HashMap<&str, &Recorded> = HashMap::new();
        for recorded in &state.recorded {
            let name = recorded.failure.test.as_str();
            match best.get(name).map(|existing| existing.elapsed) {
                None => {
                    order.push(name);
                    best.insert(name, recorded);
                }
                Some(elapsed) if recorded.elapsed > elapsed => {
                    best.insert(name, recorded);
                }
                Some(_) => {}
            }
        }
        order
            .into_iter()
            .filter_map(|name| best.get(name).map(|r| r.failure.clone()))
            .collect()
    }

    fn stats(&self) -> TestStats {
        self.lock().stats
    }

    fn unique_test_count(&self) -> usize {
        self.lock().stats.total
    }

    fn flush(&self) -> Vec<Failure> {
        {
            let mut state = self.lock();
            self.finalize(&mut state);
        }
        self.failures()
    }
}
