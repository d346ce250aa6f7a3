// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! The interface shared by the structured and plain-text parsers

use std::io::{self, BufRead};

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::event::EventParser;
use crate::result::Failure;
use crate::strategy::CaptureStrategy;
use crate::text::TextParser;

/// Default cap on retained output per test (10 MiB)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Default number of source context lines
pub const DEFAULT_CONTEXT_LINES: usize = 20;

/// Largest accepted number of source context lines
pub const MAX_CONTEXT_LINES: usize = 100;

/// Line appended once a test's output exceeds the byte cap
pub const TRUNCATION_MARKER: &str = "\n...[output truncated]...\n";

/// Options shared by both parsers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// Source lines captured on each side of a failure location
    pub context_lines: usize,
    /// Initial capture strategy
    pub strategy: CaptureStrategy,
    /// Re-evaluate the strategy as more tests start
    pub adaptive: bool,
    /// Suppress repeated failures
    pub dedup: bool,
    /// Output bytes retained per test before truncation
    pub max_output_bytes: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            context_lines: DEFAULT_CONTEXT_LINES,
            strategy: CaptureStrategy::Smart,
            adaptive: true,
            dedup: true,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl ParserOptions {
    /// Set the number of context lines, clamped to `0..=100`
    #[must_use]
    pub fn with_context_lines(mut self, lines: usize) -> Self {
        self.context_lines = lines.min(MAX_CONTEXT_LINES);
        self
    }

    /// Pin the capture strategy, disabling adaptive re-evaluation
    #[must_use]
    pub fn with_fixed_strategy(mut self, strategy: CaptureStrategy) -> Self {
        self.strategy = strategy;
        self.adaptive = false;
        self
    }

    /// Enable or disable deduplication
    #[must_use]
    pub fn with_dedup(mut self, dedup: bool) -> Self {
        self.dedup = dedup;
        self
    }

    /// Set the per-test output cap; zero keeps the default
    #[must_use]
    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = if bytes == 0 {
            DEFAULT_MAX_OUTPUT_BYTES
        } else {
            bytes
        };
        self
    }
}

/// Test counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStats {
    /// Tests started (or, in text mode, reported)
    pub total: usize,
    /// Tests passed
    pub passed: usize,
    /// Tests failed
    pub failed: usize,
    /// Tests skipped
    pub skipped: usize,
}

/// Which output shape a parser understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// One JSON event per line
    #[default]
    Structured,
    /// Plain console text
    Text,
}

/// A line-oriented test output parser
///
/// Implementations are internally synchronized: every method takes `&self`
/// and may be called from another thread while lines are being fed.
pub trait StreamParser: Send + Sync {
    /// Feed one line of output, with or without its trailing newline
    ///
    /// Lines that do not fit the expected shape are skipped.
    fn process_line(&self, line: &str);

    /// Failures collected so far, after deduplication and filtering
    fn failures(&self) -> Vec<Failure>;

    /// Current counters
    fn stats(&self) -> TestStats;

    /// Number of distinct tests seen
    fn unique_test_count(&self) -> usize;

    /// Finish any open record and return the final failure list
    fn flush(&self) -> Vec<Failure>;
}

/// Build a parser for `mode`
#[must_use]
pub fn new_parser(mode: ParseMode, options: ParserOptions) -> Box<dyn StreamParser> {
    match mode {
        ParseMode::Structured => Box::new(EventParser::new(options)),
        ParseMode::Text => Box::new(TextParser::new(options)),
    }
}

/// Read one line into `buf`, keeping at most `max_bytes` of it
///
/// The rest of an overlong line is consumed and dropped. Returns the number
/// of bytes consumed, zero at end of input.
///
/// # Errors
///
/// Returns the reader's error.
pub fn read_line_capped<R: BufRead + ?Sized>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_bytes: usize,
) -> io::Result<usize> {
    let mut consumed = 0;
    loop {
        let available = match reader.fill_buf() {
            Ok(available) => available,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            return Ok(consumed);
        }
        let (chunk, done) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (&available[..=i], true),
            None => (available, false),
        };
        let room = max_bytes.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
        let used = chunk.len();
        reader.consume(used);
        consumed += used;
        if done {
            return Ok(consumed);
        }
    }
}

/// Feed every line of `reader` to `parser`, then flush it
///
/// Invalid UTF-8 is replaced rather than rejected. Lines longer than
/// [`DEFAULT_MAX_OUTPUT_BYTES`] are cut at that length.
///
/// # Errors
///
/// Returns `ParseError::Io` if reading fails.
pub fn parse_reader<R: BufRead>(
    parser: &dyn StreamParser,
    mut reader: R,
) -> Result<Vec<Failure>, ParseError> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if read_line_capped(&mut reader, &mut buf, DEFAULT_MAX_OUTPUT_BYTES)? == 0 {
            break;
        }
        parser.process_line(&String::from_utf8_lossy(&buf));
    }
    Ok(parser.flush())
}
