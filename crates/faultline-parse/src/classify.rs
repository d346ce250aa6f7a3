// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! Failure classification
//!
//! Stateless helpers that turn captured test output into the fields of a
//! [`Failure`]: kind, source location, stack trace, a short error message,
//! a deduplication signature and, when the source file is readable, a few
//! lines of context.
//!
//! Every helper is best effort. A pattern that does not match leaves the
//! corresponding field empty; nothing here returns an error.
//!
//! # Example
//!
//! ```
//! use faultline_parse::classify::{detect_kind, extract_location};
//! use faultline_parse::FailureKind;
//!
//! let output = "    math_test.go:12: expected 4, got 5\n";
//! assert_eq!(detect_kind(output), FailureKind::Test);
//!
//! let location = extract_location(output).unwrap();
//! assert_eq!(location.file, "math_test.go");
//! assert_eq!(location.line, 12);
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::result::{Failure, FailureKind, FuzzInfo, format_test_duration};

/// Message used when nothing better can be extracted from the output
pub const FALLBACK_MESSAGE: &str = "test failed";

/// Longest fallback message before it is cut
const MAX_MESSAGE_CHARS: usize = 200;

// Locations. All patterns work line-wise.

/// `    foo_test.go:42: message`. The character after the line number must
/// not be a digit, so `file.go:10:5:` falls through to the build pattern.
static TEST_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(\S+\.go):(\d+):(?:\D|$)").unwrap());
/// `	/full/path/file.go:15 +0x39`
pub(crate) static PANIC_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(/?\S+\.go):(\d+)[ \t]+\+0x").unwrap());
/// `./file.go:10:5: undefined: foo`
static BUILD_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\.?/?(\S+\.go):(\d+):(\d+):").unwrap());
/// Indented frame inside a race report
static RACE_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]+(\S+\.go):(\d+)[ \t]+\+0x").unwrap());

// Kinds

static PANIC_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"panic:").unwrap());
static RACE_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"WARNING: DATA RACE").unwrap());
static BUILD_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\./\S+\.go:\d+:\d+:").unwrap());
static FUZZ_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Failing input written to").unwrap());
static TIMEOUT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"test timed out after|panic: test timed out").unwrap());

/// `Failing input written to testdata/fuzz/FuzzFoo/582528ddfad69eb5`
pub(crate) static CORPUS_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Failing input written to (\S+)").unwrap());

/// Source position of a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// File as printed in the output
    pub file: String,
    /// 1-based line
    pub line: u32,
    /// 1-based column, build errors only
    pub column: Option<u32>,
}

/// Determine the failure kind from captured output
///
/// Checked in priority order: timeout, race, panic, build, fuzz. Anything
/// else is a plain test failure.
#[must_use]
pub fn detect_kind(output: &str) -> FailureKind {
    if TIMEOUT_MARKER.is_match(output) {
        FailureKind::Timeout
    } else if RACE_MARKER.is_match(output) {
        FailureKind::Race
    } else if PANIC_MARKER.is_match(output) {
        FailureKind::Panic
    } else if BUILD_ERROR.is_match(output) {
        FailureKind::Build
    } else if FUZZ_MARKER.is_match(output) {
        FailureKind::Fuzz
    } else {
        FailureKind::Test
    }
}

/// Check whether output contains both a panic and a race report
#[must_use]
pub fn is_race_related(output: &str) -> bool {
    PANIC_MARKER.is_match(output) && RACE_MARKER.is_match(output)
}

fn captured_u32(caps: &regex::Captures<'_>, index: usize) -> Option<u32> {
    caps.get(index).and_then(|m| m.as_str().parse().ok())
}

/// Extract the failing source location
///
/// Tries test assertions, panic frames, build errors and race frames, in
/// that order. The first pattern that matches anywhere in the output wins.
#[must_use]
pub fn extract_location(output: &str) -> Option<Location> {
    for pattern in [&TEST_LOCATION, &PANIC_LOCATION] {
        if let Some(caps) = pattern.captures(output) {
            return Some(Location {
                file: caps[1].to_string(),
                line: captured_u32(&caps, 2).unwrap_or(0),
                column: None,
            });
        }
    }

    if let Some(caps) = BUILD_LOCATION.captures(output) {
        return Some(Location {
            file: caps[1].to_string(),
            line: captured_u32(&caps, 2).unwrap_or(0),
            column: captured_u32(&caps, 3),
        });
    }

    RACE_LOCATION.captures(output).map(|caps| Location {
        file: caps[1].to_string(),
        line: captured_u32(&caps, 2).unwrap_or(0),
        column: None,
    })
}

/// Extract the first frame location of a crash dump
///
/// Lines are trimmed first, so frames indented with tabs still match.
#[must_use]
pub fn extract_crash_location(dump: &str) -> Option<Location> {
    dump.lines().find_map(|line| {
        let caps = PANIC_LOCATION.captures(line.trim())?;
        Some(Location {
            file: caps[1].to_string(),
            line: captured_u32(&caps, 2).unwrap_or(0),
            column: None,
        })
    })
}

/// Extract a goroutine stack trace
///
/// Starts at the first line beginning with `goroutine ` and runs through
/// the next blank line or the next `panic:` line, inclusive.
#[must_use]
pub fn extract_stack_trace(output: &str) -> Option<String> {
    let mut stack: Vec<&str> = Vec::new();

    for line in output.split('\n') {
        if stack.is_empty() && !line.starts_with("goroutine ") {
            continue;
        }
        stack.push(line);
        if line.is_empty() || (stack.len() > 1 && line.starts_with("panic:")) {
            break;
        }
    }

    if stack.is_empty() {
        None
    } else {
        Some(stack.join("\n"))
    }
}

/// Extract a concise error message
///
/// Prefers a line mentioning `Error:`, `error:`, `FAIL:` or `panic:`, then
/// the message of a `file.go:N: message` line, then the first line that is
/// not a `---`/`===` marker. Never empty.
#[must_use]
pub fn extract_error_message(output: &str) -> String {
    for line in output.lines().map(str::trim) {
        if ["Error:", "error:", "FAIL:", "panic:"]
            .iter()
            .any(|marker| line.contains(marker))
        {
            return line.to_string();
        }
        if TEST_LOCATION.is_match(line) {
            let message = line.splitn(3, ':').nth(2).map(str::trim).unwrap_or("");
            if !message.is_empty() {
                return message.to_string();
            }
        }
    }

    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("---") && !line.starts_with("==="))
        .map(|line| {
            if line.chars().count() > MAX_MESSAGE_CHARS {
                let cut: String = line.chars().take(MAX_MESSAGE_CHARS).collect();
                format!("{cut}...")
            } else {
                line.to_string()
            }
        })
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
}

/// Deduplication signature for a failure
///
/// The first 8 bytes of a SHA-256 over package, test, file, line and kind,
/// hex encoded. Deterministic across calls and processes.
#[must_use]
pub fn signature(package: &str, test: &str, file: &str, line: u32, kind: FailureKind) -> String {
    let data = format!("{package}:{test}:{file}:{line}:{kind}");
    let digest = Sha256::digest(data.as_bytes());
    hex::encode(&digest[..8])
}

/// Read the source lines around `file:line`
///
/// Returns up to `context_lines` lines on each side, formatted as
/// `"> {line:4} | text"` for the failing line and `"  {line:4} | text"`
/// otherwise. An unreadable file yields an empty vector.
#[must_use]
pub fn capture_context(file: impl AsRef<Path>, line: u32, context_lines: usize) -> Vec<String> {
    let path = file.as_ref();
    if path.as_os_str().is_empty() || line == 0 || context_lines == 0 {
        return Vec::new();
    }

    let handle = match File::open(path) {
        Ok(handle) => handle,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Source context unavailable");
            return Vec::new();
        }
    };

    let line = line as usize;
    let start = line.saturating_sub(context_lines).max(1);
    let end = line + context_lines;
    let mut context = Vec::new();

    for (index, text) in BufReader::new(handle).lines().enumerate() {
        let number = index + 1;
        if number > end {
            break;
        }
        let text = match text {
            Ok(text) => text,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Source context unreadable");
                return Vec::new();
            }
        };
        if number >= start {
            let marker = if number == line { ">" } else { " " };
            context.push(format!("{marker} {number:4} | {text}"));
        }
    }

    context
}

/// Extract fuzz details from output
///
/// Reads the corpus entry when its path is printed, see [`fuzz_info_for`].
#[must_use]
pub fn extract_fuzz_info(output: &str) -> FuzzInfo {
    let corpus_path = CORPUS_PATH
        .captures(output)
        .map(|caps| caps[1].to_string())
        .unwrap_or_default();
    fuzz_info_for(&corpus_path, output.contains("/seed#"))
}

/// Fuzz details for a known corpus entry
///
/// Entries containing control bytes other than newline, carriage return
/// and tab are flagged as binary and their content is omitted.
#[must_use]
pub fn fuzz_info_for(corpus_path: &str, from_seed: bool) -> FuzzInfo {
    let mut info = FuzzInfo {
        corpus_path: corpus_path.to_string(),
        from_seed,
        ..FuzzInfo::default()
    };
    if corpus_path.is_empty() {
        return info;
    }

    match std::fs::read(corpus_path) {
        Ok(data) => {
            info.is_binary = data
                .iter()
                .any(|&b| b < 32 && !matches!(b, b'\n' | b'\r' | b'\t'));
            if !info.is_binary {
                info.input = String::from_utf8_lossy(&data).into_owned();
            }
        }
        Err(e) => {
            debug!(path = %corpus_path, error = %e, "Fuzz corpus entry unreadable");
        }
    }
    info
}

/// Build a fully classified failure from a test's captured output
#[must_use]
pub fn classify(
    package: &str,
    test: &str,
    elapsed_secs: f64,
    output: &str,
    context_lines: usize,
) -> Failure {
    let kind = detect_kind(output);
    let mut failure = Failure {
        package: package.to_string(),
        test: test.to_string(),
        output: output.to_string(),
        kind,
        duration: format_test_duration(elapsed_secs),
        ..Failure::default()
    };

    match kind {
        FailureKind::Race => failure.stack = extract_stack_trace(output),
        FailureKind::Panic => {
            failure.race_related = is_race_related(output);
            failure.stack = extract_stack_trace(output);
        }
        FailureKind::Fuzz => failure.fuzz_info = Some(extract_fuzz_info(output)),
        _ => {}
    }

    if let Some(location) = extract_location(output) {
        failure.file = location.file;
        failure.line = location.line;
        failure.column = location.column;
    }

    if !failure.file.is_empty() && failure.line > 0 {
        failure.context = capture_context(&failure.file, failure.line, context_lines);
    }

    failure.signature = signature(package, test, &failure.file, failure.line, kind);
    failure.error = extract_error_message(output);
    failure
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;
    use std::io::Write;

    #[test]
    fn test_detect_kind_default_is_test() {
        assert_eq!(detect_kind("    foo_test.go:3: nope\n"), FailureKind::Test);
        assert_eq!(detect_kind(""), FailureKind::Test);
    }

    #[test]
    fn test_timeout_wins_over_panic() {
        let output = "panic: test timed out after 10m0s\n\ngoroutine 1 [running]:\n";
        assert_eq!(detect_kind(output), FailureKind::Timeout);
    }

    #[test]
    fn test_race_wins_over_panic() {
        let output = "WARNING: DATA RACE\nWrite at 0x00c000\npanic: boom\n";
        assert_eq!(detect_kind(output), FailureKind::Race);
        assert!(is_race_related(output));
    }

    #[test]
    fn test_detect_build_and_fuzz() {
        assert_eq!(
            detect_kind("./main.go:10:5: undefined: foo\n"),
            FailureKind::Build
        );
        assert_eq!(
            detect_kind("Failing input written to testdata/fuzz/FuzzX/abc\n"),
            FailureKind::Fuzz
        );
    }

    #[test]
    fn test_extract_location_test_assertion() {
        let output = "=== RUN   TestAdd\n    add_test.go:17: got 3\n";
        let location = extract_location(output).expect("location");
        assert_eq!(location.file, "add_test.go");
        assert_eq!(location.line, 17);
        assert_eq!(location.column, None);
    }

    #[test]
    fn test_extract_location_panic_frame() {
        let output = "panic: boom\n\ngoroutine 7 [running]:\nmain.f()\n\t/src/app/f.go:15 +0x39\n";
        let location = extract_location(output).expect("location");
        assert_eq!(location.file, "/src/app/f.go");
        assert_eq!(location.line, 15);
    }

    #[test]
    fn test_extract_location_build_error_has_column() {
        let location = extract_location("./main.go:10:5: undefined: foo").expect("location");
        assert_eq!(location.file, "main.go");
        assert_eq!(location.line, 10);
        assert_eq!(location.column, Some(5));
    }

    #[test]
    fn test_extract_location_none() {
        assert_eq!(extract_location("nothing to see"), None);
    }

    #[test]
    fn test_extract_crash_location() {
        let dump = "fatal error: concurrent map writes\n\ngoroutine 1 [running]:\nmain.main()\n\t/src/main.go:42 +0x1d\n";
        let location = extract_crash_location(dump).expect("location");
        assert_eq!(location.file, "/src/main.go");
        assert_eq!(location.line, 42);
    }

    #[test]
    fn test_extract_stack_trace() {
        let output = "panic: boom\n\ngoroutine 1 [running]:\nmain.f()\n\t/src/f.go:3 +0x1\n\nexit status 2\n";
        let stack = extract_stack_trace(output).expect("stack");
        assert_eq!(stack, "goroutine 1 [running]:\nmain.f()\n\t/src/f.go:3 +0x1\n");
        assert_eq!(extract_stack_trace("no goroutines here"), None);
    }

    #[test]
    fn test_extract_stack_trace_stops_at_repeated_panic() {
        let output = "goroutine 1 [running]:\nmain.f()\npanic: again\nmore";
        let stack = extract_stack_trace(output).expect("stack");
        assert_eq!(stack, "goroutine 1 [running]:\nmain.f()\npanic: again");
    }

    #[test]
    fn test_error_message_first_matching_line_wins() {
        let output = "    foo_test.go:9: first\n    Error: second\n";
        assert_eq!(extract_error_message(output), "first");
        assert_eq!(extract_error_message("noise\npanic: nil map\n"), "panic: nil map");
    }

    #[test]
    fn test_error_message_from_location_line() {
        let output = "=== RUN   T\n    assert_test.go:10: boom\n";
        assert_eq!(extract_error_message(output), "boom");
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(extract_error_message(""), FALLBACK_MESSAGE);
        assert_eq!(extract_error_message("--- FAIL\n=== RUN\n"), FALLBACK_MESSAGE);
        assert_eq!(extract_error_message("=== RUN T\nsomething odd\n"), "something odd");

        let long = "x".repeat(250);
        let message = extract_error_message(&long);
        assert_eq!(message.len(), MAX_MESSAGE_CHARS + 3);
        assert!(message.ends_with("..."));
    }

    #[test]
    fn test_signature_is_stable() {
        let a = signature("pkg", "TestA", "a_test.go", 10, FailureKind::Test);
        let b = signature("pkg", "TestA", "a_test.go", 10, FailureKind::Test);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, signature("pkg", "TestA", "a_test.go", 11, FailureKind::Test));
        assert_ne!(a, signature("pkg", "TestA", "a_test.go", 10, FailureKind::Panic));
    }

    #[test]
    fn test_capture_context_marks_line() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        for i in 1..=10 {
            writeln!(file, "line {i}").expect("write");
        }

        let context = capture_context(file.path(), 5, 2);
        assert_eq!(
            context,
            vec![
                "     3 | line 3",
                "     4 | line 4",
                ">    5 | line 5",
                "     6 | line 6",
                "     7 | line 7",
            ]
        );
    }

    #[test]
    fn test_capture_context_clamps_at_start() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "first\nsecond\nthird").expect("write");

        let context = capture_context(file.path(), 1, 5);
        assert_eq!(context.len(), 3);
        assert!(context[0].starts_with('>'));
    }

    #[test]
    fn test_capture_context_missing_file_is_empty() {
        assert!(capture_context("/nonexistent/file_test.go", 3, 2).is_empty());
        assert!(capture_context("", 3, 2).is_empty());
    }

    #[test]
    fn test_extract_fuzz_info_reads_text_corpus() {
        let dir = tempfile::tempdir().expect("temp dir");
        let entry = dir.path().join("582528ddfad69eb5");
        std::fs::write(&entry, "go test fuzz v1\nstring(\"x\")\n").expect("write");

        let output = format!("Failing input written to {}\n", entry.display());
        let info = extract_fuzz_info(&output);
        assert_eq!(info.corpus_path, entry.display().to_string());
        assert!(!info.is_binary);
        assert!(info.input.starts_with("go test fuzz v1"));
        assert!(!info.from_seed);
    }

    #[test]
    fn test_extract_fuzz_info_binary_corpus() {
        let dir = tempfile::tempdir().expect("temp dir");
        let entry = dir.path().join("bin");
        std::fs::write(&entry, [0x00u8, 0x01, 0x41]).expect("write");

        let output = format!("    --- FAIL: FuzzX/seed#0\nFailing input written to {}\n", entry.display());
        let info = extract_fuzz_info(&output);
        assert!(info.is_binary);
        assert!(info.input.is_empty());
        assert!(info.from_seed);
    }

    #[test]
    fn test_classify_assertion() {
        let output = "=== RUN   TestSum\n    sum_test.go:8: want 2\n--- FAIL: TestSum (0.50s)\n";
        let failure = classify("example.com/sum", "TestSum", 0.5, output, 0);
        assert_eq!(failure.kind, FailureKind::Test);
        assert_eq!(failure.file, "sum_test.go");
        assert_eq!(failure.line, 8);
        assert_eq!(failure.error, "want 2");
        assert_eq!(failure.duration, "500ms");
        assert_eq!(
            failure.signature,
            signature("example.com/sum", "TestSum", "sum_test.go", 8, FailureKind::Test)
        );
        assert!(failure.stack.is_none());
        assert!(failure.context.is_empty());
    }

    #[test]
    fn test_classify_panic_with_race() {
        let output = "panic: boom [recovered]\nWARNING: DATA RACE\n";
        let failure = classify("p", "TestP", 0.0, output, 0);
        // Race outranks panic
        assert_eq!(failure.kind, FailureKind::Race);

        let output = "panic: boom\n\ngoroutine 4 [running]:\nmain.g()\n\t/src/g.go:9 +0x2\n";
        let failure = classify("p", "TestP", 0.0, output, 0);
        assert_eq!(failure.kind, FailureKind::Panic);
        assert!(!failure.race_related);
        assert_eq!(failure.file, "/src/g.go");
        assert!(failure.stack.expect("stack").starts_with("goroutine 4"));
    }
}
