// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! faultline-parse: Streaming test-output parsing for faultline
//!
//! This library crate turns the output of a Go test run into classified
//! [`Failure`] records while the run is still in progress. Two output
//! shapes are understood:
//!
//! - structured `go test -json` events, handled by [`EventParser`]
//! - plain console text, handled by [`TextParser`]
//!
//! Both implement [`StreamParser`] and keep per-test memory bounded with a
//! [`RingBuffer`] whose size follows the adaptive [`CaptureStrategy`].
//!
//! # Example
//!
//! ```
//! use faultline_parse::{ParseMode, ParserOptions, new_parser, parse_reader};
//!
//! let output = "--- FAIL: TestAdd (0.02s)\n    math_test.go:12: expected 4, got 5\nFAIL\texample.com/math\t0.1s\n";
//! let parser = new_parser(ParseMode::Text, ParserOptions::default());
//! let failures = parse_reader(parser.as_ref(), output.as_bytes()).unwrap();
//!
//! assert_eq!(failures[0].location().as_deref(), Some("math_test.go:12"));
//! ```

pub mod classify;
pub mod crash;
pub mod error;
pub mod event;
pub mod parser;
pub mod result;
pub mod ring;
pub mod strategy;
pub mod text;

pub use crash::{ErrorStreamBuffer, detect_crash};
pub use error::ParseError;
pub use event::{EventParser, TestEvent, filter_parent_failures};
pub use parser::{
    ParseMode, ParserOptions, StreamParser, TestStats, new_parser, parse_reader, read_line_capped,
};
pub use result::{
    Failure, FailureKind, FuzzInfo, RunMetadata, RunResult, RunStatus, RunSummary,
};
pub use ring::RingBuffer;
pub use strategy::CaptureStrategy;
pub use text::TextParser;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::ParseError;
    pub use crate::parser::{ParseMode, ParserOptions, StreamParser, new_parser};
    pub use crate::result::{Failure, FailureKind, RunResult, RunSummary};
}
