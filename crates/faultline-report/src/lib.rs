// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! faultline-report: Report sinks for faultline
//!
//! Every sink implements [`ReportSink`]. A run calls `start` once,
//! `report_failure` once per failure, then `write_summary`, `flush` and
//! `close`. [`MultiSink`] fans the same calls out to several sinks.
//!
//! # Example
//!
//! ```no_run
//! use faultline_report::{GitHubSink, JsonLinesSink, ReportSink, combine};
//!
//! let sinks: Vec<Box<dyn ReportSink>> = vec![
//!     Box::new(JsonLinesSink::create(".faultline/ci-results.jsonl").unwrap()),
//!     Box::new(GitHubSink::from_env()),
//! ];
//! let sink = combine(sinks);
//! sink.flush().unwrap();
//! ```

pub mod error;
pub mod github;
pub mod jsonl;
pub mod sink;
pub mod terminal;

pub use error::ReportError;
pub use github::GitHubSink;
pub use jsonl::JsonLinesSink;
pub use sink::{MultiSink, NullSink, ReportSink, combine};
pub use terminal::TerminalSink;
