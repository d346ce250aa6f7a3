// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! faultline library
//!
//! This module exports the runner, configuration and CI detection used by
//! the `faultline` binary, for use in integration tests and as a library.

pub mod ci;
pub mod config;
pub mod runner;
pub mod sinks;

pub use config::{Command, Config, ConfigError, Options};
pub use runner::{RunError, RunOutcome, Runner, RunnerOptions, tee_output};
