// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! faultline: run Go tests and report their failures to CI
//!
//! `faultline run -- go test -json ./...` echoes the test output unchanged
//! while classifying failures, then writes the configured reports and
//! exits with the test command's exit code.

use std::fs::File;
use std::io::{self, BufReader};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use faultline::config::{Command, Config, Options};
use faultline::{Runner, RunnerOptions, ci, sinks};
use faultline_parse::RunStatus;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn runner_for(options: &Options) -> (Runner, sinks::Sinks) {
    let metadata = ci::metadata_from_env();
    let sinks = sinks::select(options, &metadata, |key| std::env::var(key).ok());
    let runner = Runner::new(
        sinks.sink.clone(),
        RunnerOptions {
            mode: options.parse_mode(),
            parser: options.parser_options(),
            max_stderr_bytes: options.max_stderr_bytes,
        },
        metadata,
    );
    (runner, sinks)
}

fn finalize(runner: &Runner, sinks: &sinks::Sinks) -> RunStatus {
    let result = runner.finish();
    if let Err(e) = sinks.write_outputs(&result) {
        warn!(error = %e, "Failed to write step outputs");
    }
    if let Err(e) = runner.close() {
        warn!(error = %e, "Failed to close reports");
    }
    result.summary.status
}

async fn run(options: &Options, program: &[String]) -> Result<ExitCode> {
    let argv = options.command_line(program);
    let (name, args) = argv.split_first().context("No program to run")?;
    let mut cmd = tokio::process::Command::new(name);
    cmd.args(args);

    let (runner, sinks) = runner_for(options);
    let cancel = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let outcome = runner.run_with_cancel(cmd, cancel).await?;
    if let Some(fault) = &outcome.parser_fault {
        error!(error = %fault, "Report may be incomplete");
    }
    finalize(&runner, &sinks);

    let code = u8::try_from(outcome.code()).unwrap_or(1);
    Ok(ExitCode::from(code))
}

fn parse(options: &Options, input: Option<&std::path::Path>) -> Result<ExitCode> {
    let (runner, sinks) = runner_for(options);
    match input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            runner.parse_input(BufReader::new(file))?;
        }
        None => {
            runner.parse_input(io::stdin().lock())?;
        }
    }

    Ok(match finalize(&runner, &sinks) {
        RunStatus::Passed => ExitCode::SUCCESS,
        RunStatus::Failed | RunStatus::Error => ExitCode::FAILURE,
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let config = Config::parse();

    // Logs go to stderr; stdout carries test output and annotations
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(config.log_level().into())
                .from_env_lossy(),
        )
        .init();

    config.validate()?;

    match &config.command {
        Some(Command::Run { options, program }) => run(options, program).await,
        Some(Command::Parse { options, input }) => parse(options, input.as_deref()),
        None => {
            info!("Nothing to do, see `faultline --help`");
            Ok(ExitCode::SUCCESS)
        }
    }
}
