// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! Report sink selection

use std::collections::BTreeMap;
use std::sync::Arc;

use faultline_parse::{RunMetadata, RunResult};
use faultline_report::{
    GitHubSink, JsonLinesSink, ReportError, ReportSink, TerminalSink, combine,
};
use tracing::{debug, warn};

use crate::ci;
use crate::config::{Options, OutputFormat};

/// The sink a run reports to, plus the GitHub sink when one is active
pub struct Sinks {
    /// Combined sink
    pub sink: Arc<dyn ReportSink>,
    github: Option<Arc<GitHubSink>>,
}

impl std::fmt::Debug for Sinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sinks")
            .field("github", &self.github.is_some())
            .finish_non_exhaustive()
    }
}

impl Sinks {
    /// Publish the run's counts as step outputs when running on GitHub
    ///
    /// # Errors
    ///
    /// Returns an error if the outputs file cannot be written.
    pub fn write_outputs(&self, result: &RunResult) -> Result<(), ReportError> {
        let Some(github) = &self.github else {
            return Ok(());
        };
        let summary = &result.summary;
        let outputs = BTreeMap::from([
            ("status".to_string(), summary.status.to_string()),
            ("total".to_string(), summary.total.to_string()),
            ("passed".to_string(), summary.passed.to_string()),
            ("failed".to_string(), summary.failed.to_string()),
            ("skipped".to_string(), summary.skipped.to_string()),
        ]);
        github.write_outputs(&outputs)
    }
}

/// Choose sinks for `options` on the platform described by `metadata`
///
/// - the JSON Lines sink whenever an output path is configured
/// - the GitHub sink for `github`, or `auto` on GitHub Actions
/// - the terminal sink for `terminal`, or on a local machine
///
/// A JSON Lines sink that cannot be created is skipped with a warning.
#[must_use]
pub fn select(
    options: &Options,
    metadata: &RunMetadata,
    get: impl Fn(&str) -> Option<String>,
) -> Sinks {
    let mut sinks: Vec<Box<dyn ReportSink>> = Vec::new();

    if let Some(path) = options.output_path() {
        match JsonLinesSink::create_with_fallback(path, options.fallback_dir.as_ref()) {
            Ok(sink) => sinks.push(Box::new(sink)),
            Err(e) => warn!(path = %path.display(), error = %e, "JSON Lines report disabled"),
        }
    }

    let on_github = metadata.platform == ci::GITHUB;
    let github = match options.format {
        OutputFormat::Github => true,
        OutputFormat::Auto => on_github,
        OutputFormat::Json | OutputFormat::Terminal => false,
    };
    let github = github.then(|| Arc::new(GitHubSink::from_env_with(get)));
    if let Some(sink) = &github {
        sinks.push(Box::new(Arc::clone(sink)));
    }

    if options.format == OutputFormat::Terminal || metadata.platform == ci::LOCAL {
        sinks.push(Box::new(TerminalSink::default()));
    }

    debug!(count = sinks.len(), "Selected report sinks");
    Sinks {
        sink: Arc::from(combine(sinks)),
        github,
    }
}
