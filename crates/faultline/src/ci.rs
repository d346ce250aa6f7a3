// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! CI platform detection
//!
//! Reads the environment variables CI systems export to fill in
//! [`RunMetadata`]. Every lookup goes through a getter so tests never touch
//! the process environment.

use faultline_parse::RunMetadata;

/// Platform name used outside CI
pub const LOCAL: &str = "local";

/// Platform name for GitHub Actions
pub const GITHUB: &str = "github";

/// Detect the CI platform
///
/// Checked from most to least specific; a bare `CI=true` is `generic`.
#[must_use]
pub fn detect_platform(get: &dyn Fn(&str) -> Option<String>) -> &'static str {
    let is_true = |key: &str| get(key).is_some_and(|v| v == "true");
    let is_set = |key: &str| get(key).is_some_and(|v| !v.is_empty());

    if is_true("GITHUB_ACTIONS") {
        GITHUB
    } else if is_true("GITLAB_CI") {
        "gitlab"
    } else if is_true("CIRCLECI") {
        "circleci"
    } else if is_set("JENKINS_URL") {
        "jenkins"
    } else if is_true("BUILDKITE") {
        "buildkite"
    } else if is_true("CI") {
        "generic"
    } else {
        LOCAL
    }
}

fn first_of(get: &dyn Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| get(*key))
        .find(|value| !value.is_empty())
}

/// Collect run metadata through `get`
#[must_use]
pub fn collect_metadata(get: &dyn Fn(&str) -> Option<String>) -> RunMetadata {
    RunMetadata {
        branch: first_of(
            get,
            &[
                "GITHUB_REF_NAME",
                "GITHUB_HEAD_REF",
                "CI_COMMIT_REF_NAME",
                "CIRCLE_BRANCH",
                "BUILDKITE_BRANCH",
                "GIT_BRANCH",
            ],
        ),
        commit: first_of(
            get,
            &[
                "GITHUB_SHA",
                "CI_COMMIT_SHA",
                "CIRCLE_SHA1",
                "BUILDKITE_COMMIT",
                "GIT_COMMIT",
            ],
        ),
        run_id: first_of(
            get,
            &[
                "GITHUB_RUN_ID",
                "CI_PIPELINE_ID",
                "CIRCLE_BUILD_NUM",
                "BUILDKITE_BUILD_NUMBER",
                "BUILD_NUMBER",
            ],
        ),
        workflow: first_of(
            get,
            &[
                "GITHUB_WORKFLOW",
                "CI_JOB_NAME",
                "CIRCLE_JOB",
                "BUILDKITE_PIPELINE_SLUG",
                "JOB_NAME",
            ],
        ),
        platform: detect_platform(get).to_string(),
        toolchain: first_of(get, &["GOVERSION"]).unwrap_or_else(|| "go".to_string()),
    }
}

/// Collect run metadata from the process environment
#[must_use]
pub fn metadata_from_env() -> RunMetadata {
    collect_metadata(&|key| std::env::var(key).ok())
}
