// Copyright (c) 2026 - present The faultline developers
// SPDX-License-Identifier: MIT

//! Command-line configuration for faultline
//!
//! Every option that feeds the parsers can also be set through a
//! `FAULTLINE_*` environment variable.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use faultline_parse::crash::DEFAULT_MAX_STDERR_BYTES;
use faultline_parse::parser::{DEFAULT_CONTEXT_LINES, DEFAULT_MAX_OUTPUT_BYTES};
use faultline_parse::{CaptureStrategy, ParseMode, ParserOptions};
use faultline_report::jsonl::DEFAULT_OUTPUT_PATH;

/// faultline - classified, deduplicated CI failure reports from Go test output
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "faultline")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Enable verbose logging (debug level)
    ///
    /// Logs go to stderr; stdout carries the test output and annotations.
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Quiet mode - suppress info-level logs
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run a test command, echoing its output and reporting failures
    ///
    /// Example:
    ///   faultline run -- go test -json ./...
    Run {
        #[command(flatten)]
        options: Options,

        /// Program to run, followed by its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        program: Vec<String>,
    },

    /// Parse previously captured test output
    ///
    /// Example:
    ///   go test -json ./... > out.jsonl; faultline parse --input out.jsonl
    Parse {
        #[command(flatten)]
        options: Options,

        /// File to read instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

impl Command {
    /// Options shared by every subcommand
    #[must_use]
    pub fn options(&self) -> &Options {
        match self {
            Self::Run { options, .. } | Self::Parse { options, .. } => options,
        }
    }
}

/// Capture strategy selection on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyMode {
    /// Re-evaluate the tier as the suite grows
    #[default]
    Auto,
    Full,
    Smart,
    Efficient,
    Streaming,
}

impl StrategyMode {
    /// Pinned strategy, or `None` when adaptive
    #[must_use]
    pub fn fixed(self) -> Option<CaptureStrategy> {
        match self {
            Self::Auto => None,
            Self::Full => Some(CaptureStrategy::Full),
            Self::Smart => Some(CaptureStrategy::Smart),
            Self::Efficient => Some(CaptureStrategy::Efficient),
            Self::Streaming => Some(CaptureStrategy::Streaming),
        }
    }
}

/// Report format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// GitHub annotations on GitHub Actions, JSON Lines elsewhere
    #[default]
    Auto,
    Github,
    Json,
    Terminal,
}

/// Parsing and reporting options
#[derive(Args, Debug, Clone)]
pub struct Options {
    /// Capture strategy
    #[arg(long, value_enum, default_value_t = StrategyMode::Auto, env = "FAULTLINE_STRATEGY")]
    pub strategy: StrategyMode,

    /// Source lines of context around a failure (0-100)
    #[arg(long, default_value_t = DEFAULT_CONTEXT_LINES, env = "FAULTLINE_CONTEXT_LINES")]
    pub context_lines: usize,

    /// Report every failure, even repeated ones
    #[arg(long, default_value = "false")]
    pub no_dedup: bool,

    /// Maximum bytes of output kept per test
    #[arg(long, default_value_t = DEFAULT_MAX_OUTPUT_BYTES, env = "FAULTLINE_MAX_OUTPUT_BYTES")]
    pub max_output_bytes: usize,

    /// Maximum bytes of stderr kept for crash detection
    #[arg(long, default_value_t = DEFAULT_MAX_STDERR_BYTES, env = "FAULTLINE_MAX_STDERR_BYTES")]
    pub max_stderr_bytes: usize,

    /// Treat the input as plain console text instead of JSON events
    #[arg(long, default_value = "false")]
    pub text: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Auto, env = "FAULTLINE_FORMAT")]
    pub format: OutputFormat,

    /// JSON Lines report path
    #[arg(short, long, default_value = DEFAULT_OUTPUT_PATH, env = "FAULTLINE_OUTPUT")]
    pub output: PathBuf,

    /// Skip the JSON Lines report
    #[arg(long, default_value = "false")]
    pub no_output: bool,

    /// Directory to use when the report path cannot be created
    #[arg(long, env = "FAULTLINE_FALLBACK_DIR")]
    pub fallback_dir: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            strategy: StrategyMode::Auto,
            context_lines: DEFAULT_CONTEXT_LINES,
            no_dedup: false,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_stderr_bytes: DEFAULT_MAX_STDERR_BYTES,
            text: false,
            format: OutputFormat::Auto,
            output: PathBuf::from(DEFAULT_OUTPUT_PATH),
            no_output: false,
            fallback_dir: None,
        }
    }
}

impl Options {
    /// Parser options built from the flags
    #[must_use]
    pub fn parser_options(&self) -> ParserOptions {
        let options = ParserOptions::default()
            .with_context_lines(self.context_lines)
            .with_dedup(!self.no_dedup)
            .with_max_output_bytes(self.max_output_bytes);
        match self.strategy.fixed() {
            Some(strategy) => options.with_fixed_strategy(strategy),
            None => options,
        }
    }

    /// Input shape
    #[must_use]
    pub fn parse_mode(&self) -> ParseMode {
        if self.text {
            ParseMode::Text
        } else {
            ParseMode::Structured
        }
    }

    /// JSON Lines path, unless disabled
    #[must_use]
    pub fn output_path(&self) -> Option<&PathBuf> {
        (!self.no_output).then_some(&self.output)
    }

    /// The command line to spawn for `program`
    ///
    /// In structured mode `-json` is added after the `test` subcommand
    /// (or after the first argument) unless it is already present.
    #[must_use]
    pub fn command_line(&self, program: &[String]) -> Vec<String> {
        let mut argv = program.to_vec();
        if self.parse_mode() != ParseMode::Structured || argv.len() < 2 {
            return argv;
        }
        let has_json = argv[1..]
            .iter()
            .any(|arg| arg == "-json" || arg.starts_with("-json="));
        if !has_json {
            let at = argv[1..]
                .iter()
                .position(|arg| arg == "test")
                .map_or(2, |i| i + 2);
            argv.insert(at, "-json".to_string());
        }
        argv
    }
}

impl Config {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `--verbose` and `--quiet` are both set
    /// - A byte cap is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.verbose && self.quiet {
            return Err(ConfigError::ConflictingVerbosity);
        }
        let Some(command) = &self.command else {
            return Ok(());
        };
        let options = command.options();
        if options.max_output_bytes == 0 {
            return Err(ConfigError::ZeroLimit("--max-output-bytes"));
        }
        if options.max_stderr_bytes == 0 {
            return Err(ConfigError::ZeroLimit("--max-stderr-bytes"));
        }
        Ok(())
    }

    /// Get the log level based on verbose/quiet flags
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A byte limit was set to zero
    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    /// Both verbosity flags were given
    #[error("--verbose and --quiet cannot be used together")]
    ConflictingVerbosity,
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn run_config(options: Options) -> Config {
        Config {
            command: Some(Command::Run {
                options,
                program: vec!["go".to_string()],
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.command.is_none());
        assert!(!config.verbose);
        assert!(!config.quiet);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_options_match_parser_defaults() {
        let options = Options::default();
        assert_eq!(options.parser_options(), ParserOptions::default());
        assert_eq!(options.parse_mode(), ParseMode::Structured);
        assert_eq!(
            options.output_path(),
            Some(&PathBuf::from(".faultline/ci-results.jsonl"))
        );
    }

    #[test]
    fn test_fixed_strategy_disables_adaptive() {
        let options = Options {
            strategy: StrategyMode::Efficient,
            ..Default::default()
        };
        let parser_options = options.parser_options();
        assert_eq!(parser_options.strategy, CaptureStrategy::Efficient);
        assert!(!parser_options.adaptive);
    }

    #[test]
    fn test_context_lines_clamped() {
        let options = Options {
            context_lines: 500,
            ..Default::default()
        };
        assert_eq!(options.parser_options().context_lines, 100);
    }

    #[test]
    fn test_no_output() {
        let options = Options {
            no_output: true,
            ..Default::default()
        };
        assert_eq!(options.output_path(), None);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let config = run_config(Options {
            max_output_bytes: 0,
            ..Default::default()
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroLimit("--max-output-bytes"))
        ));

        let config = run_config(Options {
            max_stderr_bytes: 0,
            ..Default::default()
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroLimit("--max-stderr-bytes"))
        ));
    }

    #[test]
    fn test_validate_rejects_verbose_and_quiet() {
        let config = Config {
            verbose: true,
            quiet: true,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ConflictingVerbosity)
        ));
    }

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| (*arg).to_string()).collect()
    }

    #[test]
    fn test_command_line_adds_json_after_test() {
        let options = Options::default();
        assert_eq!(
            options.command_line(&argv(&["go", "test", "./..."])),
            argv(&["go", "test", "-json", "./..."])
        );
        assert_eq!(
            options.command_line(&argv(&["go", "-C", "sub", "test", "-race"])),
            argv(&["go", "-C", "sub", "test", "-json", "-race"])
        );
    }

    #[test]
    fn test_command_line_keeps_existing_json() {
        let options = Options::default();
        let program = argv(&["go", "test", "-json", "./..."]);
        assert_eq!(options.command_line(&program), program);
        let program = argv(&["go", "test", "-json=true", "./..."]);
        assert_eq!(options.command_line(&program), program);
    }

    #[test]
    fn test_command_line_text_mode_untouched() {
        let options = Options {
            text: true,
            ..Default::default()
        };
        let program = argv(&["go", "test", "./..."]);
        assert_eq!(options.command_line(&program), program);
        assert_eq!(Options::default().command_line(&argv(&["go"])), argv(&["go"]));
    }

    #[test]
    fn test_log_level() {
        assert_eq!(Config::default().log_level(), tracing::Level::INFO);
        let verbose = Config {
            verbose: true,
            ..Default::default()
        };
        assert_eq!(verbose.log_level(), tracing::Level::DEBUG);
        let quiet = Config {
            quiet: true,
            ..Default::default()
        };
        assert_eq!(quiet.log_level(), tracing::Level::WARN);
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Config::command().debug_assert();
    }
}
