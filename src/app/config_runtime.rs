//! Merges command-line arguments, the config file and built-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgMatches, CommandFactory, FromArgMatches, parser::ValueSource};
use repofetch_core::config::{FileConfig, VerbositySetting};
use repofetch_core::remote::DEFAULT_API_URL;

use crate::cli::{Args, DEFAULT_OUTPUT_DIR};

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 300;

/// Environment variable consulted when `--token` is absent.
pub(crate) const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// Which arguments were given explicitly on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CliValueSources {
    pub(crate) concurrency: bool,
    pub(crate) rate_limit: bool,
    pub(crate) max_retries: bool,
    pub(crate) verbose: bool,
    pub(crate) quiet: bool,
}

/// Effective settings for one invocation.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedSettings {
    pub(crate) output_dir: PathBuf,
    pub(crate) concurrency: usize,
    pub(crate) rate_limit: Duration,
    pub(crate) max_retries: u8,
    pub(crate) api_url: String,
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) token: Option<String>,
    pub(crate) verbose: u8,
    pub(crate) quiet: bool,
}

pub(crate) fn parse_cli_with_sources() -> (Args, CliValueSources) {
    let command = Args::command();
    let matches = command.get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());

    let sources = sources_from_matches(&matches);
    (args, sources)
}

fn sources_from_matches(matches: &ArgMatches) -> CliValueSources {
    CliValueSources {
        concurrency: is_commandline_value(matches, "concurrency"),
        rate_limit: is_commandline_value(matches, "rate_limit"),
        max_retries: is_commandline_value(matches, "max_retries"),
        verbose: is_commandline_value(matches, "verbose"),
        quiet: is_commandline_value(matches, "quiet"),
    }
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

/// Applies file values wherever the command line left a default.
pub(crate) fn resolve_settings(
    args: &Args,
    cli_sources: &CliValueSources,
    file_config: Option<&FileConfig>,
    env_token: Option<String>,
) -> ResolvedSettings {
    let file = file_config.cloned().unwrap_or_default();

    let concurrency = match file.concurrency {
        Some(value) if !cli_sources.concurrency => value,
        _ => args.concurrency,
    };
    let rate_limit = match file.rate_limit {
        Some(value) if !cli_sources.rate_limit => value,
        _ => args.rate_limit,
    };
    let max_retries = match file.max_retries {
        Some(value) if !cli_sources.max_retries => value,
        _ => args.max_retries,
    };

    let (mut verbose, mut quiet) = (args.verbose, args.quiet);
    if !cli_sources.verbose
        && !cli_sources.quiet
        && let Some(verbosity) = file.verbosity
    {
        (verbose, quiet) = match verbosity {
            VerbositySetting::Default => (0, false),
            VerbositySetting::Verbose => (1, false),
            VerbositySetting::Debug => (2, false),
            VerbositySetting::Quiet => (0, true),
        };
    }

    ResolvedSettings {
        output_dir: args
            .output_dir
            .clone()
            .or(file.output_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        concurrency: usize::from(concurrency),
        rate_limit: Duration::from_millis(rate_limit),
        max_retries,
        api_url: args
            .api_url
            .clone()
            .or(file.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        connect_timeout: Duration::from_secs(
            file.connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        ),
        read_timeout: Duration::from_secs(
            file.read_timeout_secs.unwrap_or(DEFAULT_READ_TIMEOUT_SECS),
        ),
        token: args
            .token
            .clone()
            .or(env_token)
            .filter(|token| !token.trim().is_empty()),
        verbose,
        quiet,
    }
}

/// Log level implied by the verbosity settings.
pub(crate) fn resolve_default_log_level(settings: &ResolvedSettings) -> &'static str {
    if settings.quiet {
        "error"
    } else {
        match settings.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Explicit `-v`/`-q` override `RUST_LOG`.
pub(crate) fn should_force_cli_log_level(cli_sources: &CliValueSources) -> bool {
    cli_sources.verbose || cli_sources.quiet
}
