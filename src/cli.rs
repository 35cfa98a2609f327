//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use repofetch_core::{DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS};

/// Output directory used when neither the command line nor the config file sets one.
pub const DEFAULT_OUTPUT_DIR: &str = "downloaded_files";

/// Download every file of a GitHub repository into a local directory.
///
/// Files are flattened into the output directory by name; archives and
/// common image formats are skipped.
#[derive(Parser, Debug)]
#[command(name = "repofetch")]
#[command(author, version, about)]
pub struct Args {
    /// Repository URL or owner/name slug (e.g. https://github.com/rust-lang/log)
    #[arg(required_unless_present = "history")]
    pub locator: Option<String>,

    /// Directory to write files into [default: downloaded_files]
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Access token sent as `Authorization: token <value>` (falls back to GITHUB_TOKEN)
    #[arg(short = 't', long)]
    pub token: Option<String>,

    /// Branch, tag or commit to fetch (overrides a /tree/<ref> in the URL)
    #[arg(long = "ref")]
    pub git_ref: Option<String>,

    /// Start from this path inside the repository instead of the root
    #[arg(long, default_value = "")]
    pub path: String,

    /// Maximum concurrent file downloads (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Maximum retry attempts for transient failures (0-10)
    #[arg(short = 'r', long, default_value_t = (DEFAULT_MAX_ATTEMPTS - 1) as u8, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: u8,

    /// Minimum delay between requests to the same host in milliseconds (0 to disable, max 60000)
    #[arg(short = 'l', long, default_value_t = 0, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub rate_limit: u64,

    /// Base URL of the contents API (for GitHub Enterprise or testing)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Print recently used repositories and exit
    #[arg(long, conflicts_with = "no_history")]
    pub history: bool,

    /// Do not record this repository in the history file
    #[arg(long)]
    pub no_history: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_locator_parses_with_defaults() {
        let args = Args::try_parse_from(["repofetch", "rust-lang/log"]).unwrap();
        assert_eq!(args.locator.as_deref(), Some("rust-lang/log"));
        assert!(args.output_dir.is_none());
        assert!(args.token.is_none());
        assert_eq!(args.path, "");
        assert_eq!(args.concurrency, 4); // DEFAULT_CONCURRENCY
        assert_eq!(args.max_retries, 2);
        assert_eq!(args.rate_limit, 0);
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
    }

    #[test]
    fn test_cli_locator_required_without_history() {
        let err = Args::try_parse_from(["repofetch"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_history_flag_needs_no_locator() {
        let args = Args::try_parse_from(["repofetch", "--history"]).unwrap();
        assert!(args.history);
        assert!(args.locator.is_none());
    }

    #[test]
    fn test_cli_history_conflicts_with_no_history() {
        let err = Args::try_parse_from(["repofetch", "--history", "--no-history"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_output_token_ref_path() {
        let args = Args::try_parse_from([
            "repofetch",
            "o/r",
            "-o",
            "out",
            "-t",
            "secret",
            "--ref",
            "v1.2.0",
            "--path",
            "docs",
        ])
        .unwrap();
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
        assert_eq!(args.token.as_deref(), Some("secret"));
        assert_eq!(args.git_ref.as_deref(), Some("v1.2.0"));
        assert_eq!(args.path, "docs");
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["repofetch", "o/r", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_conflicts_with_verbose() {
        let err = Args::try_parse_from(["repofetch", "o/r", "-q", "-v"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["repofetch", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["repofetch", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_concurrency_bounds() {
        assert_eq!(Args::try_parse_from(["repofetch", "o/r", "-c", "1"]).unwrap().concurrency, 1);
        assert_eq!(Args::try_parse_from(["repofetch", "o/r", "-c", "100"]).unwrap().concurrency, 100);

        for bad in ["0", "101"] {
            let err = Args::try_parse_from(["repofetch", "o/r", "-c", bad]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        }
    }

    #[test]
    fn test_cli_max_retries_bounds() {
        assert_eq!(Args::try_parse_from(["repofetch", "o/r", "-r", "0"]).unwrap().max_retries, 0);
        let err = Args::try_parse_from(["repofetch", "o/r", "-r", "11"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_rate_limit_bounds() {
        let args = Args::try_parse_from(["repofetch", "o/r", "--rate-limit", "60000"]).unwrap();
        assert_eq!(args.rate_limit, 60000);
        let err = Args::try_parse_from(["repofetch", "o/r", "-l", "60001"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_api_url_and_no_color() {
        let args = Args::try_parse_from([
            "repofetch",
            "o/r",
            "--api-url",
            "http://localhost:8080",
            "--no-color",
            "--no-history",
        ])
        .unwrap();
        assert_eq!(args.api_url.as_deref(), Some("http://localhost:8080"));
        assert!(args.no_color);
        assert!(args.no_history);
    }
}
