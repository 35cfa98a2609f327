use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use repofetch_core::history::{self, History};
use repofetch_core::{
    Credential, DownloadCoordinator, FailureKind, GitHubClient, RateLimiter, RetryPolicy,
    RunSummary, config, parse_locator,
};
use tracing::{debug, info, warn};

use crate::ProcessExit;
use crate::app::{config_runtime, exit_handler, progress_manager, terminal};

pub(crate) async fn run_repofetch() -> Result<ProcessExit> {
    let (cli, cli_sources) = config_runtime::parse_cli_with_sources();

    let file_config = config::load_default_file_config().context("failed to load config file")?;
    let settings = config_runtime::resolve_settings(
        &cli,
        &cli_sources,
        file_config.as_ref().map(|(_, config)| config),
        std::env::var(config_runtime::TOKEN_ENV_VAR).ok(),
    );

    let default_level = config_runtime::resolve_default_log_level(&settings);
    let force_cli_log_level = config_runtime::should_force_cli_log_level(&cli_sources);
    terminal::init_tracing(
        default_level,
        force_cli_log_level,
        terminal::is_no_color_requested(cli.no_color),
    );

    if let Some((path, _)) = &file_config {
        debug!(path = %path.display(), "loaded config file");
    }
    debug!(
        output_dir = %settings.output_dir.display(),
        concurrency = settings.concurrency,
        "settings resolved"
    );

    let history_path = history::default_history_path();

    if cli.history {
        let history = history_path
            .as_deref()
            .map(History::load)
            .unwrap_or_default();
        if history.is_empty() {
            println!("No repositories in history.");
        }
        for entry in history.entries() {
            println!("{entry}");
        }
        return Ok(ProcessExit::Success);
    }

    let locator = cli.locator.as_deref().unwrap_or_default();
    let mut coord = parse_locator(locator)?;
    if let Some(git_ref) = cli.git_ref.as_deref() {
        coord = coord.with_ref(git_ref);
    }
    info!(repository = %coord, "repofetch starting");

    if !cli.no_history
        && let Some(path) = history_path.as_deref()
    {
        let mut history = History::load(path);
        history.record(locator);
        if let Err(error) = history.save(path) {
            warn!(error = %error, "could not update history");
        }
    }

    let rate_limiter = if settings.rate_limit.is_zero() {
        debug!("rate limiting disabled");
        Arc::new(RateLimiter::disabled())
    } else {
        debug!(rate_limit_ms = settings.rate_limit.as_millis(), "rate limiting enabled");
        Arc::new(RateLimiter::new(settings.rate_limit))
    };
    let client = GitHubClient::builder()
        .api_url(settings.api_url.as_str())
        .credential(settings.token.as_deref().and_then(Credential::new))
        .timeouts(settings.connect_timeout, settings.read_timeout)
        .retry_policy(RetryPolicy::with_max_attempts(
            u32::from(settings.max_retries) + 1,
        ))
        .rate_limiter(rate_limiter)
        .build()?;
    if !client.is_authenticated() {
        debug!("no access token, using anonymous quota");
    }

    let mut handle = DownloadCoordinator::new(Arc::new(client), settings.concurrency)?.start(
        coord,
        cli.path.clone(),
        settings.output_dir.clone(),
    )?;

    let cancel = handle.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight files (Ctrl-C again to exit now)");
            cancel.cancel();
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("second interrupt, exiting without waiting");
                std::process::exit(i32::from(ProcessExit::Failure.code()));
            }
        }
    });

    let use_bar = terminal::should_use_progress_bar(
        io::stderr().is_terminal(),
        settings.quiet,
        terminal::is_dumb_terminal(),
    );
    let consumer = handle
        .take_events()
        .map(|events| progress_manager::spawn_event_consumer(events, use_bar));

    let summary = handle.wait().await?;
    if let Some(consumer) = consumer {
        let _ = consumer.await;
    }

    info!(
        succeeded = summary.succeeded,
        failed = summary.failed_files(),
        skipped_directories = summary.directory_warnings(),
        total = summary.total_discovered,
        "run finished"
    );
    print_run_summary(&summary, &settings.output_dir, settings.quiet);

    Ok(exit_handler::determine_exit_outcome(&summary))
}

fn print_run_summary(summary: &RunSummary, output_dir: &std::path::Path, quiet: bool) {
    if !quiet {
        println!("{summary}");
        if summary.succeeded > 0 {
            println!("Files saved to {}", output_dir.display());
        }
    }
    for (kind, label) in [
        (FailureKind::TreeFetch, "could not list"),
        (FailureKind::DirectoryListing, "skipped directory"),
        (FailureKind::FileFetch, "failed"),
    ] {
        for record in summary.records(kind) {
            let path = if record.path.is_empty() { "/" } else { &record.path };
            eprintln!("  {label} {path}: {}", record.reason);
        }
    }
    if summary.not_attempted() > 0 && !quiet {
        println!("{} files were not attempted.", summary.not_attempted());
    }
}
