//! The `crawl` and `profiles` command handlers.
//!
//! A crawl runs one task per source concurrently. A source that fails to
//! start is reported in the run document rather than aborting the others;
//! the command only fails when no source produced anything.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use stayscout_core::{AppConfig, RunParams, Source};
use stayscout_scraper::{
    cancel_pair, run_sources, CancelHandle, FetchMode, HtmlRenderer, ProfileSet, RetryPolicy,
    SessionProfile, TaskSettings,
};

use crate::output::{write_json, RunDocument};

#[derive(Debug)]
pub(crate) struct CrawlOptions {
    pub sources: Vec<Source>,
    pub city: String,
    pub pages: Option<u32>,
    pub max_retries: Option<u32>,
    pub delay: Option<f64>,
    pub output: Option<PathBuf>,
}

/// Command-line values win over the environment.
pub(crate) fn run_params(config: &AppConfig, opts: &CrawlOptions) -> anyhow::Result<RunParams> {
    Ok(RunParams::new(
        &opts.sources,
        &opts.city,
        opts.pages.unwrap_or(config.page_limit),
        opts.max_retries.unwrap_or(config.max_retries),
        opts.delay.unwrap_or(config.request_delay_secs),
    )?)
}

pub(crate) fn task_settings(config: &AppConfig) -> TaskSettings {
    let nav_timeout = Duration::from_secs(config.nav_timeout_secs);
    TaskSettings {
        session: SessionProfile::new(&config.user_agent, nav_timeout),
        page_limit: config.page_limit,
        retry: RetryPolicy::new(
            config.max_retries,
            Duration::from_millis(config.retry_base_delay_ms),
            nav_timeout,
        ),
        request_delay: Duration::from_secs_f64(config.request_delay_secs),
        detail_limit: config.detail_limit,
        photo_limit: config.photo_limit,
        task_timeout: config.task_timeout_secs.map(Duration::from_secs),
    }
}

async fn cancel_on_ctrl_c(handle: CancelHandle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("received ctrl-c, stopping source tasks and keeping partial results");
        handle.cancel();
    }
}

/// Crawl every requested source and write the reconciled run document.
///
/// # Errors
///
/// Returns an error for invalid run parameters, an unreadable profiles file,
/// an unwritable output path, or when every source failed to start.
pub(crate) async fn run_crawl(config: &AppConfig, opts: CrawlOptions) -> anyhow::Result<()> {
    let params = run_params(config, &opts)?;
    let profiles = ProfileSet::load(config.profiles_path.as_deref())?;
    let settings = task_settings(config);
    let renderer = Arc::new(HtmlRenderer::new(FetchMode::from_config(
        config.renderer_url.as_deref(),
        config.renderer_token.as_deref(),
    )));

    let (handle, cancel) = cancel_pair();
    tokio::spawn(cancel_on_ctrl_c(handle));

    tracing::info!(
        sources = ?params.target_sources,
        city = %params.city_or_region,
        page_limit = params.page_limit,
        "crawl started"
    );
    let started_at = Utc::now();
    let results = run_sources(renderer, &profiles, &params, &settings, &cancel).await;
    let document = RunDocument::assemble(params, started_at, Utc::now(), results);

    for failure in &document.failures {
        eprintln!("error: {} did not run: {}", failure.source, failure.error);
    }
    tracing::info!(
        run_id = %document.run_id,
        sources = document.sources.len(),
        failures = document.failures.len(),
        entities = document.entities.len(),
        "crawl finished"
    );

    write_json(opts.output.as_deref(), &document)?;

    if document.sources.is_empty() {
        anyhow::bail!("no source completed; see errors above");
    }
    Ok(())
}

/// Print the effective profiles (built-ins plus any override file).
///
/// # Errors
///
/// Returns an error when the override file cannot be loaded.
pub(crate) fn print_profiles(config: &AppConfig, sources: &[Source]) -> anyhow::Result<()> {
    let profiles = ProfileSet::load(config.profiles_path.as_deref())?;
    let sources = if sources.is_empty() {
        Source::ALL.to_vec()
    } else {
        sources.to_vec()
    };
    print!("{}", profiles.to_yaml(&sources)?);
    Ok(())
}
