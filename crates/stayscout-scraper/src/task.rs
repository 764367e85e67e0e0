//! One independent task per source.
//!
//! Each task owns a single renderer session and runs strictly sequentially
//! inside it: listing pages, then detail pages, then photo galleries, with the
//! request delay between every navigation. Tasks for different sources share
//! nothing and run concurrently.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use stayscout_core::{DetailRecord, ListingRecord, PhotoRecord, RunParams, Source};

use crate::cancel::CancelToken;
use crate::error::ScraperError;
use crate::extract::{extract_detail, extract_photos};
use crate::navigator::{Navigation, Pacer, RetryPolicy};
use crate::pagination::{collect_listings, SourceReport};
use crate::profile::{ProfileSet, SourceProfile};
use crate::renderer::{Renderer, Session, SessionProfile};
use crate::selector::resolve;

/// Knobs shared by every source task of a run.
#[derive(Debug, Clone)]
pub struct TaskSettings {
    pub session: SessionProfile,
    pub page_limit: u32,
    pub retry: RetryPolicy,
    pub request_delay: Duration,
    /// Listings (in harvest order) whose detail page is visited.
    pub detail_limit: usize,
    /// Listings (in harvest order) whose photo gallery is visited.
    pub photo_limit: usize,
    /// Wall-clock budget per task; the task is cancelled when it runs out.
    pub task_timeout: Option<Duration>,
}

/// Everything one source task produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceOutput {
    pub source: Source,
    pub listings: Vec<ListingRecord>,
    pub details: Vec<DetailRecord>,
    /// Official photos keyed by the listing's detail URL.
    pub photos: BTreeMap<String, Vec<PhotoRecord>>,
    pub report: SourceReport,
}

/// Runs the full pipeline for one source in a fresh session.
///
/// # Errors
///
/// Returns [`ScraperError::SessionStartup`] when no session can be opened.
/// Everything after startup degrades instead of failing; cancellation yields
/// the partial output with `report.cancelled` set.
pub async fn run_source_task<R: Renderer>(
    renderer: &R,
    profile: &SourceProfile,
    city: &str,
    settings: &TaskSettings,
    mut cancel: CancelToken,
) -> Result<SourceOutput, ScraperError> {
    let source = profile.source;
    let mut session = renderer
        .open_session(&settings.session)
        .await
        .map_err(|cause| ScraperError::SessionStartup { site: source, cause })?;
    tracing::info!(%source, city, page_limit = settings.page_limit, "source task started");

    let mut pacer = Pacer::new(settings.request_delay, settings.retry);
    let harvest = collect_listings(
        &mut session,
        city,
        profile,
        settings.page_limit,
        &mut pacer,
        &mut cancel,
    )
    .await;

    let mut output = SourceOutput {
        source,
        listings: harvest.records,
        details: Vec::new(),
        photos: BTreeMap::new(),
        report: harvest.report,
    };

    if !output.report.cancelled {
        output.report.cancelled =
            !visit_details(&mut session, profile, settings, &mut pacer, &mut cancel, &mut output)
                .await;
    }
    if !output.report.cancelled {
        output.report.cancelled =
            !visit_galleries(&mut session, profile, settings, &mut pacer, &mut cancel, &mut output)
                .await;
    }

    if let Err(err) = session.close().await {
        tracing::warn!(%source, error = %err, "failed to close session");
    }
    tracing::info!(
        %source,
        listings = output.listings.len(),
        details = output.details.len(),
        galleries = output.photos.len(),
        skipped_pages = output.report.skipped_pages.len(),
        cancelled = output.report.cancelled,
        "source task finished"
    );
    Ok(output)
}

/// Returns `false` when cancelled.
async fn visit_details<S: Session>(
    session: &mut S,
    profile: &SourceProfile,
    settings: &TaskSettings,
    pacer: &mut Pacer,
    cancel: &mut CancelToken,
    output: &mut SourceOutput,
) -> bool {
    let Some(selectors) = &profile.detail else {
        return true;
    };
    let urls: Vec<String> = output
        .listings
        .iter()
        .take(settings.detail_limit)
        .map(|l| l.detail_url.clone())
        .collect();

    for url in urls {
        match pacer.navigate(session, &url, cancel).await {
            Navigation::Cancelled => return false,
            Navigation::Failed => output.report.detail_failures += 1,
            Navigation::Succeeded => {
                let detail = extract_detail(&*session, profile, selectors, &url).await;
                output.details.push(detail);
            }
        }
    }
    true
}

/// Returns `false` when cancelled.
async fn visit_galleries<S: Session>(
    session: &mut S,
    profile: &SourceProfile,
    settings: &TaskSettings,
    pacer: &mut Pacer,
    cancel: &mut CancelToken,
    output: &mut SourceOutput,
) -> bool {
    let Some(gallery) = &profile.gallery else {
        return true;
    };
    let urls: Vec<String> = output
        .listings
        .iter()
        .take(settings.photo_limit)
        .map(|l| l.detail_url.clone())
        .collect();

    for url in urls {
        match pacer.navigate(session, &url, cancel).await {
            Navigation::Cancelled => return false,
            Navigation::Failed => {
                output.report.gallery_failures += 1;
                continue;
            }
            Navigation::Succeeded => {}
        }

        let opened = match &gallery.opener {
            None => true,
            Some(spec) => match resolve(&*session, spec).await {
                None => false,
                Some(opener) => match pacer.click_through(session, &opener, cancel).await {
                    Navigation::Cancelled => return false,
                    Navigation::Failed => false,
                    Navigation::Succeeded => true,
                },
            },
        };
        if !opened {
            tracing::debug!(source = %profile.source, url = %url, "gallery opener unavailable; reading photos in place");
        }

        let photos = extract_photos(&*session, profile, gallery, gallery.official_predicate()).await;
        if photos.is_empty() && !opened {
            output.report.gallery_failures += 1;
            continue;
        }
        tracing::debug!(source = %profile.source, url = %url, photos = photos.len(), "gallery extracted");
        output.photos.insert(url, photos);
    }
    true
}

/// Runs one task per requested source concurrently and waits for all.
///
/// `params` overrides the page limit, retry count and request delay in
/// `settings`. Results come back in `params.target_sources` order. A task
/// that panics is reported as [`ScraperError::TaskAborted`] without affecting the others.
pub async fn run_sources<R: Renderer + 'static>(
    renderer: Arc<R>,
    profiles: &ProfileSet,
    params: &RunParams,
    settings: &TaskSettings,
    cancel: &CancelToken,
) -> Vec<(Source, Result<SourceOutput, ScraperError>)> {
    let settings = TaskSettings {
        page_limit: params.page_limit,
        request_delay: params.request_delay(),
        retry: RetryPolicy {
            max_retries: params.max_retries,
            ..settings.retry
        },
        ..settings.clone()
    };
    let handles = params.target_sources.iter().map(|&source| {
        let renderer = Arc::clone(&renderer);
        let profile = profiles.get(source).clone();
        let city = params.city_or_region.clone();
        let settings = settings.clone();
        let token = cancel.with_deadline(settings.task_timeout);
        let handle = tokio::spawn(async move {
            run_source_task(renderer.as_ref(), &profile, &city, &settings, token).await
        });
        async move {
            let result = handle.await.unwrap_or_else(|join_err| {
                Err(ScraperError::TaskAborted {
                    site: source,
                    reason: join_err.to_string(),
                })
            });
            (source, result)
        }
    });
    join_all(handles).await
}

#[cfg(test)]
#[path = "task_test.rs"]
mod tests;
