//! Listing pagination.
//!
//! Walks listing pages for one source up to `page_limit`, extracting every
//! card on each page. Two addressing styles are supported:
//!
//! - **offset**: page `k` has its own URL; each page is navigated directly,
//!   so a failed page is simply skipped.
//! - **interactive**: only the first page has a URL; later pages are reached
//!   by clicking the "next" control, after scrolling to trigger lazy-loaded
//!   cards. A missing control ends the walk.
//!
//! A failed page never aborts the walk; it is recorded in the
//! [`SourceReport`] and the next page is attempted.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use stayscout_core::ListingRecord;

use crate::cancel::CancelToken;
use crate::extract::extract_listing;
use crate::navigator::{Navigation, Pacer};
use crate::profile::{PaginationStrategy, SourceProfile};
use crate::renderer::{Scope, Session};
use crate::selector::{resolve, resolve_all, FieldSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NavigationFailed,
    NoListingCards,
    NextControlFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPage {
    /// Zero-based page index.
    pub page_index: u32,
    pub reason: SkipReason,
}

/// Run summary for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub pages_visited: u32,
    pub skipped_pages: Vec<SkippedPage>,
    /// Cards dropped for lacking a name or detail link.
    pub discarded_cards: u32,
    pub detail_failures: u32,
    pub gallery_failures: u32,
    /// Set when the task stopped early; its records are partial.
    pub cancelled: bool,
}

impl SourceReport {
    fn skip(&mut self, page_index: u32, reason: SkipReason) {
        tracing::warn!(page_index, ?reason, "skipping listing page");
        self.skipped_pages.push(SkippedPage { page_index, reason });
    }
}

#[derive(Debug, Default)]
pub struct ListingHarvest {
    pub records: Vec<ListingRecord>,
    pub report: SourceReport,
}

impl ListingHarvest {
    async fn take_page<S: Scope>(&mut self, scope: &S, profile: &SourceProfile, page_index: u32) {
        let cards = resolve_all(scope, &profile.listing.card).await;
        if cards.is_empty() {
            self.report.skip(page_index, SkipReason::NoListingCards);
            return;
        }
        self.report.pages_visited += 1;

        let scraped_at = Utc::now();
        let before = self.records.len();
        for card in &cards {
            match extract_listing(card, profile, scraped_at).await {
                Some(record) => self.records.push(record),
                None => self.report.discarded_cards += 1,
            }
        }
        tracing::info!(
            source = %profile.source,
            page_index,
            cards = cards.len(),
            extracted = self.records.len() - before,
            "listing page extracted"
        );
    }
}

/// Collects listing records for `city` from up to `page_limit` pages.
///
/// Never fails: navigation failures become skipped pages and cancellation
/// returns whatever was collected so far with `report.cancelled` set.
pub async fn collect_listings<S: Session>(
    session: &mut S,
    city: &str,
    profile: &SourceProfile,
    page_limit: u32,
    pacer: &mut Pacer,
    cancel: &mut CancelToken,
) -> ListingHarvest {
    let mut harvest = ListingHarvest::default();
    if page_limit == 0 {
        return harvest;
    }

    let finished = match &profile.pagination {
        PaginationStrategy::Offset { .. } => {
            walk_offset(session, city, profile, page_limit, pacer, cancel, &mut harvest).await
        }
        PaginationStrategy::Interactive { next_control, .. } => {
            walk_interactive(
                session,
                city,
                profile,
                next_control,
                page_limit,
                pacer,
                cancel,
                &mut harvest,
            )
            .await
        }
    };
    harvest.report.cancelled = !finished;
    harvest
}

/// Returns `false` when cancelled.
async fn walk_offset<S: Session>(
    session: &mut S,
    city: &str,
    profile: &SourceProfile,
    page_limit: u32,
    pacer: &mut Pacer,
    cancel: &mut CancelToken,
    harvest: &mut ListingHarvest,
) -> bool {
    for page_index in 0..page_limit {
        let url = profile.page_url(city, page_index);
        match pacer.navigate(session, &url, cancel).await {
            Navigation::Cancelled => return false,
            Navigation::Failed => harvest.report.skip(page_index, SkipReason::NavigationFailed),
            Navigation::Succeeded => harvest.take_page(&*session, profile, page_index).await,
        }
    }
    true
}

/// Scrolls the current page to trigger lazy loading. Returns `false` when
/// cancelled.
async fn lazy_load<S: Session>(session: &mut S, profile: &SourceProfile, cancel: &mut CancelToken) -> bool {
    let Some((ticks, delay, script)) = profile.lazy_load() else {
        return true;
    };
    for _ in 0..ticks {
        if let Err(err) = session.evaluate(script).await {
            tracing::debug!(error = %err, "scroll tick failed");
        }
        if !cancel.sleep(delay).await {
            return false;
        }
    }
    true
}

#[allow(clippy::too_many_arguments)]
async fn walk_interactive<S: Session>(
    session: &mut S,
    city: &str,
    profile: &SourceProfile,
    next_control: &FieldSpec,
    page_limit: u32,
    pacer: &mut Pacer,
    cancel: &mut CancelToken,
    harvest: &mut ListingHarvest,
) -> bool {
    let start = profile.page_url(city, 0);
    // Set once a page has been extracted and the next one must be reached by
    // clicking its control.
    let mut on_extracted_page = false;
    let mut page_index = 0;

    while page_index < page_limit {
        if on_extracted_page {
            let Some(control) = resolve(&*session, next_control).await else {
                tracing::info!(
                    source = %profile.source,
                    pages = page_index,
                    "no next-page control; pagination exhausted"
                );
                return true;
            };
            match pacer.click_through(session, &control, cancel).await {
                Navigation::Cancelled => return false,
                Navigation::Failed => {
                    // Still on the previous page; the next iteration tries
                    // its control again.
                    harvest.report.skip(page_index, SkipReason::NextControlFailed);
                    page_index += 1;
                    continue;
                }
                Navigation::Succeeded => {}
            }
        } else {
            match pacer.navigate(session, &start, cancel).await {
                Navigation::Cancelled => return false,
                Navigation::Failed => {
                    harvest.report.skip(page_index, SkipReason::NavigationFailed);
                    page_index += 1;
                    continue;
                }
                Navigation::Succeeded => {}
            }
        }

        if !lazy_load(session, profile, cancel).await {
            return false;
        }
        harvest.take_page(&*session, profile, page_index).await;
        on_extracted_page = true;
        page_index += 1;
    }
    true
}

#[cfg(test)]
#[path = "pagination_test.rs"]
mod tests;
