//! Turning resolved page regions into typed records.
//!
//! Extraction is total over a card: every field is resolved independently and
//! degrades to its absent state on failure. Only a card without a name or a
//! detail link is dropped, because such a record cannot be identified or
//! revisited.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use stayscout_core::{
    DetailRecord, ListingRecord, PhotoRecord, Source, MAX_AMENITIES, MAX_DETAIL_IMAGES, MAX_RATING,
};

use crate::error::MissingField;
use crate::parse::{parse_decimal, parse_integer};
use crate::profile::{apply_rewrites, DetailSelectors, GallerySelectors, SourceProfile};
use crate::renderer::{Element, Scope};
use crate::selector::{extract_field, read_value, resolve, resolve_all, FieldSpec};

/// What the official-photo predicate sees for one gallery item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoCandidate {
    pub src: String,
    pub caption: String,
    /// Value of the profile's official-marker attribute on the item, if any.
    pub marker: Option<String>,
}

impl GallerySelectors {
    /// Accepts a candidate only when its marker matches exactly; items
    /// without a marker are never treated as official.
    pub fn official_predicate(&self) -> impl Fn(&PhotoCandidate) -> bool + Send + Sync + '_ {
        move |c| c.marker.as_deref() == Some(self.official_marker.value.as_str())
    }
}

/// Logs a degraded field and turns it into `None`.
fn degrade<T>(source: Source, value: Result<T, MissingField>) -> Option<T> {
    match value {
        Ok(v) => Some(v),
        Err(reason) => {
            tracing::debug!(%source, %reason, "field degraded to absent");
            None
        }
    }
}

fn parsed<T>(
    spec: &FieldSpec,
    raw: Result<String, MissingField>,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Result<T, MissingField> {
    let text = raw?;
    parse(&text).ok_or_else(|| MissingField::Malformed {
        field: spec.logical_name.clone(),
        text,
    })
}

fn rating_in_range(spec: &FieldSpec, raw: Result<String, MissingField>) -> Result<f64, MissingField> {
    let text = raw?;
    match parse_decimal(&text) {
        Some(r) if (0.0..=MAX_RATING).contains(&r) => Ok(r),
        _ => Err(MissingField::Malformed {
            field: spec.logical_name.clone(),
            text,
        }),
    }
}

/// Builds a [`ListingRecord`] from one listing card.
///
/// Returns `None` when the card has no resolvable name or detail link; the
/// caller counts such cards as discarded.
pub async fn extract_listing<S: Scope>(
    card: &S,
    profile: &SourceProfile,
    scraped_at: DateTime<Utc>,
) -> Option<ListingRecord> {
    let sel = &profile.listing;
    let source = profile.source;

    let name = extract_field(card, &sel.name).await;
    let detail_url = extract_field(card, &sel.detail_link)
        .await
        .and_then(|href| {
            profile
                .absolutize(&href)
                .ok_or(MissingField::Malformed {
                    field: sel.detail_link.logical_name.clone(),
                    text: href,
                })
        });

    let (name, detail_url) = match (name, detail_url) {
        (Ok(n), Ok(u)) => (n, u),
        (name, url) => {
            tracing::debug!(
                %source,
                name = ?name.err(),
                detail_url = ?url.err(),
                "discarding card without identity"
            );
            return None;
        }
    };

    let rating = degrade(
        source,
        rating_in_range(&sel.rating, extract_field(card, &sel.rating).await),
    );
    let review_count = degrade(
        source,
        parsed(
            &sel.review_count,
            extract_field(card, &sel.review_count).await,
            parse_integer,
        ),
    )
    .unwrap_or(0);
    let price = degrade(
        source,
        parsed(&sel.price, extract_field(card, &sel.price).await, parse_integer),
    );
    let thumbnail_url = degrade(source, extract_field(card, &sel.thumbnail).await)
        .and_then(|src| profile.absolutize(&src));

    Some(ListingRecord {
        name,
        rating,
        review_count,
        price,
        detail_url,
        thumbnail_url,
        source,
        scraped_at,
    })
}

/// Reads every match of `spec`, trimmed, non-empty, de-duplicated in
/// document order.
async fn read_list<S: Scope>(scope: &S, spec: &FieldSpec) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for element in resolve_all(scope, spec).await {
        if let Ok(value) = read_value(&element, spec).await {
            if seen.insert(value.clone()) {
                out.push(value);
            }
        }
    }
    out
}

/// Builds a [`DetailRecord`] from a property page.
pub async fn extract_detail<S: Scope>(
    page: &S,
    profile: &SourceProfile,
    selectors: &DetailSelectors,
    url: &str,
) -> DetailRecord {
    let source = profile.source;
    let address = degrade(source, extract_field(page, &selectors.address).await);
    let description = degrade(source, extract_field(page, &selectors.description).await);

    let mut amenities = read_list(page, &selectors.amenities).await;
    amenities.truncate(MAX_AMENITIES);

    let images = read_list(page, &selectors.images)
        .await
        .into_iter()
        .filter(|src| {
            selectors
                .image_filter
                .as_deref()
                .is_none_or(|needle| src.contains(needle))
        })
        .filter_map(|src| profile.absolutize(&apply_rewrites(&src, &selectors.image_rewrites)))
        .take(MAX_DETAIL_IMAGES)
        .collect();

    DetailRecord {
        source,
        url: url.to_owned(),
        address,
        description,
        amenities,
        images,
    }
}

/// Extracts gallery photos, keeping only items `is_official` accepts.
///
/// Emitted photos are numbered from zero in document order and capped at the
/// gallery's `max_photos`.
pub async fn extract_photos<S, P>(
    page: &S,
    profile: &SourceProfile,
    gallery: &GallerySelectors,
    is_official: P,
) -> Vec<PhotoRecord>
where
    S: Scope,
    P: Fn(&PhotoCandidate) -> bool + Send + Sync,
{
    let mut photos = Vec::new();
    let mut rejected = 0usize;

    for item in resolve_all(page, &gallery.items).await {
        if photos.len() >= gallery.max_photos {
            break;
        }
        let Some(image) = resolve(&item, &gallery.image).await else {
            continue;
        };
        let Ok(src) = read_value(&image, &gallery.image).await else {
            continue;
        };
        let caption = image
            .attribute(&gallery.caption_attribute)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        let marker = item
            .attribute(&gallery.official_marker.attribute)
            .await
            .ok()
            .flatten();

        let candidate = PhotoCandidate {
            src,
            caption,
            marker,
        };
        if !is_official(&candidate) {
            rejected += 1;
            continue;
        }
        let Some(url) = profile.absolutize(&apply_rewrites(&candidate.src, &gallery.rewrites))
        else {
            continue;
        };

        photos.push(PhotoRecord {
            url,
            caption: candidate.caption.trim().to_owned(),
            order: u32::try_from(photos.len()).unwrap_or(u32::MAX),
            is_official: true,
            source: profile.source,
        });
    }

    if rejected > 0 {
        tracing::debug!(source = %profile.source, rejected, "skipped non-official gallery items");
    }
    photos
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
