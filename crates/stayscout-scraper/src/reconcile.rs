//! Cross-source reconciliation.
//!
//! Listings that share a normalized name (lowercase, whitespace collapsed) are
//! the same property. Merging is a pure function of its inputs: the same
//! listings always produce the same entities in the same order.

use std::collections::{BTreeMap, HashMap, HashSet};

use stayscout_core::{normalize_name, ListingRecord, PhotoRecord, Source, UnifiedEntity};

/// Merges per-source listings into unified entities.
#[must_use]
pub fn merge(listings: &BTreeMap<Source, Vec<ListingRecord>>) -> Vec<UnifiedEntity> {
    merge_with_photos(listings, &BTreeMap::new())
}

/// Like [`merge`], attaching official photos keyed by listing detail URL.
///
/// Entities appear in order of first appearance, walking sources in priority
/// order (Booking, then Ctrip). Within one source a repeated detail URL is a
/// duplicate and only its first listing is kept. Same-name listings from one
/// source with different detail URLs are distinct properties: each becomes
/// its own entity, and a listing from another source joins the first of them
/// that has no listing from that source yet.
#[must_use]
pub fn merge_with_photos(
    listings: &BTreeMap<Source, Vec<ListingRecord>>,
    photos: &BTreeMap<String, Vec<PhotoRecord>>,
) -> Vec<UnifiedEntity> {
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    let mut seen: HashSet<(Source, &str)> = HashSet::new();
    let mut groups: Vec<(String, BTreeMap<Source, ListingRecord>)> = Vec::new();

    for (&source, records) in listings {
        for record in records {
            let key = normalize_name(&record.name);
            if key.is_empty() {
                continue;
            }
            if !seen.insert((source, record.detail_url.as_str())) {
                tracing::debug!(%source, url = %record.detail_url, "duplicate listing within source; keeping first");
                continue;
            }

            let candidates = index.entry(key).or_default();
            let open = candidates
                .iter()
                .copied()
                .find(|&i| !groups[i].1.contains_key(&source));
            match open {
                Some(i) => {
                    groups[i].1.insert(source, record.clone());
                }
                None => {
                    if !candidates.is_empty() {
                        tracing::debug!(%source, name = %record.name, "same name, different property; kept unmerged");
                    }
                    candidates.push(groups.len());
                    let canonical = record.name.split_whitespace().collect::<Vec<_>>().join(" ");
                    groups.push((canonical, BTreeMap::from([(source, record.clone())])));
                }
            }
        }
    }

    groups
        .into_iter()
        .map(|(canonical_name, refs)| finish(canonical_name, refs, photos))
        .collect()
}

fn finish(
    canonical_name: String,
    refs: BTreeMap<Source, ListingRecord>,
    photos: &BTreeMap<String, Vec<PhotoRecord>>,
) -> UnifiedEntity {
    // Rating from the most-reviewed source that has one; ties keep the
    // higher-priority source because iteration is in priority order.
    let mut rated: Option<&ListingRecord> = None;
    for record in refs.values().filter(|r| r.rating.is_some()) {
        if rated.is_none_or(|best| record.review_count > best.review_count) {
            rated = Some(record);
        }
    }
    let merged_rating = rated.and_then(|r| r.rating);
    let merged_price = refs.values().filter_map(|r| r.price).min();
    let merged_photos = refs
        .values()
        .filter_map(|r| photos.get(&r.detail_url))
        .flatten()
        .cloned()
        .collect();

    UnifiedEntity {
        canonical_name,
        per_source_refs: refs,
        merged_price,
        merged_rating,
        photos: merged_photos,
    }
}

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod tests;
