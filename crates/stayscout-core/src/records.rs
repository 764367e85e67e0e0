use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of amenities kept on a [`DetailRecord`].
pub const MAX_AMENITIES: usize = 20;

/// Maximum number of gallery images kept on a [`DetailRecord`].
pub const MAX_DETAIL_IMAGES: usize = 30;

/// Upper bound of the rating scale shared by every source.
pub const MAX_RATING: f64 = 10.0;

/// The site a record was scraped from.
///
/// Variant order is significant: it is the reconciliation priority order
/// (Booking is source A, Ctrip is source B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Booking,
    Ctrip,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Booking, Source::Ctrip];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Booking => "booking",
            Source::Ctrip => "ctrip",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "booking" | "a" => Ok(Source::Booking),
            "ctrip" | "b" => Ok(Source::Ctrip),
            other => Err(format!("unknown source '{other}'; expected booking or ctrip")),
        }
    }
}

/// One summary card from a listing (search results) page.
///
/// Only constructed when both `name` and `detail_url` were resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub name: String,
    /// Guest rating on a 0–10 scale; absent when missing or unparseable.
    pub rating: Option<f64>,
    pub review_count: u64,
    /// Nightly price as shown on the card: the integer part, currency dropped.
    pub price: Option<u64>,
    /// Absolute URL of the property's detail page.
    pub detail_url: String,
    pub thumbnail_url: Option<String>,
    pub source: Source,
    pub scraped_at: DateTime<Utc>,
}

/// Extended fields from a single property's detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub source: Source,
    pub url: String,
    pub address: Option<String>,
    pub description: Option<String>,
    /// Deduplicated, in page order, at most [`MAX_AMENITIES`].
    pub amenities: Vec<String>,
    /// High-resolution image URLs, in page order, at most [`MAX_DETAIL_IMAGES`].
    pub images: Vec<String>,
}

/// A gallery photograph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub url: String,
    pub caption: String,
    pub order: u32,
    /// `true` only when the photo was positively verified as curated by the
    /// source site, never inferred from a missing user-upload marker.
    pub is_official: bool,
    pub source: Source,
}

/// A property as seen across every source, produced by the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedEntity {
    pub canonical_name: String,
    pub per_source_refs: BTreeMap<Source, ListingRecord>,
    pub merged_price: Option<u64>,
    pub merged_rating: Option<f64>,
    pub photos: Vec<PhotoRecord>,
}

impl UnifiedEntity {
    /// Sources that contributed a listing to this entity, in priority order.
    pub fn sources(&self) -> impl Iterator<Item = Source> + '_ {
        self.per_source_refs.keys().copied()
    }
}

/// Identity key used for cross-source matching: lowercased, with runs of
/// whitespace collapsed to a single space and the ends trimmed.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_orders_booking_before_ctrip() {
        assert!(Source::Booking < Source::Ctrip);
        assert_eq!(Source::ALL, [Source::Booking, Source::Ctrip]);
    }

    #[test]
    fn source_parses_names_and_letters() {
        assert_eq!("booking".parse::<Source>().unwrap(), Source::Booking);
        assert_eq!(" Ctrip ".parse::<Source>().unwrap(), Source::Ctrip);
        assert_eq!("A".parse::<Source>().unwrap(), Source::Booking);
        assert_eq!("b".parse::<Source>().unwrap(), Source::Ctrip);
        assert!("expedia".parse::<Source>().is_err());
    }

    #[test]
    fn source_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Source::Ctrip).unwrap(), "\"ctrip\"");
        assert_eq!(Source::Booking.to_string(), "booking");
    }

    #[test]
    fn caps_are_exported_from_crate_root() {
        assert_eq!(crate::MAX_AMENITIES, 20);
        assert_eq!(crate::MAX_DETAIL_IMAGES, 30);
        assert!((crate::MAX_RATING - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn normalize_name_folds_case_and_whitespace() {
        assert_eq!(normalize_name("  Grand\tHotel \n "), "grand hotel");
        assert_eq!(normalize_name("GRAND   HOTEL"), "grand hotel");
        assert_eq!(normalize_name("西湖 国宾馆"), "西湖 国宾馆");
    }

    #[test]
    fn unified_entity_serializes_source_keys_as_strings() {
        let listing = ListingRecord {
            name: "Grand Hotel".to_owned(),
            rating: Some(8.6),
            review_count: 12,
            price: None,
            detail_url: "https://www.booking.com/hotel/cn/grand.html".to_owned(),
            thumbnail_url: None,
            source: Source::Booking,
            scraped_at: DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let entity = UnifiedEntity {
            canonical_name: "Grand Hotel".to_owned(),
            per_source_refs: BTreeMap::from([(Source::Booking, listing)]),
            merged_price: None,
            merged_rating: Some(8.6),
            photos: vec![],
        };
        let json = serde_json::to_value(&entity).unwrap();
        assert!(json["per_source_refs"]["booking"].is_object());
        assert_eq!(entity.sources().collect::<Vec<_>>(), vec![Source::Booking]);
    }
}
