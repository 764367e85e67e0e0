//! Per-source site profiles.
//!
//! A profile bundles everything site-specific: URLs, pagination style, and the
//! candidate selectors for every field. Built-in profiles cover the two
//! supported sources; a YAML file may override either of them when a site's
//! markup drifts.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use stayscout_core::Source;

use crate::error::ScraperError;
use crate::selector::{ExtractorKind, FieldSpec};

/// Characters left unescaped in a query-string value.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const CITY_PLACEHOLDER: &str = "{city}";
const OFFSET_PLACEHOLDER: &str = "{offset}";

/// How a source exposes subsequent result pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PaginationStrategy {
    /// Page `k` is addressed directly with `offset = k * page_size`.
    Offset { page_size: u32 },
    /// Later pages are reached by clicking a "next" control; lazy-loaded
    /// cards are triggered by scrolling before each extraction.
    Interactive {
        next_control: FieldSpec,
        lazy_load_ticks: u32,
        tick_delay_ms: u64,
        scroll_script: String,
    },
}

/// Plain substring substitution applied to image URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRewrite {
    pub from: String,
    pub to: String,
}

impl UrlRewrite {
    fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_owned(),
            to: to.to_owned(),
        }
    }
}

/// Applies every rewrite in order.
#[must_use]
pub fn apply_rewrites(url: &str, rewrites: &[UrlRewrite]) -> String {
    rewrites
        .iter()
        .fold(url.to_owned(), |acc, r| acc.replace(&r.from, &r.to))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSelectors {
    /// One match per listing card; every other field resolves inside a card.
    pub card: FieldSpec,
    pub name: FieldSpec,
    pub rating: FieldSpec,
    pub review_count: FieldSpec,
    pub price: FieldSpec,
    pub detail_link: FieldSpec,
    pub thumbnail: FieldSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailSelectors {
    pub address: FieldSpec,
    pub description: FieldSpec,
    pub amenities: FieldSpec,
    pub images: FieldSpec,
    /// When set, only image URLs containing this substring are kept.
    #[serde(default)]
    pub image_filter: Option<String>,
    #[serde(default)]
    pub image_rewrites: Vec<UrlRewrite>,
}

/// Marks an item as curated by the source rather than uploaded by a guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficialMarker {
    pub attribute: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GallerySelectors {
    /// Control that reveals the gallery; absent when photos render inline.
    #[serde(default)]
    pub opener: Option<FieldSpec>,
    pub items: FieldSpec,
    /// Image inside an item; usually an attribute extractor for `src`.
    pub image: FieldSpec,
    #[serde(default = "default_caption_attribute")]
    pub caption_attribute: String,
    pub official_marker: OfficialMarker,
    pub max_photos: usize,
    #[serde(default)]
    pub rewrites: Vec<UrlRewrite>,
}

fn default_caption_attribute() -> String {
    "alt".to_owned()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProfile {
    pub source: Source,
    /// Relative links found on this source resolve against this URL.
    pub base_url: String,
    /// Listing URL template with `{city}` and, for offset pagination,
    /// `{offset}` placeholders.
    pub search_url: String,
    pub pagination: PaginationStrategy,
    pub listing: ListingSelectors,
    #[serde(default)]
    pub detail: Option<DetailSelectors>,
    #[serde(default)]
    pub gallery: Option<GallerySelectors>,
}

impl SourceProfile {
    /// The profile shipped for `source`.
    #[must_use]
    pub fn builtin(source: Source) -> Self {
        match source {
            Source::Booking => booking(),
            Source::Ctrip => ctrip(),
        }
    }

    /// URL of listing page `page_index` (zero-based) for `city`.
    #[must_use]
    pub fn page_url(&self, city: &str, page_index: u32) -> String {
        let offset = match &self.pagination {
            PaginationStrategy::Offset { page_size } => page_index.saturating_mul(*page_size),
            PaginationStrategy::Interactive { .. } => 0,
        };
        let city = utf8_percent_encode(city, QUERY_VALUE).to_string();
        self.search_url
            .replace(CITY_PLACEHOLDER, &city)
            .replace(OFFSET_PLACEHOLDER, &offset.to_string())
    }

    /// Resolves `href` against [`SourceProfile::base_url`].
    #[must_use]
    pub fn absolutize(&self, href: &str) -> Option<String> {
        let base = Url::parse(&self.base_url).ok()?;
        base.join(href.trim()).ok().map(String::from)
    }

    /// Checks the invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidProfile`] or the [`FieldSpec`] error
    /// for the first violation found.
    pub fn validate(&self) -> Result<(), ScraperError> {
        let invalid = |reason: &str| ScraperError::InvalidProfile {
            site: self.source,
            reason: reason.to_owned(),
        };

        Url::parse(&self.base_url).map_err(|e| invalid(&format!("base_url: {e}")))?;
        if !self.search_url.contains(CITY_PLACEHOLDER) {
            return Err(invalid("search_url must contain {city}"));
        }
        match &self.pagination {
            PaginationStrategy::Offset { page_size } => {
                if *page_size == 0 {
                    return Err(invalid("page_size must be at least 1"));
                }
                if !self.search_url.contains(OFFSET_PLACEHOLDER) {
                    return Err(invalid("offset pagination needs {offset} in search_url"));
                }
            }
            PaginationStrategy::Interactive { next_control, .. } => next_control.validate()?,
        }

        let l = &self.listing;
        for spec in [
            &l.card,
            &l.name,
            &l.rating,
            &l.review_count,
            &l.price,
            &l.detail_link,
            &l.thumbnail,
        ] {
            spec.validate()?;
        }
        if let Some(d) = &self.detail {
            for spec in [&d.address, &d.description, &d.amenities, &d.images] {
                spec.validate()?;
            }
        }
        if let Some(g) = &self.gallery {
            g.items.validate()?;
            g.image.validate()?;
            if let Some(opener) = &g.opener {
                opener.validate()?;
            }
            if g.max_photos == 0 {
                return Err(invalid("gallery max_photos must be at least 1"));
            }
        }
        Ok(())
    }

    /// Scroll ticks and their spacing for interactive pagination.
    #[must_use]
    pub fn lazy_load(&self) -> Option<(u32, Duration, &str)> {
        match &self.pagination {
            PaginationStrategy::Interactive {
                lazy_load_ticks,
                tick_delay_ms,
                scroll_script,
                ..
            } => Some((
                *lazy_load_ticks,
                Duration::from_millis(*tick_delay_ms),
                scroll_script.as_str(),
            )),
            PaginationStrategy::Offset { .. } => None,
        }
    }
}

/// The effective profile for every source.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSet {
    profiles: BTreeMap<Source, SourceProfile>,
}

#[derive(Deserialize)]
struct ProfileFile {
    profiles: Vec<SourceProfile>,
}

impl ProfileSet {
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            profiles: Source::ALL
                .into_iter()
                .map(|s| (s, SourceProfile::builtin(s)))
                .collect(),
        }
    }

    /// Built-in profiles with any profile in `yaml` replacing the one for
    /// the same source.
    ///
    /// # Errors
    ///
    /// Returns a parse error for malformed YAML or a validation error for a
    /// profile that breaks an invariant.
    pub fn with_overrides(yaml: &str) -> Result<Self, ScraperError> {
        let file: ProfileFile = serde_yaml::from_str(yaml)?;
        let mut set = Self::builtin();
        for profile in file.profiles {
            profile.validate()?;
            tracing::info!(source = %profile.source, "using profile override");
            set.profiles.insert(profile.source, profile);
        }
        Ok(set)
    }

    /// Loads overrides from `path`, or the built-ins when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::ProfileIo`] when the file cannot be read, and
    /// otherwise the errors of [`ProfileSet::with_overrides`].
    pub fn load(path: Option<&Path>) -> Result<Self, ScraperError> {
        let Some(path) = path else {
            return Ok(Self::builtin());
        };
        let yaml = std::fs::read_to_string(path).map_err(|source| ScraperError::ProfileIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::with_overrides(&yaml)
    }

    #[must_use]
    pub fn get(&self, source: Source) -> &SourceProfile {
        // Construction always starts from the built-ins, so every source is present.
        &self.profiles[&source]
    }

    /// Serializes the given profiles in the override-file layout.
    ///
    /// # Errors
    ///
    /// Returns the YAML serializer error.
    pub fn to_yaml(&self, sources: &[Source]) -> Result<String, ScraperError> {
        #[derive(Serialize)]
        struct Out<'a> {
            profiles: Vec<&'a SourceProfile>,
        }
        let profiles = sources.iter().map(|s| self.get(*s)).collect();
        Ok(serde_yaml::to_string(&Out { profiles })?)
    }
}

fn field(name: &str, candidates: &[&str]) -> FieldSpec {
    FieldSpec {
        logical_name: name.to_owned(),
        candidate_selectors: candidates.iter().map(|s| (*s).to_owned()).collect(),
        extractor_kind: ExtractorKind::Text,
    }
}

fn attr_field(name: &str, candidates: &[&str], attribute: &str) -> FieldSpec {
    FieldSpec {
        extractor_kind: ExtractorKind::Attribute {
            name: attribute.to_owned(),
        },
        ..field(name, candidates)
    }
}

fn booking() -> SourceProfile {
    SourceProfile {
        source: Source::Booking,
        base_url: "https://www.booking.com".to_owned(),
        search_url: "https://www.booking.com/searchresults.html?ss={city}&checkin=&checkout=&offset={offset}"
            .to_owned(),
        pagination: PaginationStrategy::Offset { page_size: 25 },
        listing: ListingSelectors {
            card: field(
                "card",
                &[r#"[data-testid="property-card"]"#, ".sr_property_block"],
            ),
            name: field(
                "name",
                &[r#"[data-testid="title"]"#, ".sr-hotel__name"],
            ),
            rating: field(
                "rating",
                &[
                    r#"[data-testid="review-score"] > div:first-child"#,
                    r#"[data-testid="review-score"]"#,
                    ".bui-review-score__badge",
                ],
            ),
            review_count: field(
                "review_count",
                &[
                    r#"[data-testid="review-count"]"#,
                    ".bui-review-score__text",
                ],
            ),
            price: field(
                "price",
                &[
                    r#"[data-testid="price-and-discounted-price"]"#,
                    ".bui-price-display__value",
                    ".prco-valign-middle-helper",
                ],
            ),
            detail_link: attr_field(
                "detail_url",
                &[r#"a[data-testid="title-link"]"#, "a.hotel_name_link"],
                "href",
            ),
            thumbnail: attr_field(
                "thumbnail_url",
                &[r#"img[data-testid="image"]"#, "img.hotel_image"],
                "src",
            ),
        },
        detail: Some(DetailSelectors {
            address: field(
                "address",
                &[r#"[data-testid="address"]"#, ".hp_address_subtitle"],
            ),
            description: field(
                "description",
                &[
                    r#"[data-testid="property-description"]"#,
                    "#property_description_content",
                ],
            ),
            amenities: field(
                "amenities",
                &[
                    ".hp__hotel_facilities .facilities-checkmark",
                    r#"[data-testid="property-most-popular-facilities-wrapper"] li"#,
                ],
            ),
            images: attr_field(
                "images",
                &[".bh-photo-grid-item img", r#"[data-testid="gallery-grid"] img"#],
                "src",
            ),
            image_filter: Some("max".to_owned()),
            image_rewrites: vec![UrlRewrite::new("max300", "max1024x768")],
        }),
        gallery: None,
    }
}

fn ctrip() -> SourceProfile {
    SourceProfile {
        source: Source::Ctrip,
        base_url: "https://hotels.ctrip.com".to_owned(),
        search_url: "https://hotels.ctrip.com/hotels/listPage?city={city}&checkIn=&checkOut="
            .to_owned(),
        pagination: PaginationStrategy::Interactive {
            next_control: field("next_page", &[".next-page", ".pagination a.next"]),
            lazy_load_ticks: 3,
            tick_delay_ms: 1_000,
            scroll_script: "window.scrollBy(0, 800)".to_owned(),
        },
        listing: ListingSelectors {
            card: field("card", &[".hotel-item", ".list-item"]),
            name: field("name", &[".hotel-name", ".list-card-title .name"]),
            rating: field("rating", &[".score", ".comment-score"]),
            review_count: field("review_count", &[".comment-count", ".comment-num"]),
            price: field("price", &[".price", ".real-price"]),
            detail_link: attr_field("detail_url", &["a.hotel-name", "a"], "href"),
            thumbnail: attr_field("thumbnail_url", &["img.hotel-pic", "img"], "src"),
        },
        detail: None,
        gallery: Some(GallerySelectors {
            opener: Some(field(
                "gallery_opener",
                &[".hotel-pic-gallery", ".detail-headalbum"],
            )),
            items: field("gallery_items", &[".gallery-image", ".album-item"]),
            image: attr_field("gallery_image", &["img"], "src"),
            caption_attribute: default_caption_attribute(),
            official_marker: OfficialMarker {
                attribute: "data-type".to_owned(),
                value: "official".to_owned(),
            },
            max_photos: 50,
            rewrites: vec![UrlRewrite::new("200w", "800w"), UrlRewrite::new("_R_", "")],
        }),
    }
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
