//! Layered selector resolution.
//!
//! Each logical field carries an ordered list of candidate selectors. The
//! first candidate that matches at least one element wins; later candidates
//! are fallbacks for when the site's markup drifts. A field that matches
//! nothing is an ordinary outcome, reported as [`MissingField`], never as a
//! run error.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{MissingField, ScraperError};
use crate::renderer::{Element, Scope};

/// A compiled regular expression used by [`ExtractorKind::NumericPattern`].
///
/// The first capture group (or the whole match when the pattern has no
/// groups) is the extracted text.
#[derive(Debug, Clone)]
pub struct NumericPattern(Regex);

impl NumericPattern {
    /// # Errors
    ///
    /// Returns the `regex` compile error for an invalid pattern.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        let caps = self.0.captures(text)?;
        caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str())
    }
}

impl PartialEq for NumericPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for NumericPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NumericPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NumericPattern::new(&raw).map_err(serde::de::Error::custom)
    }
}

/// How a matched element is turned into a raw string value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractorKind {
    #[default]
    Text,
    Attribute { name: String },
    NumericPattern { pattern: NumericPattern },
}

/// Locator for one logical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub logical_name: String,
    pub candidate_selectors: Vec<String>,
    #[serde(default)]
    pub extractor_kind: ExtractorKind,
}

impl FieldSpec {
    /// # Errors
    ///
    /// Returns [`ScraperError::EmptyFieldSpec`] when `candidates` is empty.
    pub fn new(
        logical_name: &str,
        candidates: &[&str],
        extractor_kind: ExtractorKind,
    ) -> Result<Self, ScraperError> {
        let spec = Self {
            logical_name: logical_name.to_owned(),
            candidate_selectors: candidates.iter().map(|s| (*s).to_owned()).collect(),
            extractor_kind,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Text field.
    ///
    /// # Errors
    ///
    /// See [`FieldSpec::new`].
    pub fn text(logical_name: &str, candidates: &[&str]) -> Result<Self, ScraperError> {
        Self::new(logical_name, candidates, ExtractorKind::Text)
    }

    /// Attribute field.
    ///
    /// # Errors
    ///
    /// See [`FieldSpec::new`].
    pub fn attribute(
        logical_name: &str,
        candidates: &[&str],
        attribute: &str,
    ) -> Result<Self, ScraperError> {
        Self::new(
            logical_name,
            candidates,
            ExtractorKind::Attribute {
                name: attribute.to_owned(),
            },
        )
    }

    /// Field whose text is narrowed by a regular expression.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidPattern`] for a bad pattern, otherwise
    /// see [`FieldSpec::new`].
    pub fn numeric(
        logical_name: &str,
        candidates: &[&str],
        pattern: &str,
    ) -> Result<Self, ScraperError> {
        let pattern = NumericPattern::new(pattern).map_err(|source| ScraperError::InvalidPattern {
            field: logical_name.to_owned(),
            source,
        })?;
        Self::new(
            logical_name,
            candidates,
            ExtractorKind::NumericPattern { pattern },
        )
    }

    /// Checks the non-empty candidate invariant (needed after deserializing).
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::EmptyFieldSpec`] when no usable candidate exists.
    pub fn validate(&self) -> Result<(), ScraperError> {
        if self.candidate_selectors.iter().all(|s| s.trim().is_empty()) {
            return Err(ScraperError::EmptyFieldSpec {
                field: self.logical_name.clone(),
            });
        }
        Ok(())
    }

    fn missing(&self) -> MissingField {
        MissingField::Unresolved {
            field: self.logical_name.clone(),
        }
    }
}

/// Returns the first element matched by the first candidate selector that
/// matches anything, or `None` once every candidate has been tried.
///
/// A candidate that fails to evaluate (bad syntax, renderer hiccup) is
/// logged and treated as a miss for that candidate only.
pub async fn resolve<S: Scope>(scope: &S, spec: &FieldSpec) -> Option<S::Element> {
    resolve_all(scope, spec).await.into_iter().next()
}

/// Like [`resolve`], but returns every element the winning candidate matched.
pub async fn resolve_all<S: Scope>(scope: &S, spec: &FieldSpec) -> Vec<S::Element> {
    for selector in &spec.candidate_selectors {
        if selector.trim().is_empty() {
            continue;
        }
        match scope.query_all(selector).await {
            Ok(found) if !found.is_empty() => {
                tracing::trace!(
                    field = %spec.logical_name,
                    selector = %selector,
                    matches = found.len(),
                    "selector matched"
                );
                return found;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(
                    field = %spec.logical_name,
                    selector = %selector,
                    error = %err,
                    "candidate selector failed to evaluate"
                );
            }
        }
    }
    Vec::new()
}

/// Reads the raw value of `element` according to `spec.extractor_kind`.
///
/// Empty text and missing attributes count as unresolved; a numeric pattern
/// that finds nothing counts as malformed.
pub async fn read_value<E: Element>(element: &E, spec: &FieldSpec) -> Result<String, MissingField> {
    let raw = match &spec.extractor_kind {
        ExtractorKind::Text => element.text().await.ok(),
        ExtractorKind::Attribute { name } => element.attribute(name).await.ok().flatten(),
        ExtractorKind::NumericPattern { pattern } => {
            let text = element.text().await.map_err(|_| spec.missing())?;
            return match pattern.find(&text) {
                Some(found) => Ok(found.to_owned()),
                None => Err(MissingField::Malformed {
                    field: spec.logical_name.clone(),
                    text,
                }),
            };
        }
    };

    raw.map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| spec.missing())
}

/// Resolves `spec` in `scope` and reads its value.
pub async fn extract_field<S: Scope>(scope: &S, spec: &FieldSpec) -> Result<String, MissingField> {
    let element = resolve(scope, spec).await.ok_or_else(|| spec.missing())?;
    read_value(&element, spec).await
}
