//! Run documents: the JSON written by `crawl` and read back by `merge`.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stayscout_core::{ListingRecord, RunParams, Source, UnifiedEntity};
use stayscout_scraper::{merge_with_photos, ScraperError, SourceOutput};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SourceFailure {
    pub source: Source,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RunDocument {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub params: RunParams,
    pub sources: Vec<SourceOutput>,
    #[serde(default)]
    pub failures: Vec<SourceFailure>,
    pub entities: Vec<UnifiedEntity>,
}

impl RunDocument {
    pub(crate) fn assemble(
        params: RunParams,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        results: Vec<(Source, Result<SourceOutput, ScraperError>)>,
    ) -> Self {
        let mut sources = Vec::new();
        let mut failures = Vec::new();
        for (source, result) in results {
            match result {
                Ok(output) => sources.push(output),
                Err(err) => {
                    tracing::error!(%source, error = %err, "source task failed");
                    failures.push(SourceFailure {
                        source,
                        error: err.to_string(),
                    });
                }
            }
        }
        let entities = reconcile(&sources);
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at,
            params,
            sources,
            failures,
            entities,
        }
    }
}

/// Merges the listings and photos of every source output. Outputs for the
/// same source are concatenated in the order given.
pub(crate) fn reconcile(outputs: &[SourceOutput]) -> Vec<UnifiedEntity> {
    let mut listings: BTreeMap<Source, Vec<ListingRecord>> = BTreeMap::new();
    let mut photos = BTreeMap::new();
    for output in outputs {
        listings
            .entry(output.source)
            .or_default()
            .extend(output.listings.iter().cloned());
        for (url, gallery) in &output.photos {
            photos.entry(url.clone()).or_insert_with(|| gallery.clone());
        }
    }
    merge_with_photos(&listings, &photos)
}

/// Writes pretty JSON to `path`, or to stdout when `path` is `None`.
pub(crate) fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => std::fs::write(path, json + "\n")
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}

pub(crate) fn read_document(path: &Path) -> anyhow::Result<RunDocument> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a run document", path.display()))
}

/// Reconciles the source outputs of every input document and writes the
/// resulting entities.
pub(crate) fn run_merge(inputs: &[PathBuf], output: Option<&Path>) -> anyhow::Result<()> {
    let mut outputs = Vec::new();
    for path in inputs {
        let document = read_document(path)?;
        tracing::info!(path = %path.display(), run_id = %document.run_id, "loaded run document");
        outputs.extend(document.sources);
    }
    let entities = reconcile(&outputs);
    tracing::info!(entities = entities.len(), "merge finished");
    write_json(output, &entities)
}
