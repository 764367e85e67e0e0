pub mod cancel;
pub mod error;
pub mod extract;
pub mod navigator;
pub mod pagination;
pub mod parse;
pub mod profile;
pub mod reconcile;
pub mod renderer;
pub mod selector;
pub mod task;

#[cfg(test)]
mod testing;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use error::{MissingField, RenderError, ScraperError};
pub use extract::{extract_detail, extract_listing, extract_photos, PhotoCandidate};
pub use navigator::{click_through, navigate, NavState, Navigation, Pacer, RetryPolicy};
pub use pagination::{collect_listings, ListingHarvest, SkipReason, SkippedPage, SourceReport};
pub use profile::{PaginationStrategy, ProfileSet, SourceProfile};
pub use reconcile::{merge, merge_with_photos};
pub use renderer::{
    Element, FetchMode, HtmlRenderer, Renderer, Scope, Session, SessionProfile, WaitPolicy,
};
pub use selector::{extract_field, resolve, resolve_all, ExtractorKind, FieldSpec};
pub use task::{run_source_task, run_sources, SourceOutput, TaskSettings};
