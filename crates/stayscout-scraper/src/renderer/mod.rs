//! Page renderer capability.
//!
//! The pipeline talks to a headless browser (or anything that can stand in
//! for one) only through these traits. [`html::HtmlRenderer`] is the shipped
//! binding; tests drive the pipeline with scripted in-memory sessions.

pub mod html;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RenderError;

pub use html::{FetchMode, HtmlElement, HtmlRenderer, HtmlSession};

/// When a navigation counts as loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    Load,
    DomContentLoaded,
    /// No pending network activity.
    #[default]
    NetworkIdle,
}

impl WaitPolicy {
    /// The Puppeteer `waitUntil` value for this policy.
    #[must_use]
    pub fn as_puppeteer(self) -> &'static str {
        match self {
            WaitPolicy::Load => "load",
            WaitPolicy::DomContentLoaded => "domcontentloaded",
            WaitPolicy::NetworkIdle => "networkidle2",
        }
    }
}

/// Browser-context settings applied when a session is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProfile {
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Timeout applied to navigations the session starts on its own
    /// (for example when following a clicked link).
    pub default_timeout: Duration,
}

impl SessionProfile {
    #[must_use]
    pub fn new(user_agent: &str, default_timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.to_owned(),
            viewport_width: 1920,
            viewport_height: 1080,
            default_timeout,
        }
    }
}

/// A handle to one element of a rendered page.
#[async_trait]
pub trait Element: Send + Sync + Sized {
    /// Rendered text content, whitespace-collapsed.
    async fn text(&self) -> Result<String, RenderError>;

    async fn attribute(&self, name: &str) -> Result<Option<String>, RenderError>;

    /// Descendants of this element matching `selector`.
    async fn select(&self, selector: &str) -> Result<Vec<Self>, RenderError>;
}

/// Anything selectors can be evaluated against: a whole page or an element.
#[async_trait]
pub trait Scope: Send + Sync {
    type Element: Element;

    async fn query_all(&self, selector: &str) -> Result<Vec<Self::Element>, RenderError>;
}

#[async_trait]
impl<E: Element> Scope for E {
    type Element = E;

    async fn query_all(&self, selector: &str) -> Result<Vec<E>, RenderError> {
        self.select(selector).await
    }
}

/// One browser tab. A session is a serial resource: it is owned by exactly
/// one source task and never shared.
#[async_trait]
pub trait Session: Scope + Send {
    async fn goto(
        &mut self,
        url: &str,
        wait: WaitPolicy,
        timeout: Duration,
    ) -> Result<(), RenderError>;

    /// Resolves once the current page has settled (no pending network
    /// activity), or fails after `timeout`.
    async fn wait_for_idle(&mut self, timeout: Duration) -> Result<(), RenderError>;

    async fn click(&mut self, element: &Self::Element) -> Result<(), RenderError>;

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, RenderError>;

    fn current_url(&self) -> Option<String>;

    async fn close(&mut self) -> Result<(), RenderError>;
}

/// Factory for sessions.
#[async_trait]
pub trait Renderer: Send + Sync {
    type Session: Session + 'static;

    async fn open_session(&self, profile: &SessionProfile) -> Result<Self::Session, RenderError>;
}
