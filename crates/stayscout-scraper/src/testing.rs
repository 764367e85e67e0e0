//! Scripted in-memory renderer used by unit tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RenderError;
use crate::renderer::{Element, Renderer, Scope, Session, SessionProfile, WaitPolicy};

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeElement {
    text: String,
    attributes: BTreeMap<String, String>,
    children: BTreeMap<String, Vec<FakeElement>>,
}

impl FakeElement {
    pub(crate) fn text(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            ..Self::default()
        }
    }

    pub(crate) fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_owned(), value.to_owned());
        self
    }

    pub(crate) fn child(mut self, selector: &str, elements: Vec<FakeElement>) -> Self {
        self.children.insert(selector.to_owned(), elements);
        self
    }
}

#[async_trait]
impl Element for FakeElement {
    async fn text(&self) -> Result<String, RenderError> {
        Ok(self.text.clone())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, RenderError> {
        Ok(self.attributes.get(name).cloned())
    }

    async fn select(&self, selector: &str) -> Result<Vec<FakeElement>, RenderError> {
        Ok(self.children.get(selector).cloned().unwrap_or_default())
    }
}

/// A page: a fixed map from selector to matched elements.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakePage {
    elements: BTreeMap<String, Vec<FakeElement>>,
    failing: BTreeSet<String>,
    queried: Arc<Mutex<Vec<String>>>,
}

impl FakePage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, selector: &str, elements: Vec<FakeElement>) -> Self {
        self.elements.insert(selector.to_owned(), elements);
        self
    }

    pub(crate) fn failing(mut self, selector: &str) -> Self {
        self.failing.insert(selector.to_owned());
        self
    }

    pub(crate) fn queried(&self) -> Vec<String> {
        self.queried.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Scope for FakePage {
    type Element = FakeElement;

    async fn query_all(&self, selector: &str) -> Result<Vec<FakeElement>, RenderError> {
        if let Ok(mut q) = self.queried.lock() {
            q.push(selector.to_owned());
        }
        if self.failing.contains(selector) {
            return Err(RenderError::InvalidSelector {
                selector: selector.to_owned(),
                reason: "scripted failure".to_owned(),
            });
        }
        Ok(self.elements.get(selector).cloned().unwrap_or_default())
    }
}

/// A session over a set of URL → page fixtures.
///
/// Every call is appended to a shared journal so tests can inspect what the
/// pipeline did after the session has been moved into a task.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeSession {
    pages: HashMap<String, FakePage>,
    goto_failures: HashMap<String, u32>,
    stalls: HashMap<String, Duration>,
    current: Option<String>,
    journal: Arc<Mutex<Vec<String>>>,
}

impl FakeSession {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_owned(), page);
        self
    }

    /// The first `times` navigations to `url` fail.
    pub(crate) fn fail_goto(mut self, url: &str, times: u32) -> Self {
        self.goto_failures.insert(url.to_owned(), times);
        self
    }

    /// Navigations to `url` take `delay` before completing.
    pub(crate) fn stall(mut self, url: &str, delay: Duration) -> Self {
        self.stalls.insert(url.to_owned(), delay);
        self
    }

    pub(crate) fn journal(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.journal)
    }

    fn record(&self, entry: String) {
        if let Ok(mut j) = self.journal.lock() {
            j.push(entry);
        }
    }
}

pub(crate) fn entries(journal: &Arc<Mutex<Vec<String>>>, prefix: &str) -> Vec<String> {
    journal
        .lock()
        .map(|j| j.iter().filter(|e| e.starts_with(prefix)).cloned().collect())
        .unwrap_or_default()
}

#[async_trait]
impl Scope for FakeSession {
    type Element = FakeElement;

    async fn query_all(&self, selector: &str) -> Result<Vec<FakeElement>, RenderError> {
        let url = self.current.as_ref().ok_or(RenderError::NoPage)?;
        match self.pages.get(url) {
            Some(page) => page.query_all(selector).await,
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn goto(
        &mut self,
        url: &str,
        _wait: WaitPolicy,
        _timeout: Duration,
    ) -> Result<(), RenderError> {
        self.record(format!("goto {url}"));
        if let Some(delay) = self.stalls.get(url).copied() {
            tokio::time::sleep(delay).await;
        }
        if let Some(remaining) = self.goto_failures.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RenderError::Status {
                    status: 503,
                    url: url.to_owned(),
                });
            }
        }
        if !self.pages.contains_key(url) {
            return Err(RenderError::Status {
                status: 404,
                url: url.to_owned(),
            });
        }
        self.current = Some(url.to_owned());
        Ok(())
    }

    async fn wait_for_idle(&mut self, _timeout: Duration) -> Result<(), RenderError> {
        if self.current.is_some() {
            Ok(())
        } else {
            Err(RenderError::NoPage)
        }
    }

    async fn click(&mut self, element: &FakeElement) -> Result<(), RenderError> {
        let href = element
            .attributes
            .get("href")
            .cloned()
            .ok_or_else(|| RenderError::NotClickable {
                reason: "no href".to_owned(),
            })?;
        self.record(format!("click {href}"));
        self.goto(&href, WaitPolicy::NetworkIdle, Duration::from_secs(1))
            .await
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, RenderError> {
        self.record(format!("evaluate {script}"));
        Ok(serde_json::Value::Null)
    }

    fn current_url(&self) -> Option<String> {
        self.current.clone()
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        self.record("close".to_owned());
        self.current = None;
        Ok(())
    }
}

/// Hands out clones of a template session.
pub(crate) struct FakeRenderer {
    pub(crate) session: FakeSession,
    pub(crate) fail_open: bool,
}

#[async_trait]
impl Renderer for FakeRenderer {
    type Session = FakeSession;

    async fn open_session(&self, _profile: &SessionProfile) -> Result<FakeSession, RenderError> {
        if self.fail_open {
            return Err(RenderError::Browserless {
                status: 503,
                message: "renderer unavailable".to_owned(),
            });
        }
        Ok(self.session.clone())
    }
}
