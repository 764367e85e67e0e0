//! HTTP-backed renderer binding.
//!
//! Pages are fetched either directly or through a Browserless-compatible
//! `/content` endpoint (which renders the page in headless Chrome and returns
//! the settled HTML). Selector queries run against an owned snapshot of the
//! document parsed with the `scraper` crate, so elements can be held across
//! await points. Scripts are not executed.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Selector};

use super::{Element, Renderer, Scope, Session, SessionProfile, WaitPolicy};
use crate::error::RenderError;

/// How [`HtmlSession`] obtains page HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchMode {
    /// Plain GET request; no JavaScript rendering.
    Direct,
    /// POST to `{base_url}/content`, letting the service render the page.
    Browserless {
        base_url: String,
        token: Option<String>,
    },
}

impl FetchMode {
    /// Picks Browserless when a renderer URL is configured, direct otherwise.
    #[must_use]
    pub fn from_config(renderer_url: Option<&str>, token: Option<&str>) -> Self {
        match renderer_url {
            Some(base) => FetchMode::Browserless {
                base_url: base.trim_end_matches('/').to_owned(),
                token: token.map(str::to_owned),
            },
            None => FetchMode::Direct,
        }
    }

    fn endpoint(base_url: &str, path: &str, token: Option<&str>) -> Result<Url, RenderError> {
        let raw = format!("{base_url}{path}");
        let mut url = Url::parse(&raw).map_err(|e| RenderError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        if let Some(token) = token {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url)
    }
}

/// Opens [`HtmlSession`]s.
#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    mode: FetchMode,
}

impl HtmlRenderer {
    #[must_use]
    pub fn new(mode: FetchMode) -> Self {
        Self { mode }
    }
}

#[async_trait]
impl Renderer for HtmlRenderer {
    type Session = HtmlSession;

    /// Builds the HTTP client and, in Browserless mode, checks that the
    /// rendering service answers before any navigation is attempted.
    async fn open_session(&self, profile: &SessionProfile) -> Result<HtmlSession, RenderError> {
        let client = Client::builder()
            .user_agent(profile.user_agent.as_str())
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        if let FetchMode::Browserless { base_url, token } = &self.mode {
            let version_url = FetchMode::endpoint(base_url, "/json/version", token.as_deref())?;
            let response = client
                .get(version_url)
                .timeout(profile.default_timeout)
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(RenderError::Browserless {
                    status: status.as_u16(),
                    message,
                });
            }
        }

        tracing::debug!(
            mode = ?self.mode,
            viewport_width = profile.viewport_width,
            viewport_height = profile.viewport_height,
            "renderer session opened"
        );

        Ok(HtmlSession {
            client,
            mode: self.mode.clone(),
            default_timeout: profile.default_timeout,
            page: None,
        })
    }
}

#[derive(Debug)]
struct LoadedPage {
    url: Url,
    html: String,
}

/// A single-tab session over [`FetchMode`].
#[derive(Debug)]
pub struct HtmlSession {
    client: Client,
    mode: FetchMode,
    default_timeout: Duration,
    page: Option<LoadedPage>,
}

impl HtmlSession {
    async fn fetch(
        &self,
        url: &Url,
        wait: WaitPolicy,
        timeout: Duration,
    ) -> Result<(Url, String), RenderError> {
        let as_render_error = |err: reqwest::Error| {
            if err.is_timeout() {
                RenderError::Timeout {
                    url: url.to_string(),
                    after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }
            } else {
                RenderError::Http(err)
            }
        };

        match &self.mode {
            FetchMode::Direct => {
                let response = self
                    .client
                    .get(url.clone())
                    .timeout(timeout)
                    .send()
                    .await
                    .map_err(as_render_error)?;
                let status = response.status();
                if !status.is_success() {
                    return Err(RenderError::Status {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }
                let final_url = response.url().clone();
                let body = response.text().await.map_err(as_render_error)?;
                Ok((final_url, body))
            }
            FetchMode::Browserless { base_url, token } => {
                let endpoint = FetchMode::endpoint(base_url, "/content", token.as_deref())?;
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                let payload = serde_json::json!({
                    "url": url.as_str(),
                    "gotoOptions": {
                        "waitUntil": wait.as_puppeteer(),
                        "timeout": timeout_ms,
                    },
                });
                let response = self
                    .client
                    .post(endpoint)
                    .timeout(timeout)
                    .json(&payload)
                    .send()
                    .await
                    .map_err(as_render_error)?;
                let status = response.status();
                if !status.is_success() {
                    let message = response.text().await.unwrap_or_default();
                    return Err(RenderError::Browserless {
                        status: status.as_u16(),
                        message,
                    });
                }
                let body = response.text().await.map_err(as_render_error)?;
                Ok((url.clone(), body))
            }
        }
    }

    fn resolve(&self, target: &str) -> Result<Url, RenderError> {
        let parsed = match &self.page {
            Some(page) => page.url.join(target),
            None => Url::parse(target),
        };
        parsed.map_err(|e| RenderError::InvalidUrl {
            url: target.to_owned(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Scope for HtmlSession {
    type Element = HtmlElement;

    async fn query_all(&self, selector: &str) -> Result<Vec<HtmlElement>, RenderError> {
        let page = self.page.as_ref().ok_or(RenderError::NoPage)?;
        select_in_document(&page.html, selector)
    }
}

#[async_trait]
impl Session for HtmlSession {
    async fn goto(
        &mut self,
        url: &str,
        wait: WaitPolicy,
        timeout: Duration,
    ) -> Result<(), RenderError> {
        let target = self.resolve(url)?;
        let (final_url, html) = self.fetch(&target, wait, timeout).await?;
        tracing::debug!(url = %final_url, bytes = html.len(), "page loaded");
        self.page = Some(LoadedPage {
            url: final_url,
            html,
        });
        Ok(())
    }

    async fn wait_for_idle(&mut self, _timeout: Duration) -> Result<(), RenderError> {
        // A fetched snapshot is already settled.
        if self.page.is_some() {
            Ok(())
        } else {
            Err(RenderError::NoPage)
        }
    }

    /// Follows the element's `href`; a snapshot has no other click behavior.
    async fn click(&mut self, element: &HtmlElement) -> Result<(), RenderError> {
        let href = element
            .href()
            .map(str::trim)
            .filter(|h| !h.is_empty() && !h.starts_with('#') && !h.starts_with("javascript:"))
            .ok_or_else(|| RenderError::NotClickable {
                reason: "element has no navigable href".to_owned(),
            })?
            .to_owned();
        let target = self.resolve(&href)?;
        let timeout = self.default_timeout;
        self.goto(target.as_str(), WaitPolicy::NetworkIdle, timeout)
            .await
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, RenderError> {
        tracing::debug!(script, "script evaluation is not supported by the HTML renderer");
        Ok(serde_json::Value::Null)
    }

    fn current_url(&self) -> Option<String> {
        self.page.as_ref().map(|p| p.url.to_string())
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        self.page = None;
        Ok(())
    }
}

/// An owned snapshot of one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlElement {
    tag: String,
    outer_html: String,
    text: String,
    attributes: BTreeMap<String, String>,
}

impl HtmlElement {
    fn snapshot(element: ElementRef<'_>) -> Self {
        let text = element
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let attributes = element
            .value()
            .attrs()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Self {
            tag: element.value().name().to_owned(),
            outer_html: element.html(),
            text,
            attributes,
        }
    }

    #[must_use]
    pub fn href(&self) -> Option<&str> {
        self.attributes.get("href").map(String::as_str)
    }
}

#[async_trait]
impl Element for HtmlElement {
    async fn text(&self) -> Result<String, RenderError> {
        Ok(self.text.clone())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, RenderError> {
        Ok(self.attributes.get(name).cloned())
    }

    async fn select(&self, selector: &str) -> Result<Vec<HtmlElement>, RenderError> {
        select_within(self, selector)
    }
}

fn parse_selector(selector: &str) -> Result<Selector, RenderError> {
    Selector::parse(selector).map_err(|e| RenderError::InvalidSelector {
        selector: selector.to_owned(),
        reason: e.to_string(),
    })
}

fn select_in_document(html: &str, selector: &str) -> Result<Vec<HtmlElement>, RenderError> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);
    Ok(document.select(&selector).map(HtmlElement::snapshot).collect())
}

/// Wrappers that put table parts back in a context where the HTML parser
/// keeps them; a bare `<tr>` or `<td>` is dropped from a body fragment.
fn table_context(tag: &str) -> Option<(&'static str, &'static str)> {
    match tag {
        "tr" => Some(("<table><tbody>", "</tbody></table>")),
        "td" | "th" => Some(("<table><tbody><tr>", "</tr></tbody></table>")),
        "thead" | "tbody" | "tfoot" | "caption" | "colgroup" => Some(("<table>", "</table>")),
        "col" => Some(("<table><colgroup>", "</colgroup></table>")),
        _ => None,
    }
}

/// Matches descendants of `element`, never the element itself.
fn select_within(element: &HtmlElement, selector: &str) -> Result<Vec<HtmlElement>, RenderError> {
    let selector = parse_selector(selector)?;
    let fragment = match table_context(&element.tag) {
        Some((open, close)) => {
            Html::parse_fragment(&format!("{open}{}{close}", element.outer_html))
        }
        None => Html::parse_fragment(&element.outer_html),
    };
    // The wrappers never reuse the element's own tag ahead of it, so the
    // first element with that tag in document order is the element.
    let Some(root) = fragment
        .root_element()
        .children()
        .flat_map(|child| child.descendants())
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == element.tag)
    else {
        return Ok(Vec::new());
    };
    Ok(root.select(&selector).map(HtmlElement::snapshot).collect())
}
