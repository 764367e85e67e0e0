//! Retrying navigation.
//!
//! Every page transition (opening a URL, clicking a pagination control or a
//! gallery opener) goes through the same small state machine:
//!
//! ```text
//! Idle -> Attempting(1) -> Succeeded
//!                       -> Retrying(n) -> Attempting(n + 1) -> ...
//!                       -> Failed
//! ```
//!
//! Each attempt is bounded by a hard timeout covering both the transition and
//! the subsequent network-idle wait. Between attempts the navigator sleeps
//! `base_delay * attempt`. Exhausting the attempts is not an error: callers
//! get `false` and decide whether to skip the page.

use std::time::Duration;

use crate::cancel::CancelToken;
use crate::error::RenderError;
use crate::renderer::{Session, WaitPolicy};

/// Retry budget for one navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first; `max_retries = 3` means at most
    /// four attempts.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub hard_timeout: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration, hard_timeout: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            hard_timeout,
        }
    }

    /// Sleep before the attempt following failed attempt number `attempt`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Idle,
    Attempting { attempt: u32 },
    Retrying { attempt: u32 },
    Succeeded { attempts: u32 },
    Failed { attempts: u32 },
}

enum Transition<'a, E> {
    Goto(&'a str),
    Click(&'a E),
}

impl<E> Transition<'_, E> {
    fn describe(&self, session_url: Option<String>) -> String {
        match self {
            Transition::Goto(url) => (*url).to_owned(),
            Transition::Click(_) => session_url.map_or_else(
                || "click".to_owned(),
                |url| format!("click on {url}"),
            ),
        }
    }
}

async fn attempt_once<S: Session>(
    session: &mut S,
    transition: &Transition<'_, S::Element>,
    policy: &RetryPolicy,
    target: &str,
) -> Result<(), RenderError> {
    let limit = policy.hard_timeout;
    let work = async {
        match transition {
            Transition::Goto(url) => session.goto(url, WaitPolicy::NetworkIdle, limit).await?,
            Transition::Click(element) => session.click(element).await?,
        }
        session.wait_for_idle(limit).await
    };
    match tokio::time::timeout(limit, work).await {
        Ok(result) => result,
        Err(_) => Err(RenderError::Timeout {
            url: target.to_owned(),
            after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

async fn drive<S: Session>(
    session: &mut S,
    transition: Transition<'_, S::Element>,
    policy: &RetryPolicy,
) -> NavState {
    let target = transition.describe(session.current_url());
    let mut state = NavState::Idle;
    loop {
        state = match state {
            NavState::Idle => NavState::Attempting { attempt: 1 },
            NavState::Attempting { attempt } => {
                match attempt_once(session, &transition, policy, &target).await {
                    Ok(()) => NavState::Succeeded { attempts: attempt },
                    Err(err) if err.is_transient() && attempt <= policy.max_retries => {
                        tracing::warn!(
                            target_url = %target,
                            attempt,
                            max_retries = policy.max_retries,
                            error = %err,
                            "navigation attempt failed; retrying"
                        );
                        NavState::Retrying { attempt }
                    }
                    Err(err) => {
                        tracing::warn!(
                            target_url = %target,
                            attempt,
                            error = %err,
                            "navigation failed; giving up"
                        );
                        NavState::Failed { attempts: attempt }
                    }
                }
            }
            NavState::Retrying { attempt } => {
                tokio::time::sleep(policy.backoff(attempt)).await;
                NavState::Attempting {
                    attempt: attempt + 1,
                }
            }
            done @ (NavState::Succeeded { .. } | NavState::Failed { .. }) => return done,
        };
    }
}

/// Opens `url` in `session`, retrying transient failures.
///
/// Returns `true` once the page has loaded and settled.
pub async fn navigate<S: Session>(session: &mut S, url: &str, policy: &RetryPolicy) -> bool {
    matches!(
        drive(session, Transition::Goto(url), policy).await,
        NavState::Succeeded { .. }
    )
}

/// Clicks `element` and waits for the resulting page to settle, with the same
/// retry behaviour as [`navigate`].
pub async fn click_through<S: Session>(
    session: &mut S,
    element: &S::Element,
    policy: &RetryPolicy,
) -> bool {
    matches!(
        drive(session, Transition::Click(element), policy).await,
        NavState::Succeeded { .. }
    )
}

/// Outcome of a paced navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Succeeded,
    Failed,
    Cancelled,
}

/// Spaces consecutive navigations of one session by a fixed delay and makes
/// each of them cancellable.
#[derive(Debug)]
pub struct Pacer {
    request_delay: Duration,
    retry: RetryPolicy,
    navigations: u32,
}

impl Pacer {
    #[must_use]
    pub fn new(request_delay: Duration, retry: RetryPolicy) -> Self {
        Self {
            request_delay,
            retry,
            navigations: 0,
        }
    }

    async fn take_turn(&mut self, cancel: &mut CancelToken) -> bool {
        if self.navigations > 0 && !cancel.sleep(self.request_delay).await {
            return false;
        }
        if cancel.is_cancelled() {
            return false;
        }
        self.navigations += 1;
        true
    }

    pub async fn navigate<S: Session>(
        &mut self,
        session: &mut S,
        url: &str,
        cancel: &mut CancelToken,
    ) -> Navigation {
        if !self.take_turn(cancel).await {
            return Navigation::Cancelled;
        }
        match cancel.guard(navigate(session, url, &self.retry)).await {
            None => Navigation::Cancelled,
            Some(true) => Navigation::Succeeded,
            Some(false) => Navigation::Failed,
        }
    }

    pub async fn click_through<S: Session>(
        &mut self,
        session: &mut S,
        element: &S::Element,
        cancel: &mut CancelToken,
    ) -> Navigation {
        if !self.take_turn(cancel).await {
            return Navigation::Cancelled;
        }
        match cancel
            .guard(click_through(session, element, &self.retry))
            .await
        {
            None => Navigation::Cancelled,
            Some(true) => Navigation::Succeeded,
            Some(false) => Navigation::Failed,
        }
    }
}

#[cfg(test)]
#[path = "navigator_test.rs"]
mod tests;
