//! Cooperative cancellation for source tasks.
//!
//! A [`CancelHandle`] flips a `watch` flag; every [`CancelToken`] observing it
//! sees the change at its next suspension point. Cancelled tasks stop starting
//! new work and return what they have already collected.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

/// Sender half. Dropping it without cancelling leaves tokens live forever.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

/// Receiver half, cheap to clone into every task.
#[derive(Debug, Clone)]
pub struct CancelToken(watch::Receiver<bool>);

#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelToken(rx))
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    #[must_use]
    pub fn token(&self) -> CancelToken {
        CancelToken(self.0.subscribe())
    }
}

impl CancelToken {
    /// A token that is never cancelled.
    #[must_use]
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancellation is signalled. Pends forever if the handle
    /// was dropped without cancelling.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Runs `fut` unless cancellation arrives first, in which case `fut` is
    /// dropped and `None` is returned.
    pub async fn guard<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        if self.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.cancelled() => None,
            out = fut => Some(out),
        }
    }

    /// Sleeps for `delay`; returns `false` if cancelled meanwhile.
    pub async fn sleep(&mut self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.is_cancelled();
        }
        self.guard(tokio::time::sleep(delay)).await.is_some()
    }

    /// Derives a token that is also cancelled once `deadline` elapses.
    ///
    /// The timer task ends as soon as every clone of the derived token is
    /// dropped, so an early-finishing task does not leave it running.
    #[must_use]
    pub fn with_deadline(&self, deadline: Option<Duration>) -> CancelToken {
        let Some(deadline) = deadline else {
            return self.clone();
        };
        let (handle, child) = cancel_pair();
        let mut parent = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = parent.cancelled() => {}
                () = tokio::time::sleep(deadline) => {
                    tracing::warn!(deadline_secs = deadline.as_secs_f64(), "task deadline reached; cancelling");
                }
                () = handle.0.closed() => return,
            }
            handle.cancel();
        });
        child
    }
}
