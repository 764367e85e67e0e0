use std::time::{Duration, Instant};

use super::*;
use crate::cancel::cancel_pair;
use crate::testing::{entries, FakeElement, FakePage, FakeSession};

const URL: &str = "https://hotels.test/list";

fn policy(max_retries: u32, base_ms: u64) -> RetryPolicy {
    RetryPolicy::new(
        max_retries,
        Duration::from_millis(base_ms),
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn succeeds_first_try_without_sleeping() {
    let mut session = FakeSession::new().page(URL, FakePage::new());
    let journal = session.journal();
    assert!(navigate(&mut session, URL, &policy(3, 500)).await);
    assert_eq!(entries(&journal, "goto").len(), 1);
}

#[tokio::test]
async fn retries_twice_then_succeeds_with_linear_backoff() {
    let mut session = FakeSession::new()
        .page(URL, FakePage::new())
        .fail_goto(URL, 2);
    let journal = session.journal();

    let started = Instant::now();
    let ok = navigate(&mut session, URL, &policy(3, 40)).await;
    let elapsed = started.elapsed();

    assert!(ok);
    assert_eq!(entries(&journal, "goto").len(), 3);
    // 40ms after the first failure, 80ms after the second.
    assert!(
        elapsed >= Duration::from_millis(120),
        "expected at least 120ms of backoff, got {elapsed:?}"
    );
    assert_eq!(session.current_url().as_deref(), Some(URL));
}

#[tokio::test]
async fn gives_up_after_max_retries_plus_one_attempts() {
    let mut session = FakeSession::new()
        .page(URL, FakePage::new())
        .fail_goto(URL, 10);
    let journal = session.journal();

    assert!(!navigate(&mut session, URL, &policy(2, 1)).await);
    assert_eq!(entries(&journal, "goto").len(), 3);
}

#[tokio::test]
async fn zero_retries_means_single_attempt() {
    let mut session = FakeSession::new();
    let journal = session.journal();
    assert!(!navigate(&mut session, URL, &policy(0, 1)).await);
    assert_eq!(entries(&journal, "goto").len(), 1);
}

#[tokio::test]
async fn stalled_navigation_hits_hard_timeout() {
    let mut session = FakeSession::new()
        .page(URL, FakePage::new())
        .stall(URL, Duration::from_secs(30));
    let policy = RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(30));

    let started = Instant::now();
    assert!(!navigate(&mut session, URL, &policy).await);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn click_through_follows_control() {
    let next = "https://hotels.test/list?page=2";
    let mut session = FakeSession::new()
        .page(URL, FakePage::new())
        .page(next, FakePage::new());
    assert!(navigate(&mut session, URL, &policy(1, 1)).await);

    let control = FakeElement::text("Next").attr("href", next);
    assert!(click_through(&mut session, &control, &policy(1, 1)).await);
    assert_eq!(session.current_url().as_deref(), Some(next));
}

#[tokio::test]
async fn unclickable_control_is_not_retried() {
    let mut session = FakeSession::new().page(URL, FakePage::new());
    let journal = session.journal();
    assert!(navigate(&mut session, URL, &policy(3, 1)).await);

    assert!(!click_through(&mut session, &FakeElement::text("Next"), &policy(3, 1)).await);
    assert!(entries(&journal, "click").is_empty());
}

#[test]
fn backoff_is_linear_in_attempt() {
    let p = policy(3, 100);
    assert_eq!(p.backoff(1), Duration::from_millis(100));
    assert_eq!(p.backoff(3), Duration::from_millis(300));
}

#[tokio::test]
async fn pacer_spaces_consecutive_navigations() {
    let second = "https://hotels.test/two";
    let mut session = FakeSession::new()
        .page(URL, FakePage::new())
        .page(second, FakePage::new());
    let mut pacer = Pacer::new(Duration::from_millis(50), policy(0, 1));
    let mut cancel = CancelToken::never();

    let started = Instant::now();
    assert_eq!(
        pacer.navigate(&mut session, URL, &mut cancel).await,
        Navigation::Succeeded
    );
    assert!(started.elapsed() < Duration::from_millis(50));
    assert_eq!(
        pacer.navigate(&mut session, second, &mut cancel).await,
        Navigation::Succeeded
    );
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn pacer_reports_cancellation() {
    let mut session = FakeSession::new().page(URL, FakePage::new());
    let journal = session.journal();
    let (handle, mut cancel) = cancel_pair();
    handle.cancel();

    let mut pacer = Pacer::new(Duration::ZERO, policy(0, 1));
    assert_eq!(
        pacer.navigate(&mut session, URL, &mut cancel).await,
        Navigation::Cancelled
    );
    assert!(entries(&journal, "goto").is_empty());
}
