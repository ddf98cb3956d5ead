use super::*;
use std::sync::atomic::{AtomicU32, Ordering};

#[tokio::test]
async fn reaches_target_after_a_few_attempts() {
    let attempts = AtomicU32::new(0);
    let cancel = CancellationToken::new();

    let outcome = repeat_until(
        || attempts.load(Ordering::SeqCst) < 3,
        || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {}
        },
        Duration::from_millis(1),
        Duration::from_secs(5),
        &cancel,
    )
    .await;

    assert_eq!(outcome, RetryOutcome::Reached);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn times_out_when_target_never_satisfied() {
    let cancel = CancellationToken::new();
    let outcome = repeat_until(
        || true,
        || async {},
        Duration::from_millis(1),
        Duration::from_millis(20),
        &cancel,
    )
    .await;

    assert_eq!(outcome, RetryOutcome::TimedOut);
}

#[tokio::test]
async fn cancellation_aborts_immediately() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = repeat_until(
        || true,
        || async {},
        Duration::from_secs(60),
        Duration::from_secs(60),
        &cancel,
    )
    .await;

    assert_eq!(outcome, RetryOutcome::TimedOut);
}

#[tokio::test]
async fn already_satisfied_target_never_attempts() {
    let attempts = AtomicU32::new(0);
    let cancel = CancellationToken::new();
    let outcome = repeat_until(
        || false,
        || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {}
        },
        Duration::from_millis(1),
        Duration::from_secs(5),
        &cancel,
    )
    .await;

    assert_eq!(outcome, RetryOutcome::Reached);
    assert_eq!(attempts.load(Ordering::SeqCst), 0);
}
