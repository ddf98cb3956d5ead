use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn stops_promptly_when_cancelled() {
    let cancel = CancellationToken::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    let cancel_clone = cancel.clone();

    let handle = tokio::spawn(async move {
        run_timed_loop(Duration::from_millis(5), cancel_clone, || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();

    assert!(calls.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn runs_body_at_least_once_before_first_sleep() {
    let cancel = CancellationToken::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    let cancel_clone = cancel.clone();

    cancel.cancel();
    run_timed_loop(Duration::from_secs(60), cancel_clone, || {
        let calls = calls_clone.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
        }
    })
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 0, "pre-cancelled loop must not run body at all");
}
