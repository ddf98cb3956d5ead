// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Runs `body` repeatedly, sleeping `interval - elapsed` between calls and
/// logging an overrun warning when `body` itself took longer than
/// `interval`. Used by the manager's top-level device update tick
/// (`interval = 125ms`).
pub async fn run_timed_loop<F, Fut>(interval: Duration, cancel: CancellationToken, mut body: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        if cancel.is_cancelled() {
            return;
        }

        let start = Instant::now();
        body().await;
        let elapsed = start.elapsed();

        match interval.checked_sub(elapsed) {
            Some(remaining) => {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(remaining) => {}
                }
            }
            None => {
                warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    interval_ms = interval.as_millis() as u64,
                    "timed loop overran its interval"
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "timed_tests.rs"]
mod timed_tests;
