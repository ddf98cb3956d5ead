// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Outcome of [`repeat_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// `target` became false before the deadline elapsed.
    Reached,
    /// The deadline elapsed (or the loop was cancelled) while `target` was
    /// still true.
    TimedOut,
}

/// Repeatedly calls `attempt` while `target` holds, sleeping `retry_interval`
/// between attempts, until either `target` returns false or `deadline`
/// elapses since the call began. Cancellation aborts immediately with
/// [`RetryOutcome::TimedOut`].
///
/// This backs every target-driven action loop (wake/shutdown/reboot):
/// `target` is `should_<action>`, `attempt` is the class-specific action,
/// `deadline` is `timeouts[action]` (900s default).
pub async fn repeat_until<P, A, Fut>(
    mut target: P,
    mut attempt: A,
    retry_interval: Duration,
    deadline: Duration,
    cancel: &CancellationToken,
) -> RetryOutcome
where
    P: FnMut() -> bool,
    A: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let start = Instant::now();

    while target() {
        if start.elapsed() >= deadline {
            return RetryOutcome::TimedOut;
        }

        tokio::select! {
            _ = cancel.cancelled() => return RetryOutcome::TimedOut,
            _ = attempt() => {}
        }

        if !target() {
            break;
        }

        if start.elapsed() >= deadline {
            return RetryOutcome::TimedOut;
        }

        tokio::select! {
            _ = cancel.cancelled() => return RetryOutcome::TimedOut,
            _ = tokio::time::sleep(retry_interval) => {}
        }
    }

    RetryOutcome::Reached
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
