//! # Drive a single bean computation to its final state.
//!
//! ```text
//! select (biased) {
//!     computation ─► Ok(())              → Succeeded
//!                 ─► Err(Canceled)       → Cancelled
//!                 ─► Err(Fail)           → Failed(message)
//!                 ─► panic (caught)      → Failed("panicked: ..")
//!     cancel token fired                 → Cancelled   (computation dropped)
//! }
//! ```
//!
//! ## Rules
//! - The computation is polled **before** the cancel token, so a computation that is
//!   ready when cancellation arrives still counts as a natural completion.
//! - Cancellation drops the computation at its current await point.
//! - Panics never escape; they become `Failed`.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::beans::{BeanFuture, BeanState};
use crate::error::{BeanError, panic_message};

/// Runs `fut` until it completes or `cancel` fires, and classifies the outcome.
pub(crate) async fn run_bean(fut: BeanFuture, cancel: &CancellationToken) -> BeanState {
    let guarded = AssertUnwindSafe(fut).catch_unwind();

    tokio::select! {
        biased;
        res = guarded => match res {
            Ok(Ok(())) => BeanState::Succeeded,
            Ok(Err(BeanError::Canceled)) => BeanState::Cancelled,
            Ok(Err(e)) => BeanState::Failed(e.to_string().into()),
            Err(panic) => BeanState::Failed(format!("panicked: {}", panic_message(panic)).into()),
        },
        _ = cancel.cancelled() => BeanState::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::{self, FutureExt};
    use std::time::Duration;

    #[tokio::test]
    async fn test_success() {
        let token = CancellationToken::new();
        let state = run_bean(async { Ok(()) }.boxed(), &token).await;
        assert_eq!(state, BeanState::Succeeded);
    }

    #[tokio::test]
    async fn test_failure_carries_message() {
        let token = CancellationToken::new();
        let state = run_bean(async { Err(BeanError::fail("boom")) }.boxed(), &token).await;
        assert_eq!(state, BeanState::Failed("execution failed: boom".into()));
    }

    #[tokio::test]
    async fn test_panic_is_caught() {
        let token = CancellationToken::new();
        let fut = async {
            if true {
                panic!("bad bean");
            }
            Ok(())
        };
        let state = run_bean(fut.boxed(), &token).await;
        assert_eq!(state, BeanState::Failed("panicked: bad bean".into()));
    }

    #[tokio::test]
    async fn test_reported_cancel_is_cancelled() {
        let token = CancellationToken::new();
        let state = run_bean(async { Err(BeanError::Canceled) }.boxed(), &token).await;
        assert_eq!(state, BeanState::Cancelled);
    }

    #[tokio::test]
    async fn test_token_cancels_endless_computation() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            canceller.cancel();
        });
        let state = run_bean(future::pending().boxed(), &token).await;
        assert_eq!(state, BeanState::Cancelled);
    }

    #[tokio::test]
    async fn test_ready_computation_wins_over_cancel() {
        let token = CancellationToken::new();
        token.cancel();
        let state = run_bean(async { Ok(()) }.boxed(), &token).await;
        assert_eq!(state, BeanState::Succeeded);
    }
}
