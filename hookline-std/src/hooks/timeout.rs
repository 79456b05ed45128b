//! Timeout hook for time-limited execution.

use crate::guard::bounded;
use hookline_core::{BoxError, Context, Hook, HookOutcome};
use std::time::Duration;

pub use crate::guard::TimeoutError;

/// A hook that wraps another hook with a timeout.
///
/// Running out of time is a fault, not a block. Use this to bound a single
/// hook; `DispatchConfig::hook_timeout_ms` bounds every hook.
pub struct TimeoutHook<H> {
    inner: H,
    duration: Duration,
}

impl<H> TimeoutHook<H> {
    /// Create a new timeout hook.
    pub fn new(inner: H, duration: Duration) -> Self {
        Self { inner, duration }
    }

    /// Create a `TimeoutHook` with the timeout specified in milliseconds.
    pub fn millis(inner: H, millis: u64) -> Self {
        Self::new(inner, Duration::from_millis(millis))
    }

    /// Get the configured timeout duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl<H: Hook> Hook for TimeoutHook<H> {
    async fn check(&self, ctx: Context) -> Result<HookOutcome, BoxError> {
        bounded(Some(self.duration), self.inner.check(ctx)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::detached_context;

    #[tokio::test]
    async fn test_fast_hook_passes_through() {
        let hook = TimeoutHook::millis(|_ctx: Context| async { true }, 100);
        let outcome = hook.check(detached_context("a", b"{}")).await.unwrap();
        assert_eq!(outcome, HookOutcome::Pass);
        assert_eq!(hook.duration(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_slow_hook_faults() {
        let slow = |_ctx: Context| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            true
        };
        let hook = TimeoutHook::millis(slow, 10);
        let err = hook.check(detached_context("a", b"{}")).await.unwrap_err();
        assert!(err.downcast_ref::<TimeoutError>().is_some());
    }
}
