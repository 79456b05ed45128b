//! Fault containment for hook and handler invocations.
//!
//! Both a timeout and a panic turn into an ordinary `Err`, so one bad
//! message can never take down its subscription loop.

use futures::FutureExt;
use hookline_core::BoxError;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

/// Error returned when a hook or handler runs past its time limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("execution timed out after {0:?}")]
pub struct TimeoutError(pub Duration);

/// Error returned when a hook or handler panics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("panicked: {0}")]
pub struct PanicError(pub String);

impl PanicError {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Self(message)
    }
}

/// Await `fut`, failing with [`TimeoutError`] once `limit` elapses.
///
/// `None` waits forever.
pub async fn bounded<F, T>(limit: Option<Duration>, fut: F) -> Result<T, BoxError>
where
    F: Future<Output = Result<T, BoxError>>,
{
    match limit {
        Some(limit) => match timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(TimeoutError(limit).into()),
        },
        None => fut.await,
    }
}

/// Like [`bounded`], and a panic inside `fut` becomes a [`PanicError`].
pub async fn guarded<F, T>(limit: Option<Duration>, fut: F) -> Result<T, BoxError>
where
    F: Future<Output = Result<T, BoxError>>,
{
    let caught = async {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(PanicError::from_payload(payload).into()),
        }
    };
    bounded(limit, caught).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unbounded_waits() {
        let value = bounded(None, async { Ok::<_, BoxError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = bounded(Some(Duration::from_millis(5)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, BoxError>(())
        })
        .await
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<TimeoutError>(),
            Some(&TimeoutError(Duration::from_millis(5)))
        );
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let err = guarded(None, async {
            if true {
                panic!("handler blew up");
            }
            Ok::<_, BoxError>(())
        })
        .await
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PanicError>(),
            Some(&PanicError("handler blew up".into()))
        );
    }
}
