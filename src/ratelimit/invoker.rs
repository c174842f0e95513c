//! Rate-limited execution of arbitrary operations.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::LimiterError;

use super::limiter::WindowedLimiter;

/// Runs operations behind a [`WindowedLimiter`].
///
/// Each call consumes one unit of capacity before the operation starts. The
/// operation's own result is returned untouched: a failed operation still
/// counts as an attempt, and nothing is retried here.
#[derive(Debug, Clone)]
pub struct LimitedInvoker {
    limiter: Arc<WindowedLimiter>,
}

impl LimitedInvoker {
    /// Create an invoker sharing the given limiter.
    pub fn new(limiter: Arc<WindowedLimiter>) -> Self {
        Self { limiter }
    }

    /// The limiter guarding this invoker.
    pub fn limiter(&self) -> &Arc<WindowedLimiter> {
        &self.limiter
    }

    /// Wait for capacity, then run `operation` exactly once.
    ///
    /// Limiter errors are converted into the operation's error type and the
    /// operation is not started.
    pub async fn invoke<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LimiterError>,
    {
        self.limiter.acquire().await?;
        operation().await
    }

    /// Like [`invoke`](Self::invoke), giving up on capacity after `deadline`.
    pub async fn invoke_timeout<F, Fut, T, E>(&self, deadline: Duration, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LimiterError>,
    {
        self.limiter.acquire_timeout(deadline).await?;
        operation().await
    }

    /// Like [`invoke`](Self::invoke), giving up on capacity when `signal` resolves.
    pub async fn invoke_until<S, F, Fut, T, E>(&self, signal: S, operation: F) -> Result<T, E>
    where
        S: Future<Output = ()>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LimiterError>,
    {
        self.limiter.acquire_until(signal).await?;
        operation().await
    }
}
