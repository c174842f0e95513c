//! Core windowed rate limiter.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::counter::{Admission, TimeWindow, WindowCounter, WindowPolicy};
use crate::config::LimiterConfig;
use crate::error::LimiterError;

/// Result of a graceful shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every suspended caller left the limiter within the grace period.
    Drained,
    /// The grace period elapsed with callers still inside `acquire`.
    GraceExpired { pending: usize },
}

/// Admits at most `limit` callers per window, suspending the rest.
///
/// The limiter is thread-safe and meant to be shared behind an `Arc`. The
/// `(used, window_start)` pair lives in a single `WindowCounter` behind one
/// lock which is never held across an `.await`. Suspended callers line up on
/// a FIFO queue: only the head of the line sleeps until the window rolls
/// over, so a waiter is admitted within a bounded number of rollovers.
pub struct WindowedLimiter {
    limit: u32,
    window: Duration,
    policy: WindowPolicy,
    /// Capacity accounting for the current window
    counter: Mutex<WindowCounter>,
    /// Line of callers waiting for capacity
    queue: tokio::sync::Mutex<()>,
    /// Flips to `true` exactly once, on shutdown
    shutdown: watch::Sender<bool>,
    /// Callers currently inside `acquire`
    waiting: AtomicUsize,
    /// Signalled when `waiting` drops to zero
    drained: Notify,
}

impl std::fmt::Debug for WindowedLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowedLimiter")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .field("policy", &self.policy)
            .field("waiting", &self.waiting())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl WindowedLimiter {
    /// Create a fixed-window limiter admitting `limit` callers per `window`.
    ///
    /// # Errors
    ///
    /// Returns `LimiterError::InvalidConfig` if `limit` or `window` is zero.
    pub fn new(limit: u32, window: Duration) -> Result<Self, LimiterError> {
        Self::with_policy(limit, window, WindowPolicy::Fixed)
    }

    /// Create a limiter admitting `limit` callers per preset time window.
    pub fn per(limit: u32, unit: TimeWindow) -> Result<Self, LimiterError> {
        Self::new(limit, unit.duration())
    }

    /// Create a limiter with an explicit window policy.
    pub fn with_policy(
        limit: u32,
        window: Duration,
        policy: WindowPolicy,
    ) -> Result<Self, LimiterError> {
        if limit == 0 {
            return Err(LimiterError::InvalidConfig(
                "request limit must be positive".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(LimiterError::InvalidConfig(
                "window duration must be positive".to_string(),
            ));
        }

        info!(
            limit = limit,
            window_ms = window.as_millis() as u64,
            policy = ?policy,
            "Creating windowed rate limiter"
        );

        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            limit,
            window,
            policy,
            counter: Mutex::new(WindowCounter::new(limit, window, policy, Instant::now())),
            queue: tokio::sync::Mutex::new(()),
            shutdown,
            waiting: AtomicUsize::new(0),
            drained: Notify::new(),
        })
    }

    /// Create a limiter from its configuration section.
    pub fn from_config(config: &LimiterConfig) -> Result<Self, LimiterError> {
        Self::with_policy(config.request_limit, config.window(), config.policy)
    }

    /// Wait until a unit of capacity is available and consume it.
    ///
    /// Dropping the returned future before it completes never consumes
    /// capacity.
    pub async fn acquire(&self) -> Result<(), LimiterError> {
        self.acquire_with(std::future::pending::<()>(), LimiterError::Cancelled)
            .await
    }

    /// Like [`acquire`](Self::acquire), giving up after `deadline`.
    pub async fn acquire_timeout(&self, deadline: Duration) -> Result<(), LimiterError> {
        self.acquire_with(tokio::time::sleep(deadline), LimiterError::Timeout(deadline))
            .await
    }

    /// Like [`acquire`](Self::acquire), giving up when `signal` resolves.
    pub async fn acquire_until<F>(&self, signal: F) -> Result<(), LimiterError>
    where
        F: Future<Output = ()>,
    {
        self.acquire_with(signal, LimiterError::Cancelled).await
    }

    /// Consume a unit of capacity if one is available right now.
    ///
    /// Returns `false` when the window is saturated, the limiter is shut down,
    /// or other callers are already waiting in line.
    pub fn try_acquire(&self) -> bool {
        if self.is_shut_down() {
            return false;
        }
        let Ok(_turn) = self.queue.try_lock() else {
            return false;
        };

        let admission = self.counter.lock().try_admit(Instant::now());
        trace!(admission = ?admission, "Non-blocking acquire");
        admission == Admission::Admitted
    }

    /// Release every suspended caller with `LimiterError::Shutdown` and
    /// reject all later calls. Idempotent.
    pub fn shutdown(&self) {
        if !self.shutdown.send_replace(true) {
            info!(waiting = self.waiting(), "Shutting down rate limiter");
        }
    }

    /// Shut down and wait up to `grace` for suspended callers to leave.
    pub async fn shutdown_with_grace(&self, grace: Duration) -> ShutdownOutcome {
        self.shutdown();

        let drained = async {
            loop {
                let notified = self.drained.notified();
                if self.waiting() == 0 {
                    return;
                }
                notified.await;
            }
        };

        match tokio::time::timeout(grace, drained).await {
            Ok(()) => {
                debug!("All waiters released");
                ShutdownOutcome::Drained
            }
            Err(_) => {
                let pending = self.waiting();
                warn!(
                    pending = pending,
                    grace_ms = grace.as_millis() as u64,
                    "Grace period expired with callers still waiting"
                );
                ShutdownOutcome::GraceExpired { pending }
            }
        }
    }

    /// Whether `shutdown` has been called.
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    /// Admissions counted against the current window.
    pub fn used(&self) -> u32 {
        self.counter.lock().used(Instant::now())
    }

    /// Capacity left in the current window.
    pub fn remaining(&self) -> u32 {
        self.counter.lock().remaining(Instant::now())
    }

    /// Time until capacity frees up; zero while capacity is available.
    pub fn time_until_reset(&self) -> Duration {
        let now = Instant::now();
        let mut counter = self.counter.lock();
        if counter.remaining(now) > 0 {
            Duration::ZERO
        } else {
            counter.time_until_reset(now)
        }
    }

    /// Number of callers currently inside `acquire`.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Acquire)
    }

    /// Shared body of the acquire variants.
    ///
    /// Capacity is consumed only by `wait_for_capacity`, in the same poll that
    /// completes it, so losing the race to `signal` or to shutdown leaves the
    /// counter untouched.
    async fn acquire_with<F>(&self, signal: F, on_signal: LimiterError) -> Result<(), LimiterError>
    where
        F: Future<Output = ()>,
    {
        let mut closed = self.shutdown.subscribe();
        if self.is_shut_down() {
            return Err(LimiterError::Shutdown);
        }

        let _waiter = WaiterGuard::enter(self);

        tokio::select! {
            biased;
            _ = async { let _ = closed.wait_for(|shut| *shut).await; } => {
                debug!("Acquire released by shutdown");
                Err(LimiterError::Shutdown)
            }
            _ = signal => {
                debug!(reason = %on_signal, "Acquire abandoned");
                Err(on_signal)
            }
            _ = self.wait_for_capacity() => Ok(()),
        }
    }

    async fn wait_for_capacity(&self) {
        let _turn = self.queue.lock().await;

        loop {
            let admission = self.counter.lock().try_admit(Instant::now());
            match admission {
                Admission::Admitted => {
                    trace!(limit = self.limit, "Admitted");
                    return;
                }
                Admission::Saturated { retry_after } => {
                    debug!(
                        retry_after_ms = retry_after.as_millis() as u64,
                        "Window saturated, waiting for capacity"
                    );
                    // Waking up only means the window may have rolled over;
                    // the next iteration re-validates.
                    tokio::time::sleep(retry_after).await;
                }
            }
        }
    }
}

/// Tracks one caller inside `acquire` for graceful shutdown.
struct WaiterGuard<'a> {
    limiter: &'a WindowedLimiter,
}

impl<'a> WaiterGuard<'a> {
    fn enter(limiter: &'a WindowedLimiter) -> Self {
        limiter.waiting.fetch_add(1, Ordering::AcqRel);
        Self { limiter }
    }
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        if self.limiter.waiting.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.limiter.drained.notify_waiters();
        }
    }
}
