//! Window accounting for the rate limiter.
//!
//! `WindowCounter` is the bare state machine: it is not thread-safe and never
//! reads the clock itself. Callers pass the current instant, which keeps the
//! admission rules testable without sleeping.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Preset time windows for "N requests per unit" limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    /// Per-second rate limiting
    Second,
    /// Per-minute rate limiting
    Minute,
    /// Per-hour rate limiting
    Hour,
    /// Per-day rate limiting
    Day,
}

impl TimeWindow {
    /// Get the duration of this time window.
    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::Second => Duration::from_secs(1),
            TimeWindow::Minute => Duration::from_secs(60),
            TimeWindow::Hour => Duration::from_secs(3600),
            TimeWindow::Day => Duration::from_secs(86400),
        }
    }
}

/// How admissions are counted against the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowPolicy {
    /// Count admissions since the start of the current window; the counter
    /// resets once the whole window has elapsed.
    #[default]
    Fixed,
    /// Count admissions made during the trailing window. Each admission
    /// expires on its own, one window after it happened.
    Sliding,
}

/// Outcome of a single admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// One unit of capacity was consumed.
    Admitted,
    /// The window is saturated; capacity returns after `retry_after`.
    Saturated { retry_after: Duration },
}

/// Capacity accounting for one rate-limited resource.
#[derive(Debug)]
pub struct WindowCounter {
    limit: u32,
    window: Duration,
    policy: WindowPolicy,
    /// Start of the current fixed window
    window_start: Instant,
    /// Admissions in the current fixed window
    used: u32,
    /// Admission instants still inside the trailing window (sliding only)
    admissions: VecDeque<Instant>,
}

impl WindowCounter {
    /// Create a counter whose first window starts at `now`.
    ///
    /// `limit` and `window` are expected to be validated by the caller.
    pub fn new(limit: u32, window: Duration, policy: WindowPolicy, now: Instant) -> Self {
        let admissions = match policy {
            WindowPolicy::Fixed => VecDeque::new(),
            WindowPolicy::Sliding => VecDeque::with_capacity((limit as usize).min(1024)),
        };

        Self {
            limit,
            window,
            policy,
            window_start: now,
            used: 0,
            admissions,
        }
    }

    /// Try to consume one unit of capacity at `now`.
    pub fn try_admit(&mut self, now: Instant) -> Admission {
        self.roll_over(now);

        if self.used < self.limit {
            self.used += 1;
            if self.policy == WindowPolicy::Sliding {
                self.admissions.push_back(now);
            }
            return Admission::Admitted;
        }

        Admission::Saturated {
            retry_after: self.time_until_reset(now),
        }
    }

    /// Admissions counted against the window at `now`.
    pub fn used(&mut self, now: Instant) -> u32 {
        self.roll_over(now);
        self.used
    }

    /// Remaining capacity at `now`.
    pub fn remaining(&mut self, now: Instant) -> u32 {
        self.roll_over(now);
        self.limit - self.used
    }

    /// Time from `now` until at least one unit of capacity frees up.
    ///
    /// Zero while capacity is available.
    pub fn time_until_reset(&self, now: Instant) -> Duration {
        match self.policy {
            WindowPolicy::Fixed => {
                let elapsed = now.saturating_duration_since(self.window_start);
                self.window.saturating_sub(elapsed)
            }
            WindowPolicy::Sliding => {
                if (self.admissions.len() as u32) < self.limit {
                    return Duration::ZERO;
                }
                match self.admissions.front() {
                    Some(oldest) => self
                        .window
                        .saturating_sub(now.saturating_duration_since(*oldest)),
                    None => Duration::ZERO,
                }
            }
        }
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

    /// Bring the counter up to date with `now` before any decision.
    fn roll_over(&mut self, now: Instant) {
        match self.policy {
            WindowPolicy::Fixed => {
                if now.saturating_duration_since(self.window_start) >= self.window {
                    self.used = 0;
                    self.window_start = now;
                }
            }
            WindowPolicy::Sliding => {
                while let Some(oldest) = self.admissions.front() {
                    if now.saturating_duration_since(*oldest) < self.window {
                        break;
                    }
                    self.admissions.pop_front();
                }
                self.used = self.admissions.len() as u32;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(1000);

    fn fixed(limit: u32, now: Instant) -> WindowCounter {
        WindowCounter::new(limit, WINDOW, WindowPolicy::Fixed, now)
    }

    fn sliding(limit: u32, now: Instant) -> WindowCounter {
        WindowCounter::new(limit, WINDOW, WindowPolicy::Sliding, now)
    }

    #[test]
    fn test_time_window_duration() {
        assert_eq!(TimeWindow::Second.duration(), Duration::from_secs(1));
        assert_eq!(TimeWindow::Minute.duration(), Duration::from_secs(60));
        assert_eq!(TimeWindow::Hour.duration(), Duration::from_secs(3600));
        assert_eq!(TimeWindow::Day.duration(), Duration::from_secs(86400));
    }

    #[test]
    fn test_fixed_admits_up_to_limit() {
        let start = Instant::now();
        let mut counter = fixed(3, start);
        assert_eq!(counter.limit(), 3);
        assert_eq!(counter.window(), WINDOW);
        assert_eq!(counter.policy(), WindowPolicy::Fixed);

        for _ in 0..3 {
            assert_eq!(counter.try_admit(start), Admission::Admitted);
        }

        assert_eq!(counter.used(start), 3);
        assert_eq!(counter.remaining(start), 0);
    }

    #[test]
    fn test_fixed_saturated_reports_remaining_window() {
        let start = Instant::now();
        let mut counter = fixed(2, start);
        counter.try_admit(start);
        counter.try_admit(start);

        let at = start + Duration::from_millis(300);
        assert_eq!(
            counter.try_admit(at),
            Admission::Saturated {
                retry_after: Duration::from_millis(700)
            }
        );
        // A rejected attempt never consumes capacity
        assert_eq!(counter.used(at), 2);
    }

    #[test]
    fn test_fixed_rolls_over_at_window_boundary() {
        let start = Instant::now();
        let mut counter = fixed(1, start);
        assert_eq!(counter.try_admit(start), Admission::Admitted);

        let just_before = start + WINDOW - Duration::from_millis(1);
        assert!(matches!(counter.try_admit(just_before), Admission::Saturated { .. }));

        let boundary = start + WINDOW;
        assert_eq!(counter.try_admit(boundary), Admission::Admitted);
        assert_eq!(counter.used(boundary), 1);
    }

    #[test]
    fn test_fixed_window_restarts_from_rollover_instant() {
        let start = Instant::now();
        let mut counter = fixed(1, start);
        counter.try_admit(start);

        // Idle for several windows, then the window starts afresh at `late`
        let late = start + Duration::from_millis(3500);
        assert_eq!(counter.try_admit(late), Admission::Admitted);
        assert_eq!(
            counter.time_until_reset(late + Duration::from_millis(200)),
            Duration::from_millis(800)
        );
    }

    #[test]
    fn test_fixed_admission_does_not_move_window() {
        let start = Instant::now();
        let mut counter = fixed(3, start);
        counter.try_admit(start);
        counter.try_admit(start + Duration::from_millis(600));
        counter.try_admit(start + Duration::from_millis(900));

        // The window is measured from its start, not from the last admission
        let at = start + Duration::from_millis(950);
        assert_eq!(
            counter.try_admit(at),
            Admission::Saturated {
                retry_after: Duration::from_millis(50)
            }
        );
    }

    #[test]
    fn test_sliding_expires_admissions_individually() {
        let start = Instant::now();
        let mut counter = sliding(2, start);
        counter.try_admit(start);
        counter.try_admit(start + Duration::from_millis(400));

        let at = start + Duration::from_millis(500);
        assert_eq!(
            counter.try_admit(at),
            Admission::Saturated {
                retry_after: Duration::from_millis(500)
            }
        );

        // The first admission has expired, the second has not
        let at = start + Duration::from_millis(1000);
        assert_eq!(counter.remaining(at), 1);
        assert_eq!(counter.try_admit(at), Admission::Admitted);
        assert!(matches!(counter.try_admit(at), Admission::Saturated { .. }));
    }

    #[test]
    fn test_sliding_never_exceeds_limit_in_trailing_window() {
        let start = Instant::now();
        let mut counter = sliding(3, start);
        let mut admitted = Vec::new();

        for step in 0..100u64 {
            let now = start + Duration::from_millis(step * 37);
            if counter.try_admit(now) == Admission::Admitted {
                admitted.push(now);
            }
        }

        for (i, at) in admitted.iter().enumerate() {
            let in_window = admitted[i..]
                .iter()
                .take_while(|later| later.duration_since(*at) < WINDOW)
                .count();
            assert!(in_window <= 3);
        }
    }

    #[test]
    fn test_sliding_time_until_reset_zero_with_capacity() {
        let start = Instant::now();
        let mut counter = sliding(2, start);
        counter.try_admit(start);
        assert_eq!(counter.time_until_reset(start), Duration::ZERO);
    }
}
