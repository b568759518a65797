//! Automatic restart policy: exponential backoff bounded by a per-window
//! restart budget.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use olb_core::BridgeSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub window: Duration,
    pub max_restarts: u32,
}

impl RestartPolicy {
    pub const fn from_settings(settings: &BridgeSettings) -> Self {
        Self {
            base: settings.backoff_base(),
            cap: settings.backoff_cap(),
            window: settings.restart_window(),
            max_restarts: settings.max_restarts_per_window,
        }
    }

    /// `base * 2^attempt`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Restart after `delay`. `attempt` counts from 1 within the window.
    Retry { attempt: u32, delay: Duration },
    /// Budget spent; the server stays crashed until started by hand.
    Exhausted { restarts: u32 },
}

/// Restart history of one server.
#[derive(Debug, Clone)]
pub struct RestartTracker {
    policy: RestartPolicy,
    recent: VecDeque<Instant>,
}

impl RestartTracker {
    pub const fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            recent: VecDeque::new(),
        }
    }

    pub const fn policy(&self) -> &RestartPolicy {
        &self.policy
    }

    /// Decide what to do about a crash at `now`. A `Retry` is recorded
    /// against the window immediately.
    pub fn on_crash(&mut self, now: Instant) -> RestartDecision {
        self.prune(now);
        let used = u32::try_from(self.recent.len()).unwrap_or(u32::MAX);
        if used >= self.policy.max_restarts {
            return RestartDecision::Exhausted { restarts: used };
        }
        let delay = self.policy.backoff(used);
        self.recent.push_back(now);
        RestartDecision::Retry {
            attempt: used + 1,
            delay,
        }
    }

    /// Operator restarts count against the window but never get refused.
    pub fn record_manual(&mut self, now: Instant) {
        self.prune(now);
        self.recent.push_back(now);
    }

    /// Restarts still counted at `now`.
    pub fn in_window(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.recent.len()
    }

    /// Forget history; a manual start from `stopped`/`crashed`.
    pub fn reset(&mut self) {
        self.recent.clear();
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.recent.front() {
            if now.saturating_duration_since(oldest) >= self.policy.window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RestartPolicy {
        RestartPolicy {
            base: Duration::from_millis(100),
            cap: Duration::from_millis(450),
            window: Duration::from_secs(60),
            max_restarts: 4,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let p = policy();
        assert_eq!(p.backoff(0), Duration::from_millis(100));
        assert_eq!(p.backoff(1), Duration::from_millis(200));
        assert_eq!(p.backoff(2), Duration::from_millis(400));
        assert_eq!(p.backoff(3), Duration::from_millis(450));
        assert_eq!(p.backoff(64), Duration::from_millis(450));
    }

    #[test]
    fn test_budget_exhausts_within_window() {
        let mut tracker = RestartTracker::new(policy());
        let now = Instant::now();
        let delays: Vec<_> = (0..4)
            .map(|_| match tracker.on_crash(now) {
                RestartDecision::Retry { delay, .. } => delay.as_millis(),
                RestartDecision::Exhausted { .. } => panic!("exhausted too early"),
            })
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 450]);
        assert_eq!(
            tracker.on_crash(now),
            RestartDecision::Exhausted { restarts: 4 }
        );
    }

    #[test]
    fn test_window_expiry_restores_budget_and_backoff() {
        let mut tracker = RestartTracker::new(policy());
        let start = Instant::now();
        for _ in 0..4 {
            tracker.on_crash(start);
        }
        let later = start + Duration::from_secs(61);
        assert_eq!(
            tracker.on_crash(later),
            RestartDecision::Retry {
                attempt: 1,
                delay: Duration::from_millis(100)
            }
        );
    }

    #[test]
    fn test_manual_restarts_count_and_reset_clears() {
        let mut tracker = RestartTracker::new(policy());
        let now = Instant::now();
        tracker.record_manual(now);
        tracker.record_manual(now);
        assert_eq!(tracker.in_window(now), 2);
        assert!(matches!(
            tracker.on_crash(now),
            RestartDecision::Retry { attempt: 3, .. }
        ));

        tracker.reset();
        assert_eq!(tracker.in_window(now), 0);
    }
}
