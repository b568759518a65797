//! Tool-server health polling.
//!
//! The monitor is policy-free: it observes one process instance and yields a
//! report per tick. Counting failures and deciding transitions belongs to
//! the supervisor.

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use olb_core::ResourceUsage;
use olb_runtime::{ProcessExit, ProcessHandle, ProcessProbe};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::ToolServerClient;

/// One observation of a server process.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    /// Set once the process has exited.
    pub exit: Option<ProcessExit>,
    /// Present in the OS process table.
    pub alive: bool,
    /// Protocol traffic arrived since the previous poll.
    pub active: bool,
    /// Answered a ping. Not checked when `active` already proves liveness.
    pub responsive: bool,
    pub last_activity: Option<DateTime<Utc>>,
    pub usage: Option<ResourceUsage>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.exit.is_none() && self.alive && (self.active || self.responsive)
    }

    /// Short reason for an unhealthy report.
    pub fn describe(&self) -> String {
        if let Some(exit) = &self.exit {
            format!("process {exit}")
        } else if !self.alive {
            "process no longer present".to_string()
        } else if !self.responsive {
            "no activity and ping unanswered".to_string()
        } else {
            "healthy".to_string()
        }
    }
}

/// Single-shot checks against one process instance.
#[derive(Debug, Clone)]
pub struct HealthChecker {
    probe: Arc<ProcessProbe>,
    ping_timeout: Duration,
}

impl HealthChecker {
    pub const fn new(probe: Arc<ProcessProbe>, ping_timeout: Duration) -> Self {
        Self {
            probe,
            ping_timeout,
        }
    }

    /// Check process liveness first (cheap), then the protocol channel.
    pub async fn check(
        &self,
        process: &ProcessHandle,
        client: &ToolServerClient,
        previous_activity: Option<DateTime<Utc>>,
    ) -> HealthReport {
        let last_activity = client.last_activity();
        let exit = process.exit();
        let sample = match (exit.is_none(), process.pid()) {
            (true, Some(pid)) => Some(self.probe.sample(pid)),
            _ => None,
        };
        let alive = exit.is_none() && sample.is_none_or(|s| s.alive);
        let active = last_activity.is_some() && last_activity > previous_activity;

        let responsive = if !alive || client.is_closed() {
            false
        } else if active {
            true
        } else {
            client.ping(self.ping_timeout).await.is_ok()
        };

        HealthReport {
            exit,
            alive,
            active,
            responsive,
            last_activity: client.last_activity().or(last_activity),
            usage: sample.and_then(|s| s.usage),
        }
    }
}

/// Polls one process instance until cancelled.
pub struct HealthMonitor {
    checker: HealthChecker,
    interval: Duration,
    cancel_token: CancellationToken,
}

impl HealthMonitor {
    pub const fn new(
        checker: HealthChecker,
        check_interval: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            checker,
            interval: check_interval,
            cancel_token,
        }
    }

    /// A report every interval, starting one interval from now.
    ///
    /// Completes when the cancellation token fires.
    pub fn monitor(
        self,
        process: Arc<ProcessHandle>,
        client: Arc<ToolServerClient>,
    ) -> impl Stream<Item = HealthReport> {
        let Self {
            checker,
            interval: check_interval,
            cancel_token,
        } = self;

        stream! {
            let mut ticker = interval(check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;

            let mut previous_activity = client.last_activity();
            debug!(server_id = %client.server_id(), pid = ?process.pid(), "starting health monitor");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = checker.check(&process, &client, previous_activity).await;
                        previous_activity = report.last_activity;
                        yield report;
                    }
                    _ = cancel_token.cancelled() => {
                        debug!(server_id = %client.server_id(), "health monitor cancelled");
                        break;
                    }
                }
            }
        }
    }
}
