//! Backend liveness state machine.
//!
//! `Unknown → Online` on the first successful poll (announced once per
//! session), `Online → Offline` on any failure, `Offline → Online` on
//! recovery. Transitions after the first are silent.

use std::time::Duration;

use serde::Serialize;

use crate::backend::Unreachable;
use crate::types::HealthStatus;

/// Default polling interval.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthState {
    #[default]
    Unknown,
    Online,
    Offline,
}

#[derive(Debug, Default)]
pub struct HealthMonitor {
    state: HealthState,
    announced: bool,
    consecutive_failures: u32,
}

/// Result of applying one poll to the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthTransition {
    pub from: HealthState,
    pub to: HealthState,
    /// True only for the first successful poll of the session.
    pub announce: bool,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Apply a poll result. A reachable backend whose status is not
    /// `running` counts as a failure.
    pub fn observe(&mut self, result: Result<HealthStatus, Unreachable>) -> HealthTransition {
        let from = self.state();
        let healthy = match &result {
            Ok(status) if status.is_running() => true,
            Ok(status) => {
                tracing::debug!(status = %status.status, "backend not running");
                false
            }
            Err(err) => {
                tracing::debug!(error = %err, "health poll failed");
                false
            }
        };

        let (to, announce) = if healthy {
            self.consecutive_failures = 0;
            let announce = !self.announced;
            self.announced = true;
            (HealthState::Online, announce)
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            (HealthState::Offline, false)
        };
        self.state = to;

        if from != to {
            tracing::info!(from = ?from, to = ?to, "health state changed");
        }

        HealthTransition { from, to, announce }
    }
}
