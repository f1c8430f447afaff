//! Dashboard counters, derived on demand from the feed, registry and health.

use serde::Serialize;

use crate::alert_feed::AlertFeed;
use crate::cameras::CameraRegistry;
use crate::health::HealthState;

/// Default number of camera slots shown next to the active count.
pub const DEFAULT_CAMERA_CAPACITY: usize = 6;

/// Label shown in the "Scanning Status" card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanningStatus {
    Standby,
    Online,
    Offline,
}

impl ScanningStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ScanningStatus::Standby => "STANDBY",
            ScanningStatus::Online => "ONLINE",
            ScanningStatus::Offline => "OFFLINE",
        }
    }
}

impl From<HealthState> for ScanningStatus {
    fn from(state: HealthState) -> Self {
        match state {
            HealthState::Unknown => ScanningStatus::Standby,
            HealthState::Online => ScanningStatus::Online,
            HealthState::Offline => ScanningStatus::Offline,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub active_cameras: usize,
    pub camera_capacity: usize,
    pub active_alerts: usize,
    pub scanning_status: ScanningStatus,
    pub matches_found: u64,
}

impl Stats {
    /// Pure function of the current state. Holds nothing of its own.
    pub fn compute(
        feed: &AlertFeed,
        registry: &CameraRegistry,
        match_count: u64,
        health: HealthState,
        camera_capacity: usize,
    ) -> Self {
        Self {
            active_cameras: registry.len(),
            camera_capacity,
            active_alerts: feed.len(),
            scanning_status: health.into(),
            matches_found: match_count,
        }
    }

    /// Card labels and values in display order.
    pub fn cards(&self) -> [(&'static str, String); 4] {
        [
            (
                "Active Cameras",
                format!("{}/{}", self.active_cameras, self.camera_capacity),
            ),
            ("Active Alerts", self.active_alerts.to_string()),
            ("Scanning Status", self.scanning_status.label().to_string()),
            ("Matches Found", self.matches_found.to_string()),
        ]
    }
}
