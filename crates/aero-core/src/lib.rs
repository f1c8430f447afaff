//! aero-core — Alert/match ingestion pipeline for the AERO surveillance dashboard.
//!
//! Turns recognition results, camera-list fetches and health checks into a
//! bounded alert feed plus derived dashboard statistics. The recognition
//! service itself is reached through the [`Backend`] trait.

pub mod alert_feed;
pub mod backend;
pub mod cameras;
pub mod dashboard;
pub mod health;
pub mod stats;
pub mod types;
pub mod upload;

pub use alert_feed::{AlertFeed, ALERT_FEED_CAPACITY, INFO_ALERT_TTL};
pub use backend::{Backend, BackendError, FetchError, ImageUpload, Unreachable};
pub use cameras::CameraRegistry;
pub use dashboard::{Dashboard, DashboardOptions, Snapshot};
pub use health::{HealthMonitor, HealthState};
pub use stats::{ScanningStatus, Stats};
pub use types::{Alert, AlertId, AlertLevel, CameraId, HealthStatus, Match, MatchList, MatchView};
pub use upload::{UploadController, UploadError, UploadStatus};
