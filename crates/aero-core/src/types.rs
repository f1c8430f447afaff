use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of an alert.
pub type AlertId = Uuid;

/// Opaque camera identifier as returned by `GET /cameras`.
pub type CameraId = String;

/// Severity tag controlling display styling and expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    /// Informational; removed automatically after the alert TTL.
    Info,
    /// Operator action acknowledged (surveillance started/stopped).
    Success,
    Warning,
    /// Also rendered as HIGH severity.
    Error,
}

impl AlertLevel {
    pub fn expires(&self) -> bool {
        matches!(self, AlertLevel::Info)
    }

    pub fn label(&self) -> &'static str {
        match self {
            AlertLevel::Info => "INFO",
            AlertLevel::Success => "SUCCESS",
            AlertLevel::Warning => "WARNING",
            AlertLevel::Error => "HIGH",
        }
    }
}

/// A single entry in the alert feed. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub message: String,
    pub level: AlertLevel,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(level: AlertLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: message.into(),
            level,
            timestamp: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(AlertLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(AlertLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(AlertLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(AlertLevel::Error, message)
    }
}

/// A face match returned verbatim by the recognition backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Identity record URN.
    pub urn: String,
    /// Distance in [0, 1]. Lower = more similar.
    pub distance: f32,
}

impl Match {
    /// Confidence percentage: `round((1 - distance) * 100)`, clamped to 0..=100.
    pub fn confidence(&self) -> u8 {
        let pct = ((1.0 - self.distance) * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

pub type MatchList = Vec<Match>;

/// A match prepared for the match-display surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchView {
    /// 1-based position in the backend's result list.
    pub rank: usize,
    pub urn: String,
    pub distance: f32,
    pub confidence: u8,
    /// Whether `confidence` reaches the operator's threshold.
    pub meets_threshold: bool,
}

impl MatchView {
    pub fn from_matches(matches: &[Match], threshold: u8) -> Vec<MatchView> {
        matches
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let confidence = m.confidence();
                MatchView {
                    rank: i + 1,
                    urn: m.urn.clone(),
                    distance: m.distance,
                    confidence,
                    meets_threshold: confidence >= threshold,
                }
            })
            .collect()
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}
