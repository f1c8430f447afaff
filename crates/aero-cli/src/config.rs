use std::path::Path;
use std::time::Duration;

use aero_core::DashboardOptions;
use anyhow::Context;
use serde::Deserialize;

/// CLI configuration: optional TOML file named by `AERO_CONFIG`, then
/// `AERO_*` environment variables, then command-line flags.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recognition/streaming backend base URL (default: http://127.0.0.1:8000).
    pub api_base: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Seconds between health polls.
    pub health_interval_secs: u64,
    /// Lifetime of INFO alerts in seconds.
    pub alert_ttl_secs: u64,
    /// Camera slots shown next to the active count.
    pub camera_capacity: usize,
    /// Match confidence threshold in percent (50-100).
    pub confidence_threshold: u8,
}

impl Default for Config {
    fn default() -> Self {
        let options = DashboardOptions::default();
        Self {
            api_base: aero_http::DEFAULT_API_BASE.to_string(),
            request_timeout_secs: aero_http::DEFAULT_REQUEST_TIMEOUT.as_secs(),
            health_interval_secs: options.health_interval.as_secs(),
            alert_ttl_secs: options.alert_ttl.as_secs(),
            camera_capacity: options.camera_capacity,
            confidence_threshold: options.confidence_threshold,
        }
    }
}

impl Config {
    /// Load from `AERO_CONFIG` (if set) and the process environment.
    pub fn load() -> anyhow::Result<Self> {
        let base = match std::env::var("AERO_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        Ok(base.with_env(|key| std::env::var(key).ok()))
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Overlay `AERO_*` variables. Unparseable values keep the current setting.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(base) = lookup("AERO_API_BASE") {
            self.api_base = base;
        }
        env_parse(&lookup, "AERO_REQUEST_TIMEOUT_SECS", &mut self.request_timeout_secs);
        env_parse(&lookup, "AERO_HEALTH_INTERVAL_SECS", &mut self.health_interval_secs);
        env_parse(&lookup, "AERO_ALERT_TTL_SECS", &mut self.alert_ttl_secs);
        env_parse(&lookup, "AERO_CAMERA_CAPACITY", &mut self.camera_capacity);
        env_parse(&lookup, "AERO_CONFIDENCE_THRESHOLD", &mut self.confidence_threshold);
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn dashboard_options(&self) -> DashboardOptions {
        DashboardOptions {
            alert_ttl: Duration::from_secs(self.alert_ttl_secs),
            health_interval: Duration::from_secs(self.health_interval_secs.max(1)),
            camera_capacity: self.camera_capacity,
            confidence_threshold: self.confidence_threshold,
        }
    }
}

fn env_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    if let Some(value) = lookup(key).and_then(|v| v.trim().parse().ok()) {
        *slot = value;
    }
}
