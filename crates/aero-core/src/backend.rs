//! Recognition/streaming backend seam.
//!
//! The dashboard reaches the backend only through [`Backend`], so the core
//! can run against the HTTP client in `aero-http` or an in-memory fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CameraId, HealthStatus, Match, MatchList};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("server returned {status}: {}", .message.as_deref().unwrap_or("no error message"))]
    Server { status: u16, message: Option<String> },
    #[error("malformed response body: {0}")]
    Decode(String),
}

/// Health endpoint could not confirm the backend is alive.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Unreachable {
    #[error("health check timed out")]
    Timeout,
    #[error("health check failed: {0}")]
    Network(String),
    #[error("health check returned HTTP {0}")]
    Status(u16),
    #[error("health check body malformed: {0}")]
    Malformed(String),
}

impl From<BackendError> for Unreachable {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Timeout => Unreachable::Timeout,
            BackendError::Network(msg) => Unreachable::Network(msg),
            BackendError::Server { status, .. } => Unreachable::Status(status),
            BackendError::Decode(msg) => Unreachable::Malformed(msg),
        }
    }
}

/// Camera list could not be fetched.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("failed to load cameras: {0}")]
pub struct FetchError(#[from] pub BackendError);

/// Body of `GET /cameras`. A missing field reads as no cameras.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CamerasResponse {
    #[serde(default)]
    pub cameras: Vec<CameraId>,
}

/// Body of a successful `POST /upload_suspicious`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub matches: Vec<Match>,
}

/// Body of a failed request, e.g. `{"error": "Camera not found"}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// An image selected by the operator.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /cameras`
    async fn cameras(&self) -> Result<Vec<CameraId>, BackendError>;

    /// `POST /upload_suspicious` with multipart field `file`.
    async fn upload_suspicious(&self, image: ImageUpload) -> Result<MatchList, BackendError>;

    /// `GET /health`
    async fn health(&self) -> Result<HealthStatus, BackendError>;

    /// Live feed source for `GET /stream/{camera}`.
    fn stream_url(&self, camera: &str) -> String;
}
