//! reqwest client for the recognition and streaming service.

use std::time::Duration;

use aero_core::backend::{CamerasResponse, ErrorBody, UploadResponse};
use aero_core::{Backend, BackendError, CameraId, HealthStatus, ImageUpload, MatchList};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Default backend address (local recognition service).
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("invalid base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// [`Backend`] over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    /// Build a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("aero/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self, HttpError> {
        let base_url = Url::parse(base_url).map_err(|e| HttpError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(HttpError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "URL cannot be a base".into(),
            });
        }
        tracing::debug!(base = %base_url, "HTTP backend configured");
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

fn transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Network(err.to_string())
    }
}

/// Decode a 2xx body as `T`; turn anything else into `BackendError::Server`
/// carrying the body's `error` field when present.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let status = response.status();
    let body = response.bytes().await.map_err(transport_error)?;

    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error);
        tracing::warn!(status = status.as_u16(), message = ?message, "backend returned error");
        return Err(BackendError::Server {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_slice(&body).map_err(|e| BackendError::Decode(e.to_string()))
}

#[async_trait]
impl Backend for HttpBackend {
    async fn cameras(&self) -> Result<Vec<CameraId>, BackendError> {
        let url = self.endpoint(&["cameras"]);
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        let body: CamerasResponse = read_json(response).await?;
        tracing::debug!(count = body.cameras.len(), "cameras fetched");
        Ok(body.cameras)
    }

    async fn upload_suspicious(&self, image: ImageUpload) -> Result<MatchList, BackendError> {
        let url = self.endpoint(&["upload_suspicious"]);
        let part = Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.mime_type)
            .map_err(|e| BackendError::Network(format!("invalid content type: {e}")))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        let body: UploadResponse = read_json(response).await?;
        tracing::debug!(matches = body.matches.len(), "recognition result received");
        Ok(body.matches)
    }

    async fn health(&self) -> Result<HealthStatus, BackendError> {
        let url = self.endpoint(&["health"]);
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        read_json(response).await
    }

    fn stream_url(&self, camera: &str) -> String {
        self.endpoint(&["stream", camera]).to_string()
    }
}
