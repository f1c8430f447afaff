//! Suspicious-person upload: validation, in-flight tracking and translation
//! of the recognition result into a single alert.

use serde::Serialize;
use thiserror::Error;

use crate::backend::BackendError;
use crate::types::{Alert, Match, MatchList};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("an upload is already in progress")]
    Busy,
    #[error("network failure: {0}")]
    Network(String),
    #[error("server error: {}", .message.as_deref().unwrap_or("upload failed"))]
    Server { status: Option<u16>, message: Option<String> },
}

impl From<BackendError> for UploadError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Network(msg) => UploadError::Network(msg),
            BackendError::Timeout => UploadError::Network("request timed out".into()),
            BackendError::Server { status, message } => UploadError::Server {
                status: Some(status),
                message,
            },
            BackendError::Decode(msg) => UploadError::Server {
                status: None,
                message: Some(format!("malformed response: {msg}")),
            },
        }
    }
}

/// Upload progress shown under the upload box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UploadStatus {
    Idle,
    Analyzing,
    Complete { matches: usize },
    Rejected,
    Failed { message: String },
}

impl UploadStatus {
    pub fn label(&self) -> String {
        match self {
            UploadStatus::Idle => String::new(),
            UploadStatus::Analyzing => "Analyzing image...".into(),
            UploadStatus::Complete { matches } => format!("Analysis complete: {matches} matches"),
            UploadStatus::Rejected => "Invalid image".into(),
            UploadStatus::Failed { message } => message.clone(),
        }
    }
}

/// Reject empty blobs and anything that is not a well-formed `image/*`
/// media type.
pub fn validate(bytes: &[u8], mime_type: &str) -> Result<(), UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::InvalidInput("no image selected".into()));
    }
    if !is_image_media_type(mime_type) {
        return Err(UploadError::InvalidInput(format!(
            "expected an image/* file, got {mime_type:?}"
        )));
    }
    Ok(())
}

/// `image/<subtype>` with optional `; name=value` parameters, every name,
/// subtype and unquoted value an RFC 7230 token.
fn is_image_media_type(mime_type: &str) -> bool {
    let mut parts = mime_type.split(';');
    let essence = parts.next().unwrap_or_default().trim_end();
    let Some((kind, subtype)) = essence.split_once('/') else {
        return false;
    };
    if !kind.eq_ignore_ascii_case("image") || !is_token(subtype) {
        return false;
    }
    parts.all(|param| match param.trim().split_once('=') {
        Some((name, value)) => is_token(name) && (is_token(value) || is_quoted(value)),
        None => false,
    })
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

fn is_quoted(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('"') && s.ends_with('"') && !s[1..s.len() - 1].contains('"')
}

/// Tracks the single in-flight upload.
#[derive(Debug)]
pub struct UploadController {
    in_flight: bool,
    status: UploadStatus,
}

impl Default for UploadController {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a finished upload changes.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub result: Result<MatchList, UploadError>,
    pub alert: Alert,
}

impl UploadReport {
    /// Matches to add to the session counter (zero unless matches were found).
    pub fn match_delta(&self) -> u64 {
        match &self.result {
            Ok(matches) => matches.len() as u64,
            Err(_) => 0,
        }
    }
}

impl UploadController {
    pub fn new() -> Self {
        Self {
            in_flight: false,
            status: UploadStatus::Idle,
        }
    }

    pub fn status(&self) -> &UploadStatus {
        &self.status
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Validate and claim the upload slot. On success the status becomes
    /// `Analyzing` and the caller must follow up with [`finish`](Self::finish).
    pub fn begin(&mut self, bytes: &[u8], mime_type: &str) -> Result<(), UploadReport> {
        if let Err(err) = validate(bytes, mime_type) {
            if !self.in_flight {
                self.status = UploadStatus::Rejected;
            }
            let message = if bytes.is_empty() {
                "Please select an image"
            } else {
                "Please select a valid image file"
            };
            return Err(UploadReport {
                alert: Alert::error(message),
                result: Err(err),
            });
        }
        if self.in_flight {
            return Err(UploadReport {
                alert: Alert::warning("Upload already in progress, wait for the current analysis"),
                result: Err(UploadError::Busy),
            });
        }
        self.in_flight = true;
        self.status = UploadStatus::Analyzing;
        Ok(())
    }

    /// Release the slot of an upload whose result will never arrive.
    pub fn abandon(&mut self) {
        if self.in_flight {
            self.in_flight = false;
            self.status = UploadStatus::Idle;
        }
    }

    /// Release the slot and translate the backend result.
    pub fn finish(&mut self, result: Result<MatchList, BackendError>) -> UploadReport {
        self.in_flight = false;
        match result {
            Ok(matches) => {
                self.status = UploadStatus::Complete {
                    matches: matches.len(),
                };
                let alert = match top_confidence(&matches) {
                    Some(top) => Alert::warning(format!(
                        "Found {} face match(es), top confidence {top}%",
                        matches.len()
                    )),
                    None => Alert::info("No matches found in database"),
                };
                UploadReport {
                    result: Ok(matches),
                    alert,
                }
            }
            Err(err) => {
                let err = UploadError::from(err);
                let (status, alert) = match &err {
                    UploadError::Server { message, .. } => (
                        UploadStatus::Failed {
                            message: "Upload failed".into(),
                        },
                        Alert::error(message.as_deref().unwrap_or("Upload failed")),
                    ),
                    _ => (
                        UploadStatus::Failed {
                            message: "Error uploading image".into(),
                        },
                        Alert::error("Error uploading image"),
                    ),
                };
                self.status = status;
                UploadReport {
                    result: Err(err),
                    alert,
                }
            }
        }
    }
}

fn top_confidence(matches: &[Match]) -> Option<u8> {
    matches.iter().map(Match::confidence).max()
}
