//! aero-http — HTTP access to the AERO recognition and streaming service.
//!
//! Implements [`aero_core::Backend`] against the four REST endpoints:
//! `GET /cameras`, `GET /stream/{id}`, `POST /upload_suspicious` and
//! `GET /health`.

pub mod client;

pub use client::{HttpBackend, HttpError, DEFAULT_API_BASE, DEFAULT_REQUEST_TIMEOUT};
