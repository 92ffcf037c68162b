//! HTTP request handlers.
//!
//! - [`scan`]: The `/scan` endpoint
//! - [`diagnostics`]: Health, test and debug endpoints
//!
//! All responses are plain text. Scan failures are returned as [`crate::errors::Error`], which
//! converts to the matching status code and diagnostic body.

pub mod diagnostics;
pub mod scan;

use axum::body::Body;
use bytes::Bytes;

/// Read a request body in full, failing if it exceeds `limit` bytes.
pub(crate) async fn read_body(body: Body, limit: usize) -> Result<Bytes, axum::Error> {
    axum::body::to_bytes(body, limit).await
}
