//! HTTP handler for the scan endpoint.

use std::borrow::Cow;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue},
};
use tracing::field::Empty;

use super::read_body;
use crate::{
    AppState,
    errors::{Error, Result},
    scan::{ScanHeaders, ScanOutcome, ScanRequest},
};

/// Accept a file, simulate a scan and forward clean files to the `targetUrl` callback.
///
/// The target header is checked before the body is touched; the body is always read in full
/// before any verdict is drawn.
#[tracing::instrument(skip_all, fields(scan_reference_id = Empty, original_filename = Empty, payload_bytes = Empty))]
pub async fn scan_file(State(state): State<AppState>, headers: HeaderMap, body: Body) -> Result<ScanOutcome> {
    let scan_headers = ScanHeaders::from_headers(&headers)?;

    let span = tracing::Span::current();
    span.record("scan_reference_id", &*lossy(&scan_headers.scan_reference_id));
    span.record("original_filename", &*lossy(&scan_headers.original_filename));
    tracing::info!(
        target_url = %scan_headers.target_url,
        original_content_type = %lossy(&scan_headers.original_content_type),
        "AVScan request received"
    );

    let payload = read_body(body, state.config.max_body_size)
        .await
        .map_err(|e| Error::BodyRead { message: e.to_string() })?;
    span.record("payload_bytes", payload.len());

    let request = ScanRequest::new(scan_headers, payload)?;
    state.scanner.handle(request).await
}

/// Header values are logged leniently; the raw bytes are what gets forwarded.
fn lossy(value: &HeaderValue) -> Cow<'_, str> {
    String::from_utf8_lossy(value.as_bytes())
}
