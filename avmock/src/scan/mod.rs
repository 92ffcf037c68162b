//! The simulated scan.
//!
//! - [`policy`]: Verdict and delay decisions ([`RandomScanPolicy`] in production,
//!   [`FixedScanPolicy`] in tests)
//!
//! [`ScanService::handle`] takes a fully read [`ScanRequest`], waits out the simulated scan,
//! draws a verdict and, for clean files, forwards the payload through the
//! [`CallbackDispatcher`].

pub mod policy;

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use metrics::counter;

use crate::callback::{
    CallbackDispatcher, CallbackRequest, DeliveryReport, ORIGINAL_CONTENT_TYPE_HEADER, ORIGINAL_FILENAME_HEADER,
    SCAN_REFERENCE_ID_HEADER,
};
use crate::errors::{Error, Result};

pub use policy::{FixedScanPolicy, RandomScanPolicy, ScanPolicy, Verdict};

/// Required inbound header naming the callback destination (matched case-insensitively)
pub const TARGET_URL_HEADER: &str = "targetUrl";

const DEFAULT_FILENAME: &str = "unknown";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Metadata supplied in the headers of a `/scan` request.
///
/// Pass-through values stay raw [`HeaderValue`]s so they reach the callback unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanHeaders {
    pub target_url: String,
    pub scan_reference_id: HeaderValue,
    pub original_filename: HeaderValue,
    pub original_content_type: HeaderValue,
}

impl ScanHeaders {
    /// Extract scan metadata. Only `targetUrl` is required; the rest fall back to defaults and
    /// are never validated.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
        let target_url = headers
            .get(TARGET_URL_HEADER)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .filter(|url| !url.is_empty())
            .ok_or(Error::MissingTargetUrl)?;

        Ok(Self {
            target_url,
            scan_reference_id: header_or(headers, SCAN_REFERENCE_ID_HEADER, ""),
            original_filename: header_or(headers, ORIGINAL_FILENAME_HEADER, DEFAULT_FILENAME),
            original_content_type: header_or(headers, ORIGINAL_CONTENT_TYPE_HEADER, DEFAULT_CONTENT_TYPE),
        })
    }
}

fn header_or(headers: &HeaderMap, name: &str, default: &'static str) -> HeaderValue {
    headers
        .get(name)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(default))
}

/// A scan request whose payload has been read in full.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub headers: ScanHeaders,
    pub payload: Bytes,
}

impl ScanRequest {
    /// Pair metadata with the payload, rejecting empty bodies.
    pub fn new(headers: ScanHeaders, payload: Bytes) -> Result<Self> {
        if payload.is_empty() {
            return Err(Error::EmptyPayload);
        }
        Ok(Self { headers, payload })
    }

    fn into_callback(self) -> CallbackRequest {
        CallbackRequest {
            target_url: self.headers.target_url,
            scan_reference_id: self.headers.scan_reference_id,
            original_filename: self.headers.original_filename,
            original_content_type: self.headers.original_content_type,
            payload: self.payload,
        }
    }
}

/// Terminal result of a scan that did not fail.
#[derive(Debug)]
pub enum ScanOutcome {
    /// The file was flagged and not forwarded
    Infected,
    /// The file was clean and the callback target accepted it
    Forwarded { bytes: usize, report: DeliveryReport },
}

impl IntoResponse for ScanOutcome {
    fn into_response(self) -> Response {
        // Infected files are reported with 200 as well; callers distinguish them by body
        let body = match self {
            ScanOutcome::Infected => "INFECTED: Simulated virus detected".to_string(),
            ScanOutcome::Forwarded { bytes, .. } => format!("SUCCESS: File scanned and forwarded ({bytes} bytes)"),
        };
        (StatusCode::OK, body).into_response()
    }
}

/// Runs simulated scans and forwards clean files.
#[derive(Clone)]
pub struct ScanService {
    policy: Arc<dyn ScanPolicy>,
    dispatcher: CallbackDispatcher,
}

impl ScanService {
    pub fn new(policy: Arc<dyn ScanPolicy>, dispatcher: CallbackDispatcher) -> Self {
        Self { policy, dispatcher }
    }

    pub async fn handle(&self, request: ScanRequest) -> Result<ScanOutcome> {
        let delay = self.policy.scan_delay();
        tracing::info!(delay_ms = delay.as_millis() as u64, "Simulating virus scan");
        tokio::time::sleep(delay).await;

        let verdict = self.policy.verdict();
        counter!("avmock_scans_total", "verdict" => verdict.as_str()).increment(1);

        match verdict {
            Verdict::Infected => {
                tracing::warn!(filename = ?request.headers.original_filename, "Simulated virus detected");
                Ok(ScanOutcome::Infected)
            }
            Verdict::Clean => {
                let bytes = request.payload.len();
                tracing::info!(bytes, "File is clean, forwarding to callback");
                let report = self.dispatcher.deliver(&request.into_callback()).await?;
                Ok(ScanOutcome::Forwarded { bytes, report })
            }
        }
    }
}
