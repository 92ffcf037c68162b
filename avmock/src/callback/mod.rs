//! Callback delivery: forwarding clean files to the caller-supplied target URL.
//!
//! - [`dispatcher`]: Builds the outbound request and drives the bounded retry loop
//!
//! A delivery is a short sequence of [`CallbackAttempt`]s. Each attempt either succeeds (the
//! target answered `200`) or fails with a transient outcome that is retried after an
//! exponentially growing backoff. Once the attempt budget is spent the last outcome is surfaced
//! as a [`DeliveryError`].

pub mod dispatcher;

use axum::http::HeaderValue;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

pub use dispatcher::{CallbackDispatcher, RetryPolicy};

/// Header carrying the opaque correlation token
pub const SCAN_REFERENCE_ID_HEADER: &str = "scan-reference-id";
/// Header carrying the injected verdict
pub const SCAN_RESULT_HEADER: &str = "scan-result";
pub const ORIGINAL_FILENAME_HEADER: &str = "original-filename";
pub const ORIGINAL_CONTENT_TYPE_HEADER: &str = "original-content-type";

/// Everything needed to forward a clean file.
///
/// Metadata is kept as raw header values so it is forwarded byte-for-byte, including values
/// that are not valid UTF-8.
#[derive(Debug, Clone)]
pub struct CallbackRequest {
    pub target_url: String,
    pub scan_reference_id: HeaderValue,
    pub original_filename: HeaderValue,
    pub original_content_type: HeaderValue,
    pub payload: Bytes,
}

/// Outcome of a single HTTP send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    HttpError(u16),
    Timeout,
    ConnectionError(String),
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success)
    }

    fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::HttpError(_) => "http_error",
            AttemptOutcome::Timeout => "timeout",
            AttemptOutcome::ConnectionError(_) => "connection_error",
        }
    }
}

/// Record of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackAttempt {
    /// 1-based attempt number
    pub attempt_number: u32,
    pub outcome: AttemptOutcome,
    /// Backoff slept after this attempt; `None` when no further attempt followed
    pub delay_before_next_retry: Option<Duration>,
}

/// Attempts made by a successful delivery, in order. The last one is always a success.
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    pub attempts: Vec<CallbackAttempt>,
}

impl DeliveryReport {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// The backoff delays slept between attempts
    pub fn backoffs(&self) -> Vec<Duration> {
        self.attempts.iter().filter_map(|a| a.delay_before_next_retry).collect()
    }
}

/// Why a delivery ultimately failed. The display strings are returned verbatim to the caller.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Every attempt got a non-200 answer; `status` is the last one observed
    #[error("Callback failed: HTTP {status}")]
    HttpStatus { status: u16, attempts: u32 },

    /// The final attempt timed out
    #[error("Callback timeout")]
    Timeout { attempts: u32 },

    /// The final attempt could not reach the target
    #[error("Callback connection error: {message}")]
    Connection { message: String, attempts: u32 },

    /// Anything that is not a transient delivery failure (never retried)
    #[error("Callback error: {message}")]
    Unexpected { message: String },
}

impl DeliveryError {
    /// Build the terminal error from the outcome of the last attempt.
    fn exhausted(outcome: AttemptOutcome, attempts: u32) -> Self {
        match outcome {
            AttemptOutcome::HttpError(status) => DeliveryError::HttpStatus { status, attempts },
            AttemptOutcome::Timeout => DeliveryError::Timeout { attempts },
            AttemptOutcome::ConnectionError(message) => DeliveryError::Connection { message, attempts },
            AttemptOutcome::Success => DeliveryError::Unexpected {
                message: "delivery reported exhausted after a successful attempt".to_string(),
            },
        }
    }
}
