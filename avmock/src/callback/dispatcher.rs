//! Callback dispatch: build, send, classify, back off, repeat.
//!
//! ```text
//! dispatcher.deliver(request)
//!   ├─ parse target URL                  // malformed → DeliveryError::Unexpected, no attempt made
//!   └─ for attempt in 1..=max_attempts:
//!        ├─ POST payload + scan headers  // per-attempt timeout
//!        ├─ 200         → Ok(report)
//!        ├─ non-200     ┐
//!        ├─ timeout     ├─ last attempt? → Err(last outcome)
//!        ├─ connect err ┘   otherwise sleep(backoff), backoff *= factor
//!        └─ other error → DeliveryError::Unexpected
//! ```

use std::time::Duration;

use metrics::counter;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use url::Url;

use super::{
    AttemptOutcome, CallbackAttempt, CallbackRequest, DeliveryError, DeliveryReport, ORIGINAL_CONTENT_TYPE_HEADER,
    ORIGINAL_FILENAME_HEADER, SCAN_REFERENCE_ID_HEADER, SCAN_RESULT_HEADER,
};
use crate::config::CallbackConfig;

/// Content type used for forwarded files, whatever the original type was
const FORWARD_CONTENT_TYPE: &str = "application/octet-stream";
/// How much of the callback's response body ends up in the logs
const RESPONSE_LOG_LIMIT: usize = 200;

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_factor: u32,
    /// Applied to each attempt individually
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&CallbackConfig::default())
    }
}

impl From<&CallbackConfig> for RetryPolicy {
    fn from(config: &CallbackConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: config.initial_backoff,
            backoff_factor: config.backoff_factor,
            timeout: config.timeout,
        }
    }
}

/// Forwards clean files to their callback target.
#[derive(Debug, Clone)]
pub struct CallbackDispatcher {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl CallbackDispatcher {
    /// Build the HTTP client. A rustls crypto provider must already be installed.
    pub fn new(config: &CallbackConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().user_agent(config.user_agent.as_str()).build()?;

        Ok(Self {
            client,
            policy: RetryPolicy::from(config),
        })
    }

    /// Deliver `request` to its target, retrying transient failures.
    #[tracing::instrument(skip_all, fields(target_url = %request.target_url, payload_bytes = request.payload.len()))]
    pub async fn deliver(&self, request: &CallbackRequest) -> Result<DeliveryReport, DeliveryError> {
        let url = Url::parse(&request.target_url).map_err(|e| DeliveryError::Unexpected {
            message: format!("invalid target URL '{}': {}", request.target_url, e),
        })?;

        let max_attempts = self.policy.max_attempts.max(1);
        let mut backoff = self.policy.initial_backoff;
        let mut report = DeliveryReport::default();
        let mut attempt_number = 1;

        loop {
            tracing::debug!(attempt = attempt_number, max_attempts, "Sending callback request");

            let outcome = self.attempt(&url, request).await?;
            counter!("avmock_callback_attempts_total", "outcome" => outcome.label()).increment(1);

            if outcome.is_success() {
                tracing::info!(attempt = attempt_number, "Callback delivered");
                report.attempts.push(CallbackAttempt {
                    attempt_number,
                    outcome,
                    delay_before_next_retry: None,
                });
                return Ok(report);
            }

            if attempt_number >= max_attempts {
                tracing::error!(attempt = attempt_number, outcome = ?outcome, "Callback failed, no attempts left");
                return Err(DeliveryError::exhausted(outcome, attempt_number));
            }

            tracing::warn!(
                attempt = attempt_number,
                max_attempts,
                outcome = ?outcome,
                backoff = ?backoff,
                "Callback attempt failed, retrying"
            );
            report.attempts.push(CallbackAttempt {
                attempt_number,
                outcome,
                delay_before_next_retry: Some(backoff),
            });

            tokio::time::sleep(backoff).await;
            backoff = backoff.saturating_mul(self.policy.backoff_factor);
            attempt_number += 1;
        }
    }

    /// Perform one POST and classify the result.
    ///
    /// Transient failures come back as `Ok(outcome)` so the caller can retry them; only failures
    /// that another attempt cannot fix are returned as errors.
    async fn attempt(&self, url: &Url, request: &CallbackRequest) -> Result<AttemptOutcome, DeliveryError> {
        let result = self
            .client
            .post(url.clone())
            .timeout(self.policy.timeout)
            .header(CONTENT_TYPE, FORWARD_CONTENT_TYPE)
            .header(SCAN_REFERENCE_ID_HEADER, request.scan_reference_id.clone())
            .header(SCAN_RESULT_HEADER, "CLEAN")
            .header(ORIGINAL_FILENAME_HEADER, request.original_filename.clone())
            .header(ORIGINAL_CONTENT_TYPE_HEADER, request.original_content_type.clone())
            .header(CONTENT_LENGTH, request.payload.len())
            .body(request.payload.clone())
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status();
                // The body is only logged; failing to read it does not change the outcome
                let body = body_preview(response, RESPONSE_LOG_LIMIT * 4).await;
                if !body.is_empty() {
                    tracing::debug!(status = status.as_u16(), body = %truncate(&body, RESPONSE_LOG_LIMIT), "Callback response");
                }

                if status == StatusCode::OK {
                    Ok(AttemptOutcome::Success)
                } else {
                    Ok(AttemptOutcome::HttpError(status.as_u16()))
                }
            }
            Err(e) if e.is_timeout() => Ok(AttemptOutcome::Timeout),
            Err(e) if e.is_connect() || e.is_request() => Ok(AttemptOutcome::ConnectionError(error_chain(&e))),
            Err(e) => Err(DeliveryError::Unexpected { message: error_chain(&e) }),
        }
    }
}

/// Render an error together with its sources, e.g. `error sending request: connection refused`.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Read at most `limit` bytes of the response body, stopping early once the limit is reached.
async fn body_preview(mut response: reqwest::Response, limit: usize) -> String {
    let mut buf = Vec::new();
    while buf.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
            Ok(None) | Err(_) => break,
        }
    }
    buf.truncate(limit);
    String::from_utf8_lossy(&buf).into_owned()
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
