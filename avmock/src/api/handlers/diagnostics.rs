//! Liveness and debugging endpoints. None of them share state with `/scan`.

use axum::{
    body::Body,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::read_body;
use crate::AppState;

const PREVIEW_BYTES: usize = 100;

#[tracing::instrument(skip_all)]
pub async fn health() -> &'static str {
    tracing::debug!("Health check requested");
    "AVScan Mock is running"
}

pub async fn test_endpoint() -> &'static str {
    "AVScan Mock Test Endpoint OK"
}

/// Echo how many bytes were received, to check that uploads arrive intact.
#[tracing::instrument(skip_all)]
pub async fn debug_request(State(state): State<AppState>, body: Body) -> Response {
    match read_body(body, state.config.max_body_size).await {
        Ok(data) => {
            if !data.is_empty() {
                let preview = &data[..data.len().min(PREVIEW_BYTES)];
                tracing::info!(bytes = data.len(), preview = %String::from_utf8_lossy(preview), "Debug request body");
            }
            (StatusCode::OK, format!("Debug OK: received {} bytes", data.len())).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Debug request body could not be read");
            (StatusCode::BAD_REQUEST, format!("Debug error: {e}")).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::scan::FixedScanPolicy;
    use crate::test_utils::{create_test_app, create_test_config};
    use axum::http::StatusCode;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_health_is_idempotent() {
        let server = create_test_app(create_test_config(), FixedScanPolicy::infected());

        let response = server.get("/health").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "AVScan Mock is running");

        // A scan in between must not change anything
        server
            .post("/scan")
            .add_header("targetUrl", "http://127.0.0.1:1/cb")
            .bytes(Bytes::from_static(b"hello"))
            .await
            .assert_status_ok();

        let response = server.get("/health").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "AVScan Mock is running");
    }

    #[tokio::test]
    async fn test_test_endpoint() {
        let server = create_test_app(create_test_config(), FixedScanPolicy::clean());

        let response = server.get("/test").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "AVScan Mock Test Endpoint OK");
    }

    #[tokio::test]
    async fn test_debug_reports_received_bytes() {
        let server = create_test_app(create_test_config(), FixedScanPolicy::clean());

        let response = server.post("/debug").bytes(Bytes::from_static(b"twelve bytes")).await;
        response.assert_status_ok();
        assert_eq!(response.text(), "Debug OK: received 12 bytes");

        let response = server.post("/debug").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "Debug OK: received 0 bytes");
    }

    #[tokio::test]
    async fn test_debug_rejects_oversized_body() {
        let config = Config {
            max_body_size: 2,
            ..create_test_config()
        };
        let server = create_test_app(config, FixedScanPolicy::clean());

        let response = server.post("/debug").bytes(Bytes::from_static(b"abc")).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.text().starts_with("Debug error: "));
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let server = create_test_app(create_test_config(), FixedScanPolicy::clean());

        server.get("/nope").await.assert_status(StatusCode::NOT_FOUND);
    }
}
