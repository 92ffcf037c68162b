//! API layer for HTTP request handling.
//!
//! - **[`handlers`]**: Axum route handlers for all endpoints
//!
//! # API Structure
//!
//! - **Scan** (`POST /scan`): Simulated virus scan with callback forwarding
//! - **Diagnostics** (`GET /health`, `GET /test`, `POST /debug`): Liveness and request echo
//! - **Metrics** (`GET /internal/metrics`): Prometheus metrics, when enabled

pub mod handlers;
