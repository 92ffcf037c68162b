//! # avmock: Mock Antivirus Scanning Endpoint
//!
//! `avmock` stands in for a real asynchronous antivirus scanning service inside integration-test
//! environments. It accepts a file upload over HTTP, pretends to scan it for a random interval,
//! and then either reports an "infected" verdict or forwards the original bytes to a
//! caller-supplied callback URL with scan-result metadata attached.
//!
//! There is no real scanning logic and no persistence: each request is one self-contained
//! request/response cycle with at most a few outbound callback attempts.
//!
//! ## Request Flow
//!
//! A `POST /scan` request goes through these steps:
//!
//! 1. The `targetUrl` header is required; without it the request is rejected with `400` before
//!    the body is read.
//! 2. The body is read in full (bounded by `max_body_size`); an empty or unreadable body is a `400`.
//! 3. The [`scan::ScanPolicy`] picks a delay, the handler sleeps, then the policy draws a verdict
//!    independent of file content (1% infected by default).
//! 4. Infected files get `200 INFECTED: ...` and are never forwarded.
//! 5. Clean files are POSTed byte-for-byte to `targetUrl` by the [`callback::CallbackDispatcher`]
//!    with `scan-result: CLEAN` and the pass-through metadata headers. Timeouts, connection
//!    failures and non-200 answers are retried with exponential backoff (1s, 2s by default) up
//!    to three attempts in total.
//!
//! Every failure is mapped to a plain-text response by [`errors::Error`]; panics are caught by
//! a `CatchPanicLayer` and reported as `500`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use avmock::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     rustls::crypto::aws_lc_rs::default_provider()
//!         .install_default()
//!         .expect("Failed to install rustls crypto provider");
//!
//!     let args = avmock::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     avmock::telemetry::init_telemetry(config.log_format)?;
//!
//!     let app = Application::new(config)?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod callback;
pub mod config;
pub mod errors;
pub mod scan;
pub mod telemetry;

#[cfg(test)]
pub mod test_utils;

use std::any::Any;
use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};

use crate::callback::CallbackDispatcher;
use crate::scan::{RandomScanPolicy, ScanPolicy, ScanService};

pub use config::Config;

/// Application state shared across all request handlers.
///
/// Nothing in here is mutated after startup; requests never share mutable state.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .scanner(scanner)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub scanner: ScanService,
}

/// Build the scan service from configuration, with the given decision policy.
///
/// Requires a process-wide rustls crypto provider (installed by `main`).
pub fn build_scanner(config: &Config, policy: Arc<dyn ScanPolicy>) -> anyhow::Result<ScanService> {
    let dispatcher = CallbackDispatcher::new(&config.callback)?;
    Ok(ScanService::new(policy, dispatcher))
}

#[instrument(skip_all)]
pub fn build_router(state: AppState) -> Router {
    let enable_metrics = state.config.enable_metrics;

    let mut router = Router::new()
        .route("/scan", post(api::handlers::scan::scan_file))
        .route("/health", get(api::handlers::diagnostics::health))
        .route("/test", get(api::handlers::diagnostics::test_endpoint))
        .route("/debug", post(api::handlers::diagnostics::debug_request))
        .with_state(state);

    // Add Prometheus metrics if enabled
    if enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Turn a handler panic into the same `500` plain-text shape as any other internal error.
fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!("Handler panicked: {}", detail);
    (StatusCode::INTERNAL_SERVER_ERROR, format!("Internal server error: {detail}")).into_response()
}

pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application with the randomised scan policy from configuration
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let policy = Arc::new(RandomScanPolicy::new(&config.scan));
        Self::with_policy(config, policy)
    }

    /// Create a new application with an explicit scan policy
    pub fn with_policy(config: Config, policy: Arc<dyn ScanPolicy>) -> anyhow::Result<Self> {
        debug!("Starting avmock with configuration: {:#?}", config);

        let scanner = build_scanner(&config, policy)?;
        let state = AppState::builder().config(config.clone()).scanner(scanner).build();
        let router = build_router(state);

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "AVScan mock listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("AVScan mock stopped");
        Ok(())
    }
}
