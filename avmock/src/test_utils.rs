//! Test utilities for building the application against local collaborators.

use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;

use crate::config::{CallbackConfig, Config, ScanConfig};
use crate::scan::ScanPolicy;

/// Install the process-wide rustls crypto provider; repeated calls are no-ops.
pub fn install_crypto_provider() {
    // Err only means another test got there first
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Build a test server running `config` with a deterministic scan policy.
pub fn create_test_app(config: Config, policy: impl ScanPolicy + 'static) -> TestServer {
    install_crypto_provider();
    crate::Application::with_policy(config, Arc::new(policy))
        .expect("Failed to create application")
        .into_test_server()
}

/// Production-shaped config with the waiting taken out: no scan delay, millisecond backoffs.
pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        scan: ScanConfig {
            infection_probability: 0.01,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        },
        callback: CallbackConfig {
            timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(10),
            ..CallbackConfig::default()
        },
        ..Config::default()
    }
}
