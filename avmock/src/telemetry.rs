//! Telemetry initialization: `tracing` with a console fmt subscriber.
//!
//! Verbosity follows `RUST_LOG` (default `info`), e.g.
//!
//! ```bash
//! RUST_LOG=avmock=debug,tower_http=info avmock -f config.yaml
//! ```
//!
//! Output is human-readable text by default; set `log_format: json` in the config file (or
//! `AVMOCK_LOG_FORMAT=json`) for one JSON object per line.
//!
//! Only the binary calls [`init_telemetry`]. Library code just emits events, so tests can
//! install their own subscriber (`test-log`) or none at all.

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LogFormat;

/// Initialize the global tracing subscriber.
///
/// Fails if a global subscriber has already been installed.
pub fn init_telemetry(format: LogFormat) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
    }

    info!(format = ?format, "Telemetry initialized");
    Ok(())
}
