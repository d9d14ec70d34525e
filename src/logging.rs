//! Logging and tracing setup for the provider.
//!
//! All logs are written to **stderr**; stdout belongs to the plugin host.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: full `tracing` filter (e.g. `p0_provider=debug`), takes priority
//! - `TF_LOG`: host log level (`TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR`, `JSON`)
//!
//! Without either, logging defaults to `info`.
//!
//! ```bash
//! # Show request-level logs
//! TF_LOG=DEBUG terraform apply
//!
//! # Debug the install orchestrator only
//! RUST_LOG=p0_provider::install=debug terraform apply
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable carrying the host's log level.
pub const TF_LOG_ENV_VAR: &str = "TF_LOG";

/// Map a `TF_LOG` value to a `tracing` level directive.
///
/// `JSON` is the host's structured trace mode and maps to `trace`.
pub fn tf_log_level(value: &str) -> Option<&'static str> {
    match value.trim().to_ascii_uppercase().as_str() {
        "TRACE" | "JSON" => Some("trace"),
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARN" => Some("warn"),
        "ERROR" => Some("error"),
        _ => None,
    }
}

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var(TF_LOG_ENV_VAR)
            .ok()
            .and_then(|v| tf_log_level(&v))
            .unwrap_or(default_level);
        EnvFilter::new(level)
    })
}

fn try_init_with(default_level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
}

/// Initialize the default logging subscriber.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging, falling back to `default_level` when neither
/// `RUST_LOG` nor `TF_LOG` is set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    if let Err(e) = try_init_with(default_level) {
        panic!("failed to initialize logging: {}", e);
    }
}

/// Try to initialize logging, returning false if already initialized.
///
/// Unlike [`init_logging`], this function does not panic if a subscriber
/// has already been set, which makes it safe to call from tests.
pub fn try_init_logging() -> bool {
    try_init_with("info").is_ok()
}
