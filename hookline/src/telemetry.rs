//! Log output setup.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Errors from installing the log subscriber.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The filter directive could not be parsed.
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    /// A global subscriber is already installed.
    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Install a formatted log subscriber.
///
/// `RUST_LOG` takes precedence over `filter` when it is set.
///
/// ```rust,ignore
/// hookline::telemetry::init("info,hookline_std=debug")?;
/// ```
pub fn init(filter: &str) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(env_filter) => env_filter,
        Err(_) => EnvFilter::try_new(filter)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|e| TelemetryError::Install(e.to_string()))
}
