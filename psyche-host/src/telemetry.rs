//! `tracing-subscriber` setup for host binaries.

use psyche_core::config::GeneralConfig;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{HostError, HostResult};

/// Build the filter: `RUST_LOG` wins, otherwise `general.log_level`.
///
/// # Errors
/// Returns `HostError::Telemetry` if the configured level is not a valid directive.
pub fn env_filter(level: &str) -> HostResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| HostError::Telemetry(format!("invalid log level '{level}': {e}")))
}

/// Install the global subscriber, as text or JSON lines.
///
/// # Errors
/// Returns `HostError::Telemetry` if the level is invalid or a global
/// subscriber is already installed.
pub fn init_tracing(general: &GeneralConfig) -> HostResult<()> {
    let filter = env_filter(&general.log_level)?;
    let result = if general.json_logs {
        fmt().json().with_env_filter(filter).with_current_span(true).try_init()
    } else {
        fmt().with_env_filter(filter).with_target(false).try_init()
    };
    result.map_err(|e| HostError::Telemetry(e.to_string()))
}
