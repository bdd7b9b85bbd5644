//! Host error types.

use psyche_core::error::PsycheError;
use psyche_core::types::InstanceId;
use thiserror::Error;

/// Errors raised by the host layer.
#[derive(Debug, Error)]
pub enum HostError {
    /// The engine rejected or failed an operation.
    #[error(transparent)]
    Core(#[from] PsycheError),

    /// Layered settings could not be loaded.
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// No instance with this id lives in the session.
    #[error("Unknown instance: {0}")]
    UnknownInstance(InstanceId),

    /// A console line could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The tracing subscriber could not be installed.
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

/// Convenience Result alias for host operations.
pub type HostResult<T> = std::result::Result<T, HostError>;
