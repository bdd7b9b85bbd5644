//! Error types for the psyche core library.

use thiserror::Error;

use crate::types::{BlockId, Severity, ThreadId};

/// Top-level error type for all psyche operations.
#[derive(Error, Debug)]
pub enum PsycheError {
    /// A subsystem was used before `initialize` completed.
    #[error("{0} is not initialized")]
    NotInitialized(&'static str),

    /// The action name is not on the action whitelist.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// The instance is too unstable to accept unforced actions.
    #[error("Instance too unstable to execute actions (stability: {stability:.3})")]
    TooUnstable {
        /// Stability at the time of the attempt.
        stability: f32,
    },

    /// The ledger cannot fit the requested block.
    #[error("Memory capacity exceeded: requested {requested}, available {available}")]
    CapacityExceeded {
        /// Size of the rejected block.
        requested: u64,
        /// Units available at the time of the request.
        available: u64,
    },

    /// No block is addressable under the given id.
    #[error("Memory block not found: {0}")]
    MemoryNotFound(BlockId),

    /// The block's integrity is below the corruption threshold.
    #[error("Memory block {0} is corrupted")]
    MemoryCorrupted(BlockId),

    /// Protected blocks cannot be freed.
    #[error("Memory block {0} is protected")]
    BlockProtected(BlockId),

    /// No emotional thread with the given id.
    #[error("Emotional thread not found: {0}")]
    ThreadNotFound(ThreadId),

    /// No simulated process with the given pid.
    #[error("Process not found: {0}")]
    ProcessNotFound(u32),

    /// An action parameter was missing or malformed.
    #[error("Invalid parameter for {action}: {reason}")]
    InvalidParameter {
        /// Action being executed.
        action: String,
        /// What was wrong.
        reason: String,
    },

    /// The operation is not valid in the current lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Snapshot encoding or decoding failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PsycheError {
    /// How severe this error is when recorded in the instance error log.
    ///
    /// Critical errors always trigger an error cascade.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::MemoryCorrupted(_) => Severity::Critical,
            Self::CapacityExceeded { .. } | Self::BlockProtected(_) | Self::InvalidState(_) => {
                Severity::High
            }
            Self::MemoryNotFound(_)
            | Self::ThreadNotFound(_)
            | Self::ProcessNotFound(_)
            | Self::InvalidParameter { .. } => Severity::Medium,
            Self::NotInitialized(_)
            | Self::UnknownAction(_)
            | Self::TooUnstable { .. }
            | Self::Serialization(_)
            | Self::Config(_)
            | Self::Io(_) => Severity::Low,
        }
    }

    pub(crate) fn invalid_param(action: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            action: action.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, PsycheError>;
