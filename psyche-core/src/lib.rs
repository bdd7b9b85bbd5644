//! # Psyche Core Library
//!
//! A character's mind as a debuggable, tick-driven runtime. Each simulated
//! character owns an [`InstanceController`] composed of:
//!
//! - **Emotional engine**: a decaying emotion vector, regulation strategies,
//!   suppression mechanisms, triggers and processing threads the player
//!   debugs through interventions
//! - **Memory ledger**: pooled, capacity-accounted memory blocks with
//!   emotional indexing, leak detection and eviction under pressure
//! - **Process manager**: simulated subsystem processes with CPU, memory
//!   and priority
//!
//! The controller folds their resource usage and events into instance-wide
//! stability and corruption, routes player actions, cascades failures and
//! captures snapshots for rollback.
//!
//! ## Determinism
//!
//! Nothing in this crate reads a wall clock for simulation purposes. Time
//! only advances through [`InstanceController::tick`], so any sequence of
//! ticks and actions replays identically.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod config;
pub mod emotional;
pub mod error;
pub mod instance;
pub mod ledger;
pub mod log;
pub mod metrics;
pub mod narrative;
pub mod process;
pub mod snapshot;
pub mod types;

pub use config::PsycheConfig;
pub use emotional::{EmotionalEngine, InputRequest};
pub use error::{PsycheError, Result};
pub use instance::{ActionOutcome, ActionParams, InstanceController, InstanceStatus, TickReport};
pub use ledger::{MemoryData, MemoryLedger, PoolKind};
pub use snapshot::{InstanceSnapshot, SnapshotFormat};
pub use types::*;
