//! Whole-instance snapshots for rollback and save/load.
//!
//! A snapshot is the only persistence mechanism the runtime has. It can be
//! written as JSON (debugging, save files), bincode (compact rollback
//! buffers) or MessagePack (host transport).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::emotional::EmotionalSnapshot;
use crate::error::{PsycheError, Result};
use crate::instance::state::{ErrorRecord, HealthFlags, InstanceStatus, PendingMaintenance};
use crate::ledger::LedgerSnapshot;
use crate::process::ProcessSnapshot;
use crate::types::{InstanceId, ResourceUsage, SimTime};

/// Controller-level state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreSnapshot {
    /// Lifecycle status.
    pub status: InstanceStatus,
    /// Instance stability.
    pub stability: f32,
    /// Instance corruption.
    pub corruption: f32,
    /// Simulated uptime (ms).
    pub uptime: u64,
    /// Rolling error log, oldest first.
    pub errors: Vec<ErrorRecord>,
    /// Controller clock.
    pub now: SimTime,
    /// Latched health conditions.
    pub health: HealthFlags,
    /// Maintenance window in progress.
    pub pending: Option<PendingMaintenance>,
}

/// Everything needed to rebuild an operationally identical instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    /// Instance the snapshot was taken from.
    pub id: InstanceId,
    /// Controller state.
    pub core: CoreSnapshot,
    /// Aggregate usage at capture time.
    pub resources: ResourceUsage,
    /// Process table.
    pub processes: ProcessSnapshot,
    /// Memory ledger.
    pub memory: LedgerSnapshot,
    /// Emotional engine.
    pub emotional: EmotionalSnapshot,
    /// Wall-clock capture time.
    pub timestamp: DateTime<Utc>,
}

/// Encoding for [`InstanceSnapshot::encode`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// bincode 1.x.
    Bincode,
    /// MessagePack.
    MessagePack,
}

impl InstanceSnapshot {
    /// Serialize the snapshot.
    ///
    /// # Errors
    ///
    /// `Serialization` if the encoder fails.
    pub fn encode(&self, format: SnapshotFormat) -> Result<Vec<u8>> {
        match format {
            SnapshotFormat::Json => serde_json::to_vec_pretty(self).map_err(ser_err),
            SnapshotFormat::Bincode => bincode::serialize(self).map_err(ser_err),
            SnapshotFormat::MessagePack => rmp_serde::to_vec(self).map_err(ser_err),
        }
    }

    /// Deserialize a snapshot.
    ///
    /// # Errors
    ///
    /// `Serialization` if the bytes are not a snapshot in `format`.
    pub fn decode(bytes: &[u8], format: SnapshotFormat) -> Result<Self> {
        match format {
            SnapshotFormat::Json => serde_json::from_slice(bytes).map_err(ser_err),
            SnapshotFormat::Bincode => bincode::deserialize(bytes).map_err(ser_err),
            SnapshotFormat::MessagePack => rmp_serde::from_slice(bytes).map_err(ser_err),
        }
    }
}

fn ser_err(e: impl std::fmt::Display) -> PsycheError {
    PsycheError::Serialization(e.to_string())
}
