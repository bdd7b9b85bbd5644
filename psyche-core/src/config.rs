//! Configuration for the psyche runtime.
//!
//! Maps directly to `psyche.toml`. Every field has a serde default, so a
//! partial file (or an empty one) yields a runnable configuration.

use serde::{Deserialize, Serialize};

use crate::error::{PsycheError, Result};
use crate::types::{DAY_MS, HOUR_MS, MINUTE_MS, SECOND_MS};

/// Top-level psyche configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PsycheConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Instance controller tuning.
    #[serde(default)]
    pub instance: InstanceConfig,
    /// Emotional engine tuning.
    #[serde(default)]
    pub emotional: EmotionalConfig,
    /// Memory ledger capacity and eviction tuning.
    #[serde(default)]
    pub memory: LedgerConfig,
    /// Telemetry and tick budget monitoring.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl PsycheConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `PsycheError::Config` if the TOML is invalid or fails validation.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| PsycheError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    /// Returns `PsycheError::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.instance.tick_interval_ms == 0 {
            return Err(PsycheError::Config("instance.tick_interval_ms must be > 0".into()));
        }
        if self.memory.reserved > self.memory.total_capacity {
            return Err(PsycheError::Config(format!(
                "memory.reserved ({}) exceeds memory.total_capacity ({})",
                self.memory.reserved, self.memory.total_capacity
            )));
        }
        let unit_fields = [
            ("emotional.thread_spawn_threshold", self.emotional.thread_spawn_threshold),
            ("emotional.immediate_update_threshold", self.emotional.immediate_update_threshold),
            ("emotional.default_input_intensity", self.emotional.default_input_intensity),
            ("emotional.thread_base_efficiency", self.emotional.thread_base_efficiency),
            ("emotional.intervention_acceptance", self.emotional.intervention_acceptance),
            ("instance.initial_stability", self.instance.initial_stability),
        ];
        for (name, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(PsycheError::Config(format!("{name} must be within [0, 1], got {value}")));
            }
        }
        if self.emotional.immediate_update_threshold < self.emotional.thread_spawn_threshold {
            return Err(PsycheError::Config(
                "emotional.immediate_update_threshold must not be below thread_spawn_threshold".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text.
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Instance controller tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Period of the external tick scheduler (ms).
    #[serde(default = "default_100_u64")]
    pub tick_interval_ms: u64,
    /// CPU ceiling used for clamping aggregated usage (percent).
    #[serde(default = "default_100_f32")]
    pub max_cpu: f32,
    /// Memory ceiling used for clamping aggregated usage (units).
    #[serde(default = "default_max_memory")]
    pub max_memory: u64,
    /// Simulated thread ceiling.
    #[serde(default = "default_64")]
    pub max_threads: u32,
    /// Stability the instance starts with.
    #[serde(default = "default_1_0")]
    pub initial_stability: f32,
    /// Age after which errors leave the rolling log (ms).
    #[serde(default = "default_error_ttl")]
    pub error_ttl_ms: u64,
    /// Hard cap on retained error records.
    #[serde(default = "default_100_usize")]
    pub max_errors: usize,
    /// Simulated duration of `reboot` (ms).
    #[serde(default = "default_reboot_delay")]
    pub reboot_delay_ms: u64,
    /// Simulated duration of `stabilize` (ms).
    #[serde(default = "default_stabilize_delay")]
    pub stabilize_delay_ms: u64,
    /// Simulated duration of `defragment` (ms).
    #[serde(default = "default_defragment_delay")]
    pub defragment_delay_ms: u64,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            max_cpu: 100.0,
            max_memory: default_max_memory(),
            max_threads: 64,
            initial_stability: 1.0,
            error_ttl_ms: default_error_ttl(),
            max_errors: 100,
            reboot_delay_ms: default_reboot_delay(),
            stabilize_delay_ms: default_stabilize_delay(),
            defragment_delay_ms: default_defragment_delay(),
        }
    }
}

/// Emotional engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionalConfig {
    /// Fraction of the gap to baseline closed per simulated second.
    #[serde(default = "default_0_05")]
    pub decay_rate_per_sec: f32,
    /// Inputs strictly above this intensity spawn a processing thread.
    #[serde(default = "default_0_6")]
    pub thread_spawn_threshold: f32,
    /// Inputs strictly above this intensity also update state immediately.
    #[serde(default = "default_0_8")]
    pub immediate_update_threshold: f32,
    /// Intensity assumed for inputs that do not carry one.
    #[serde(default = "default_0_5")]
    pub default_input_intensity: f32,
    /// Lifetime of a queued input (ms).
    #[serde(default = "default_input_duration")]
    pub default_input_duration_ms: u64,
    /// Weight of one input on the state vector.
    #[serde(default = "default_0_3")]
    pub input_weight: f32,
    /// Processing efficiency of a newly spawned thread.
    #[serde(default = "default_0_8")]
    pub thread_base_efficiency: f32,
    /// Fraction of keyword requirements an intervention must satisfy.
    #[serde(default = "default_0_7")]
    pub intervention_acceptance: f32,
    /// Maximum retained state-history snapshots.
    #[serde(default = "default_100_usize")]
    pub history_limit: usize,
    /// Minimum time between two activations of the same trigger (ms).
    #[serde(default = "default_trigger_refractory")]
    pub trigger_refractory_ms: u64,
    /// Per-emotion baseline overrides applied on initialization.
    #[serde(default)]
    pub baseline: Vec<EmotionOverride>,
}

impl Default for EmotionalConfig {
    fn default() -> Self {
        Self {
            decay_rate_per_sec: 0.05,
            thread_spawn_threshold: 0.6,
            immediate_update_threshold: 0.8,
            default_input_intensity: 0.5,
            default_input_duration_ms: default_input_duration(),
            input_weight: 0.3,
            thread_base_efficiency: 0.8,
            intervention_acceptance: 0.7,
            history_limit: 100,
            trigger_refractory_ms: default_trigger_refractory(),
            baseline: Vec::new(),
        }
    }
}

/// A single baseline override, e.g. `{ name = "grief", value = 0.4 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionOverride {
    /// Emotion or axis name.
    pub name: String,
    /// Baseline intensity in [0, 1].
    pub value: f32,
}

/// Memory ledger capacity, retention and heuristic tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Total simulated memory units.
    #[serde(default = "default_total_capacity")]
    pub total_capacity: u64,
    /// Below this many available units the ledger forces garbage collection.
    #[serde(default = "default_reserved")]
    pub reserved: u64,
    /// Retention period of the short-term pool (ms).
    #[serde(default = "default_short_term_retention")]
    pub short_term_retention_ms: u64,
    /// Retention period of the long-term pool (ms).
    #[serde(default = "default_long_term_retention")]
    pub long_term_retention_ms: u64,
    /// Retention period of the suppressed pool (ms).
    #[serde(default = "default_suppressed_retention")]
    pub suppressed_retention_ms: u64,
    /// Blocks older than this are compressed once (ms).
    #[serde(default = "default_compress_after")]
    pub compress_after_ms: u64,
    /// Interval between maintenance passes (ms).
    #[serde(default = "default_maintenance_interval")]
    pub maintenance_interval_ms: u64,
    /// Interval between leak scans (ms).
    #[serde(default = "default_leak_scan_interval")]
    pub leak_scan_interval_ms: u64,
    /// Short-term blocks accessed at least this often are promoted to long-term.
    #[serde(default = "default_5")]
    pub promotion_access_count: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            total_capacity: default_total_capacity(),
            reserved: default_reserved(),
            short_term_retention_ms: default_short_term_retention(),
            long_term_retention_ms: default_long_term_retention(),
            suppressed_retention_ms: default_suppressed_retention(),
            compress_after_ms: default_compress_after(),
            maintenance_interval_ms: default_maintenance_interval(),
            leak_scan_interval_ms: default_leak_scan_interval(),
            promotion_access_count: 5,
        }
    }
}

/// Telemetry and observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Wall-clock budget for one tick (ms); slower ticks are logged.
    #[serde(default = "default_tick_budget")]
    pub tick_budget_ms: f64,
    /// Prefix used when exporting counters in Prometheus format.
    #[serde(default = "default_metrics_prefix")]
    pub metrics_prefix: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            tick_budget_ms: 2.0,
            metrics_prefix: default_metrics_prefix(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_log_level() -> String { "info".to_string() }
fn default_metrics_prefix() -> String { "psyche".to_string() }
fn default_0_05() -> f32 { 0.05 }
fn default_0_3() -> f32 { 0.3 }
fn default_0_5() -> f32 { 0.5 }
fn default_0_6() -> f32 { 0.6 }
fn default_0_7() -> f32 { 0.7 }
fn default_0_8() -> f32 { 0.8 }
fn default_1_0() -> f32 { 1.0 }
fn default_100_f32() -> f32 { 100.0 }
fn default_tick_budget() -> f64 { 2.0 }
fn default_5() -> u32 { 5 }
fn default_64() -> u32 { 64 }
fn default_100_u64() -> u64 { 100 }
fn default_100_usize() -> usize { 100 }
fn default_max_memory() -> u64 { 60_000 }
fn default_total_capacity() -> u64 { 50_000 }
fn default_reserved() -> u64 { 5_000 }
fn default_error_ttl() -> u64 { 60 * SECOND_MS }
fn default_reboot_delay() -> u64 { 2 * SECOND_MS }
fn default_stabilize_delay() -> u64 { SECOND_MS }
fn default_defragment_delay() -> u64 { 1_500 }
fn default_input_duration() -> u64 { 5 * SECOND_MS }
fn default_trigger_refractory() -> u64 { 5 * SECOND_MS }
fn default_short_term_retention() -> u64 { 6 * HOUR_MS }
fn default_long_term_retention() -> u64 { 30 * DAY_MS }
fn default_suppressed_retention() -> u64 { 7 * DAY_MS }
fn default_compress_after() -> u64 { HOUR_MS }
fn default_maintenance_interval() -> u64 { MINUTE_MS }
fn default_leak_scan_interval() -> u64 { 30 * SECOND_MS }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = PsycheConfig::from_toml("").expect("empty config");
        assert_eq!(config.instance.tick_interval_ms, 100);
        assert_eq!(config.memory.total_capacity, 50_000);
        assert!((config.emotional.thread_spawn_threshold - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let toml = r#"
            [instance]
            tick_interval_ms = 250

            [emotional]
            decay_rate_per_sec = 0.1
            baseline = [{ name = "grief", value = 0.4 }]
        "#;
        let config = PsycheConfig::from_toml(toml).expect("valid config");
        assert_eq!(config.instance.tick_interval_ms, 250);
        assert_eq!(config.instance.max_threads, 64);
        assert_eq!(config.emotional.baseline.len(), 1);
        assert_eq!(config.emotional.baseline[0].name, "grief");
    }

    #[test]
    fn reserved_above_total_is_rejected() {
        let toml = r#"
            [memory]
            total_capacity = 100
            reserved = 200
        "#;
        assert!(matches!(PsycheConfig::from_toml(toml), Err(PsycheError::Config(_))));
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let toml = "[instance]\ntick_interval_ms = 0\n";
        assert!(PsycheConfig::from_toml(toml).is_err());
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("psyche.toml");
        std::fs::write(&path, "[memory]\ntotal_capacity = 1234\nreserved = 10\n").expect("write");
        let config = PsycheConfig::from_file(&path).expect("load");
        assert_eq!(config.memory.total_capacity, 1234);
    }
}
