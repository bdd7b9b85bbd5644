//! Layered settings.
//!
//! A `psyche.toml` file supplies the base configuration and environment
//! variables override individual fields:
//!
//! ```text
//! PSYCHE__INSTANCE__TICK_INTERVAL_MS=250
//! PSYCHE__MEMORY__TOTAL_CAPACITY=80000
//! PSYCHE__GENERAL__LOG_LEVEL=debug
//! ```
//!
//! Missing sections and fields fall back to `PsycheConfig` defaults, and
//! the merged result is validated before it is returned.

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use psyche_core::config::PsycheConfig;
use tracing::info;

use crate::error::HostResult;

/// Environment prefix used by [`load`].
pub const ENV_PREFIX: &str = "PSYCHE";

/// Load `path` (optional) layered with `PSYCHE__*` variables from the process environment.
///
/// # Errors
/// Returns an error if the file is unreadable, a value has the wrong type,
/// or the merged configuration fails validation.
pub fn load(path: Option<&Path>) -> HostResult<PsycheConfig> {
    load_layered(path, ENV_PREFIX, None)
}

/// Load `path` layered with `{env_prefix}__SECTION__FIELD` overrides.
///
/// `env` replaces the process environment as the override source, which
/// keeps tests independent of the real environment.
///
/// # Errors
/// As [`load`].
pub fn load_layered(
    path: Option<&Path>,
    env_prefix: &str,
    env: Option<config::Map<String, String>>,
) -> HostResult<PsycheConfig> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
    }
    let overrides = Environment::with_prefix(env_prefix)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .source(env);
    let merged = builder.add_source(overrides).build()?;
    let config: PsycheConfig = merged.try_deserialize()?;
    config.validate()?;
    info!(
        file = ?path,
        tick_interval_ms = config.instance.tick_interval_ms,
        total_capacity = config.memory.total_capacity,
        "Settings loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use psyche_core::error::PsycheError;

    fn env(pairs: &[(&str, &str)]) -> Option<config::Map<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    #[test]
    fn defaults_without_sources() {
        let config = load_layered(None, "PSYCHE_TEST", env(&[])).expect("defaults");
        assert_eq!(config.instance.tick_interval_ms, 100);
        assert_eq!(config.memory.reserved, 5_000);
    }

    #[test]
    fn file_then_environment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("psyche.toml");
        std::fs::write(
            &path,
            "[instance]\ntick_interval_ms = 250\n\n[memory]\ntotal_capacity = 9000\nreserved = 100\n",
        )
        .expect("write");

        let config = load_layered(
            Some(&path),
            "PSYCHE",
            env(&[("PSYCHE__MEMORY__TOTAL_CAPACITY", "12000")]),
        )
        .expect("layered");
        assert_eq!(config.instance.tick_interval_ms, 250);
        assert_eq!(config.memory.total_capacity, 12_000);
        assert_eq!(config.memory.reserved, 100);
    }

    #[test]
    fn invalid_merge_is_rejected() {
        let result = load_layered(
            None,
            "PSYCHE",
            env(&[
                ("PSYCHE__MEMORY__TOTAL_CAPACITY", "10"),
                ("PSYCHE__MEMORY__RESERVED", "20"),
            ]),
        );
        assert!(matches!(result, Err(HostError::Core(PsycheError::Config(_)))));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            load_layered(Some(&path), "PSYCHE", env(&[])),
            Err(HostError::Settings(_))
        ));
    }
}
