//! # Pool Configuration
//!
//! Buffer sizing and worker tuning, loaded once at startup.
//!
//! Capacities follow a fixed formula so they stay tunable from outside:
//!
//! ```text
//! vertex_capacity = slack_bytes + vertex_bytes_per_instance * instance_estimate
//! index_capacity  = slack_bytes + index_bytes_per_instance  * instance_estimate
//! ```
//!
//! ## Example
//!
//! ```rust
//! use meshpool_rendering::PoolConfig;
//!
//! let config = PoolConfig::from_toml_str(r#"
//!     instance_estimate = 16
//!     slack_bytes = 1024
//! "#)?;
//! assert_eq!(config.vertex_capacity(), 1024 + 250_000 * 16);
//! # Ok::<(), meshpool_rendering::PoolError>(())
//! ```

use crate::error::{PoolError, PoolResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Fixed safety margin added to both buffers (35 MB).
pub const DEFAULT_SLACK_BYTES: u64 = 35_000_000;

/// Average vertex bytes per instance.
pub const DEFAULT_VERTEX_BYTES_PER_INSTANCE: u64 = 250_000;

/// Average index bytes per instance.
pub const DEFAULT_INDEX_BYTES_PER_INSTANCE: u64 = 30_000;

/// Grid side used when no estimate is given.
pub const DEFAULT_GRID: u64 = 32;

/// Largest buffer whose element offsets still fit in a `u32`.
pub const MAX_BUFFER_BYTES: u64 = (u32::MAX as u64 + 1) * 4;

/// Configuration for a [`GeometryPool`](crate::GeometryPool).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Expected number of live instances (`N` in the sizing formula).
    pub instance_estimate: u64,
    /// Fixed margin added to both capacities.
    pub slack_bytes: u64,
    /// Average vertex bytes per instance.
    pub vertex_bytes_per_instance: u64,
    /// Average index bytes per instance.
    pub index_bytes_per_instance: u64,
    /// Level-of-detail variants per instance, used by the instance-count warning.
    pub lod_levels: u64,
    /// Buffer fill ratio in `(0, 1]` at which a warning is logged.
    pub fill_warning_ratio: f64,
    /// How long the idle worker sleeps between checks.
    pub idle_sleep_ms: u64,
    /// Bound on producer-side waits; `None` waits forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_timeout_ms: Option<u64>,
    /// Reserve and upload the full-screen quad at the start of the vertex buffer.
    pub reserve_screen_quad: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            instance_estimate: DEFAULT_GRID * DEFAULT_GRID,
            slack_bytes: DEFAULT_SLACK_BYTES,
            vertex_bytes_per_instance: DEFAULT_VERTEX_BYTES_PER_INSTANCE,
            index_bytes_per_instance: DEFAULT_INDEX_BYTES_PER_INSTANCE,
            lod_levels: 3,
            fill_warning_ratio: 0.9,
            idle_sleep_ms: 1,
            sync_timeout_ms: None,
            reserve_screen_quad: true,
        }
    }
}

impl PoolConfig {
    /// Default config sized for a `grid x grid` scene.
    #[must_use]
    pub fn for_grid(grid: u64) -> Self {
        Self {
            instance_estimate: grid * grid,
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Config`] on a parse error or an invalid value.
    pub fn from_toml_str(source: &str) -> PoolResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| PoolError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Config`] if the file cannot be read or is invalid.
    pub fn from_toml_file(path: impl AsRef<Path>) -> PoolResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| PoolError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Renders the config as TOML, e.g. to persist values tuned from a
    /// [`PoolStats`](crate::PoolStats) report.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Config`] if serialization fails.
    pub fn to_toml_string(&self) -> PoolResult<String> {
        toml::to_string(self).map_err(|e| PoolError::Config(e.to_string()))
    }

    /// Vertex buffer capacity in bytes.
    #[must_use]
    pub const fn vertex_capacity(&self) -> u64 {
        self.slack_bytes
            .saturating_add(self.vertex_bytes_per_instance.saturating_mul(self.instance_estimate))
    }

    /// Index buffer capacity in bytes.
    #[must_use]
    pub const fn index_capacity(&self) -> u64 {
        self.slack_bytes
            .saturating_add(self.index_bytes_per_instance.saturating_mul(self.instance_estimate))
    }

    /// Live-instance count at which the pool starts warning.
    #[must_use]
    pub const fn instance_warning_threshold(&self) -> u64 {
        self.instance_estimate
            .saturating_mul(self.lod_levels)
            .saturating_sub(3)
    }

    /// Idle sleep as a [`Duration`].
    #[must_use]
    pub const fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    /// Producer-side wait bound as a [`Duration`].
    #[must_use]
    pub fn sync_timeout(&self) -> Option<Duration> {
        self.sync_timeout_ms.map(Duration::from_millis)
    }

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Config`] describing the first invalid field.
    pub fn validate(&self) -> PoolResult<()> {
        for (name, capacity) in [
            ("vertex", self.vertex_capacity()),
            ("index", self.index_capacity()),
        ] {
            if capacity == 0 {
                return Err(PoolError::Config(format!("{name} capacity is zero")));
            }
            if capacity > MAX_BUFFER_BYTES {
                return Err(PoolError::Config(format!(
                    "{name} capacity {capacity} exceeds {MAX_BUFFER_BYTES} bytes"
                )));
            }
        }

        if !(self.fill_warning_ratio > 0.0 && self.fill_warning_ratio <= 1.0) {
            return Err(PoolError::Config(format!(
                "fill_warning_ratio {} is outside (0, 1]",
                self.fill_warning_ratio
            )));
        }

        if self.idle_sleep_ms == 0 {
            return Err(PoolError::Config("idle_sleep_ms must be at least 1".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_formula() {
        let config = PoolConfig::for_grid(10);
        assert_eq!(config.instance_estimate, 100);
        assert_eq!(config.vertex_capacity(), 35_000_000 + 250_000 * 100);
        assert_eq!(config.index_capacity(), 35_000_000 + 30_000 * 100);
        assert_eq!(config.instance_warning_threshold(), 297);
    }

    #[test]
    fn test_defaults_validate() {
        assert!(PoolConfig::default().validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = PoolConfig::from_toml_str(
            r"
            instance_estimate = 4
            slack_bytes = 4096
            vertex_bytes_per_instance = 1024
            index_bytes_per_instance = 256
            sync_timeout_ms = 250
            reserve_screen_quad = false
            ",
        )
        .unwrap();

        assert_eq!(config.vertex_capacity(), 4096 + 4096);
        assert_eq!(config.index_capacity(), 4096 + 1024);
        assert_eq!(config.sync_timeout(), Some(Duration::from_millis(250)));
        assert!(!config.reserve_screen_quad);
        assert_eq!(config.lod_levels, 3);
    }

    #[test]
    fn test_tuned_config_survives_toml() {
        let tuned = PoolConfig {
            instance_estimate: 900,
            sync_timeout_ms: Some(50),
            ..PoolConfig::default()
        };
        let text = tuned.to_toml_string().unwrap();
        assert!(text.contains("instance_estimate = 900"));
        assert_eq!(PoolConfig::from_toml_str(&text).unwrap(), tuned);

        let untimed = PoolConfig::default().to_toml_string().unwrap();
        assert!(!untimed.contains("sync_timeout_ms"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = PoolConfig::from_toml_str("grid_size = 4").unwrap_err();
        assert!(matches!(err, PoolError::Config(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero = PoolConfig {
            slack_bytes: 0,
            instance_estimate: 0,
            ..PoolConfig::default()
        };
        assert!(zero.validate().is_err());

        let ratio = PoolConfig {
            fill_warning_ratio: 1.5,
            ..PoolConfig::default()
        };
        assert!(ratio.validate().is_err());

        let huge = PoolConfig {
            instance_estimate: u64::MAX,
            ..PoolConfig::default()
        };
        assert!(huge.validate().is_err());

        let spin = PoolConfig {
            idle_sleep_ms: 0,
            ..PoolConfig::default()
        };
        assert!(spin.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = PoolConfig::from_toml_file("/nonexistent/meshpool.toml").unwrap_err();
        assert!(matches!(err, PoolError::Config(_)));
    }
}
