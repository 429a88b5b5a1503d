//! Global tunables.
//!
//! Read once when a [`crate::SpatialIndex`] or [`crate::SpatialJoin`] is built.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpatialError};

/// Environment variable enabling the single-cell join fast path (`true`/`false`).
pub const SINGLE_CELL_OPTIMIZATION_VAR: &str = "ZJOIN_SINGLE_CELL_OPTIMIZATION";

/// Environment variable setting the surrogate id reservation block size.
pub const SOID_RESERVATION_BLOCK_SIZE_VAR: &str = "ZJOIN_SOID_RESERVATION_BLOCK_SIZE";

/// Tunables shared by indexes and joins.
///
/// Deserializes with per-field defaults, so it can be embedded in application
/// configuration files:
///
/// ```
/// let tunables: zjoin::Tunables = serde_json::from_str(r#"{"soid_reservation_block_size": 10}"#).unwrap();
/// assert!(tunables.single_cell_optimization);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tunables {
    /// Answer one-object joins whose object decomposes into a single cell by
    /// scanning the data index directly.
    /// Default: true
    pub single_cell_optimization: bool,

    /// Number of surrogate ids reserved from the index per block.
    /// Default: 1000
    pub soid_reservation_block_size: u64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            single_cell_optimization: true,
            soid_reservation_block_size: 1000,
        }
    }
}

impl Tunables {
    /// Defaults overridden by the `ZJOIN_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `ZJOIN_*` names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut tunables = Self::default();
        if let Some(value) = lookup(SINGLE_CELL_OPTIMIZATION_VAR) {
            tunables.single_cell_optimization = match value.trim() {
                "true" => true,
                "false" => false,
                other => {
                    return Err(SpatialError::Configuration(format!(
                        "{SINGLE_CELL_OPTIMIZATION_VAR} must be true or false, got {other:?}"
                    )));
                }
            };
        }
        if let Some(value) = lookup(SOID_RESERVATION_BLOCK_SIZE_VAR) {
            tunables.soid_reservation_block_size = value.trim().parse().map_err(|_| {
                SpatialError::Configuration(format!(
                    "{SOID_RESERVATION_BLOCK_SIZE_VAR} must be a positive integer, got {value:?}"
                ))
            })?;
        }
        tunables.validate()?;
        Ok(tunables)
    }

    /// Checks the values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.soid_reservation_block_size == 0 {
            return Err(SpatialError::Configuration(
                "soid reservation block size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Sets the single-cell join fast path.
    pub fn with_single_cell_optimization(mut self, enabled: bool) -> Self {
        self.single_cell_optimization = enabled;
        self
    }

    /// Sets the surrogate id reservation block size.
    pub fn with_soid_reservation_block_size(mut self, block_size: u64) -> Self {
        self.soid_reservation_block_size = block_size;
        self
    }
}
