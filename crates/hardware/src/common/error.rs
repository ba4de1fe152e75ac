//! Configuration and loading errors.
//!
//! Runtime conditions inside the controller (full pools, timing not ready,
//! busy interconnect) are not errors: they are reported as `false` and retried
//! on a later cycle. Broken modeling invariants panic. What remains are the
//! failures that can happen before the first cycle runs:
//! 1. **Configuration:** Geometry or policy values the model cannot represent.
//! 2. **Loading:** I/O and JSON failures while reading a configuration file.

use std::path::PathBuf;

use thiserror::Error;

/// A configuration value that the controller model cannot be built from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A count or size that must be a power of two is not.
    #[error("{name} must be a power of two (got {value})")]
    NotPowerOfTwo {
        /// Name of the offending parameter.
        name: &'static str,
        /// The rejected value.
        value: u64,
    },

    /// A parameter that must be strictly positive is zero.
    #[error("{name} must be greater than zero")]
    Zero {
        /// Name of the offending parameter.
        name: &'static str,
    },

    /// The remap domain size is not a multiple of the fast-region ratio.
    #[error("asym.mat_group ({group}) must be a multiple of asym.mat_ratio ({ratio})")]
    GroupNotMultipleOfRatio {
        /// Configured `mat_group`.
        group: u64,
        /// Configured `mat_ratio`.
        ratio: u64,
    },

    /// A cache size is not divisible by the 4-way associativity.
    #[error("{name} ({value}) must be a multiple of {ways}")]
    NotMultipleOfWays {
        /// Name of the offending parameter.
        name: &'static str,
        /// The rejected value.
        value: u64,
        /// Required associativity.
        ways: u64,
    },

    /// Installed RAM is smaller than one rank per channel.
    #[error("ram_size {ram_size} is smaller than {channels} channel(s) of {rank_size}-byte ranks")]
    RamTooSmall {
        /// Configured RAM size in bytes.
        ram_size: u64,
        /// Configured channel count.
        channels: u64,
        /// Rank size of the selected device.
        rank_size: u64,
    },

    /// Rows per bank do not divide into remap domains.
    #[error("rows per bank ({rows}) is smaller than asym.mat_group ({group})")]
    GroupLargerThanBank {
        /// Rows per bank derived from the device.
        rows: u64,
        /// Configured `mat_group`.
        group: u64,
    },

    /// A fast-region timing scaler lies outside `1..=100`.
    #[error("{name} must lie in 1..=100 (got {value})")]
    PercentOutOfRange {
        /// Name of the offending scaler.
        name: &'static str,
        /// The rejected value.
        value: u32,
    },

    /// A timing parameter combination produced a negative constraint.
    #[error("timing parameter {name} underflows with the selected device table")]
    TimingUnderflow {
        /// Name of the derived constraint.
        name: &'static str,
    },
}

/// Top-level error for building a controller from external input.
#[derive(Debug, Error)]
pub enum DramError {
    /// The configuration was read but is not usable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The configuration text is not valid JSON for [`crate::config::Config`].
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Returns `Ok(())` when `value` is a non-zero power of two.
pub(crate) fn require_pow2(name: &'static str, value: u64) -> Result<(), ConfigError> {
    if value.is_power_of_two() {
        Ok(())
    } else {
        Err(ConfigError::NotPowerOfTwo { name, value })
    }
}
