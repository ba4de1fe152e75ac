//! Configuration system for the DRAM controller model.
//!
//! This module defines all configuration structures and enums used to parameterize
//! the controller. It provides:
//! 1. **Defaults:** Baseline controller, detector, and remapping constants.
//! 2. **Structures:** Hierarchical config for memory, controller policy, and asymmetric remapping.
//! 3. **Device Tables:** DDR3 speed-grade presets and the raw timing/current table they expand to.
//!
//! Configuration is supplied as JSON (`Config::from_json`, `Config::from_json_file`) or
//! built with `Config::default()`. Derived geometry and timing live in
//! [`DramConfig`](crate::dram::DramConfig).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::error::{ConfigError, DramError, require_pow2};

/// Default configuration constants for the controller.
///
/// These values define the baseline configuration when a field is not
/// explicitly present in the JSON input.
mod defaults {
    /// Total installed RAM (4 GiB).
    pub const RAM_SIZE: u64 = 4 * 1024 * 1024 * 1024;

    /// Number of independent channels.
    pub const CHANNELS: u64 = 1;

    /// Host (core) clock frequency driving `ControllerHub::cycle` (2 GHz).
    pub const HOST_FREQ_HZ: u64 = 2_000_000_000;

    /// Maximum consecutive row-buffer hits before a row is forced closed.
    pub const MAX_ROW_HITS: u32 = 4;

    /// Idle DRAM cycles before an unused open row is precharged.
    pub const MAX_ROW_IDLE: u64 = 0;

    /// Capacity of the hub's request pool.
    pub const REQUEST_QUEUE_SIZE: usize = 64;

    /// Capacity of each channel's transaction pool.
    pub const TRANSACTION_QUEUE_SIZE: usize = 32;

    /// Capacity of each channel's command pool.
    pub const COMMAND_QUEUE_SIZE: usize = 32;

    /// Outstanding remap-table lookups allowed at once.
    pub const MAX_PENDING_LOOKUPS: usize = 8;

    /// Detector count at which a slow-place row is declared hot.
    pub const DET_THRESHOLD: u32 = 4;

    /// Hotness detector entries (4-way).
    pub const DET_CACHE_SIZE: u64 = 1024;

    /// Map cache entries (4-way).
    pub const MAP_CACHE_SIZE: u64 = 256 * 1024;

    /// One place in every `MAT_RATIO` is fast.
    pub const MAT_RATIO: u32 = 1;

    /// Rows per remap domain.
    pub const MAT_GROUP: u32 = 1;

    /// Fast-region timing scale (percent of the slow value).
    pub const PERCENT: u32 = 100;
}

/// DDR3 speed grades with built-in timing and current tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum DevicePreset {
    /// DDR3-1066 (tCK 1.875 ns, 7-7-7).
    #[serde(rename = "DDR3-1066", alias = "Ddr3_1066")]
    Ddr3_1066,
    /// DDR3-1333 (tCK 1.5 ns, 9-9-9).
    #[default]
    #[serde(rename = "DDR3-1333", alias = "Ddr3_1333")]
    Ddr3_1333,
    /// DDR3-1600 (tCK 1.25 ns, 11-11-11).
    #[serde(rename = "DDR3-1600", alias = "Ddr3_1600")]
    Ddr3_1600,
}

impl DevicePreset {
    /// Returns the raw device table for this speed grade.
    ///
    /// All presets describe a 2 GiB rank of eight x8 devices with eight banks.
    pub fn params(self) -> DeviceParams {
        let base = DeviceParams::default();
        match self {
            Self::Ddr3_1066 => DeviceParams {
                tck_ps: 1875,
                t_cl: 7,
                t_cwl: 6,
                t_ras: 20,
                t_rcd: 7,
                t_rp: 7,
                t_faw: 20,
                t_rtp: 4,
                t_wtr: 4,
                t_wr: 8,
                t_rfc: 86,
                t_refi: 4160,
                t_cke: 3,
                t_xp: 4,
                idd0: 80,
                idd3n: 40,
                idd4r: 150,
                idd4w: 155,
                idd5: 190,
                ..base
            },
            Self::Ddr3_1333 => base,
            Self::Ddr3_1600 => DeviceParams {
                tck_ps: 1250,
                t_cl: 11,
                t_cwl: 8,
                t_ras: 28,
                t_rcd: 11,
                t_rp: 11,
                t_rrd: 5,
                t_faw: 24,
                t_rtp: 6,
                t_wtr: 6,
                t_wr: 12,
                t_rfc: 128,
                t_refi: 6240,
                t_xp: 5,
                idd0: 95,
                idd3n: 45,
                idd4r: 190,
                idd4w: 195,
                idd5: 210,
                ..base
            },
        }
    }
}

/// Raw device table: organization, JEDEC timings in DRAM cycles, and
/// IDD currents for the linear energy model.
///
/// The `Default` value is the DDR3-1333 table; fields missing from JSON take
/// their values from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct DeviceParams {
    /// Banks per rank.
    pub banks: u32,
    /// Devices (chips) per rank.
    pub devices: u32,
    /// Rank capacity in MiB.
    pub rank_size_mib: u64,
    /// Clock period in picoseconds.
    pub tck_ps: u64,
    pub t_cmd: u64,
    pub t_cl: u64,
    pub t_cwl: u64,
    pub t_bl: u64,
    pub t_ras: u64,
    pub t_rcd: u64,
    pub t_rp: u64,
    pub t_rrd: u64,
    pub t_ccd: u64,
    pub t_faw: u64,
    pub t_rtp: u64,
    pub t_wtr: u64,
    pub t_wr: u64,
    pub t_rtrs: u64,
    pub t_rfc: u64,
    pub t_refi: u64,
    pub t_cke: u64,
    pub t_xp: u64,
    /// Supply voltage in millivolts.
    pub vdd_mv: u64,
    /// Currents in milliamps, per device.
    pub idd0: u64,
    pub idd2p: u64,
    pub idd2n: u64,
    pub idd3n: u64,
    pub idd4r: u64,
    pub idd4w: u64,
    pub idd5: u64,
    /// Channel bus energies in picojoules per command.
    pub command_pj: u64,
    pub row_pj: u64,
    pub column_pj: u64,
    pub data_pj: u64,
    /// Clock tree energy in picojoules per DRAM cycle.
    pub clock_pj: u64,
}

impl Default for DeviceParams {
    fn default() -> Self {
        Self {
            banks: 8,
            devices: 8,
            rank_size_mib: 2048,
            tck_ps: 1500,
            t_cmd: 1,
            t_cl: 9,
            t_cwl: 7,
            t_bl: 4,
            t_ras: 24,
            t_rcd: 9,
            t_rp: 9,
            t_rrd: 4,
            t_ccd: 4,
            t_faw: 20,
            t_rtp: 5,
            t_wtr: 5,
            t_wr: 10,
            t_rtrs: 1,
            t_rfc: 107,
            t_refi: 5200,
            t_cke: 4,
            t_xp: 4,
            vdd_mv: 1500,
            idd0: 90,
            idd2p: 12,
            idd2n: 35,
            idd3n: 42,
            idd4r: 170,
            idd4w: 175,
            idd5: 200,
            command_pj: 40,
            row_pj: 60,
            column_pj: 30,
            data_pj: 500,
            clock_pj: 20,
        }
    }
}

/// Victim selection policy used when promoting a hot row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum VictimPolicy {
    /// Global round-robin counter stepping by `mat_ratio` modulo `mat_group`.
    #[default]
    #[serde(alias = "serial")]
    Serial,
    /// Fast place whose occupant was migrated least recently.
    #[serde(alias = "order")]
    Order,
    /// Pseudo-random fast place, never the same as the previous victim.
    #[serde(alias = "last")]
    Last,
}

/// Root configuration structure containing all controller settings.
///
/// # Examples
///
/// ```
/// use asymdram_core::config::{Config, VictimPolicy};
///
/// let json = r#"{
///     "memory": { "device": "DDR3-1600", "ram_size": 8589934592, "channels": 2 },
///     "asym": { "mat_ratio": 2, "mat_group": 4, "victim_policy": "Order" }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.memory.channels, 2);
/// assert_eq!(config.controller.max_row_hits, 4);
/// assert_eq!(config.asym.victim_policy, VictimPolicy::Order);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Installed memory and device selection
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Scheduling policy and queue capacities
    #[serde(default)]
    pub controller: ControllerConfig,
    /// Hot-row detection and remapping
    #[serde(default)]
    pub asym: AsymConfig,
}

impl Config {
    /// Parses a configuration from JSON text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`DramError::Json`] for malformed input and [`DramError::Config`]
    /// if a value fails validation.
    pub fn from_json(text: &str) -> Result<Self, DramError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`DramError::Io`] if the file cannot be read, otherwise as
    /// [`Config::from_json`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DramError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| DramError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Returns the device table in effect: the explicit override, or the preset.
    pub fn device(&self) -> DeviceParams {
        self.memory
            .device_params
            .unwrap_or_else(|| self.memory.device.params())
    }

    /// Checks every value that does not depend on the device geometry.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.memory.validate()?;
        self.controller.validate()?;
        self.asym.validate()
    }
}

/// Installed memory and device selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MemoryConfig {
    /// DDR3 speed grade
    #[serde(default)]
    pub device: DevicePreset,

    /// Full device table overriding `device`
    #[serde(default)]
    pub device_params: Option<DeviceParams>,

    /// Installed RAM in bytes (power of two)
    #[serde(default = "MemoryConfig::default_ram_size")]
    pub ram_size: u64,

    /// Channel count (power of two)
    #[serde(default = "MemoryConfig::default_channels")]
    pub channels: u64,

    /// Host clock frequency in Hz
    #[serde(default = "MemoryConfig::default_host_freq_hz")]
    pub host_freq_hz: u64,
}

impl MemoryConfig {
    fn default_ram_size() -> u64 {
        defaults::RAM_SIZE
    }

    fn default_channels() -> u64 {
        defaults::CHANNELS
    }

    fn default_host_freq_hz() -> u64 {
        defaults::HOST_FREQ_HZ
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require_pow2("memory.ram_size", self.ram_size)?;
        require_pow2("memory.channels", self.channels)?;
        if self.host_freq_hz == 0 {
            return Err(ConfigError::Zero {
                name: "memory.host_freq_hz",
            });
        }
        Ok(())
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            device: DevicePreset::default(),
            device_params: None,
            ram_size: defaults::RAM_SIZE,
            channels: defaults::CHANNELS,
            host_freq_hz: defaults::HOST_FREQ_HZ,
        }
    }
}

/// Row-buffer policy and queue capacities.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ControllerConfig {
    /// Consecutive hits before an open row is forced closed
    #[serde(default = "ControllerConfig::default_max_row_hits")]
    pub max_row_hits: u32,

    /// Idle DRAM cycles before an unused open row is precharged
    #[serde(default = "ControllerConfig::default_max_row_idle")]
    pub max_row_idle: u64,

    /// Hub request pool capacity
    #[serde(default = "ControllerConfig::default_request_queue_size")]
    pub request_queue_size: usize,

    /// Per-channel transaction pool capacity
    #[serde(default = "ControllerConfig::default_transaction_queue_size")]
    pub transaction_queue_size: usize,

    /// Per-channel command pool capacity
    #[serde(default = "ControllerConfig::default_command_queue_size")]
    pub command_queue_size: usize,

    /// Remap-table lookups in flight at once
    #[serde(default = "ControllerConfig::default_max_pending_lookups")]
    pub max_pending_lookups: usize,
}

impl ControllerConfig {
    fn default_max_row_hits() -> u32 {
        defaults::MAX_ROW_HITS
    }

    fn default_max_row_idle() -> u64 {
        defaults::MAX_ROW_IDLE
    }

    fn default_request_queue_size() -> usize {
        defaults::REQUEST_QUEUE_SIZE
    }

    fn default_transaction_queue_size() -> usize {
        defaults::TRANSACTION_QUEUE_SIZE
    }

    fn default_command_queue_size() -> usize {
        defaults::COMMAND_QUEUE_SIZE
    }

    fn default_max_pending_lookups() -> usize {
        defaults::MAX_PENDING_LOOKUPS
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            ("controller.max_row_hits", u64::from(self.max_row_hits)),
            ("controller.request_queue_size", self.request_queue_size as u64),
            (
                "controller.transaction_queue_size",
                self.transaction_queue_size as u64,
            ),
            ("controller.command_queue_size", self.command_queue_size as u64),
            (
                "controller.max_pending_lookups",
                self.max_pending_lookups as u64,
            ),
        ];
        match sizes.iter().find(|(_, value)| *value == 0) {
            Some(&(name, _)) => Err(ConfigError::Zero { name }),
            None => Ok(()),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_row_hits: defaults::MAX_ROW_HITS,
            max_row_idle: defaults::MAX_ROW_IDLE,
            request_queue_size: defaults::REQUEST_QUEUE_SIZE,
            transaction_queue_size: defaults::TRANSACTION_QUEUE_SIZE,
            command_queue_size: defaults::COMMAND_QUEUE_SIZE,
            max_pending_lookups: defaults::MAX_PENDING_LOOKUPS,
        }
    }
}

/// Hot-row detection, remap-table caching, and fast-region timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AsymConfig {
    /// Detector count at which a slow-place row is declared hot
    #[serde(default = "AsymConfig::default_det_threshold")]
    pub det_threshold: u32,

    /// Detector entries (multiple of 4)
    #[serde(default = "AsymConfig::default_det_cache_size")]
    pub det_cache_size: u64,

    /// Map cache entries (multiple of 4)
    #[serde(default = "AsymConfig::default_map_cache_size")]
    pub map_cache_size: u64,

    /// Remap table held on chip: translation never misses
    #[serde(default)]
    pub map_on_chip: bool,

    /// One place in every `mat_ratio` is fast (power of two)
    #[serde(default = "AsymConfig::default_mat_ratio")]
    pub mat_ratio: u32,

    /// Rows per remap domain (power of two, multiple of `mat_ratio`)
    #[serde(default = "AsymConfig::default_mat_group")]
    pub mat_group: u32,

    /// Fold cluster bits into the index
    #[serde(default)]
    pub mat_hash: bool,

    /// Victim selection on promotion
    #[serde(default)]
    pub victim_policy: VictimPolicy,

    /// Fast tRCD as a percentage of the slow value
    #[serde(default = "AsymConfig::default_percent")]
    pub rcd_percent: u32,

    /// Fast tRAS as a percentage of the slow value
    #[serde(default = "AsymConfig::default_percent")]
    pub ras_percent: u32,

    /// Fast tRP as a percentage of the slow value
    #[serde(default = "AsymConfig::default_percent")]
    pub rp_percent: u32,

    /// Fast tWR as a percentage of the slow value
    #[serde(default = "AsymConfig::default_percent")]
    pub wr_percent: u32,

    /// Fast tCL/tCWL as a percentage of the slow value
    #[serde(default = "AsymConfig::default_percent")]
    pub cl_percent: u32,

    /// Migration latency as a percentage of 2 × (tRAS + tRP)
    #[serde(default = "AsymConfig::default_percent")]
    pub mig_percent: u32,
}

impl AsymConfig {
    fn default_det_threshold() -> u32 {
        defaults::DET_THRESHOLD
    }

    fn default_det_cache_size() -> u64 {
        defaults::DET_CACHE_SIZE
    }

    fn default_map_cache_size() -> u64 {
        defaults::MAP_CACHE_SIZE
    }

    fn default_mat_ratio() -> u32 {
        defaults::MAT_RATIO
    }

    fn default_mat_group() -> u32 {
        defaults::MAT_GROUP
    }

    fn default_percent() -> u32 {
        defaults::PERCENT
    }

    /// Returns `true` if translation has to go through the map cache.
    pub fn models_map_cache(&self) -> bool {
        self.mat_ratio > 1 && !self.map_on_chip
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.det_threshold == 0 {
            return Err(ConfigError::Zero {
                name: "asym.det_threshold",
            });
        }
        for (name, value) in [
            ("asym.det_cache_size", self.det_cache_size),
            ("asym.map_cache_size", self.map_cache_size),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { name });
            }
            if value % 4 != 0 {
                return Err(ConfigError::NotMultipleOfWays {
                    name,
                    value,
                    ways: 4,
                });
            }
        }
        require_pow2("asym.mat_ratio", u64::from(self.mat_ratio))?;
        require_pow2("asym.mat_group", u64::from(self.mat_group))?;
        if self.mat_group % self.mat_ratio != 0 {
            return Err(ConfigError::GroupNotMultipleOfRatio {
                group: u64::from(self.mat_group),
                ratio: u64::from(self.mat_ratio),
            });
        }
        for (name, value) in [
            ("asym.rcd_percent", self.rcd_percent),
            ("asym.ras_percent", self.ras_percent),
            ("asym.rp_percent", self.rp_percent),
            ("asym.wr_percent", self.wr_percent),
            ("asym.cl_percent", self.cl_percent),
            ("asym.mig_percent", self.mig_percent),
        ] {
            if !(1..=100).contains(&value) {
                return Err(ConfigError::PercentOutOfRange { name, value });
            }
        }
        Ok(())
    }
}

impl Default for AsymConfig {
    fn default() -> Self {
        Self {
            det_threshold: defaults::DET_THRESHOLD,
            det_cache_size: defaults::DET_CACHE_SIZE,
            map_cache_size: defaults::MAP_CACHE_SIZE,
            map_on_chip: false,
            mat_ratio: defaults::MAT_RATIO,
            mat_group: defaults::MAT_GROUP,
            mat_hash: false,
            victim_policy: VictimPolicy::default(),
            rcd_percent: defaults::PERCENT,
            ras_percent: defaults::PERCENT,
            rp_percent: defaults::PERCENT,
            wr_percent: defaults::PERCENT,
            cl_percent: defaults::PERCENT,
            mig_percent: defaults::PERCENT,
        }
    }
}
