//! Derived geometry, timing tables, and energy tables.
//!
//! `DramConfig` is computed once from a [`Config`] and shared by the address
//! mapper and every channel. It provides:
//! 1. **Geometry:** Ranks per channel, rows per bank, and remap-domain sizes.
//! 2. **Timing:** Channel, rank, and (fast and slow) bank constraint tables in DRAM cycles.
//! 3. **Energy:** Per-command and per-cycle energies from the linear current model.

use serde::Serialize;

use crate::common::error::{ConfigError, require_pow2};
use crate::config::{Config, DeviceParams};

/// Columns (bursts) per row.
pub const COLUMN_COUNT: u32 = 1 << 7;

/// Bytes per burst.
pub const OFFSET_COUNT: u32 = 1 << 6;

/// Bytes per row.
pub const ROW_BYTES: u64 = (COLUMN_COUNT as u64) * (OFFSET_COUNT as u64);

/// Bus-level turnaround constraints, applied across ranks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct ChannelTiming {
    pub any_to_any: u64,
    pub act_to_any: u64,
    pub read_to_read: u64,
    pub read_to_write: u64,
    pub write_to_read: u64,
    pub write_to_write: u64,
}

/// Rank-level constraints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct RankTiming {
    pub act_to_act: u64,
    pub act_to_faw: u64,
    pub read_to_read: u64,
    pub read_to_write: u64,
    pub write_to_read: u64,
    pub write_to_write: u64,
    pub refresh_latency: u64,
    pub refresh_interval: u64,
    pub powerdown_latency: u64,
    pub powerup_latency: u64,
}

/// Bank-level constraints and command latencies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct BankTiming {
    pub act_to_read: u64,
    pub act_to_write: u64,
    pub act_to_pre: u64,
    pub act_to_mig: u64,
    pub read_to_pre: u64,
    pub read_to_mig: u64,
    pub write_to_pre: u64,
    pub write_to_mig: u64,
    pub pre_to_act: u64,
    pub read_latency: u64,
    pub write_latency: u64,
    pub mig_latency: u64,
}

/// Bus energies in picojoules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChannelEnergy {
    /// Any command on the command bus.
    pub command: u64,
    /// Row address transfer (activate).
    pub row: u64,
    /// Column address transfer (read/write).
    pub column: u64,
    /// One data burst.
    pub data: u64,
    /// Clock tree, per DRAM cycle.
    pub clock_per_cycle: u64,
}

/// Rank energies in picojoules, summed over the rank's devices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct RankEnergy {
    pub activate: u64,
    pub precharge: u64,
    pub read: u64,
    pub write: u64,
    pub refresh: u64,
    pub migrate: u64,
    pub powerup_per_cycle: u64,
    pub powerdown_per_cycle: u64,
}

/// Geometry and timing derived from a validated [`Config`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DramConfig {
    /// Rank capacity in bytes.
    pub rank_size: u64,
    /// Devices per rank.
    pub device_count: u32,
    /// Channels.
    pub channel_count: u32,
    /// Ranks per channel.
    pub rank_count: u32,
    /// Banks per rank.
    pub bank_count: u32,
    /// Data rows per bank (remap-table rows sit above this).
    pub row_count: u64,
    /// Columns per row.
    pub column_count: u32,
    /// Bytes per column.
    pub offset_count: u32,
    /// Remap clusters (channels × ranks × banks).
    pub cluster_count: u64,
    /// Remap groups per cluster.
    pub group_count: u64,
    /// Slots per remap domain.
    pub index_count: u32,
    /// One place in every `mat_ratio` is fast.
    pub mat_ratio: u32,
    /// Clock period in picoseconds.
    pub tck_ps: u64,
    /// Bus turnaround table.
    pub channel_timing: ChannelTiming,
    /// Rank table.
    pub rank_timing: RankTiming,
    /// Bank table for fast places.
    pub fast_bank_timing: BankTiming,
    /// Bank table for slow places.
    pub slow_bank_timing: BankTiming,
    /// Bus energies.
    pub channel_energy: ChannelEnergy,
    /// Rank energies.
    pub rank_energy: RankEnergy,
}

impl DramConfig {
    /// Derives geometry and timing tables from a configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid, the device
    /// geometry is not a power of two, or the installed RAM cannot hold one
    /// rank per channel.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let device = config.device();

        if device.devices == 0 {
            return Err(ConfigError::Zero {
                name: "device.devices",
            });
        }
        if device.tck_ps == 0 {
            return Err(ConfigError::Zero {
                name: "device.tck_ps",
            });
        }
        require_pow2("device.banks", u64::from(device.banks))?;
        require_pow2("device.rank_size_mib", device.rank_size_mib)?;

        let rank_size = device.rank_size_mib << 20;
        let channels = config.memory.channels;
        if config.memory.ram_size < rank_size * channels {
            return Err(ConfigError::RamTooSmall {
                ram_size: config.memory.ram_size,
                channels,
                rank_size,
            });
        }

        let rank_count = config.memory.ram_size / rank_size / channels;
        let row_count = rank_size / ROW_BYTES / u64::from(device.banks);
        require_pow2("ranks per channel", rank_count)?;
        require_pow2("rows per bank", row_count)?;

        let mat_group = u64::from(config.asym.mat_group);
        if row_count < mat_group {
            return Err(ConfigError::GroupLargerThanBank {
                rows: row_count,
                group: mat_group,
            });
        }

        let slow_bank_timing = slow_bank_timing(&device, config.asym.mig_percent);
        let fast_bank_timing = fast_bank_timing(&device, &slow_bank_timing, config);

        Ok(Self {
            rank_size,
            device_count: device.devices,
            channel_count: narrow(channels),
            rank_count: narrow(rank_count),
            bank_count: device.banks,
            row_count,
            column_count: COLUMN_COUNT,
            offset_count: OFFSET_COUNT,
            cluster_count: channels * rank_count * u64::from(device.banks),
            group_count: row_count / mat_group,
            index_count: config.asym.mat_group,
            mat_ratio: config.asym.mat_ratio,
            tck_ps: device.tck_ps,
            channel_timing: channel_timing(&device)?,
            rank_timing: rank_timing(&device)?,
            fast_bank_timing,
            slow_bank_timing,
            channel_energy: ChannelEnergy {
                command: device.command_pj,
                row: device.row_pj,
                column: device.column_pj,
                data: device.data_pj,
                clock_per_cycle: device.clock_pj,
            },
            rank_energy: rank_energy(&device),
        })
    }

    /// Selects the fast or slow bank table.
    #[inline]
    pub fn bank_timing(&self, fast: bool) -> &BankTiming {
        if fast {
            &self.fast_bank_timing
        } else {
            &self.slow_bank_timing
        }
    }
}

fn narrow(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn sub(name: &'static str, lhs: u64, rhs: u64) -> Result<u64, ConfigError> {
    lhs.checked_sub(rhs)
        .ok_or(ConfigError::TimingUnderflow { name })
}

fn channel_timing(d: &DeviceParams) -> Result<ChannelTiming, ConfigError> {
    Ok(ChannelTiming {
        any_to_any: d.t_cmd,
        act_to_any: d.t_cmd,
        read_to_read: d.t_bl + d.t_rtrs,
        read_to_write: sub("channel read_to_write", d.t_cl + d.t_bl + d.t_rtrs, d.t_cwl)?,
        write_to_read: sub("channel write_to_read", d.t_cwl + d.t_bl + d.t_rtrs, d.t_cl)?,
        write_to_write: d.t_bl + d.t_rtrs,
    })
}

fn rank_timing(d: &DeviceParams) -> Result<RankTiming, ConfigError> {
    Ok(RankTiming {
        act_to_act: d.t_rrd,
        act_to_faw: d.t_faw,
        read_to_read: d.t_bl.max(d.t_ccd),
        read_to_write: sub("rank read_to_write", d.t_cl + d.t_bl + d.t_rtrs, d.t_cwl)?,
        write_to_read: d.t_cwl + d.t_bl + d.t_wtr,
        write_to_write: d.t_bl.max(d.t_ccd),
        refresh_latency: d.t_rfc,
        refresh_interval: d.t_refi,
        powerdown_latency: d.t_cke,
        powerup_latency: d.t_xp,
    })
}

fn slow_bank_timing(d: &DeviceParams, mig_percent: u32) -> BankTiming {
    let read_to_pre = d.t_bl + d.t_rtp.max(d.t_ccd) - d.t_ccd;
    let write_to_pre = d.t_cwl + d.t_bl + d.t_wr;
    BankTiming {
        act_to_read: d.t_rcd,
        act_to_write: d.t_rcd,
        act_to_pre: d.t_ras,
        act_to_mig: d.t_ras,
        read_to_pre,
        read_to_mig: read_to_pre,
        write_to_pre,
        write_to_mig: write_to_pre,
        pre_to_act: d.t_rp,
        read_latency: d.t_cl,
        write_latency: d.t_cwl,
        mig_latency: scale((d.t_ras + d.t_rp) * 2, mig_percent),
    }
}

fn fast_bank_timing(d: &DeviceParams, slow: &BankTiming, config: &Config) -> BankTiming {
    let asym = &config.asym;
    let cwl = scale(d.t_cwl, asym.cl_percent);
    let ras = scale(d.t_ras, asym.ras_percent);
    let read_to_pre = d.t_bl + d.t_rtp.max(d.t_ccd) - d.t_ccd;
    let write_to_pre = cwl + d.t_bl + scale(d.t_wr, asym.wr_percent);
    BankTiming {
        act_to_read: scale(d.t_rcd, asym.rcd_percent),
        act_to_write: scale(d.t_rcd, asym.rcd_percent),
        act_to_pre: ras,
        act_to_mig: ras,
        read_to_pre,
        read_to_mig: read_to_pre,
        write_to_pre,
        write_to_mig: write_to_pre,
        pre_to_act: scale(d.t_rp, asym.rp_percent),
        read_latency: scale(d.t_cl, asym.cl_percent),
        write_latency: cwl,
        mig_latency: slow.mig_latency,
    }
}

/// Scales `cycles` by `percent`, rounding up so a non-zero constraint stays non-zero.
fn scale(cycles: u64, percent: u32) -> u64 {
    (cycles * u64::from(percent)).div_ceil(100)
}

fn rank_energy(d: &DeviceParams) -> RankEnergy {
    // mA × mV × ps = 1e-18 J; divide by 1e6 for picojoules.
    let pj = |milliamps: u64, cycles: u64| {
        milliamps * d.vdd_mv * cycles * d.tck_ps * u64::from(d.devices) / 1_000_000
    };
    let activate = pj(d.idd0.saturating_sub(d.idd3n), d.t_ras);
    let precharge = pj(d.idd0.saturating_sub(d.idd2n), d.t_rp);
    RankEnergy {
        activate,
        precharge,
        read: pj(d.idd4r.saturating_sub(d.idd3n), d.t_bl),
        write: pj(d.idd4w.saturating_sub(d.idd3n), d.t_bl),
        refresh: pj(d.idd5.saturating_sub(d.idd3n), d.t_rfc),
        migrate: 2 * (activate + precharge),
        powerup_per_cycle: pj(d.idd3n, 1),
        powerdown_per_cycle: pj(d.idd2p, 1),
    }
}
