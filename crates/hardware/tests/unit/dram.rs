//! # Device Timing Model Tests
//!
//! Verifies derived geometry and tables, bank state transitions, rank
//! constraints (four-activate window, refresh, power-down), channel bus
//! turnarounds, and the energy counters.

use asymdram_core::common::{ConfigError, Coordinates};
use asymdram_core::config::{Config, DeviceParams};
use asymdram_core::dram::{Bank, Channel, CommandType, DramConfig, PowerState};
use proptest::prelude::*;
use rstest::rstest;

use crate::common::builders::{small_config, small_device};

fn default_dram() -> DramConfig {
    DramConfig::new(&Config::default()).unwrap()
}

fn at(rank: u32, bank: u32, row: u64) -> Coordinates {
    Coordinates {
        rank,
        bank,
        row,
        ..Coordinates::default()
    }
}

/// Issues `command` at its ready time (or `clock`, if later) and returns the issue cycle.
fn issue(channel: &mut Channel, clock: u64, command: CommandType, coords: &Coordinates) -> u64 {
    let when = channel.get_ready_time(command, coords).max(clock);
    let finish = channel.get_finish_time(when, command, coords);
    assert!(finish >= when);
    when
}

// ══════════════════════════════════════════════════════════
// 1. Derived geometry and tables
// ══════════════════════════════════════════════════════════

#[test]
fn test_default_geometry() {
    let dram = default_dram();
    assert_eq!(dram.channel_count, 1);
    assert_eq!(dram.rank_count, 2);
    assert_eq!(dram.bank_count, 8);
    assert_eq!(dram.row_count, 32768);
    assert_eq!(dram.column_count, 128);
    assert_eq!(dram.offset_count, 64);
    assert_eq!(dram.cluster_count, 16);
    assert_eq!(dram.group_count, 32768);
    assert_eq!(dram.index_count, 1);
}

#[test]
fn test_remap_domains_split_rows() {
    let mut config = small_config();
    config.asym.mat_ratio = 2;
    config.asym.mat_group = 4;
    let dram = DramConfig::new(&config).unwrap();
    assert_eq!(dram.row_count, 128);
    assert_eq!(dram.cluster_count, 1);
    assert_eq!(dram.group_count, 32);
    assert_eq!(dram.index_count, 4);
}

#[test]
fn test_slow_bank_table() {
    let dram = default_dram();
    let slow = dram.bank_timing(false);
    assert_eq!(slow.act_to_read, 9);
    assert_eq!(slow.act_to_pre, 24);
    assert_eq!(slow.pre_to_act, 9);
    assert_eq!(slow.read_latency, 9);
    assert_eq!(slow.write_latency, 7);
    assert_eq!(slow.read_to_pre, 5);
    assert_eq!(slow.write_to_pre, 7 + 4 + 10);
    assert_eq!(slow.mig_latency, 2 * (24 + 9));
}

#[test]
fn test_fast_table_scales_and_rounds_up() {
    let mut config = Config::default();
    config.asym.rcd_percent = 50;
    config.asym.rp_percent = 50;
    config.asym.cl_percent = 50;
    config.asym.mig_percent = 50;
    let dram = DramConfig::new(&config).unwrap();
    let fast = dram.bank_timing(true);
    assert_eq!(fast.act_to_read, 5);
    assert_eq!(fast.pre_to_act, 5);
    assert_eq!(fast.read_latency, 5);
    assert_eq!(fast.write_latency, 4);
    assert_eq!(fast.act_to_pre, 24);
    assert_eq!(fast.mig_latency, 33);
    assert_eq!(dram.bank_timing(false).act_to_read, 9);
}

#[test]
fn test_full_percent_tables_match() {
    let dram = default_dram();
    assert_eq!(dram.bank_timing(true), dram.bank_timing(false));
}

#[rstest]
#[case::ram_too_small(
    |c: &mut Config| c.memory.ram_size = 1 << 30,
    ConfigError::RamTooSmall { ram_size: 1 << 30, channels: 1, rank_size: 2 << 30 })]
#[case::group_larger_than_bank(
    |c: &mut Config| { *c = small_config(); c.asym.mat_group = 256; },
    ConfigError::GroupLargerThanBank { rows: 128, group: 256 })]
#[case::banks_not_pow2(
    |c: &mut Config| c.memory.device_params = Some(DeviceParams { banks: 6, ..DeviceParams::default() }),
    ConfigError::NotPowerOfTwo { name: "device.banks", value: 6 })]
#[case::read_to_write_underflow(
    |c: &mut Config| c.memory.device_params = Some(DeviceParams { t_cl: 1, t_bl: 1, t_rtrs: 0, ..DeviceParams::default() }),
    ConfigError::TimingUnderflow { name: "channel read_to_write" })]
fn test_geometry_errors(#[case] edit: fn(&mut Config), #[case] expected: ConfigError) {
    let mut config = Config::default();
    edit(&mut config);
    assert_eq!(DramConfig::new(&config), Err(expected));
}

// ══════════════════════════════════════════════════════════
// 2. Bank state machine
// ══════════════════════════════════════════════════════════

#[test]
fn test_bank_starts_closed() {
    let bank = Bank::new();
    assert!(!bank.is_open());
    assert_eq!(bank.try_ready_time(CommandType::Activate), Some(0));
    assert_eq!(bank.try_ready_time(CommandType::Read), None);
    assert_eq!(bank.try_ready_time(CommandType::Precharge), None);
}

#[test]
fn test_bank_activate_read_precharge() {
    let dram = default_dram();
    let timing = dram.bank_timing(false);
    let mut bank = Bank::new();

    assert_eq!(bank.commit(10, CommandType::Activate, timing), 10);
    assert!(bank.is_open());
    assert_eq!(bank.ready_time(CommandType::Read), 10 + timing.act_to_read);
    assert_eq!(bank.ready_time(CommandType::Precharge), 10 + timing.act_to_pre);
    assert_eq!(bank.try_ready_time(CommandType::Activate), None);

    let read_at = 10 + timing.act_to_read;
    assert_eq!(
        bank.commit(read_at, CommandType::Read, timing),
        read_at + timing.read_latency
    );
    // A late read pushes the precharge window out, an early one never pulls it in.
    assert_eq!(
        bank.ready_time(CommandType::Precharge),
        (10 + timing.act_to_pre).max(read_at + timing.read_to_pre)
    );

    let pre_at = bank.ready_time(CommandType::Precharge);
    let _ = bank.commit(pre_at, CommandType::Precharge, timing);
    assert!(!bank.is_open());
    assert_eq!(bank.ready_time(CommandType::Activate), pre_at + timing.pre_to_act);
}

#[test]
fn test_bank_migrate_finishes_after_latency() {
    let dram = default_dram();
    let timing = dram.bank_timing(false);
    let mut bank = Bank::new();
    let _ = bank.commit(0, CommandType::Activate, timing);
    let done = bank.commit(timing.act_to_mig, CommandType::Migrate, timing);
    assert_eq!(done, timing.act_to_mig + timing.mig_latency);
    assert!(bank.is_open());
    assert_eq!(bank.ready_time(CommandType::Read), done + timing.act_to_read);
}

#[test]
fn test_bank_auto_precharge_closes() {
    let dram = default_dram();
    let timing = dram.bank_timing(false);
    let mut bank = Bank::new();
    let _ = bank.commit(0, CommandType::Activate, timing);
    let _ = bank.commit(9, CommandType::ReadPrecharge, timing);
    assert!(!bank.is_open());
    assert_eq!(
        bank.ready_time(CommandType::Activate),
        9 + timing.read_to_pre + timing.pre_to_act
    );
}

#[test]
#[should_panic(expected = "before bank ready time")]
fn test_bank_rejects_early_commit() {
    let dram = default_dram();
    let mut bank = Bank::new();
    let _ = bank.commit(0, CommandType::Activate, dram.bank_timing(false));
    let _ = bank.commit(1, CommandType::Read, dram.bank_timing(false));
}

#[test]
#[should_panic]
fn test_read_on_closed_bank_panics() {
    let _ = Bank::new().ready_time(CommandType::Read);
}

// ══════════════════════════════════════════════════════════
// 3. Rank constraints
// ══════════════════════════════════════════════════════════

#[test]
fn test_four_activate_window() {
    let dram = default_dram();
    let mut channel = Channel::new(&dram);
    let mut issued = Vec::new();
    for bank in 0..5 {
        issued.push(issue(&mut channel, 0, CommandType::Activate, &at(0, bank, 1)));
    }
    // Four activates spaced by tRRD, the fifth held back by tFAW.
    assert_eq!(issued, vec![0, 4, 8, 12, 20]);
}

#[test]
fn test_activates_on_other_rank_ignore_window() {
    let dram = default_dram();
    let mut channel = Channel::new(&dram);
    for bank in 0..4 {
        let _ = issue(&mut channel, 0, CommandType::Activate, &at(0, bank, 1));
    }
    assert_eq!(channel.get_ready_time(CommandType::Activate, &at(1, 0, 1)), 13);
}

#[test]
fn test_refresh_blocks_activates() {
    let dram = default_dram();
    let mut channel = Channel::new(&dram);
    let coords = at(0, 0, 0);
    let when = issue(&mut channel, 100, CommandType::Refresh, &coords);
    assert_eq!(when, 100);
    assert_eq!(
        channel.get_ready_time(CommandType::Activate, &coords),
        100 + dram.rank_timing.refresh_latency
    );
    assert!(channel.energy().refresh > 0);
}

#[test]
#[should_panic]
fn test_refresh_with_open_bank_panics() {
    let dram = default_dram();
    let mut channel = Channel::new(&dram);
    let _ = issue(&mut channel, 0, CommandType::Activate, &at(0, 3, 7));
    let _ = channel.get_ready_time(CommandType::Refresh, &at(0, 0, 0));
}

#[test]
fn test_power_down_and_up() {
    let dram = default_dram();
    let mut channel = Channel::new(&dram);
    let coords = at(1, 0, 0);
    assert_eq!(channel.rank(1).power_state(), PowerState::Up);

    let _ = channel.get_finish_time(10, CommandType::PowerDown, &coords);
    let wake = 10 + dram.rank_timing.powerdown_latency;
    assert_eq!(channel.rank(1).power_state(), PowerState::Down { wake_ready: wake });
    assert_eq!(channel.get_ready_time(CommandType::PowerUp, &coords), wake);

    let _ = channel.get_finish_time(wake, CommandType::PowerUp, &coords);
    assert_eq!(channel.rank(1).power_state(), PowerState::Up);
    assert_eq!(
        channel.get_ready_time(CommandType::Activate, &coords),
        wake + dram.rank_timing.powerup_latency
    );
}

#[test]
#[should_panic(expected = "sleeping rank")]
fn test_activate_on_sleeping_rank_panics() {
    let dram = default_dram();
    let mut channel = Channel::new(&dram);
    let coords = at(0, 0, 0);
    let _ = channel.get_finish_time(0, CommandType::PowerDown, &coords);
    let _ = channel.get_ready_time(CommandType::Activate, &coords);
}

// ══════════════════════════════════════════════════════════
// 4. Channel bus
// ══════════════════════════════════════════════════════════

#[test]
fn test_one_command_per_cycle() {
    let dram = default_dram();
    let mut channel = Channel::new(&dram);
    let _ = channel.get_finish_time(0, CommandType::Activate, &at(0, 0, 0));
    assert_eq!(channel.get_ready_time(CommandType::Activate, &at(1, 0, 0)), 1);
}

#[test]
fn test_rank_switch_adds_bus_turnaround() {
    let dram = default_dram();
    let mut channel = Channel::new(&dram);
    let _ = issue(&mut channel, 0, CommandType::Activate, &at(0, 0, 0));
    let _ = issue(&mut channel, 0, CommandType::Activate, &at(1, 0, 0));
    let read_at = issue(&mut channel, 0, CommandType::Read, &at(0, 0, 0));
    assert_eq!(read_at, 9);

    // Same rank: tCCD. Other rank: tBL + tRTRS on the shared data bus.
    let other_rank = channel.get_ready_time(CommandType::Read, &at(1, 0, 0));
    assert_eq!(other_rank, read_at + dram.channel_timing.read_to_read);
    let _ = issue(&mut channel, 0, CommandType::Activate, &at(0, 1, 0));
    let same_rank = channel.get_ready_time(CommandType::Read, &at(0, 1, 0));
    assert!(same_rank >= read_at + dram.rank_timing.read_to_read);
}

#[test]
fn test_energy_accounting() {
    let dram = DramConfig::new(&small_config()).unwrap();
    let mut channel = Channel::new(&dram);
    let coords = at(0, 0, 5);
    let _ = issue(&mut channel, 0, CommandType::Activate, &coords);
    let _ = issue(&mut channel, 0, CommandType::Read, &coords);
    let _ = issue(&mut channel, 0, CommandType::Write, &coords);
    channel.cycle(0);
    channel.cycle(1);

    let energy = channel.energy();
    let rank = &dram.rank_energy;
    let bus = &dram.channel_energy;
    assert_eq!(energy.act_pre, rank.activate);
    assert_eq!(energy.read, rank.read);
    assert_eq!(energy.write, rank.write);
    assert_eq!(energy.background, 2 * rank.powerup_per_cycle);
    assert_eq!(energy.command_bus, 3 * bus.command);
    assert_eq!(energy.address_bus, bus.row + 2 * bus.column);
    assert_eq!(energy.data_bus, 2 * bus.data);
    assert_eq!(energy.clock, 2 * bus.clock_per_cycle);
    assert_eq!(
        energy.total(),
        energy.act_pre
            + energy.read
            + energy.write
            + energy.background
            + energy.command_bus
            + energy.address_bus
            + energy.data_bus
            + energy.clock
    );
}

#[test]
fn test_rank_energy_uses_current_deltas() {
    let device = small_device();
    let dram = DramConfig::new(&small_config()).unwrap();
    let pj = |ma: u64, cycles: u64| ma * device.vdd_mv * cycles * device.tck_ps * u64::from(device.devices) / 1_000_000;
    assert_eq!(dram.rank_energy.activate, pj(device.idd0 - device.idd3n, device.t_ras));
    assert_eq!(dram.rank_energy.refresh, pj(device.idd5 - device.idd3n, device.t_rfc));
    assert_eq!(
        dram.rank_energy.migrate,
        2 * (dram.rank_energy.activate + dram.rank_energy.precharge)
    );
    assert!(dram.rank_energy.powerdown_per_cycle < dram.rank_energy.powerup_per_cycle);
}

// ══════════════════════════════════════════════════════════
// 5. Admission monotonicity
// ══════════════════════════════════════════════════════════

proptest! {
    /// Committing commands elsewhere never pulls a bank's ready time earlier,
    /// and no command finishes before it issues.
    #[test]
    fn prop_ready_times_only_widen(ops in prop::collection::vec((0u32..2, 1u32..8, 0u64..4), 1..40)) {
        let dram = default_dram();
        let mut channel = Channel::new(&dram);
        let watched = at(0, 0, 0);
        let _ = issue(&mut channel, 0, CommandType::Activate, &watched);

        let mut open: Vec<Option<u64>> = vec![None; 16];
        let mut clock = 0;
        let mut last_read = channel.get_ready_time(CommandType::Read, &watched);
        let mut last_pre = channel.get_ready_time(CommandType::Precharge, &watched);

        for (rank, bank, row) in ops {
            let coords = at(rank, bank, row);
            let slot = (rank * 8 + bank) as usize;
            let command = match open[slot] {
                None => CommandType::Activate,
                Some(open_row) if open_row == row => CommandType::Read,
                Some(_) => CommandType::Precharge,
            };
            clock = issue(&mut channel, clock, command, &coords);
            open[slot] = match command {
                CommandType::Activate => Some(row),
                CommandType::Precharge => None,
                _ => open[slot],
            };

            let read = channel.get_ready_time(CommandType::Read, &watched);
            let pre = channel.get_ready_time(CommandType::Precharge, &watched);
            prop_assert!(read >= last_read);
            prop_assert!(pre >= last_pre);
            last_read = read;
            last_pre = pre;
        }
    }
}
