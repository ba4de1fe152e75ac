//! # Channel Scheduler Tests
//!
//! Drives a `ChannelController` directly, one DRAM cycle at a time, and checks
//! command admission, the demand, refresh, idle-precharge, and power-down
//! policies, and completion reporting.

use asymdram_core::common::Coordinates;
use asymdram_core::config::{Config, DeviceParams};
use asymdram_core::controller::{ChannelController, Completion, Origin, SlotId};
use asymdram_core::dram::{CommandType, DramConfig, PowerState};
use asymdram_core::stats::MemoryCounter;
use rstest::rstest;

use crate::common::builders::small_config;

struct Harness {
    channel: ChannelController,
    stats: MemoryCounter,
    completions: Vec<(u64, Completion)>,
    clock: u64,
}

impl Harness {
    fn new(config: &Config) -> Self {
        let dram = DramConfig::new(config).unwrap();
        Self {
            channel: ChannelController::new(0, config, &dram),
            stats: MemoryCounter::default(),
            completions: Vec::new(),
            clock: 0,
        }
    }

    fn step(&mut self) {
        let mut done = Vec::new();
        self.channel.cycle(self.clock);
        self.channel.schedule(self.clock, &mut self.stats, &mut done);
        self.completions
            .extend(done.into_iter().map(|c| (self.clock, c)));
        self.clock += 1;
    }

    fn run_until(&mut self, cycle: u64) {
        while self.clock < cycle {
            self.step();
        }
    }

    fn run_until_idle(&mut self, limit: u64) {
        while self.channel.transactions().next().is_some() || self.channel.commands().next().is_some() {
            assert!(self.clock < limit, "channel still busy at cycle {}", self.clock);
            self.step();
        }
    }
}

fn row(row: u64, column: u32) -> Coordinates {
    Coordinates {
        row,
        column,
        ..Coordinates::default()
    }
}

// ══════════════════════════════════════════════════════════
// 1. Admission
// ══════════════════════════════════════════════════════════

#[test]
fn test_transaction_pool_back_pressure() {
    let mut config = small_config();
    config.controller.transaction_queue_size = 2;
    let mut h = Harness::new(&config);
    assert!(h.channel.add_transaction(CommandType::Read, row(1, 0), Origin::Internal));
    assert!(h.channel.add_transaction(CommandType::Read, row(2, 0), Origin::Internal));
    assert!(!h.channel.add_transaction(CommandType::Read, row(3, 0), Origin::Internal));
    assert_eq!(h.channel.transactions().count(), 2);
    assert_eq!(h.channel.rank_state(0).demand_count, 2);
    assert_eq!(h.channel.bank_state(0, 0).demand_count, 2);
}

#[test]
fn test_command_admission_is_strict() {
    let mut h = Harness::new(&small_config());
    let coords = row(4, 0);
    assert!(h.channel.add_command(0, CommandType::Activate, coords, Origin::Internal));
    assert!(!h.channel.add_command(8, CommandType::Read, coords, Origin::Internal));
    assert_eq!(h.channel.commands().count(), 1);
    assert!(h.channel.add_command(9, CommandType::Read, coords, Origin::Internal));

    let read = h.channel.commands().last().copied().unwrap();
    assert_eq!(read.issue_time, 9);
    assert_eq!(read.finish_time, 18);
}

#[test]
fn test_command_pool_back_pressure() {
    let mut config = small_config();
    config.controller.command_queue_size = 1;
    let mut h = Harness::new(&config);
    assert!(h.channel.add_command(0, CommandType::Activate, row(4, 0), Origin::Internal));
    assert!(!h.channel.add_command(100, CommandType::Read, row(4, 0), Origin::Internal));
}

// ══════════════════════════════════════════════════════════
// 2. Demand scheduling
// ══════════════════════════════════════════════════════════

#[test]
fn test_read_completes_after_activate_and_cas() {
    let mut h = Harness::new(&small_config());
    let slot = SlotId(3);
    assert!(h.channel.add_transaction(CommandType::Read, row(9, 0), Origin::Request(slot)));

    h.run_until_idle(200);
    // ACT at 0, RD at tRCD, data after tCL.
    assert_eq!(h.completions, vec![(18, Completion::Access(slot))]);
    assert_eq!(h.stats.access.slow_segment, 1);
    assert_eq!(h.stats.access.row_buffer, 0);
}

#[test]
fn test_transaction_retires_at_admission() {
    let mut h = Harness::new(&small_config());
    assert!(h.channel.add_transaction(CommandType::Read, row(9, 0), Origin::Request(SlotId(0))));
    h.run_until(10);
    assert_eq!(h.channel.transactions().count(), 0);
    assert!(h.completions.is_empty());
    assert_eq!(h.channel.bank_state(0, 0).open_row, Some(9));
    assert_eq!(h.channel.bank_state(0, 0).hit_count, 1);
}

#[rstest]
#[case::cap_splits_burst(2, 2, 1)]
#[case::cap_allows_burst(4, 1, 2)]
fn test_row_hit_cap(#[case] max_row_hits: u32, #[case] misses: u64, #[case] hits: u64) {
    let mut config = small_config();
    config.controller.max_row_hits = max_row_hits;
    let mut h = Harness::new(&config);
    for column in 0..3 {
        let origin = Origin::Request(SlotId(column as usize));
        assert!(h.channel.add_transaction(CommandType::Read, row(5, column), origin));
    }

    h.run_until_idle(500);
    assert_eq!(h.completions.len(), 3);
    assert_eq!(h.stats.access.slow_segment, misses);
    assert_eq!(h.stats.access.row_buffer, hits);
}

#[test]
fn test_open_row_served_before_conflict() {
    let mut h = Harness::new(&small_config());
    let first = Origin::Request(SlotId(0));
    let conflict = Origin::Request(SlotId(1));
    let hit = Origin::Request(SlotId(2));
    assert!(h.channel.add_transaction(CommandType::Read, row(5, 0), first));
    assert!(h.channel.add_transaction(CommandType::Read, row(6, 0), conflict));
    assert!(h.channel.add_transaction(CommandType::Read, row(5, 1), hit));

    h.run_until_idle(500);
    let order: Vec<Completion> = h.completions.iter().map(|(_, c)| *c).collect();
    assert_eq!(
        order,
        vec![
            Completion::Access(SlotId(0)),
            Completion::Access(SlotId(2)),
            Completion::Access(SlotId(1)),
        ]
    );
    assert_eq!(h.stats.access.row_buffer, 1);
    assert_eq!(h.stats.access.slow_segment, 2);
}

#[test]
fn test_fast_place_counts_as_fast_miss() {
    let mut config = small_config();
    config.asym.mat_ratio = 2;
    config.asym.mat_group = 4;
    let mut h = Harness::new(&config);
    let coords = Coordinates {
        place: Some(2),
        ..row(5, 0)
    };
    assert!(h.channel.add_transaction(CommandType::Read, coords, Origin::Request(SlotId(0))));
    h.run_until_idle(200);
    assert_eq!(h.stats.access.fast_segment, 1);
    assert_eq!(h.stats.access.slow_segment, 0);
}

#[test]
fn test_internal_and_lookup_origins() {
    let mut h = Harness::new(&small_config());
    assert!(h.channel.add_transaction(CommandType::Write, row(130, 0), Origin::Internal));
    assert!(h.channel.add_transaction(CommandType::Read, row(130, 1), Origin::Lookup(0x2a)));
    h.run_until_idle(500);

    let completions: Vec<Completion> = h.completions.iter().map(|(_, c)| *c).collect();
    assert_eq!(completions, vec![Completion::Lookup(0x2a)]);
    assert_eq!(h.stats.access, Default::default());
}

#[test]
fn test_migrate_transaction_holds_row() {
    let mut h = Harness::new(&small_config());
    assert!(h.channel.add_transaction(CommandType::Migrate, row(7, 0), Origin::Internal));
    h.run_until_idle(500);
    let dram = DramConfig::new(&small_config()).unwrap();
    assert_eq!(h.channel.channel().energy().migrate, dram.rank_energy.migrate);
    assert!(h.clock >= dram.slow_bank_timing.mig_latency);
}

#[test]
fn test_migration_moves_open_row_to_destination() {
    let mut config = small_config();
    config.asym.mat_ratio = 2;
    config.asym.mat_group = 4;
    let mut h = Harness::new(&config);
    let slow = Coordinates {
        place: Some(1),
        ..row(5, 0)
    };
    assert!(h.channel.add_migration(slow, 0));
    assert_eq!(h.channel.transactions().next().map(|t| t.destination), Some(Some(0)));

    // Activated in its slow place; the migrate goes out once tRAS allows it.
    h.run_until(1);
    assert_eq!(h.channel.bank_state(0, 0).open_coords.place, Some(1));
    h.run_until(30);
    let state = h.channel.bank_state(0, 0);
    assert_eq!(state.open_row, Some(5));
    assert_eq!(state.open_coords.place, Some(0));
    assert!(h.channel.transactions().next().is_none());
    h.run_until_idle(500);
}

#[test]
fn test_plain_migrate_keeps_activated_place() {
    let mut config = small_config();
    config.asym.mat_ratio = 2;
    config.asym.mat_group = 4;
    config.controller.max_row_idle = 1000;
    let mut h = Harness::new(&config);
    let slow = Coordinates {
        place: Some(1),
        ..row(5, 0)
    };
    assert!(h.channel.add_transaction(CommandType::Migrate, slow, Origin::Internal));
    h.run_until(30);
    assert_eq!(h.channel.bank_state(0, 0).open_coords.place, Some(1));
}

#[test]
fn test_has_room_tracks_transaction_pool() {
    let mut config = small_config();
    config.controller.transaction_queue_size = 1;
    let mut h = Harness::new(&config);
    assert!(h.channel.has_room());
    assert!(h.channel.add_migration(row(5, 0), 0));
    assert!(!h.channel.has_room());
    assert!(!h.channel.add_transaction(CommandType::Read, row(6, 0), Origin::Internal));
}

// ══════════════════════════════════════════════════════════
// 3. Idle precharge and power-down
// ══════════════════════════════════════════════════════════

#[test]
fn test_idle_rank_powers_down() {
    let mut h = Harness::new(&small_config());
    h.step();
    assert!(h.channel.rank_state(0).sleeping);
    assert!(matches!(
        h.channel.channel().rank(0).power_state(),
        PowerState::Down { .. }
    ));
}

#[test]
fn test_sleeping_rank_wakes_for_demand() {
    let mut h = Harness::new(&small_config());
    h.step();
    assert!(h.channel.add_transaction(CommandType::Read, row(3, 0), Origin::Request(SlotId(0))));
    h.run_until_idle(200);
    // Woken at tCKE, activate after tXP, read after tRCD, data after tCL.
    assert_eq!(h.completions, vec![(4 + 4 + 9 + 9, Completion::Access(SlotId(0)))]);
}

#[test]
fn test_idle_row_closes_after_threshold() {
    let mut config = small_config();
    config.controller.max_row_idle = 100;
    let mut h = Harness::new(&config);
    assert!(h.channel.add_transaction(CommandType::Read, row(3, 0), Origin::Internal));

    h.run_until(100);
    assert_eq!(h.channel.bank_state(0, 0).open_row, Some(3));
    assert_eq!(h.channel.rank_state(0).active_count, 1);
    assert!(!h.channel.rank_state(0).sleeping);

    h.run_until(120);
    assert_eq!(h.channel.bank_state(0, 0).open_row, None);
    assert_eq!(h.channel.rank_state(0).active_count, 0);
    assert!(h.channel.rank_state(0).sleeping);
}

// ══════════════════════════════════════════════════════════
// 4. Refresh
// ══════════════════════════════════════════════════════════

fn refresh_config(t_refi: u64) -> Config {
    let mut config = small_config();
    config.memory.device_params = Some(DeviceParams {
        t_refi,
        t_rfc: 10,
        ..config.device()
    });
    config
}

#[test]
fn test_refresh_wakes_rank_and_reschedules() {
    let mut h = Harness::new(&refresh_config(50));
    assert_eq!(h.channel.rank_state(0).refresh_time, 50);

    h.run_until(60);
    assert_eq!(h.channel.rank_state(0).refresh_time, 100);
    assert!(h.channel.channel().energy().refresh > 0);
    assert!(h.channel.rank_state(0).sleeping);
}

#[test]
fn test_refresh_closes_open_row() {
    let mut config = refresh_config(60);
    config.controller.max_row_idle = 1000;
    let mut h = Harness::new(&config);
    assert!(h.channel.add_transaction(CommandType::Read, row(3, 0), Origin::Internal));

    h.run_until(59);
    assert_eq!(h.channel.bank_state(0, 0).open_row, Some(3));

    h.run_until(100);
    assert_eq!(h.channel.bank_state(0, 0).open_row, None);
    assert_eq!(h.channel.rank_state(0).refresh_time, 120);
}

#[test]
fn test_demand_waits_for_refresh() {
    let mut h = Harness::new(&refresh_config(50));
    h.run_until(50);
    assert!(h.channel.add_transaction(CommandType::Read, row(3, 0), Origin::Request(SlotId(0))));
    h.run_until_idle(300);

    let refresh_done = 50 + 4 + 10;
    let (finished, _) = h.completions[0];
    assert!(finished >= refresh_done + 9 + 9);
}

#[test]
fn test_refreshes_are_staggered_across_ranks() {
    let mut config = small_config();
    config.memory.ram_size = 4 << 20;
    let dram = DramConfig::new(&config).unwrap();
    assert_eq!(dram.rank_count, 4);
    let channel = ChannelController::new(0, &config, &dram);
    let interval = dram.rank_timing.refresh_interval;
    let times: Vec<u64> = (0..4).map(|r| channel.rank_state(r).refresh_time).collect();
    assert_eq!(
        times,
        vec![interval / 4, interval / 2, 3 * interval / 4, interval]
    );
}
