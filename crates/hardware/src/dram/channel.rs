//! Channel timing state: the root of the device model.
//!
//! The channel layers command-bus and data-bus occupancy on top of its ranks.
//! Every level reports the maximum of its own constraint and the levels below,
//! so admission checks only ever see the widest window.

use serde::Serialize;

use super::command::CommandType;
use super::rank::Rank;
use super::timing::DramConfig;
use crate::common::Coordinates;

/// Energy totals for a channel, in picojoules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EnergyBreakdown {
    /// Activates and precharges.
    pub act_pre: u64,
    /// Column reads.
    pub read: u64,
    /// Column writes.
    pub write: u64,
    /// Refreshes.
    pub refresh: u64,
    /// Row migrations.
    pub migrate: u64,
    /// Rank background.
    pub background: u64,
    /// Command bus.
    pub command_bus: u64,
    /// Row and column address transfers.
    pub address_bus: u64,
    /// Data bursts.
    pub data_bus: u64,
    /// Clock tree.
    pub clock: u64,
}

impl EnergyBreakdown {
    /// Returns the sum of every category.
    pub fn total(&self) -> u64 {
        self.act_pre
            + self.read
            + self.write
            + self.refresh
            + self.migrate
            + self.background
            + self.command_bus
            + self.address_bus
            + self.data_bus
            + self.clock
    }
}

/// Device model of one channel.
#[derive(Clone, Debug)]
pub struct Channel {
    config: DramConfig,
    ranks: Vec<Rank>,
    rank_select: Option<u32>,
    any_ready: u64,
    read_ready: u64,
    write_ready: u64,
    command_bus: u64,
    address_bus: u64,
    data_bus: u64,
    clock: u64,
}

impl Channel {
    /// Creates a channel with `config.rank_count` idle ranks.
    pub fn new(config: &DramConfig) -> Self {
        Self {
            config: config.clone(),
            ranks: (0..config.rank_count)
                .map(|_| Rank::new(config.bank_count))
                .collect(),
            rank_select: None,
            any_ready: 0,
            read_ready: 0,
            write_ready: 0,
            command_bus: 0,
            address_bus: 0,
            data_bus: 0,
            clock: 0,
        }
    }

    /// Returns the rank at `index`.
    #[inline]
    pub fn rank(&self, index: u32) -> &Rank {
        &self.ranks[index as usize]
    }

    /// Returns the earliest cycle at which `command` may issue at `coords`.
    ///
    /// # Panics
    ///
    /// Panics if the command is illegal in the target bank's or rank's state.
    pub fn get_ready_time(&self, command: CommandType, coords: &Coordinates) -> u64 {
        let rank = self.rank(coords.rank).ready_time(command, coords.bank);
        match command {
            CommandType::PowerUp | CommandType::PowerDown => rank,
            CommandType::Read | CommandType::ReadPrecharge => {
                self.cross_rank(coords, rank.max(self.any_ready), self.read_ready)
            }
            CommandType::Write | CommandType::WritePrecharge => {
                self.cross_rank(coords, rank.max(self.any_ready), self.write_ready)
            }
            _ => rank.max(self.any_ready),
        }
    }

    /// Commits `command` issued at `clock` and returns its finish cycle.
    ///
    /// # Panics
    ///
    /// Panics if the command is illegal or `clock` precedes its ready time.
    pub fn get_finish_time(&mut self, clock: u64, command: CommandType, coords: &Coordinates) -> u64 {
        let ready = self.get_ready_time(command, coords);
        assert!(
            clock >= ready,
            "{command} at cycle {clock} before ready time {ready} for {coords}"
        );

        let timing = &self.config.channel_timing;
        let energy = &self.config.channel_energy;
        match command {
            CommandType::Activate
            | CommandType::Precharge
            | CommandType::Refresh
            | CommandType::Migrate => {
                let mut any = clock + timing.any_to_any;
                if command == CommandType::Activate {
                    any = any.max(clock + timing.act_to_any);
                    self.address_bus += energy.row;
                }
                self.any_ready = self.any_ready.max(any);
                self.command_bus += energy.command;
            }
            CommandType::Read
            | CommandType::ReadPrecharge
            | CommandType::Write
            | CommandType::WritePrecharge => {
                let (to_read, to_write) = if command.is_read() {
                    (timing.read_to_read, timing.read_to_write)
                } else {
                    (timing.write_to_read, timing.write_to_write)
                };
                self.any_ready = self.any_ready.max(clock + timing.any_to_any);
                self.read_ready = self.read_ready.max(clock + to_read);
                self.write_ready = self.write_ready.max(clock + to_write);
                self.command_bus += energy.command;
                self.address_bus += energy.column;
                self.data_bus += energy.data;
                self.rank_select = Some(coords.rank);
            }
            CommandType::PowerUp | CommandType::PowerDown => {}
        }

        let bank_timing = self.config.bank_timing(coords.is_fast(self.config.mat_ratio));
        self.ranks[coords.rank as usize].commit(
            clock,
            command,
            coords.bank,
            &self.config.rank_timing,
            bank_timing,
            &self.config.rank_energy,
        )
    }

    /// Accrues one DRAM cycle of clock and background energy.
    pub fn cycle(&mut self, _clock: u64) {
        self.clock += self.config.channel_energy.clock_per_cycle;
        for rank in &mut self.ranks {
            rank.cycle(&self.config.rank_energy);
        }
    }

    /// Returns accrued energy, summed over ranks.
    pub fn energy(&self) -> EnergyBreakdown {
        let mut total = EnergyBreakdown {
            command_bus: self.command_bus,
            address_bus: self.address_bus,
            data_bus: self.data_bus,
            clock: self.clock,
            ..EnergyBreakdown::default()
        };
        for rank in &self.ranks {
            let e = rank.energy();
            total.act_pre += e.act_pre;
            total.read += e.read;
            total.write += e.write;
            total.refresh += e.refresh;
            total.migrate += e.migrate;
            total.background += e.background;
        }
        total
    }

    fn cross_rank(&self, coords: &Coordinates, ready: u64, bus_ready: u64) -> u64 {
        if self.rank_select == Some(coords.rank) {
            ready
        } else {
            ready.max(bus_ready)
        }
    }
}
