//! Per-channel scheduler.
//!
//! A `ChannelController` owns one channel's device model and turns queued
//! transactions into legal DRAM commands. Every DRAM cycle `schedule` runs, in
//! order:
//! 1. **Refresh:** Ranks past their refresh time are woken, drained of open rows, and refreshed.
//! 2. **Demand:** Transactions in queue order open their row and issue their column or migrate command.
//! 3. **Idle precharge:** Open rows nobody is waiting for are closed after `max_row_idle` cycles.
//! 4. **Power-down:** Idle ranks with no open rows enter power-down.
//! 5. **Retirement:** Finished commands are released and completions reported.
//!
//! Commands are admitted strictly: a command whose ready time lies in the
//! future is rejected without side effects and retried on a later cycle.

use tracing::{debug, trace};

use super::pool::Pool;
use super::request::{CommandEntry, Completion, Origin, TransactionEntry};
use crate::common::Coordinates;
use crate::config::Config;
use crate::dram::{Channel, CommandType, DramConfig};
use crate::stats::MemoryCounter;

/// Queued transactions targeting one row, by command class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RowDemand {
    /// Reads.
    pub reads: u32,
    /// Writes.
    pub writes: u32,
    /// Migrations.
    pub migrates: u32,
}

impl RowDemand {
    /// Returns the total count.
    #[inline]
    pub fn total(&self) -> u32 {
        self.reads + self.writes + self.migrates
    }

    fn counter(&mut self, command: CommandType) -> &mut u32 {
        if command.is_read() {
            &mut self.reads
        } else if command.is_write() {
            &mut self.writes
        } else {
            &mut self.migrates
        }
    }

    fn add(&mut self, command: CommandType) {
        *self.counter(command) += 1;
    }

    fn remove(&mut self, command: CommandType) {
        let count = self.counter(command);
        assert!(*count > 0, "row supply underflow for {command}");
        *count -= 1;
    }
}

/// Scheduler view of a rank.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RankState {
    /// Queued transactions targeting the rank.
    pub demand_count: u32,
    /// Banks with an open row.
    pub active_count: u32,
    /// Cycle at which the next refresh is due.
    pub refresh_time: u64,
    /// The rank is in power-down.
    pub sleeping: bool,
}

/// Scheduler view of a bank.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BankState {
    /// Row held in the row buffer.
    pub open_row: Option<u64>,
    /// Coordinates the open row is timed with; a migration updates its place.
    pub open_coords: Coordinates,
    /// Column commands served since the row opened.
    pub hit_count: u32,
    /// Queued transactions targeting the bank.
    pub demand_count: u32,
    /// Queued transactions targeting the open row.
    pub supply: RowDemand,
    /// Cycle of the last activate, column, or migrate command.
    pub last_access: u64,
}

/// Scheduler and device model for one channel.
#[derive(Debug)]
pub struct ChannelController {
    id: u32,
    channel: Channel,
    ranks: Vec<RankState>,
    banks: Vec<BankState>,
    bank_count: u32,
    ratio: u32,
    max_row_hits: u32,
    max_row_idle: u64,
    refresh_interval: u64,
    transactions: Pool<TransactionEntry>,
    commands: Pool<CommandEntry>,
}

impl ChannelController {
    /// Creates the controller for channel `id`.
    ///
    /// Refreshes are staggered: rank `r` is first due at `tREFI / ranks × (r + 1)`.
    pub fn new(id: u32, config: &Config, dram: &DramConfig) -> Self {
        let refresh_interval = dram.rank_timing.refresh_interval;
        let step = refresh_interval / u64::from(dram.rank_count);
        Self {
            id,
            channel: Channel::new(dram),
            ranks: (0..dram.rank_count)
                .map(|rank| RankState {
                    refresh_time: step * (u64::from(rank) + 1),
                    ..RankState::default()
                })
                .collect(),
            banks: vec![BankState::default(); (dram.rank_count * dram.bank_count) as usize],
            bank_count: dram.bank_count,
            ratio: dram.mat_ratio,
            max_row_hits: config.controller.max_row_hits,
            max_row_idle: config.controller.max_row_idle,
            refresh_interval,
            transactions: Pool::new(config.controller.transaction_queue_size),
            commands: Pool::new(config.controller.command_queue_size),
        }
    }

    /// Returns the channel number.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the device model.
    #[inline]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Returns the scheduler state of `rank`.
    #[inline]
    pub fn rank_state(&self, rank: u32) -> &RankState {
        &self.ranks[rank as usize]
    }

    /// Returns the scheduler state of `bank` in `rank`.
    #[inline]
    pub fn bank_state(&self, rank: u32, bank: u32) -> &BankState {
        &self.banks[self.bank_index(rank, bank)]
    }

    /// Returns queued transactions, oldest first.
    pub fn transactions(&self) -> impl Iterator<Item = &TransactionEntry> + '_ {
        self.transactions.iter().map(|(_, t)| t)
    }

    /// Returns admitted commands that have not retired, oldest first.
    pub fn commands(&self) -> impl Iterator<Item = &CommandEntry> + '_ {
        self.commands.iter().map(|(_, c)| c)
    }

    /// Queues a row-level access.
    ///
    /// # Returns
    ///
    /// `false` if the transaction pool is full.
    pub fn add_transaction(&mut self, command: CommandType, coords: Coordinates, origin: Origin) -> bool {
        self.enqueue(TransactionEntry {
            command,
            coords,
            origin,
            missed: false,
            destination: None,
        })
    }

    /// Queues a row migration that moves the row at `coords` to `destination`.
    ///
    /// Once the migrate command is admitted the open row is timed as sitting
    /// in `destination`.
    pub fn add_migration(&mut self, coords: Coordinates, destination: u32) -> bool {
        self.enqueue(TransactionEntry {
            command: CommandType::Migrate,
            coords,
            origin: Origin::Internal,
            missed: false,
            destination: Some(destination),
        })
    }

    /// Returns `true` if another transaction would be accepted.
    #[inline]
    pub fn has_room(&self) -> bool {
        !self.transactions.is_full()
    }

    fn enqueue(&mut self, entry: TransactionEntry) -> bool {
        let (command, coords) = (entry.command, entry.coords);
        if self.transactions.alloc(entry).is_none() {
            return false;
        }

        self.ranks[coords.rank as usize].demand_count += 1;
        let bank = self.bank_mut(coords.rank, coords.bank);
        bank.demand_count += 1;
        if bank.open_row == Some(coords.row) {
            bank.supply.add(command);
        }
        true
    }

    /// Admits a command to the device model.
    ///
    /// # Returns
    ///
    /// `false`, with no state change, if the command is not ready at `clock`
    /// or the command pool is full.
    pub fn add_command(
        &mut self,
        clock: u64,
        command: CommandType,
        coords: Coordinates,
        origin: Origin,
    ) -> bool {
        if self.channel.get_ready_time(command, &coords) > clock || self.commands.is_full() {
            return false;
        }
        let finish_time = self.channel.get_finish_time(clock, command, &coords);
        trace!(channel = self.id, clock, %command, %coords, finish_time, "command");
        let admitted = self.commands.alloc(CommandEntry {
            command,
            coords,
            origin,
            issue_time: clock,
            finish_time,
        });
        debug_assert!(admitted.is_some());
        true
    }

    /// Accrues one cycle of background energy.
    pub fn cycle(&mut self, clock: u64) {
        self.channel.cycle(clock);
    }

    /// Runs one DRAM cycle of scheduling and retirement.
    ///
    /// Completions of request accesses and remap-table lookups are appended to `completions`.
    pub fn schedule(&mut self, clock: u64, stats: &mut MemoryCounter, completions: &mut Vec<Completion>) {
        self.refresh_policy(clock);
        self.demand_policy(clock, stats);
        self.precharge_policy(clock);
        self.powerdown_policy(clock);
        self.retire(clock, completions);
    }

    fn refresh_policy(&mut self, clock: u64) {
        for rank in 0..self.ranks.len() as u32 {
            if clock < self.ranks[rank as usize].refresh_time {
                continue;
            }
            let coords = self.rank_coords(rank, 0);
            if self.ranks[rank as usize].sleeping {
                if !self.add_command(clock, CommandType::PowerUp, coords, Origin::Internal) {
                    continue;
                }
                self.ranks[rank as usize].sleeping = false;
                debug!(channel = self.id, rank, clock, "power-up for refresh");
            }

            for bank in 0..self.bank_count {
                let _ = self.close_row(clock, rank, bank);
            }
            if self.ranks[rank as usize].active_count > 0 {
                continue;
            }

            if !self.add_command(clock, CommandType::Refresh, coords, Origin::Internal) {
                continue;
            }
            let state = &mut self.ranks[rank as usize];
            state.refresh_time += self.refresh_interval;
            debug!(
                channel = self.id,
                rank,
                clock,
                next = state.refresh_time,
                "refresh"
            );
        }
    }

    fn demand_policy(&mut self, clock: u64, stats: &mut MemoryCounter) {
        for id in self.transactions.ids() {
            let Some(&transaction) = self.transactions.get(id) else {
                continue;
            };
            let coords = transaction.coords;
            let (rank, bank) = (coords.rank, coords.bank);

            // Leave the rank alone until its refresh has gone out.
            if clock >= self.ranks[rank as usize].refresh_time {
                continue;
            }

            if self.ranks[rank as usize].sleeping {
                if !self.add_command(clock, CommandType::PowerUp, coords, Origin::Internal) {
                    continue;
                }
                self.ranks[rank as usize].sleeping = false;
                debug!(channel = self.id, rank, clock, "power-up");
            }

            let state = *self.bank_state(rank, bank);
            if let Some(open) = state.open_row {
                let capped = state.hit_count >= self.max_row_hits;
                if open != coords.row || capped {
                    if open != coords.row && state.supply.total() > 0 && !capped {
                        continue;
                    }
                    if !self.close_row(clock, rank, bank) {
                        continue;
                    }
                }
            }

            if self.bank_state(rank, bank).open_row.is_none() {
                if !self.add_command(clock, CommandType::Activate, coords, Origin::Internal) {
                    continue;
                }
                self.open_row(clock, coords);
                if let Some(entry) = self.transactions.get_mut(id) {
                    entry.missed = true;
                }
            }

            let state = self.bank_state(rank, bank);
            assert_eq!(
                state.open_row,
                Some(coords.row),
                "row buffer of {coords} holds another row"
            );
            assert!(state.supply.total() > 0, "open row {coords} has no supply");

            if !self.add_command(clock, transaction.command, coords, transaction.origin) {
                continue;
            }

            self.ranks[rank as usize].demand_count -= 1;
            let state = self.bank_mut(rank, bank);
            state.demand_count -= 1;
            state.supply.remove(transaction.command);
            state.hit_count += 1;
            state.last_access = clock;
            if let Some(place) = transaction.destination {
                state.open_coords.place = Some(place);
            }

            let missed = self.transactions.free(id).missed;
            if matches!(transaction.origin, Origin::Request(_)) {
                if !missed {
                    stats.access.row_buffer += 1;
                } else if coords.is_fast(self.ratio) {
                    stats.access.fast_segment += 1;
                } else {
                    stats.access.slow_segment += 1;
                }
            }
        }
    }

    fn precharge_policy(&mut self, clock: u64) {
        for rank in 0..self.ranks.len() as u32 {
            for bank in 0..self.bank_count {
                let state = self.bank_state(rank, bank);
                if state.open_row.is_none()
                    || state.demand_count > 0
                    || clock < state.last_access + self.max_row_idle
                {
                    continue;
                }
                let _ = self.close_row(clock, rank, bank);
            }
        }
    }

    fn powerdown_policy(&mut self, clock: u64) {
        for rank in 0..self.ranks.len() as u32 {
            let state = self.ranks[rank as usize];
            if state.sleeping
                || state.demand_count > 0
                || state.active_count > 0
                || clock >= state.refresh_time
            {
                continue;
            }
            let coords = self.rank_coords(rank, 0);
            if !self.add_command(clock, CommandType::PowerDown, coords, Origin::Internal) {
                continue;
            }
            self.ranks[rank as usize].sleeping = true;
            trace!(channel = self.id, rank, clock, "power-down");
        }
    }

    fn retire(&mut self, clock: u64, completions: &mut Vec<Completion>) {
        for id in self.commands.ids() {
            let finished = self
                .commands
                .get(id)
                .is_some_and(|command| clock >= command.finish_time);
            if !finished {
                continue;
            }
            let command = self.commands.free(id);
            if !command.command.is_access() {
                continue;
            }
            match command.origin {
                Origin::Request(slot) => completions.push(Completion::Access(slot)),
                Origin::Lookup(tag) if command.command.is_read() => {
                    completions.push(Completion::Lookup(tag));
                }
                Origin::Lookup(_) | Origin::Internal => {}
            }
        }
    }

    /// Precharges the bank if it is open. Returns `true` if the bank ends up closed.
    fn close_row(&mut self, clock: u64, rank: u32, bank: u32) -> bool {
        let state = *self.bank_state(rank, bank);
        if state.open_row.is_none() {
            return true;
        }
        if !self.add_command(clock, CommandType::Precharge, state.open_coords, Origin::Internal) {
            return false;
        }
        self.ranks[rank as usize].active_count -= 1;
        let state = self.bank_mut(rank, bank);
        state.open_row = None;
        state.supply = RowDemand::default();
        true
    }

    fn open_row(&mut self, clock: u64, coords: Coordinates) {
        let mut supply = RowDemand::default();
        for (_, t) in self.transactions.iter() {
            if t.coords.same_row(&coords) {
                supply.add(t.command);
            }
        }

        self.ranks[coords.rank as usize].active_count += 1;
        let state = self.bank_mut(coords.rank, coords.bank);
        state.open_row = Some(coords.row);
        state.open_coords = coords;
        state.hit_count = 0;
        state.supply = supply;
        state.last_access = clock;
    }

    fn rank_coords(&self, rank: u32, bank: u32) -> Coordinates {
        Coordinates {
            channel: self.id,
            rank,
            bank,
            ..Coordinates::default()
        }
    }

    fn bank_index(&self, rank: u32, bank: u32) -> usize {
        (rank * self.bank_count + bank) as usize
    }

    fn bank_mut(&mut self, rank: u32, bank: u32) -> &mut BankState {
        let index = self.bank_index(rank, bank);
        &mut self.banks[index]
    }
}
