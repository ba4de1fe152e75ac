//! Rank timing state: activate spacing, four-activate window, turnarounds,
//! refresh, power state, and per-category energy.

use serde::Serialize;

use super::bank::Bank;
use super::command::CommandType;
use super::timing::{BankTiming, RankEnergy, RankTiming};

/// Power state of a rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PowerState {
    /// Powered up; commands may issue.
    Up,
    /// Precharge power-down; only a power-up may issue, no earlier than `wake_ready`.
    Down {
        /// Earliest power-up cycle.
        wake_ready: u64,
    },
}

/// Energy accrued by one rank, in picojoules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RankEnergyCounter {
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
    /// Standby and power-down background.
    pub background: u64,
}

/// One rank and its banks.
#[derive(Clone, Debug)]
pub struct Rank {
    banks: Vec<Bank>,
    act_ready: u64,
    faw_ready: [u64; 4],
    read_ready: u64,
    write_ready: u64,
    power: PowerState,
    energy: RankEnergyCounter,
}

impl Rank {
    /// Creates a powered-up rank of `bank_count` precharged banks.
    pub fn new(bank_count: u32) -> Self {
        Self {
            banks: vec![Bank::new(); bank_count as usize],
            act_ready: 0,
            faw_ready: [0; 4],
            read_ready: 0,
            write_ready: 0,
            power: PowerState::Up,
            energy: RankEnergyCounter::default(),
        }
    }

    /// Returns the bank at `index`.
    #[inline]
    pub fn bank(&self, index: u32) -> &Bank {
        &self.banks[index as usize]
    }

    /// Returns the current power state.
    #[inline]
    pub fn power_state(&self) -> PowerState {
        self.power
    }

    /// Returns accrued energy.
    #[inline]
    pub fn energy(&self) -> &RankEnergyCounter {
        &self.energy
    }

    /// Returns the earliest issue cycle of `command` on `bank`.
    ///
    /// # Panics
    ///
    /// Panics if the command is illegal in the current bank or power state.
    pub fn ready_time(&self, command: CommandType, bank: u32) -> u64 {
        match command {
            CommandType::PowerUp => match self.power {
                PowerState::Down { wake_ready } => wake_ready,
                PowerState::Up => panic!("power-up issued to a rank that is already up"),
            },
            CommandType::PowerDown => {
                assert!(
                    self.power == PowerState::Up,
                    "power-down issued to a sleeping rank"
                );
                0
            }
            _ => {
                assert!(
                    self.power == PowerState::Up,
                    "{command} issued to a sleeping rank"
                );
                let bank = self.bank(bank);
                match command {
                    CommandType::Activate => bank
                        .ready_time(command)
                        .max(self.act_ready)
                        .max(self.faw_ready[0]),
                    CommandType::Read | CommandType::ReadPrecharge => {
                        bank.ready_time(command).max(self.read_ready)
                    }
                    CommandType::Write | CommandType::WritePrecharge => {
                        bank.ready_time(command).max(self.write_ready)
                    }
                    CommandType::Refresh => self
                        .banks
                        .iter()
                        .map(|b| b.ready_time(CommandType::Activate))
                        .fold(self.act_ready, u64::max),
                    _ => bank.ready_time(command),
                }
            }
        }
    }

    /// Commits `command` at `clock` and returns the cycle its effect completes.
    pub fn commit(
        &mut self,
        clock: u64,
        command: CommandType,
        bank: u32,
        timing: &RankTiming,
        bank_timing: &BankTiming,
        energy: &RankEnergy,
    ) -> u64 {
        match command {
            CommandType::Activate | CommandType::Migrate => {
                self.act_ready = self.act_ready.max(clock + timing.act_to_act);
                self.faw_ready.rotate_left(1);
                self.faw_ready[3] = clock + timing.act_to_faw;
                if command == CommandType::Activate {
                    self.energy.act_pre += energy.activate;
                } else {
                    self.energy.migrate += energy.migrate;
                }
                self.banks[bank as usize].commit(clock, command, bank_timing)
            }
            CommandType::Precharge => {
                self.energy.act_pre += energy.precharge;
                self.banks[bank as usize].commit(clock, command, bank_timing)
            }
            CommandType::Read | CommandType::ReadPrecharge => {
                self.read_ready = self.read_ready.max(clock + timing.read_to_read);
                self.write_ready = self.write_ready.max(clock + timing.read_to_write);
                self.energy.read += energy.read;
                if command == CommandType::ReadPrecharge {
                    self.energy.act_pre += energy.precharge;
                }
                self.banks[bank as usize].commit(clock, command, bank_timing)
            }
            CommandType::Write | CommandType::WritePrecharge => {
                self.read_ready = self.read_ready.max(clock + timing.write_to_read);
                self.write_ready = self.write_ready.max(clock + timing.write_to_write);
                self.energy.write += energy.write;
                if command == CommandType::WritePrecharge {
                    self.energy.act_pre += energy.precharge;
                }
                self.banks[bank as usize].commit(clock, command, bank_timing)
            }
            CommandType::Refresh => {
                assert!(
                    self.banks.iter().all(|b| !b.is_open()),
                    "refresh issued with an open bank"
                );
                self.block_activates(clock + timing.refresh_latency);
                self.energy.refresh += energy.refresh;
                clock
            }
            CommandType::PowerUp => {
                self.block_activates(clock + timing.powerup_latency);
                self.power = PowerState::Up;
                clock
            }
            CommandType::PowerDown => {
                self.power = PowerState::Down {
                    wake_ready: clock + timing.powerdown_latency,
                };
                clock
            }
        }
    }

    /// Accrues one cycle of background energy.
    pub fn cycle(&mut self, energy: &RankEnergy) {
        self.energy.background += match self.power {
            PowerState::Up => energy.powerup_per_cycle,
            PowerState::Down { .. } => energy.powerdown_per_cycle,
        };
    }

    fn block_activates(&mut self, until: u64) {
        self.act_ready = self.act_ready.max(until);
        for ready in &mut self.faw_ready {
            *ready = (*ready).max(until);
        }
    }
}
