//! Bank timing state.
//!
//! A bank records, per command class, the earliest cycle at which that command
//! may issue. `None` marks a command that is illegal in the bank's current
//! state (for example a read while the bank is precharged).

use super::command::CommandType;
use super::timing::BankTiming;

/// Ready times of a single bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bank {
    act_ready: Option<u64>,
    pre_ready: Option<u64>,
    mig_ready: Option<u64>,
    read_ready: Option<u64>,
    write_ready: Option<u64>,
}

impl Default for Bank {
    fn default() -> Self {
        Self::new()
    }
}

impl Bank {
    /// Creates a precharged bank that may activate immediately.
    pub fn new() -> Self {
        Self {
            act_ready: Some(0),
            pre_ready: None,
            mig_ready: None,
            read_ready: None,
            write_ready: None,
        }
    }

    /// Returns `true` if the bank holds an open row.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.act_ready.is_none()
    }

    /// Returns the earliest issue cycle of `command`, if it is legal at all.
    pub fn try_ready_time(&self, command: CommandType) -> Option<u64> {
        match command {
            CommandType::Activate => self.act_ready,
            CommandType::Precharge => self.pre_ready,
            CommandType::Read | CommandType::ReadPrecharge => self.read_ready,
            CommandType::Write | CommandType::WritePrecharge => self.write_ready,
            CommandType::Migrate => self.mig_ready,
            CommandType::Refresh | CommandType::PowerUp | CommandType::PowerDown => {
                panic!("{command} is not a bank command")
            }
        }
    }

    /// Returns the earliest issue cycle of `command`.
    ///
    /// # Panics
    ///
    /// Panics if `command` is illegal in the bank's current state.
    pub fn ready_time(&self, command: CommandType) -> u64 {
        match self.try_ready_time(command) {
            Some(ready) => ready,
            None => panic!("{command} issued to a bank in the wrong state: {self:?}"),
        }
    }

    /// Commits `command` at `clock` and returns the cycle its effect completes.
    ///
    /// # Panics
    ///
    /// Panics if `command` is illegal or `clock` precedes its ready time.
    pub fn commit(&mut self, clock: u64, command: CommandType, timing: &BankTiming) -> u64 {
        let ready = self.ready_time(command);
        assert!(
            clock >= ready,
            "{command} at cycle {clock} before bank ready time {ready}"
        );

        match command {
            CommandType::Activate => {
                self.act_ready = None;
                self.pre_ready = Some(clock + timing.act_to_pre);
                self.mig_ready = Some(clock + timing.act_to_mig);
                self.read_ready = Some(clock + timing.act_to_read);
                self.write_ready = Some(clock + timing.act_to_write);
                clock
            }
            CommandType::Precharge => {
                self.close(clock + timing.pre_to_act);
                clock
            }
            CommandType::Read => {
                self.act_ready = None;
                self.pre_ready = widen(self.pre_ready, clock + timing.read_to_pre);
                self.mig_ready = widen(self.mig_ready, clock + timing.read_to_mig);
                clock + timing.read_latency
            }
            CommandType::ReadPrecharge => {
                self.close(clock + timing.read_to_pre + timing.pre_to_act);
                clock + timing.read_latency
            }
            CommandType::Write => {
                self.act_ready = None;
                self.pre_ready = widen(self.pre_ready, clock + timing.write_to_pre);
                self.mig_ready = widen(self.mig_ready, clock + timing.write_to_mig);
                clock + timing.write_latency
            }
            CommandType::WritePrecharge => {
                self.close(clock + timing.write_to_pre + timing.pre_to_act);
                clock + timing.write_latency
            }
            CommandType::Migrate => {
                let done = clock + timing.mig_latency;
                self.act_ready = None;
                self.pre_ready = Some(done + timing.act_to_pre);
                self.mig_ready = Some(done + timing.act_to_mig);
                self.read_ready = Some(done + timing.act_to_read);
                self.write_ready = Some(done + timing.act_to_write);
                done
            }
            CommandType::Refresh | CommandType::PowerUp | CommandType::PowerDown => {
                unreachable!("rejected by ready_time")
            }
        }
    }

    fn close(&mut self, act_ready: u64) {
        self.act_ready = Some(act_ready);
        self.pre_ready = None;
        self.mig_ready = None;
        self.read_ready = None;
        self.write_ready = None;
    }
}

fn widen(current: Option<u64>, candidate: u64) -> Option<u64> {
    Some(current.map_or(candidate, |t| t.max(candidate)))
}
