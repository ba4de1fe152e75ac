//! DRAM device timing model.
//!
//! A pure state machine over the channel → rank → bank hierarchy. It knows
//! nothing about requests or queues; callers ask when a command may issue and
//! then commit it:
//! 1. **Admission:** `Channel::get_ready_time` returns the earliest legal issue cycle.
//! 2. **Commit:** `Channel::get_finish_time` records the command, widens every
//!    affected constraint, accrues energy, and returns the completion cycle.
//! 3. **Background:** `Channel::cycle` accrues per-cycle clock and standby energy.

/// Bank ready-time state.
pub mod bank;
/// Channel (bus) state and energy breakdown.
pub mod channel;
/// Command set.
pub mod command;
/// Rank state, power state, and rank energy.
pub mod rank;
/// Derived geometry and timing/energy tables.
pub mod timing;

pub use bank::Bank;
pub use channel::{Channel, EnergyBreakdown};
pub use command::CommandType;
pub use rank::{PowerState, Rank};
pub use timing::{BankTiming, ChannelTiming, DramConfig, RankTiming};
