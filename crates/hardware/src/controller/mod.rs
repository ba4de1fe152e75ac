//! Memory controller.
//!
//! The controller is split along the flow of an access:
//! 1. **Hub:** [`ControllerHub`] accepts requests, stages translation and migration, and responds upstream.
//! 2. **Channels:** [`ChannelController`] turns queued transactions into DRAM commands every cycle.
//! 3. **Queues:** [`Pool`] backs every bounded queue; a full pool is back-pressure.
//! 4. **Clocking:** [`ClockDomain`] converts host cycles into DRAM ticks.

/// Per-channel scheduler.
pub mod channel;
/// Host-to-DRAM clock crossing.
pub mod clock;
/// Top-level controller.
pub mod hub;
/// Bounded slot pools.
pub mod pool;
/// Request, transaction, and command entries.
pub mod request;
/// Interconnect interface.
pub mod upstream;

pub use channel::{BankState, ChannelController, RankState, RowDemand};
pub use clock::ClockDomain;
pub use hub::ControllerHub;
pub use pool::{Pool, SlotId};
pub use request::{CommandEntry, Completion, Origin, RequestEntry, Stage, TransactionEntry};
pub use upstream::Upstream;
