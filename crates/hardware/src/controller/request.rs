//! Queue entries for the three tiers of an access.
//!
//! A request accepted by the hub becomes a `RequestEntry`. Each DRAM access it
//! needs (its own column access, a remap-table write, a migration) becomes a
//! `TransactionEntry` in a channel, and every admitted DRAM command becomes a
//! `CommandEntry` until it finishes.

use super::pool::SlotId;
use crate::common::{Coordinates, Request};
use crate::dram::CommandType;

/// Processing stage of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Waiting for the index to translate into a place. Entries start here.
    Translate,
    /// Waiting for the request's own transaction to be accepted.
    Issue,
    /// Hot row: waiting for the remap-table write to be accepted.
    Update,
    /// Hot row: waiting for the migration transaction to be accepted.
    Migrate,
    /// All transactions accepted.
    Finish,
    /// Cancelled after its transaction was accepted.
    Annul,
}

impl Stage {
    /// Returns `true` if no transaction has been handed to a channel yet.
    #[inline]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Translate | Self::Issue)
    }

    /// Returns `true` once no further transactions will be issued.
    #[inline]
    pub fn is_done(self) -> bool {
        matches!(self, Self::Finish | Self::Annul)
    }
}

/// Who a transaction or command is working for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Controller housekeeping: remap-table writes and migrations.
    Internal,
    /// The request in this hub slot.
    Request(SlotId),
    /// A remap-table line read on a map-cache miss.
    Lookup(u64),
}

/// Completion event produced by a channel's retirement step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Completion {
    /// A request's column access finished.
    Access(SlotId),
    /// A remap-table line read finished.
    Lookup(u64),
}

/// A request tracked by the hub.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestEntry {
    /// The inbound request.
    pub request: Request,
    /// Command its own transaction uses.
    pub command: CommandType,
    /// Target location; `place` is set by translation.
    pub coords: Coordinates,
    /// Current stage.
    pub stage: Stage,
    /// The row was found hot (or migration was forced) at translation.
    pub detected: bool,
    /// Cancelled by the upstream; never gets a response.
    pub annulled: bool,
    /// No further response work is pending.
    pub responded: bool,
}

impl RequestEntry {
    /// Creates an entry in the `Translate` stage.
    pub fn new(request: Request, command: CommandType, coords: Coordinates) -> Self {
        Self {
            request,
            command,
            coords,
            stage: Stage::Translate,
            detected: false,
            annulled: false,
            responded: false,
        }
    }

    /// Returns the stage an entry enters once its last transaction is accepted.
    #[inline]
    pub fn terminal_stage(&self) -> Stage {
        if self.annulled { Stage::Annul } else { Stage::Finish }
    }

    /// Returns `true` once the entry can be released.
    #[inline]
    pub fn is_retired(&self) -> bool {
        self.responded && self.stage.is_done()
    }
}

/// A row-level access queued in a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransactionEntry {
    /// Column or migrate command to issue once the row is open.
    pub command: CommandType,
    /// Target location.
    pub coords: Coordinates,
    /// Owner.
    pub origin: Origin,
    /// The transaction had to open its row.
    pub missed: bool,
    /// Place a migration moves its row to.
    pub destination: Option<u32>,
}

/// A DRAM command admitted to the device model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandEntry {
    /// Command.
    pub command: CommandType,
    /// Target location.
    pub coords: Coordinates,
    /// Owner.
    pub origin: Origin,
    /// Issue cycle.
    pub issue_time: u64,
    /// Cycle its effect completes.
    pub finish_time: u64,
}
