//! Memory Request Types.
//!
//! This module defines the values exchanged with the interconnect above the controller:
//! 1. **Operation Kinds:** What the upstream cache asks the memory to do.
//! 2. **Requests:** An inbound access with its identity, address, and origin.
//! 3. **Responses:** The completion message sent back once data is available.

use serde::{Deserialize, Serialize};

/// Type of memory operation carried by an inbound request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryOp {
    /// Demand read of a line.
    ///
    /// Scheduled as a DRAM read; a response with data is returned.
    Read,

    /// Write-allocate from the cache.
    ///
    /// The line is fetched like a read (the cache merges the store); a response is returned.
    Write,

    /// Write-back of a dirty line.
    ///
    /// Scheduled as a DRAM write; no response is sent. Pending updates to the
    /// same address coalesce while they have not been handed to a channel.
    Update,

    /// Clean eviction notice.
    ///
    /// Acknowledged and dropped without touching DRAM.
    Evict,

    /// Explicit migration hint.
    ///
    /// The line is read and its row is promoted to a fast place if it
    /// currently sits in a slow one, regardless of the hotness detector.
    /// No response is sent.
    Migrate,
}

impl MemoryOp {
    /// Returns `true` if the upstream expects a response for this operation.
    pub fn needs_response(self) -> bool {
        matches!(self, Self::Read | Self::Write)
    }
}

/// An inbound memory request delivered by the interconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Unique identity used for annulment and response matching.
    pub id: u64,
    /// Physical byte address.
    pub address: u64,
    /// Requested operation.
    pub op: MemoryOp,
    /// Identifier of the requesting controller (core, cache, ...).
    pub origin: u32,
}

impl Request {
    /// Creates a new request.
    ///
    /// # Arguments
    ///
    /// * `id` - Unique request identity.
    /// * `address` - Physical byte address.
    /// * `op` - Operation kind.
    /// * `origin` - Requesting controller identifier.
    pub fn new(id: u64, address: u64, op: MemoryOp, origin: u32) -> Self {
        Self {
            id,
            address,
            op,
            origin,
        }
    }
}

/// Completion message emitted towards the interconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Response {
    /// The request being answered.
    pub request: Request,
    /// Whether the message carries the line's data.
    pub has_data: bool,
}
