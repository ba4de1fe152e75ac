//! DRAM Coordinates.
//!
//! A `Coordinates` value locates one burst inside the memory system. The
//! hierarchical fields (channel → rank → bank → row → column → offset) route a
//! command to a bank; the remap fields (cluster, group, index, place) locate the
//! row inside its migration domain.

use std::fmt;

use serde::Serialize;

/// Hierarchical and remap-domain location of an access.
///
/// Produced by [`AddressMapper::extract`](crate::mapping::AddressMapper::extract);
/// `place` stays `None` until the mapper has translated the index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Coordinates {
    /// Channel number.
    pub channel: u32,
    /// Rank within the channel.
    pub rank: u32,
    /// Bank within the rank.
    pub bank: u32,
    /// Row within the bank.
    pub row: u64,
    /// Column (burst) within the row.
    pub column: u32,
    /// Byte offset within the burst.
    pub offset: u32,
    /// Remap cluster (channel × rank × bank bucket).
    pub cluster: u64,
    /// Row group inside the cluster.
    pub group: u64,
    /// Logical slot of the row inside its group.
    pub index: u32,
    /// Physical slot currently holding `index`, once translated.
    pub place: Option<u32>,
}

impl Coordinates {
    /// Returns `true` if the translated place lies in the fast sub-range.
    ///
    /// Fast places are the multiples of `ratio`. Untranslated coordinates are
    /// treated as slow.
    #[inline]
    pub fn is_fast(&self, ratio: u32) -> bool {
        match self.place {
            Some(place) => ratio > 0 && place % ratio == 0,
            None => false,
        }
    }

    /// Returns `true` if both coordinates address the same row of the same bank.
    #[inline]
    pub fn same_row(&self, other: &Self) -> bool {
        self.rank == other.rank && self.bank == other.bank && self.row == other.row
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{channel: {}, rank: {}, bank: {}, row: {:#x}, column: {}, group: {}, index: {}",
            self.channel, self.rank, self.bank, self.row, self.column, self.group, self.index
        )?;
        match self.place {
            Some(place) => write!(f, ", place: {place}}}"),
            None => write!(f, ", place: -}}"),
        }
    }
}
