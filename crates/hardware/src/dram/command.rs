//! DRAM command set.

use std::fmt;

use serde::Serialize;

/// Command issued on a channel's command bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum CommandType {
    /// Open a row into the bank's row buffer.
    Activate,
    /// Close the bank's open row.
    Precharge,
    /// Column read from the open row.
    Read,
    /// Column write to the open row.
    Write,
    /// Column read followed by an automatic precharge.
    ReadPrecharge,
    /// Column write followed by an automatic precharge.
    WritePrecharge,
    /// In-DRAM row swap between a slow and a fast place.
    Migrate,
    /// Rank-wide refresh; every bank must be precharged.
    Refresh,
    /// Exit power-down.
    PowerUp,
    /// Enter precharge power-down.
    PowerDown,
}

impl CommandType {
    /// Returns `true` for the read variants.
    #[inline]
    pub fn is_read(self) -> bool {
        matches!(self, Self::Read | Self::ReadPrecharge)
    }

    /// Returns `true` for the write variants.
    #[inline]
    pub fn is_write(self) -> bool {
        matches!(self, Self::Write | Self::WritePrecharge)
    }

    /// Returns `true` for commands that target a row and are issued on behalf of a transaction.
    #[inline]
    pub fn is_access(self) -> bool {
        self.is_read() || self.is_write() || self == Self::Migrate
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Activate => "ACT",
            Self::Precharge => "PRE",
            Self::Read => "RD",
            Self::Write => "WR",
            Self::ReadPrecharge => "RDA",
            Self::WritePrecharge => "WRA",
            Self::Migrate => "MIG",
            Self::Refresh => "REF",
            Self::PowerUp => "PDX",
            Self::PowerDown => "PDE",
        };
        f.write_str(name)
    }
}
