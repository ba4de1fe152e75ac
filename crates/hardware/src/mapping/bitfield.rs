//! Contiguous bit-field extraction.

use serde::Serialize;

/// A `width`-bit field starting at bit `shift`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BitField {
    /// Position of the field's least significant bit.
    pub shift: u32,
    /// Field width in bits.
    pub width: u32,
}

impl BitField {
    /// Lays out a field of `count` values (a power of two) at `*shift` and advances `*shift`.
    pub fn next(shift: &mut u32, count: u64) -> Self {
        let field = Self {
            shift: *shift,
            width: log2(count),
        };
        *shift += field.width;
        field
    }

    /// Returns the mask of the field's value, right-aligned.
    #[inline]
    pub fn mask(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    /// Extracts the field from `bits`.
    #[inline]
    pub fn value(&self, bits: u64) -> u64 {
        bits.checked_shr(self.shift).unwrap_or(0) & self.mask()
    }
}

/// Base-2 logarithm of a power of two.
#[inline]
pub fn log2(count: u64) -> u32 {
    debug_assert!(count.is_power_of_two(), "{count} is not a power of two");
    count.trailing_zeros()
}
