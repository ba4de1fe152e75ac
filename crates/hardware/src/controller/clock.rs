//! Host-to-DRAM clock-domain crossing.

/// Picoseconds per second.
const PS_PER_SECOND: u128 = 1_000_000_000_000;

/// Fractional accumulator converting host cycles into DRAM ticks.
///
/// Each host cycle adds `10^12` to the remainder; every `tck_ps × host_freq_hz`
/// accumulated is one DRAM tick. No drift accumulates over long runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockDomain {
    numerator: u128,
    denominator: u128,
    remainder: u128,
    dram_clock: u64,
}

impl ClockDomain {
    /// Creates a crossing for a DRAM clock period of `tck_ps` and a host
    /// frequency of `host_freq_hz`.
    pub fn new(tck_ps: u64, host_freq_hz: u64) -> Self {
        Self {
            numerator: PS_PER_SECOND,
            denominator: (u128::from(tck_ps) * u128::from(host_freq_hz)).max(1),
            remainder: 0,
            dram_clock: 0,
        }
    }

    /// Returns the next DRAM cycle to run.
    #[inline]
    pub fn dram_clock(&self) -> u64 {
        self.dram_clock
    }

    /// Accounts one host cycle and returns how many DRAM ticks it contains.
    pub fn host_cycle(&mut self) -> u64 {
        self.remainder += self.numerator;
        let ticks = self.remainder / self.denominator;
        self.remainder %= self.denominator;
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }

    /// Marks one DRAM tick as executed.
    #[inline]
    pub fn advance(&mut self) {
        self.dram_clock += 1;
    }
}
