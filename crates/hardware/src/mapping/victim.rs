//! Victim selection for row promotion.
//!
//! A victim is always a fast place (a multiple of the ratio) inside the
//! promoted row's domain; its current occupant is demoted to the slow place
//! the promoted row vacates.

use std::fmt;

use super::remap::RemapTable;
use crate::config::VictimPolicy;

/// Trait for promotion victim policies.
pub trait VictimSelect: fmt::Debug + Send + Sync {
    /// Selects the fast place to swap with in domain (`cluster`, `group`).
    fn victim(&mut self, table: &RemapTable, cluster: u64, group: u64) -> u32;
}

/// Builds the selector for `policy`.
///
/// # Arguments
///
/// * `policy` - Configured policy.
/// * `ratio` - One place in every `ratio` is fast.
/// * `slots` - Places per domain.
pub fn selector(policy: VictimPolicy, ratio: u32, slots: u32) -> Box<dyn VictimSelect> {
    match policy {
        VictimPolicy::Serial => Box::new(SerialVictim::new(ratio, slots)),
        VictimPolicy::Order => Box::new(OrderVictim::new(ratio, slots)),
        VictimPolicy::Last => Box::new(LastVictim::new(ratio, slots)),
    }
}

/// Round-robin over fast places, shared by every domain.
#[derive(Debug)]
pub struct SerialVictim {
    next: u32,
    ratio: u32,
    slots: u32,
}

impl SerialVictim {
    /// Creates a counter starting at place 0.
    pub fn new(ratio: u32, slots: u32) -> Self {
        Self {
            next: 0,
            ratio,
            slots,
        }
    }
}

impl VictimSelect for SerialVictim {
    fn victim(&mut self, _table: &RemapTable, _cluster: u64, _group: u64) -> u32 {
        let place = self.next;
        self.next = (self.next + self.ratio) % self.slots;
        place
    }
}

/// Fast place whose occupant moved least recently.
///
/// Occupants that never moved count as oldest; ties go to the lowest place.
#[derive(Debug)]
pub struct OrderVictim {
    ratio: u32,
    slots: u32,
}

impl OrderVictim {
    /// Creates the policy.
    pub fn new(ratio: u32, slots: u32) -> Self {
        Self { ratio, slots }
    }
}

impl VictimSelect for OrderVictim {
    fn victim(&mut self, table: &RemapTable, cluster: u64, group: u64) -> u32 {
        (0..self.slots)
            .step_by(self.ratio as usize)
            .min_by_key(|&place| {
                let index = table.backward(cluster, group, place);
                table.timestamp(cluster, group, index)
            })
            .unwrap_or(0)
    }
}

/// Pseudo-random fast place that never repeats the previous pick.
///
/// Uses a xorshift generator; a repeat is replaced by the next fast place.
#[derive(Debug)]
pub struct LastVictim {
    state: u64,
    last: Option<u32>,
    ratio: u32,
    slots: u32,
}

impl LastVictim {
    /// Creates the policy with a fixed seed.
    pub fn new(ratio: u32, slots: u32) -> Self {
        Self {
            state: 123_456_789,
            last: None,
            ratio,
            slots,
        }
    }
}

impl VictimSelect for LastVictim {
    fn victim(&mut self, _table: &RemapTable, _cluster: u64, _group: u64) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;

        let fast = u64::from(self.slots / self.ratio);
        let mut place = ((x % fast) as u32) * self.ratio;
        if self.last == Some(place) && fast > 1 {
            place = (place + self.ratio) % self.slots;
        }
        self.last = Some(place);
        place
    }
}
