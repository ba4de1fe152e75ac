//! Forward/backward remapping tables.
//!
//! Every remap domain (cluster, group) owns `slots` entries. `forward[index]`
//! is the place currently holding the logical row `index`; `backward[place]`
//! is the index stored at `place`. The two arrays are inverse permutations at
//! all times.

/// Footprint flag: the index has been accessed.
pub const FOOTPRINT_ACCESSED: u8 = 1;

/// Footprint flag: the index has been migrated.
pub const FOOTPRINT_MIGRATED: u8 = 2;

/// Remapping state for every domain.
#[derive(Clone, Debug)]
pub struct RemapTable {
    forward: Vec<u32>,
    backward: Vec<u32>,
    footprint: Vec<u8>,
    timestamp: Vec<Option<u64>>,
    groups: u64,
    slots: u32,
}

impl RemapTable {
    /// Creates identity mappings for `clusters × groups` domains of `slots` entries.
    pub fn new(clusters: u64, groups: u64, slots: u32) -> Self {
        let domains = usize::try_from(clusters * groups).unwrap_or(usize::MAX);
        let identity: Vec<u32> = (0..domains).flat_map(|_| 0..slots).collect();
        let len = identity.len();
        Self {
            forward: identity.clone(),
            backward: identity,
            footprint: vec![0; len],
            timestamp: vec![None; len],
            groups,
            slots,
        }
    }

    /// Returns the number of slots per domain.
    #[inline]
    pub fn slots(&self) -> u32 {
        self.slots
    }

    /// Returns the place currently holding `index`.
    #[inline]
    pub fn forward(&self, cluster: u64, group: u64, index: u32) -> u32 {
        self.forward[self.slot(cluster, group, index)]
    }

    /// Returns the index currently stored at `place`.
    #[inline]
    pub fn backward(&self, cluster: u64, group: u64, place: u32) -> u32 {
        self.backward[self.slot(cluster, group, place)]
    }

    /// Returns the cycle `index` was last moved by a migration.
    #[inline]
    pub fn timestamp(&self, cluster: u64, group: u64, index: u32) -> Option<u64> {
        self.timestamp[self.slot(cluster, group, index)]
    }

    /// Sets `flag` on `index` and returns whether it was already set.
    pub fn mark(&mut self, cluster: u64, group: u64, index: u32, flag: u8) -> bool {
        let slot = self.slot(cluster, group, index);
        let already = self.footprint[slot] & flag != 0;
        self.footprint[slot] |= flag;
        already
    }

    /// Moves `index` to `place`, moving the previous occupant of `place` into
    /// the slot `index` vacated. Both indices are stamped with `clock`.
    ///
    /// # Panics
    ///
    /// Panics if the tables stop being inverse permutations.
    pub fn swap(&mut self, cluster: u64, group: u64, index: u32, place: u32, clock: u64) {
        let other_index = self.backward(cluster, group, place);
        let other_place = self.forward(cluster, group, index);

        let a = self.slot(cluster, group, index);
        let b = self.slot(cluster, group, other_index);
        self.forward.swap(a, b);

        let a = self.slot(cluster, group, place);
        let b = self.slot(cluster, group, other_place);
        self.backward.swap(a, b);

        for i in [index, other_index] {
            let slot = self.slot(cluster, group, i);
            self.timestamp[slot] = Some(clock);
            let back = self.backward(cluster, group, self.forward[slot]);
            assert_eq!(
                back, i,
                "remap tables diverged in domain ({cluster}, {group}) at index {i}"
            );
        }
    }

    fn slot(&self, cluster: u64, group: u64, index: u32) -> usize {
        debug_assert!(index < self.slots, "slot {index} out of range");
        let domain = cluster * self.groups + group;
        usize::try_from(domain * u64::from(self.slots) + u64::from(index)).unwrap_or(usize::MAX)
    }
}
