//! Fixed-capacity slot pool.
//!
//! Every queue in the controller (requests, transactions, commands) is a
//! `Pool`: an owning arena of slots, a free-list of vacant indices, and a
//! live list that preserves allocation order. It provides:
//! 1. **Allocation:** `alloc` hands out a `SlotId`, or `None` when full (back-pressure).
//! 2. **Lookup:** Stable ids remain valid until the slot is freed.
//! 3. **Ordered walk:** `ids` snapshots live slots oldest first, so callers may free while walking.

/// Handle to an occupied pool slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub usize);

/// Fixed-capacity arena with allocation-order iteration.
#[derive(Clone, Debug)]
pub struct Pool<T> {
    slots: Vec<Option<T>>,
    free: Vec<usize>,
    live: Vec<SlotId>,
}

impl<T> Pool<T> {
    /// Creates an empty pool holding at most `capacity` values.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            free: (0..capacity).rev().collect(),
            live: Vec::with_capacity(capacity),
        }
    }

    /// Returns the pool capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of occupied slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns true if no slot is occupied.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Returns true if every slot is occupied.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    /// Stores `value` in a vacant slot.
    ///
    /// # Returns
    ///
    /// The new slot, or `None` if the pool is full.
    pub fn alloc(&mut self, value: T) -> Option<SlotId> {
        let index = self.free.pop()?;
        self.slots[index] = Some(value);
        let id = SlotId(index);
        self.live.push(id);
        Some(id)
    }

    /// Vacates `id` and returns its value.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not occupied.
    pub fn free(&mut self, id: SlotId) -> T {
        let Some(value) = self.slots.get_mut(id.0).and_then(Option::take) else {
            panic!("freeing vacant pool slot {}", id.0);
        };
        self.live.retain(|&live| live != id);
        self.free.push(id.0);
        value
    }

    /// Returns the value in `id`, if occupied.
    #[inline]
    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// Returns the value in `id` mutably, if occupied.
    #[inline]
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Returns a snapshot of live slots, oldest first.
    pub fn ids(&self) -> Vec<SlotId> {
        self.live.clone()
    }

    /// Iterates live values, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (SlotId, &T)> + '_ {
        self.live
            .iter()
            .filter_map(|&id| self.get(id).map(|value| (id, value)))
    }
}
