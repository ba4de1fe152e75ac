//! Set-associative tag store with LRU replacement.
//!
//! Used twice by the mapper: as the hotness detector (value = access counter)
//! and as the map cache (value = `()`, presence only). Each set keeps a usage
//! stack; index 0 is the most recently used way and the last index is the victim.
//!
//! # Performance
//!
//! - `hit()` / `access()`: O(W) where W is the associativity.
//! - Space: O(S × W) where S is the number of sets.

/// A resident tag and its payload.
#[derive(Clone, Debug)]
struct TagLine<V> {
    tag: u64,
    value: V,
}

/// Set-associative tag store.
#[derive(Clone, Debug)]
pub struct AssociativeTags<V> {
    lines: Vec<Option<TagLine<V>>>,
    usage: Vec<Vec<usize>>,
    sets: usize,
    ways: usize,
}

impl<V: Default> AssociativeTags<V> {
    /// Creates an empty store of `entries` lines organized in `ways`-way sets.
    ///
    /// # Arguments
    ///
    /// * `entries` - Total line count; rounded down to a multiple of `ways`, minimum one set.
    /// * `ways` - Associativity.
    pub fn new(entries: u64, ways: usize) -> Self {
        let ways = ways.max(1);
        let sets = (usize::try_from(entries).unwrap_or(usize::MAX) / ways).max(1);
        Self {
            lines: (0..sets * ways).map(|_| None).collect(),
            usage: (0..sets).map(|_| (0..ways).collect()).collect(),
            sets,
            ways,
        }
    }

    /// Returns `true` if `tag` is resident, promoting it to most recently used.
    pub fn hit(&mut self, tag: u64) -> bool {
        let set = self.set_of(tag);
        match self.find(set, tag) {
            Some(way) => {
                self.touch(set, way);
                true
            }
            None => false,
        }
    }

    /// Returns `true` if `tag` is resident without touching the usage order.
    pub fn contains(&self, tag: u64) -> bool {
        self.find(self.set_of(tag), tag).is_some()
    }

    /// Accesses `tag`, installing it over the LRU way on a miss.
    ///
    /// Returns the line's payload; a freshly installed line holds `V::default()`.
    pub fn access(&mut self, tag: u64) -> &mut V {
        let set = self.set_of(tag);
        let way = match self.find(set, tag) {
            Some(way) => way,
            None => {
                let victim = self.usage[set][self.ways - 1];
                self.lines[set * self.ways + victim] = Some(TagLine {
                    tag,
                    value: V::default(),
                });
                victim
            }
        };
        self.touch(set, way);
        match &mut self.lines[set * self.ways + way] {
            Some(line) => &mut line.value,
            None => unreachable!("line installed above"),
        }
    }

    /// Drops `tag` if resident, returning its payload. The freed way becomes
    /// the set's next victim.
    pub fn remove(&mut self, tag: u64) -> Option<V> {
        let set = self.set_of(tag);
        let way = self.find(set, tag)?;
        let stack = &mut self.usage[set];
        if let Some(pos) = stack.iter().position(|&x| x == way) {
            let _ = stack.remove(pos);
        }
        stack.push(way);
        self.lines[set * self.ways + way].take().map(|line| line.value)
    }

    fn set_of(&self, tag: u64) -> usize {
        (tag % self.sets as u64) as usize
    }

    fn find(&self, set: usize, tag: u64) -> Option<usize> {
        let base = set * self.ways;
        (0..self.ways).find(|&way| {
            self.lines[base + way]
                .as_ref()
                .is_some_and(|line| line.tag == tag)
        })
    }

    fn touch(&mut self, set: usize, way: usize) {
        let stack = &mut self.usage[set];
        if let Some(pos) = stack.iter().position(|&x| x == way) {
            let _ = stack.remove(pos);
        }
        stack.insert(0, way);
    }
}
