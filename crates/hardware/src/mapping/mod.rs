//! Address mapping and hot-row remapping.
//!
//! The `AddressMapper` turns a flat physical address into [`Coordinates`] and
//! owns all migration state. It provides:
//! 1. **Extraction:** Fixed bit-field split of an address (offset, channel, column, bank, rank, row),
//!    then a second split of the composite row into (group, index, cluster).
//! 2. **Translation:** Index → place through the forward table, gated by a map cache
//!    that models fetching table lines from DRAM.
//! 3. **Detection:** A set-associative counter cache that flags rows reaching the hotness threshold
//!    while sitting in a slow place.
//! 4. **Promotion:** Victim selection and the forward/backward swap.
//!
//! The remapping table itself lives in DRAM rows above the data rows of each
//! bank; [`AddressMapper::lookup_coordinates`] locates a table line.

/// Bit-field layout.
pub mod bitfield;
/// Forward/backward remapping tables.
pub mod remap;
/// Set-associative LRU tag store.
pub mod tags;
/// Promotion victim policies.
pub mod victim;

use self::bitfield::BitField;
use self::remap::{FOOTPRINT_ACCESSED, FOOTPRINT_MIGRATED, RemapTable};
use self::tags::AssociativeTags;
use self::victim::VictimSelect;
use crate::common::Coordinates;
use crate::config::Config;
use crate::dram::DramConfig;

/// Associativity of the detector and the map cache.
pub const TAG_WAYS: usize = 4;

/// Bit layout of an address and of the composite row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BitFields {
    /// Byte within a burst.
    pub offset: BitField,
    /// Channel.
    pub channel: BitField,
    /// Column.
    pub column: BitField,
    /// Bank.
    pub bank: BitField,
    /// Rank.
    pub rank: BitField,
    /// Row.
    pub row: BitField,
    /// Group, over the composite row.
    pub group: BitField,
    /// Index, over the composite row.
    pub index: BitField,
    /// Cluster, over the composite row.
    pub cluster: BitField,
}

/// Address translation, remapping tables, detector, and map cache.
#[derive(Debug)]
pub struct AddressMapper {
    fields: BitFields,
    row_count: u64,
    ratio: u32,
    threshold: u32,
    hash: bool,
    cached: bool,
    detector: AssociativeTags<u32>,
    map_cache: AssociativeTags<()>,
    table: RemapTable,
    victim: Box<dyn VictimSelect>,
}

impl AddressMapper {
    /// Builds the mapper for a validated configuration and its derived geometry.
    pub fn new(config: &Config, dram: &DramConfig) -> Self {
        let mut shift = 0;
        let offset = BitField::next(&mut shift, u64::from(dram.offset_count));
        let channel = BitField::next(&mut shift, u64::from(dram.channel_count));
        let column = BitField::next(&mut shift, u64::from(dram.column_count));
        let bank = BitField::next(&mut shift, u64::from(dram.bank_count));
        let rank = BitField::next(&mut shift, u64::from(dram.rank_count));
        let row = BitField::next(&mut shift, dram.row_count);

        let mut shift = 0;
        let group = BitField::next(&mut shift, dram.group_count);
        let index = BitField::next(&mut shift, u64::from(dram.index_count));
        let cluster = BitField::next(&mut shift, dram.cluster_count);

        let asym = &config.asym;
        Self {
            fields: BitFields {
                offset,
                channel,
                column,
                bank,
                rank,
                row,
                group,
                index,
                cluster,
            },
            row_count: dram.row_count,
            ratio: asym.mat_ratio,
            threshold: asym.det_threshold,
            hash: asym.mat_hash,
            cached: asym.models_map_cache(),
            detector: AssociativeTags::new(asym.det_cache_size, TAG_WAYS),
            map_cache: AssociativeTags::new(asym.map_cache_size, TAG_WAYS),
            table: RemapTable::new(dram.cluster_count, dram.group_count, dram.index_count),
            victim: victim::selector(asym.victim_policy, asym.mat_ratio, asym.mat_group),
        }
    }

    /// Returns the bit layout.
    #[inline]
    pub fn fields(&self) -> &BitFields {
        &self.fields
    }

    /// Returns the fast-place ratio.
    #[inline]
    pub fn ratio(&self) -> u32 {
        self.ratio
    }

    /// Splits `address` into coordinates. The place is left untranslated.
    pub fn extract(&self, address: u64) -> Coordinates {
        let f = &self.fields;
        let channel = f.channel.value(address);
        let rank = f.rank.value(address);
        let bank = f.bank.value(address);
        let row = f.row.value(address);

        let mut composite = channel;
        composite = (composite << f.rank.width) | rank;
        composite = (composite << f.bank.width) | bank;
        composite = (composite << f.row.width) | row;

        let cluster = f.cluster.value(composite);
        let mut index = f.index.value(composite);
        if self.hash {
            index ^= cluster & f.index.mask();
        }

        Coordinates {
            channel: channel as u32,
            rank: rank as u32,
            bank: bank as u32,
            row,
            column: f.column.value(address) as u32,
            offset: f.offset.value(address) as u32,
            cluster,
            group: f.group.value(composite),
            index: index as u32,
            place: None,
        }
    }

    /// Translates the coordinates' index into its current place.
    ///
    /// Returns `false`, leaving `place` untouched, when the table line is not
    /// in the map cache.
    pub fn translate(&mut self, coords: &mut Coordinates) -> bool {
        if self.cached && !self.map_cache.hit(self.line_tag(coords)) {
            return false;
        }
        coords.place = Some(self.forward(coords));
        true
    }

    /// Installs a remap-table line in the map cache.
    pub fn update(&mut self, line_tag: u64) {
        let _ = self.map_cache.access(line_tag);
    }

    /// Marks the row as accessed; returns whether it had been accessed before.
    pub fn allocate(&mut self, coords: &Coordinates) -> bool {
        self.table
            .mark(coords.cluster, coords.group, coords.index, FOOTPRINT_ACCESSED)
    }

    /// Counts an access in the detector.
    ///
    /// Returns `true` exactly when the count reaches the threshold and the row
    /// sits in a slow place.
    pub fn detect(&mut self, coords: &Coordinates) -> bool {
        let count = self.detector.access(self.index_tag(coords));
        *count = count.saturating_add(1);
        *count == self.threshold && !coords.is_fast(self.ratio)
    }

    /// Swaps the row into a fast place chosen by the victim policy.
    ///
    /// Returns whether the row had been migrated before. Emits no commands.
    pub fn promote(&mut self, clock: u64, coords: &Coordinates) -> bool {
        let place = self.victim.victim(&self.table, coords.cluster, coords.group);
        let demoted = self.table.backward(coords.cluster, coords.group, place);
        // Both rows change place; their counts restart so either can heat up again.
        for index in [coords.index, demoted] {
            let tag = self.index_tag(&Coordinates { index, ..*coords });
            let _ = self.detector.remove(tag);
        }
        self.table
            .swap(coords.cluster, coords.group, coords.index, place, clock);
        self.table
            .mark(coords.cluster, coords.group, coords.index, FOOTPRINT_MIGRATED)
    }

    /// Returns the place currently holding the coordinates' index.
    pub fn forward(&self, coords: &Coordinates) -> u32 {
        self.table.forward(coords.cluster, coords.group, coords.index)
    }

    /// Returns the index stored at `place` in the coordinates' domain.
    pub fn backward(&self, coords: &Coordinates, place: u32) -> u32 {
        self.table.backward(coords.cluster, coords.group, place)
    }

    /// Returns the unique tag of (cluster, group, index).
    pub fn index_tag(&self, coords: &Coordinates) -> u64 {
        let f = &self.fields;
        let mut tag = coords.cluster;
        tag = (tag << f.group.width) | coords.group;
        (tag << f.index.width) | u64::from(coords.index)
    }

    /// Returns the tag of the remap-table line holding the coordinates' entry.
    pub fn line_tag(&self, coords: &Coordinates) -> u64 {
        self.index_tag(coords) >> self.fields.offset.width
    }

    /// Returns where a remap-table line lives: the reserved rows above the
    /// data rows, always treated as a fast place.
    pub fn lookup_coordinates(&self, line_tag: u64) -> Coordinates {
        let mut coords = self.extract(line_tag << self.fields.offset.width);
        coords.row += self.row_count;
        coords.place = Some(0);
        coords
    }
}
