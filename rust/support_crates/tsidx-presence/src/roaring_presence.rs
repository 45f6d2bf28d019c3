use roaring::RoaringBitmap;

use crate::{CONTAINER_BITS, ContainerSlot, PresenceIndex, RankLookup, container_of};

/// [`PresenceIndex`] over a [`RoaringBitmap`].
///
/// The bitmap owns the keys. Alongside it the index keeps the sorted list of
/// container prefixes currently in use, which is what turns a prefix into a
/// container ordinal; the bitmap does not expose its container layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoaringPresence {
    keys: RoaringBitmap,
    containers: Vec<u16>,
}

impl RoaringPresence {
    pub fn new() -> RoaringPresence {
        RoaringPresence::default()
    }

    /// Builds a presence index over an existing bitmap.
    pub fn from_bitmap(keys: RoaringBitmap) -> RoaringPresence {
        let mut containers = Vec::new();
        for key in &keys {
            let prefix = container_of(key);
            if containers.last() != Some(&prefix) {
                containers.push(prefix);
            }
        }
        RoaringPresence { keys, containers }
    }

    /// The underlying key bitmap.
    pub fn bitmap(&self) -> &RoaringBitmap {
        &self.keys
    }

    pub fn into_bitmap(self) -> RoaringBitmap {
        self.keys
    }

    pub fn contains(&self, key: u32) -> bool {
        self.keys.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of keys in all containers preceding `prefix`.
    fn keys_below(&self, prefix: u16) -> u64 {
        if prefix == 0 {
            0
        } else {
            self.keys.rank((u32::from(prefix) << CONTAINER_BITS) - 1)
        }
    }
}

impl PresenceIndex for RoaringPresence {
    fn add(&mut self, key: u32) -> bool {
        if !self.keys.insert(key) {
            return false;
        }
        let prefix = container_of(key);
        if let Err(pos) = self.containers.binary_search(&prefix) {
            self.containers.insert(pos, prefix);
        }
        true
    }

    fn contains_and_rank(&self, key: u32) -> RankLookup {
        let prefix = container_of(key);
        let container = match self.containers.binary_search(&prefix) {
            Ok(ordinal) => ContainerSlot::Existing(ordinal),
            Err(ordinal) => ContainerSlot::Missing(ordinal),
        };
        let found = self.keys.contains(key);
        // `rank` counts keys <= key; drop the key itself to get the keys before it.
        let preceding = self.keys.rank(key) - u64::from(found) - self.keys_below(prefix);
        RankLookup {
            found,
            container,
            rank: preceding as u32 + 1,
        }
    }

    fn cardinality(&self) -> u64 {
        self.keys.len()
    }

    fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.keys.iter()
    }

    fn container_count(&self) -> usize {
        self.containers.len()
    }

    fn container_len(&self, ordinal: usize) -> usize {
        let prefix = self.containers[ordinal];
        let last = (u32::from(prefix) << CONTAINER_BITS) | 0xFFFF;
        (self.keys.rank(last) - self.keys_below(prefix)) as usize
    }
}

impl FromIterator<u32> for RoaringPresence {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        RoaringPresence::from_bitmap(iter.into_iter().collect())
    }
}
