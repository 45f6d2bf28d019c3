//! Presence index abstraction for rank-addressed tag stores.
//!
//! A presence index is a compressed set of 32-bit keys partitioned into
//! containers by the high 16 bits of each key. Besides membership and
//! insertion, it answers a combined "contains + rank" query which locates a
//! key by container ordinal and by its 1-based position inside the container.
//! Tag stores use that pair to address a parallel table of values without
//! storing the keys a second time.
//!
//! [`RoaringPresence`] is the default implementation, backed by
//! [`roaring::RoaringBitmap`].

mod roaring_presence;

pub use roaring_presence::RoaringPresence;

/// Number of low-order key bits addressed within a single container.
pub const CONTAINER_BITS: u32 = 16;

/// Returns the container prefix (high 16 bits) of a key.
#[inline]
pub fn container_of(key: u32) -> u16 {
    (key >> CONTAINER_BITS) as u16
}

/// Location of a container among the containers of a presence index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerSlot {
    /// The container exists at the given ordinal.
    Existing(usize),
    /// No such container yet. The ordinal is where it will land once a key
    /// with this prefix is added; every container at or after it shifts up.
    Missing(usize),
}

impl ContainerSlot {
    /// Ordinal of the existing container, if any.
    pub fn existing(self) -> Option<usize> {
        match self {
            ContainerSlot::Existing(ordinal) => Some(ordinal),
            ContainerSlot::Missing(_) => None,
        }
    }
}

/// Result of [`PresenceIndex::contains_and_rank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankLookup {
    /// Whether the key is present.
    pub found: bool,
    /// The container holding (or that would hold) the key.
    pub container: ContainerSlot,
    /// 1-based ascending position of the key within its container.
    ///
    /// When the key is absent this is the position it takes once inserted,
    /// so `rank - 1` is the insertion index in a parallel sequence.
    pub rank: u32,
}

impl RankLookup {
    /// 0-based index of the key within its container.
    #[inline]
    pub fn index(&self) -> usize {
        self.rank as usize - 1
    }
}

/// The narrow contract a tag store requires from its key set.
pub trait PresenceIndex {
    /// Adds a key. Returns `true` if the key was not present before.
    fn add(&mut self, key: u32) -> bool;

    /// Locates `key` by container ordinal and in-container rank.
    fn contains_and_rank(&self, key: u32) -> RankLookup;

    /// Total number of distinct keys.
    fn cardinality(&self) -> u64;

    /// Enumerates all keys in ascending order.
    fn keys(&self) -> impl Iterator<Item = u32> + '_;

    /// Number of non-empty containers.
    fn container_count(&self) -> usize;

    /// Number of keys in the container at `ordinal`.
    ///
    /// # Panics
    ///
    /// Panics if `ordinal >= self.container_count()`.
    fn container_len(&self, ordinal: usize) -> usize;
}
