use roaring::RoaringBitmap;
use tsidx_common::{Result, error::Error, verify_arg, verify_data};
use tsidx_presence::{ContainerSlot, PresenceIndex, RoaringPresence};

/// An ordered map from 32-bit value IDs to posting lists.
///
/// Keys are held only by the presence index `P`. Values are kept in a
/// two-level table: `values[c]` holds the values of the `c`-th presence
/// container, ordered by the ascending rank of their keys within it. For
/// every present key `k`, the value lives at
/// `values[container(k)][rank(k) - 1]`.
///
/// Insertion is first-write-wins and keys are never removed.
#[derive(Clone, PartialEq)]
pub struct TagStore<V = RoaringBitmap, P = RoaringPresence> {
    presence: P,
    values: Vec<Vec<V>>,
}

impl<V> TagStore<V, RoaringPresence> {
    /// Creates an empty store backed by a roaring bitmap.
    pub fn new() -> Self {
        TagStore {
            presence: RoaringPresence::new(),
            values: Vec::new(),
        }
    }

    /// The key set as a roaring bitmap.
    pub fn key_bitmap(&self) -> &RoaringBitmap {
        self.presence.bitmap()
    }
}

impl<V, P: PresenceIndex> TagStore<V, P> {
    /// Creates an empty store over the given presence index, which must not
    /// hold any keys.
    pub fn with_presence(presence: P) -> Result<Self> {
        verify_arg!(presence, presence.cardinality() == 0);
        Ok(TagStore {
            presence,
            values: Vec::new(),
        })
    }

    /// Reassembles a store from the output of [`TagStore::into_parts`].
    ///
    /// Fails if the value table does not have exactly one container per
    /// presence container, each holding one value per key.
    pub fn from_parts(presence: P, values: Vec<Vec<V>>) -> Result<Self> {
        verify_data!(values, values.len() == presence.container_count());
        for (ordinal, container) in values.iter().enumerate() {
            let expected = presence.container_len(ordinal);
            if container.len() != expected {
                return Err(Error::invalid_format(
                    "values",
                    format!(
                        "container {ordinal} holds {} values, expected {expected}",
                        container.len()
                    ),
                ));
            }
        }
        Ok(TagStore { presence, values })
    }

    /// Returns the value stored for `key`.
    pub fn get(&self, key: u32) -> Option<&V> {
        if self.values.is_empty() {
            return None;
        }
        let lookup = self.presence.contains_and_rank(key);
        if !lookup.found {
            return None;
        }
        let ordinal = lookup.container.existing()?;
        Some(&self.values[ordinal][lookup.index()])
    }

    /// Returns `true` if the store holds a value for `key`.
    pub fn contains_key(&self, key: u32) -> bool {
        self.get(key).is_some()
    }

    /// Associates `value` with `key` unless the key is already present.
    ///
    /// Returns `true` if the key was inserted. An existing key keeps its
    /// original value and `value` is dropped.
    pub fn put(&mut self, key: u32, value: V) -> bool {
        if self.values.is_empty() {
            self.presence.add(key);
            self.values.push(vec![value]);
            return true;
        }

        let lookup = self.presence.contains_and_rank(key);
        if lookup.found {
            return false;
        }

        self.presence.add(key);
        match lookup.container {
            ContainerSlot::Existing(ordinal) => {
                self.values[ordinal].insert(lookup.index(), value);
            }
            ContainerSlot::Missing(ordinal) => {
                // A new prefix lands between its neighbours, not necessarily last.
                self.values.insert(ordinal, vec![value]);
            }
        }
        true
    }

    /// All keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.presence.keys()
    }

    /// The raw value table, one inner vector per presence container.
    pub fn values(&self) -> &[Vec<V>] {
        &self.values
    }

    /// `(key, value)` pairs in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &V)> + '_ {
        self.presence.keys().zip(self.values.iter().flatten())
    }

    /// The presence index holding the keys. Read-only, so it cannot drift
    /// from the value table.
    pub fn presence(&self) -> &P {
        &self.presence
    }

    /// Number of distinct keys.
    ///
    /// Saturates at `usize::MAX` on targets where the full `u32` key space
    /// does not fit.
    pub fn len(&self) -> usize {
        usize::try_from(self.presence.cardinality()).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn container_count(&self) -> usize {
        self.values.len()
    }

    /// Splits the store into its presence index and value table.
    pub fn into_parts(self) -> (P, Vec<Vec<V>>) {
        (self.presence, self.values)
    }

    /// Verifies that the value table mirrors the presence index.
    ///
    /// # Panics
    ///
    /// Panics if the internal state is inconsistent.
    pub fn verify(&self) {
        assert_eq!(self.values.len(), self.presence.container_count());
        for (ordinal, container) in self.values.iter().enumerate() {
            assert_eq!(container.len(), self.presence.container_len(ordinal));
        }
        let mut expected = self.values.iter().enumerate().flat_map(|(ordinal, c)| {
            (0..c.len()).map(move |index| (ordinal, index))
        });
        for key in self.presence.keys() {
            let lookup = self.presence.contains_and_rank(key);
            assert!(lookup.found, "key {key} not found in its own presence index");
            let position = (lookup.container.existing(), lookup.index());
            let (ordinal, index) = expected.next().expect("more keys than values");
            assert_eq!(position, (Some(ordinal), index), "key {key} out of place");
        }
        assert!(expected.next().is_none(), "more values than keys");
    }
}

impl<V, P: Default> Default for TagStore<V, P> {
    fn default() -> Self {
        TagStore {
            presence: P::default(),
            values: Vec::new(),
        }
    }
}

impl<V, P: PresenceIndex> std::fmt::Debug for TagStore<V, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagStore")
            .field("len", &self.len())
            .field("containers", &self.container_count())
            .finish_non_exhaustive()
    }
}

impl<V, P: PresenceIndex> Extend<(u32, V)> for TagStore<V, P> {
    fn extend<I: IntoIterator<Item = (u32, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.put(key, value);
        }
    }
}

impl<V> FromIterator<(u32, V)> for TagStore<V, RoaringPresence> {
    fn from_iter<I: IntoIterator<Item = (u32, V)>>(iter: I) -> Self {
        let mut store = TagStore::new();
        store.extend(iter);
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsidx_common::error::ErrorKind;

    fn postings(ids: &[u32]) -> RoaringBitmap {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_get_on_empty() {
        let store = TagStore::<RoaringBitmap>::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        for key in [0, 1, 5, 0x0001_0000, u32::MAX] {
            assert!(store.get(key).is_none());
        }
        assert_eq!(store.keys().count(), 0);
        assert!(store.values().is_empty());
        store.verify();
    }

    #[test]
    fn test_single_put() {
        let mut store = TagStore::new();
        assert!(store.put(5, postings(&[1, 2, 3])));
        assert_eq!(store.get(5), Some(&postings(&[1, 2, 3])));
        assert!(store.get(6).is_none());
        assert!(store.get(4).is_none());
        assert_eq!(store.len(), 1);
        store.verify();
    }

    #[test]
    fn test_first_write_wins() {
        let mut store = TagStore::new();
        assert!(store.put(1, "a"));
        assert!(!store.put(1, "b"));
        assert_eq!(store.get(1), Some(&"a"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.values(), &[vec!["a"]]);
    }

    #[test]
    fn test_containers_by_high_bits() {
        let mut store = TagStore::new();
        store.put(0x0001_0001, "a");
        store.put(0x0001_0002, "b");
        store.put(0x0002_0001, "c");

        assert_eq!(
            store.keys().collect::<Vec<_>>(),
            vec![0x0001_0001, 0x0001_0002, 0x0002_0001]
        );
        assert_eq!(store.container_count(), 2);
        assert_eq!(store.values()[0], vec!["a", "b"]);
        assert_eq!(store.values()[1], vec!["c"]);
        store.verify();
    }

    #[test]
    fn test_descending_within_container() {
        let mut store = TagStore::new();
        store.put(30, "l");
        store.put(20, "k");
        store.put(10, "j");

        assert_eq!(store.get(10), Some(&"j"));
        assert_eq!(store.get(20), Some(&"k"));
        assert_eq!(store.get(30), Some(&"l"));
        assert_eq!(store.keys().collect::<Vec<_>>(), vec![10, 20, 30]);
        assert_eq!(store.values(), &[vec!["j", "k", "l"]]);
        store.verify();
    }

    #[test]
    fn test_new_container_before_existing() {
        let mut store = TagStore::new();
        store.put(0x0003_0000, "c");
        store.put(0x0001_0005, "a");
        store.put(0x0002_0000, "b");
        store.put(0x0001_0001, "a0");

        assert_eq!(store.container_count(), 3);
        assert_eq!(store.values()[0], vec!["a0", "a"]);
        assert_eq!(store.values()[1], vec!["b"]);
        assert_eq!(store.values()[2], vec!["c"]);
        assert_eq!(store.get(0x0001_0005), Some(&"a"));
        assert_eq!(store.get(0x0003_0000), Some(&"c"));
        store.verify();
    }

    #[test]
    fn test_middle_insert_shifts_later_values() {
        let mut store = TagStore::new();
        store.put(1, 10);
        store.put(9, 90);
        store.put(5, 50);
        store.put(7, 70);
        assert_eq!(store.values(), &[vec![10, 50, 70, 90]]);
        assert_eq!(
            store.iter().collect::<Vec<_>>(),
            vec![(1, &10), (5, &50), (7, &70), (9, &90)]
        );
    }

    #[test]
    fn test_extreme_keys() {
        let mut store = TagStore::new();
        store.put(u32::MAX, "max");
        store.put(0, "zero");
        store.put(0xFFFF, "low-max");
        store.put(0x0001_0000, "high-min");
        assert_eq!(store.get(u32::MAX), Some(&"max"));
        assert_eq!(store.get(0), Some(&"zero"));
        assert_eq!(store.get(0xFFFF), Some(&"low-max"));
        assert_eq!(store.get(0x0001_0000), Some(&"high-min"));
        assert_eq!(store.container_count(), 3);
        store.verify();
    }

    #[test]
    fn test_from_iterator_and_extend() {
        let mut store: TagStore<&str> = [(3, "c"), (1, "a"), (3, "z")].into_iter().collect();
        store.extend([(2, "b"), (1, "y")]);
        assert_eq!(store.len(), 3);
        assert_eq!(
            store.iter().collect::<Vec<_>>(),
            vec![(1, &"a"), (2, &"b"), (3, &"c")]
        );
    }

    #[test]
    fn test_into_and_from_parts() {
        let store: TagStore<u64> = [(0x0002_0001, 21), (1, 1), (2, 2)].into_iter().collect();
        let (presence, values) = store.clone().into_parts();
        let restored = TagStore::from_parts(presence, values).unwrap();
        assert_eq!(restored, store);
        restored.verify();
    }

    #[test]
    fn test_from_parts_rejects_mismatched_shape() {
        let store: TagStore<u64> = [(0x0002_0001, 21), (1, 1), (2, 2)].into_iter().collect();
        let (presence, mut values) = store.into_parts();

        let e = TagStore::from_parts(presence.clone(), vec![values[0].clone()]).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::InvalidFormat { .. }));

        values[0].pop();
        let e = TagStore::from_parts(presence, values).unwrap_err();
        match e.kind() {
            ErrorKind::InvalidFormat { element, message } => {
                assert_eq!(element, "values");
                assert!(message.contains("container 0"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_with_presence() {
        let store = TagStore::<u64, _>::with_presence(RoaringPresence::new()).unwrap();
        assert!(store.is_empty());

        let mut presence = RoaringPresence::new();
        presence.add(4);
        let e = TagStore::<u64, _>::with_presence(presence).unwrap_err();
        assert!(matches!(e.kind(), ErrorKind::InvalidArgument { .. }));
    }

    #[test]
    fn test_key_bitmap() {
        let store: TagStore<u8> = [(9, 0), (3, 0)].into_iter().collect();
        assert_eq!(store.key_bitmap(), &postings(&[3, 9]));
        assert!(store.contains_key(9));
        assert!(!store.contains_key(4));
    }

    #[test]
    fn test_len_matches_presence_for_full_container() {
        let mut store = TagStore::new();
        for key in 0..=0xFFFFu32 {
            store.put(key, key as u16);
        }
        store.put(0x0001_0000, 0);
        assert_eq!(store.len(), 0x1_0001);
        assert_eq!(store.presence().cardinality(), 0x1_0001);
        assert_eq!(store.presence().container_len(0), 0x1_0000);
        assert_eq!(store.presence().container_count(), store.container_count());
        assert_eq!(store.get(0xFFFF), Some(&0xFFFF));
        assert_eq!(store.get(0), Some(&0));
    }

    #[test]
    fn test_debug() {
        let store: TagStore<u8> = [(1, 0), (0x0001_0000, 0)].into_iter().collect();
        let debug_str = format!("{store:?}");
        assert!(debug_str.contains("TagStore"));
        assert!(debug_str.contains("len: 2"));
        assert!(debug_str.contains("containers: 2"));
    }

    #[test]
    #[should_panic]
    fn test_verify_detects_desync() {
        let mut store: TagStore<u8> = [(1, 0), (2, 0)].into_iter().collect();
        store.values[0].pop();
        store.verify();
    }
}
