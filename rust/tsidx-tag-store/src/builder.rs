//! Per-field tag index construction.
//!
//! While a segment is scanned, [`TagIndexBuilder`] keeps one [`TagStore`]
//! per tag (or field) name and routes `(value_id, posting list)` pairs to it.
//! [`TagIndexBuilder::finish`] freezes the stores into a read-only
//! [`TagIndex`] that can be shared across query threads.
//!
//! Posting lists may arrive already serialized in the portable roaring
//! format. A record that fails to decode is logged and skipped by default,
//! so one corrupt record does not abort the whole build.

use ahash::AHashMap;
use roaring::RoaringBitmap;
use tsidx_common::{Result, error::Error};

use crate::TagStore;

/// Configuration for [`TagIndexBuilder`].
#[derive(Debug, Clone)]
pub struct TagIndexBuilderConfig {
    /// Skip (and log) records whose posting list cannot be decoded, instead
    /// of returning an error.
    pub skip_malformed_records: bool,
    /// Upper bound on the size of a serialized posting list. Larger records
    /// are treated as malformed.
    pub max_encoded_posting_len: Option<usize>,
    /// Expected number of distinct fields.
    pub field_capacity: usize,
}

impl Default for TagIndexBuilderConfig {
    fn default() -> Self {
        TagIndexBuilderConfig {
            skip_malformed_records: true,
            max_encoded_posting_len: None,
            field_capacity: 16,
        }
    }
}

/// Builds one [`TagStore`] per field name.
pub struct TagIndexBuilder {
    config: TagIndexBuilderConfig,
    fields: AHashMap<String, TagStore>,
    skipped_records: u64,
}

impl TagIndexBuilder {
    pub fn new() -> TagIndexBuilder {
        TagIndexBuilder::with_config(Default::default())
    }

    pub fn with_config(config: TagIndexBuilderConfig) -> TagIndexBuilder {
        TagIndexBuilder {
            fields: AHashMap::with_capacity(config.field_capacity),
            config,
            skipped_records: 0,
        }
    }

    /// The configuration this builder was created with.
    pub fn config(&self) -> &TagIndexBuilderConfig {
        &self.config
    }

    /// Adds the posting list for `value_id` of `field`.
    ///
    /// Returns `false` if the field already had a posting list for this
    /// value ID; the existing one is kept.
    pub fn put_posting(&mut self, field: &str, value_id: u32, postings: RoaringBitmap) -> bool {
        if let Some(store) = self.fields.get_mut(field) {
            return store.put(value_id, postings);
        }
        self.fields
            .entry(field.to_owned())
            .or_default()
            .put(value_id, postings)
    }

    /// Decodes a serialized posting list and adds it.
    ///
    /// Returns `Ok(false)` when the record was skipped, either because it is
    /// malformed and `skip_malformed_records` is set, or because the value
    /// ID is already present.
    pub fn put_encoded(&mut self, field: &str, value_id: u32, encoded: &[u8]) -> Result<bool> {
        match self.decode_posting(encoded) {
            Ok(postings) => Ok(self.put_posting(field, value_id, postings)),
            Err(e) if self.config.skip_malformed_records => {
                log::warn!("skipping malformed posting list for {field}={value_id}: {e}");
                self.skipped_records += 1;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// The in-progress store for `field`.
    pub fn field(&self, field: &str) -> Option<&TagStore> {
        self.fields.get(field)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Number of records dropped as malformed.
    pub fn skipped_records(&self) -> u64 {
        self.skipped_records
    }

    /// Freezes all stores into a [`TagIndex`].
    pub fn finish(self) -> TagIndex {
        let mut fields = self.fields.into_iter().collect::<Vec<_>>();
        fields.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        log::debug!(
            "tag index built: {} fields, {} value ids, {} skipped records",
            fields.len(),
            fields.iter().map(|(_, store)| store.len()).sum::<usize>(),
            self.skipped_records
        );
        TagIndex {
            fields,
            skipped_records: self.skipped_records,
        }
    }

    fn decode_posting(&self, encoded: &[u8]) -> Result<RoaringBitmap> {
        if let Some(max_len) = self.config.max_encoded_posting_len {
            if encoded.len() > max_len {
                return Err(Error::invalid_format(
                    "posting list",
                    format!("{} bytes exceeds limit of {max_len}", encoded.len()),
                ));
            }
        }
        let mut reader = encoded;
        let postings = RoaringBitmap::deserialize_from(&mut reader)
            .map_err(|e| Error::decode("posting list", e))?;
        if !reader.is_empty() {
            return Err(Error::invalid_format(
                "posting list",
                format!("{} trailing bytes after bitmap", reader.len()),
            ));
        }
        Ok(postings)
    }
}

impl Default for TagIndexBuilder {
    fn default() -> Self {
        TagIndexBuilder::new()
    }
}

/// Read-only set of per-field tag stores, ordered by field name.
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    fields: Vec<(String, TagStore)>,
    skipped_records: u64,
}

impl TagIndex {
    /// Posting list of `value_id` within `field`.
    pub fn lookup(&self, field: &str, value_id: u32) -> Option<&RoaringBitmap> {
        self.field(field)?.get(value_id)
    }

    pub fn field(&self, field: &str) -> Option<&TagStore> {
        self.fields
            .binary_search_by(|(name, _)| name.as_str().cmp(field))
            .ok()
            .map(|i| &self.fields[i].1)
    }

    /// `(field name, store)` pairs in ascending name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &TagStore)> + '_ {
        self.fields
            .iter()
            .map(|(name, store)| (name.as_str(), store))
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn skipped_records(&self) -> u64 {
        self.skipped_records
    }

    /// Consumes the index, returning the stores in ascending name order.
    pub fn into_fields(self) -> Vec<(String, TagStore)> {
        self.fields
    }
}
