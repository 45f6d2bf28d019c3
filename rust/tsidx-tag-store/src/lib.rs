//! Ordered value-ID to posting-list maps for inverted tag indexes.
//!
//! # Overview
//!
//! A [`TagStore`] maps 32-bit tag value IDs to posting lists (by default a
//! [`RoaringBitmap`] of series IDs). Keys live only in a compressed presence
//! index; values live in a two-level table whose outer level mirrors the
//! presence index containers and whose inner level is ordered by in-container
//! rank. Lookups resolve a key to `(container, rank)` and index straight into
//! the table.
//!
//! The store is insert-only and first-write-wins: re-inserting a key keeps
//! the original posting list.
//!
//! # Concurrency
//!
//! [`TagStore`] does no internal locking. Build it from a single writer, then
//! share it read-only. [`SharedTagStore`] wraps a store in a reader/writer
//! lock for callers that need concurrent incremental writes.
//!
//! # Building indexes
//!
//! [`TagIndexBuilder`] keeps one store per tag name while a segment is
//! scanned and freezes them into a [`TagIndex`].

pub mod builder;
pub mod shared;
pub mod tag_store;

pub use builder::{TagIndex, TagIndexBuilder, TagIndexBuilderConfig};
pub use roaring::RoaringBitmap;
pub use shared::SharedTagStore;
pub use tag_store::TagStore;
pub use tsidx_presence::{PresenceIndex, RoaringPresence};
