//! handle-collections: ordered hash maps, reference-purging maps,
//! cursorable lists and priority buffers built on generational handles.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: build each collection in small layers whose invariants can be
//!   checked one at a time.
//! - Layers:
//!   - HashedMap<K, V, S>: chained hash table over a `SlotMap` arena.
//!     Buckets hold the head handle of a chain; every entry caches its
//!     spread 32-bit hash so resizing never calls user `Hash`.
//!   - LinkedMap<K, V, S>: wraps HashedMap and threads a doubly linked
//!     ring through the entries (values become `Linked<V>`), giving
//!     insertion order and O(1) eldest/youngest access.
//!   - LruMap<K, V, S>: a bounded LinkedMap that moves touched entries to
//!     the young end and evicts the eldest.
//!   - ReferenceMap<K, V, S>: HashedMap of `Indirection`s (hard, soft or
//!     weak `Tracked` handles). Reclaimed referents post notices to a
//!     queue that the map drains before every read and write.
//! - Standalone:
//!   - CursorableList<T>: arena-backed doubly linked list with fail-fast
//!     `ListIter`s and self-healing `Cursor`s.
//!   - PriorityBuffer<T, C>: binary heap ordered by a `Comparator`.
//!   - StaticBucketMap<K, V, S>: fixed bucket array, one `Mutex` per
//!     bucket; the only collection that is `Send`/`Sync`.
//!
//! Detached iteration
//! - Ordered iterators and cursors do not borrow their collection between
//!   steps; the owner is passed into each call (`it.next(&map)`). The
//!   collection stays free for direct mutation, and iterators detect it:
//!   fail-fast iterators compare a modification counter, cursors receive
//!   broadcast events and adjust.
//! - Every collection carries an `OwnerId`. Arena handles from two
//!   instances can alias, so an iterator used with the wrong instance
//!   returns `WrongOwner` instead of reading foreign entries.
//!
//! Reentrancy policy
//! - HashedMap enters a debug-only reentrancy guard around the two sections
//!   that run user code: hashing a query (`"hash"`) and comparing keys along
//!   a chain (`"chain walk"`). A nested entry panics naming both sections.
//!   ReferenceMap hashes its queries through the same guarded table.
//! - Entries removed by ReferenceMap are dropped only after its internal
//!   `RefCell` borrow is released, so user `Drop` may touch the map.
//!
//! Hasher and rehashing invariants
//! - The `BuildHasher` output is folded to 32 bits and mixed (`spread`)
//!   before bucket selection. Bucket counts are powers of two, doubling
//!   at `len >= capacity * load_factor` up to `MAXIMUM_CAPACITY`; chains
//!   absorb anything beyond.
//!
//! Notes and non-goals
//! - Everything but StaticBucketMap is single-threaded.
//! - Soft references have no allocator feedback; `ReferenceMap::release_soft`
//!   is the memory-pressure signal.

pub mod bucket_map;
mod config;
pub mod cursor_list;
mod error;
pub mod hashed_map;
mod hashing;
mod iteration;
pub mod linked_map;
#[cfg(test)]
mod linked_map_proptest;
pub mod lru_map;
pub mod priority_buffer;
mod reentrancy;
pub mod reference_map;
#[cfg(feature = "serde")]
mod serde_impls;
mod tracked;

// Public surface
pub use bucket_map::StaticBucketMap;
pub use config::{HashConfig, DEFAULT_CAPACITY, DEFAULT_LOAD_FACTOR, MAXIMUM_CAPACITY};
pub use cursor_list::{Cursor, CursorableList, ListIter};
pub use error::{CollectionError, Result};
pub use hashed_map::{EntryKey, HashedMap};
pub use hashing::spread;
pub use iteration::{BidiIterator, OwnerId};
pub use linked_map::{LinkedMap, OrderedIter};
pub use lru_map::{LruInsert, LruMap};
pub use priority_buffer::{Comparator, NaturalOrder, PriorityBuffer};
pub use reentrancy::DebugReentrancy;
pub use reference_map::{ReferenceMap, ReferenceStrength};
pub use tracked::{ReclaimNotice, ReclaimQueue, Tracked, WeakTracked};
