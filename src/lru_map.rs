//! LruMap: a bounded LinkedMap that keeps entries in least-recently-used order.

use crate::config::HashConfig;
use crate::error::{CollectionError, Result};
use crate::linked_map::{Iter, LinkedMap};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;

/// Outcome of an insertion into a bounded map.
#[derive(Debug, PartialEq, Eq)]
pub enum LruInsert<K, V> {
    /// A new key was added without evicting anything.
    Inserted,
    /// The key existed; its previous value is returned.
    Replaced(V),
    /// A new key was added and the eldest entry was evicted to make room.
    Evicted { key: K, value: V },
}

/// Bounded map ordered from least to most recently used.
///
/// `get` and `insert` move the touched entry to the most-recently-used end;
/// `peek` reads without reordering.
pub struct LruMap<K, V, S = DefaultHashBuilder> {
    map: LinkedMap<K, V, S>,
    max_size: usize,
}

impl<K, V> LruMap<K, V> {
    pub fn new(max_size: usize) -> Result<Self> {
        Self::with_hasher(max_size, DefaultHashBuilder::default())
    }
}

impl<K, V, S> LruMap<K, V, S> {
    pub fn with_hasher(max_size: usize, hasher: S) -> Result<Self> {
        let config = HashConfig::default().initial_capacity(max_size.min(1 << 16));
        Self::with_config_and_hasher(max_size, config, hasher)
    }

    pub fn with_config_and_hasher(max_size: usize, config: HashConfig, hasher: S) -> Result<Self> {
        if max_size == 0 {
            return Err(CollectionError::invalid("LRU maximum size must be at least 1"));
        }
        Ok(Self {
            map: LinkedMap::with_config_and_hasher(config, hasher)?,
            max_size,
        })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn is_full(&self) -> bool {
        self.map.len() >= self.max_size
    }

    /// Least recently used entry.
    pub fn eldest(&self) -> Option<(&K, &V)> {
        self.map.front()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Entries from least to most recently used.
    pub fn iter(&self) -> Iter<'_, K, V, S> {
        self.map.iter()
    }
}

impl<K, V, S> LruMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Look up `q` and mark it most recently used.
    pub fn get<Q>(&mut self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.map.find(q)?;
        self.map.move_to_back(h);
        self.map.pair(h).map(|(_, v)| v)
    }

    /// Look up `q` without touching recency.
    pub fn peek<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.get(q)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.contains_key(q)
    }

    pub fn insert(&mut self, key: K, value: V) -> LruInsert<K, V> {
        if let Some(h) = self.map.find(&key) {
            self.map.move_to_back(h);
            let (_, old) = self.map.insert_full(key, value);
            return match old {
                Some(v) => LruInsert::Replaced(v),
                None => LruInsert::Inserted,
            };
        }
        let evicted = if self.is_full() {
            self.map.pop_front()
        } else {
            None
        };
        self.map.insert(key, value);
        match evicted {
            Some((key, value)) => {
                log::debug!("evicted eldest entry from LRU map at capacity {}", self.max_size);
                LruInsert::Evicted { key, value }
            }
            None => LruInsert::Inserted,
        }
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.map.remove(q)
    }
}

impl<K: core::fmt::Debug, V: core::fmt::Debug, S> core::fmt::Debug for LruMap<K, V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LruMap")
            .field("max_size", &self.max_size)
            .field("entries", &self.map)
            .finish()
    }
}
