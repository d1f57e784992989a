//! HashedMap: chained hash table over an entry arena with stable handles.
//!
//! Buckets hold the handle of the first entry of their chain; each entry
//! carries its cached (spread) hash and the handle of the next entry in the
//! same bucket. Rehashing only recomputes bucket indices from cached hashes,
//! so `K: Hash` never runs after insertion.

use crate::config::HashConfig;
use crate::error::Result;
use crate::hashing::{bucket_index, hash_of};
use crate::iteration::OwnerId;
use crate::reentrancy::DebugReentrancy;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Stable handle to one entry of a hashed collection.
    pub struct EntryKey;
}

#[derive(Debug, Clone)]
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) hash: u32,
    next: Option<EntryKey>,
}

/// Chained hash table. Every entry is linked under the hash of its own key,
/// so a key is stored at most once and `get` finds what `insert` stored.
///
/// ```
/// use handle_collections::HashedMap;
///
/// let mut m: HashedMap<&str, i32> = HashedMap::new();
/// assert_eq!(m.insert("a", 1), None);
/// assert_eq!(m.insert("a", 2), Some(1));
/// assert_eq!((m.len(), m.get("a")), (1, Some(&2)));
/// ```
///
/// Linking under an arbitrary hash is crate-internal:
///
/// ```compile_fail
/// use handle_collections::HashedMap;
///
/// let mut m: HashedMap<&str, i32> = HashedMap::new();
/// m.insert_raw(0, "a", 1);
/// ```
pub struct HashedMap<K, V, S = DefaultHashBuilder> {
    hasher: S,
    config: HashConfig,
    buckets: Vec<Option<EntryKey>>,
    threshold: usize,
    entries: SlotMap<EntryKey, Entry<K, V>>,
    mod_count: u64,
    owner: OwnerId,
    reentrancy: DebugReentrancy,
}

impl<K, V> HashedMap<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }

    pub fn with_config(config: HashConfig) -> Result<Self> {
        Self::with_config_and_hasher(config, DefaultHashBuilder::default())
    }
}

impl<K, V> Default for HashedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HashedMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::build(HashConfig::default(), hasher)
    }

    pub fn with_config_and_hasher(config: HashConfig, hasher: S) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, hasher))
    }

    fn build(config: HashConfig, hasher: S) -> Self {
        let capacity = config.bucket_count();
        Self {
            hasher,
            config,
            buckets: vec![None; capacity],
            threshold: config.threshold_for(capacity),
            entries: SlotMap::with_capacity_and_key(capacity),
            mod_count: 0,
            owner: OwnerId::fresh(),
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current number of buckets.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn config(&self) -> &HashConfig {
        &self.config
    }

    /// Number of structural modifications made so far.
    pub fn mod_count(&self) -> u64 {
        self.mod_count
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner
    }

    /// Record a structural change made by a wrapping layer (e.g. reordering).
    pub(crate) fn bump_mod_count(&mut self) {
        self.mod_count += 1;
    }

    pub fn contains_handle(&self, h: EntryKey) -> bool {
        self.entries.contains_key(h)
    }

    pub fn entry_key(&self, h: EntryKey) -> Option<&K> {
        self.entries.get(h).map(|e| &e.key)
    }

    pub fn entry_value(&self, h: EntryKey) -> Option<&V> {
        self.entries.get(h).map(|e| &e.value)
    }

    pub fn entry_value_mut(&mut self, h: EntryKey) -> Option<&mut V> {
        self.entries.get_mut(h).map(|e| &mut e.value)
    }

    pub fn entry_pair(&self, h: EntryKey) -> Option<(&K, &V)> {
        self.entries.get(h).map(|e| (&e.key, &e.value))
    }

    pub fn entry_pair_mut(&mut self, h: EntryKey) -> Option<(&K, &mut V)> {
        self.entries.get_mut(h).map(|e| (&e.key, &mut e.value))
    }

    pub fn entry_hash(&self, h: EntryKey) -> Option<u32> {
        self.entries.get(h).map(|e| e.hash)
    }

    /// Find an entry by cached hash and a caller-supplied key predicate.
    ///
    /// This is the lookup primitive for layers whose stored keys cannot be
    /// hashed directly (for example weakly held keys).
    pub(crate) fn find_raw<F>(&self, hash: u32, mut eq: F) -> Option<EntryKey>
    where
        F: FnMut(&K) -> bool,
    {
        let _g = self.reentrancy.enter("chain walk");
        let mut cur = self.buckets[bucket_index(hash, self.buckets.len())];
        while let Some(h) = cur {
            let e = &self.entries[h];
            if e.hash == hash && eq(&e.key) {
                return Some(h);
            }
            cur = e.next;
        }
        None
    }

    /// Handles in the bucket chain that `hash` maps to, in chain order.
    pub(crate) fn chain(&self, hash: u32) -> Chain<'_, K, V> {
        Chain {
            entries: &self.entries,
            cur: self.buckets[bucket_index(hash, self.buckets.len())],
        }
    }

    /// Link a new entry under `hash` without checking for duplicates.
    pub(crate) fn insert_raw(&mut self, hash: u32, key: K, value: V) -> EntryKey {
        let idx = bucket_index(hash, self.buckets.len());
        let next = self.buckets[idx];
        let h = self.entries.insert(Entry {
            key,
            value,
            hash,
            next,
        });
        self.buckets[idx] = Some(h);
        self.mod_count += 1;
        self.check_capacity();
        h
    }

    /// Unlink an entry from its bucket chain and return its key and value.
    pub fn remove_handle(&mut self, h: EntryKey) -> Option<(K, V)> {
        let hash = self.entries.get(h)?.hash;
        let idx = bucket_index(hash, self.buckets.len());
        let mut prev: Option<EntryKey> = None;
        let mut cur = self.buckets[idx];
        while let Some(c) = cur {
            let next = self.entries[c].next;
            if c == h {
                match prev {
                    None => self.buckets[idx] = next,
                    Some(p) => self.entries[p].next = next,
                }
                break;
            }
            prev = cur;
            cur = next;
        }
        // Structure is consistent before the entry (and user data) drops.
        let entry = self.entries.remove(h)?;
        self.mod_count += 1;
        Some((entry.key, entry.value))
    }

    /// Remove every entry; the bucket array keeps its size.
    pub fn clear(&mut self) {
        self.mod_count += 1;
        for b in self.buckets.iter_mut() {
            *b = None;
        }
        self.entries.clear();
    }

    /// Remove every entry for which `keep` returns false.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let doomed: Vec<EntryKey> = self
            .entries
            .iter_mut()
            .filter_map(|(h, e)| (!keep(&e.key, &mut e.value)).then_some(h))
            .collect();
        for h in doomed {
            self.remove_handle(h);
        }
    }

    fn check_capacity(&mut self) {
        if self.entries.len() < self.threshold {
            return;
        }
        let old = self.buckets.len();
        let new_capacity = (old * 2).min(self.config.max_capacity);
        if new_capacity <= old {
            return;
        }
        self.rehash(new_capacity);
    }

    fn rehash(&mut self, new_capacity: usize) {
        log::debug!(
            "resizing hash table from {} to {} buckets ({} entries)",
            self.buckets.len(),
            new_capacity,
            self.entries.len()
        );
        let old = core::mem::replace(&mut self.buckets, vec![None; new_capacity]);
        for head in old {
            let mut cur = head;
            while let Some(h) = cur {
                let e = &mut self.entries[h];
                cur = e.next;
                let idx = bucket_index(e.hash, new_capacity);
                e.next = self.buckets[idx];
                self.buckets[idx] = Some(h);
            }
        }
        self.threshold = self.config.threshold_for(new_capacity);
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            it: self.entries.iter(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            it: self.entries.iter_mut(),
        }
    }

    /// Handles of every live entry, in arena order.
    pub fn handles(&self) -> impl Iterator<Item = EntryKey> + '_ {
        self.entries.keys()
    }

    /// Mutable access to stored keys. Callers must not change a key's hash
    /// or equality.
    pub(crate) fn pairs_mut(&mut self) -> impl Iterator<Item = (&mut K, &mut V)> {
        self.entries.values_mut().map(|e| (&mut e.key, &mut e.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.values().map(|e| &e.key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().map(|e| &e.value)
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.entries.values().any(|e| &e.value == value)
    }

    #[cfg(test)]
    pub(crate) fn chain_lengths(&self) -> Vec<usize> {
        (0..self.buckets.len())
            .map(|i| {
                let mut n = 0;
                let mut cur = self.buckets[i];
                while let Some(h) = cur {
                    n += 1;
                    cur = self.entries[h].next;
                }
                n
            })
            .collect()
    }
}

impl<K, V, S: BuildHasher> HashedMap<K, V, S> {
    /// Spread hash of `q`. Stored keys need not be `Hash` themselves, so
    /// layers holding indirect keys hash their queries through here too.
    pub(crate) fn make_hash<Q>(&self, q: &Q) -> u32
    where
        Q: ?Sized + Hash,
    {
        let _g = self.reentrancy.enter("hash");
        hash_of(&self.hasher, q)
    }
}

impl<K, V, S> HashedMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Handle of the entry stored under `q`, if any.
    pub fn find<Q>(&self, q: &Q) -> Option<EntryKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        self.find_raw(hash, |k| k.borrow() == q)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).and_then(|h| self.entry_value(h))
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).and_then(|h| self.entry_pair(h))
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.find(q)?;
        self.entry_value_mut(h)
    }

    /// Insert or update; an update keeps the entry (and its handle) in place
    /// and returns the previous value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.insert_full(key, value).1
    }

    /// Like `insert`, also returning the handle of the affected entry.
    pub fn insert_full(&mut self, key: K, value: V) -> (EntryKey, Option<V>) {
        let hash = self.make_hash(&key);
        if let Some(h) = self.find_raw(hash, |k| *k == key) {
            let old = core::mem::replace(&mut self.entries[h].value, value);
            return (h, Some(old));
        }
        (self.insert_raw(hash, key, value), None)
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let h = self.find(q)?;
        self.remove_handle(h)
    }
}

impl<K: Clone, V: Clone, S: Clone> Clone for HashedMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            hasher: self.hasher.clone(),
            config: self.config,
            buckets: self.buckets.clone(),
            threshold: self.threshold,
            entries: self.entries.clone(),
            mod_count: 0,
            owner: OwnerId::fresh(),
            reentrancy: DebugReentrancy::new(),
        }
    }
}

impl<K: core::fmt::Debug, V: core::fmt::Debug, S> core::fmt::Debug for HashedMap<K, V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Iterator over a bucket chain, yielding entry handles.
pub(crate) struct Chain<'a, K, V> {
    entries: &'a SlotMap<EntryKey, Entry<K, V>>,
    cur: Option<EntryKey>,
}

impl<'a, K, V> Iterator for Chain<'a, K, V> {
    type Item = EntryKey;
    fn next(&mut self) -> Option<EntryKey> {
        let h = self.cur?;
        self.cur = self.entries.get(h).and_then(|e| e.next);
        Some(h)
    }
}

/// Iterator over immutable entries in arena order.
pub struct Iter<'a, K, V> {
    it: slotmap::basic::Iter<'a, EntryKey, Entry<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, e)| (&e.key, &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

/// Iterator over mutable entries in arena order.
pub struct IterMut<'a, K, V> {
    it: slotmap::basic::IterMut<'a, EntryKey, Entry<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, e)| (&e.key, &mut e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}
