//! StaticBucketMap: a thread-safe map with a fixed array of locked buckets.
//!
//! The bucket count is chosen once and never changes, so every operation on
//! a single key locks exactly one bucket. Bulk operations (`put_all`,
//! `clear`, `len`) visit buckets one at a time and are not atomic; use
//! `atomic` to run a closure with every bucket held.

use crate::config::HashConfig;
use crate::error::Result;
use crate::hashing::{bucket_index, hash_of};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;
use parking_lot::{Mutex, MutexGuard};

/// Bucket count used by `StaticBucketMap::new`.
pub const DEFAULT_BUCKETS: usize = 256;

struct Slot<K, V> {
    hash: u32,
    key: K,
    value: V,
}

struct Bucket<K, V> {
    slots: Vec<Slot<K, V>>,
}

impl<K, V> Bucket<K, V> {
    fn position<Q>(&self, hash: u32, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.slots
            .iter()
            .position(|s| s.hash == hash && s.key.borrow() == q)
    }

    fn insert(&mut self, hash: u32, key: K, value: V) -> Option<V>
    where
        K: Eq,
    {
        match self.position(hash, &key) {
            Some(i) => Some(core::mem::replace(&mut self.slots[i].value, value)),
            None => {
                self.slots.push(Slot { hash, key, value });
                None
            }
        }
    }

    fn remove<Q>(&mut self, hash: u32, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let i = self.position(hash, q)?;
        Some(self.slots.swap_remove(i).value)
    }

    fn get<Q>(&self, hash: u32, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.position(hash, q).map(|i| &self.slots[i].value)
    }
}

pub struct StaticBucketMap<K, V, S = DefaultHashBuilder> {
    buckets: Box<[Mutex<Bucket<K, V>>]>,
    hasher: S,
}

impl<K, V> StaticBucketMap<K, V> {
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKETS)
    }

    /// `buckets` is clamped to `MAXIMUM_CAPACITY`, then rounded up to a
    /// power of two.
    pub fn with_buckets(buckets: usize) -> Self {
        let config = HashConfig::default().initial_capacity(buckets);
        Self::build(config.bucket_count(), DefaultHashBuilder::default())
    }
}

impl<K, V> Default for StaticBucketMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> StaticBucketMap<K, V, S> {
    /// Only `initial_capacity` and `max_capacity` matter; the load factor
    /// is validated but unused since the bucket array never grows.
    pub fn with_config_and_hasher(config: HashConfig, hasher: S) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config.bucket_count(), hasher))
    }

    fn build(buckets: usize, hasher: S) -> Self {
        let buckets = (0..buckets)
            .map(|_| Mutex::new(Bucket { slots: Vec::new() }))
            .collect();
        Self { buckets, hasher }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Entry count, summed bucket by bucket; concurrent writers may make
    /// the total stale by the time it returns.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.lock().slots.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.lock().slots.is_empty())
    }

    /// Empty every bucket, one lock at a time.
    pub fn clear(&self) {
        for b in self.buckets.iter() {
            let drained = core::mem::take(&mut b.lock().slots);
            drop(drained);
        }
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.buckets
            .iter()
            .any(|b| b.lock().slots.iter().any(|s| s.value == *value))
    }

    /// Snapshot of the keys, bucket by bucket.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        let mut out = Vec::new();
        for b in self.buckets.iter() {
            out.extend(b.lock().slots.iter().map(|s| s.key.clone()));
        }
        out
    }

    /// Snapshot of the entries, bucket by bucket.
    pub fn entries(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        let mut out = Vec::new();
        for b in self.buckets.iter() {
            out.extend(
                b.lock()
                    .slots
                    .iter()
                    .map(|s| (s.key.clone(), s.value.clone())),
            );
        }
        out
    }

    /// Run `f` while holding every bucket lock.
    ///
    /// Locks are taken in ascending bucket order, so two concurrent
    /// `atomic` calls cannot deadlock against each other.
    pub fn atomic<R>(&self, f: impl FnOnce(&mut Locked<'_, K, V, S>) -> R) -> R {
        log::trace!("locking all {} buckets", self.buckets.len());
        let guards = self.buckets.iter().map(|b| b.lock()).collect();
        let mut locked = Locked { map: self, guards };
        f(&mut locked)
    }
}

impl<K, V, S> StaticBucketMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn locate<Q>(&self, q: &Q) -> (u32, usize)
    where
        Q: ?Sized + Hash,
    {
        let hash = hash_of(&self.hasher, q);
        (hash, bucket_index(hash, self.buckets.len()))
    }

    /// Clone of the value stored under `q`.
    pub fn get<Q>(&self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.with_value(q, V::clone)
    }

    /// Apply `f` to the value under `q` while its bucket is locked.
    pub fn with_value<Q, R>(&self, q: &Q, f: impl FnOnce(&V) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (hash, i) = self.locate(q);
        let bucket = self.buckets[i].lock();
        bucket.get(hash, q).map(f)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (hash, i) = self.locate(q);
        self.buckets[i].lock().position(hash, q).is_some()
    }

    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let (hash, i) = self.locate(&key);
        self.buckets[i].lock().insert(hash, key, value)
    }

    pub fn remove<Q>(&self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (hash, i) = self.locate(q);
        let removed = self.buckets[i].lock().remove(hash, q);
        removed
    }

    /// Insert every pair, one bucket lock at a time.
    pub fn put_all<I: IntoIterator<Item = (K, V)>>(&self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S> fmt::Debug for StaticBucketMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticBucketMap")
            .field("buckets", &self.buckets.len())
            .field("len", &self.len())
            .finish()
    }
}

/// Exclusive view of a `StaticBucketMap` with every bucket locked.
pub struct Locked<'a, K, V, S> {
    map: &'a StaticBucketMap<K, V, S>,
    guards: Vec<MutexGuard<'a, Bucket<K, V>>>,
}

impl<K, V, S> Locked<'_, K, V, S> {
    pub fn len(&self) -> usize {
        self.guards.iter().map(|g| g.slots.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.iter().all(|g| g.slots.is_empty())
    }

    pub fn clear(&mut self) {
        for g in self.guards.iter_mut() {
            g.slots.clear();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.guards
            .iter()
            .flat_map(|g| g.slots.iter().map(|s| (&s.key, &s.value)))
    }
}

impl<K, V, S> Locked<'_, K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (hash, i) = self.map.locate(q);
        self.guards[i].get(hash, q)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (hash, i) = self.map.locate(q);
        let bucket = &mut self.guards[i];
        let at = bucket.position(hash, q)?;
        Some(&mut bucket.slots[at].value)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(q).is_some()
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let (hash, i) = self.map.locate(&key);
        self.guards[i].insert(hash, key, value)
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (hash, i) = self.map.locate(q);
        self.guards[i].remove(hash, q)
    }
}
