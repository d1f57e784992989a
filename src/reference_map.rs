//! ReferenceMap: a hashed map whose keys and/or values may be held weakly.
//!
//! Keys and values are `Tracked<T>` referents stored behind an
//! `Indirection`, chosen per map for keys and values independently:
//!
//! - `Hard`: the map owns a strong handle.
//! - `Soft`: strong until `release_soft` signals memory pressure, weak after.
//! - `Weak`: the map never keeps the referent alive.
//!
//! When a weakly held referent is reclaimed it posts a notice to the map's
//! `ReclaimQueue`. Every public read and write drains that queue first and
//! unlinks the affected entries (`purge`). Reads still re-check liveness on
//! their own, so a stale entry that has not been purged yet is never
//! reported as present.

use crate::config::HashConfig;
use crate::error::{CollectionError, Result};
use crate::hashed_map::{EntryKey, HashedMap};
use crate::tracked::{ReclaimQueue, Tracked, WeakTracked};
use core::borrow::Borrow;
use core::cell::RefCell;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;

/// How strongly the map holds a key or a value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReferenceStrength {
    Hard,
    Soft,
    Weak,
}

enum Indirection<T> {
    Hard(Tracked<T>),
    Soft(Tracked<T>, WeakTracked<T>),
    Weak(WeakTracked<T>),
}

impl<T> Indirection<T> {
    fn new(strength: ReferenceStrength, referent: Tracked<T>) -> Self {
        match strength {
            ReferenceStrength::Hard => Indirection::Hard(referent),
            ReferenceStrength::Soft => {
                let weak = referent.downgrade();
                Indirection::Soft(referent, weak)
            }
            ReferenceStrength::Weak => Indirection::Weak(referent.downgrade()),
        }
    }

    fn get(&self) -> Option<Tracked<T>> {
        match self {
            Indirection::Hard(t) | Indirection::Soft(t, _) => Some(t.clone()),
            Indirection::Weak(w) => w.upgrade(),
        }
    }

    fn is_live(&self) -> bool {
        match self {
            Indirection::Hard(_) | Indirection::Soft(..) => true,
            Indirection::Weak(w) => w.is_live(),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        match self {
            Indirection::Hard(t) | Indirection::Soft(t, _) => Some(f(t)),
            Indirection::Weak(w) => w.upgrade().map(|t| f(&t)),
        }
    }

    fn points_at(&self, referent: usize) -> bool {
        match self {
            Indirection::Hard(t) => t.addr() == referent,
            Indirection::Soft(_, w) | Indirection::Weak(w) => w.addr() == referent,
        }
    }

    /// Demote a soft indirection to weak, handing back the strong handle.
    fn soften(&mut self) -> Option<Tracked<T>> {
        if let Indirection::Soft(_, w) = self {
            let weak = w.clone();
            if let Indirection::Soft(strong, _) = core::mem::replace(self, Indirection::Weak(weak))
            {
                return Some(strong);
            }
        }
        None
    }
}

type Table<K, V, S> = HashedMap<Indirection<K>, Indirection<V>, S>;

pub struct ReferenceMap<K, V, S = DefaultHashBuilder> {
    table: RefCell<Table<K, V, S>>,
    key_strength: ReferenceStrength,
    value_strength: ReferenceStrength,
    queue: ReclaimQueue,
}

impl<K, V> ReferenceMap<K, V> {
    /// A map holding keys and values with the given strengths.
    ///
    /// `Hard`/`Hard` is rejected: such a map never purges anything.
    pub fn new(key_strength: ReferenceStrength, value_strength: ReferenceStrength) -> Result<Self> {
        Self::with_config_and_hasher(
            key_strength,
            value_strength,
            HashConfig::default(),
            DefaultHashBuilder::default(),
        )
    }

    /// Weak keys, hard values: the classic weak-key map.
    pub fn weak_keys() -> Self {
        Self::from_table(
            ReferenceStrength::Weak,
            ReferenceStrength::Hard,
            HashedMap::new(),
        )
    }
}

impl<K, V, S> ReferenceMap<K, V, S> {
    pub fn with_config_and_hasher(
        key_strength: ReferenceStrength,
        value_strength: ReferenceStrength,
        config: HashConfig,
        hasher: S,
    ) -> Result<Self> {
        if key_strength == ReferenceStrength::Hard && value_strength == ReferenceStrength::Hard {
            return Err(CollectionError::invalid(
                "a reference map needs a soft or weak key or value",
            ));
        }
        let table = HashedMap::with_config_and_hasher(config, hasher)?;
        Ok(Self::from_table(key_strength, value_strength, table))
    }

    fn from_table(
        key_strength: ReferenceStrength,
        value_strength: ReferenceStrength,
        table: Table<K, V, S>,
    ) -> Self {
        Self {
            table: RefCell::new(table),
            key_strength,
            value_strength,
            queue: ReclaimQueue::new(),
        }
    }

    pub fn key_strength(&self) -> ReferenceStrength {
        self.key_strength
    }

    pub fn value_strength(&self) -> ReferenceStrength {
        self.value_strength
    }

    /// Drain the reclaim queue and unlink every entry it names.
    ///
    /// Returns the number of entries removed.
    pub fn purge(&self) -> usize {
        let notices = self.queue.drain();
        if notices.is_empty() {
            return 0;
        }
        let mut removed = Vec::new();
        {
            let mut table = self.table.borrow_mut();
            for notice in &notices {
                let doomed: Vec<EntryKey> = table
                    .chain(notice.hash)
                    .filter(|&h| {
                        table.entry_pair(h).is_some_and(|(k, v)| {
                            (k.points_at(notice.referent) && !k.is_live())
                                || (v.points_at(notice.referent) && !v.is_live())
                        })
                    })
                    .collect();
                for h in doomed {
                    if let Some(pair) = table.remove_handle(h) {
                        removed.push(pair);
                    }
                }
            }
        }
        let n = removed.len();
        if n > 0 {
            log::debug!(
                "purged {} reclaimed entries ({} notices)",
                n,
                notices.len()
            );
        }
        // Dropped outside the borrow: user destructors may touch this map.
        drop(removed);
        n
    }

    fn purge_before_read(&self) {
        self.purge();
    }

    fn purge_before_write(&self) {
        self.purge();
    }

    /// Number of entries after purging reclaimed ones.
    pub fn len(&self) -> usize {
        self.purge_before_read();
        self.table.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries currently occupying buckets, stale or not; never purges.
    pub fn raw_len(&self) -> usize {
        self.table.borrow().len()
    }

    /// Notices waiting to be purged.
    pub fn pending_reclaims(&self) -> usize {
        self.queue.len()
    }

    pub fn clear(&mut self) {
        let drained: Vec<_> = {
            let mut table = self.table.borrow_mut();
            let handles: Vec<EntryKey> = table.handles().collect();
            let drained = handles
                .into_iter()
                .filter_map(|h| table.remove_handle(h))
                .collect();
            drained
        };
        drop(drained);
        self.queue.drain();
    }

    /// Demote every soft key and value to weak, as under memory pressure.
    ///
    /// Referents with no other strong owner are reclaimed immediately and
    /// purged on the next access.
    pub fn release_soft(&mut self) {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        {
            let mut table = self.table.borrow_mut();
            for (k, v) in table.pairs_mut() {
                keys.extend(k.soften());
                values.extend(v.soften());
            }
        }
        log::debug!(
            "released {} soft keys and {} soft values",
            keys.len(),
            values.len()
        );
        // Reclaim outside the borrow.
        drop(keys);
        drop(values);
    }

    /// Snapshot iterator over live `(key, value)` pairs.
    ///
    /// Entries reclaimed after the snapshot is taken are skipped.
    pub fn iter(&self) -> Iter<'_, K, V, S> {
        self.purge_before_read();
        let handles: Vec<EntryKey> = self.table.borrow().handles().collect();
        Iter {
            map: self,
            handles: handles.into_iter(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = Tracked<K>> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = Tracked<V>> + '_ {
        self.iter().map(|(_, v)| v)
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.purge_before_read();
        let table = self.table.borrow();
        let found = table.iter().any(|(k, v)| {
            k.is_live() && v.with(|x| x == value).unwrap_or(false)
        });
        found
    }
}

impl<K, V, S> ReferenceMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn find_live<Q>(&self, table: &Table<K, V, S>, q: &Q) -> Option<EntryKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = table.make_hash(q);
        table.find_raw(hash, |k| k.with(|k| k.borrow() == q).unwrap_or(false))
    }

    fn lookup<Q>(&self, q: &Q) -> Option<Tracked<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let table = self.table.borrow();
        let h = self.find_live(&table, q)?;
        let value = table.entry_value(h).and_then(Indirection::get);
        value
    }

    /// Value stored under `q`, purging reclaimed entries first.
    pub fn get<Q>(&self, q: &Q) -> Option<Tracked<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.purge_before_read();
        self.lookup(q)
    }

    /// Like `get` but leaves the reclaim queue untouched.
    ///
    /// Stale entries are still reported absent.
    pub fn peek<Q>(&self, q: &Q) -> Option<Tracked<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.lookup(q)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.purge_before_read();
        let table = self.table.borrow();
        let live = self
            .find_live(&table, q)
            .and_then(|h| table.entry_value(h))
            .is_some_and(Indirection::is_live);
        live
    }

    /// Insert or replace, returning the previous live value.
    pub fn insert(&mut self, key: Tracked<K>, value: Tracked<V>) -> Option<Tracked<V>> {
        self.purge_before_write();
        let mut old = None;
        {
            let mut table = self.table.borrow_mut();
            let hash = table.make_hash(&*key);
            let existing = table.find_raw(hash, |k| k.with(|k| *k == *key).unwrap_or(false));
            if self.value_strength != ReferenceStrength::Hard {
                value.watch(&self.queue, hash);
            }
            let new_value = Indirection::new(self.value_strength, value);
            match existing {
                Some(h) => {
                    if let Some(slot) = table.entry_value_mut(h) {
                        old = Some(core::mem::replace(slot, new_value));
                    }
                }
                None => {
                    if self.key_strength != ReferenceStrength::Hard {
                        key.watch(&self.queue, hash);
                    }
                    let new_key = Indirection::new(self.key_strength, key);
                    table.insert_raw(hash, new_key, new_value);
                }
            }
        }
        old.and_then(|ind| ind.get())
    }

    /// Insert from weak handles; a handle whose referent is already gone is
    /// rejected since it could never be looked up.
    pub fn insert_weak(
        &mut self,
        key: &WeakTracked<K>,
        value: &WeakTracked<V>,
    ) -> Result<Option<Tracked<V>>> {
        let key = key
            .upgrade()
            .ok_or_else(|| CollectionError::invalid("key has already been reclaimed"))?;
        let value = value
            .upgrade()
            .ok_or_else(|| CollectionError::invalid("value has already been reclaimed"))?;
        Ok(self.insert(key, value))
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<Tracked<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.purge_before_write();
        let removed = {
            let mut table = self.table.borrow_mut();
            let h = self.find_live(&table, q)?;
            table.remove_handle(h)
        };
        removed.and_then(|(_, v)| v.get())
    }
}

impl<K, V, S> core::fmt::Debug for ReferenceMap<K, V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReferenceMap")
            .field("key_strength", &self.key_strength)
            .field("value_strength", &self.value_strength)
            .field("entries", &self.raw_len())
            .field("pending_reclaims", &self.queue.len())
            .finish()
    }
}

/// Iterator over a snapshot of entry handles, yielding strong pairs.
pub struct Iter<'a, K, V, S> {
    map: &'a ReferenceMap<K, V, S>,
    handles: std::vec::IntoIter<EntryKey>,
}

impl<K, V, S> Iterator for Iter<'_, K, V, S> {
    type Item = (Tracked<K>, Tracked<V>);

    fn next(&mut self) -> Option<Self::Item> {
        for h in self.handles.by_ref() {
            let table = self.map.table.borrow();
            let Some((k, v)) = table.entry_pair(h) else {
                continue;
            };
            // Reclaimed since the snapshot: skip forward.
            if let (Some(k), Some(v)) = (k.get(), v.get()) {
                return Some((k, v));
            }
        }
        None
    }
}
