//! LinkedMap: a HashedMap whose entries are threaded into an insertion-order ring.
//!
//! Each stored value is wrapped in `Linked<V>`, which carries the `before` and
//! `after` links of a circular doubly linked list. The ring is anchored at
//! `Link::Header`, whose own links live on the map: `header.after` is the
//! eldest entry and `header.before` the youngest. The ring is independent of
//! bucket placement, so rehashing never disturbs iteration order.

use crate::config::HashConfig;
use crate::error::{CollectionError, Result};
use crate::hashed_map::{EntryKey, HashedMap};
use crate::iteration::{BidiIterator, ModCheck, OwnerId};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;

/// Position in the ring: either the sentinel or a live entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Link {
    Header,
    Entry(EntryKey),
}

#[derive(Debug, Clone)]
pub(crate) struct Linked<V> {
    pub(crate) value: V,
    before: Link,
    after: Link,
}

#[derive(Debug, Clone, Copy)]
struct Header {
    before: Link,
    after: Link,
}

impl Header {
    const EMPTY: Header = Header {
        before: Link::Header,
        after: Link::Header,
    };
}

pub struct LinkedMap<K, V, S = DefaultHashBuilder> {
    table: HashedMap<K, Linked<V>, S>,
    header: Header,
}

impl<K, V> LinkedMap<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }

    pub fn with_config(config: HashConfig) -> Result<Self> {
        Self::with_config_and_hasher(config, DefaultHashBuilder::default())
    }
}

impl<K, V> Default for LinkedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> LinkedMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            table: HashedMap::with_hasher(hasher),
            header: Header::EMPTY,
        }
    }

    pub fn with_config_and_hasher(config: HashConfig, hasher: S) -> Result<Self> {
        Ok(Self {
            table: HashedMap::with_config_and_hasher(config, hasher)?,
            header: Header::EMPTY,
        })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn mod_count(&self) -> u64 {
        self.table.mod_count()
    }

    pub fn owner_id(&self) -> OwnerId {
        self.table.owner_id()
    }

    fn node(&self, h: EntryKey) -> &Linked<V> {
        self.table
            .entry_value(h)
            .expect("ring link must refer to a live entry")
    }

    fn node_mut(&mut self, h: EntryKey) -> &mut Linked<V> {
        self.table
            .entry_value_mut(h)
            .expect("ring link must refer to a live entry")
    }

    fn after(&self, at: Link) -> Link {
        match at {
            Link::Header => self.header.after,
            Link::Entry(h) => self.node(h).after,
        }
    }

    fn before(&self, at: Link) -> Link {
        match at {
            Link::Header => self.header.before,
            Link::Entry(h) => self.node(h).before,
        }
    }

    fn set_after(&mut self, at: Link, to: Link) {
        match at {
            Link::Header => self.header.after = to,
            Link::Entry(h) => self.node_mut(h).after = to,
        }
    }

    fn set_before(&mut self, at: Link, to: Link) {
        match at {
            Link::Header => self.header.before = to,
            Link::Entry(h) => self.node_mut(h).before = to,
        }
    }

    fn link_tail(&mut self, h: EntryKey) {
        let tail = self.header.before;
        {
            let n = self.node_mut(h);
            n.before = tail;
            n.after = Link::Header;
        }
        self.set_after(tail, Link::Entry(h));
        self.header.before = Link::Entry(h);
    }

    fn unlink(&mut self, h: EntryKey) {
        let (before, after) = {
            let n = self.node(h);
            (n.before, n.after)
        };
        self.set_after(before, after);
        self.set_before(after, before);
    }

    /// Move an entry to the youngest end of the ring.
    pub(crate) fn move_to_back(&mut self, h: EntryKey) {
        if self.header.before == Link::Entry(h) {
            return;
        }
        self.unlink(h);
        self.link_tail(h);
        self.table.bump_mod_count();
    }

    pub(crate) fn remove_handle(&mut self, h: EntryKey) -> Option<(K, V)> {
        if !self.table.contains_handle(h) {
            return None;
        }
        self.unlink(h);
        self.table.remove_handle(h).map(|(k, l)| (k, l.value))
    }

    pub(crate) fn pair(&self, h: EntryKey) -> Option<(&K, &V)> {
        self.table.entry_pair(h).map(|(k, l)| (k, &l.value))
    }

    pub(crate) fn front_handle(&self) -> Option<EntryKey> {
        match self.header.after {
            Link::Header => None,
            Link::Entry(h) => Some(h),
        }
    }

    /// Eldest key; `Empty` when the map holds nothing.
    pub fn first_key(&self) -> Result<&K> {
        self.front().map(|(k, _)| k).ok_or(CollectionError::Empty)
    }

    /// Youngest key; `Empty` when the map holds nothing.
    pub fn last_key(&self) -> Result<&K> {
        self.back().map(|(k, _)| k).ok_or(CollectionError::Empty)
    }

    pub fn front(&self) -> Option<(&K, &V)> {
        self.front_handle().and_then(|h| self.pair(h))
    }

    pub fn back(&self) -> Option<(&K, &V)> {
        match self.header.before {
            Link::Header => None,
            Link::Entry(h) => self.pair(h),
        }
    }

    pub fn pop_front(&mut self) -> Option<(K, V)> {
        let h = self.front_handle()?;
        self.remove_handle(h)
    }

    pub fn pop_back(&mut self) -> Option<(K, V)> {
        match self.header.before {
            Link::Header => None,
            Link::Entry(h) => self.remove_handle(h),
        }
    }

    fn handle_at(&self, index: usize) -> Result<EntryKey> {
        let len = self.len();
        CollectionError::check_index(index, len)?;
        // Walk from whichever end is nearer.
        let mut cur;
        if index < len / 2 {
            cur = self.header.after;
            for _ in 0..index {
                cur = self.after(cur);
            }
        } else {
            cur = self.header.before;
            for _ in 0..(len - 1 - index) {
                cur = self.before(cur);
            }
        }
        match cur {
            Link::Entry(h) => Ok(h),
            Link::Header => unreachable!("index checked against len"),
        }
    }

    /// Entry at position `index` in insertion order.
    pub fn get_index(&self, index: usize) -> Result<(&K, &V)> {
        let h = self.handle_at(index)?;
        Ok(self.pair(h).expect("handle_at yields live entries"))
    }

    pub fn remove_index(&mut self, index: usize) -> Result<(K, V)> {
        let h = self.handle_at(index)?;
        Ok(self.remove_handle(h).expect("handle_at yields live entries"))
    }

    pub fn clear(&mut self) {
        self.table.clear();
        self.header = Header::EMPTY;
    }

    /// Borrowing iterator in insertion order; double-ended.
    pub fn iter(&self) -> Iter<'_, K, V, S> {
        Iter {
            map: self,
            front: self.header.after,
            back: self.header.before,
            remaining: self.len(),
        }
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.values().any(|v| v == value)
    }

    /// Detached, fail-fast bidirectional iterator positioned before the eldest entry.
    pub fn ordered_iter(&self) -> OrderedIter {
        OrderedIter {
            check: ModCheck::new(self.owner_id(), self.mod_count()),
            next: self.header.after,
            last_returned: None,
        }
    }

    /// Detached iterator positioned after the youngest entry, for walking backwards.
    pub fn ordered_iter_from_back(&self) -> OrderedIter {
        OrderedIter {
            check: ModCheck::new(self.owner_id(), self.mod_count()),
            next: Link::Header,
            last_returned: None,
        }
    }

    /// Read-only view whose mutators report `Unsupported`.
    pub fn unmodifiable(&self) -> Unmodifiable<'_, K, V, S> {
        Unmodifiable { map: self }
    }

    /// Panics if the ring and the table disagree.
    pub fn validate(&self) {
        let mut prev = Link::Header;
        let mut cur = self.header.after;
        let mut count = 0usize;
        while let Link::Entry(h) = cur {
            let n = self.node(h);
            assert_eq!(n.before, prev, "before link broken at position {count}");
            prev = cur;
            cur = n.after;
            count += 1;
            assert!(count <= self.len(), "ring longer than table");
        }
        assert_eq!(self.header.before, prev, "header.before is not the youngest");
        assert_eq!(count, self.len(), "ring shorter than table");
    }
}

impl<K, V, S> LinkedMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub(crate) fn find<Q>(&self, q: &Q) -> Option<EntryKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find(q)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.contains_key(q)
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.get(q).map(|l| &l.value)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.get_key_value(q).map(|(k, l)| (k, &l.value))
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.get_mut(q).map(|l| &mut l.value)
    }

    /// Insert or update. Updating an existing key keeps its ring position.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.insert_full(key, value).1
    }

    pub(crate) fn insert_full(&mut self, key: K, value: V) -> (EntryKey, Option<V>) {
        let hash = self.table.make_hash(&key);
        if let Some(h) = self.table.find_raw(hash, |k| *k == key) {
            let old = core::mem::replace(&mut self.node_mut(h).value, value);
            return (h, Some(old));
        }
        let h = self.table.insert_raw(
            hash,
            key,
            Linked {
                value,
                before: Link::Header,
                after: Link::Header,
            },
        );
        self.link_tail(h);
        (h, None)
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
        let h = self.table.find(q)?;
        self.remove_handle(h)
    }

    /// Key inserted right after `q`, or `None` if `q` is youngest or absent.
    pub fn next_key<Q>(&self, q: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.node(self.table.find(q)?).after {
            Link::Header => None,
            Link::Entry(h) => self.table.entry_key(h),
        }
    }

    /// Key inserted right before `q`, or `None` if `q` is eldest or absent.
    pub fn previous_key<Q>(&self, q: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.node(self.table.find(q)?).before {
            Link::Header => None,
            Link::Entry(h) => self.table.entry_key(h),
        }
    }

    /// Position of `q` in insertion order.
    pub fn index_of<Q>(&self, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let target = Link::Entry(self.table.find(q)?);
        let mut cur = self.header.after;
        let mut i = 0;
        while cur != Link::Header {
            if cur == target {
                return Some(i);
            }
            cur = self.after(cur);
            i += 1;
        }
        None
    }
}

impl<K: Clone, V: Clone, S: Clone> Clone for LinkedMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            header: self.header,
        }
    }
}

impl<K: core::fmt::Debug, V: core::fmt::Debug, S> core::fmt::Debug for LinkedMap<K, V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Equality is order-sensitive: same pairs in the same insertion order.
impl<K: PartialEq, V: PartialEq, S> PartialEq for LinkedMap<K, V, S> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Eq, V: Eq, S> Eq for LinkedMap<K, V, S> {}

impl<K, V, S> Extend<(K, V)> for LinkedMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for LinkedMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::with_hasher(S::default());
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S> IntoIterator for &'a LinkedMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, S>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Borrowing iterator over a `LinkedMap` in insertion order.
pub struct Iter<'a, K, V, S> {
    map: &'a LinkedMap<K, V, S>,
    front: Link,
    back: Link,
    remaining: usize,
}

impl<'a, K, V, S> Iterator for Iter<'a, K, V, S> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let Link::Entry(h) = self.front else {
            return None;
        };
        self.remaining -= 1;
        self.front = self.map.after(self.front);
        self.map.pair(h)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V, S> DoubleEndedIterator for Iter<'_, K, V, S> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let Link::Entry(h) = self.back else {
            return None;
        };
        self.remaining -= 1;
        self.back = self.map.before(self.back);
        self.map.pair(h)
    }
}

impl<K, V, S> ExactSizeIterator for Iter<'_, K, V, S> {}

/// Detached bidirectional iterator over a `LinkedMap`.
///
/// The map is passed to every call. Any structural change made to the map
/// other than through this iterator makes the next call fail with
/// `ConcurrentModification`.
#[derive(Debug, Clone)]
pub struct OrderedIter {
    check: ModCheck,
    next: Link,
    last_returned: Option<EntryKey>,
}

impl OrderedIter {
    /// Replace the value of the entry last returned by `next`/`previous`.
    pub fn set_value<K, V, S>(&mut self, map: &mut LinkedMap<K, V, S>, value: V) -> Result<V> {
        self.check.check(map.owner_id(), map.mod_count())?;
        let h = self
            .last_returned
            .ok_or(CollectionError::IllegalState("set without a current entry"))?;
        Ok(core::mem::replace(&mut map.node_mut(h).value, value))
    }
}

impl<K, V, S> BidiIterator<LinkedMap<K, V, S>> for OrderedIter {
    type Item<'a>
        = (&'a K, &'a V)
    where
        LinkedMap<K, V, S>: 'a;

    fn has_next(&self, map: &LinkedMap<K, V, S>) -> Result<bool> {
        self.check.check(map.owner_id(), map.mod_count())?;
        Ok(self.next != Link::Header)
    }

    fn next<'a>(&mut self, map: &'a LinkedMap<K, V, S>) -> Result<Option<(&'a K, &'a V)>> {
        self.check.check(map.owner_id(), map.mod_count())?;
        let Link::Entry(h) = self.next else {
            return Ok(None);
        };
        self.last_returned = Some(h);
        self.next = map.after(self.next);
        Ok(map.pair(h))
    }

    fn has_previous(&self, map: &LinkedMap<K, V, S>) -> Result<bool> {
        self.check.check(map.owner_id(), map.mod_count())?;
        Ok(map.before(self.next) != Link::Header)
    }

    fn previous<'a>(&mut self, map: &'a LinkedMap<K, V, S>) -> Result<Option<(&'a K, &'a V)>> {
        self.check.check(map.owner_id(), map.mod_count())?;
        let prev = map.before(self.next);
        let Link::Entry(h) = prev else {
            return Ok(None);
        };
        self.next = prev;
        self.last_returned = Some(h);
        Ok(map.pair(h))
    }

    fn remove(&mut self, map: &mut LinkedMap<K, V, S>) -> Result<()> {
        self.check.check(map.owner_id(), map.mod_count())?;
        let h = self
            .last_returned
            .take()
            .ok_or(CollectionError::IllegalState("remove without a current entry"))?;
        if self.next == Link::Entry(h) {
            self.next = map.after(self.next);
        }
        map.remove_handle(h);
        self.check.resync(map.mod_count());
        Ok(())
    }
}

/// Read-only view of a `LinkedMap`.
pub struct Unmodifiable<'a, K, V, S> {
    map: &'a LinkedMap<K, V, S>,
}

impl<'a, K, V, S> Unmodifiable<'a, K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn get<Q>(&self, q: &Q) -> Option<&'a V>
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

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> Iter<'a, K, V, S> {
        self.map.iter()
    }

    pub fn insert(&mut self, _key: K, _value: V) -> Result<Option<V>> {
        Err(CollectionError::Unsupported("insert on a read-only map"))
    }

    pub fn remove<Q>(&mut self, _q: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        Err(CollectionError::Unsupported("remove on a read-only map"))
    }

    pub fn clear(&mut self) -> Result<()> {
        Err(CollectionError::Unsupported("clear on a read-only map"))
    }
}
