//! CursorableList: a doubly linked list whose cursors survive mutation.
//!
//! Nodes live in a `SlotMap` arena and link to each other by `NodeKey`.
//! Two kinds of detached iterators walk the list:
//!
//! - `ListIter` is fail-fast: any structural change not made through the
//!   iterator itself makes its next call return `ConcurrentModification`.
//! - `Cursor` is registered with the list as a weakly held observer. Every
//!   insertion, removal or replacement is broadcast to the live cursors,
//!   which adjust their position instead of failing.
//!
//! Dropping a `Cursor` releases its registration lazily (the list sweeps
//! dead observers on the next broadcast); `Cursor::close` releases it now.

use crate::error::{CollectionError, Result};
use crate::iteration::{BidiIterator, ModCheck, OwnerId};
use core::cell::RefCell;
use core::fmt;
use core::marker::PhantomData;
use slotmap::{new_key_type, SlotMap};
use std::rc::{Rc, Weak};

new_key_type! {
    /// Arena handle of a list node.
    pub struct NodeKey;
}

struct Node<T> {
    value: T,
    prev: Option<NodeKey>,
    next: Option<NodeKey>,
}

/// What a cursor returned last, as far as `remove`/`set` are concerned.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LastReturned {
    Nothing,
    Node(NodeKey),
    /// Another actor removed the element this cursor returned.
    Invalidated,
}

#[derive(Debug)]
struct CursorState {
    prev: Option<NodeKey>,
    next: Option<NodeKey>,
    last_returned: LastReturned,
}

#[derive(Copy, Clone, Debug)]
enum ListEvent {
    Inserted {
        node: NodeKey,
        prev: Option<NodeKey>,
        next: Option<NodeKey>,
    },
    Removed {
        node: NodeKey,
        prev: Option<NodeKey>,
        next: Option<NodeKey>,
    },
    Changed(NodeKey),
}

impl CursorState {
    fn apply(&mut self, event: ListEvent) {
        match event {
            ListEvent::Inserted { node, prev, next } => {
                if (self.prev.is_none() && self.next.is_none()) || self.prev == prev {
                    self.next = Some(node);
                }
                if self.next == next {
                    self.prev = Some(node);
                }
            }
            ListEvent::Removed { node, prev, next } => {
                if self.next == Some(node) {
                    self.next = next;
                }
                if self.prev == Some(node) {
                    self.prev = prev;
                }
                if self.last_returned == LastReturned::Node(node) {
                    self.last_returned = LastReturned::Invalidated;
                }
            }
            // A replaced value leaves the node linked; nothing to adjust.
            ListEvent::Changed(_) => {}
        }
    }
}

type Registration = Weak<RefCell<CursorState>>;

/// Doubly linked list supporting self-healing cursors.
pub struct CursorableList<T> {
    nodes: SlotMap<NodeKey, Node<T>>,
    first: Option<NodeKey>,
    last: Option<NodeKey>,
    mod_count: u64,
    owner: OwnerId,
    cursors: Vec<Registration>,
}

impl<T> Default for CursorableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CursorableList<T> {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            first: None,
            last: None,
            mod_count: 0,
            owner: OwnerId::fresh(),
            cursors: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn mod_count(&self) -> u64 {
        self.mod_count
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner
    }

    /// Number of cursors still registered (closed or dropped ones excluded).
    pub fn cursor_count(&self) -> usize {
        self.cursors.iter().filter(|w| w.strong_count() > 0).count()
    }

    // ----- linkage -----

    fn node_at(&self, index: usize) -> Option<NodeKey> {
        if index >= self.len() {
            return None;
        }
        if index <= self.len() / 2 {
            let mut cur = self.first;
            for _ in 0..index {
                cur = cur.and_then(|h| self.nodes.get(h)).and_then(|n| n.next);
            }
            cur
        } else {
            let mut cur = self.last;
            for _ in 0..(self.len() - 1 - index) {
                cur = cur.and_then(|h| self.nodes.get(h)).and_then(|n| n.prev);
            }
            cur
        }
    }

    /// Position of `next` in the list, `len()` when `next` is the end.
    fn position_of(&self, next: Option<NodeKey>) -> usize {
        let mut index = 0;
        let mut cur = self.first;
        while cur.is_some() && cur != next {
            cur = cur.and_then(|h| self.nodes.get(h)).and_then(|n| n.next);
            index += 1;
        }
        index
    }

    /// Positions run from `0` to `len()` inclusive.
    fn check_position(&self, index: usize) -> Result<()> {
        if index > self.len() {
            return Err(CollectionError::IndexOutOfBounds {
                index,
                len: self.len(),
            });
        }
        Ok(())
    }

    fn prev_of(&self, next: Option<NodeKey>) -> Option<NodeKey> {
        match next {
            Some(h) => self.nodes.get(h).and_then(|n| n.prev),
            None => self.last,
        }
    }

    fn link_between(&mut self, prev: Option<NodeKey>, next: Option<NodeKey>, value: T) -> NodeKey {
        let h = self.nodes.insert(Node { value, prev, next });
        match prev {
            Some(p) => self.nodes[p].next = Some(h),
            None => self.first = Some(h),
        }
        match next {
            Some(n) => self.nodes[n].prev = Some(h),
            None => self.last = Some(h),
        }
        self.mod_count += 1;
        self.broadcast(ListEvent::Inserted {
            node: h,
            prev,
            next,
        });
        h
    }

    fn unlink(&mut self, h: NodeKey) -> Option<T> {
        let node = self.nodes.remove(h)?;
        match node.prev {
            Some(p) => self.nodes[p].next = node.next,
            None => self.first = node.next,
        }
        match node.next {
            Some(n) => self.nodes[n].prev = node.prev,
            None => self.last = node.prev,
        }
        self.mod_count += 1;
        self.broadcast(ListEvent::Removed {
            node: h,
            prev: node.prev,
            next: node.next,
        });
        Some(node.value)
    }

    fn replace_value(&mut self, h: NodeKey, value: T) -> Option<T> {
        let slot = &mut self.nodes.get_mut(h)?.value;
        let old = core::mem::replace(slot, value);
        self.broadcast(ListEvent::Changed(h));
        Some(old)
    }

    fn broadcast(&mut self, event: ListEvent) {
        self.sweep_cursors();
        log::trace!("broadcasting {:?} to {} cursors", event, self.cursors.len());
        for reg in &self.cursors {
            if let Some(state) = reg.upgrade() {
                state.borrow_mut().apply(event);
            }
        }
    }

    fn sweep_cursors(&mut self) {
        let before = self.cursors.len();
        self.cursors.retain(|w| w.strong_count() > 0);
        let swept = before - self.cursors.len();
        if swept > 0 {
            log::debug!("swept {} released cursors", swept);
        }
    }

    // ----- sequence operations -----

    pub fn push_front(&mut self, value: T) {
        let first = self.first;
        self.link_between(None, first, value);
    }

    pub fn push_back(&mut self, value: T) {
        let last = self.last;
        self.link_between(last, None, value);
    }

    /// Insert `value` so that it ends up at `index`.
    pub fn insert(&mut self, index: usize, value: T) -> Result<()> {
        self.check_position(index)?;
        let next = self.node_at(index);
        let prev = self.prev_of(next);
        self.link_between(prev, next, value);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<&T> {
        CollectionError::check_index(index, self.len())?;
        self.node_at(index)
            .and_then(|h| self.nodes.get(h))
            .map(|n| &n.value)
            .ok_or(CollectionError::IndexOutOfBounds {
                index,
                len: self.len(),
            })
    }

    /// Replace the element at `index`, returning the old one.
    pub fn set(&mut self, index: usize, value: T) -> Result<T> {
        CollectionError::check_index(index, self.len())?;
        self.node_at(index)
            .and_then(|h| self.replace_value(h, value))
            .ok_or(CollectionError::IndexOutOfBounds {
                index,
                len: self.len(),
            })
    }

    pub fn remove(&mut self, index: usize) -> Result<T> {
        CollectionError::check_index(index, self.len())?;
        let len = self.len();
        self.node_at(index)
            .and_then(|h| self.unlink(h))
            .ok_or(CollectionError::IndexOutOfBounds { index, len })
    }

    pub fn pop_front(&mut self) -> Option<T> {
        self.first.and_then(|h| self.unlink(h))
    }

    pub fn pop_back(&mut self) -> Option<T> {
        self.last.and_then(|h| self.unlink(h))
    }

    pub fn front(&self) -> Option<&T> {
        self.first.and_then(|h| self.nodes.get(h)).map(|n| &n.value)
    }

    pub fn back(&self) -> Option<&T> {
        self.last.and_then(|h| self.nodes.get(h)).map(|n| &n.value)
    }

    /// Remove every element. Cursors are told about each removal in turn.
    pub fn clear(&mut self) {
        while self.pop_front().is_some() {}
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            front: self.first,
            back: self.last,
            remaining: self.len(),
        }
    }

    /// Fail-fast iterator positioned before the first element.
    pub fn list_iter(&self) -> ListIter<T> {
        ListIter {
            check: ModCheck::new(self.owner, self.mod_count),
            next: self.first,
            next_index: 0,
            last_returned: None,
            _marker: PhantomData,
        }
    }

    /// Fail-fast iterator positioned before the element at `index`.
    pub fn list_iter_at(&self, index: usize) -> Result<ListIter<T>> {
        self.check_position(index)?;
        Ok(ListIter {
            check: ModCheck::new(self.owner, self.mod_count),
            next: self.node_at(index),
            next_index: index,
            last_returned: None,
            _marker: PhantomData,
        })
    }

    /// Register a cursor positioned before the element at `index`.
    pub fn cursor(&mut self, index: usize) -> Result<Cursor<T>> {
        self.check_position(index)?;
        let next = self.node_at(index);
        let state = Rc::new(RefCell::new(CursorState {
            prev: self.prev_of(next),
            next,
            last_returned: LastReturned::Nothing,
        }));
        self.sweep_cursors();
        self.cursors.push(Rc::downgrade(&state));
        Ok(Cursor {
            state: Some(state),
            owner: self.owner,
            _marker: PhantomData,
        })
    }

    fn unregister(&mut self, state: &Rc<RefCell<CursorState>>) {
        let target = Rc::as_ptr(state);
        self.cursors
            .retain(|w| w.strong_count() > 0 && !core::ptr::eq(w.as_ptr(), target));
    }
}

impl<T: PartialEq> CursorableList<T> {
    pub fn contains(&self, value: &T) -> bool {
        self.iter().any(|v| v == value)
    }

    pub fn index_of(&self, value: &T) -> Option<usize> {
        self.iter().position(|v| v == value)
    }
}

impl<T: Clone> Clone for CursorableList<T> {
    /// Clones the elements only; cursors stay registered with the original.
    fn clone(&self) -> Self {
        self.iter().cloned().collect()
    }
}

impl<T: fmt::Debug> fmt::Debug for CursorableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for CursorableList<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for CursorableList<T> {}

impl<T> Extend<T> for CursorableList<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for v in iter {
            self.push_back(v);
        }
    }
}

impl<T> FromIterator<T> for CursorableList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}

impl<'a, T> IntoIterator for &'a CursorableList<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> IntoIterator for CursorableList<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;
    fn into_iter(self) -> Self::IntoIter {
        IntoIter(self)
    }
}

/// Borrowing iterator in list order.
pub struct Iter<'a, T> {
    list: &'a CursorableList<T>,
    front: Option<NodeKey>,
    back: Option<NodeKey>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.list.nodes.get(self.front?)?;
        self.front = node.next;
        self.remaining -= 1;
        Some(&node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> DoubleEndedIterator for Iter<'a, T> {
    fn next_back(&mut self) -> Option<&'a T> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.list.nodes.get(self.back?)?;
        self.back = node.prev;
        self.remaining -= 1;
        Some(&node.value)
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

/// Owning iterator in list order.
pub struct IntoIter<T>(CursorableList<T>);

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.0.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.0.len(), Some(self.0.len()))
    }
}

impl<T> DoubleEndedIterator for IntoIter<T> {
    fn next_back(&mut self) -> Option<T> {
        self.0.pop_back()
    }
}

/// Fail-fast list iterator.
pub struct ListIter<T> {
    check: ModCheck,
    next: Option<NodeKey>,
    next_index: usize,
    last_returned: Option<NodeKey>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ListIter<T> {
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Index of the element `previous` would return; `None` at the front.
    pub fn previous_index(&self) -> Option<usize> {
        self.next_index.checked_sub(1)
    }

    /// Insert `value` before the implicit cursor.
    pub fn add(&mut self, list: &mut CursorableList<T>, value: T) -> Result<()> {
        self.check.check(list.owner, list.mod_count)?;
        let prev = list.prev_of(self.next);
        list.link_between(prev, self.next, value);
        self.next_index += 1;
        self.last_returned = None;
        self.check.resync(list.mod_count);
        Ok(())
    }

    /// Replace the element last returned by `next` or `previous`.
    pub fn set(&mut self, list: &mut CursorableList<T>, value: T) -> Result<T> {
        self.check.check(list.owner, list.mod_count)?;
        let h = self
            .last_returned
            .ok_or(CollectionError::IllegalState("set without a current element"))?;
        list.replace_value(h, value)
            .ok_or(CollectionError::ConcurrentModification)
    }
}

impl<T> BidiIterator<CursorableList<T>> for ListIter<T> {
    type Item<'a>
        = &'a T
    where
        CursorableList<T>: 'a;

    fn has_next(&self, list: &CursorableList<T>) -> Result<bool> {
        self.check.check(list.owner, list.mod_count)?;
        Ok(self.next.is_some())
    }

    fn next<'a>(&mut self, list: &'a CursorableList<T>) -> Result<Option<&'a T>> {
        self.check.check(list.owner, list.mod_count)?;
        let Some(h) = self.next else {
            return Ok(None);
        };
        let node = list
            .nodes
            .get(h)
            .ok_or(CollectionError::ConcurrentModification)?;
        self.next = node.next;
        self.next_index += 1;
        self.last_returned = Some(h);
        Ok(Some(&node.value))
    }

    fn has_previous(&self, list: &CursorableList<T>) -> Result<bool> {
        self.check.check(list.owner, list.mod_count)?;
        Ok(self.next_index > 0)
    }

    fn previous<'a>(&mut self, list: &'a CursorableList<T>) -> Result<Option<&'a T>> {
        self.check.check(list.owner, list.mod_count)?;
        let Some(h) = list.prev_of(self.next) else {
            return Ok(None);
        };
        let node = list
            .nodes
            .get(h)
            .ok_or(CollectionError::ConcurrentModification)?;
        self.next = Some(h);
        self.next_index -= 1;
        self.last_returned = Some(h);
        Ok(Some(&node.value))
    }

    fn remove(&mut self, list: &mut CursorableList<T>) -> Result<()> {
        self.check.check(list.owner, list.mod_count)?;
        let h = self
            .last_returned
            .take()
            .ok_or(CollectionError::IllegalState("remove without a current element"))?;
        if self.next == Some(h) {
            self.next = list.nodes.get(h).and_then(|n| n.next);
        } else {
            self.next_index -= 1;
        }
        list.unlink(h);
        self.check.resync(list.mod_count);
        Ok(())
    }
}

impl<T> fmt::Debug for ListIter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListIter")
            .field("next_index", &self.next_index)
            .finish()
    }
}

/// Registered cursor that keeps its position across list mutations.
///
/// A cursor never fails fast. If another actor removes the element it
/// returned last, its `remove` and `set` become no-ops. A value replaced by
/// another actor is still the cursor's current element.
pub struct Cursor<T> {
    state: Option<Rc<RefCell<CursorState>>>,
    owner: OwnerId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Cursor<T> {
    fn state(&self, list: &CursorableList<T>) -> Result<&Rc<RefCell<CursorState>>> {
        let state = self.state.as_ref().ok_or(CollectionError::CursorClosed)?;
        if list.owner != self.owner {
            return Err(CollectionError::WrongOwner);
        }
        Ok(state)
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_none()
    }

    /// Index of the element `next` would return.
    pub fn next_index(&self, list: &CursorableList<T>) -> Result<usize> {
        let next = self.state(list)?.borrow().next;
        Ok(list.position_of(next))
    }

    /// Insert `value` before the cursor; `next` is unaffected.
    pub fn add(&mut self, list: &mut CursorableList<T>, value: T) -> Result<()> {
        let (prev, next) = {
            let st = self.state(list)?.borrow();
            (st.prev, st.next)
        };
        let h = list.link_between(prev, next, value);
        let mut st = self.state(list)?.borrow_mut();
        st.prev = Some(h);
        st.next = next;
        st.last_returned = LastReturned::Nothing;
        Ok(())
    }

    /// Replace the element last returned by `next` or `previous`.
    pub fn set(&mut self, list: &mut CursorableList<T>, value: T) -> Result<()> {
        let last = self.state(list)?.borrow().last_returned;
        match last {
            LastReturned::Nothing => Err(CollectionError::IllegalState(
                "set without a current element",
            )),
            LastReturned::Invalidated => Ok(()),
            LastReturned::Node(h) => {
                list.replace_value(h, value);
                Ok(())
            }
        }
    }

    /// Unregister from `list`. Further use returns `CursorClosed`.
    pub fn close(&mut self, list: &mut CursorableList<T>) -> Result<()> {
        self.state(list)?;
        if let Some(state) = self.state.take() {
            list.unregister(&state);
        }
        Ok(())
    }
}

impl<T> BidiIterator<CursorableList<T>> for Cursor<T> {
    type Item<'a>
        = &'a T
    where
        CursorableList<T>: 'a;

    fn has_next(&self, list: &CursorableList<T>) -> Result<bool> {
        Ok(self.state(list)?.borrow().next.is_some())
    }

    fn next<'a>(&mut self, list: &'a CursorableList<T>) -> Result<Option<&'a T>> {
        let mut st = self.state(list)?.borrow_mut();
        let Some(h) = st.next else {
            return Ok(None);
        };
        let node = list
            .nodes
            .get(h)
            .ok_or(CollectionError::IllegalState("cursor lost its position"))?;
        st.last_returned = LastReturned::Node(h);
        st.prev = Some(h);
        st.next = node.next;
        Ok(Some(&node.value))
    }

    fn has_previous(&self, list: &CursorableList<T>) -> Result<bool> {
        Ok(self.state(list)?.borrow().prev.is_some())
    }

    fn previous<'a>(&mut self, list: &'a CursorableList<T>) -> Result<Option<&'a T>> {
        let mut st = self.state(list)?.borrow_mut();
        let Some(h) = st.prev else {
            return Ok(None);
        };
        let node = list
            .nodes
            .get(h)
            .ok_or(CollectionError::IllegalState("cursor lost its position"))?;
        st.last_returned = LastReturned::Node(h);
        st.next = Some(h);
        st.prev = node.prev;
        Ok(Some(&node.value))
    }

    fn remove(&mut self, list: &mut CursorableList<T>) -> Result<()> {
        let h = {
            let mut st = self.state(list)?.borrow_mut();
            let last = st.last_returned;
            match last {
                LastReturned::Nothing => {
                    return Err(CollectionError::IllegalState(
                        "remove without a current element",
                    ))
                }
                LastReturned::Invalidated => return Ok(()),
                LastReturned::Node(h) => {
                    st.last_returned = LastReturned::Nothing;
                    h
                }
            }
        };
        // The Removed broadcast moves this cursor past `h` like any other.
        list.unlink(h);
        Ok(())
    }
}

impl<T> fmt::Debug for Cursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            Some(state) => f.debug_tuple("Cursor").field(&*state.borrow()).finish(),
            None => f.write_str("Cursor(closed)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_of(values: &[i32]) -> CursorableList<i32> {
        values.iter().copied().collect()
    }

    fn contents(list: &CursorableList<i32>) -> Vec<i32> {
        list.iter().copied().collect()
    }

    #[test]
    fn sequence_operations() {
        let mut l = CursorableList::new();
        l.push_back(2);
        l.push_front(1);
        l.push_back(4);
        l.insert(2, 3).unwrap();
        assert_eq!(contents(&l), [1, 2, 3, 4]);
        assert_eq!(l.get(2), Ok(&3));
        assert_eq!(
            l.get(4),
            Err(CollectionError::IndexOutOfBounds { index: 4, len: 4 })
        );
        assert_eq!(l.set(0, 10).unwrap(), 1);
        assert_eq!(l.remove(1).unwrap(), 2);
        assert_eq!(l.front(), Some(&10));
        assert_eq!(l.back(), Some(&4));
        assert_eq!(l.pop_back(), Some(4));
        assert_eq!(l.pop_front(), Some(10));
        assert_eq!(contents(&l), [3]);
        assert!(l.contains(&3));
        assert_eq!(l.index_of(&3), Some(0));
        assert_eq!(
            l.insert(5, 0),
            Err(CollectionError::IndexOutOfBounds { index: 5, len: 1 })
        );
        assert_eq!(
            l.remove(1),
            Err(CollectionError::IndexOutOfBounds { index: 1, len: 1 })
        );
        l.clear();
        assert!(l.is_empty());
        assert_eq!(l.pop_front(), None);
    }

    #[test]
    fn iter_is_double_ended() {
        let l = list_of(&[1, 2, 3, 4]);
        let back: Vec<_> = l.iter().rev().copied().collect();
        assert_eq!(back, [4, 3, 2, 1]);
        let mut it = l.iter();
        assert_eq!(it.next(), Some(&1));
        assert_eq!(it.next_back(), Some(&4));
        assert_eq!(it.len(), 2);
        let owned: Vec<_> = l.into_iter().collect();
        assert_eq!(owned, [1, 2, 3, 4]);
    }

    #[test]
    fn cursor_heals_after_list_removal() {
        let mut l = list_of(&[1, 2, 3]);
        let mut c = l.cursor(0).unwrap();
        assert_eq!(c.next(&l).unwrap(), Some(&1));
        assert_eq!(l.remove(1).unwrap(), 2);
        assert_eq!(c.next(&l).unwrap(), Some(&3));
        assert_eq!(c.next(&l).unwrap(), None);
        assert_eq!(c.previous(&l).unwrap(), Some(&3));
        assert_eq!(c.previous(&l).unwrap(), Some(&1));
    }

    #[test]
    fn cursor_sees_insertion_at_its_position() {
        let mut l = list_of(&[1, 3]);
        let mut c = l.cursor(1).unwrap();
        l.insert(1, 2).unwrap();
        assert_eq!(c.next(&l).unwrap(), Some(&2));
        assert_eq!(c.next_index(&l).unwrap(), 2);
        l.push_front(0);
        assert_eq!(c.previous(&l).unwrap(), Some(&2));
    }

    #[test]
    fn cursor_on_empty_list_picks_up_first_insert() {
        let mut l = CursorableList::new();
        let mut c = l.cursor(0).unwrap();
        l.push_back("a");
        assert!(c.has_next(&l).unwrap());
        assert_eq!(c.next(&l).unwrap(), Some(&"a"));
    }

    #[test]
    fn remove_of_invalidated_element_is_silent() {
        let mut l = list_of(&[1, 2, 3]);
        let mut c = l.cursor(0).unwrap();
        c.next(&l).unwrap();
        c.next(&l).unwrap();
        l.remove(1).unwrap();
        assert_eq!(c.remove(&mut l), Ok(()));
        assert_eq!(contents(&l), [1, 3]);
        assert_eq!(c.next(&l).unwrap(), Some(&3));
    }

    #[test]
    fn foreign_set_keeps_cursor_element_current() {
        let mut l = list_of(&[1, 2]);
        let mut c = l.cursor(0).unwrap();
        c.next(&l).unwrap();
        l.set(0, 10).unwrap();
        assert_eq!(c.set(&mut l, 99), Ok(()));
        assert_eq!(contents(&l), [99, 2]);
    }

    #[test]
    fn cursor_removes_element_replaced_by_another_actor() {
        let mut l = list_of(&[1, 2]);
        let mut c = l.cursor(0).unwrap();
        assert_eq!(c.next(&l).unwrap(), Some(&1));
        l.set(0, 10).unwrap();
        assert_eq!(c.remove(&mut l), Ok(()));
        assert_eq!(contents(&l), [2]);
        assert_eq!(c.next(&l).unwrap(), Some(&2));
    }

    #[test]
    fn list_iter_set_reaches_cursor_without_invalidating() {
        let mut l = list_of(&[1, 2]);
        let mut c = l.cursor(0).unwrap();
        c.next(&l).unwrap();
        let mut it = l.list_iter();
        it.next(&l).unwrap();
        assert_eq!(it.set(&mut l, 5).unwrap(), 1);
        c.remove(&mut l).unwrap();
        assert_eq!(contents(&l), [2]);
    }

    #[test]
    fn own_set_keeps_cursor_current() {
        let mut l = list_of(&[1, 2]);
        let mut c = l.cursor(0).unwrap();
        c.next(&l).unwrap();
        c.set(&mut l, 5).unwrap();
        c.set(&mut l, 6).unwrap();
        c.remove(&mut l).unwrap();
        assert_eq!(contents(&l), [2]);
    }

    #[test]
    fn cursor_remove_and_add_sequencing() {
        let mut l = list_of(&[1, 2, 3]);
        let mut c = l.cursor(0).unwrap();
        assert_eq!(
            c.remove(&mut l),
            Err(CollectionError::IllegalState("remove without a current element"))
        );
        c.next(&l).unwrap();
        c.remove(&mut l).unwrap();
        assert!(matches!(c.remove(&mut l), Err(CollectionError::IllegalState(_))));
        c.add(&mut l, 9).unwrap();
        assert!(matches!(c.set(&mut l, 0), Err(CollectionError::IllegalState(_))));
        assert_eq!(contents(&l), [9, 2, 3]);
        assert_eq!(c.next(&l).unwrap(), Some(&2));
    }

    #[test]
    fn other_cursors_follow_a_cursor_removal() {
        let mut l = list_of(&[1, 2, 3]);
        let mut a = l.cursor(0).unwrap();
        let mut b = l.cursor(1).unwrap();
        a.next(&l).unwrap();
        a.next(&l).unwrap();
        a.remove(&mut l).unwrap();
        assert_eq!(b.next(&l).unwrap(), Some(&3));
        assert_eq!(b.previous(&l).unwrap(), Some(&3));
        assert_eq!(b.previous(&l).unwrap(), Some(&1));
    }

    #[test]
    fn clear_leaves_cursors_empty_handed() {
        let mut l = list_of(&[1, 2, 3]);
        let mut c = l.cursor(2).unwrap();
        l.clear();
        assert!(!c.has_next(&l).unwrap());
        assert!(!c.has_previous(&l).unwrap());
        l.push_back(7);
        assert_eq!(c.next(&l).unwrap(), Some(&7));
    }

    #[test]
    fn close_and_drop_release_registration() {
        let mut l = list_of(&[1]);
        let mut a = l.cursor(0).unwrap();
        let b = l.cursor(1).unwrap();
        assert_eq!(l.cursor_count(), 2);
        a.close(&mut l).unwrap();
        assert!(a.is_closed());
        assert_eq!(a.next(&l), Err(CollectionError::CursorClosed));
        assert_eq!(a.close(&mut l), Err(CollectionError::CursorClosed));
        assert_eq!(l.cursor_count(), 1);
        drop(b);
        assert_eq!(l.cursor_count(), 0);
        l.push_back(2);
        assert!(l.cursors.is_empty(), "dead registrations swept on broadcast");
    }

    #[test]
    fn cursor_rejects_other_list() {
        let mut l = list_of(&[1]);
        let other = list_of(&[1]);
        let mut c = l.cursor(0).unwrap();
        assert_eq!(c.next(&other), Err(CollectionError::WrongOwner));
    }

    #[test]
    fn list_iter_fails_fast() {
        let mut l = list_of(&[1, 2, 3]);
        let mut it = l.list_iter();
        assert_eq!(it.next(&l).unwrap(), Some(&1));
        l.push_back(4);
        assert_eq!(it.next(&l), Err(CollectionError::ConcurrentModification));
        assert_eq!(it.has_next(&l), Err(CollectionError::ConcurrentModification));
    }

    #[test]
    fn list_iter_mutation_protocol() {
        let mut l = list_of(&[1, 2, 3]);
        let mut it = l.list_iter();
        assert_eq!(it.previous_index(), None);
        it.next(&l).unwrap();
        it.remove(&mut l).unwrap();
        assert!(matches!(it.remove(&mut l), Err(CollectionError::IllegalState(_))));
        assert_eq!(it.next_index(), 0);
        it.add(&mut l, 10).unwrap();
        assert_eq!(it.next_index(), 1);
        assert_eq!(it.next(&l).unwrap(), Some(&2));
        assert_eq!(it.set(&mut l, 20).unwrap(), 2);
        assert_eq!(it.previous(&l).unwrap(), Some(&20));
        it.remove(&mut l).unwrap();
        assert_eq!(it.next(&l).unwrap(), Some(&3));
        assert!(!it.has_next(&l).unwrap());
        assert_eq!(contents(&l), [10, 3]);
    }

    #[test]
    fn list_iter_at_walks_backwards() {
        let l = list_of(&[1, 2, 3]);
        let mut it = l.list_iter_at(3).unwrap();
        let mut seen = Vec::new();
        while let Some(v) = it.previous(&l).unwrap() {
            seen.push(*v);
        }
        assert_eq!(seen, [3, 2, 1]);
        assert!(l.list_iter_at(4).is_err());
    }

    #[test]
    fn list_iter_changes_reach_cursors() {
        let mut l = list_of(&[1, 2]);
        let mut c = l.cursor(0).unwrap();
        c.next(&l).unwrap();
        let mut it = l.list_iter();
        it.next(&l).unwrap();
        it.remove(&mut l).unwrap();
        assert_eq!(c.remove(&mut l), Ok(()));
        assert_eq!(c.next(&l).unwrap(), Some(&2));
    }
}
