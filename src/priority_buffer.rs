//! PriorityBuffer: an array-backed binary heap with a pluggable comparator.
//!
//! Positions are 1-based in the heap arithmetic (`children = 2i, 2i + 1`,
//! `parent = i / 2`) and mapped onto a 0-based `Vec`: position `i` lives at
//! `heap[i - 1]`. There is no unused slot 0, so the `Vec` length is the
//! element count and iteration yields elements only, root first. The order
//! is fixed at construction: an ascending buffer yields its least element
//! first.

use crate::error::{CollectionError, Result};
use core::cmp::Ordering;
use core::fmt;

/// Total order used by a `PriorityBuffer`.
pub trait Comparator<T> {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// The element type's own `Ord`.
#[derive(Copy, Clone, Debug, Default)]
pub struct NaturalOrder;

impl<T: Ord> Comparator<T> for NaturalOrder {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

impl<T, F> Comparator<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}

#[derive(Clone)]
pub struct PriorityBuffer<T, C = NaturalOrder> {
    heap: Vec<T>,
    ascending: bool,
    comparator: C,
}

impl<T: Ord> PriorityBuffer<T> {
    /// Ascending buffer in natural order.
    pub fn new() -> Self {
        Self::with_comparator(NaturalOrder, true)
    }

    /// Descending buffer in natural order.
    pub fn new_descending() -> Self {
        Self::with_comparator(NaturalOrder, false)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut buf = Self::new();
        buf.heap.reserve_exact(capacity);
        buf
    }
}

impl<T: Ord> Default for PriorityBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Comparator<T>> PriorityBuffer<T, C> {
    pub fn with_comparator(comparator: C, ascending: bool) -> Self {
        Self {
            heap: Vec::new(),
            ascending,
            comparator,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Elements in heap array order, which is not removal order.
    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.heap.iter()
    }

    pub fn add(&mut self, value: T) {
        if self.heap.len() == self.heap.capacity() {
            let grow = self.heap.capacity().max(1);
            self.heap.reserve_exact(grow);
            log::trace!("priority buffer grown to {}", self.heap.capacity());
        }
        self.heap.push(value);
        self.percolate_up(self.heap.len());
    }

    /// The element `remove` would return next.
    pub fn get(&self) -> Result<&T> {
        self.heap.first().ok_or(CollectionError::Empty)
    }

    pub fn remove(&mut self) -> Result<T> {
        if self.heap.is_empty() {
            return Err(CollectionError::Empty);
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let root = self.heap.pop().ok_or(CollectionError::Empty)?;
        if !self.heap.is_empty() {
            self.percolate_down(1);
        }
        Ok(root)
    }

    /// Drain the buffer in removal order.
    pub fn into_sorted_vec(mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        while let Ok(v) = self.remove() {
            out.push(v);
        }
        out
    }

    /// Whether the element at 1-based `a` must sit above the one at `b`.
    #[inline]
    fn precedes(&self, a: usize, b: usize) -> bool {
        let ord = self.comparator.compare(&self.heap[a - 1], &self.heap[b - 1]);
        if self.ascending {
            ord == Ordering::Less
        } else {
            ord == Ordering::Greater
        }
    }

    fn percolate_up(&mut self, mut pos: usize) {
        while pos > 1 {
            let parent = pos / 2;
            if !self.precedes(pos, parent) {
                break;
            }
            self.heap.swap(pos - 1, parent - 1);
            pos = parent;
        }
    }

    fn percolate_down(&mut self, mut pos: usize) {
        let len = self.heap.len();
        loop {
            let mut child = pos * 2;
            if child > len {
                break;
            }
            if child < len && self.precedes(child + 1, child) {
                child += 1;
            }
            if !self.precedes(child, pos) {
                break;
            }
            self.heap.swap(child - 1, pos - 1);
            pos = child;
        }
    }

    #[cfg(test)]
    fn is_heap(&self) -> bool {
        (2..=self.len()).all(|i| !self.precedes(i, i / 2))
    }
}

impl<T, C: Comparator<T>> Extend<T> for PriorityBuffer<T, C> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for v in iter {
            self.add(v);
        }
    }
}

impl<T: Ord> FromIterator<T> for PriorityBuffer<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut buf = Self::new();
        buf.extend(iter);
        buf
    }
}

impl<'a, T, C> IntoIterator for &'a PriorityBuffer<T, C> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.heap.iter()
    }
}

impl<T: fmt::Debug, C> fmt::Debug for PriorityBuffer<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityBuffer")
            .field("ascending", &self.ascending)
            .field("heap", &self.heap)
            .finish()
    }
}
