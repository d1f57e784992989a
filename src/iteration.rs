//! Shared protocol for detached, bidirectional iterators.
//!
//! A detached iterator does not borrow its collection between steps; the
//! owner is passed into every call instead. This keeps the collection free
//! for direct mutation while an iterator is open, which is what makes
//! fail-fast detection (and cursor self-healing) observable at all.

use crate::error::{CollectionError, Result};
use core::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of a collection instance.
///
/// Arena handles from two different collections can alias each other, so
/// iterators remember which instance minted them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    pub(crate) fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        OwnerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Snapshot of the owner's modification counter taken by a fail-fast iterator.
#[derive(Copy, Clone, Debug)]
pub(crate) struct ModCheck {
    owner: OwnerId,
    expected: u64,
}

impl ModCheck {
    pub(crate) fn new(owner: OwnerId, mod_count: u64) -> Self {
        Self {
            owner,
            expected: mod_count,
        }
    }

    #[inline]
    pub(crate) fn check(&self, owner: OwnerId, mod_count: u64) -> Result<()> {
        if owner != self.owner {
            return Err(CollectionError::WrongOwner);
        }
        if mod_count != self.expected {
            return Err(CollectionError::ConcurrentModification);
        }
        Ok(())
    }

    /// Re-arm after a mutation made through the iterator itself.
    #[inline]
    pub(crate) fn resync(&mut self, mod_count: u64) {
        self.expected = mod_count;
    }
}

/// Bidirectional iteration over a collection `C` that is passed in per step.
///
/// `Item<'a>` borrows from the owner for the duration of that borrow only.
pub trait BidiIterator<C: ?Sized> {
    type Item<'a>
    where
        C: 'a;

    fn has_next(&self, owner: &C) -> Result<bool>;

    /// Advance and return the next element, or `None` at the end.
    fn next<'a>(&mut self, owner: &'a C) -> Result<Option<Self::Item<'a>>>;

    fn has_previous(&self, owner: &C) -> Result<bool>;

    /// Step backwards and return the previous element, or `None` at the start.
    fn previous<'a>(&mut self, owner: &'a C) -> Result<Option<Self::Item<'a>>>;

    /// Remove the element last returned by `next` or `previous`.
    fn remove(&mut self, owner: &mut C) -> Result<()>;
}
