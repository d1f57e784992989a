//! Reference-counted referents that report their own reclamation.
//!
//! A `Tracked<T>` is an `Rc`-style strong handle. Maps that hold a referent
//! only weakly register a `ReclaimQueue` with it; when the last strong handle
//! goes away, the referent pushes a `ReclaimNotice` into every queue that is
//! still alive. Draining the queue tells the map exactly which bucket holds
//! the stale entry.

use core::cell::RefCell;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Deref;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

/// Notice that a tracked referent has been reclaimed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReclaimNotice {
    /// Cached hash of the map entry that referenced the referent.
    pub hash: u32,
    pub(crate) referent: usize,
}

type Notices = RefCell<VecDeque<ReclaimNotice>>;

/// Queue receiving reclaim notices; cheap to clone (shared).
#[derive(Clone, Default)]
pub struct ReclaimQueue {
    notices: Rc<Notices>,
}

impl ReclaimQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.notices.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.borrow().is_empty()
    }

    /// Take every pending notice, oldest first.
    pub fn drain(&self) -> Vec<ReclaimNotice> {
        let mut q = self.notices.borrow_mut();
        let out = q.drain(..).collect();
        out
    }

    fn ptr_eq(&self, other: &Weak<Notices>) -> bool {
        core::ptr::eq(Rc::as_ptr(&self.notices), other.as_ptr())
    }
}

impl fmt::Debug for ReclaimQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReclaimQueue")
            .field("pending", &self.len())
            .finish()
    }
}

struct Watcher {
    queue: Weak<Notices>,
    hash: u32,
}

struct TrackedInner<T> {
    value: T,
    watchers: RefCell<Vec<Watcher>>,
}

impl<T> Drop for TrackedInner<T> {
    fn drop(&mut self) {
        let referent = self as *const Self as *const () as usize;
        for w in self.watchers.get_mut().drain(..) {
            if let Some(q) = w.queue.upgrade() {
                q.borrow_mut().push_back(ReclaimNotice {
                    hash: w.hash,
                    referent,
                });
            }
        }
    }
}

/// Strong, reference-counted handle to a referent.
pub struct Tracked<T> {
    inner: Rc<TrackedInner<T>>,
}

impl<T> Tracked<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(TrackedInner {
                value,
                watchers: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakTracked<T> {
        WeakTracked {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    /// Ask to be told through `queue` when this referent is reclaimed.
    pub(crate) fn watch(&self, queue: &ReclaimQueue, hash: u32) {
        let mut watchers = self.inner.watchers.borrow_mut();
        watchers.retain(|w| w.queue.strong_count() > 0);
        if watchers
            .iter()
            .any(|w| w.hash == hash && queue.ptr_eq(&w.queue))
        {
            return;
        }
        watchers.push(Watcher {
            queue: Rc::downgrade(&queue.notices),
            hash,
        });
    }

    #[cfg(test)]
    pub(crate) fn watcher_count(&self) -> usize {
        self.inner.watchers.borrow().len()
    }
}

impl<T> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.inner.value
    }
}

impl<T> AsRef<T> for Tracked<T> {
    fn as_ref(&self) -> &T {
        &self.inner.value
    }
}

impl<T: PartialEq> PartialEq for Tracked<T> {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl<T: Eq> Eq for Tracked<T> {}

impl<T: Hash> Hash for Tracked<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (**self).hash(state)
    }
}

impl<T: fmt::Debug> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Tracked").field(&**self).finish()
    }
}

/// Weak handle that does not keep its referent alive.
pub struct WeakTracked<T> {
    inner: Weak<TrackedInner<T>>,
}

impl<T> WeakTracked<T> {
    pub fn upgrade(&self) -> Option<Tracked<T>> {
        self.inner.upgrade().map(|inner| Tracked { inner })
    }

    pub fn is_live(&self) -> bool {
        self.inner.strong_count() > 0
    }

    pub(crate) fn addr(&self) -> usize {
        self.inner.as_ptr() as *const () as usize
    }
}

impl<T> Clone for WeakTracked<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for WeakTracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakTracked(live: {})", self.is_live())
    }
}
