//! Debug-only reentrancy guard for sections that run user `Hash`/`Eq`.
//!
//! `HashedMap` (and every layer built on it) hashes a query and walks a
//! bucket chain comparing keys. Both steps call into user code. A key whose
//! `Hash` or `Eq` reaches back into the same table would observe it half
//! way through a lookup, so each step is entered as a named section and a
//! nested entry panics in debug builds, naming both sections. Release builds
//! compile the tracker away.

use core::cell::Cell;
use core::marker::PhantomData;

/// Per-table record of the section currently running user code.
#[derive(Debug)]
pub struct DebugReentrancy {
    #[cfg(debug_assertions)]
    active: Cell<Option<&'static str>>,
    _nosend: PhantomData<*mut ()>,
}

impl DebugReentrancy {
    pub const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            active: Cell::new(None),
            _nosend: PhantomData,
        }
    }

    /// Enter `section` (e.g. `"hash"`, `"chain walk"`) until the guard drops.
    ///
    /// Panics in debug builds if another section of the same table is still
    /// running.
    #[inline]
    pub fn enter(&self, section: &'static str) -> ReentrancyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            if let Some(outer) = self.active.replace(Some(section)) {
                panic!(
                    "reentrancy detected: {section} entered while {outer} \
                     is running user Hash/Eq on the same table"
                );
            }
            ReentrancyGuard { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            let _ = section;
            ReentrancyGuard { _z: PhantomData }
        }
    }

    /// Section currently entered; always `None` in release builds.
    pub fn active_section(&self) -> Option<&'static str> {
        #[cfg(debug_assertions)]
        {
            self.active.get()
        }

        #[cfg(not(debug_assertions))]
        {
            None
        }
    }
}

impl Default for DebugReentrancy {
    fn default() -> Self {
        Self::new()
    }
}

/// Leaves the section on drop.
pub struct ReentrancyGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugReentrancy,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.active.set(None);
    }
}
