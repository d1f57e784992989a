//! Error type shared by every collection in the crate.

use thiserror::Error;

/// Failures surfaced by collection operations.
///
/// Absent keys are never an error; lookups return `None` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    /// The owner was structurally modified behind a fail-fast iterator.
    #[error("collection was modified during iteration")]
    ConcurrentModification,

    /// An iterator or cursor operation was called out of sequence.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    /// A rejected argument (bad configuration, dead referent, zero size...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Positional access outside `0..len`.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Mutation attempted through a read-only view.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The collection holds no elements.
    #[error("collection is empty")]
    Empty,

    /// An iterator or cursor was used with a collection other than its owner.
    #[error("iterator used with a collection it does not belong to")]
    WrongOwner,

    /// The cursor was closed and can no longer be used.
    #[error("cursor is closed")]
    CursorClosed,
}

pub type Result<T> = core::result::Result<T, CollectionError>;

impl CollectionError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        CollectionError::InvalidArgument(msg.into())
    }

    pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
        if index < len {
            Ok(())
        } else {
            Err(CollectionError::IndexOutOfBounds { index, len })
        }
    }
}
