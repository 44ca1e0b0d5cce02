//! Error types for the library model.
//!
//! Model mutators trust the rule checker to have validated an action. These
//! errors only fire when that trust is broken: the caller named a copy the
//! model never saw, or claimed a copy sits somewhere it does not.

use shelfwatch_proto::{BookCopyId, Location, ProtocolError};
use thiserror::Error;

/// Errors raised by [`crate::LibrarySystem`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Inventory could not be loaded.
    #[error("inventory rejected: {0}")]
    Inventory(#[from] ProtocolError),

    /// Inventory was loaded twice.
    #[error("inventory already loaded")]
    AlreadyInitialized,

    /// The copy is not part of the inventory.
    #[error("unknown book copy {0}")]
    UnknownCopy(BookCopyId),

    /// The copy is not where the caller said it was.
    #[error("{copy} is at {actual}, not {expected}")]
    LocationMismatch {
        /// Copy being moved
        copy: BookCopyId,
        /// Location the caller assumed
        expected: Location,
        /// Location the model has on record
        actual: Location,
    },
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
