use std::io;

use chunktree_types::StoreError;
use chunktree_wire::Address;

/// Errors that can occur while reconstructing content from a root address.
///
/// Error hierarchy:
///
/// ```text
///   JoinError
///   ├── ChunkNotFound      ← the store has no chunk under an address
///   ├── CorruptTree        ← spans or address counts contradict each other
///   ├── Cancelled          ← cancellation observed before/after a fetch
///   └── Store(StoreError)  ← from the chunk store, verbatim
/// ```
///
/// None of these are retried or repaired here. A `CorruptTree` is fatal
/// to the join; a `ChunkNotFound` or `Store` error leaves the joiner at
/// the last delivered byte, so the caller may retry the read.
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error("chunk not found: {address}")]
    ChunkNotFound { address: Address },

    #[error("corrupt tree at {address}: {reason}")]
    CorruptTree { address: Address, reason: String },

    #[error("join cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl JoinError {
    pub(crate) fn corrupt(address: Address, reason: impl Into<String>) -> Self {
        Self::CorruptTree {
            address,
            reason: reason.into(),
        }
    }
}

impl From<JoinError> for io::Error {
    fn from(err: JoinError) -> Self {
        let kind = match &err {
            JoinError::ChunkNotFound { .. } => io::ErrorKind::NotFound,
            JoinError::CorruptTree { .. } => io::ErrorKind::InvalidData,
            // Not `Interrupted`: `read_to_end` and `io::copy` retry that kind.
            JoinError::Cancelled | JoinError::Store(_) => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
