use chunktree_wire::{Address, WireError};

/// Errors reported by a [`ChunkStore`](crate::ChunkStore) implementation.
///
/// The builder and joiner never retry; whatever the store returns is
/// surfaced to their caller unchanged, wrapped in their own error type.
///
/// ```text
/// ┌─────────────────────────────────────────────────────┐
/// │ StoreError (this crate)                             │
/// │   ├── Io        for filesystem / device failures    │
/// │   ├── Corrupt   stored bytes hash to another address│
/// │   ├── Wire      stored bytes are not a valid chunk  │
/// │   └── Backend   anything else a backend reports     │
/// └─────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes stored under `expected` hash to `actual`.
    #[error("chunk corruption detected: expected {expected}, actual hash {actual}")]
    Corrupt { expected: Address, actual: Address },

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("store backend error: {0}")]
    Backend(String),
}
