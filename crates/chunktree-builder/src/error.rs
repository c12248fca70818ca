use chunktree_types::StoreError;
use chunktree_wire::WireError;

/// Errors that can occur while splitting a byte stream into a chunk tree.
///
/// Error hierarchy:
///
/// ```text
///   BuildError
///   ├── CapacityExceeded      ← append to a full level buffer (a bug, not user error)
///   ├── NoRoot                ← flush ended without a single top address (a bug)
///   ├── ClosedPipeline        ← write after sum
///   ├── AlreadyFinalized      ← sum called twice
///   ├── Cancelled             ← cancellation observed; builder is dead
///   ├── Poisoned              ← an earlier store failure left the cascade half done
///   ├── EncryptionUnsupported ← encrypt flag set at construction
///   ├── Store(StoreError)     ← from the chunk store, verbatim
///   └── Wire(WireError)       ← from chunk construction
/// ```
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("level {level} buffer is full; it must be finalized before appending")]
    CapacityExceeded { level: usize },

    #[error("no single root address left after flushing {levels} levels")]
    NoRoot { levels: usize },

    #[error("write called after the tree was finalized")]
    ClosedPipeline,

    #[error("sum called more than once")]
    AlreadyFinalized,

    #[error("build cancelled")]
    Cancelled,

    #[error("builder unusable after an earlier store failure")]
    Poisoned,

    #[error("encryption is not supported by this builder")]
    EncryptionUnsupported,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Wire(#[from] WireError),
}
