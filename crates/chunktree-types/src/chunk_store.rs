use std::fmt;
use std::str::FromStr;

use chunktree_wire::{Address, Chunk};

use crate::error::StoreError;

/// How strongly a stored chunk must be retained.
///
/// Fixed for the lifetime of one builder and handed to every
/// [`ChunkStore::put`] call unchanged.
///
/// ```text
/// ┌───────────┬──────────────────────────────────────────────────┐
/// │ Mode      │ Meaning                                          │
/// ├───────────┼──────────────────────────────────────────────────┤
/// │ Persist   │ retained and made servable to other nodes        │
/// │ Transient │ may be stored with weaker durability guarantees  │
/// └───────────┴──────────────────────────────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Durability {
    Transient,
    #[default]
    Persist,
}

impl Durability {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Persist => "persist",
        }
    }
}

impl fmt::Display for Durability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Durability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "persist" => Ok(Self::Persist),
            "transient" => Ok(Self::Transient),
            _ => Err(format!("unknown durability {s:?}, expected persist|transient")),
        }
    }
}

/// Content store holding chunks by address.
///
/// The store is the only persistent owner of chunk data. The builder
/// calls [`put`](Self::put) once per finalized chunk; the joiner calls
/// [`get`](Self::get) once per chunk it visits. Chunks are immutable
/// once stored, so any number of joiners may read one store at a time.
///
/// ```text
/// Build path:
///   level buffer ──▶ Chunk ──▶ store.put(chunk, mode) ──▶ Address ──▶ parent level
///
/// Join path:
///   Address ──▶ store.get(address) ──▶ Chunk ──▶ data bytes | child addresses
/// ```
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; methods take `&self`, so
/// backends that mutate state use interior mutability.
pub trait ChunkStore: Send + Sync {
    /// Store a chunk and return its address.
    ///
    /// Storing the same chunk twice is a no-op that returns the same
    /// address.
    ///
    /// # Errors
    ///
    /// Backend failures, surfaced verbatim to the builder's caller.
    fn put(&self, chunk: &Chunk, durability: Durability) -> Result<Address, StoreError>;

    /// Fetch a chunk by address. `Ok(None)` means the address is unknown.
    ///
    /// # Errors
    ///
    /// Backend failures, surfaced verbatim to the joiner's caller.
    fn get(&self, address: &Address) -> Result<Option<Chunk>, StoreError>;

    /// Check for presence without fetching.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn contains(&self, address: &Address) -> Result<bool, StoreError> {
        Ok(self.get(address)?.is_some())
    }
}

impl<S: ChunkStore + ?Sized> ChunkStore for std::sync::Arc<S> {
    fn put(&self, chunk: &Chunk, durability: Durability) -> Result<Address, StoreError> {
        (**self).put(chunk, durability)
    }

    fn get(&self, address: &Address) -> Result<Option<Chunk>, StoreError> {
        (**self).get(address)
    }

    fn contains(&self, address: &Address) -> Result<bool, StoreError> {
        (**self).contains(address)
    }
}
