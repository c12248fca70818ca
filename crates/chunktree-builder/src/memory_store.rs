use std::collections::HashMap;
use std::sync::RwLock;

use chunktree_types::{ChunkStore, Durability, StoreError};
use chunktree_wire::{Address, Chunk};
use tracing::trace;

/// In-memory chunk store backed by a `HashMap`.
///
/// Suitable for tests and for short-lived builds. Not persisted across
/// runs. Uses [`RwLock`] for interior mutability so the [`ChunkStore`]
/// methods (which take `&self`) can mutate the map from any thread.
///
/// Each entry remembers the strongest [`Durability`] it was stored with:
/// a chunk first stored transiently and later persisted is reported as
/// persisted.
///
/// # Example
///
/// ```rust
/// use chunktree_builder::MemoryChunkStore;
/// use chunktree_types::{ChunkStore, Durability};
/// use chunktree_wire::Chunk;
///
/// let store = MemoryChunkStore::new();
/// let chunk = Chunk::data(&b"fn main() {}"[..]).unwrap();
/// let address = store.put(&chunk, Durability::Persist).unwrap();
/// assert_eq!(store.get(&address).unwrap(), Some(chunk));
/// assert_eq!(store.len(), 1);
/// ```
pub struct MemoryChunkStore {
    chunks: RwLock<HashMap<Address, Entry>>,
}

struct Entry {
    chunk: Chunk,
    durability: Durability,
}

impl MemoryChunkStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
        }
    }

    /// Number of distinct chunks stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.read().expect("chunk store lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total encoded bytes held (span prefix plus payload per chunk).
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.chunks
            .read()
            .expect("chunk store lock poisoned")
            .values()
            .map(|entry| entry.chunk.encoded_len())
            .sum()
    }

    /// The durability a chunk was stored with, if present.
    #[must_use]
    pub fn durability_of(&self, address: &Address) -> Option<Durability> {
        self.chunks
            .read()
            .expect("chunk store lock poisoned")
            .get(address)
            .map(|entry| entry.durability)
    }

    /// Remove a chunk. Returns `true` if it was present.
    ///
    /// Only used to simulate missing chunks; the builder and joiner
    /// never delete.
    pub fn remove(&self, address: &Address) -> bool {
        self.chunks
            .write()
            .expect("chunk store lock poisoned")
            .remove(address)
            .is_some()
    }

    /// Replace the chunk stored under `address` without rehashing.
    ///
    /// Only used to simulate corrupted stores.
    pub fn overwrite(&self, address: Address, chunk: Chunk) {
        self.chunks.write().expect("chunk store lock poisoned").insert(
            address,
            Entry {
                chunk,
                durability: Durability::Persist,
            },
        );
    }
}

impl Default for MemoryChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStore for MemoryChunkStore {
    fn put(&self, chunk: &Chunk, durability: Durability) -> Result<Address, StoreError> {
        let address = chunk.address();
        let mut chunks = self.chunks.write().expect("chunk store lock poisoned");
        trace!(%address, span = chunk.span(), %durability, "storing chunk in memory");
        chunks
            .entry(address)
            .and_modify(|entry| entry.durability = entry.durability.max(durability))
            .or_insert_with(|| Entry {
                chunk: chunk.clone(),
                durability,
            });
        Ok(address)
    }

    fn get(&self, address: &Address) -> Result<Option<Chunk>, StoreError> {
        Ok(self
            .chunks
            .read()
            .expect("chunk store lock poisoned")
            .get(address)
            .map(|entry| entry.chunk.clone()))
    }

    fn contains(&self, address: &Address) -> Result<bool, StoreError> {
        Ok(self
            .chunks
            .read()
            .expect("chunk store lock poisoned")
            .contains_key(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(data: &'static [u8]) -> Chunk {
        Chunk::data(data).unwrap()
    }

    #[test]
    fn put_get_roundtrip() {
        let store = MemoryChunkStore::new();
        let c = chunk(b"fn main() { println!(\"hello\"); }");
        let address = store.put(&c, Durability::Persist).unwrap();
        assert_eq!(store.get(&address).unwrap(), Some(c));
    }

    #[test]
    fn put_returns_chunk_address() {
        let store = MemoryChunkStore::new();
        let c = chunk(b"deterministic content");
        assert_eq!(store.put(&c, Durability::Persist).unwrap(), c.address());
    }

    #[test]
    fn dedup_stores_only_once() {
        let store = MemoryChunkStore::new();
        let c = chunk(b"duplicate content");
        store.put(&c, Durability::Persist).unwrap();
        store.put(&c, Durability::Persist).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn strongest_durability_wins() {
        let store = MemoryChunkStore::new();
        let c = chunk(b"upgrade me");
        let address = store.put(&c, Durability::Transient).unwrap();
        assert_eq!(store.durability_of(&address), Some(Durability::Transient));
        store.put(&c, Durability::Persist).unwrap();
        assert_eq!(store.durability_of(&address), Some(Durability::Persist));
        store.put(&c, Durability::Transient).unwrap();
        assert_eq!(store.durability_of(&address), Some(Durability::Persist));
    }

    #[test]
    fn get_returns_none_for_unknown_address() {
        let store = MemoryChunkStore::new();
        let unknown = Address::new([0xFF; 32]);
        assert!(store.get(&unknown).unwrap().is_none());
        assert!(!store.contains(&unknown).unwrap());
    }

    #[test]
    fn len_and_total_bytes() {
        let store = MemoryChunkStore::new();
        assert!(store.is_empty());
        assert_eq!(store.total_bytes(), 0);

        store.put(&chunk(b"hello"), Durability::Persist).unwrap(); // 8 + 5
        store.put(&chunk(b"world"), Durability::Persist).unwrap(); // 8 + 5
        assert_eq!(store.len(), 2);
        assert_eq!(store.total_bytes(), 26);
    }

    #[test]
    fn remove_drops_chunk() {
        let store = MemoryChunkStore::new();
        let address = store.put(&chunk(b"gone"), Durability::Persist).unwrap();
        assert!(store.remove(&address));
        assert!(!store.remove(&address));
        assert!(store.get(&address).unwrap().is_none());
    }
}
