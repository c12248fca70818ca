//! Failure paths through the public API: missing and corrupted chunks,
//! cancellation, misuse of a finalized builder, and store failures.

use std::io::{self, Read};
use std::sync::Arc;

use chunktree_builder::{BuildError, BuilderConfig, ChunkTreeBuilder, MemoryChunkStore};
use chunktree_joiner::{JoinError, Joiner, join_to_vec};
use chunktree_tests::{C, memory_store, sequential, split};
use chunktree_types::{Cancellation, ChunkStore, Durability, StoreError};
use chunktree_wire::{ADDRESS_SIZE, Address, BRANCHES, CHUNK_SIZE, Chunk};

fn join_err(store: &Arc<MemoryChunkStore>, root: Address) -> JoinError {
    join_to_vec(store.clone(), root, Cancellation::never()).unwrap_err()
}

// ── Missing chunks ────────────────────────────────────────────────────────────

#[test]
fn missing_root() {
    let store = memory_store();
    let root = Address::new([0x11; ADDRESS_SIZE]);
    let err = join_err(&store, root);
    assert!(matches!(err, JoinError::ChunkNotFound { address } if address == root));
}

#[test]
fn missing_grandchild_reports_its_address() {
    let store = memory_store();
    let root = split(&store, &sequential(CHUNK_SIZE * BRANCHES * 2));
    let level_one = store.get(&root).unwrap().unwrap().child_addresses().unwrap();
    let leaves = store.get(&level_one[1]).unwrap().unwrap().child_addresses().unwrap();
    store.remove(&leaves[5]);

    let (mut joiner, _) = Joiner::open(store, root, Cancellation::never()).unwrap();
    let mut out = Vec::new();
    let err = joiner.read_to_end(&mut out).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::NotFound);
    // Everything before the missing leaf was delivered.
    assert_eq!(out.len(), CHUNK_SIZE * (BRANCHES + 5));
    assert_eq!(joiner.position(), out.len() as u64);
}

// ── Corruption ────────────────────────────────────────────────────────────────

#[test]
fn ragged_reference_payload() {
    let store = memory_store();
    let root = split(&store, &sequential(CHUNK_SIZE * BRANCHES + 1));
    let children = store.get(&root).unwrap().unwrap().child_addresses().unwrap();
    // Keep the span, cut the address list mid-address.
    let original = store.get(&children[0]).unwrap().unwrap();
    let ragged = original.payload().slice(..ADDRESS_SIZE * 3 + 7);
    store.overwrite(children[0], Chunk::new(original.span(), ragged).unwrap());

    let err = join_err(&store, root);
    assert!(matches!(err, JoinError::CorruptTree { address, .. } if address == children[0]));
}

#[test]
fn reference_chunk_claiming_too_much() {
    let store = memory_store();
    let root = split(&store, &sequential(CHUNK_SIZE * 3));
    let root_chunk = store.get(&root).unwrap().unwrap();
    let inflated = Chunk::new(C * 4, root_chunk.payload().clone()).unwrap();
    let fake_root = store.put(&inflated, Durability::Persist).unwrap();

    let err = join_err(&store, fake_root);
    assert!(matches!(err, JoinError::CorruptTree { .. }));
}

#[test]
fn leaf_shorter_than_its_span() {
    let store = memory_store();
    let short = Chunk::new(100, vec![1u8; 40]).unwrap();
    let root = store.put(&short, Durability::Persist).unwrap();
    let err = Joiner::open(store, root, Cancellation::never()).err().unwrap();
    assert!(matches!(err, JoinError::CorruptTree { .. }));
}

#[test]
fn corrupt_tree_surfaces_as_invalid_data() {
    let store = memory_store();
    let root = split(&store, &sequential(CHUNK_SIZE + 1));
    let children = store.get(&root).unwrap().unwrap().child_addresses().unwrap();
    store.overwrite(children[0], Chunk::data(vec![0u8; 10]).unwrap());

    let (mut joiner, _) = Joiner::open(store, root, Cancellation::never()).unwrap();
    let err = joiner.read_to_end(&mut Vec::new()).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    assert_eq!(joiner.position(), 0);
}

// ── Cancellation ──────────────────────────────────────────────────────────────

#[test]
fn cancelled_builder_stays_cancelled() {
    let store = memory_store();
    let (handle, cancel) = Cancellation::pair();
    let mut builder = ChunkTreeBuilder::new(store.clone(), BuilderConfig::default(), cancel).unwrap();
    builder.write(&sequential(CHUNK_SIZE * 2)).unwrap();
    let stored = store.len();

    handle.cancel();
    for _ in 0..3 {
        assert!(matches!(builder.write(b"x"), Err(BuildError::Cancelled)));
    }
    assert!(matches!(builder.sum(), Err(BuildError::Cancelled)));
    assert_eq!(store.len(), stored, "nothing stored after cancellation");
}

#[test]
fn cancelled_joiner_stays_cancelled() {
    let store = memory_store();
    let root = split(&store, &sequential(CHUNK_SIZE * 10));
    let (handle, cancel) = Cancellation::pair();
    let (mut joiner, _) = Joiner::open(store, root, cancel).unwrap();
    let mut buf = vec![0u8; CHUNK_SIZE];
    joiner.read_exact(&mut buf).unwrap();

    handle.cancel();
    for _ in 0..3 {
        assert!(matches!(joiner.try_read(&mut buf), Err(JoinError::Cancelled)));
    }
    assert_eq!(joiner.position(), C);
}

// ── Builder misuse ────────────────────────────────────────────────────────────

#[test]
fn finalized_builder_rejects_writes_and_sums() {
    let store = memory_store();
    let mut builder =
        ChunkTreeBuilder::new(store, BuilderConfig::default(), Cancellation::never()).unwrap();
    builder.write(b"data").unwrap();
    builder.sum().unwrap();
    assert!(matches!(builder.write(b"more"), Err(BuildError::ClosedPipeline)));
    assert!(matches!(builder.sum(), Err(BuildError::AlreadyFinalized)));
}

#[test]
fn durability_reaches_every_put() {
    let store = memory_store();
    let mut builder =
        ChunkTreeBuilder::new(store.clone(), BuilderConfig::transient(), Cancellation::never())
            .unwrap();
    builder.write(&sequential(CHUNK_SIZE * 3 + 1)).unwrap();
    let root = builder.sum().unwrap();

    let mut addresses = store.get(&root).unwrap().unwrap().child_addresses().unwrap();
    addresses.push(root);
    for address in addresses {
        assert_eq!(store.durability_of(&address), Some(Durability::Transient));
    }
}

// ── Store failures ────────────────────────────────────────────────────────────

/// Accepts a fixed number of puts, then fails every call.
struct FlakyStore {
    inner: MemoryChunkStore,
    budget: std::sync::atomic::AtomicUsize,
}

impl ChunkStore for FlakyStore {
    fn put(&self, chunk: &Chunk, durability: Durability) -> Result<Address, StoreError> {
        use std::sync::atomic::Ordering;
        if self
            .budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
        {
            return Err(StoreError::Io(io::Error::other("device gone")));
        }
        self.inner.put(chunk, durability)
    }

    fn get(&self, address: &Address) -> Result<Option<Chunk>, StoreError> {
        self.inner.get(address)
    }
}

#[test]
fn store_failure_mid_cascade_poisons_builder() {
    let store = Arc::new(FlakyStore {
        inner: MemoryChunkStore::new(),
        budget: std::sync::atomic::AtomicUsize::new(4),
    });
    let mut builder =
        ChunkTreeBuilder::new(store, BuilderConfig::default(), Cancellation::never()).unwrap();
    let err = builder.write(&sequential(CHUNK_SIZE * 10)).unwrap_err();
    assert!(matches!(err, BuildError::Store(StoreError::Io(_))));
    assert_eq!(builder.chunks_stored(), 4);
    assert!(matches!(builder.write(b"x"), Err(BuildError::Poisoned)));
    assert!(matches!(builder.sum(), Err(BuildError::Poisoned)));
}
