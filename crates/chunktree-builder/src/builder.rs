use std::io;
use std::sync::Arc;

use chunktree_types::{Cancellation, ChunkStore};
use chunktree_wire::{Address, Chunk};
use tracing::{debug, trace};

use crate::config::BuilderConfig;
use crate::error::BuildError;
use crate::level_buffer::LevelBuffer;

/// Streaming splitter: turns a byte stream into a tree of chunks and
/// returns the root address.
///
/// Bytes written with [`write`](Self::write) accumulate in the level 0
/// buffer. Every time a buffer fills it is finalized into a chunk, the
/// chunk is stored, and its address is appended one level up. Memory use
/// is one [`LevelBuffer`] per tree level regardless of input size.
///
/// ```text
///   write(bytes)
///        │
///        ▼
///   level 0 [ bytes ........ ] ──full──▶ data chunk ──put──▶ addr
///                                                             │
///   level 1 [ addr addr ... ] ◀───────────────────────────────┘
///        │ full (128 addresses)
///        ▼
///   level 2 [ addr ... ]   ... grows on demand
/// ```
///
/// Because buffers only ever wrap when full (or at [`sum`](Self::sum)),
/// every node except the rightmost one on each level subsumes exactly
/// `CHUNK_SIZE * BRANCHES^level` bytes. The joiner relies on that to
/// recompute child spans without storing them, and it is also why the
/// root address does not depend on how the input was split across
/// `write` calls.
///
/// # Usage
///
/// ```rust
/// use std::sync::Arc;
///
/// use chunktree_builder::{BuilderConfig, ChunkTreeBuilder, MemoryChunkStore};
/// use chunktree_types::{Cancellation, ChunkStore};
///
/// let store = Arc::new(MemoryChunkStore::new());
/// let mut builder =
///     ChunkTreeBuilder::new(store.clone(), BuilderConfig::default(), Cancellation::never())
///         .unwrap();
/// builder.write(b"hello ").unwrap();
/// builder.write(b"world").unwrap();
/// let root = builder.sum().unwrap();
///
/// let chunk = store.get(&root).unwrap().unwrap();
/// assert_eq!(chunk.span(), 11);
/// ```
pub struct ChunkTreeBuilder {
    store: Arc<dyn ChunkStore>,
    config: BuilderConfig,
    cancel: Cancellation,
    /// Index `k` holds level `k`; grown lazily as the tree deepens.
    levels: Vec<LevelBuffer>,
    written: u64,
    chunks_stored: u64,
    state: State,
}

/// Lifecycle of a builder. Every state but `Open` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Open,
    Finalized,
    Cancelled,
    Poisoned,
}

impl ChunkTreeBuilder {
    /// Create a builder that stores chunks in `store` with the durability
    /// from `config`.
    ///
    /// # Errors
    ///
    /// [`BuildError::EncryptionUnsupported`] if `config.encrypt` is set.
    pub fn new(
        store: Arc<dyn ChunkStore>,
        config: BuilderConfig,
        cancel: Cancellation,
    ) -> Result<Self, BuildError> {
        if config.encrypt {
            return Err(BuildError::EncryptionUnsupported);
        }
        Ok(Self {
            store,
            config,
            cancel,
            levels: vec![LevelBuffer::new(0)],
            written: 0,
            chunks_stored: 0,
            state: State::Open,
        })
    }

    #[must_use]
    pub fn config(&self) -> BuilderConfig {
        self.config
    }

    /// Total bytes accepted so far.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Chunks handed to the store so far.
    #[must_use]
    pub fn chunks_stored(&self) -> u64 {
        self.chunks_stored
    }

    /// Number of levels currently allocated.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Append bytes to the stream. Returns `data.len()` on success.
    ///
    /// Full buffers are finalized and stored before this returns, so a
    /// subsequent `write` always starts from a fully propagated cascade.
    ///
    /// # Errors
    ///
    /// - [`BuildError::ClosedPipeline`] after [`sum`](Self::sum).
    /// - [`BuildError::Cancelled`] if cancellation was observed, now or
    ///   on an earlier call.
    /// - [`BuildError::Poisoned`] if an earlier call failed mid-cascade.
    /// - [`BuildError::Store`] if the store rejects a chunk. The builder
    ///   is poisoned afterwards.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, BuildError> {
        match self.state {
            State::Open => {}
            State::Finalized => return Err(BuildError::ClosedPipeline),
            State::Cancelled => return Err(BuildError::Cancelled),
            State::Poisoned => return Err(BuildError::Poisoned),
        }
        let result = self.write_inner(data);
        if result.is_err() {
            self.poison();
        }
        result
    }

    /// Flush every level and return the root address.
    ///
    /// - No bytes written: an empty data chunk (span 0) is stored and its
    ///   address returned.
    /// - Content that fits one chunk: the data chunk itself is the root.
    /// - Otherwise levels are flushed bottom-up. A level left holding a
    ///   single address is never wrapped on its own: if nothing sits above
    ///   it, that address is the root; if something does, the address is
    ///   carried up unchanged and becomes the last child there. Levels with
    ///   two or more addresses are wrapped into a reference chunk whose
    ///   address moves one level up.
    ///
    /// # Errors
    ///
    /// - [`BuildError::AlreadyFinalized`] on a second call.
    /// - [`BuildError::Cancelled`], [`BuildError::Poisoned`],
    ///   [`BuildError::Store`] as for [`write`](Self::write).
    pub fn sum(&mut self) -> Result<Address, BuildError> {
        match self.state {
            State::Open => {}
            State::Finalized => return Err(BuildError::AlreadyFinalized),
            State::Cancelled => return Err(BuildError::Cancelled),
            State::Poisoned => return Err(BuildError::Poisoned),
        }
        let result = self.sum_inner();
        match &result {
            Ok(root) => {
                self.state = State::Finalized;
                debug!(
                    %root,
                    bytes = self.written,
                    chunks = self.chunks_stored,
                    levels = self.levels.len(),
                    "chunk tree finalized"
                );
            }
            Err(_) => self.poison(),
        }
        result
    }

    // ── Internal helpers ────────────────────────────────────────────────

    fn write_inner(&mut self, data: &[u8]) -> Result<usize, BuildError> {
        self.check_cancelled()?;
        let mut rest = data;
        while !rest.is_empty() {
            let taken = self.levels[0].append_data(rest)?;
            rest = &rest[taken..];
            self.written += taken as u64;
            if self.levels[0].is_full() {
                self.wrap_level(0)?;
            }
        }
        Ok(data.len())
    }

    fn sum_inner(&mut self) -> Result<Address, BuildError> {
        self.check_cancelled()?;
        if self.written == 0 {
            return self.store_chunk(&Chunk::empty());
        }

        self.wrap_level(0)?;

        let mut level = 1;
        while level < self.levels.len() {
            let above_empty = self.levels[level + 1..].iter().all(LevelBuffer::is_empty);
            match self.levels[level].entries() {
                0 => {}
                1 => {
                    let (address, span) = self.levels[level]
                        .take_single()
                        .ok_or(BuildError::CapacityExceeded { level })?;
                    if above_empty {
                        return Ok(address);
                    }
                    trace!(level, %address, span, "carrying single address up");
                    self.push_address(level + 1, address, span)?;
                }
                _ => self.wrap_level(level)?,
            }
            level += 1;
        }

        Err(BuildError::NoRoot {
            levels: self.levels.len(),
        })
    }

    /// Finalize `level`, store the chunk and append its address one level
    /// up; repeat upward while that append fills the parent.
    fn wrap_level(&mut self, mut level: usize) -> Result<(), BuildError> {
        loop {
            let Some(chunk) = self.levels[level].finalize()? else {
                return Ok(());
            };
            let address = self.store_chunk(&chunk)?;
            trace!(level, %address, span = chunk.span(), "wrapped level");
            self.push_address(level + 1, address, chunk.span())?;
            if !self.levels[level + 1].is_full() {
                return Ok(());
            }
            level += 1;
        }
    }

    fn push_address(&mut self, level: usize, address: Address, span: u64) -> Result<(), BuildError> {
        if level == self.levels.len() {
            debug!(level, "opening new tree level");
            self.levels.push(LevelBuffer::new(level));
        }
        self.levels[level].append_address(address, span)
    }

    fn store_chunk(&mut self, chunk: &Chunk) -> Result<Address, BuildError> {
        self.check_cancelled()?;
        let address = self.store.put(chunk, self.config.durability)?;
        self.chunks_stored += 1;
        self.check_cancelled()?;
        Ok(address)
    }

    fn check_cancelled(&mut self) -> Result<(), BuildError> {
        if self.cancel.is_cancelled() {
            self.state = State::Cancelled;
            return Err(BuildError::Cancelled);
        }
        Ok(())
    }

    /// A failure left the cascade half done; refuse further use unless a
    /// more specific terminal state was already recorded.
    fn poison(&mut self) {
        if self.state == State::Open {
            self.state = State::Poisoned;
        }
    }
}

impl io::Write for ChunkTreeBuilder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ChunkTreeBuilder::write(self, buf).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use chunktree_joiner::Joiner;
    use chunktree_types::{Durability, StoreError};
    use chunktree_wire::{BRANCHES, CHUNK_SIZE};

    use super::*;
    use crate::MemoryChunkStore;

    fn builder(store: &Arc<MemoryChunkStore>) -> ChunkTreeBuilder {
        ChunkTreeBuilder::new(store.clone(), BuilderConfig::default(), Cancellation::never())
            .unwrap()
    }

    fn build(store: &Arc<MemoryChunkStore>, data: &[u8]) -> Address {
        let mut b = builder(store);
        b.write(data).unwrap();
        b.sum().unwrap()
    }

    fn sequential(len: usize) -> Vec<u8> {
        (0..len).map(|i| u8::try_from(i % 255).unwrap()).collect()
    }

    fn span_of(store: &MemoryChunkStore, address: &Address) -> u64 {
        store.get(address).unwrap().unwrap().span()
    }

    #[test]
    fn hello_world_is_a_single_data_chunk() {
        let store = Arc::new(MemoryChunkStore::new());
        let root = build(&store, b"hello world");
        assert_eq!(store.len(), 1);
        assert_eq!(root, Chunk::data(&b"hello world"[..]).unwrap().address());
        assert_eq!(span_of(&store, &root), 11);
    }

    #[test]
    fn partial_writes_match_single_write() {
        let store = Arc::new(MemoryChunkStore::new());
        let mut b = builder(&store);
        b.write(b"hello ").unwrap();
        b.write(b"world").unwrap();
        let split = b.sum().unwrap();
        assert_eq!(split, build(&store, b"hello world"));
    }

    #[test]
    fn empty_input_stores_empty_chunk() {
        let store = Arc::new(MemoryChunkStore::new());
        let root = builder(&store).sum().unwrap();
        assert_eq!(root, Chunk::empty().address());
        assert_eq!(span_of(&store, &root), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn exact_chunk_size_is_single_leaf() {
        let store = Arc::new(MemoryChunkStore::new());
        let data = sequential(CHUNK_SIZE);
        let root = build(&store, &data);
        assert_eq!(root, Chunk::data(data).unwrap().address());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn one_byte_over_chunk_size_makes_two_levels() {
        let store = Arc::new(MemoryChunkStore::new());
        let root = build(&store, &sequential(CHUNK_SIZE + 1));
        let chunk = store.get(&root).unwrap().unwrap();
        assert_eq!(chunk.span(), CHUNK_SIZE as u64 + 1);
        let children = chunk.child_addresses().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(span_of(&store, &children[0]), CHUNK_SIZE as u64);
        assert_eq!(span_of(&store, &children[1]), 1);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn full_intermediate_level_collapses_to_its_chunk() {
        let store = Arc::new(MemoryChunkStore::new());
        let len = CHUNK_SIZE * BRANCHES;
        let root = build(&store, &sequential(len));
        let chunk = store.get(&root).unwrap().unwrap();
        assert_eq!(chunk.span(), len as u64);
        assert_eq!(chunk.child_addresses().unwrap().len(), BRANCHES);
    }

    #[test]
    fn single_trailing_leaf_is_carried_up() {
        // 128 full leaves wrap into one level-1 chunk; the 129th leaf sits
        // alone on level 1 and is carried next to it on level 2.
        let store = Arc::new(MemoryChunkStore::new());
        let len = CHUNK_SIZE * BRANCHES + CHUNK_SIZE;
        let root = build(&store, &sequential(len));
        let chunk = store.get(&root).unwrap().unwrap();
        let children = chunk.child_addresses().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(span_of(&store, &children[0]), (CHUNK_SIZE * BRANCHES) as u64);
        assert_eq!(span_of(&store, &children[1]), CHUNK_SIZE as u64);
        assert!(store.get(&children[1]).unwrap().unwrap().is_data());
    }

    #[test]
    fn write_partitioning_does_not_change_root() {
        let data = sequential(CHUNK_SIZE * 3 + 17);
        let store = Arc::new(MemoryChunkStore::new());
        let whole = build(&store, &data);

        for step in [1, 7, 4095, 4096, 4097, 10_000] {
            let mut b = builder(&store);
            for piece in data.chunks(step) {
                b.write(piece).unwrap();
            }
            assert_eq!(b.sum().unwrap(), whole, "step {step}");
        }
    }

    #[test]
    fn write_after_sum_is_closed_pipeline() {
        let store = Arc::new(MemoryChunkStore::new());
        let mut b = builder(&store);
        b.write(b"abc").unwrap();
        b.sum().unwrap();
        assert!(matches!(b.write(b"more"), Err(BuildError::ClosedPipeline)));
    }

    #[test]
    fn second_sum_is_already_finalized() {
        let store = Arc::new(MemoryChunkStore::new());
        let mut b = builder(&store);
        b.sum().unwrap();
        assert!(matches!(b.sum(), Err(BuildError::AlreadyFinalized)));
    }

    #[test]
    fn encryption_flag_is_rejected() {
        let store = Arc::new(MemoryChunkStore::new());
        let config = BuilderConfig {
            encrypt: true,
            ..BuilderConfig::default()
        };
        let result = ChunkTreeBuilder::new(store, config, Cancellation::never());
        assert!(matches!(result, Err(BuildError::EncryptionUnsupported)));
    }

    #[test]
    fn durability_reaches_the_store() {
        let store = Arc::new(MemoryChunkStore::new());
        let mut b =
            ChunkTreeBuilder::new(store.clone(), BuilderConfig::transient(), Cancellation::never())
                .unwrap();
        b.write(&sequential(CHUNK_SIZE * 2)).unwrap();
        let root = b.sum().unwrap();
        assert_eq!(store.durability_of(&root), Some(Durability::Transient));
    }

    #[test]
    fn cancellation_makes_builder_unusable() {
        let store = Arc::new(MemoryChunkStore::new());
        let (handle, cancel) = Cancellation::pair();
        let mut b = ChunkTreeBuilder::new(store, BuilderConfig::default(), cancel).unwrap();
        b.write(b"before").unwrap();
        handle.cancel();
        assert!(matches!(b.write(b"after"), Err(BuildError::Cancelled)));
        assert!(matches!(b.sum(), Err(BuildError::Cancelled)));
        assert!(matches!(b.write(b""), Err(BuildError::Cancelled)));
    }

    struct FailingStore;

    impl ChunkStore for FailingStore {
        fn put(&self, _: &Chunk, _: Durability) -> Result<Address, StoreError> {
            Err(StoreError::Backend("disk full".into()))
        }

        fn get(&self, _: &Address) -> Result<Option<Chunk>, StoreError> {
            Ok(None)
        }
    }

    #[test]
    fn store_failure_surfaces_and_poisons() {
        let store = Arc::new(FailingStore);
        let mut b =
            ChunkTreeBuilder::new(store, BuilderConfig::default(), Cancellation::never()).unwrap();
        // Below one chunk nothing is stored yet.
        b.write(b"small").unwrap();
        let err = b.write(&sequential(CHUNK_SIZE)).unwrap_err();
        assert!(matches!(err, BuildError::Store(StoreError::Backend(_))));
        assert!(matches!(b.write(b"x"), Err(BuildError::Poisoned)));
        assert!(matches!(b.sum(), Err(BuildError::Poisoned)));
    }

    #[test]
    fn io_write_and_copy() {
        let store = Arc::new(MemoryChunkStore::new());
        let data = sequential(CHUNK_SIZE * 5 + 3);
        let mut b = builder(&store);
        let copied = io::copy(&mut data.as_slice(), &mut b).unwrap();
        assert_eq!(copied, data.len() as u64);
        assert_eq!(b.bytes_written(), copied);
        let root = b.sum().unwrap();
        assert_eq!(root, build(&store, &data));
    }

    #[test]
    fn missing_root_is_an_error_not_a_panic() {
        // Bytes counted but no buffer holding them: the flush walk ends
        // without a single top address.
        let store = Arc::new(MemoryChunkStore::new());
        let mut b = builder(&store);
        b.written = 1;
        assert!(matches!(b.sum(), Err(BuildError::NoRoot { levels: 1 })));
        assert!(matches!(b.write(b"x"), Err(BuildError::Poisoned)));
        assert!(store.is_empty());
    }

    #[test]
    fn joiner_reads_back_what_was_built() {
        let store = Arc::new(MemoryChunkStore::new());
        let data = sequential(CHUNK_SIZE * 130 + 99);
        let root = build(&store, &data);
        let (mut joiner, len) = Joiner::open(store, root, Cancellation::never()).unwrap();
        assert_eq!(len, data.len() as u64);
        let mut out = Vec::new();
        joiner.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }
}
