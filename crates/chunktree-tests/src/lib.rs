//! Shared fixtures for the chunktree integration tests and benchmarks.

use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::{Arc, Mutex, RwLock};

use chunktree_builder::{BuilderConfig, ChunkTreeBuilder, MemoryChunkStore};
use chunktree_joiner::{Joiner, join_to_vec};
use chunktree_types::{Cancellation, ChunkStore, Durability, StoreError};
use chunktree_wire::{Address, CHUNK_SIZE, Chunk};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// `CHUNK_SIZE` as a `u64`, for span arithmetic.
pub const C: u64 = CHUNK_SIZE as u64;

/// Bytes `0, 1, .., 250, 0, 1, ..`. The period is prime, so a leaf's
/// content only repeats 251 leaves later.
#[must_use]
pub fn sequential(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Seeded pseudo-random content.
#[must_use]
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}

#[must_use]
pub fn memory_store() -> Arc<MemoryChunkStore> {
    Arc::new(MemoryChunkStore::new())
}

/// Split `data` with a single write and return the root.
///
/// # Panics
///
/// If the build fails.
pub fn split(store: &Arc<MemoryChunkStore>, data: &[u8]) -> Address {
    split_pieces(store, [data])
}

/// Split content delivered as a sequence of writes.
///
/// # Panics
///
/// If the build fails.
pub fn split_pieces<'a>(
    store: &Arc<MemoryChunkStore>,
    pieces: impl IntoIterator<Item = &'a [u8]>,
) -> Address {
    let mut builder =
        ChunkTreeBuilder::new(store.clone(), BuilderConfig::default(), Cancellation::never())
            .expect("builder");
    for piece in pieces {
        builder.write(piece).expect("write");
    }
    builder.sum().expect("sum")
}

/// Read the whole content under `root`.
///
/// # Panics
///
/// If the join fails.
pub fn join(store: &Arc<MemoryChunkStore>, root: Address) -> Vec<u8> {
    join_to_vec(store.clone(), root, Cancellation::never()).expect("join")
}

/// Read the content under `root` through `io::Read` with a fixed buffer
/// size.
///
/// # Errors
///
/// Whatever the joiner reports, as an `io::Error`.
///
/// # Panics
///
/// If the root cannot be opened.
pub fn join_with_buffer(
    store: &Arc<MemoryChunkStore>,
    root: Address,
    buffer: usize,
) -> io::Result<Vec<u8>> {
    let (mut joiner, len) = Joiner::open(store.clone(), root, Cancellation::never()).expect("open");
    let mut out = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
    let mut buf = vec![0u8; buffer];
    loop {
        let n = joiner.read(&mut buf)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..n]);
    }
}

/// Stored spans of the children of the reference chunk at `address`.
///
/// # Panics
///
/// If the chunk is missing or is a data chunk.
pub fn child_spans(store: &dyn ChunkStore, address: &Address) -> Vec<u64> {
    let chunk = store.get(address).unwrap().expect("chunk present");
    chunk
        .child_addresses()
        .expect("reference chunk")
        .iter()
        .map(|child| store.get(child).unwrap().expect("child present").span())
        .collect()
}

/// Deterministic content generator for streaming tests: yields `len`
/// bytes of seeded pseudo-random data without materializing them, and
/// hashes what it hands out so the joined output can be compared.
pub struct PatternReader {
    rng: StdRng,
    remaining: u64,
    hasher: blake3::Hasher,
}

impl PatternReader {
    #[must_use]
    pub fn new(len: u64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            remaining: len,
            hasher: blake3::Hasher::new(),
        }
    }

    /// Hash of every byte read so far.
    #[must_use]
    pub fn digest(&self) -> blake3::Hash {
        self.hasher.finalize()
    }
}

impl Read for PatternReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf
            .len()
            .min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        self.rng.fill_bytes(&mut buf[..n]);
        self.hasher.update(&buf[..n]);
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Seekable pseudo-random content: byte `i` of the stream is byte `i` of
/// the BLAKE3 extendable output keyed by the seed. Any range can be
/// regenerated without reading what precedes it.
#[derive(Clone, Copy, Debug)]
pub struct SyntheticContent {
    key: [u8; 32],
}

impl SyntheticContent {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let mut key = [0u8; 32];
        key[..8].copy_from_slice(&seed.to_le_bytes());
        Self { key }
    }

    fn output_at(&self, offset: u64) -> blake3::OutputReader {
        let mut output = blake3::Hasher::new_keyed(&self.key).finalize_xof();
        output.set_position(offset);
        output
    }

    /// `len` bytes starting at `offset`.
    #[must_use]
    pub fn read_at(&self, offset: u64, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        self.output_at(offset).fill(&mut buf);
        buf
    }

    /// The first `len` bytes as a reader.
    #[must_use]
    pub fn reader(&self, len: u64) -> io::Take<blake3::OutputReader> {
        self.output_at(0).take(len)
    }

    /// Hash of the first `len` bytes.
    ///
    /// # Panics
    ///
    /// Never in practice; the reader and hasher do not fail.
    #[must_use]
    pub fn digest(&self, len: u64) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        io::copy(&mut self.reader(len), &mut hasher).expect("hash synthetic content");
        hasher.finalize()
    }
}

/// Chunk store for content produced by a [`SyntheticContent`] source.
///
/// Reference chunks are kept. Data chunks are compared against the
/// source when stored and then dropped; only their offset and span are
/// remembered, and `get` regenerates the payload. Leaves arrive in
/// stream order, which is what places them. Memory stays a small
/// fraction of the input, so very large inputs can be round-tripped.
pub struct SyntheticStore {
    content: SyntheticContent,
    references: RwLock<HashMap<Address, Chunk>>,
    /// Leaf address to `(offset, span)`.
    leaves: RwLock<HashMap<Address, (u64, u64)>>,
    next_offset: Mutex<u64>,
}

impl SyntheticStore {
    #[must_use]
    pub fn new(content: SyntheticContent) -> Self {
        Self {
            content,
            references: RwLock::new(HashMap::new()),
            leaves: RwLock::new(HashMap::new()),
            next_offset: Mutex::new(0),
        }
    }

    /// Distinct data chunks seen.
    ///
    /// # Panics
    ///
    /// If a lock is poisoned.
    #[must_use]
    pub fn leaves(&self) -> usize {
        self.leaves.read().expect("leaf index lock poisoned").len()
    }

    /// Distinct reference chunks held.
    ///
    /// # Panics
    ///
    /// If a lock is poisoned.
    #[must_use]
    pub fn references(&self) -> usize {
        self.references.read().expect("reference lock poisoned").len()
    }
}

impl ChunkStore for SyntheticStore {
    fn put(&self, chunk: &Chunk, _durability: Durability) -> Result<Address, StoreError> {
        let address = chunk.address();
        if !chunk.is_data() {
            self.references
                .write()
                .expect("reference lock poisoned")
                .entry(address)
                .or_insert_with(|| chunk.clone());
            return Ok(address);
        }

        let mut next = self.next_offset.lock().expect("offset lock poisoned");
        let expected = self.content.read_at(*next, chunk.payload().len());
        if chunk.payload().as_ref() != expected.as_slice() {
            return Err(StoreError::Backend(format!(
                "leaf at offset {} differs from the source",
                *next
            )));
        }
        self.leaves
            .write()
            .expect("leaf index lock poisoned")
            .entry(address)
            .or_insert((*next, chunk.span()));
        *next += chunk.span();
        Ok(address)
    }

    fn get(&self, address: &Address) -> Result<Option<Chunk>, StoreError> {
        if let Some(chunk) = self
            .references
            .read()
            .expect("reference lock poisoned")
            .get(address)
        {
            return Ok(Some(chunk.clone()));
        }
        let leaf = self
            .leaves
            .read()
            .expect("leaf index lock poisoned")
            .get(address)
            .copied();
        match leaf {
            Some((offset, span)) => {
                let len = usize::try_from(span).map_err(|_| {
                    StoreError::Backend(format!("leaf span {span} does not fit in memory"))
                })?;
                Ok(Some(Chunk::new(span, self.content.read_at(offset, len))?))
            }
            None => Ok(None),
        }
    }
}
