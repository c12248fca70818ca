use bytes::{BufMut, Bytes, BytesMut};

use crate::address::{ADDRESS_SIZE, Address};
use crate::error::WireError;

/// Maximum payload size of a single chunk (C).
pub const CHUNK_SIZE: usize = 4096;

/// Size of the little-endian span prefix.
pub const SPAN_SIZE: usize = 8;

/// Number of child addresses that fit in one reference chunk (R).
pub const BRANCHES: usize = CHUNK_SIZE / ADDRESS_SIZE;

/// Largest encoded chunk: span prefix plus a full payload.
pub const MAX_ENCODED_SIZE: usize = SPAN_SIZE + CHUNK_SIZE;

/// A span-prefixed, size-bounded unit of content-addressed storage.
///
/// ```text
/// ┌──────────────────────────────────────────────────┐
/// │ span     (u64 little-endian, 8 bytes)            │
/// │ payload  [0..=4096 bytes]                         │
/// └──────────────────────────────────────────────────┘
/// ```
///
/// The span is the number of original bytes reachable from this chunk.
/// There is no type tag: a chunk with `span <= CHUNK_SIZE` carries
/// literal data, anything larger carries a list of child addresses.
/// Adding a tag byte would change every address in the system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    span: u64,
    payload: Bytes,
}

impl Chunk {
    /// Build a chunk from a span and payload.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::PayloadTooLarge`] if `payload` is longer than
    /// [`CHUNK_SIZE`].
    pub fn new(span: u64, payload: impl Into<Bytes>) -> Result<Self, WireError> {
        let payload = payload.into();
        if payload.len() > CHUNK_SIZE {
            return Err(WireError::PayloadTooLarge {
                size: payload.len(),
                limit: CHUNK_SIZE,
            });
        }
        Ok(Self { span, payload })
    }

    /// A data chunk whose span is its own length.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::PayloadTooLarge`] if `data` does not fit.
    pub fn data(data: impl Into<Bytes>) -> Result<Self, WireError> {
        let data = data.into();
        Self::new(data.len() as u64, data)
    }

    /// The empty data chunk (span 0). Its address is the canonical
    /// address of empty content.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            span: 0,
            payload: Bytes::new(),
        }
    }

    #[must_use]
    pub fn span(&self) -> u64 {
        self.span
    }

    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Whether this chunk is interpreted as literal data.
    #[must_use]
    pub fn is_data(&self) -> bool {
        self.span <= CHUNK_SIZE as u64
    }

    /// Content address: BLAKE3 over the span prefix followed by the payload.
    #[must_use]
    pub fn address(&self) -> Address {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.span.to_le_bytes());
        hasher.update(&self.payload);
        Address::new(hasher.finalize().into())
    }

    /// Number of bytes [`encode`](Self::encode) produces.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        SPAN_SIZE + self.payload.len()
    }

    /// Serialize into the wire layout.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u64_le(self.span);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Write the wire layout to `w`, returning the bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Io`] if the writer fails.
    pub fn write_to(&self, w: &mut impl std::io::Write) -> Result<usize, WireError> {
        w.write_all(&self.span.to_le_bytes())?;
        w.write_all(&self.payload)?;
        Ok(self.encoded_len())
    }

    /// Parse a chunk from its wire layout. The whole buffer after the
    /// span prefix is taken as the payload.
    ///
    /// # Errors
    ///
    /// - [`WireError::UnexpectedEof`] if `buf` is shorter than [`SPAN_SIZE`].
    /// - [`WireError::PayloadTooLarge`] if the payload exceeds [`CHUNK_SIZE`].
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let span_bytes: [u8; SPAN_SIZE] = buf
            .get(..SPAN_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(WireError::UnexpectedEof { offset: buf.len() })?;
        let span = u64::from_le_bytes(span_bytes);
        Self::new(span, Bytes::copy_from_slice(&buf[SPAN_SIZE..]))
    }

    /// Split a reference payload into child addresses.
    ///
    /// Returns `None` if the payload length is not a multiple of
    /// [`ADDRESS_SIZE`].
    #[must_use]
    pub fn child_addresses(&self) -> Option<Vec<Address>> {
        if self.payload.len() % ADDRESS_SIZE != 0 {
            return None;
        }
        self.payload
            .chunks_exact(ADDRESS_SIZE)
            .map(|raw| Address::from_slice(raw).ok())
            .collect()
    }
}

/// Maximum number of original bytes a subtree rooted at `level` can hold:
/// `CHUNK_SIZE * BRANCHES^level`, saturating at `u64::MAX`.
#[must_use]
pub fn level_capacity(level: u32) -> u64 {
    (0..level).fold(CHUNK_SIZE as u64, |cap, _| cap.saturating_mul(BRANCHES as u64))
}

/// The level of a chunk with the given span: the smallest `k` such that
/// `level_capacity(k) >= span`. Data chunks are level 0.
#[must_use]
pub fn level_for_span(span: u64) -> u32 {
    let mut level = 0;
    while level_capacity(level) < span {
        level += 1;
    }
    level
}
