use bytes::Bytes;
use chunktree_wire::{ADDRESS_SIZE, Address, BRANCHES, CHUNK_SIZE, Chunk};

use crate::error::BuildError;

/// Accumulator for one level of the chunk tree.
///
/// Level 0 buffers raw bytes; every higher level buffers the addresses
/// of finalized chunks one level down. Either way the pending entries
/// live in one byte vector, so the buffer's contents are already the
/// chunk payload when it is finalized.
///
/// ```text
///   level 0:  [b0 b1 b2 ... ]           capacity CHUNK_SIZE bytes
///   level k:  [addr0 | addr1 | ... ]    capacity BRANCHES addresses
///             span = Σ spans of the buffered children
/// ```
///
/// A full buffer rejects further appends with
/// [`BuildError::CapacityExceeded`]; the owner must
/// [`finalize`](Self::finalize) it first.
#[derive(Debug)]
pub struct LevelBuffer {
    level: usize,
    buf: Vec<u8>,
    /// Original bytes subsumed by the buffered entries.
    span: u64,
}

impl LevelBuffer {
    #[must_use]
    pub fn new(level: usize) -> Self {
        Self {
            level,
            buf: Vec::with_capacity(CHUNK_SIZE),
            span: 0,
        }
    }

    #[must_use]
    pub fn level(&self) -> usize {
        self.level
    }

    /// Original bytes covered by the pending entries.
    #[must_use]
    pub fn span(&self) -> u64 {
        self.span
    }

    /// Pending entries: bytes at level 0, addresses above it.
    #[must_use]
    pub fn entries(&self) -> usize {
        if self.level == 0 {
            self.buf.len()
        } else {
            self.buf.len() / ADDRESS_SIZE
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        if self.level == 0 {
            self.buf.len() == CHUNK_SIZE
        } else {
            self.entries() == BRANCHES
        }
    }

    /// Append as many bytes of `data` as fit and return how many were
    /// taken.
    ///
    /// # Errors
    ///
    /// [`BuildError::CapacityExceeded`] if the buffer is already full or
    /// is not the level 0 (byte) buffer.
    pub fn append_data(&mut self, data: &[u8]) -> Result<usize, BuildError> {
        if self.level != 0 || self.is_full() {
            return Err(BuildError::CapacityExceeded { level: self.level });
        }
        let taken = data.len().min(CHUNK_SIZE - self.buf.len());
        self.buf.extend_from_slice(&data[..taken]);
        self.span += taken as u64;
        Ok(taken)
    }

    /// Append the address of a child subtree that covers `span` bytes.
    ///
    /// # Errors
    ///
    /// [`BuildError::CapacityExceeded`] if the buffer is already full or
    /// is the level 0 (byte) buffer.
    pub fn append_address(&mut self, address: Address, span: u64) -> Result<(), BuildError> {
        if self.level == 0 || self.is_full() {
            return Err(BuildError::CapacityExceeded { level: self.level });
        }
        self.buf.extend_from_slice(address.as_bytes());
        self.span += span;
        Ok(())
    }

    /// Package the pending entries into a chunk and clear the buffer.
    ///
    /// Returns `Ok(None)` for an empty buffer, so input that ends exactly
    /// on a chunk boundary produces no trailing empty chunk.
    ///
    /// # Errors
    ///
    /// [`BuildError::Wire`] if the payload does not fit a chunk, which
    /// the capacity checks rule out.
    pub fn finalize(&mut self) -> Result<Option<Chunk>, BuildError> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let payload = std::mem::replace(&mut self.buf, Vec::with_capacity(CHUNK_SIZE));
        let span = std::mem::take(&mut self.span);
        Ok(Some(Chunk::new(span, Bytes::from(payload))?))
    }

    /// Remove the sole buffered address together with its span.
    ///
    /// Returns `None` unless this is an address level holding exactly one
    /// entry.
    pub fn take_single(&mut self) -> Option<(Address, u64)> {
        if self.level == 0 || self.entries() != 1 {
            return None;
        }
        let address = Address::from_slice(&self.buf).ok()?;
        self.buf.clear();
        Some((address, std::mem::take(&mut self.span)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::new([byte; ADDRESS_SIZE])
    }

    #[test]
    fn data_level_takes_up_to_capacity() {
        let mut buffer = LevelBuffer::new(0);
        let taken = buffer.append_data(&[1u8; 5000]).unwrap();
        assert_eq!(taken, CHUNK_SIZE);
        assert!(buffer.is_full());
        assert_eq!(buffer.span(), CHUNK_SIZE as u64);
    }

    #[test]
    fn append_to_full_data_level_fails() {
        let mut buffer = LevelBuffer::new(0);
        buffer.append_data(&[0u8; CHUNK_SIZE]).unwrap();
        let result = buffer.append_data(b"x");
        assert!(matches!(result, Err(BuildError::CapacityExceeded { level: 0 })));
    }

    #[test]
    fn address_level_fills_at_branches() {
        let mut buffer = LevelBuffer::new(1);
        for i in 0..BRANCHES {
            assert!(!buffer.is_full());
            let byte = u8::try_from(i).unwrap();
            buffer.append_address(addr(byte), 4096).unwrap();
        }
        assert!(buffer.is_full());
        assert_eq!(buffer.entries(), BRANCHES);
        let result = buffer.append_address(addr(0), 1);
        assert!(matches!(result, Err(BuildError::CapacityExceeded { level: 1 })));
    }

    #[test]
    fn wrong_entry_kind_is_rejected() {
        let mut data = LevelBuffer::new(0);
        assert!(data.append_address(addr(1), 10).is_err());
        let mut refs = LevelBuffer::new(2);
        assert!(refs.append_data(b"abc").is_err());
    }

    #[test]
    fn finalize_empty_emits_nothing() {
        let mut buffer = LevelBuffer::new(0);
        assert!(buffer.finalize().unwrap().is_none());
        let mut refs = LevelBuffer::new(3);
        assert!(refs.finalize().unwrap().is_none());
    }

    #[test]
    fn finalize_partial_data_chunk() {
        let mut buffer = LevelBuffer::new(0);
        buffer.append_data(b"hello ").unwrap();
        buffer.append_data(b"world").unwrap();
        let chunk = buffer.finalize().unwrap().unwrap();
        assert_eq!(chunk.span(), 11);
        assert_eq!(chunk.payload().as_ref(), b"hello world");
        assert!(buffer.is_empty());
        assert_eq!(buffer.span(), 0);
    }

    #[test]
    fn finalize_reference_chunk_sums_child_spans() {
        let mut buffer = LevelBuffer::new(1);
        buffer.append_address(addr(1), 4096).unwrap();
        buffer.append_address(addr(2), 100).unwrap();
        let chunk = buffer.finalize().unwrap().unwrap();
        assert_eq!(chunk.span(), 4196);
        assert_eq!(chunk.payload().len(), 2 * ADDRESS_SIZE);
        assert_eq!(chunk.child_addresses().unwrap(), vec![addr(1), addr(2)]);
    }

    #[test]
    fn buffer_is_reusable_after_finalize() {
        let mut buffer = LevelBuffer::new(0);
        buffer.append_data(&[9u8; CHUNK_SIZE]).unwrap();
        buffer.finalize().unwrap();
        assert_eq!(buffer.append_data(b"more").unwrap(), 4);
        assert_eq!(buffer.span(), 4);
    }

    #[test]
    fn take_single_only_with_one_address() {
        let mut buffer = LevelBuffer::new(1);
        assert!(buffer.take_single().is_none());
        buffer.append_address(addr(7), 321).unwrap();
        assert_eq!(buffer.take_single(), Some((addr(7), 321)));
        assert!(buffer.is_empty());

        buffer.append_address(addr(1), 1).unwrap();
        buffer.append_address(addr(2), 1).unwrap();
        assert!(buffer.take_single().is_none());
        assert_eq!(buffer.entries(), 2);
    }
}
