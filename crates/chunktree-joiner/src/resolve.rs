//! Fetch-and-validate helpers shared by the joiner and the inspector.

use bytes::Bytes;
use chunktree_types::{Cancellation, ChunkStore};
use chunktree_wire::{Address, CHUNK_SIZE, Chunk, level_capacity, level_for_span};

use crate::error::JoinError;

/// Fetch `address`, checking `cancel` on both sides of the store call.
pub(crate) fn fetch(
    store: &dyn ChunkStore,
    cancel: &Cancellation,
    address: &Address,
) -> Result<Chunk, JoinError> {
    if cancel.is_cancelled() {
        return Err(JoinError::Cancelled);
    }
    let chunk = store
        .get(address)?
        .ok_or(JoinError::ChunkNotFound { address: *address })?;
    if cancel.is_cancelled() {
        return Err(JoinError::Cancelled);
    }
    Ok(chunk)
}

/// Fetch a child and check that its stored span is the one its parent
/// implies.
pub(crate) fn fetch_child(
    store: &dyn ChunkStore,
    cancel: &Cancellation,
    address: &Address,
    expected_span: u64,
) -> Result<Chunk, JoinError> {
    let chunk = fetch(store, cancel, address)?;
    if chunk.span() != expected_span {
        return Err(JoinError::corrupt(
            *address,
            format!(
                "span {} does not match the {expected_span} bytes its parent assigns",
                chunk.span()
            ),
        ));
    }
    Ok(chunk)
}

/// The content bytes of a data chunk: the first `span` bytes of its
/// payload.
pub(crate) fn leaf_content(address: &Address, chunk: &Chunk) -> Result<Bytes, JoinError> {
    let span = usize::try_from(chunk.span()).unwrap_or(usize::MAX);
    let payload = chunk.payload();
    if payload.len() < span {
        return Err(JoinError::corrupt(
            *address,
            format!("data payload holds {} of {span} bytes", payload.len()),
        ));
    }
    Ok(payload.slice(..span))
}

/// The children of a reference chunk.
///
/// Only the span of the parent is stored, so the children's spans are
/// derived: with `k = level_for_span(span)`, every child but the last
/// subsumes `CHUNK_SIZE * BRANCHES^(k-1)` bytes and the last one takes
/// the remainder. The address count must be exactly what that split
/// needs.
#[derive(Debug)]
pub(crate) struct Children {
    pub addresses: Vec<Address>,
    pub child_capacity: u64,
    pub span: u64,
}

impl Children {
    pub(crate) fn of(address: &Address, chunk: &Chunk) -> Result<Self, JoinError> {
        let span = chunk.span();
        debug_assert!(span > CHUNK_SIZE as u64);
        let addresses = chunk.child_addresses().ok_or_else(|| {
            JoinError::corrupt(
                *address,
                format!(
                    "reference payload of {} bytes is not a whole number of addresses",
                    chunk.payload().len()
                ),
            )
        })?;
        if addresses.is_empty() {
            return Err(JoinError::corrupt(*address, "reference chunk has no children"));
        }

        let child_capacity = level_capacity(level_for_span(span) - 1);
        let count = addresses.len() as u64;
        let needed = span.div_ceil(child_capacity);
        if count != needed {
            return Err(JoinError::corrupt(
                *address,
                format!("{count} children cannot cover a span of {span} bytes (expected {needed})"),
            ));
        }

        Ok(Self {
            addresses,
            child_capacity,
            span,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Derived span of child `index`.
    pub(crate) fn span_of(&self, index: usize) -> u64 {
        if index + 1 < self.addresses.len() {
            self.child_capacity
        } else {
            self.span - self.child_capacity * (self.addresses.len() as u64 - 1)
        }
    }
}
