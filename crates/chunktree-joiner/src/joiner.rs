use std::io;
use std::sync::Arc;

use bytes::Bytes;
use chunktree_types::{Cancellation, ChunkStore};
use chunktree_wire::Address;
use tracing::{debug, trace};

use crate::error::JoinError;
use crate::resolve::{Children, fetch, fetch_child, leaf_content};

/// Streaming reader over the content addressed by a root chunk.
///
/// The joiner walks the tree depth-first, left to right, holding one
/// frame per reference level on the current root-to-leaf path plus the
/// data chunk being drained. Chunks are fetched lazily, one per leaf or
/// reference node entered, so memory stays proportional to tree depth.
///
/// ```text
///   stack:  [ root refs, next=1 ] ── [ level-1 refs, next=3 ] ── leaf
///                                                                 │
///   read(buf) ◀── copy from leaf[offset..] ◀─────────────────────┘
///             when the leaf is drained, advance the deepest frame,
///             popping exhausted frames and pushing new ones
/// ```
///
/// Every fetched child is validated against the span its parent implies.
/// Any mismatch is a [`JoinError::CorruptTree`]; nothing is skipped or
/// padded. A failed fetch does not advance the walk, so a read that hit
/// a transient store error may simply be retried.
///
/// [`io::Read`] is implemented on top of [`try_read`](Self::try_read);
/// join errors are carried inside the [`io::Error`] and can be recovered
/// with [`io::Error::into_inner`] and a downcast.
pub struct Joiner {
    store: Arc<dyn ChunkStore>,
    cancel: Cancellation,
    root: Address,
    len: u64,
    position: u64,
    stack: Vec<Frame>,
    leaf: Bytes,
    leaf_offset: usize,
}

/// One reference chunk on the current path.
struct Frame {
    address: Address,
    children: Children,
    /// Index of the next child to enter.
    next: usize,
}

impl Joiner {
    /// Fetch `root` and position a reader at offset 0.
    ///
    /// Returns the reader together with the total content length (the
    /// root's span). A data root is read without further fetches.
    ///
    /// # Errors
    ///
    /// - [`JoinError::ChunkNotFound`] if the root is not in the store.
    /// - [`JoinError::CorruptTree`] if the root chunk is malformed.
    /// - [`JoinError::Cancelled`] if cancellation was already requested.
    pub fn open(
        store: Arc<dyn ChunkStore>,
        root: Address,
        cancel: Cancellation,
    ) -> Result<(Self, u64), JoinError> {
        let chunk = fetch(store.as_ref(), &cancel, &root)?;
        let len = chunk.span();
        let mut joiner = Self {
            store,
            cancel,
            root,
            len,
            position: 0,
            stack: Vec::new(),
            leaf: Bytes::new(),
            leaf_offset: 0,
        };
        if chunk.is_data() {
            joiner.leaf = leaf_content(&root, &chunk)?;
        } else {
            joiner.stack.push(Frame {
                address: root,
                children: Children::of(&root, &chunk)?,
                next: 0,
            });
        }
        debug!(%root, len, "opened joiner");
        Ok((joiner, len))
    }

    #[must_use]
    pub fn root(&self) -> Address {
        self.root
    }

    /// Total content length.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes delivered so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Copy the next bytes of content into `buf`.
    ///
    /// Returns `Ok(0)` at end of content or for an empty `buf`. The
    /// position advances only by bytes actually delivered.
    ///
    /// # Errors
    ///
    /// - [`JoinError::Cancelled`] once cancellation is requested, on this
    ///   and every later call.
    /// - [`JoinError::ChunkNotFound`], [`JoinError::Store`] if a fetch
    ///   fails. The walk stays where it was.
    /// - [`JoinError::CorruptTree`] if a chunk contradicts its parent.
    pub fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, JoinError> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.cancel.is_cancelled() {
            return Err(JoinError::Cancelled);
        }
        if self.leaf_offset == self.leaf.len() && !self.next_leaf()? {
            return Ok(0);
        }

        let available = &self.leaf[self.leaf_offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.leaf_offset += n;
        self.position += n as u64;
        Ok(n)
    }

    // ── Internal helpers ────────────────────────────────────────────────

    /// Advance to the next data chunk. Returns `false` once the walk is
    /// exhausted.
    fn next_leaf(&mut self) -> Result<bool, JoinError> {
        loop {
            let Some(frame) = self.stack.last() else {
                if self.position != self.len {
                    return Err(JoinError::corrupt(
                        self.root,
                        format!("tree ended after {} of {} bytes", self.position, self.len),
                    ));
                }
                return Ok(false);
            };
            if frame.next == frame.children.len() {
                self.stack.pop();
                continue;
            }

            let index = frame.next;
            let address = frame.children.addresses[index];
            let span = frame.children.span_of(index);
            trace!(parent = %frame.address, index, %address, span, "entering child");

            let chunk = fetch_child(self.store.as_ref(), &self.cancel, &address, span)?;
            let next = if chunk.is_data() {
                Some(leaf_content(&address, &chunk)?)
            } else {
                self.stack.push(Frame {
                    address,
                    children: Children::of(&address, &chunk)?,
                    next: 0,
                });
                None
            };

            // The child was accepted; only now move the parent's cursor.
            let parent = self.stack.len() - if next.is_some() { 1 } else { 2 };
            self.stack[parent].next += 1;

            if let Some(content) = next {
                self.leaf = content;
                self.leaf_offset = 0;
                return Ok(true);
            }
        }
    }
}

impl io::Read for Joiner {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.try_read(buf).map_err(io::Error::from)
    }
}

/// Reassemble the whole content under `root` into memory.
///
/// # Errors
///
/// Any [`JoinError`] raised by [`Joiner::open`] or [`Joiner::try_read`].
pub fn join_to_vec(
    store: Arc<dyn ChunkStore>,
    root: Address,
    cancel: Cancellation,
) -> Result<Vec<u8>, JoinError> {
    let (mut joiner, len) = Joiner::open(store, root, cancel)?;
    let mut out = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = joiner.try_read(&mut buf)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..n]);
    }
}
