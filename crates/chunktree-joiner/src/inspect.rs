use std::fmt;

use chunktree_types::{Cancellation, ChunkStore};
use chunktree_wire::Address;
use serde::Serialize;
use tracing::debug;

use crate::error::JoinError;
use crate::resolve::{Children, fetch, fetch_child, leaf_content};

/// Shape of a chunk tree, gathered by visiting every chunk under a root.
///
/// Depth 0 is the root. Data chunks normally sit at the deepest level,
/// but a trailing leaf or subtree that was carried up during
/// finalization appears at a shallower depth, so every depth reports
/// both kinds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TreeSummary {
    pub root: Address,
    pub span: u64,
    pub depths: Vec<DepthSummary>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DepthSummary {
    pub reference_chunks: u64,
    pub data_chunks: u64,
    /// Stored size of the chunks at this depth (span prefix plus payload).
    pub encoded_bytes: u64,
}

impl TreeSummary {
    /// Number of levels, counting the root.
    #[must_use]
    pub fn height(&self) -> usize {
        self.depths.len()
    }

    #[must_use]
    pub fn total_chunks(&self) -> u64 {
        self.depths
            .iter()
            .map(|d| d.reference_chunks + d.data_chunks)
            .sum()
    }

    #[must_use]
    pub fn encoded_bytes(&self) -> u64 {
        self.depths.iter().map(|d| d.encoded_bytes).sum()
    }
}

/// Renders everything but the root address:
///
/// ```text
/// span: 528384 bytes
/// height: 3
/// chunks: 131 (533592 bytes encoded)
/// depth 0: 1 reference, 0 data
/// depth 1: 1 reference, 1 data
/// depth 2: 0 reference, 128 data
/// ```
impl fmt::Display for TreeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "span: {} bytes", self.span)?;
        writeln!(f, "height: {}", self.height())?;
        write!(
            f,
            "chunks: {} ({} bytes encoded)",
            self.total_chunks(),
            self.encoded_bytes()
        )?;
        for (depth, level) in self.depths.iter().enumerate() {
            write!(
                f,
                "\ndepth {depth}: {} reference, {} data",
                level.reference_chunks, level.data_chunks
            )?;
        }
        Ok(())
    }
}

/// Visit every chunk under `root` and summarise the tree.
///
/// Applies the same checks as [`Joiner`](crate::Joiner), so a successful
/// inspection means the content can be joined from this store.
///
/// # Errors
///
/// [`JoinError`] for a missing or inconsistent chunk, a store failure, or
/// cancellation.
pub fn inspect(
    store: &dyn ChunkStore,
    root: Address,
    cancel: &Cancellation,
) -> Result<TreeSummary, JoinError> {
    let chunk = fetch(store, cancel, &root)?;
    let span = chunk.span();
    let mut depths: Vec<DepthSummary> = Vec::new();

    // (address, expected span, depth); children pushed in reverse so the
    // walk runs left to right.
    let mut pending: Vec<(Address, u64, usize)> = Vec::new();
    let mut current = Some((root, chunk, 0usize));

    while let Some((address, chunk, depth)) = current.take() {
        if depths.len() <= depth {
            depths.resize_with(depth + 1, DepthSummary::default);
        }
        let entry = &mut depths[depth];
        entry.encoded_bytes += chunk.encoded_len() as u64;

        if chunk.is_data() {
            leaf_content(&address, &chunk)?;
            entry.data_chunks += 1;
        } else {
            entry.reference_chunks += 1;
            let children = Children::of(&address, &chunk)?;
            for index in (0..children.len()).rev() {
                pending.push((children.addresses[index], children.span_of(index), depth + 1));
            }
        }

        if let Some((next, expected, depth)) = pending.pop() {
            let chunk = fetch_child(store, cancel, &next, expected)?;
            current = Some((next, chunk, depth));
        }
    }

    let summary = TreeSummary { root, span, depths };
    debug!(%root, span, height = summary.height(), chunks = summary.total_chunks(), "inspected tree");
    Ok(summary)
}
