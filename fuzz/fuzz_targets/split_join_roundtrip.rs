#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use chunktree_builder::{BuilderConfig, ChunkTreeBuilder, MemoryChunkStore};
use chunktree_joiner::join_to_vec;
use chunktree_types::Cancellation;
use libfuzzer_sys::fuzz_target;

// Fuzz target: split arbitrary content with arbitrary write sizes, join
// it back, and compare. The root must also match a single-write split.

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    content: Vec<u8>,
    write_sizes: Vec<u16>,
}

fn split(store: &Arc<MemoryChunkStore>, pieces: &[&[u8]]) -> chunktree_wire::Address {
    let mut builder =
        ChunkTreeBuilder::new(store.clone(), BuilderConfig::default(), Cancellation::never())
            .unwrap();
    for piece in pieces {
        builder.write(piece).unwrap();
    }
    builder.sum().unwrap()
}

fuzz_target!(|input: FuzzInput| {
    let mut pieces = Vec::new();
    let mut rest = input.content.as_slice();
    for &size in &input.write_sizes {
        if rest.is_empty() {
            break;
        }
        let (head, tail) = rest.split_at(usize::from(size).min(rest.len()));
        pieces.push(head);
        rest = tail;
    }
    pieces.push(rest);

    let store = Arc::new(MemoryChunkStore::new());
    let root = split(&store, &pieces);
    assert_eq!(root, split(&store, &[input.content.as_slice()]));

    let joined = join_to_vec(store, root, Cancellation::never()).unwrap();
    assert_eq!(joined, input.content);
});
