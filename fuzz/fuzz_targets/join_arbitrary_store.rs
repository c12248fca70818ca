#![no_main]

use std::io::Read;
use std::sync::Arc;

use arbitrary::Arbitrary;
use chunktree_builder::MemoryChunkStore;
use chunktree_joiner::{inspect, Joiner};
use chunktree_types::{Cancellation, ChunkStore, Durability};
use chunktree_wire::{Address, Chunk, CHUNK_SIZE};
use libfuzzer_sys::fuzz_target;

// Fuzz target: joining from a store filled with arbitrary chunks.
//
// Reference payloads are built from the addresses of earlier chunks so
// the fuzzer reaches real traversals. The joiner and inspector must
// return errors, never panic, and a successful join must deliver exactly
// the root's span.

#[derive(Debug, Arbitrary)]
enum FuzzChunk {
    Data { span: u16, payload: Vec<u8> },
    Reference { span: u64, children: Vec<u8> },
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    chunks: Vec<FuzzChunk>,
    read_size: u16,
}

fuzz_target!(|input: FuzzInput| {
    let store = Arc::new(MemoryChunkStore::new());
    let mut addresses: Vec<Address> = Vec::new();

    for fuzz_chunk in input.chunks.iter().take(64) {
        let chunk = match fuzz_chunk {
            FuzzChunk::Data { span, payload } => {
                let payload = &payload[..payload.len().min(CHUNK_SIZE)];
                Chunk::new(u64::from(*span), payload.to_vec())
            }
            FuzzChunk::Reference { span, children } => {
                let mut payload = Vec::new();
                for &index in children.iter().take(128) {
                    let slot = usize::from(index) % addresses.len().max(1);
                    if let Some(address) = addresses.get(slot) {
                        payload.extend_from_slice(address.as_bytes());
                    }
                }
                Chunk::new(*span, payload)
            }
        };
        let Ok(chunk) = chunk else { continue };
        addresses.push(store.put(&chunk, Durability::Transient).unwrap());
    }

    let Some(&root) = addresses.last() else { return };
    // Walks are linear in the root span; keep runs short.
    match store.get(&root) {
        Ok(Some(chunk)) if chunk.span() <= 1 << 24 => {}
        _ => return,
    }

    let _ = inspect(store.as_ref(), root, &Cancellation::never());

    if let Ok((mut joiner, len)) = Joiner::open(store, root, Cancellation::never()) {
        let mut buf = vec![0u8; usize::from(input.read_size.max(1))];
        let mut total = 0u64;
        loop {
            match joiner.read(&mut buf) {
                Ok(0) => {
                    assert_eq!(total, len);
                    break;
                }
                Ok(n) => total += n as u64,
                Err(_) => break,
            }
            assert!(total <= len);
        }
    }
});
