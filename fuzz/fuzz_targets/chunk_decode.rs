#![no_main]

use chunktree_wire::Chunk;
use libfuzzer_sys::fuzz_target;

// Fuzz target: chunk wire decoding.
//
// Any input that decodes must re-encode to exactly the same bytes and
// hash to the same address as its re-decoded copy.
fuzz_target!(|data: &[u8]| {
    if let Ok(chunk) = Chunk::decode(data) {
        let encoded = chunk.encode();
        assert_eq!(&encoded[..], data);
        let again = Chunk::decode(&encoded).expect("re-decode");
        assert_eq!(again.address(), chunk.address());
    }
});
