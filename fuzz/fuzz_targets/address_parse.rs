#![no_main]

use chunktree_wire::Address;
use libfuzzer_sys::fuzz_target;

// Fuzz target: textual address parsing. Accepted input must print back
// to a string that parses to the same address.
fuzz_target!(|text: &str| {
    if let Ok(address) = text.parse::<Address>() {
        let printed = address.to_string();
        assert_eq!(printed.parse::<Address>().expect("reparse"), address);
    }
});
