#![no_main]

//! Fuzz target for SignatureHash::from_hex() and hamming_distance()
//!
//! Stored hashes come back from the database as (hex, bit length) pairs.
//! Parsing must reject malformed pairs with an error, never a panic, and
//! any two parsed hashes must be comparable.
//!
//! Run with: cargo +nightly fuzz run fuzz_hash_hex

use libfuzzer_sys::fuzz_target;
use whisker_core::{hamming_distance, SignatureHash, HAMMING_SENTINEL};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let bit_len = usize::from(data[0]) * 4 + usize::from(data[1] % 4);
    let split = data.len() / 2;
    let a_hex = String::from_utf8_lossy(&data[2..split.max(2)]);
    let b_hex = String::from_utf8_lossy(&data[split.max(2)..]);

    let (Ok(a), Ok(b)) = (
        SignatureHash::from_hex(&a_hex, Some(bit_len)),
        SignatureHash::from_hex(&b_hex, None),
    ) else {
        return;
    };

    let distance = hamming_distance(&a, &b);
    if a.is_empty() || b.is_empty() {
        assert_eq!(distance, HAMMING_SENTINEL);
    } else {
        assert!(distance as usize <= a.bit_len().max(b.bit_len()));
        assert_eq!(distance, hamming_distance(&b, &a));
    }
});
