#![no_main]

//! Fuzz target for catalog record decoding
//!
//! This target exercises the JSON + base64 + embedding byte path that every
//! stored reference goes through before matching. Malformed records must
//! surface as errors and be skipped by the matcher, never panic.
//!
//! Run with: cargo +nightly fuzz run fuzz_reference_record

use libfuzzer_sys::fuzz_target;
use whisker_core::{Matcher, ReferenceRecord};

fuzz_target!(|data: &[u8]| {
    let Ok(records) = serde_json::from_slice::<Vec<ReferenceRecord>>(data) else {
        return;
    };

    // Rank every record against the first decodable one
    let Some(query) = records.iter().find_map(|r| r.signature.decode().ok()) else {
        return;
    };
    let results = Matcher::default().rank_records(&query, &records);
    assert!(results.len() <= records.len());
});
