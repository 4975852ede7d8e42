//! WebAssembly bindings for Whisker signature matching.
//!
//! Signatures are computed server-side; these bindings let a browser compare
//! and rank already-computed signatures without another round trip. Every
//! function returning a `String` returns JSON, with failures reported as
//! `{"error": "..."}` rather than thrown.

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;
use whisker_core::{
    Embedding, ImageSignature, MatchParams, MatchResult, Matcher, ReferenceRecord, SignatureHash,
    SignatureRecord,
};

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct DistanceResponse {
    distance: u32,
}

#[derive(Serialize)]
struct HashResponse {
    hash_hex: String,
    hash_length: usize,
}

/// Ranking request: a query signature plus the references to rank.
///
/// Matching parameters fall back to the library defaults when omitted.
#[derive(Deserialize)]
struct RankRequest {
    query: SignatureRecord,
    references: Vec<ReferenceRecord>,
    threshold: Option<f32>,
    max_results: Option<usize>,
    max_hamming: Option<u32>,
}

#[derive(Serialize)]
struct RankResponse {
    results: Vec<MatchResult>,
    matched: bool,
}

fn to_json<T: Serialize>(result: Result<T, String>) -> String {
    let serialized = match result {
        Ok(value) => serde_json::to_string(&value),
        Err(error) => serde_json::to_string(&ErrorResponse { error }),
    };
    serialized.unwrap_or_else(|e| format!(r#"{{"error":"Serialization error: {}"}}"#, e))
}

/// Hamming distance between two hex-encoded hashes of the given bit lengths.
///
/// Returns `{"distance": n}`; `9999` means the hashes are not comparable.
#[wasm_bindgen]
pub fn hamming_distance_hex(a_hex: &str, a_bits: u32, b_hex: &str, b_bits: u32) -> String {
    to_json(distance_internal(a_hex, a_bits, b_hex, b_bits))
}

fn distance_internal(a_hex: &str, a_bits: u32, b_hex: &str, b_bits: u32) -> Result<DistanceResponse, String> {
    let a = SignatureHash::from_hex(a_hex, Some(a_bits as usize)).map_err(|e| e.to_string())?;
    let b = SignatureHash::from_hex(b_hex, Some(b_bits as usize)).map_err(|e| e.to_string())?;
    Ok(DistanceResponse {
        distance: whisker_core::hamming_distance(&a, &b),
    })
}

/// Cosine similarity of two embeddings; `0` for empty or mismatched inputs.
#[wasm_bindgen]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    whisker_core::cosine_similarity(a, b)
}

/// Derive the binary hash of an embedding.
///
/// Returns `{"hash_hex": "...", "hash_length": n}`.
#[wasm_bindgen]
pub fn derive_hash(embedding: &[f32], hash_length: Option<u32>) -> String {
    to_json(derive_internal(embedding, hash_length))
}

fn derive_internal(embedding: &[f32], hash_length: Option<u32>) -> Result<HashResponse, String> {
    if hash_length == Some(0) {
        return Err("hash_length must be a positive integer".to_string());
    }
    let embedding = Embedding::new(embedding.to_vec());
    let hash = whisker_core::derive_hash(&embedding, hash_length.map(|n| n as usize));
    Ok(HashResponse {
        hash_hex: hash.to_hex(),
        hash_length: hash.bit_len(),
    })
}

/// Rank reference signatures against a query.
///
/// Takes a JSON `RankRequest` and returns `{"results": [...], "matched": bool}`.
#[wasm_bindgen]
pub fn rank_candidates(request_json: &str) -> String {
    to_json(rank_internal(request_json))
}

fn rank_internal(request_json: &str) -> Result<RankResponse, String> {
    let request: RankRequest =
        serde_json::from_str(request_json).map_err(|e| format!("Failed to parse request: {}", e))?;
    let query: ImageSignature = request
        .query
        .decode()
        .map_err(|e| format!("Invalid query signature: {}", e))?;

    let defaults = MatchParams::default();
    let params = MatchParams {
        threshold: request.threshold.unwrap_or(defaults.threshold),
        max_results: request.max_results.unwrap_or(defaults.max_results),
        max_hamming: request.max_hamming.or(defaults.max_hamming),
    };
    if !(params.threshold > 0.0 && params.threshold < 1.0) {
        return Err("threshold must be between 0 and 1 (exclusive)".to_string());
    }
    if params.max_results == 0 {
        return Err("max_results must be a positive integer".to_string());
    }

    let results = Matcher::new(params).rank_records(&query, &request.references);
    let matched = results.first().is_some_and(|r| r.matched);
    Ok(RankResponse { results, matched })
}

/// Get the library version.
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
