//! Visual identity signatures.
//!
//! - **codec**: embeddings, binary hashes, Hamming distance, cosine similarity
//! - **record**: the `(hash_hex, hash_length, embedding_bytes)` storage tuples
//! - **aggregate**: canonical per-cat signatures from many reference images

pub mod aggregate;
pub mod codec;
pub mod record;

pub use aggregate::{aggregate, aggregate_embeddings, aggregate_hashes, aggregate_references, CatSignature};
pub use codec::{
    cosine_similarity, derive_hash, hamming_distance, parse_bit_string, Embedding, SignatureHash,
    HAMMING_SENTINEL,
};
pub use record::{CatId, ImageSignature, ReferenceId, ReferenceRecord, SignatureRecord};
