//! Storage-facing signature records.
//!
//! These are the tuples exchanged with the persistence layer: hex hash plus
//! explicit bit length, and raw embedding bytes (base64 in JSON).

use serde::{Deserialize, Serialize};

use super::codec::{derive_hash, Embedding, SignatureHash};
use crate::error::Result;

/// Identifier of a catalogued cat.
pub type CatId = i64;

/// Identifier of one enrolled reference image.
pub type ReferenceId = i64;

/// Computed signature of one photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSignature {
    pub embedding: Embedding,
    pub hash: SignatureHash,
}

impl ImageSignature {
    /// Derive the hash for an embedding under an optional length override.
    pub fn from_embedding(embedding: Embedding, hash_length_override: Option<usize>) -> Self {
        let hash = derive_hash(&embedding, hash_length_override);
        Self { embedding, hash }
    }

    pub fn to_record(&self) -> SignatureRecord {
        SignatureRecord {
            hash_hex: self.hash.to_hex(),
            hash_length: self.hash.bit_len(),
            embedding: self.embedding.to_bytes(),
        }
    }
}

/// Persisted form of a signature: `(hash_hex, hash_length, embedding_bytes)`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub hash_hex: String,
    pub hash_length: usize,
    #[serde(with = "base64_bytes")]
    pub embedding: Vec<u8>,
}

impl SignatureRecord {
    pub fn decode(&self) -> Result<ImageSignature> {
        Ok(ImageSignature {
            embedding: Embedding::from_bytes(&self.embedding)?,
            hash: SignatureHash::from_hex(&self.hash_hex, Some(self.hash_length))?,
        })
    }
}

/// One stored reference image signature, tagged with its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// Owning cat; `None` for references not yet assigned to a cat
    #[serde(default)]
    pub cat_id: Option<CatId>,
    pub reference_id: ReferenceId,
    #[serde(flatten)]
    pub signature: SignatureRecord,
}

impl ReferenceRecord {
    pub fn new(cat_id: Option<CatId>, reference_id: ReferenceId, signature: &ImageSignature) -> Self {
        Self {
            cat_id,
            reference_id,
            signature: signature.to_record(),
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}
