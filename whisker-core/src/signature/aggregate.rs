//! Canonical per-cat signature aggregation.
//!
//! A cat's canonical signature is recomputed from scratch from its reference
//! images every time the reference set changes: the mean-centroid of the
//! embeddings (renormalized) and a majority vote over the hash bits.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::codec::{Embedding, SignatureHash};
use super::record::{ImageSignature, ReferenceId, ReferenceRecord, SignatureRecord};

/// Aggregated signature of one cat. Both parts are `None` for a cat without
/// usable reference images, which therefore cannot be matched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatSignature {
    pub embedding: Option<Embedding>,
    pub hash: Option<SignatureHash>,
}

impl CatSignature {
    pub fn is_null(&self) -> bool {
        self.embedding.is_none() && self.hash.is_none()
    }

    /// Persisted form, or `None` for a null signature.
    pub fn to_record(&self) -> Option<SignatureRecord> {
        if self.is_null() {
            return None;
        }
        let hash = self.hash.clone().unwrap_or_default();
        let embedding = self.embedding.clone().unwrap_or_default();
        Some(ImageSignature { embedding, hash }.to_record())
    }
}

/// Mean of all non-empty embeddings, renormalized to unit length.
///
/// Embeddings whose dimension differs from the first non-empty one are
/// skipped. Returns `None` when no non-empty embedding is supplied.
pub fn aggregate_embeddings<'a, I>(embeddings: I) -> Option<Embedding>
where
    I: IntoIterator<Item = &'a Embedding>,
{
    let mut sum: Vec<f64> = Vec::new();
    let mut count = 0usize;

    for embedding in embeddings.into_iter().filter(|e| !e.is_empty()) {
        if sum.is_empty() {
            sum = vec![0.0; embedding.len()];
        } else if embedding.len() != sum.len() {
            warn!(
                expected = sum.len(),
                actual = embedding.len(),
                "Skipping embedding with mismatched dimension"
            );
            continue;
        }

        for (acc, &x) in sum.iter_mut().zip(embedding.as_slice()) {
            *acc += x as f64;
        }
        count += 1;
    }

    if count == 0 {
        return None;
    }

    let centroid = sum.into_iter().map(|x| (x / count as f64) as f32).collect();
    Some(Embedding::normalized(centroid))
}

/// Majority vote over hash bits.
///
/// Shorter hashes are zero-padded on the right to the longest length. A bit
/// is set when at least half of the hashes set it, so ties resolve to `1`.
/// Returns `None` when no hash is supplied.
pub fn aggregate_hashes<'a, I>(hashes: I) -> Option<SignatureHash>
where
    I: IntoIterator<Item = &'a SignatureHash>,
{
    let hashes: Vec<&SignatureHash> = hashes.into_iter().collect();
    if hashes.is_empty() {
        return None;
    }

    let max_len = hashes.iter().map(|h| h.bit_len()).max().unwrap_or(0);
    let total = hashes.len();

    Some(SignatureHash::from_bits((0..max_len).map(|i| {
        let votes = hashes.iter().filter(|h| h.bit(i)).count();
        votes * 2 >= total
    })))
}

/// Aggregate a set of per-image signatures into one canonical signature.
pub fn aggregate(signatures: &[ImageSignature]) -> CatSignature {
    CatSignature {
        embedding: aggregate_embeddings(signatures.iter().map(|s| &s.embedding)),
        hash: aggregate_hashes(signatures.iter().map(|s| &s.hash)),
    }
}

/// Aggregate stored reference records, optionally restricted to a subset.
///
/// With `selection = Some(ids)` only the listed references contribute, which
/// lets an operator exclude a bad photo without deleting it. Records that
/// fail to decode are skipped.
pub fn aggregate_references(
    records: &[ReferenceRecord],
    selection: Option<&[ReferenceId]>,
) -> CatSignature {
    let signatures: Vec<ImageSignature> = records
        .iter()
        .filter(|r| selection.map_or(true, |ids| ids.contains(&r.reference_id)))
        .filter_map(|r| match r.signature.decode() {
            Ok(signature) => Some(signature),
            Err(e) => {
                warn!(reference_id = r.reference_id, error = %e, "Skipping undecodable reference");
                None
            }
        })
        .collect();

    debug!(
        supplied = records.len(),
        used = signatures.len(),
        "Aggregating reference signatures"
    );

    aggregate(&signatures)
}
