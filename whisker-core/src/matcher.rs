//! Ranking a query signature against stored reference signatures.
//!
//! # Algorithm
//!
//! 1. Hamming pre-filter: references farther than `max_hamming` from the
//!    query hash are skipped before any cosine work.
//! 2. Cosine similarity against each surviving reference embedding.
//! 3. `matched = similarity >= threshold`.
//! 4. One result per owning cat (or per reference when the owner is unknown):
//!    highest similarity wins, ties go to the lower Hamming distance.
//! 5. Sort by similarity descending, then distance ascending.
//! 6. If anything matched, return the matched results (at most
//!    `max_results`); otherwise return at most one suggestion.
//!
//! References with an empty hash or embedding never take part.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::settings::RecognitionSettings;
use crate::signature::{
    CatId, Embedding, ImageSignature, ReferenceId, ReferenceRecord, SignatureHash,
};

/// Decoded reference signature ready for comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSignature {
    pub cat_id: Option<CatId>,
    pub reference_id: ReferenceId,
    pub hash: SignatureHash,
    pub embedding: Embedding,
}

impl ReferenceSignature {
    pub fn new(cat_id: Option<CatId>, reference_id: ReferenceId, signature: ImageSignature) -> Self {
        Self {
            cat_id,
            reference_id,
            hash: signature.hash,
            embedding: signature.embedding,
        }
    }

    /// Decode a stored record; `None` (with a warning) when it is malformed.
    pub fn from_record(record: &ReferenceRecord) -> Option<Self> {
        match record.signature.decode() {
            Ok(signature) => Some(Self::new(record.cat_id, record.reference_id, signature)),
            Err(e) => {
                warn!(
                    reference_id = record.reference_id,
                    error = %e,
                    "Skipping undecodable reference signature"
                );
                None
            }
        }
    }

    fn is_comparable(&self) -> bool {
        !self.hash.is_empty() && !self.embedding.is_empty()
    }
}

/// One ranked candidate. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub cat_id: Option<CatId>,
    pub similarity: f32,
    pub hamming_distance: u32,
    /// Reference image that produced the best score for this candidate
    pub reference_id: ReferenceId,
    /// Bit length of the query hash the distance was computed against
    pub query_hash_length: usize,
    /// `similarity >= threshold`
    pub matched: bool,
}

/// Matching parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchParams {
    pub threshold: f32,
    pub max_results: usize,
    pub max_hamming: Option<u32>,
}

impl Default for MatchParams {
    fn default() -> Self {
        RecognitionSettings::default().match_params()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Owner {
    Cat(CatId),
    Reference(ReferenceId),
}

impl MatchResult {
    fn owner(&self) -> Owner {
        match self.cat_id {
            Some(cat_id) => Owner::Cat(cat_id),
            None => Owner::Reference(self.reference_id),
        }
    }
}

/// Ordering used for both deduplication and ranking: better results first.
/// The reference id only breaks exact ties so output order is stable.
fn rank_order(a: &MatchResult, b: &MatchResult) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then(a.hamming_distance.cmp(&b.hamming_distance))
        .then(a.reference_id.cmp(&b.reference_id))
}

/// Stateless matcher over in-memory reference signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct Matcher {
    params: MatchParams,
}

impl Matcher {
    pub fn new(params: MatchParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &MatchParams {
        &self.params
    }

    /// Score every comparable reference that passes the Hamming pre-filter.
    ///
    /// The output is neither deduplicated nor ranked.
    pub fn score<'a, I>(&self, query: &ImageSignature, references: I) -> Vec<MatchResult>
    where
        I: IntoIterator<Item = &'a ReferenceSignature>,
    {
        let query_hash_length = query.hash.bit_len();

        references
            .into_iter()
            .filter(|r| r.is_comparable())
            .filter_map(|reference| {
                let distance = query.hash.hamming_distance(&reference.hash);
                if self.params.max_hamming.is_some_and(|max| distance > max) {
                    return None;
                }

                let similarity = query.embedding.cosine_similarity(&reference.embedding);
                Some(MatchResult {
                    cat_id: reference.cat_id,
                    similarity,
                    hamming_distance: distance,
                    reference_id: reference.reference_id,
                    query_hash_length,
                    matched: similarity >= self.params.threshold,
                })
            })
            .collect()
    }

    /// Full match: score, deduplicate per owner, rank, and partition into
    /// confirmed matches or a single suggestion.
    pub fn rank<'a, I>(&self, query: &ImageSignature, references: I) -> Vec<MatchResult>
    where
        I: IntoIterator<Item = &'a ReferenceSignature>,
    {
        let scored = self.score(query, references);
        let candidates = scored.len();

        let mut ranked = deduplicate(scored);
        ranked.sort_by(rank_order);

        let results = if ranked.iter().any(|r| r.matched) {
            ranked
                .into_iter()
                .filter(|r| r.matched)
                .take(self.params.max_results)
                .collect()
        } else {
            ranked.truncate(1.min(self.params.max_results));
            ranked
        };

        debug!(
            candidates,
            returned = results.len(),
            confirmed = results.iter().filter(|r| r.matched).count(),
            "Ranked reference signatures"
        );

        results
    }

    /// Match against stored records, skipping any that fail to decode.
    pub fn rank_records(&self, query: &ImageSignature, records: &[ReferenceRecord]) -> Vec<MatchResult> {
        let references: Vec<ReferenceSignature> =
            records.iter().filter_map(ReferenceSignature::from_record).collect();
        self.rank(query, &references)
    }
}

/// Keep the best result per owning cat (or per reference without a cat).
fn deduplicate(results: Vec<MatchResult>) -> Vec<MatchResult> {
    let mut best: HashMap<Owner, MatchResult> = HashMap::with_capacity(results.len());
    for result in results {
        match best.get_mut(&result.owner()) {
            Some(current) => {
                if rank_order(&result, current) == Ordering::Less {
                    *current = result;
                }
            }
            None => {
                best.insert(result.owner(), result);
            }
        }
    }
    best.into_values().collect()
}

/// Convenience wrapper over [`Matcher::rank`].
pub fn match_signature<'a, I>(
    query: &ImageSignature,
    references: I,
    threshold: f32,
    max_results: usize,
    max_hamming: Option<u32>,
) -> Vec<MatchResult>
where
    I: IntoIterator<Item = &'a ReferenceSignature>,
{
    Matcher::new(MatchParams {
        threshold,
        max_results,
        max_hamming,
    })
    .rank(query, references)
}
