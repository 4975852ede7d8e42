//! Audit record of one recognition query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::matcher::{MatchParams, MatchResult};
use crate::signature::{CatId, ReferenceId};

/// Structured metadata stored alongside a recognition event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub threshold: f32,
    pub max_results: usize,
    pub max_hamming: Option<u32>,
    /// Bit length of the query hash
    pub hash_length: usize,
    /// Reference signatures supplied for comparison
    pub reference_count: usize,
    /// Results returned to the caller
    pub candidate_count: usize,
    /// Results at or above the threshold
    pub matched_count: usize,
    /// Best sub-threshold candidate when nothing matched
    pub suggested_cat_id: Option<CatId>,
    /// Reference image behind the top result
    pub top_reference_id: Option<ReferenceId>,
}

/// Immutable record of one query: the top confirmed match (if any), its
/// score and distance, and the query image location.
///
/// Fields are read-only once built; persistence stores them as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionEvent {
    cat_id: Option<CatId>,
    score: Option<f32>,
    hamming_distance: Option<u32>,
    query_hash_hex: String,
    query_image_path: Option<String>,
    metadata: EventMetadata,
    created_at: DateTime<Utc>,
}

impl RecognitionEvent {
    /// Build the event for a ranked result list.
    ///
    /// `cat_id` is only set when the top result is a confirmed match; the
    /// score and distance of the top result are recorded either way.
    pub fn from_results(
        results: &[MatchResult],
        params: &MatchParams,
        query_hash_hex: impl Into<String>,
        query_hash_length: usize,
        reference_count: usize,
        query_image_path: Option<String>,
    ) -> Self {
        let top = results.first();
        let matched_count = results.iter().filter(|r| r.matched).count();
        let confirmed = top.filter(|r| r.matched);

        Self {
            cat_id: confirmed.and_then(|r| r.cat_id),
            score: top.map(|r| r.similarity),
            hamming_distance: top.map(|r| r.hamming_distance),
            query_hash_hex: query_hash_hex.into(),
            query_image_path,
            metadata: EventMetadata {
                threshold: params.threshold,
                max_results: params.max_results,
                max_hamming: params.max_hamming,
                hash_length: query_hash_length,
                reference_count,
                candidate_count: results.len(),
                matched_count,
                suggested_cat_id: top.filter(|r| !r.matched).and_then(|r| r.cat_id),
                top_reference_id: top.map(|r| r.reference_id),
            },
            created_at: Utc::now(),
        }
    }

    pub fn cat_id(&self) -> Option<CatId> {
        self.cat_id
    }

    pub fn score(&self) -> Option<f32> {
        self.score
    }

    pub fn hamming_distance(&self) -> Option<u32> {
        self.hamming_distance
    }

    pub fn query_hash_hex(&self) -> &str {
        &self.query_hash_hex
    }

    pub fn query_image_path(&self) -> Option<&str> {
        self.query_image_path.as_deref()
    }

    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_match(&self) -> bool {
        self.cat_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(cat_id: i64, similarity: f32, matched: bool) -> MatchResult {
        MatchResult {
            cat_id: Some(cat_id),
            similarity,
            hamming_distance: 12,
            reference_id: cat_id * 100,
            query_hash_length: 512,
            matched,
        }
    }

    fn params() -> MatchParams {
        MatchParams {
            threshold: 0.75,
            max_results: 5,
            max_hamming: Some(200),
        }
    }

    #[test]
    fn test_event_for_confirmed_match() {
        let results = vec![result(4, 0.93, true), result(9, 0.81, true)];
        let event = RecognitionEvent::from_results(
            &results,
            &params(),
            "ff00",
            512,
            17,
            Some("uploads/query.jpg".into()),
        );

        assert!(event.is_match());
        assert_eq!(event.cat_id(), Some(4));
        assert_eq!(event.score(), Some(0.93));
        assert_eq!(event.hamming_distance(), Some(12));
        assert_eq!(event.query_image_path(), Some("uploads/query.jpg"));
        assert_eq!(event.metadata().matched_count, 2);
        assert_eq!(event.metadata().reference_count, 17);
        assert_eq!(event.metadata().suggested_cat_id, None);
        assert_eq!(event.metadata().top_reference_id, Some(400));
    }

    #[test]
    fn test_event_for_suggestion() {
        let results = vec![result(2, 0.41, false)];
        let event = RecognitionEvent::from_results(&results, &params(), "ff00", 512, 3, None);

        assert!(!event.is_match());
        assert_eq!(event.cat_id(), None);
        assert_eq!(event.score(), Some(0.41));
        assert_eq!(event.metadata().suggested_cat_id, Some(2));
        assert_eq!(event.metadata().matched_count, 0);
    }

    #[test]
    fn test_event_for_empty_results() {
        let event = RecognitionEvent::from_results(&[], &params(), "", 0, 0, None);
        assert_eq!(event.cat_id(), None);
        assert_eq!(event.score(), None);
        assert_eq!(event.hamming_distance(), None);
        assert_eq!(event.metadata().candidate_count, 0);
    }

    #[test]
    fn test_event_json_roundtrip() {
        let results = vec![result(4, 0.93, true)];
        let event = RecognitionEvent::from_results(&results, &params(), "ab", 8, 1, None);
        let json = serde_json::to_string(&event).unwrap();
        let parsed: RecognitionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
