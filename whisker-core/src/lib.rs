//! Whisker Core - visual re-identification of individual stray cats
//!
//! This crate turns cat photos into identity signatures and matches new
//! photos against a catalogue of enrolled references.
//!
//! # Features
//!
//! - Fixed-length embeddings from a swappable model (ONNX weights or a
//!   built-in seeded projection), L2-normalized
//! - Compact binary hashes derived from embeddings for fast Hamming pre-filtering
//! - Per-cat canonical signatures by embedding averaging and bitwise majority vote
//! - Cosine-similarity ranking with per-cat deduplication
//! - Validated, hot-reloadable recognition settings
//!
//! # Example
//!
//! ```no_run
//! use whisker_core::{Recognizer, ReferenceRecord};
//!
//! # fn example() -> whisker_core::Result<()> {
//! let recognizer = Recognizer::from_env()?;
//!
//! let reference = recognizer.compute_signature(&std::fs::read("tabby.jpg").unwrap())?;
//! let catalog = vec![ReferenceRecord::new(Some(1), 10, &reference)];
//!
//! let query = std::fs::read("query.jpg").unwrap();
//! let recognition = recognizer.recognize(&query, &catalog, Some("query.jpg"))?;
//! for result in recognition.matches() {
//!     println!("cat {:?}: {:.3}", result.cat_id, result.similarity);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event;
pub mod matcher;
pub mod settings;
pub mod signature;

#[cfg(feature = "extractor")]
pub mod extractor;
#[cfg(feature = "extractor")]
pub mod recognizer;

// Re-export main types for convenience
pub use error::{FieldError, Result, WhiskerError};
pub use event::{EventMetadata, RecognitionEvent};
pub use matcher::{match_signature, MatchParams, MatchResult, Matcher, ReferenceSignature};
pub use settings::{RecognitionSettings, SettingsChange};
pub use signature::{
    aggregate, aggregate_references, cosine_similarity, derive_hash, hamming_distance, CatId,
    CatSignature, Embedding, ImageSignature, ReferenceId, ReferenceRecord, SignatureHash,
    SignatureRecord, HAMMING_SENTINEL,
};

// Feature extraction exports (not available in Wasm)
#[cfg(feature = "extractor")]
pub use extractor::{
    Device, DevicePreference, EmbeddingModel, ExtractorConfig, FeatureExtractor, ModelFactory,
    ModelSource,
};
#[cfg(feature = "extractor")]
pub use recognizer::{Enrollment, Recognition, Recognizer};
