//! Recognition service: extractor, settings, and matcher behind one handle.
//!
//! Settings are published through an atomic cell and read once per call, so
//! a query always runs against one consistent snapshot even while an update
//! is being applied. Updates themselves are serialized.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{FieldError, Result, WhiskerError};
use crate::event::RecognitionEvent;
use crate::extractor::{ExtractorConfig, FeatureExtractor, ModelFactory, ModelSource};
use crate::matcher::{MatchResult, Matcher};
use crate::settings::{RecognitionSettings, SettingsChange, KEY_MODEL_PATH};
use crate::signature::{ImageSignature, ReferenceId, ReferenceRecord};

/// Outcome of computing the signature of one reference image.
#[derive(Debug)]
pub struct Enrollment {
    pub reference_id: ReferenceId,
    pub result: Result<ImageSignature>,
}

impl Enrollment {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Answer to one recognition query.
#[derive(Debug, Clone, Serialize)]
pub struct Recognition {
    pub results: Vec<MatchResult>,
    pub query_hash_hex: String,
    pub query_hash_length: usize,
    pub event: RecognitionEvent,
}

impl Recognition {
    /// Results at or above the threshold.
    pub fn matches(&self) -> impl Iterator<Item = &MatchResult> {
        self.results.iter().filter(|r| r.matched)
    }

    /// Whether any reference confirmed the query, owned by a cat or not.
    pub fn is_match(&self) -> bool {
        self.matches().next().is_some()
    }

    /// The single below-threshold candidate returned when nothing matched.
    pub fn suggestion(&self) -> Option<&MatchResult> {
        self.results.first().filter(|r| !r.matched)
    }
}

/// Shared recognition handle. Cheap to clone.
#[derive(Clone)]
pub struct Recognizer {
    extractor: FeatureExtractor,
    settings: Arc<ArcSwap<RecognitionSettings>>,
    /// Serializes settings updates
    writer: Arc<Mutex<()>>,
}

impl std::fmt::Debug for Recognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recognizer")
            .field("extractor", &self.extractor)
            .field("settings", &self.settings.load_full())
            .finish()
    }
}

impl Recognizer {
    /// Wrap an existing extractor. The extractor's weights are left as they are.
    pub fn new(extractor: FeatureExtractor, settings: RecognitionSettings) -> Self {
        Self {
            extractor,
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Build an extractor from `config`, with `settings.model_path` taking
    /// precedence over any configured weights.
    pub fn from_config(config: ExtractorConfig, settings: RecognitionSettings) -> Self {
        let config = match &settings.model_path {
            Some(path) => config.with_weights(Some(path.clone())),
            None => config,
        };
        Self::new(FeatureExtractor::new(config), settings)
    }

    /// Settings and extractor configuration from `WHISKER_*` variables.
    pub fn from_env() -> Result<Self> {
        let settings = RecognitionSettings::from_env()?;
        let config = ExtractorConfig::from_env()?;
        Ok(Self::from_config(config, settings))
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Snapshot of the settings currently in effect.
    pub fn settings(&self) -> Arc<RecognitionSettings> {
        self.settings.load_full()
    }

    /// Embedding and hash of one photo under the current hash length.
    pub fn compute_signature(&self, image_data: &[u8]) -> Result<ImageSignature> {
        let settings = self.settings.load();
        let embedding = self.extractor.embed(image_data)?;
        Ok(ImageSignature::from_embedding(
            embedding,
            settings.hash_length_override,
        ))
    }

    /// Compute signatures for a batch of reference images.
    ///
    /// Every image gets its own result; a failure never stops the batch.
    pub fn enroll<I, B>(&self, images: I) -> Vec<Enrollment>
    where
        I: IntoIterator<Item = (ReferenceId, B)>,
        B: AsRef<[u8]>,
    {
        images
            .into_iter()
            .map(|(reference_id, bytes)| {
                let result = self.compute_signature(bytes.as_ref());
                match &result {
                    Ok(signature) => debug!(
                        reference_id,
                        hash_length = signature.hash.bit_len(),
                        "Computed reference signature"
                    ),
                    Err(e) => warn!(reference_id, error = %e, "Failed to compute reference signature"),
                }
                Enrollment {
                    reference_id,
                    result,
                }
            })
            .collect()
    }

    /// Recompute stored reference signatures after a model or hash length
    /// change. Same contract as [`Recognizer::enroll`].
    pub fn reprocess<I, B>(&self, images: I) -> Vec<Enrollment>
    where
        I: IntoIterator<Item = (ReferenceId, B)>,
        B: AsRef<[u8]>,
    {
        let outcomes = self.enroll(images);
        let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();
        info!(
            succeeded,
            failed = outcomes.len() - succeeded,
            "Reprocessed reference images"
        );
        outcomes
    }

    /// Identify the cat in a query photo.
    ///
    /// Image errors propagate; malformed reference records are skipped. The
    /// returned event is produced whether or not anything matched.
    #[instrument(level = "debug", skip_all, fields(reference_count = references.len()))]
    pub fn recognize(
        &self,
        image_data: &[u8],
        references: &[ReferenceRecord],
        query_image_path: Option<&str>,
    ) -> Result<Recognition> {
        let settings = self.settings.load_full();
        let embedding = self.extractor.embed(image_data)?;
        let query = ImageSignature::from_embedding(embedding, settings.hash_length_override);

        let params = settings.match_params();
        let results = Matcher::new(params).rank_records(&query, references);

        let query_hash_hex = query.hash.to_hex();
        let query_hash_length = query.hash.bit_len();
        let event = RecognitionEvent::from_results(
            &results,
            &params,
            query_hash_hex.clone(),
            query_hash_length,
            references.len(),
            query_image_path.map(str::to_string),
        );

        match results.first() {
            Some(top) => info!(
                cat_id = ?top.cat_id,
                similarity = top.similarity,
                distance = top.hamming_distance,
                matched = top.matched,
                "Recognition complete"
            ),
            None => info!("Recognition complete: no candidates"),
        }

        Ok(Recognition {
            results,
            query_hash_hex,
            query_hash_length,
            event,
        })
    }

    /// Validate and apply a settings update.
    ///
    /// Nothing changes unless every field is valid and a new `model_path`
    /// exists. A model change replaces the extractor's weights before the
    /// new settings are published.
    pub fn update_settings<I, K, V>(&self, updates: I) -> Result<SettingsChange>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self.settings.load_full();
        let (next, change) = current.with_updates(updates)?;

        if change.model_changed {
            if let Some(path) = &next.model_path {
                if !path.exists() {
                    return Err(WhiskerError::InvalidSettings(vec![FieldError::new(
                        KEY_MODEL_PATH,
                        format!("file not found: {}", path.display()),
                    )]));
                }
                if !ModelFactory::supports_weights() {
                    return Err(WhiskerError::InvalidSettings(vec![FieldError::new(
                        KEY_MODEL_PATH,
                        "this build cannot load model weights (enable the `onnx` feature)",
                    )]));
                }
            }
            let source = self.reload_model(next.model_path.as_deref())?;
            info!(source = %source, "Model path changed");
        }

        if change.reprocess_required {
            warn!("Stored reference signatures are stale and should be reprocessed");
        }

        self.settings.store(Arc::new(next));
        Ok(change)
    }

    fn reload_model(&self, weights: Option<&Path>) -> Result<ModelSource> {
        self.extractor.reload(weights)
    }
}
