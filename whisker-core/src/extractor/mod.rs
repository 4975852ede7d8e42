//! Feature extraction: photo bytes in, L2-normalized embedding out.
//!
//! Backends implement [`EmbeddingModel`] over the canonical input tensor
//! produced by [`preprocess`]. A [`FeatureExtractor`] owns the active model:
//! it is loaded lazily on first use, and replaced atomically when the weights
//! change, so in-flight extractions finish on the model they started with.

mod device;
mod factory;
#[cfg(feature = "onnx")]
mod onnx;
mod preprocess;
mod projection;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwapOption;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{Result, WhiskerError};
use crate::signature::Embedding;

pub use device::{Device, DevicePreference};
pub use factory::{ExtractorConfig, ModelFactory};
#[cfg(feature = "onnx")]
pub use onnx::OnnxModel;
pub use preprocess::{
    decode, is_supported_format, preprocess, IMAGENET_MEAN, IMAGENET_STD, INPUT_SIZE, TENSOR_LEN,
};
pub use projection::{ProjectionModel, DEFAULT_EMBEDDING_DIM, DEFAULT_PROJECTION_SEED};

/// A backend turning a preprocessed image tensor into a raw embedding.
pub trait EmbeddingModel: Send + Sync {
    /// Run inference on one `3 × 224 × 224` CHW tensor.
    fn infer(&self, input: &[f32]) -> Result<Vec<f32>>;

    /// Width of the produced embedding.
    fn dimension(&self) -> usize;

    /// Where the model came from.
    fn source(&self) -> &ModelSource;
}

/// Origin of the active model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSource {
    /// Custom trained weights
    Weights(PathBuf),
    /// Generic pretrained graph
    Baseline(PathBuf),
    /// Built-in seeded projection
    Projection { seed: u64 },
}

impl ModelSource {
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Weights(_))
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weights(path) => write!(f, "custom weights ({})", path.display()),
            Self::Baseline(path) => write!(f, "baseline model ({})", path.display()),
            Self::Projection { seed } => write!(f, "built-in projection (seed {seed:#x})"),
        }
    }
}

/// Sized holder so the trait object can live in an `ArcSwapOption`.
struct LoadedModel {
    model: Box<dyn EmbeddingModel>,
}

struct Inner {
    /// Held while (re)building a model; guards the configuration it was built from
    config: Mutex<ExtractorConfig>,
    model: ArcSwapOption<LoadedModel>,
}

/// Shared handle to the process-wide embedding model.
///
/// Cloning is cheap; all clones observe the same model.
#[derive(Clone)]
pub struct FeatureExtractor {
    inner: Arc<Inner>,
}

impl fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = self
            .inner
            .model
            .load_full()
            .map(|loaded| loaded.model.source().clone());
        f.debug_struct("FeatureExtractor")
            .field("model", &source)
            .finish_non_exhaustive()
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

impl FeatureExtractor {
    /// Create an extractor; the model is loaded on first use.
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: Mutex::new(config),
                model: ArcSwapOption::empty(),
            }),
        }
    }

    /// Create an extractor configured from `WHISKER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ExtractorConfig::from_env()?))
    }

    /// Create an extractor around an already-built model.
    pub fn with_model(model: Box<dyn EmbeddingModel>) -> Self {
        let extractor = Self::new(ExtractorConfig::default());
        extractor
            .inner
            .model
            .store(Some(Arc::new(LoadedModel { model })));
        extractor
    }

    /// Current model, loading it on first use.
    fn current(&self) -> Arc<LoadedModel> {
        if let Some(loaded) = self.inner.model.load_full() {
            return loaded;
        }

        let config = self.inner.config.lock().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have finished loading while we waited
        if let Some(loaded) = self.inner.model.load_full() {
            return loaded;
        }

        let loaded = Arc::new(LoadedModel {
            model: ModelFactory::create(&config),
        });
        self.inner.model.store(Some(Arc::clone(&loaded)));
        loaded
    }

    /// Compute the normalized embedding of an encoded photo.
    pub fn embed(&self, image_data: &[u8]) -> Result<Embedding> {
        let image = decode(image_data)?;
        self.embed_image(&image)
    }

    /// Compute the normalized embedding of a decoded photo.
    pub fn embed_image(&self, image: &DynamicImage) -> Result<Embedding> {
        let tensor = preprocess(image);
        let loaded = self.current();
        let output = loaded.model.infer(&tensor)?;
        debug!(dimension = output.len(), "Extracted embedding");
        Ok(Embedding::normalized(output))
    }

    /// Output width of the active model.
    pub fn embedding_dim(&self) -> usize {
        self.current().model.dimension()
    }

    pub fn model_source(&self) -> ModelSource {
        self.current().model.source().clone()
    }

    /// Load the model now instead of on the first request.
    pub fn warm_up(&self) -> ModelSource {
        let source = self.model_source();
        info!(source = %source, "Feature extractor ready");
        source
    }

    /// Switch to custom weights.
    ///
    /// The file must exist and the build must have a weights backend. If the
    /// file still cannot be loaded the extractor falls back the same way it
    /// does at startup. Concurrent extractions keep using the previous model
    /// until the new one is published.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn set_weights(&self, path: &Path) -> Result<ModelSource> {
        if !path.exists() {
            return Err(WhiskerError::ModelUnavailable(format!(
                "weights file not found: {}",
                path.display()
            )));
        }
        ModelFactory::ensure_backend(path)?;
        Ok(self.rebuild(Some(path.to_path_buf())))
    }

    /// Drop custom weights and return to the default model.
    pub fn clear_weights(&self) -> ModelSource {
        self.rebuild(None)
    }

    /// Apply a weights setting: `Some` switches weights, `None` clears them.
    pub fn reload(&self, weights: Option<&Path>) -> Result<ModelSource> {
        match weights {
            Some(path) => self.set_weights(path),
            None => Ok(self.clear_weights()),
        }
    }

    fn rebuild(&self, weights: Option<PathBuf>) -> ModelSource {
        let mut config = self.inner.config.lock().unwrap_or_else(PoisonError::into_inner);
        let next = config.clone().with_weights(weights);

        let model = ModelFactory::create(&next);
        let source = model.source().clone();
        self.inner
            .model
            .store(Some(Arc::new(LoadedModel { model })));
        *config = next;

        info!(source = %source, "Feature extractor model replaced");
        source
    }
}
