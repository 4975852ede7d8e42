//! Model selection.
//!
//! Priority:
//! 1. Custom weights (if configured and loadable)
//! 2. Baseline ONNX graph (if present)
//! 3. Built-in seeded projection (always available)

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::device::{Device, DevicePreference};
use super::projection::{ProjectionModel, DEFAULT_EMBEDDING_DIM, DEFAULT_PROJECTION_SEED};
use super::{EmbeddingModel, ModelSource};
use crate::error::{Result, WhiskerError};

const DEFAULT_MODEL_DIR: &str = "models/cat_face";
const DEFAULT_MODEL_FILE: &str = "cat_embedding.onnx";
const DEFAULT_BASELINE_FILE: &str = "baseline.onnx";

/// Where the extractor looks for models.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorConfig {
    /// Custom trained weights
    pub weights: Option<PathBuf>,
    /// Generic pretrained graph used when no custom weights load
    pub baseline: Option<PathBuf>,
    pub device: DevicePreference,
    pub projection_seed: u64,
    pub projection_dim: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            weights: None,
            baseline: None,
            device: DevicePreference::Auto,
            projection_seed: DEFAULT_PROJECTION_SEED,
            projection_dim: DEFAULT_EMBEDDING_DIM,
        }
    }
}

impl ExtractorConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional: `WHISKER_MODEL_DIR`, `WHISKER_MODEL_FILE`,
    /// `WHISKER_BASELINE_MODEL`, `WHISKER_DEVICE`, `WHISKER_PROJECTION_SEED`.
    /// Model files are only picked up if they exist and this build can
    /// load them.
    pub fn from_env() -> Result<Self> {
        let model_dir = PathBuf::from(
            std::env::var("WHISKER_MODEL_DIR").unwrap_or_else(|_| DEFAULT_MODEL_DIR.to_string()),
        );
        let model_file =
            std::env::var("WHISKER_MODEL_FILE").unwrap_or_else(|_| DEFAULT_MODEL_FILE.to_string());
        let baseline = std::env::var("WHISKER_BASELINE_MODEL")
            .map(PathBuf::from)
            .unwrap_or_else(|_| model_dir.join(DEFAULT_BASELINE_FILE));

        let device = match std::env::var("WHISKER_DEVICE") {
            Ok(value) => value
                .parse::<DevicePreference>()
                .map_err(|e| WhiskerError::ModelUnavailable(format!("WHISKER_DEVICE: {e}")))?,
            Err(_) => DevicePreference::Auto,
        };

        let projection_seed = match std::env::var("WHISKER_PROJECTION_SEED") {
            Ok(value) => value.trim().parse::<u64>().map_err(|_| {
                WhiskerError::ModelUnavailable(format!(
                    "WHISKER_PROJECTION_SEED: '{value}' is not an unsigned integer"
                ))
            })?,
            Err(_) => DEFAULT_PROJECTION_SEED,
        };

        let (weights, baseline) = if ModelFactory::supports_weights() {
            (existing(model_dir.join(model_file)), existing(baseline))
        } else {
            (None, None)
        };

        Ok(Self {
            weights,
            baseline,
            device,
            projection_seed,
            projection_dim: DEFAULT_EMBEDDING_DIM,
        })
    }

    pub fn with_weights(mut self, weights: Option<PathBuf>) -> Self {
        self.weights = weights;
        self
    }
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    path.exists().then_some(path)
}

/// Factory for embedding models.
pub struct ModelFactory;

impl ModelFactory {
    /// Build the best model the configuration allows.
    ///
    /// Never fails: every load error is logged and the next candidate is
    /// tried, ending with the built-in projection.
    pub fn create(config: &ExtractorConfig) -> Box<dyn EmbeddingModel> {
        let device = config.device.resolve();

        if let Some(path) = &config.weights {
            match Self::load_onnx(path, device, ModelSource::Weights(path.clone())) {
                Ok(model) => {
                    info!(path = %path.display(), "Selected custom weights");
                    return model;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Custom weights unavailable, falling back"),
            }
        }

        if let Some(path) = &config.baseline {
            match Self::load_onnx(path, device, ModelSource::Baseline(path.clone())) {
                Ok(model) => {
                    info!(path = %path.display(), "Selected baseline model");
                    return model;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Baseline model unavailable, falling back"),
            }
        }

        info!(seed = config.projection_seed, "Selected built-in projection model");
        Self::create_projection(config.projection_seed, config.projection_dim)
    }

    /// Load exactly the given weights, failing instead of falling back.
    pub fn create_strict(path: &Path, device: Device) -> Result<Box<dyn EmbeddingModel>> {
        Self::load_onnx(path, device, ModelSource::Weights(path.to_path_buf()))
    }

    /// Whether this build has a backend for external weights.
    pub const fn supports_weights() -> bool {
        cfg!(feature = "onnx")
    }

    /// Fail with `ModelUnavailable` when `path` could never be loaded by
    /// this build, whatever its contents.
    pub fn ensure_backend(path: &Path) -> Result<()> {
        if Self::supports_weights() {
            Ok(())
        } else {
            Err(missing_backend(path))
        }
    }

    pub fn create_projection(seed: u64, dimension: usize) -> Box<dyn EmbeddingModel> {
        Box::new(ProjectionModel::new(seed, dimension))
    }

    #[cfg(feature = "onnx")]
    fn load_onnx(path: &Path, device: Device, source: ModelSource) -> Result<Box<dyn EmbeddingModel>> {
        let model = super::onnx::OnnxModel::load(path, device, source)?;
        Ok(Box::new(model))
    }

    #[cfg(not(feature = "onnx"))]
    fn load_onnx(path: &Path, _device: Device, _source: ModelSource) -> Result<Box<dyn EmbeddingModel>> {
        Err(missing_backend(path))
    }
}

fn missing_backend(path: &Path) -> WhiskerError {
    WhiskerError::ModelUnavailable(format!(
        "cannot load {}: built without the `onnx` feature",
        path.display()
    ))
}
