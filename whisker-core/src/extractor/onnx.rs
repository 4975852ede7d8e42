//! ONNX Runtime backend for externally trained weights.
//!
//! The graph must take one `[1, 3, 224, 224]` float input and produce the
//! embedding as its first output. The output width is probed with a zero
//! tensor when the model is loaded, so incompatible graphs are rejected
//! before they are ever published.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider,
};
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use super::device::Device;
use super::preprocess::{INPUT_SIZE, TENSOR_LEN};
use super::{EmbeddingModel, ModelSource};
use crate::error::{Result, WhiskerError};

fn unavailable(context: &str) -> impl Fn(ort::Error) -> WhiskerError + '_ {
    move |e| WhiskerError::ModelUnavailable(format!("{}: {}", context, e))
}

/// ONNX Runtime session wrapper.
pub struct OnnxModel {
    /// `Session::run` needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    dimension: usize,
    device: Device,
    source: ModelSource,
}

impl std::fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModel")
            .field("input_name", &self.input_name)
            .field("dimension", &self.dimension)
            .field("device", &self.device)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl OnnxModel {
    /// Load a model file and probe its output dimension.
    pub fn load(path: &Path, device: Device, source: ModelSource) -> Result<Self> {
        if !path.exists() {
            return Err(WhiskerError::ModelUnavailable(format!(
                "ONNX model file not found: {}",
                path.display()
            )));
        }

        let session = build_session(path, device)?;
        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| WhiskerError::ModelUnavailable("model declares no inputs".into()))?;

        let mut model = Self {
            session: Mutex::new(session),
            input_name,
            dimension: 0,
            device,
            source,
        };

        let probe = model.run(&vec![0.0; TENSOR_LEN])?;
        if probe.is_empty() {
            return Err(WhiskerError::ModelUnavailable(
                "model produced an empty embedding".into(),
            ));
        }
        model.dimension = probe.len();

        info!(
            path = %path.display(),
            device = %device,
            dimension = model.dimension,
            "Loaded ONNX embedding model"
        );
        Ok(model)
    }

    fn run(&self, input: &[f32]) -> Result<Vec<f32>> {
        let size = INPUT_SIZE as usize;
        let tensor = Tensor::from_array((vec![1usize, 3, size, size], input.to_vec()))
            .map_err(unavailable("Failed to build input tensor"))?;

        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(unavailable("Inference failed"))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(unavailable("Unexpected output tensor"))?;
        debug!(shape = ?shape, "Inference complete");

        Ok(data.to_vec())
    }
}

fn build_session(path: &Path, device: Device) -> Result<Session> {
    let builder = Session::builder().map_err(unavailable("Session builder error"))?;
    let builder = match device {
        Device::Cpu => builder.with_execution_providers([CPUExecutionProvider::default().build()]),
        Device::Cuda => builder.with_execution_providers([
            CUDAExecutionProvider::default().build(),
            CPUExecutionProvider::default().build(),
        ]),
        Device::CoreMl => builder.with_execution_providers([
            CoreMLExecutionProvider::default().build(),
            CPUExecutionProvider::default().build(),
        ]),
    }
    .map_err(unavailable("Provider error"))?;

    builder
        .commit_from_file(path)
        .map_err(unavailable("Failed to load ONNX model"))
}

impl EmbeddingModel for OnnxModel {
    fn infer(&self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() != TENSOR_LEN {
            return Err(WhiskerError::ModelUnavailable(format!(
                "expected an input tensor of {} values, got {}",
                TENSOR_LEN,
                input.len()
            )));
        }
        self.run(input)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn source(&self) -> &ModelSource {
        &self.source
    }
}
