//! Built-in baseline model.
//!
//! Average-pools the canonical tensor to a 16×16 grid per channel and applies
//! a fixed random ±1 projection expanded from a seed with SHA3. Random
//! projections approximately preserve cosine similarity, so visually close
//! photos land close together. Always available; used whenever no trained
//! weights can be loaded.

use sha3::{Digest, Sha3_256};

use super::preprocess::{INPUT_SIZE, TENSOR_LEN};
use super::{EmbeddingModel, ModelSource};
use crate::error::{Result, WhiskerError};

/// Seed used when none is configured.
pub const DEFAULT_PROJECTION_SEED: u64 = 0xCA7F_ACE5_0000_0001;

/// Output width of the baseline model (matches a ResNet-18 backbone).
pub const DEFAULT_EMBEDDING_DIM: usize = 512;

const GRID: usize = 16;
const CELL: usize = INPUT_SIZE as usize / GRID;
const FEATURES: usize = 3 * GRID * GRID;

/// Seeded random projection over pooled pixels.
pub struct ProjectionModel {
    seed: u64,
    dimension: usize,
    /// Row-major `dimension × FEATURES`
    weights: Vec<f32>,
    source: ModelSource,
}

impl ProjectionModel {
    pub fn new(seed: u64, dimension: usize) -> Self {
        let scale = 1.0 / (FEATURES as f32).sqrt();
        let total = dimension * FEATURES;

        let mut weights = Vec::with_capacity(total);
        let mut counter: u64 = 0;
        while weights.len() < total {
            let mut hasher = Sha3_256::new();
            hasher.update(seed.to_le_bytes());
            hasher.update(counter.to_le_bytes());
            hasher.update(b"whisker-projection");
            let block = hasher.finalize();

            for byte in block.iter().copied() {
                for bit in 0..8u8 {
                    if weights.len() == total {
                        break;
                    }
                    let sign = if (byte >> bit) & 1 == 1 { 1.0 } else { -1.0 };
                    weights.push(sign * scale);
                }
            }
            counter += 1;
        }

        Self {
            seed,
            dimension,
            weights,
            source: ModelSource::Projection { seed },
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for ProjectionModel {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECTION_SEED, DEFAULT_EMBEDDING_DIM)
    }
}

fn pool(input: &[f32]) -> Vec<f32> {
    let size = INPUT_SIZE as usize;
    let plane = size * size;
    let area = (CELL * CELL) as f32;

    let mut pooled = vec![0.0f32; FEATURES];
    for c in 0..3 {
        for gy in 0..GRID {
            for gx in 0..GRID {
                let mut sum = 0.0f32;
                for dy in 0..CELL {
                    let row = c * plane + (gy * CELL + dy) * size + gx * CELL;
                    sum += input[row..row + CELL].iter().sum::<f32>();
                }
                pooled[(c * GRID + gy) * GRID + gx] = sum / area;
            }
        }
    }
    pooled
}

impl EmbeddingModel for ProjectionModel {
    fn infer(&self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() != TENSOR_LEN {
            return Err(WhiskerError::ModelUnavailable(format!(
                "expected an input tensor of {} values, got {}",
                TENSOR_LEN,
                input.len()
            )));
        }

        let pooled = pool(input);
        Ok(self
            .weights
            .chunks_exact(FEATURES)
            .map(|row| row.iter().zip(&pooled).map(|(w, x)| w * x).sum())
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn source(&self) -> &ModelSource {
        &self.source
    }
}
