//! Signature codec: embeddings, binary hashes, and their distances.
//!
//! An [`Embedding`] is the L2-normalized feature vector of one photo. A
//! [`SignatureHash`] is a compact bit vector derived from it by
//! standardize-then-threshold and is used as a cheap pre-filter before the
//! cosine comparison.
//!
//! # Storage format
//!
//! - Hashes are stored as lowercase hex of the packed bits (MSB-first) plus an
//!   explicit bit length, because the zero padding of the last byte is
//!   otherwise ambiguous.
//! - Embeddings are stored as raw little-endian `f32` bytes.
//!
//! # Usage
//!
//! ```
//! use whisker_core::signature::{derive_hash, Embedding, SignatureHash};
//!
//! let embedding = Embedding::new(vec![0.6, -0.8]);
//! let hash = derive_hash(&embedding, None);
//! let stored = (hash.to_hex(), hash.bit_len());
//!
//! let restored = SignatureHash::from_hex(&stored.0, Some(stored.1)).unwrap();
//! assert_eq!(restored.hamming_distance(&hash), 0);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, WhiskerError};

/// Distance reported when either hash is empty and the pair is incomparable.
pub const HAMMING_SENTINEL: u32 = 9999;

/// Fixed-length real-valued feature vector.
///
/// The length is the model's output width; a zero-length embedding means
/// "no signature".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Wrap raw values without normalizing.
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Wrap values and scale them to unit length.
    ///
    /// A zero vector is returned unchanged.
    pub fn normalized(values: Vec<f32>) -> Self {
        let mut embedding = Self(values);
        embedding.normalize();
        embedding
    }

    /// The "no signature" embedding.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f32 {
        self.0.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Scale in place to unit length; no-op for zero or empty vectors.
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            self.0.iter_mut().for_each(|x| *x /= norm);
        }
    }

    /// Cosine similarity against another embedding.
    pub fn cosine_similarity(&self, other: &Self) -> f32 {
        cosine_similarity(&self.0, &other.0)
    }

    /// Serialize to raw little-endian `f32` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|x| x.to_le_bytes()).collect()
    }

    /// Deserialize from raw little-endian `f32` bytes.
    ///
    /// An empty buffer yields the empty embedding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 4 != 0 {
            return Err(WhiskerError::InvalidSignature(format!(
                "embedding byte length {} is not a multiple of 4",
                bytes.len()
            )));
        }

        let values = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok(Self(values))
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Packed bit vector with an explicit bit length.
///
/// Bits are packed MSB-first: bit `i` lives in byte `i / 8` at position
/// `7 - i % 8`. Padding bits past `bit_len` are always zero.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignatureHash {
    /// Packed bits, `ceil(bit_len / 8)` bytes
    bytes: Vec<u8>,
    /// Number of meaningful bits
    bit_len: usize,
}

impl SignatureHash {
    /// Pack a sequence of bits.
    pub fn from_bits<I>(bits: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let mut bytes = Vec::new();
        let mut bit_len = 0;
        for bit in bits {
            if bit_len % 8 == 0 {
                bytes.push(0);
            }
            if bit {
                if let Some(last) = bytes.last_mut() {
                    *last |= 0x80 >> (bit_len % 8);
                }
            }
            bit_len += 1;
        }
        Self { bytes, bit_len }
    }

    /// Build from packed bytes, keeping the first `bit_len` bits.
    pub fn from_packed(mut bytes: Vec<u8>, bit_len: usize) -> Result<Self> {
        let available = bytes.len() * 8;
        if bit_len > available {
            return Err(WhiskerError::InvalidSignature(format!(
                "declared hash length {bit_len} exceeds the {available} bits supplied"
            )));
        }

        bytes.truncate(bit_len.div_ceil(8));
        let tail = bit_len % 8;
        if tail != 0 {
            if let Some(last) = bytes.last_mut() {
                *last &= 0xFFu8 << (8 - tail);
            }
        }
        Ok(Self { bytes, bit_len })
    }

    /// Parse a stored hex string.
    ///
    /// With `bit_len = None` every hex nibble counts, so the length is a
    /// multiple of 8.
    pub fn from_hex(hex_str: &str, bit_len: Option<usize>) -> Result<Self> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| WhiskerError::InvalidSignature(format!("Invalid hex string: {}", e)))?;
        let bit_len = bit_len.unwrap_or(bytes.len() * 8);
        Self::from_packed(bytes, bit_len)
    }

    /// Get the packed bits as a lowercase hexadecimal string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    /// Bit at `index`, or `false` past the end.
    pub fn bit(&self, index: usize) -> bool {
        if index >= self.bit_len {
            return false;
        }
        self.bytes[index / 8] & (0x80 >> (index % 8)) != 0
    }

    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.bit_len).map(move |i| self.bit(i))
    }

    /// Hamming distance to another hash, see [`hamming_distance`].
    pub fn hamming_distance(&self, other: &Self) -> u32 {
        hamming_distance(self, other)
    }
}

/// Derive the binary signature hash of an embedding.
///
/// The embedding is first truncated to `length_override` dimensions when the
/// override is shorter than the embedding. The (possibly truncated) values are
/// standardized by their own mean and population standard deviation (the
/// division is skipped when the deviation is zero) and each dimension maps to
/// one bit: `1` when the standardized value is `>= 0`.
///
/// The truncated prefix is not renormalized before standardization.
pub fn derive_hash(embedding: &Embedding, length_override: Option<usize>) -> SignatureHash {
    let values = embedding.as_slice();
    let values = match length_override {
        Some(len) if len < values.len() => &values[..len],
        _ => values,
    };

    if values.is_empty() {
        return SignatureHash::default();
    }

    let n = values.len() as f64;
    let mean = values.iter().map(|&x| x as f64).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&x| {
            let d = x as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let std = variance.sqrt();

    SignatureHash::from_bits(values.iter().map(|&x| {
        let centered = x as f64 - mean;
        let standardized = if std > 0.0 { centered / std } else { centered };
        standardized >= 0.0
    }))
}

/// Compute the Hamming distance between two hashes.
///
/// Bits are compared over the shared prefix and the length difference is
/// added as a penalty.
///
/// # Returns
///
/// The number of differing bits (including the length penalty), or
/// [`HAMMING_SENTINEL`] if either hash is empty.
pub fn hamming_distance(a: &SignatureHash, b: &SignatureHash) -> u32 {
    if a.is_empty() || b.is_empty() {
        return HAMMING_SENTINEL;
    }

    let shared = a.bit_len.min(b.bit_len);
    let full_bytes = shared / 8;

    let mut distance: u32 = a.bytes[..full_bytes]
        .iter()
        .zip(&b.bytes[..full_bytes])
        .map(|(x, y)| (x ^ y).count_ones())
        .sum();

    let tail = shared % 8;
    if tail != 0 {
        let mask = 0xFFu8 << (8 - tail);
        distance += ((a.bytes[full_bytes] ^ b.bytes[full_bytes]) & mask).count_ones();
    }

    let penalty = a.bit_len.abs_diff(b.bit_len) as u32;
    distance + penalty
}

/// Cosine similarity of two vectors.
///
/// Returns `0.0` when either vector is empty, the lengths differ, either
/// norm is zero, or the result is not finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold(
        (0.0f64, 0.0f64, 0.0f64),
        |(dot, na, nb), (&x, &y)| {
            let (x, y) = (x as f64, y as f64);
            (dot + x * y, na + x * x, nb + y * y)
        },
    );

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    let similarity = (dot / denom) as f32;
    // NaN or infinite components carry no signal
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}

/// Parse a string of `0`/`1` characters into a hash. Other characters are ignored.
pub fn parse_bit_string(bits: &str) -> SignatureHash {
    SignatureHash::from_bits(bits.chars().filter_map(|c| match c {
        '0' => Some(false),
        '1' => Some(true),
        _ => None,
    }))
}
