//! Common utility functions shared across CLI commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use whisker_core::settings::{KEY_HASH_LENGTH, KEY_MODEL_PATH};
use whisker_core::{
    ExtractorConfig, ModelFactory, RecognitionSettings, Recognizer, ReferenceId, ReferenceRecord,
    WhiskerError,
};

/// Default log filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "whisker_core=info,warn";

/// Initialize logging to stderr so stdout stays machine-readable.
pub fn init_tracing(verbose: u8, quiet: bool) {
    let filter = match (quiet, verbose) {
        (true, _) => EnvFilter::new("error"),
        (false, 0) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
        }
        (false, 1) => EnvFilter::new("whisker_core=debug,whisker=debug,info"),
        (false, _) => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Read a photo from disk.
pub fn read_image(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read image");
    Ok(bytes)
}

/// Load a catalog of reference signatures.
pub fn load_catalog(path: &Path) -> Result<Vec<ReferenceRecord>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
    let records: Vec<ReferenceRecord> = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse catalog: {}", path.display()))?;
    debug!(path = %path.display(), references = records.len(), "Loaded catalog");
    Ok(records)
}

/// Load a catalog, treating a missing file as empty.
pub fn load_catalog_or_empty(path: &Path) -> Result<Vec<ReferenceRecord>> {
    if path.exists() {
        load_catalog(path)
    } else {
        debug!(path = %path.display(), "Catalog not found, starting empty");
        Ok(Vec::new())
    }
}

/// Write a catalog as pretty-printed JSON.
pub fn save_catalog(path: &Path, records: &[ReferenceRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records).context("Failed to serialize catalog")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write catalog: {}", path.display()))?;
    Ok(())
}

/// First reference id not used in the catalog.
pub fn next_reference_id(records: &[ReferenceRecord]) -> ReferenceId {
    records
        .iter()
        .map(|r| r.reference_id)
        .max()
        .map_or(1, |id| id + 1)
}

/// Hash length shared by every comparable reference in a catalog.
///
/// `None` when the catalog is empty or mixes lengths.
pub fn catalog_hash_length(records: &[ReferenceRecord]) -> Option<usize> {
    let mut lengths = records
        .iter()
        .map(|r| r.signature.hash_length)
        .filter(|&len| len > 0);
    let first = lengths.next()?;
    lengths.all(|len| len == first).then_some(first)
}

/// Build a recognizer from the environment plus command-line overrides.
///
/// Overrides go through the same validation as any settings update.
pub fn build_recognizer(
    weights: Option<PathBuf>,
    hash_length: Option<usize>,
    mut overrides: Vec<(&'static str, String)>,
) -> Result<Recognizer> {
    if let Some(path) = &weights {
        if !path.exists() {
            return Err(WhiskerError::ModelUnavailable(format!(
                "weights file not found: {}",
                path.display()
            ))
            .into());
        }
        overrides.push((KEY_MODEL_PATH, path.display().to_string()));
    }
    if let Some(bits) = hash_length {
        overrides.push((KEY_HASH_LENGTH, bits.to_string()));
    }

    let mut settings = RecognitionSettings::from_env()?;
    settings.apply(overrides)?;
    if let Some(path) = &settings.model_path {
        ModelFactory::ensure_backend(path)?;
    }

    let config = ExtractorConfig::from_env()?;
    Ok(Recognizer::from_config(config, settings))
}
