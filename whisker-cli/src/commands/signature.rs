//! Signature command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use tracing::info;
use whisker_core::SignatureRecord;

use crate::utils::{build_recognizer, read_image};

#[derive(Serialize)]
struct SignatureOutput {
    model: String,
    dimension: usize,
    #[serde(flatten)]
    record: SignatureRecord,
}

/// Execute the signature command.
pub async fn execute(
    image: PathBuf,
    weights: Option<PathBuf>,
    hash_length: Option<usize>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let bytes = read_image(&image)?;
    let recognizer = build_recognizer(weights, hash_length, Vec::new())?;

    let worker = recognizer.clone();
    let signature = tokio::task::spawn_blocking(move || worker.compute_signature(&bytes))
        .await
        .context("Signature worker panicked")?
        .with_context(|| format!("Cannot compute signature of {}", image.display()))?;

    let model = recognizer.extractor().model_source();
    info!(
        path = %image.display(),
        hash_length = signature.hash.bit_len(),
        model = %model,
        "Computed signature"
    );

    let output = SignatureOutput {
        model: model.to_string(),
        dimension: signature.embedding.len(),
        record: signature.to_record(),
    };

    if json {
        let text =
            serde_json::to_string_pretty(&output).context("Failed to serialize signature")?;
        println!("{text}");
    } else if !quiet {
        println!();
        println!("{}", "Signature computed".green().bold());
        println!();
        println!("   {} {}", "Image:".dimmed(), image.display());
        println!("   {} {}", "Model:".dimmed(), output.model);
        println!("   {} {}", "Dimensions:".dimmed(), output.dimension);
        println!("   {} {} bits", "Hash length:".dimmed(), output.record.hash_length);
        println!("   {} {}", "Hash:".dimmed(), output.record.hash_hex);
    }

    Ok(())
}
