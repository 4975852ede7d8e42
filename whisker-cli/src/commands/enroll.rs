//! Enroll command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::{info, warn};
use whisker_core::{ImageSignature, ReferenceRecord};

use crate::utils::{
    build_recognizer, load_catalog_or_empty, next_reference_id, read_image, save_catalog,
};

/// Execute the enroll command.
///
/// Signatures are computed in parallel on blocking workers. A failing photo
/// is reported and skipped; the command only fails if none succeeded.
pub async fn execute(
    catalog_path: PathBuf,
    cat_id: i64,
    images: Vec<PathBuf>,
    weights: Option<PathBuf>,
    hash_length: Option<usize>,
    quiet: bool,
) -> Result<()> {
    let mut catalog = load_catalog_or_empty(&catalog_path)?;
    let recognizer = build_recognizer(weights, hash_length, Vec::new())?;

    let tasks: Vec<_> = images
        .into_iter()
        .map(|path| {
            let worker = recognizer.clone();
            let handle = tokio::task::spawn_blocking({
                let path = path.clone();
                move || -> Result<ImageSignature> {
                    let bytes = read_image(&path)?;
                    worker
                        .compute_signature(&bytes)
                        .with_context(|| format!("Cannot compute signature of {}", path.display()))
                }
            });
            (path, handle)
        })
        .collect();

    let mut next_id = next_reference_id(&catalog);
    let mut enrolled = 0usize;
    let mut first_error = None;

    for (path, handle) in tasks {
        let outcome = handle.await.context("Enrollment worker panicked")?;
        match outcome {
            Ok(signature) => {
                let reference_id = next_id;
                next_id += 1;
                catalog.push(ReferenceRecord::new(Some(cat_id), reference_id, &signature));
                enrolled += 1;

                info!(cat_id, reference_id, path = %path.display(), "Enrolled reference");
                if !quiet {
                    println!(
                        "   {} {} {}",
                        "✓".green(),
                        path.display(),
                        format!("(reference {reference_id})").dimmed()
                    );
                }
            }
            Err(e) => {
                warn!(cat_id, path = %path.display(), error = %format!("{e:#}"), "Enrollment failed");
                if !quiet {
                    println!("   {} {} {}", "✗".red(), path.display(), format!("{e:#}").red());
                }
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    if enrolled == 0 {
        // Nothing usable: surface the first failure for the exit code
        return match first_error {
            Some(e) => Err(e.context("No image could be enrolled")),
            None => Ok(()),
        };
    }

    save_catalog(&catalog_path, &catalog)?;

    if !quiet {
        println!();
        println!(
            "{}",
            format!("Enrolled {enrolled} photo(s) for cat {cat_id}").green().bold()
        );
        println!("   {} {}", "Catalog:".dimmed(), catalog_path.display());
        println!("   {} {}", "References:".dimmed(), catalog.len());
    }

    Ok(())
}
