//! Aggregate command implementation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde::Serialize;
use tracing::info;
use whisker_core::{aggregate_references, ReferenceId, ReferenceRecord, SignatureRecord};

use crate::utils::load_catalog;

#[derive(Serialize)]
struct AggregateOutput {
    cat_id: i64,
    references_used: Vec<ReferenceId>,
    signature: Option<SignatureRecord>,
}

/// Execute the aggregate command.
pub async fn execute(
    catalog_path: PathBuf,
    cat_id: i64,
    exclude: Vec<ReferenceId>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let catalog = load_catalog(&catalog_path)?;

    let references: Vec<ReferenceRecord> = catalog
        .into_iter()
        .filter(|r| r.cat_id == Some(cat_id))
        .collect();
    if references.is_empty() {
        bail!("No references for cat {cat_id} in {}", catalog_path.display());
    }

    let selection: Vec<ReferenceId> = references
        .iter()
        .map(|r| r.reference_id)
        .filter(|id| !exclude.contains(id))
        .collect();

    let canonical = aggregate_references(&references, Some(selection.as_slice()));
    info!(
        cat_id,
        used = selection.len(),
        excluded = references.len() - selection.len(),
        "Aggregated cat signature"
    );

    let output = AggregateOutput {
        cat_id,
        references_used: selection,
        signature: canonical.to_record(),
    };

    if json {
        let text =
            serde_json::to_string_pretty(&output).context("Failed to serialize signature")?;
        println!("{text}");
    } else if !quiet {
        println!();
        println!("{}", format!("Canonical signature of cat {cat_id}").green().bold());
        println!();
        println!("   {} {:?}", "References used:".dimmed(), output.references_used);
        match &output.signature {
            Some(record) => {
                println!("   {} {} bits", "Hash length:".dimmed(), record.hash_length);
                println!("   {} {}", "Hash:".dimmed(), record.hash_hex);
            }
            None => println!("   {}", "No usable signature (all references excluded)".yellow()),
        }
    }

    Ok(())
}
