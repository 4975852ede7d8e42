//! Match command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;
use whisker_core::settings::{KEY_MAX_HAMMING, KEY_MAX_RESULTS, KEY_THRESHOLD};
use whisker_core::{MatchResult, Recognition};

use crate::utils::{build_recognizer, catalog_hash_length, load_catalog, read_image};

/// Options of the match command beyond its positional arguments.
pub struct MatchOptions {
    pub threshold: Option<String>,
    pub max_results: Option<String>,
    pub max_hamming: Option<String>,
    pub weights: Option<PathBuf>,
    pub hash_length: Option<usize>,
    pub event_out: Option<PathBuf>,
    pub json: bool,
}

impl MatchOptions {
    fn overrides(&self) -> Vec<(&'static str, String)> {
        [
            (KEY_THRESHOLD, &self.threshold),
            (KEY_MAX_RESULTS, &self.max_results),
            (KEY_MAX_HAMMING, &self.max_hamming),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|v| (key, v)))
        .collect()
    }
}

/// Execute the match command.
pub async fn execute(
    image: PathBuf,
    catalog_path: PathBuf,
    options: MatchOptions,
    quiet: bool,
) -> Result<()> {
    let bytes = read_image(&image)?;
    let catalog = load_catalog(&catalog_path)?;
    // Hash the query the way the catalog was enrolled unless told otherwise
    let hash_length = options.hash_length.or_else(|| catalog_hash_length(&catalog));
    let recognizer = build_recognizer(options.weights.clone(), hash_length, options.overrides())?;

    let query_path = image.display().to_string();
    let recognition = tokio::task::spawn_blocking(move || {
        recognizer.recognize(&bytes, &catalog, Some(&query_path))
    })
    .await
    .context("Recognition worker panicked")?
    .with_context(|| format!("Cannot recognize {}", image.display()))?;

    info!(
        candidates = recognition.results.len(),
        matched = recognition.is_match(),
        "Match complete"
    );

    if let Some(path) = &options.event_out {
        let event = serde_json::to_string_pretty(&recognition.event)
            .context("Failed to serialize recognition event")?;
        std::fs::write(path, event)
            .with_context(|| format!("Failed to write event: {}", path.display()))?;
    }

    if options.json {
        let text = serde_json::to_string_pretty(&recognition)
            .context("Failed to serialize recognition")?;
        println!("{text}");
    } else if !quiet {
        print_recognition(&recognition);
    }

    Ok(())
}

fn describe(result: &MatchResult) -> String {
    let owner = match result.cat_id {
        Some(cat_id) => format!("cat {cat_id}"),
        None => format!("unassigned reference {}", result.reference_id),
    };
    format!(
        "{owner}  similarity {:.3}  distance {}/{}",
        result.similarity, result.hamming_distance, result.query_hash_length
    )
}

fn print_recognition(recognition: &Recognition) {
    println!();
    if recognition.is_match() {
        println!("{}", "MATCH FOUND".green().bold());
        println!();
        for (rank, result) in recognition.matches().enumerate() {
            println!("   {} {}", format!("{}.", rank + 1).dimmed(), describe(result).green());
        }
    } else if let Some(suggestion) = recognition.suggestion() {
        println!("{}", "NO MATCH".yellow().bold());
        println!();
        println!("   {} {}", "Closest:".dimmed(), describe(suggestion));
    } else {
        println!("{}", "NO MATCH".yellow().bold());
        println!();
        println!("   {}", "No comparable references in catalog".dimmed());
    }
}
