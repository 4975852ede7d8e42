//! Whisker CLI - stray cat re-identification from photos.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  64  Invalid arguments or settings
  65  Invalid data (undecodable image or catalog)
  66  Input file not found
  69  Model unavailable
  74  Cannot write output file";

#[derive(Parser)]
#[command(name = "whisker")]
#[command(author, version, about = "Stray cat re-identification from photos", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Only print errors and requested output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the identity signature of one photo
    Signature {
        /// Photo to analyse
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Custom model weights (ONNX)
        #[arg(long, value_name = "PATH")]
        weights: Option<PathBuf>,

        /// Number of embedding dimensions to hash
        #[arg(long, value_name = "BITS")]
        hash_length: Option<usize>,

        /// Print the signature record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add reference photos of a cat to a catalog
    Enroll {
        /// Catalog file (created if missing)
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,

        /// Cat the photos belong to
        #[arg(long)]
        cat_id: i64,

        /// Reference photos
        #[arg(value_name = "IMAGE", required = true)]
        images: Vec<PathBuf>,

        /// Custom model weights (ONNX)
        #[arg(long, value_name = "PATH")]
        weights: Option<PathBuf>,

        /// Number of embedding dimensions to hash
        #[arg(long, value_name = "BITS")]
        hash_length: Option<usize>,
    },

    /// Print the canonical signature of one cat
    Aggregate {
        /// Catalog file
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,

        /// Cat to aggregate
        #[arg(long)]
        cat_id: i64,

        /// Reference ids to leave out
        #[arg(long, value_name = "REF")]
        exclude: Vec<i64>,

        /// Print the signature record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Identify the cat in a photo
    Match {
        /// Query photo
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Catalog file
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,

        /// Minimum similarity for a confirmed match
        #[arg(long)]
        threshold: Option<String>,

        /// Maximum confirmed matches to show
        #[arg(long)]
        max_results: Option<String>,

        /// Skip references farther than this Hamming distance
        #[arg(long)]
        max_hamming: Option<String>,

        /// Custom model weights (ONNX)
        #[arg(long, value_name = "PATH")]
        weights: Option<PathBuf>,

        /// Number of embedding dimensions to hash (default: the catalog's)
        #[arg(long, value_name = "BITS")]
        hash_length: Option<usize>,

        /// Write the recognition event as JSON
        #[arg(long, value_name = "FILE")]
        event_out: Option<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version also arrive here and are not failures
            let code = if err.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    utils::init_tracing(cli.verbose, cli.quiet);

    let result = run(cli).await;

    let exit = match &result {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(err),
    };
    if let Some(message) = &exit.message {
        eprintln!("Error: {message}");
    }
    std::process::exit(exit.code);
}

async fn run(cli: Cli) -> Result<()> {
    let quiet = cli.quiet;

    match cli.command {
        Commands::Signature {
            image,
            weights,
            hash_length,
            json,
        } => commands::signature::execute(image, weights, hash_length, json, quiet).await,
        Commands::Enroll {
            catalog,
            cat_id,
            images,
            weights,
            hash_length,
        } => commands::enroll::execute(catalog, cat_id, images, weights, hash_length, quiet).await,
        Commands::Aggregate {
            catalog,
            cat_id,
            exclude,
            json,
        } => commands::aggregate::execute(catalog, cat_id, exclude, json, quiet).await,
        Commands::Match {
            image,
            catalog,
            threshold,
            max_results,
            max_hamming,
            weights,
            hash_length,
            event_out,
            json,
        } => {
            let options = commands::match_cmd::MatchOptions {
                threshold,
                max_results,
                max_hamming,
                weights,
                hash_length,
                event_out,
                json,
            };
            commands::match_cmd::execute(image, catalog, options, quiet).await
        }
    }
}
