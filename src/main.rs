#![forbid(unsafe_code)]
//! # Text Lab CLI
//!
//! Command-line front end for the `text_lab` crate. Runs the full analysis
//! over a corpus and prints the summary to stdout.
//!
//! ## Features
//! - Word counts, top words before and after stopword removal.
//! - Weighted average word length, longest words, frequency share.
//! - Top bigrams and TF-IDF sample rows.
//! - Optional persistence to a document store (`mem://` or `file://<dir>`).
//! - Per-file and global counts for a folder (requires a store).
//! - Export of the results as txt, csv, tsv or json.
//!
//! ## Example
//! ```bash
//! cargo run --release -- --corpus book.txt --store-uri file://./store --folder chapters
//! ```
//!
//! Set `RUST_LOG=info` to see each stage as it runs.

use clap::Parser;
use log::error;
use std::path::PathBuf;
use std::process;
use text_lab::{ExportFormat, Pipeline, PipelineConfig, export_report};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Text file or directory of text files to analyze
    #[arg(long, default_value = "sample_corpus.txt")]
    corpus: PathBuf,

    /// Document store URI (mem:// or file://<dir>); persistence is skipped without it
    #[arg(long)]
    store_uri: Option<String>,

    /// Folder for per-file and global counts (needs --store-uri)
    #[arg(long)]
    folder: Option<PathBuf>,

    /// Database name inside the store
    #[arg(long, default_value = text_lab::store::DEFAULT_DATABASE)]
    database: String,

    /// Minimum length for the stored-words query
    #[arg(long, default_value_t = 7)]
    min_length: usize,

    /// Count threshold for the frequency-share filter
    #[arg(long, default_value_t = 2)]
    min_count: u64,

    /// Number of top words shown before/after stopword removal
    #[arg(long, default_value_t = 10)]
    top_n: usize,

    /// Number of top bigrams
    #[arg(long, default_value_t = 20)]
    bigram_top_k: usize,

    /// Hash buckets for TF-IDF
    #[arg(long, default_value_t = text_lab::tfidf::DEFAULT_NUM_FEATURES)]
    num_features: usize,

    /// Partitions per dataset (default: one per worker thread)
    #[arg(long)]
    partitions: Option<usize>,

    /// Also export results (txt, csv, tsv, json)
    #[arg(long)]
    export_format: Option<ExportFormat>,

    /// Directory for exported files
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

impl Cli {
    fn into_config(self) -> (PipelineConfig, Option<ExportFormat>, PathBuf) {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            corpus: self.corpus,
            store_uri: self.store_uri,
            folder: self.folder,
            database: self.database,
            min_length: self.min_length,
            min_count: self.min_count,
            top_n: self.top_n,
            bigram_top_k: self.bigram_top_k,
            num_features: self.num_features,
            partitions: self.partitions.unwrap_or(defaults.partitions),
            ..defaults
        };
        (config, self.export_format, self.out_dir)
    }
}

fn main() {
    env_logger::init();
    let (config, export_format, out_dir) = Cli::parse().into_config();

    let stem = config
        .corpus
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "corpus".to_string());

    let report = match Pipeline::new(config).and_then(|p| p.run()) {
        Ok(report) => report,
        Err(e) => {
            error!("Error: {}", e);
            process::exit(1);
        }
    };
    print!("{}", report.render_text());

    if let Some(format) = export_format {
        match export_report(&report, format, &out_dir, &stem) {
            Ok(files) => {
                for file in files {
                    println!("Exported {}", file.display());
                }
            }
            Err(e) => {
                error!("Export failed: {}", e);
                process::exit(1);
            }
        }
    }
}
