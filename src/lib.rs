#![forbid(unsafe_code)]
//! Batch text analytics over a corpus: word and bigram counts, stopword
//! rankings, length statistics, hashed TF-IDF and per-file/global fan-out,
//! with optional persistence to a document store.
//!
//! The stages are plain functions over [`engine::Dataset`], a partitioned
//! collection evaluated on the rayon pool. [`Pipeline`] wires them together
//! from a [`PipelineConfig`].

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod fanout;
pub mod pipeline;
pub mod report;
pub mod stats;
pub mod store;
pub mod tfidf;
pub mod tokenize;

pub use aggregate::{CountDistribution, bigram_counts, top_bigrams, word_counts};
pub use config::PipelineConfig;
pub use engine::{Dataset, LocalEngine, collect_files};
pub use error::{Error, Result, StoreError};
pub use fanout::FanOutCounts;
pub use pipeline::Pipeline;
pub use report::{ExportFormat, PipelineReport, csv_safe_cell, export_report};
pub use stats::{STOPWORDS, WordRecord, WordTable, compare_stopwords, remove_stopwords, top_n};
pub use store::{CountStore, DocumentStore, FileStore, MemoryStore};
pub use tfidf::{DocumentVector, HashingTf, IdfModel, SparseVector, TfIdf};
pub use tokenize::tokenize;
