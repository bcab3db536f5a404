use std::path::Path;

use log::{debug, info, warn};

use crate::aggregate::{top_bigrams, word_counts};
use crate::config::PipelineConfig;
use crate::engine::LocalEngine;
use crate::error::Result;
use crate::fanout::{FanOutCounts, TOP_PER_FILE};
use crate::report::{FanOutSummary, PersistSummary, PipelineReport, ShareSummary};
use crate::stats::{WordTable, compare_stopwords};
use crate::store::{CountStore, WORDS};
use crate::tfidf::TfIdf;

/// Rows of the length query kept in the report.
const LONG_WORDS_SHOWN: usize = 20;

/// One configured analysis run.
pub struct Pipeline {
    config: PipelineConfig,
    engine: LocalEngine,
    store: Option<CountStore>,
}

impl Pipeline {
    /// Validates `config` and connects the store when a URI is set.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let store = match &config.store_uri {
            Some(uri) => Some(CountStore::connect(uri, &config.database)?),
            None => None,
        };
        Ok(Self::assemble(config, store))
    }

    /// Like [`Pipeline::new`] but with an already opened store; `store_uri` is
    /// ignored.
    pub fn with_store(config: PipelineConfig, store: CountStore) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, Some(store)))
    }

    fn assemble(config: PipelineConfig, store: Option<CountStore>) -> Self {
        let engine = LocalEngine::new(config.partitions);
        Self {
            config,
            engine,
            store,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> Option<&CountStore> {
        self.store.as_ref()
    }

    pub fn run(&self) -> Result<PipelineReport> {
        let cfg = &self.config;
        info!(
            "analyzing {} with {} partitions",
            cfg.corpus.display(),
            self.engine.partitions()
        );
        let lines = self.engine.text_file(&cfg.corpus)?;

        let counts = word_counts(lines.clone());
        let comparison = compare_stopwords(&counts, cfg.top_n);
        info!("Top {} before stopword removal: {:?}", cfg.top_n, comparison.top_before);
        info!("Top {} after stopword removal: {:?}", cfg.top_n, comparison.top_after);

        let table = WordTable::from_counts(&counts);
        let weighted = table.weighted_average_length();
        if table.total() == 0 {
            warn!("corpus {} contains no words", cfg.corpus.display());
        }
        info!("Weighted avg word length: {weighted:.4}");
        let longest = table.longest(cfg.longest_n);
        info!("{} longest words: {:?}", cfg.longest_n, longest);
        let share = table.filter_count_at_least(cfg.min_count);
        info!(
            "Share of total frequency for count>={}: {:.4}",
            cfg.min_count, share.share
        );

        let persisted = match &self.store {
            Some(store) => {
                let records = store.store_word_counts(&counts)?;
                let mut long_words = store.query_by_min_length(cfg.min_length)?;
                info!(
                    "{} stored words with length>={}",
                    long_words.len(),
                    cfg.min_length
                );
                long_words.truncate(LONG_WORDS_SHOWN);
                Some(PersistSummary {
                    collection: store.full_name(WORDS),
                    records,
                    min_length: cfg.min_length,
                    long_words,
                })
            }
            None => {
                debug!("no store configured; skipping persistence");
                None
            }
        };

        let bigrams = top_bigrams(lines.clone(), cfg.bigram_top_k);
        info!("Top bigrams: {bigrams:?}");

        let vectors = TfIdf::new(cfg.num_features)?.fit_transform(lines);
        info!("TF-IDF computed for {} documents", vectors.len());
        let tfidf_documents = vectors.len();
        let tfidf_sample = vectors.into_iter().take(cfg.tfidf_sample_rows).collect();

        let fan_out = match (&cfg.folder, &self.store) {
            (Some(folder), Some(store)) => {
                let fan = self.fan_out(folder)?;
                let written = store.store_fan_out(&fan)?;
                info!("Per-file and global counts stored");
                Some(FanOutSummary {
                    folder: folder.display().to_string(),
                    files: fan.file_count(),
                    global_words: fan.global.len(),
                    written,
                    top_per_file: fan.top_per_file(TOP_PER_FILE),
                })
            }
            (Some(folder), None) => {
                warn!(
                    "folder {} given without a store uri; skipping per-file counts",
                    folder.display()
                );
                None
            }
            _ => None,
        };

        Ok(PipelineReport {
            corpus: cfg.corpus.display().to_string(),
            total_words: comparison.total,
            distinct_words: counts.len(),
            top_before: comparison.top_before,
            top_after: comparison.top_after,
            weighted_average_length: weighted,
            longest,
            frequency_share: ShareSummary {
                threshold: share.threshold,
                words: share.records.len(),
                share: share.share,
            },
            persisted,
            top_bigrams: bigrams,
            tfidf_documents,
            tfidf_sample,
            fan_out,
            word_table: Some(table),
        })
    }

    /// Per-file and global counts of every file directly inside `folder`.
    pub fn fan_out(&self, folder: &Path) -> Result<FanOutCounts> {
        let files = self.engine.whole_text_files(folder)?;
        let fan = FanOutCounts::compute(files);
        debug!(
            "{} files, {} distinct words in {}",
            fan.file_count(),
            fan.global.len(),
            folder.display()
        );
        Ok(fan)
    }
}
