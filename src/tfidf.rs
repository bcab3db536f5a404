//! Hashed-feature TF-IDF.
//!
//! Tokens are hashed with xxh3 into a fixed number of buckets, so no vocabulary
//! has to be collected. Colliding tokens share a bucket and their counts add up.
//! The IDF model is fitted over the whole collection before any document is
//! weighted:
//!
//! ```text
//! idf(b) = ln((N + 1) / (df(b) + 1))
//! ```
//!
//! where `N` is the number of documents and `df(b)` the number of documents
//! with a non-zero count in bucket `b`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::engine::Dataset;
use crate::error::{Error, Result};
use crate::tokenize::tokenize;

/// 4096 buckets.
pub const DEFAULT_NUM_FEATURES: usize = 1 << 12;

/// Sparse vector with sorted, unique indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub size: usize,
    pub indices: Vec<u32>,
    pub values: Vec<f64>,
}

impl SparseVector {
    fn from_map(size: usize, entries: BTreeMap<u32, f64>) -> Self {
        let (indices, values) = entries.into_iter().unzip();
        Self {
            size,
            indices,
            values,
        }
    }

    pub fn get(&self, index: u32) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }
}

impl fmt::Display for SparseVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indices: Vec<String> = self.indices.iter().map(u32::to_string).collect();
        let values: Vec<String> = self.values.iter().map(|v| format!("{v:.4}")).collect();
        write!(
            f,
            "({},[{}],[{}])",
            self.size,
            indices.join(","),
            values.join(",")
        )
    }
}

/// Term-frequency hashing into a fixed number of buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingTf {
    num_features: usize,
}

impl HashingTf {
    pub fn new(num_features: usize) -> Result<Self> {
        if num_features == 0 || num_features > u32::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "num_features must be in 1..={}, got {num_features}",
                u32::MAX
            )));
        }
        Ok(Self { num_features })
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Bucket for `term`. Stable across runs and platforms.
    pub fn index_of(&self, term: &str) -> u32 {
        (xxh3_64(term.as_bytes()) % self.num_features as u64) as u32
    }

    /// Raw term frequency per bucket.
    pub fn transform(&self, tokens: &[String]) -> SparseVector {
        let mut tf: BTreeMap<u32, f64> = BTreeMap::new();
        for token in tokens {
            *tf.entry(self.index_of(token)).or_insert(0.0) += 1.0;
        }
        SparseVector::from_map(self.num_features, tf)
    }
}

/// Inverse document frequency per bucket. Only buckets seen in some document
/// are stored; every other bucket has `df = 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdfModel {
    num_features: usize,
    num_docs: u64,
    doc_freq: HashMap<u32, u64>,
}

impl IdfModel {
    /// Fit over a full collection of term-frequency vectors of dimension
    /// `num_features`.
    pub fn fit(term_freqs: Dataset<SparseVector>, num_features: usize) -> Self {
        let num_docs = term_freqs.count() as u64;
        let doc_freq = term_freqs
            .flat_map(|tf| tf.indices)
            .filter(move |&index| (index as usize) < num_features)
            .map(|index| (index, 1_u64))
            .reduce_by_key(|a, b| a + b)
            .collect()
            .into_iter()
            .collect();
        Self {
            num_features,
            num_docs,
            doc_freq,
        }
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn num_docs(&self) -> u64 {
        self.num_docs
    }

    /// Buckets with a non-zero document frequency.
    pub fn num_seen(&self) -> usize {
        self.doc_freq.len()
    }

    pub fn doc_freq(&self, index: u32) -> u64 {
        self.doc_freq.get(&index).copied().unwrap_or(0)
    }

    /// `ln((N + 1) / (df + 1))`; `0.0` outside the dimension.
    pub fn idf(&self, index: u32) -> f64 {
        if index as usize >= self.num_features {
            return 0.0;
        }
        let n = self.num_docs as f64;
        ((n + 1.0) / (self.doc_freq(index) as f64 + 1.0)).ln()
    }

    /// Element-wise `tf * idf`. Buckets weighted to zero are kept so the
    /// sparsity pattern matches the input.
    pub fn transform(&self, tf: &SparseVector) -> SparseVector {
        SparseVector {
            size: tf.size,
            indices: tf.indices.clone(),
            values: tf.iter().map(|(i, v)| v * self.idf(i)).collect(),
        }
    }
}

/// One weighted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentVector {
    pub id: u64,
    pub tokens: Vec<String>,
    pub features: SparseVector,
}

impl fmt::Display for DocumentVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id={} words={:?} features={}",
            self.id, self.tokens, self.features
        )
    }
}

/// Two-pass TF-IDF over a document collection.
#[derive(Debug, Clone, Copy)]
pub struct TfIdf {
    hashing: HashingTf,
}

impl TfIdf {
    pub fn new(num_features: usize) -> Result<Self> {
        Ok(Self {
            hashing: HashingTf::new(num_features)?,
        })
    }

    pub fn hashing(&self) -> HashingTf {
        self.hashing
    }

    /// One vector per document, in input order. Document ids are the input
    /// positions starting at 0.
    ///
    /// # Example
    /// ```
    /// use text_lab::engine::LocalEngine;
    /// use text_lab::tfidf::TfIdf;
    /// let docs = LocalEngine::new(2).parallelize(vec!["a b".to_string(), "a c".to_string()]);
    /// let vectors = TfIdf::new(64).unwrap().fit_transform(docs);
    /// assert_eq!(vectors.len(), 2);
    /// assert_eq!(vectors[1].id, 1);
    /// ```
    pub fn fit_transform(&self, docs: Dataset<String>) -> Vec<DocumentVector> {
        let hashing = self.hashing;
        let featurized = docs.zip_with_index().map(move |(id, text)| {
            let tokens = tokenize(&text);
            let features = hashing.transform(&tokens);
            DocumentVector {
                id,
                tokens,
                features,
            }
        });
        let model = IdfModel::fit(
            featurized.clone().map(|doc| doc.features),
            hashing.num_features(),
        );
        let mut vectors = featurized
            .map(|mut doc| {
                doc.features = model.transform(&doc.features);
                doc
            })
            .collect();
        vectors.sort_by_key(|doc: &DocumentVector| doc.id);
        vectors
    }
}
