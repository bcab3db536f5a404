use std::collections::HashMap;
use std::collections::hash_map;

use serde::{Deserialize, Serialize};

use crate::engine::Dataset;
use crate::tokenize::{bigrams, tokenize};

///Occurrence counts per token (or per bigram, two tokens joined by a space).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountDistribution {
    counts: HashMap<String, u64>,
}

impl CountDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.counts.contains_key(key)
    }

    ///Number of distinct keys.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    ///Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn add(&mut self, key: impl Into<String>, count: u64) {
        *self.counts.entry(key.into()).or_insert(0) += count;
    }

    ///Element-wise sum with `other`.
    pub fn merge(&mut self, other: &CountDistribution) {
        for (key, count) in other.iter() {
            self.add(key, count);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.counts.keys().map(String::as_str)
    }

    ///Entries sorted by descending count, ties by key ascending.
    pub fn into_sorted_vec(self) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> = self.counts.into_iter().collect();
        entries.sort_by(by_count_desc);
        entries
    }
}

impl FromIterator<(String, u64)> for CountDistribution {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut dist = CountDistribution::new();
        for (key, count) in iter {
            dist.add(key, count);
        }
        dist
    }
}

impl<'a> FromIterator<&'a str> for CountDistribution {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(|k| (k.to_string(), 1)).collect()
    }
}

impl IntoIterator for CountDistribution {
    type Item = (String, u64);
    type IntoIter = hash_map::IntoIter<String, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.counts.into_iter()
    }
}

///Descending count, then ascending key.
pub fn by_count_desc(a: &(String, u64), b: &(String, u64)) -> std::cmp::Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

///Counts every token across all records.
/// # Example
/// ```
/// use text_lab::engine::LocalEngine;
/// use text_lab::aggregate::word_counts;
/// let lines = LocalEngine::new(2).parallelize(vec!["the cat sat.".to_string(), "the dog sat.".to_string()]);
/// let counts = word_counts(lines);
/// assert_eq!(counts.get("the"), 2);
/// assert_eq!(counts.get("dog"), 1);
/// assert_eq!(counts.total(), 6);
/// ```
pub fn word_counts(records: Dataset<String>) -> CountDistribution {
    records
        .flat_map(|line| tokenize(&line))
        .map(|word| (word, 1_u64))
        .reduce_by_key(|a, b| a + b)
        .collect()
        .into_iter()
        .collect()
}

///Counts adjacent token pairs within each record. Pairs never span two records.
pub fn bigram_counts(records: Dataset<String>) -> CountDistribution {
    records
        .map(|line| tokenize(&line))
        .filter(|tokens| tokens.len() > 1)
        .flat_map(|tokens| bigrams(&tokens))
        .map(|pair| (pair, 1_u64))
        .reduce_by_key(|a, b| a + b)
        .collect()
        .into_iter()
        .collect()
}

///The `k` most frequent bigrams.
pub fn top_bigrams(records: Dataset<String>, k: usize) -> Vec<(String, u64)> {
    let n = records.num_partitions();
    let counts = bigram_counts(records);
    Dataset::from_vec(counts.into_iter().collect(), n).take_ordered(k, by_count_desc)
}
