//! Statistics derived from a [`CountDistribution`].
//!
//! Every function here is pure. Rankings break count ties by ascending key so
//! that results are reproducible regardless of how the counts were reduced.
//!
//! Zero totals are not an error: the weighted average length, frequency share
//! and relative frequency of an empty distribution are all `0.0`.

use serde::{Deserialize, Serialize};

use crate::aggregate::{CountDistribution, by_count_desc};

/// Tokens excluded by [`remove_stopwords`].
pub const STOPWORDS: [&str; 6] = ["is", "a", "the", "to", "with", "and"];

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// The `n` highest counts, ties broken by ascending key.
///
/// # Example
/// ```
/// use text_lab::aggregate::CountDistribution;
/// use text_lab::stats::top_n;
/// let counts: CountDistribution = ["b", "a", "b", "c"].into_iter().collect();
/// assert_eq!(top_n(&counts, 2), vec![("b".to_string(), 2), ("a".to_string(), 1)]);
/// ```
pub fn top_n(dist: &CountDistribution, n: usize) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> = dist.iter().map(|(k, c)| (k.to_string(), c)).collect();
    entries.sort_by(by_count_desc);
    entries.truncate(n);
    entries
}

/// A copy of `dist` without stopwords. Surviving counts are unchanged.
pub fn remove_stopwords(dist: &CountDistribution) -> CountDistribution {
    dist.iter()
        .filter(|(word, _)| !is_stopword(word))
        .map(|(word, count)| (word.to_string(), count))
        .collect()
}

/// Rankings before and after stopword removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopwordComparison {
    /// Total token occurrences before filtering.
    pub total: u64,
    pub top_before: Vec<(String, u64)>,
    pub top_after: Vec<(String, u64)>,
    #[serde(skip)]
    pub filtered: CountDistribution,
}

pub fn compare_stopwords(dist: &CountDistribution, n: usize) -> StopwordComparison {
    let filtered = remove_stopwords(dist);
    StopwordComparison {
        total: dist.total(),
        top_before: top_n(dist, n),
        top_after: top_n(&filtered, n),
        filtered,
    }
}

/// One word with its count and character length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRecord {
    pub word: String,
    pub count: u64,
    pub length: usize,
}

impl WordRecord {
    pub fn new(word: impl Into<String>, count: u64) -> Self {
        let word = word.into();
        let length = word.chars().count();
        Self {
            word,
            count,
            length,
        }
    }
}

/// Word records of one distribution together with its total count.
///
/// Records are kept in ranking order (descending count, then word).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTable {
    records: Vec<WordRecord>,
    total: u64,
}

/// Records with `count >= threshold` and the share of all occurrences they cover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyShare {
    pub threshold: u64,
    pub records: Vec<WordRecord>,
    /// Kept count over total count, in `[0, 1]`.
    pub share: f64,
}

impl WordTable {
    pub fn from_counts(dist: &CountDistribution) -> Self {
        let records: Vec<WordRecord> = top_n(dist, dist.len())
            .into_iter()
            .map(|(word, count)| WordRecord::new(word, count))
            .collect();
        let total = records.iter().map(|r| r.count).sum();
        Self { records, total }
    }

    pub fn records(&self) -> &[WordRecord] {
        &self.records
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `count / total` for `word`; `0.0` when absent or the table is empty.
    pub fn frequency(&self, word: &str) -> f64 {
        self.records
            .iter()
            .find(|r| r.word == word)
            .map_or(0.0, |r| self.relative(r.count))
    }

    /// `count / total`, or `0.0` for an empty table.
    pub fn relative(&self, count: u64) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64
        }
    }

    /// Sum of `length * count` over the total count. `0.0` for an empty table.
    ///
    /// # Example
    /// ```
    /// use text_lab::aggregate::CountDistribution;
    /// use text_lab::stats::WordTable;
    /// let counts: CountDistribution = ["ab", "ab", "abcd"].into_iter().collect();
    /// let table = WordTable::from_counts(&counts);
    /// assert!((table.weighted_average_length() - 8.0 / 3.0).abs() < 1e-12);
    /// ```
    pub fn weighted_average_length(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let weighted: u64 = self
            .records
            .iter()
            .map(|r| r.length as u64 * r.count)
            .sum();
        weighted as f64 / self.total as f64
    }

    /// The `n` longest words; equal lengths rank by higher count, then word.
    pub fn longest(&self, n: usize) -> Vec<WordRecord> {
        let mut records = self.records.clone();
        records.sort_by(|a, b| {
            b.length
                .cmp(&a.length)
                .then_with(|| b.count.cmp(&a.count))
                .then_with(|| a.word.cmp(&b.word))
        });
        records.truncate(n);
        records
    }

    pub fn filter_count_at_least(&self, threshold: u64) -> FrequencyShare {
        let records: Vec<WordRecord> = self
            .records
            .iter()
            .filter(|r| r.count >= threshold)
            .cloned()
            .collect();
        let kept: u64 = records.iter().map(|r| r.count).sum();
        FrequencyShare {
            threshold,
            records,
            share: self.relative(kept),
        }
    }
}
