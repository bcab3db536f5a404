use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregate::CountDistribution;
use crate::engine::Dataset;
use crate::stats::top_n;
use crate::tokenize::tokenize;

/// Tokens shown per file by [`FanOutCounts::top_per_file`] in reports.
pub const TOP_PER_FILE: usize = 20;

/// Per-file and global word counts over one set of named documents.
///
/// For every token, `global` equals the sum of that token over all `per_file` entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FanOutCounts {
    pub per_file: BTreeMap<String, CountDistribution>,
    pub global: CountDistribution,
}

impl FanOutCounts {
    /// Counts `(file name, content)` records. Each file is tokenized on its own.
    /// # Example
    /// ```
    /// use text_lab::engine::LocalEngine;
    /// use text_lab::fanout::FanOutCounts;
    /// let files = LocalEngine::new(2).parallelize(vec![
    ///     ("a.txt".to_string(), "apple apple banana".to_string()),
    ///     ("b.txt".to_string(), "banana".to_string()),
    /// ]);
    /// let fan = FanOutCounts::compute(files);
    /// assert_eq!(fan.per_file["a.txt"].get("apple"), 2);
    /// assert_eq!(fan.global.get("banana"), 2);
    /// ```
    pub fn compute(files: Dataset<(String, String)>) -> Self {
        let global = files
            .clone()
            .flat_map(|(_, text)| tokenize(&text))
            .map(|word| (word, 1_u64))
            .reduce_by_key(|a, b| a + b)
            .collect()
            .into_iter()
            .collect();

        let mut per_file: BTreeMap<String, CountDistribution> = BTreeMap::new();
        let counted = files
            .map_values(|text| {
                tokenize(&text)
                    .into_iter()
                    .map(|word| (word, 1_u64))
                    .collect::<CountDistribution>()
            })
            .collect();
        for (name, counts) in counted {
            per_file.entry(name).or_default().merge(&counts);
        }

        Self { per_file, global }
    }

    pub fn file_count(&self) -> usize {
        self.per_file.len()
    }

    /// The `n` most frequent tokens of every file, files in name order.
    pub fn top_per_file(&self, n: usize) -> Vec<(String, Vec<(String, u64)>)> {
        self.per_file
            .iter()
            .map(|(name, counts)| (name.clone(), top_n(counts, n)))
            .collect()
    }

    /// Sum of all per-file distributions.
    pub fn summed_per_file(&self) -> CountDistribution {
        let mut sum = CountDistribution::new();
        for counts in self.per_file.values() {
            sum.merge(counts);
        }
        sum
    }
}
