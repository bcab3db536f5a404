//! In-process compute engine.
//!
//! [`Dataset`] is a partitioned collection whose stages run partition-parallel
//! on the rayon pool. It offers the operations the pipeline needs from a
//! distributed collection: `map`, `flat_map`, `filter`, `reduce_by_key`,
//! `take_ordered` and `collect`. Reductions combine each partition locally and
//! then merge the partial maps, so the reducer must be commutative and
//! associative. Results never depend on how records were partitioned.
//!
//! [`LocalEngine`] is the entry point that turns files into datasets.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::hash::Hash;
use std::path::{Path, PathBuf};

use log::debug;
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// A partitioned in-memory collection.
#[derive(Debug, Clone)]
pub struct Dataset<T> {
    partitions: Vec<Vec<T>>,
}

impl<T: Send> Dataset<T> {
    /// Split `items` into at most `num_partitions` contiguous partitions.
    /// Input order is kept by `collect`.
    pub fn from_vec(items: Vec<T>, num_partitions: usize) -> Self {
        let n = num_partitions.max(1);
        let chunk = items.len().div_ceil(n).max(1);
        let mut partitions = Vec::with_capacity(n);
        let mut iter = items.into_iter();
        loop {
            let part: Vec<T> = iter.by_ref().take(chunk).collect();
            if part.is_empty() {
                break;
            }
            partitions.push(part);
        }
        Self { partitions }
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn count(&self) -> usize {
        self.partitions.iter().map(Vec::len).sum()
    }

    pub fn map<U, F>(self, f: F) -> Dataset<U>
    where
        U: Send,
        F: Fn(T) -> U + Sync + Send,
    {
        let partitions = self
            .partitions
            .into_par_iter()
            .map(|part| part.into_iter().map(&f).collect::<Vec<U>>())
            .collect();
        Dataset { partitions }
    }

    pub fn flat_map<U, I, F>(self, f: F) -> Dataset<U>
    where
        U: Send,
        I: IntoIterator<Item = U>,
        F: Fn(T) -> I + Sync + Send,
    {
        let partitions = self
            .partitions
            .into_par_iter()
            .map(|part| part.into_iter().flat_map(&f).collect::<Vec<U>>())
            .collect();
        Dataset { partitions }
    }

    pub fn filter<F>(self, f: F) -> Dataset<T>
    where
        F: Fn(&T) -> bool + Sync + Send,
    {
        let partitions = self
            .partitions
            .into_par_iter()
            .map(|part| part.into_iter().filter(|item| f(item)).collect::<Vec<T>>())
            .collect();
        Dataset { partitions }
    }

    /// The first `n` elements under `cmp`.
    ///
    /// Each partition keeps its own best `n` before the global merge. The
    /// sort is stable, so `cmp` must be total for a deterministic result.
    pub fn take_ordered<F>(self, n: usize, cmp: F) -> Vec<T>
    where
        F: Fn(&T, &T) -> Ordering + Sync + Send,
    {
        let mut merged: Vec<T> = self
            .partitions
            .into_par_iter()
            .flat_map_iter(|mut part| {
                part.sort_by(&cmp);
                part.truncate(n);
                part
            })
            .collect();
        merged.sort_by(&cmp);
        merged.truncate(n);
        merged
    }

    /// Pair each element with its global position, counting across partitions
    /// in order.
    pub fn zip_with_index(self) -> Dataset<(u64, T)> {
        let mut offsets = Vec::with_capacity(self.partitions.len());
        let mut next = 0_u64;
        for part in &self.partitions {
            offsets.push(next);
            next += part.len() as u64;
        }
        let partitions = self
            .partitions
            .into_par_iter()
            .zip(offsets)
            .map(|(part, start)| {
                (start..)
                    .zip(part)
                    .collect::<Vec<(u64, T)>>()
            })
            .collect();
        Dataset { partitions }
    }

    /// Gather every element to the caller, in partition order.
    pub fn collect(self) -> Vec<T> {
        self.partitions.into_iter().flatten().collect()
    }
}

impl<K, V> Dataset<(K, V)>
where
    K: Eq + Hash + Send,
    V: Send,
{
    /// Combine all values sharing a key with `f`.
    pub fn reduce_by_key<F>(self, f: F) -> Dataset<(K, V)>
    where
        F: Fn(V, V) -> V + Sync + Send,
    {
        let n = self.partitions.len();
        let combined = self
            .partitions
            .into_par_iter()
            .map(|part| {
                let mut local = HashMap::with_capacity(part.len());
                for (key, value) in part {
                    merge_value(&mut local, key, value, &f);
                }
                local
            })
            .reduce(HashMap::new, |a, b| {
                let (mut big, small) = if a.len() >= b.len() { (a, b) } else { (b, a) };
                for (key, value) in small {
                    merge_value(&mut big, key, value, &f);
                }
                big
            });
        Dataset::from_vec(combined.into_iter().collect(), n)
    }

    pub fn map_values<U, F>(self, f: F) -> Dataset<(K, U)>
    where
        U: Send,
        F: Fn(V) -> U + Sync + Send,
    {
        self.map(|(key, value)| (key, f(value)))
    }
}

fn merge_value<K, V, F>(map: &mut HashMap<K, V>, key: K, value: V, f: &F)
where
    K: Eq + Hash,
    F: Fn(V, V) -> V,
{
    match map.remove(&key) {
        Some(existing) => map.insert(key, f(existing, value)),
        None => map.insert(key, value),
    };
}

/// Local stand-in for a cluster: reads inputs and hands out datasets with a
/// fixed partition count.
#[derive(Debug, Clone, Copy)]
pub struct LocalEngine {
    partitions: usize,
}

impl LocalEngine {
    pub fn new(partitions: usize) -> Self {
        Self {
            partitions: partitions.max(1),
        }
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    pub fn parallelize<T: Send>(&self, items: Vec<T>) -> Dataset<T> {
        Dataset::from_vec(items, self.partitions)
    }

    /// One record per line. A directory is read file by file, in name order.
    pub fn text_file(&self, path: &Path) -> Result<Dataset<String>> {
        let files = if path.is_dir() {
            collect_files(path)?
        } else {
            vec![path.to_path_buf()]
        };
        let mut lines = Vec::new();
        for file in &files {
            let content = read_text(file)?;
            lines.extend(content.lines().map(String::from));
        }
        debug!("read {} lines from {}", lines.len(), path.display());
        Ok(self.parallelize(lines))
    }

    /// One `(file name, content)` record per regular file directly inside `dir`.
    pub fn whole_text_files(&self, dir: &Path) -> Result<Dataset<(String, String)>> {
        let mut docs = Vec::new();
        for file in collect_files(dir)? {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            let content = read_text(&file)?;
            docs.push((name, content));
        }
        debug!("read {} files from {}", docs.len(), dir.display());
        Ok(self.parallelize(docs))
    }
}

/// Regular files directly inside `dir`, sorted by file name.
pub fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(Error::MissingFolder(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(Error::NotADirectory(dir.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| Error::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}
