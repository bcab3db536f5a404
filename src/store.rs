//! Document-store persistence.
//!
//! [`DocumentStore`] is the seam to the storage collaborator: collections of
//! JSON documents with drop, bulk insert, descending index and filtered,
//! sorted find. Two drivers ship with the crate:
//!
//! * [`MemoryStore`] keeps collections in process memory (`mem://`).
//! * [`FileStore`] keeps one JSON snapshot per collection under
//!   `<root>/<database>/<collection>.json` (`file://<root>`).
//!
//! [`CountStore`] sits on top and knows how count distributions map to
//! documents. Each store call replaces the whole collection: it is not an
//! upsert. [`DocumentStore::replace_collection`] performs the drop, insert and
//! index steps as one snapshot where the driver allows it, so a concurrent
//! reader sees either the old or the new collection.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::aggregate::CountDistribution;
use crate::error::StoreError;
use crate::fanout::FanOutCounts;
use crate::stats::WordRecord;

/// A stored document.
pub type Document = serde_json::Map<String, Value>;

/// Database used when none is configured.
pub const DEFAULT_DATABASE: &str = "text_lab";
/// Word counts of the main corpus: `{word, count, length}`.
pub const WORDS: &str = "words";
/// Fan-out global counts: `{word, count}`.
pub const GLOBAL_WORDCOUNT: &str = "global_wordcount";
/// Fan-out per-file counts: `{file, word, count}`.
pub const PER_FILE_WORDCOUNT: &str = "per_file_wordcount";

/// Document predicate for [`DocumentStore::find`].
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    /// Numeric field greater than or equal to the value.
    Gte(String, f64),
    /// Field equal to the value.
    Eq(String, Value),
}

impl Filter {
    pub fn gte(field: &str, value: impl Into<f64>) -> Self {
        Filter::Gte(field.to_string(), value.into())
    }

    pub fn equals(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Gte(field, min) => doc
                .get(field)
                .and_then(Value::as_f64)
                .is_some_and(|v| v >= *min),
            Filter::Eq(field, value) => doc.get(field) == Some(value),
        }
    }
}

/// Single-field index or sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub field: String,
    pub descending: bool,
}

impl IndexSpec {
    pub fn descending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: true,
        }
    }

    pub fn ascending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: false,
        }
    }

    /// Stable sort by this key. Missing fields sort lowest.
    fn sort(&self, docs: &mut [Document]) {
        docs.sort_by(|a, b| {
            let ord = compare_values(a.get(&self.field), b.get(&self.field));
            if self.descending { ord.reverse() } else { ord }
        });
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

/// Collection-level operations of a document store.
pub trait DocumentStore: Send + Sync {
    /// Qualified collection name, `<database>.<collection>`.
    fn full_name(&self, collection: &str) -> String;

    /// Removes the collection. Dropping a missing collection is a no-op.
    fn drop_collection(&self, collection: &str) -> Result<(), StoreError>;

    /// Appends documents, creating the collection if needed.
    fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<usize, StoreError>;

    fn create_index(&self, collection: &str, index: IndexSpec) -> Result<(), StoreError>;

    fn indexes(&self, collection: &str) -> Result<Vec<IndexSpec>, StoreError>;

    /// Matching documents, stably sorted by `sort` when given. A missing
    /// collection yields no documents.
    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&IndexSpec>,
    ) -> Result<Vec<Document>, StoreError>;

    /// Drop, insert and index in one step. Empty `docs` leaves the collection
    /// dropped.
    fn replace_collection(
        &self,
        collection: &str,
        docs: Vec<Document>,
        index: Option<IndexSpec>,
    ) -> Result<usize, StoreError> {
        self.drop_collection(collection)?;
        if docs.is_empty() {
            return Ok(0);
        }
        let inserted = self.insert_many(collection, docs)?;
        if let Some(index) = index {
            self.create_index(collection, index)?;
        }
        Ok(inserted)
    }
}

/// Opens the driver for `uri`: `mem://` or `file://<dir>`.
pub fn connect(uri: &str, database: &str) -> Result<Box<dyn DocumentStore>, StoreError> {
    if uri.starts_with("mem://") || uri.starts_with("memory://") {
        debug!("using in-memory document store for {database}");
        return Ok(Box::new(MemoryStore::new(database)));
    }
    if let Some(root) = uri.strip_prefix("file://") {
        if root.is_empty() {
            return Err(StoreError::UnsupportedScheme(uri.to_string()));
        }
        return Ok(Box::new(FileStore::open(root, database)?));
    }
    Err(StoreError::UnsupportedScheme(uri.to_string()))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Collection {
    indexes: Vec<IndexSpec>,
    documents: Vec<Document>,
}

impl Collection {
    fn add_index(&mut self, index: IndexSpec) {
        if !self.indexes.contains(&index) {
            self.indexes.push(index);
        }
    }

    fn find(&self, filter: &Filter, sort: Option<&IndexSpec>) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .documents
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        if let Some(sort) = sort {
            sort.sort(&mut docs);
        }
        docs
    }
}

/// Process-local driver.
#[derive(Debug, Default)]
pub struct MemoryStore {
    database: String,
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Collection>>, StoreError> {
        self.collections.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Collection>>, StoreError> {
        self.collections.write().map_err(|_| StoreError::Poisoned)
    }
}

impl DocumentStore for MemoryStore {
    fn full_name(&self, collection: &str) -> String {
        format!("{}.{}", self.database, collection)
    }

    fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
        self.write()?.remove(collection);
        Ok(())
    }

    fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<usize, StoreError> {
        let n = docs.len();
        self.write()?
            .entry(collection.to_string())
            .or_default()
            .documents
            .extend(docs);
        Ok(n)
    }

    fn create_index(&self, collection: &str, index: IndexSpec) -> Result<(), StoreError> {
        self.write()?
            .entry(collection.to_string())
            .or_default()
            .add_index(index);
        Ok(())
    }

    fn indexes(&self, collection: &str) -> Result<Vec<IndexSpec>, StoreError> {
        Ok(self
            .read()?
            .get(collection)
            .map(|c| c.indexes.clone())
            .unwrap_or_default())
    }

    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&IndexSpec>,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .read()?
            .get(collection)
            .map(|c| c.find(filter, sort))
            .unwrap_or_default())
    }

    fn replace_collection(
        &self,
        collection: &str,
        docs: Vec<Document>,
        index: Option<IndexSpec>,
    ) -> Result<usize, StoreError> {
        let n = docs.len();
        let mut guard = self.write()?;
        guard.remove(collection);
        if n > 0 {
            guard.insert(
                collection.to_string(),
                Collection {
                    indexes: index.into_iter().collect(),
                    documents: docs,
                },
            );
        }
        Ok(n)
    }
}

/// Directory-backed driver. Every write rewrites the collection snapshot
/// through a temporary file that is renamed into place.
#[derive(Debug, Clone)]
pub struct FileStore {
    database: String,
    dir: PathBuf,
}

impl FileStore {
    pub fn open(root: impl AsRef<Path>, database: &str) -> Result<Self, StoreError> {
        let dir = root.as_ref().join(database);
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            database: database.to_string(),
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    fn load(&self, collection: &str) -> Result<Option<Collection>, StoreError> {
        let path = self.path(collection);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_reader(BufReader::new(file))
            .map(Some)
            .map_err(|source| StoreError::Snapshot { path, source })
    }

    fn save(&self, collection: &str, data: &Collection) -> Result<(), StoreError> {
        let path = self.path(collection);
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        let temp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer(&mut writer, data).map_err(|source| StoreError::Snapshot {
                path: path.clone(),
                source,
            })?;
            writer.flush().map_err(io_err)?;
        }
        temp.persist(&path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

impl DocumentStore for FileStore {
    fn full_name(&self, collection: &str) -> String {
        format!("{}.{}", self.database, collection)
    }

    fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
        let path = self.path(collection);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<usize, StoreError> {
        let n = docs.len();
        let mut data = self.load(collection)?.unwrap_or_default();
        data.documents.extend(docs);
        self.save(collection, &data)?;
        Ok(n)
    }

    fn create_index(&self, collection: &str, index: IndexSpec) -> Result<(), StoreError> {
        let mut data = self.load(collection)?.unwrap_or_default();
        data.add_index(index);
        self.save(collection, &data)
    }

    fn indexes(&self, collection: &str) -> Result<Vec<IndexSpec>, StoreError> {
        Ok(self
            .load(collection)?
            .map(|c| c.indexes)
            .unwrap_or_default())
    }

    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&IndexSpec>,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .load(collection)?
            .map(|c| c.find(filter, sort))
            .unwrap_or_default())
    }

    fn replace_collection(
        &self,
        collection: &str,
        docs: Vec<Document>,
        index: Option<IndexSpec>,
    ) -> Result<usize, StoreError> {
        if docs.is_empty() {
            self.drop_collection(collection)?;
            return Ok(0);
        }
        let n = docs.len();
        let data = Collection {
            indexes: index.into_iter().collect(),
            documents: docs,
        };
        self.save(collection, &data)?;
        Ok(n)
    }
}

/// Global fan-out record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCount {
    pub word: String,
    pub count: u64,
}

/// Per-file fan-out record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileWordCount {
    pub file: String,
    pub word: String,
    pub count: u64,
}

/// Records written by [`CountStore::store_fan_out`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanOutWrite {
    pub global: usize,
    pub per_file: usize,
}

fn to_document<T: Serialize>(record: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Encode(serde::ser::Error::custom(format!(
            "expected an object, got {other}"
        )))),
    }
}

fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

fn count_index() -> IndexSpec {
    IndexSpec::descending("count")
}

/// Count distributions in and out of a [`DocumentStore`].
pub struct CountStore {
    store: Box<dyn DocumentStore>,
}

impl CountStore {
    pub fn new(store: Box<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        Ok(Self::new(connect(uri, database)?))
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn full_name(&self, collection: &str) -> String {
        self.store.full_name(collection)
    }

    /// Replaces [`WORDS`] with one `{word, count, length}` record per entry.
    pub fn store_word_counts(&self, dist: &CountDistribution) -> Result<usize, StoreError> {
        self.store_word_counts_in(WORDS, dist)
    }

    pub fn store_word_counts_in(
        &self,
        collection: &str,
        dist: &CountDistribution,
    ) -> Result<usize, StoreError> {
        let docs = dist
            .clone()
            .into_sorted_vec()
            .into_iter()
            .map(|(word, count)| to_document(&WordRecord::new(word, count)))
            .collect::<Result<Vec<_>, _>>()?;
        let n = self
            .store
            .replace_collection(collection, docs, Some(count_index()))?;
        info!("stored {n} records in {}", self.full_name(collection));
        Ok(n)
    }

    /// Word records with `length >= min_length`, by descending count.
    pub fn query_by_min_length(&self, min_length: usize) -> Result<Vec<WordRecord>, StoreError> {
        self.query_words(Filter::gte("length", min_length as f64))
    }

    /// Word records with `count >= min_count`, by descending count.
    pub fn query_by_min_count(&self, min_count: u64) -> Result<Vec<WordRecord>, StoreError> {
        self.query_words(Filter::gte("count", min_count as f64))
    }

    fn query_words(&self, filter: Filter) -> Result<Vec<WordRecord>, StoreError> {
        self.store
            .find(WORDS, &filter, Some(&count_index()))?
            .into_iter()
            .map(from_document)
            .collect()
    }

    /// Replaces [`GLOBAL_WORDCOUNT`] and [`PER_FILE_WORDCOUNT`].
    pub fn store_fan_out(&self, fan_out: &FanOutCounts) -> Result<FanOutWrite, StoreError> {
        let global = fan_out
            .global
            .clone()
            .into_sorted_vec()
            .into_iter()
            .map(|(word, count)| to_document(&WordCount { word, count }))
            .collect::<Result<Vec<_>, _>>()?;
        let global = self
            .store
            .replace_collection(GLOBAL_WORDCOUNT, global, Some(count_index()))?;

        let mut per_file = Vec::new();
        for (file, counts) in &fan_out.per_file {
            for (word, count) in counts.clone().into_sorted_vec() {
                per_file.push(to_document(&FileWordCount {
                    file: file.clone(),
                    word,
                    count,
                })?);
            }
        }
        let per_file =
            self.store
                .replace_collection(PER_FILE_WORDCOUNT, per_file, Some(count_index()))?;

        info!(
            "stored {global} global and {per_file} per-file records in {}",
            self.store.full_name("*")
        );
        Ok(FanOutWrite { global, per_file })
    }

    /// Global fan-out counts with `count >= min_count`, by descending count.
    pub fn query_global(&self, min_count: u64) -> Result<Vec<WordCount>, StoreError> {
        self.store
            .find(
                GLOBAL_WORDCOUNT,
                &Filter::gte("count", min_count as f64),
                Some(&count_index()),
            )?
            .into_iter()
            .map(from_document)
            .collect()
    }

    /// Stored counts of one file, by descending count.
    pub fn query_file(&self, file: &str) -> Result<Vec<FileWordCount>, StoreError> {
        self.store
            .find(
                PER_FILE_WORDCOUNT,
                &Filter::equals("file", file),
                Some(&count_index()),
            )?
            .into_iter()
            .map(from_document)
            .collect()
    }
}
