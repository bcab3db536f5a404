//! Integration tests for `text_lab`.
//
// This suite verifies:
// - Pipeline runs end to end (counts, stopwords, length stats, bigrams, TF-IDF)
// - Persistence through the file-backed store and its queries
// - Per-file/global fan-out and its stored collections
// - CLI behavior including failures and export formats
//
// Notes:
// - CLI tests run the binary with a per-process working directory.
// - Tests that change the global CWD are marked #[serial].

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use predicates::prelude::*;
use regex::Regex;
use serde_json::Value as Json;
use serial_test::serial;
use tempfile::tempdir;

use text_lab::store::{FileStore, GLOBAL_WORDCOUNT, PER_FILE_WORDCOUNT, WORDS};
use text_lab::{
    CountDistribution, CountStore, DocumentStore, Error, ExportFormat, MemoryStore, Pipeline,
    PipelineConfig, WordRecord, export_report,
};

// --------------------- helpers ---------------------

/// Create a file with content in a temp dir.
fn write_file(dir: &assert_fs::TempDir, name: &str, content: &str) -> PathBuf {
    let f = dir.child(name);
    f.write_str(content).unwrap();
    f.path().to_path_buf()
}

/// Config for a corpus with small partitions so reductions cross partitions.
fn config_for(corpus: &Path) -> PipelineConfig {
    PipelineConfig {
        corpus: corpus.to_path_buf(),
        partitions: 3,
        ..PipelineConfig::default()
    }
}

fn file_uri(dir: &Path) -> String {
    format!("file://{}", dir.display())
}

/// Run CLI successfully with a specific working directory.
fn run_cli_ok_in(dir: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = assert_cmd::Command::cargo_bin("text_lab").unwrap();
    cmd.current_dir(dir);
    cmd.args(args).assert().success()
}

/// Run CLI expecting failure with a specific working directory.
fn run_cli_fail_in(dir: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = assert_cmd::Command::cargo_bin("text_lab").unwrap();
    cmd.current_dir(dir).env("RUST_LOG", "error");
    cmd.args(args).assert().failure()
}

/// Find an exported file whose name ends with `suffix`.
fn find_with_suffix(dir: &Path, suffix: &str) -> PathBuf {
    for entry in fs::read_dir(dir).unwrap().filter_map(|e| e.ok()) {
        let p = entry.path();
        if let Some(name) = p.file_name().and_then(|n| n.to_str()) {
            if name.ends_with(suffix) {
                return p;
            }
        }
    }
    panic!("No file found ending with {}", suffix);
}

/// Load a wordfreq JSON export into a map<String, u64>.
fn load_wordfreq_map(dir: &Path) -> HashMap<String, u64> {
    let s = fs::read_to_string(find_with_suffix(dir, "_wordfreq.json")).unwrap();
    let v: Json = serde_json::from_str(&s).expect("valid json");
    v.as_array()
        .expect("json array")
        .iter()
        .map(|item| {
            (
                item["item"].as_str().expect("item str").to_string(),
                item["count"].as_u64().expect("count u64"),
            )
        })
        .collect()
}

const SAMPLE: &str = "The cat sat with the dog.\n\
The dog is a good dog and the cat is a quiet cat.\n\
Extraordinary creatures, wonderful animals!\n";

// --------------------- library tests ---------------------

#[test]
fn lib_scenario_counts_and_rankings() {
    let td = assert_fs::TempDir::new().unwrap();
    let corpus = write_file(&td, "c.txt", "the cat sat. the dog sat.");
    let mut cfg = config_for(&corpus);
    cfg.top_n = 2;

    let report = Pipeline::new(cfg).unwrap().run().unwrap();
    assert_eq!(report.total_words, 6);
    assert_eq!(report.distinct_words, 4);
    assert_eq!(
        report.top_after,
        vec![("sat".to_string(), 2), ("cat".to_string(), 1)]
    );
    assert!((report.frequency_share.share - 4.0 / 6.0).abs() < 1e-9);
    assert_eq!(report.frequency_share.words, 2);
    assert!((report.weighted_average_length - 3.0).abs() < 1e-12);
    assert!(report.persisted.is_none());
    assert!(report.fan_out.is_none());
}

#[test]
fn lib_bigrams_and_tfidf_per_line() {
    let td = assert_fs::TempDir::new().unwrap();
    let corpus = write_file(&td, "c.txt", SAMPLE);
    let report = Pipeline::new(config_for(&corpus)).unwrap().run().unwrap();

    let bigrams: HashMap<String, u64> = report.top_bigrams.iter().cloned().collect();
    assert_eq!(bigrams.get("the cat"), Some(&2));
    assert_eq!(bigrams.get("the dog"), Some(&2));
    // "dog." ends line one, "The" starts line two
    assert!(!bigrams.contains_key("dog the"));

    // one document per line
    assert_eq!(report.tfidf_documents, 3);
    assert_eq!(report.tfidf_sample.len(), 3);
    assert_eq!(report.tfidf_sample[2].id, 2);
    assert_eq!(report.tfidf_sample[0].features.size, 4096);
    assert_eq!(
        report.tfidf_sample[2].tokens,
        vec!["extraordinary", "creatures", "wonderful", "animals"]
    );
}

#[test]
fn lib_longest_words_use_true_length() {
    let td = assert_fs::TempDir::new().unwrap();
    let corpus = write_file(&td, "c.txt", SAMPLE);
    let report = Pipeline::new(config_for(&corpus)).unwrap().run().unwrap();

    assert_eq!(report.longest[0], WordRecord::new("extraordinary", 1));
    assert_eq!(report.longest[0].length, 13);
    assert!(report.longest.len() <= 10);
    for pair in report.longest.windows(2) {
        assert!(pair[0].length >= pair[1].length);
    }
}

#[test]
fn lib_empty_corpus_does_not_divide_by_zero() {
    let td = assert_fs::TempDir::new().unwrap();
    let corpus = write_file(&td, "empty.txt", "... !!! ---\n\n");
    let report = Pipeline::new(config_for(&corpus)).unwrap().run().unwrap();
    assert_eq!(report.total_words, 0);
    assert_eq!(report.weighted_average_length, 0.0);
    assert_eq!(report.frequency_share.share, 0.0);
    assert!(report.top_before.is_empty());
    assert!(report.top_bigrams.is_empty());
}

#[test]
fn lib_missing_corpus_is_input_error() {
    let td = tempdir().unwrap();
    let cfg = config_for(&td.path().join("nope.txt"));
    let err = Pipeline::new(cfg).unwrap().run().unwrap_err();
    assert!(matches!(err, Error::Read { .. }));
}

#[test]
fn lib_unsupported_store_uri_fails_fast() {
    let td = assert_fs::TempDir::new().unwrap();
    let corpus = write_file(&td, "c.txt", SAMPLE);
    let mut cfg = config_for(&corpus);
    cfg.store_uri = Some("mongodb://localhost:27017".into());
    assert!(matches!(Pipeline::new(cfg), Err(Error::Store(_))));
}

#[test]
fn lib_persist_and_query_by_length() {
    let td = assert_fs::TempDir::new().unwrap();
    let corpus = write_file(&td, "c.txt", SAMPLE);
    let store_dir = td.child("store");
    let mut cfg = config_for(&corpus);
    cfg.store_uri = Some(file_uri(store_dir.path()));

    let report = Pipeline::new(cfg).unwrap().run().unwrap();
    let persisted = report.persisted.expect("persisted section");
    assert_eq!(persisted.collection, "text_lab.words");
    assert_eq!(persisted.records, report.distinct_words);
    assert!(persisted.long_words.iter().all(|r| r.length >= 7));
    assert!(
        persisted
            .long_words
            .iter()
            .any(|r| r.word == "extraordinary")
    );

    // snapshot is on disk and indexed on count
    let store = FileStore::open(store_dir.path(), "text_lab").unwrap();
    let indexes = store.indexes(WORDS).unwrap();
    assert_eq!(indexes.len(), 1);
    assert!(indexes[0].descending);
    assert_eq!(indexes[0].field, "count");
}

#[test]
fn lib_persist_round_trip_matches_counts() {
    let td = assert_fs::TempDir::new().unwrap();
    let corpus = write_file(&td, "c.txt", SAMPLE);
    let pipeline = Pipeline::with_store(
        config_for(&corpus),
        CountStore::new(Box::new(MemoryStore::new("t"))),
    )
    .unwrap();
    pipeline.run().unwrap();

    let expected: CountDistribution = text_lab::tokenize(SAMPLE)
        .into_iter()
        .map(|w| (w, 1_u64))
        .collect();
    let stored: HashSet<(String, u64)> = pipeline
        .store()
        .unwrap()
        .query_by_min_length(0)
        .unwrap()
        .into_iter()
        .map(|r| (r.word, r.count))
        .collect();
    let expected: HashSet<(String, u64)> = expected
        .iter()
        .map(|(w, c)| (w.to_string(), c))
        .collect();
    assert_eq!(stored, expected);
}

#[test]
fn lib_fan_out_sums_across_files() {
    // file1: apple x2, banana x1, orange x1
    // file2: banana x2, apple x1
    // global: apple=3, banana=3, orange=1
    let td = assert_fs::TempDir::new().unwrap();
    let corpus = write_file(&td, "c.txt", SAMPLE);
    let folder = td.child("docs");
    folder.create_dir_all().unwrap();
    folder
        .child("a1.txt")
        .write_str("apple apple banana orange")
        .unwrap();
    folder.child("a2.txt").write_str("Banana banana, APPLE").unwrap();
    let store_dir = td.child("store");

    let mut cfg = config_for(&corpus);
    cfg.folder = Some(folder.path().to_path_buf());
    cfg.store_uri = Some(file_uri(store_dir.path()));
    let pipeline = Pipeline::new(cfg).unwrap();
    let report = pipeline.run().unwrap();

    let fan = report.fan_out.expect("fan-out section");
    assert_eq!(fan.files, 2);
    assert_eq!(fan.global_words, 3);
    assert_eq!(fan.written.global, 3);
    assert_eq!(fan.written.per_file, 5);
    assert_eq!(fan.top_per_file[0].0, "a1.txt");
    assert_eq!(fan.top_per_file[0].1[0], ("apple".to_string(), 2));

    let store = pipeline.store().unwrap();
    let global: HashMap<String, u64> = store
        .query_global(0)
        .unwrap()
        .into_iter()
        .map(|r| (r.word, r.count))
        .collect();
    assert_eq!(global["apple"], 3);
    assert_eq!(global["banana"], 3);
    assert_eq!(global["orange"], 1);

    let a2 = store.query_file("a2.txt").unwrap();
    assert_eq!(a2.len(), 2);
    assert_eq!((a2[0].word.as_str(), a2[0].count), ("banana", 2));

    let raw = FileStore::open(store_dir.path(), "text_lab").unwrap();
    assert!(!raw.indexes(GLOBAL_WORDCOUNT).unwrap().is_empty());
    assert!(!raw.indexes(PER_FILE_WORDCOUNT).unwrap().is_empty());
}

#[test]
fn lib_fan_out_global_equals_sum_of_files() {
    let td = assert_fs::TempDir::new().unwrap();
    let folder = td.child("docs");
    folder.create_dir_all().unwrap();
    let texts = [
        "It was the best of times, it was the worst of times.",
        "",
        "It's a far, far better thing that I do.",
        "times TIMES times",
    ];
    for (i, t) in texts.iter().enumerate() {
        folder.child(format!("f{i}.txt")).write_str(t).unwrap();
    }
    let corpus = write_file(&td, "c.txt", "x");
    let pipeline = Pipeline::new(config_for(&corpus)).unwrap();
    let fan = pipeline.fan_out(folder.path()).unwrap();

    assert_eq!(fan.file_count(), 4);
    assert_eq!(fan.global, fan.summed_per_file());
    for word in fan.global.keys() {
        let per_file: u64 = fan.per_file.values().map(|d| d.get(word)).sum();
        assert_eq!(fan.global.get(word), per_file);
    }
    assert_eq!(fan.global.get("times"), 5);
}

#[test]
fn lib_fan_out_without_store_is_skipped() {
    let td = assert_fs::TempDir::new().unwrap();
    let corpus = write_file(&td, "c.txt", SAMPLE);
    let mut cfg = config_for(&corpus);
    cfg.folder = Some(td.path().join("missing-folder"));
    // folder is never read without a store
    let report = Pipeline::new(cfg).unwrap().run().unwrap();
    assert!(report.fan_out.is_none());
}

#[test]
fn lib_fan_out_missing_folder_aborts() {
    let td = assert_fs::TempDir::new().unwrap();
    let corpus = write_file(&td, "c.txt", SAMPLE);
    let mut cfg = config_for(&corpus);
    cfg.folder = Some(td.path().join("missing-folder"));
    cfg.store_uri = Some("mem://".into());
    let err = Pipeline::new(cfg).unwrap().run().unwrap_err();
    assert!(matches!(err, Error::MissingFolder(_)));
}

#[test]
fn lib_corpus_directory_reads_all_files() {
    let td = assert_fs::TempDir::new().unwrap();
    let dir = td.child("corpus");
    dir.create_dir_all().unwrap();
    dir.child("1.txt").write_str("alpha beta").unwrap();
    dir.child("2.txt").write_str("beta gamma").unwrap();
    let report = Pipeline::new(config_for(dir.path())).unwrap().run().unwrap();
    assert_eq!(report.total_words, 4);
    assert_eq!(report.top_before[0], ("beta".to_string(), 2));
    // files are separate records
    assert!(report.top_bigrams.iter().all(|(b, _)| b != "beta beta"));
    assert_eq!(report.tfidf_documents, 2);
}

#[test]
#[serial]
fn lib_export_json_relative_out_dir() {
    let td = assert_fs::TempDir::new().unwrap();
    let corpus = write_file(&td, "c.txt", SAMPLE);
    let report = Pipeline::new(config_for(&corpus)).unwrap().run().unwrap();

    std::env::set_current_dir(td.path()).unwrap();
    let files = export_report(&report, ExportFormat::Json, Path::new("out"), "c").unwrap();
    assert_eq!(files.len(), 2);

    let wf = load_wordfreq_map(&td.path().join("out"));
    assert_eq!(wf.get("cat").copied(), Some(3));
    assert_eq!(wf.get("dog").copied(), Some(3));

    let re = Regex::new(r"^c_\d{8}_\d{6}_report\.json$").unwrap();
    let found = fs::read_dir(td.path().join("out"))
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| re.is_match(e.file_name().to_string_lossy().as_ref()));
    assert!(found, "Expected c_<stamp>_report.json");
}

// --------------------- CLI tests ---------------------

#[test]
fn cli_nonexistent_corpus_fails() {
    let td = tempdir().unwrap();
    let bad = td.path().join("does_not_exist_here.txt");
    run_cli_fail_in(td.path(), &["--corpus", bad.to_string_lossy().as_ref()])
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn cli_error_reported_once() {
    let td = tempdir().unwrap();
    let out = run_cli_fail_in(td.path(), &["--corpus", "missing.txt"])
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8_lossy(&out);
    assert_eq!(stderr.matches("cannot read").count(), 1, "stderr: {stderr}");
}

#[test]
fn cli_basic_run_prints_summary() {
    let td = assert_fs::TempDir::new().unwrap();
    let _f = write_file(&td, "sample_corpus.txt", SAMPLE);

    // default corpus name in the working directory
    run_cli_ok_in(td.path(), &[])
        .stdout(predicate::str::contains("Top 10 before stopword removal"))
        .stdout(predicate::str::contains("Top bigrams: [(is a, 2), (the cat, 2), (the dog, 2)"))
        .stdout(predicate::str::contains("Weighted avg word length"))
        .stdout(predicate::str::contains("TF-IDF computed for 3 documents"));
}

#[test]
fn cli_store_and_folder() {
    let td = assert_fs::TempDir::new().unwrap();
    let corpus = write_file(&td, "book.txt", SAMPLE);
    let folder = td.child("chapters");
    folder.create_dir_all().unwrap();
    folder.child("one.txt").write_str("call me ishmael").unwrap();
    folder.child("two.txt").write_str("ishmael again").unwrap();
    let store_dir = td.child("store");

    run_cli_ok_in(
        td.path(),
        &[
            "--corpus",
            corpus.to_str().unwrap(),
            "--store-uri",
            &file_uri(store_dir.path()),
            "--folder",
            folder.path().to_str().unwrap(),
            "--min-length",
            "9",
        ],
    )
    .stdout(predicate::str::contains("collection: text_lab.words"))
    .stdout(predicate::str::contains("length>=9"))
    .stdout(predicate::str::contains("Per-file and global counts stored"));

    store_dir
        .child("text_lab")
        .child("words.json")
        .assert(predicate::path::exists());
    store_dir
        .child("text_lab")
        .child("per_file_wordcount.json")
        .assert(predicate::path::exists());
}

#[test]
fn cli_export_csv() {
    let td = assert_fs::TempDir::new().unwrap();
    let _f = write_file(&td, "fmt.txt", SAMPLE);

    run_cli_ok_in(
        td.path(),
        &["--corpus", "fmt.txt", "--export-format", "csv"],
    );

    let re = Regex::new(r"^fmt_\d{8}_\d{6}_wordfreq\.csv$").unwrap();
    let found = fs::read_dir(td.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| re.is_match(e.file_name().to_string_lossy().as_ref()));
    assert!(found, "Expected fmt_*_wordfreq.csv in temp dir");
    let bigrams = fs::read_to_string(find_with_suffix(td.path(), "_bigrams.csv")).unwrap();
    assert!(bigrams.starts_with("item,count"));
}

#[test]
fn cli_export_tsv_to_out_dir() {
    let td = assert_fs::TempDir::new().unwrap();
    let _f = write_file(&td, "fmt2.txt", SAMPLE);

    run_cli_ok_in(
        td.path(),
        &[
            "--corpus",
            "fmt2.txt",
            "--export-format",
            "tsv",
            "--out-dir",
            "results",
        ],
    );

    let has_tsv = fs::read_dir(td.path().join("results"))
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| e.path().extension().map(|x| x == "tsv").unwrap_or(false));
    assert!(has_tsv, "Expected at least one .tsv export in results/");
}

#[test]
fn cli_rejects_zero_features() {
    let td = assert_fs::TempDir::new().unwrap();
    let _f = write_file(&td, "c.txt", SAMPLE);
    run_cli_fail_in(td.path(), &["--corpus", "c.txt", "--num-features", "0"])
        .stderr(predicate::str::contains("num_features"));
}
