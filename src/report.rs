//! Run summaries and their export.
//!
//! [`PipelineReport`] collects what a run printed; [`export_report`] writes it
//! to `out_dir` as `<stem>_<YYYYmmdd_HHMMSS>_<table>.<ext>` files.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::stats::{WordRecord, WordTable};
use crate::store::FanOutWrite;
use crate::tfidf::DocumentVector;

/// Stored-words section of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistSummary {
    /// `<database>.<collection>`.
    pub collection: String,
    pub records: usize,
    pub min_length: usize,
    /// First rows of the length query.
    pub long_words: Vec<WordRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareSummary {
    pub threshold: u64,
    /// Distinct words with `count >= threshold`.
    pub words: usize,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanOutSummary {
    pub folder: String,
    pub files: usize,
    pub global_words: usize,
    pub written: FanOutWrite,
    pub top_per_file: Vec<(String, Vec<(String, u64)>)>,
}

/// Everything one pipeline run reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub corpus: String,
    pub total_words: u64,
    pub distinct_words: usize,
    pub top_before: Vec<(String, u64)>,
    pub top_after: Vec<(String, u64)>,
    pub weighted_average_length: f64,
    pub longest: Vec<WordRecord>,
    pub frequency_share: ShareSummary,
    pub persisted: Option<PersistSummary>,
    pub top_bigrams: Vec<(String, u64)>,
    pub tfidf_documents: usize,
    pub tfidf_sample: Vec<DocumentVector>,
    pub fan_out: Option<FanOutSummary>,
    #[serde(skip)]
    pub word_table: Option<WordTable>,
}

fn pairs(items: &[(String, u64)]) -> String {
    let parts: Vec<String> = items.iter().map(|(w, c)| format!("({w}, {c})")).collect();
    format!("[{}]", parts.join(", "))
}

fn records(items: &[WordRecord]) -> String {
    let parts: Vec<String> = items
        .iter()
        .map(|r| format!("({}, {}, {})", r.word, r.count, r.length))
        .collect();
    format!("[{}]", parts.join(", "))
}

impl PipelineReport {
    /// Human-readable summary, one section per line.
    pub fn render_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Corpus: {}", self.corpus)?;
        writeln!(
            f,
            "Words: {} total, {} distinct",
            self.total_words, self.distinct_words
        )?;
        writeln!(
            f,
            "Top {} before stopword removal: {}",
            self.top_before.len(),
            pairs(&self.top_before)
        )?;
        writeln!(
            f,
            "Top {} after stopword removal: {}",
            self.top_after.len(),
            pairs(&self.top_after)
        )?;
        writeln!(
            f,
            "Weighted avg word length: {:.4}",
            self.weighted_average_length
        )?;
        writeln!(
            f,
            "{} longest words: {}",
            self.longest.len(),
            records(&self.longest)
        )?;
        writeln!(
            f,
            "Share of total frequency for count>={}: {:.4} ({} words)",
            self.frequency_share.threshold, self.frequency_share.share, self.frequency_share.words
        )?;
        if let Some(p) = &self.persisted {
            writeln!(
                f,
                "Stored {} records in collection: {}",
                p.records, p.collection
            )?;
            writeln!(
                f,
                "Stored words with length>={}: {}",
                p.min_length,
                records(&p.long_words)
            )?;
        }
        writeln!(f, "Top bigrams: {}", pairs(&self.top_bigrams))?;
        writeln!(
            f,
            "TF-IDF computed for {} documents; sample rows:",
            self.tfidf_documents
        )?;
        for row in &self.tfidf_sample {
            writeln!(f, "  {row}")?;
        }
        if let Some(fan) = &self.fan_out {
            writeln!(
                f,
                "Per-file and global counts stored: {} files, {} global words, {} per-file records",
                fan.files, fan.written.global, fan.written.per_file
            )?;
            for (file, top) in &fan.top_per_file {
                writeln!(f, "  {file}: {}", pairs(top))?;
            }
        }
        Ok(())
    }
}

/// Export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// The text summary.
    Txt,
    /// Word and bigram tables.
    Csv,
    Tsv,
    /// The full report plus the word table.
    Json,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
            ExportFormat::Json => "json",
        }
    }
}

/// Guards spreadsheet formula injection: cells starting with `=`, `+`, `-`,
/// `@`, tab or carriage return get a leading `'`.
/// # Example
/// ```
/// use text_lab::report::csv_safe_cell;
/// assert_eq!(csv_safe_cell("=SUM(A1)"), "'=SUM(A1)");
/// assert_eq!(csv_safe_cell("plain"), "plain");
/// ```
pub fn csv_safe_cell(cell: &str) -> String {
    match cell.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => format!("'{cell}"),
        _ => cell.to_string(),
    }
}

#[derive(Serialize)]
struct FreqRow<'a> {
    item: &'a str,
    count: u64,
    length: usize,
    frequency: f64,
}

fn output_path(out_dir: &Path, stem: &str, stamp: &str, table: &str, fmt: ExportFormat) -> PathBuf {
    out_dir.join(format!("{stem}_{stamp}_{table}.{}", fmt.extension()))
}

fn write_err(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |e| Error::Export(format!("{}: {e}", path.display()))
}

fn freq_rows(table: &WordTable) -> Vec<FreqRow<'_>> {
    table
        .records()
        .iter()
        .map(|r| FreqRow {
            item: &r.word,
            count: r.count,
            length: r.length,
            frequency: table.relative(r.count),
        })
        .collect()
}

fn write_delimited(
    path: &Path,
    delimiter: u8,
    header: &[&str],
    rows: impl IntoIterator<Item = Vec<String>>,
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)?;
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row.iter().map(|c| csv_safe_cell(c)))?;
    }
    writer.flush().map_err(write_err(path))?;
    Ok(())
}

/// Writes the report in `format` and returns the files created.
pub fn export_report(
    report: &PipelineReport,
    format: ExportFormat,
    out_dir: &Path,
    stem: &str,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir).map_err(write_err(out_dir))?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut written = Vec::new();

    match format {
        ExportFormat::Txt => {
            let path = output_path(out_dir, stem, &stamp, "summary", format);
            fs::write(&path, report.render_text()).map_err(write_err(&path))?;
            written.push(path);
        }
        ExportFormat::Csv | ExportFormat::Tsv => {
            let delimiter = if format == ExportFormat::Csv { b',' } else { b'\t' };
            let path = output_path(out_dir, stem, &stamp, "wordfreq", format);
            let rows = report.word_table.as_ref().map(freq_rows).unwrap_or_default();
            write_delimited(
                &path,
                delimiter,
                &["item", "count", "length", "frequency"],
                rows.iter().map(|r| {
                    vec![
                        r.item.to_string(),
                        r.count.to_string(),
                        r.length.to_string(),
                        r.frequency.to_string(),
                    ]
                }),
            )?;
            written.push(path);

            let path = output_path(out_dir, stem, &stamp, "bigrams", format);
            write_delimited(
                &path,
                delimiter,
                &["item", "count"],
                report
                    .top_bigrams
                    .iter()
                    .map(|(b, c)| vec![b.clone(), c.to_string()]),
            )?;
            written.push(path);
        }
        ExportFormat::Json => {
            let path = output_path(out_dir, stem, &stamp, "report", format);
            fs::write(&path, serde_json::to_string_pretty(report)?).map_err(write_err(&path))?;
            written.push(path);

            let path = output_path(out_dir, stem, &stamp, "wordfreq", format);
            let rows = report.word_table.as_ref().map(freq_rows).unwrap_or_default();
            fs::write(&path, serde_json::to_string_pretty(&rows)?).map_err(write_err(&path))?;
            written.push(path);
        }
    }
    Ok(written)
}
