//! Checkpoint table: the durable snapshot of the canonical table.
//!
//! Layout: `;`-separated UTF-8 with the header
//! `ID;RES path;Title;Year;Authors;DOI` and, once acquisition has started, a
//! trailing `DOC path` column. Writes go to a sibling temp file which is then
//! renamed over the target, so an interrupted run never leaves a torn file.

use std::fs;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::models::ReferenceRecord;

pub const DELIMITER: u8 = b';';

const COL_ID: &str = "ID";
const COL_SOURCE: &str = "RES path";
const COL_TITLE: &str = "Title";
const COL_YEAR: &str = "Year";
const COL_AUTHORS: &str = "Authors";
const COL_DOI: &str = "DOI";
const COL_DOCUMENT: &str = "DOC path";

/// Whether the `DOC path` column is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointLayout {
    Ingested,
    WithDocuments,
}

/// Persist the whole table to `path`, replacing any previous snapshot.
pub fn save_checkpoint(
    path: &Path,
    records: &[ReferenceRecord],
    layout: CheckpointLayout,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    {
        let mut writer = WriterBuilder::new().delimiter(DELIMITER).from_path(&tmp)?;

        let mut header = vec![COL_ID, COL_SOURCE, COL_TITLE, COL_YEAR, COL_AUTHORS, COL_DOI];
        if layout == CheckpointLayout::WithDocuments {
            header.push(COL_DOCUMENT);
        }
        writer.write_record(&header)?;

        for (id, record) in records.iter().enumerate() {
            let mut row = vec![
                id.to_string(),
                record.source_path.to_string_lossy().to_string(),
                record.title.clone(),
                record.year.to_string(),
                record.first_author.clone(),
                record.doi().unwrap_or_default().to_string(),
            ];
            if layout == CheckpointLayout::WithDocuments {
                row.push(
                    record
                        .document_path
                        .as_ref()
                        .map(|p| p.to_string_lossy().to_string())
                        .unwrap_or_default(),
                );
            }
            writer.write_record(&row)?;
        }
        writer.flush()?;
    }

    fs::rename(&tmp, path)?;
    debug!("checkpoint written: {} ({} records)", path.display(), records.len());
    Ok(())
}

/// Read a checkpoint back, in stored row order.
pub fn load_checkpoint(path: &Path) -> Result<Vec<ReferenceRecord>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let require = |name: &str| {
        column(name).ok_or_else(|| {
            CoreError::Checkpoint(format!("{} has no {name:?} column", path.display()))
        })
    };

    let source = require(COL_SOURCE)?;
    let title = require(COL_TITLE)?;
    let year = require(COL_YEAR)?;
    let authors = require(COL_AUTHORS)?;
    let doi = require(COL_DOI)?;
    let document = column(COL_DOCUMENT);

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        records.push(parse_row(&row, path, source, title, year, authors, doi, document)?);
    }
    Ok(records)
}

#[allow(clippy::too_many_arguments)]
fn parse_row(
    row: &StringRecord,
    path: &Path,
    source: usize,
    title: usize,
    year: usize,
    authors: usize,
    doi: usize,
    document: Option<usize>,
) -> Result<ReferenceRecord> {
    let cell = |idx: usize| row.get(idx).unwrap_or_default();
    let line = row.position().map_or(0, |p| p.line() as usize);

    let raw_year = cell(year).trim();
    let parsed_year = raw_year.parse::<i32>().map_err(|_| CoreError::InvalidYear {
        path: path.to_path_buf(),
        row: line,
        value: raw_year.to_string(),
    })?;

    let mut record = ReferenceRecord::new(
        cell(source),
        cell(title),
        parsed_year,
        cell(authors),
        Some(cell(doi).to_string()),
    );
    record.document_path = document
        .map(cell)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);
    Ok(record)
}

/// A checkpoint counts as a successful run output only when it exists and is non-empty.
pub fn checkpoint_is_valid(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
