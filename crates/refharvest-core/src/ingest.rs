//! Schema normalization: turn citation-database exports into canonical records.
//!
//! Every folder below the input root is classified by name into a
//! [`SourceFormat`]. Its export files are read with that format's static
//! column mapping, duplicates re-exported across files of the same source are
//! collapsed, and finally all sources are concatenated and deduplicated by
//! normalized title.

use std::fs;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use tracing::{info, warn};

use crate::dedup::{self, DedupReport};
use crate::error::{CoreError, Result};
use crate::fs_ops::list_files_with_extension;
use crate::models::{ReferenceRecord, SourceFormat};

/// Outcome of normalizing one source folder.
#[derive(Debug, Clone, Serialize)]
pub struct FolderReport {
    pub path: PathBuf,
    pub format: SourceFormat,
    pub files_read: usize,
    pub rows_read: usize,
    pub dedup: DedupReport,
}

/// Everything that happened while building the canonical table.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub folders: Vec<FolderReport>,
    /// Folders whose name matched no source format.
    pub skipped_folders: Vec<PathBuf>,
    /// Rows and files that were excluded, with the reason.
    pub errors: Vec<CoreError>,
    pub global_dedup: Option<DedupReport>,
}

impl IngestReport {
    pub fn rows_read(&self) -> usize {
        self.folders.iter().map(|f| f.rows_read).sum()
    }
}

/// The unified, deduplicated and ordered table ready for acquisition.
#[derive(Debug)]
pub struct CanonicalTable {
    pub records: Vec<ReferenceRecord>,
    pub report: IngestReport,
}

/// Walk `root` and return every folder below it, sorted, skipping `excluded` trees.
///
/// Subfolders that cannot be listed are logged and pushed to `errors`; only a
/// missing `root` is an error.
pub fn discover_folders(
    root: &Path,
    excluded: &[PathBuf],
    errors: &mut Vec<CoreError>,
) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(CoreError::DirectoryNotFound(root.display().to_string()));
    }

    let excluded: Vec<PathBuf> = excluded.iter().map(|p| canonical_or_raw(p)).collect();
    let mut folders = Vec::new();
    collect_folders(root, &excluded, &mut folders, errors);
    folders.sort();
    Ok(folders)
}

fn collect_folders(
    dir: &Path,
    excluded: &[PathBuf],
    out: &mut Vec<PathBuf>,
    errors: &mut Vec<CoreError>,
) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("cannot list folder {}: {err}", dir.display());
            errors.push(err.into());
            return;
        }
    };

    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(err) => {
                warn!("cannot read entry of {}: {err}", dir.display());
                errors.push(err.into());
                continue;
            }
        };
        if !path.is_dir() {
            continue;
        }
        let resolved = canonical_or_raw(&path);
        if excluded.iter().any(|ex| resolved.starts_with(ex)) {
            continue;
        }
        out.push(path.clone());
        collect_folders(&path, excluded, out, errors);
    }
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Read every export file of `folder` and collapse intra-source duplicates.
///
/// Per-row, per-file and listing problems are pushed to `errors`; they never
/// abort the run.
pub fn normalize_folder(
    folder: &Path,
    format: SourceFormat,
    errors: &mut Vec<CoreError>,
) -> (Vec<ReferenceRecord>, FolderReport) {
    let files = list_files_with_extension(folder, format.extension()).unwrap_or_else(|err| {
        warn!("cannot list export files in {}: {err}", folder.display());
        errors.push(err);
        Vec::new()
    });
    let mut records = Vec::new();
    let mut rows_read = 0usize;

    for (idx, file) in files.iter().enumerate() {
        info!(
            "({}/{}) reading {} export {}",
            idx + 1,
            files.len(),
            format,
            file.display()
        );
        match read_export_file(file, format, errors) {
            Ok((rows, file_records)) => {
                rows_read += rows;
                records.extend(file_records);
            }
            Err(err) => {
                warn!("skipping export file {}: {err}", file.display());
                errors.push(err);
            }
        }
    }

    let dedup = dedup::dedup_within_source(&mut records);
    let report = FolderReport {
        path: folder.to_path_buf(),
        format,
        files_read: files.len(),
        rows_read,
        dedup,
    };
    (records, report)
}

/// Column positions resolved from a file's header row.
struct ColumnIndex {
    title: usize,
    year: usize,
    authors: Option<usize>,
    doi: Option<usize>,
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord, format: SourceFormat, path: &Path) -> Result<Self> {
        let fields = format.fields();
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| CoreError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
        };

        Ok(Self {
            title: require(fields.title)?,
            year: require(fields.year)?,
            authors: find(fields.authors),
            doi: find(fields.doi),
        })
    }
}

/// Parse one export file. Returns the number of data rows seen and the valid records.
pub fn read_export_file(
    path: &Path,
    format: SourceFormat,
    errors: &mut Vec<CoreError>,
) -> Result<(usize, Vec<ReferenceRecord>)> {
    let mut reader = ReaderBuilder::new()
        .delimiter(format.delimiter())
        .quoting(format.uses_quoting())
        .flexible(true)
        .from_path(path)?;

    let columns = ColumnIndex::resolve(reader.headers()?, format, path)?;
    let mut rows = 0usize;
    let mut records = Vec::new();

    for result in reader.records() {
        rows += 1;
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                warn!("unreadable row in {}: {err}", path.display());
                errors.push(err.into());
                continue;
            }
        };
        let line = row.position().map_or(rows + 1, |p| p.line() as usize);

        match parse_row(&row, &columns, format, path, line) {
            Ok(record) => records.push(record),
            Err(err) => {
                warn!("{err}");
                errors.push(err);
            }
        }
    }

    Ok((rows, records))
}

fn parse_row(
    row: &StringRecord,
    columns: &ColumnIndex,
    format: SourceFormat,
    path: &Path,
    line: usize,
) -> Result<ReferenceRecord> {
    let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i)).map(str::trim).unwrap_or_default();

    let title = cell(Some(columns.title));
    if title.is_empty() {
        return Err(CoreError::MissingTitle {
            path: path.to_path_buf(),
            row: line,
        });
    }

    let raw_year = cell(Some(columns.year));
    let year = parse_year(raw_year).ok_or_else(|| CoreError::InvalidYear {
        path: path.to_path_buf(),
        row: line,
        value: raw_year.to_string(),
    })?;

    let first_author = format.first_author(cell(columns.authors));
    let doi = Some(cell(columns.doi).to_string());

    Ok(ReferenceRecord::new(path, title, year, first_author, doi))
}

/// Integer years, also accepting the `2021.0` spelling spreadsheets produce.
fn parse_year(raw: &str) -> Option<i32> {
    if let Ok(year) = raw.parse::<i32>() {
        return Some(year);
    }
    let value = raw.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i32::MAX as f64 {
        Some(value as i32)
    } else {
        None
    }
}

/// Build the canonical table from every recognized source folder under `root`.
///
/// Fails only when no folder is recognized or no record survives.
pub fn build_canonical_table(root: &Path, excluded: &[PathBuf]) -> Result<CanonicalTable> {
    let mut report = IngestReport::default();
    let mut records = Vec::new();

    for folder in discover_folders(root, excluded, &mut report.errors)? {
        let name = folder
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let Some(format) = SourceFormat::classify(&name) else {
            warn!("skipping unrecognized source folder {}", folder.display());
            report.skipped_folders.push(folder);
            continue;
        };

        info!("reading {format} references from {}", folder.display());
        let (folder_records, folder_report) =
            normalize_folder(&folder, format, &mut report.errors);
        records.extend(folder_records);
        report.folders.push(folder_report);
    }

    if report.folders.is_empty() {
        return Err(CoreError::NoSourceFolders(root.display().to_string()));
    }

    info!("unifying {} reference lists", report.folders.len());
    report.global_dedup = Some(dedup::dedup_by_title(&mut records));
    dedup::sort_by_year_and_title(&mut records);

    if records.is_empty() {
        return Err(CoreError::EmptyTable);
    }

    Ok(CanonicalTable { records, report })
}
