use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dedup::normalize_title;

/// Placeholder used when an export carries no usable author name.
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// One publication, normalized to the attributes every export format shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// Export file the row was read from.
    pub source_path: PathBuf,
    pub title: String,
    pub year: i32,
    pub first_author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    /// Set once a viable document has been stored for this record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_path: Option<PathBuf>,
}

impl ReferenceRecord {
    pub fn new(
        source_path: impl Into<PathBuf>,
        title: impl Into<String>,
        year: i32,
        first_author: impl Into<String>,
        doi: Option<String>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            title: title.into(),
            year,
            first_author: first_author.into(),
            doi: doi
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            document_path: None,
        }
    }

    /// The global uniqueness key of the canonical table.
    pub fn title_key(&self) -> String {
        normalize_title(&self.title)
    }

    /// DOI when present and non-blank.
    pub fn doi(&self) -> Option<&str> {
        self.doi
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// True when a document path is recorded and the file is still on disk.
    pub fn has_document(&self) -> bool {
        self.document_path
            .as_deref()
            .is_some_and(Path::is_file)
    }

    /// Key for intra-source comparison: every canonical column except provenance.
    pub(crate) fn content_key(&self) -> (&str, i32, &str, Option<&str>) {
        (&self.title, self.year, &self.first_author, self.doi())
    }
}
