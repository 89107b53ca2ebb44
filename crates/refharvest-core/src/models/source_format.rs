use std::fmt;

use serde::{Deserialize, Serialize};

use super::record::UNKNOWN_AUTHOR;

/// Citation databases whose exports can be ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceFormat {
    WoS,
    Scopus,
    Ieee,
}

/// Native column names of the fields the canonical record consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub title: &'static str,
    pub year: &'static str,
    pub authors: &'static str,
    pub doi: &'static str,
}

const WOS_FIELDS: FieldMapping = FieldMapping {
    title: "TI",
    year: "PY",
    authors: "AU",
    doi: "DI",
};

const SCOPUS_FIELDS: FieldMapping = FieldMapping {
    title: "Title",
    year: "Year",
    authors: "Authors",
    doi: "DOI",
};

const IEEE_FIELDS: FieldMapping = FieldMapping {
    title: "Document Title",
    year: "Publication Year",
    authors: "Authors",
    doi: "DOI",
};

const SCOPUS_NO_AUTHOR: &str = "[No author name available]";

impl SourceFormat {
    pub const ALL: [SourceFormat; 3] = [Self::WoS, Self::Scopus, Self::Ieee];

    /// Classify an export folder by a case-insensitive substring of its name.
    pub fn classify(folder_name: &str) -> Option<Self> {
        let name = folder_name.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| name.contains(format.tag()))
    }

    /// Lowercase tag matched against folder names.
    pub fn tag(self) -> &'static str {
        match self {
            Self::WoS => "wos",
            Self::Scopus => "scopus",
            Self::Ieee => "ieee",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::WoS => "txt",
            Self::Scopus | Self::Ieee => "csv",
        }
    }

    pub fn delimiter(self) -> u8 {
        match self {
            Self::WoS => b'\t',
            Self::Scopus | Self::Ieee => b',',
        }
    }

    /// WoS tab exports leave quotes inside titles unescaped.
    pub fn uses_quoting(self) -> bool {
        !matches!(self, Self::WoS)
    }

    pub fn fields(self) -> &'static FieldMapping {
        match self {
            Self::WoS => &WOS_FIELDS,
            Self::Scopus => &SCOPUS_FIELDS,
            Self::Ieee => &IEEE_FIELDS,
        }
    }

    /// Reduce a raw author list to a single first-author name.
    pub fn first_author(self, raw: &str) -> String {
        let raw = raw.trim();
        let author = match self {
            Self::WoS => raw.split(", ").next().unwrap_or_default(),
            Self::Scopus => {
                if raw == SCOPUS_NO_AUTHOR {
                    UNKNOWN_AUTHOR
                } else {
                    raw.split(", ").next().unwrap_or_default()
                }
            }
            // "J. A. Smith; B. Jones" -> "Smith"
            Self::Ieee => raw
                .split("; ")
                .next()
                .and_then(|first| first.split(". ").last())
                .unwrap_or_default(),
        };

        let author = author.trim();
        if author.is_empty() {
            UNKNOWN_AUTHOR.to_string()
        } else {
            author.to_string()
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::WoS => "WoS",
            Self::Scopus => "Scopus",
            Self::Ieee => "IEEE",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_folder_name() {
        assert_eq!(SourceFormat::classify("wos"), Some(SourceFormat::WoS));
        assert_eq!(SourceFormat::classify("export_Scopus_2023"), Some(SourceFormat::Scopus));
        assert_eq!(SourceFormat::classify("IEEE-xplore"), Some(SourceFormat::Ieee));
        assert_eq!(SourceFormat::classify("pubmed"), None);
    }

    #[test]
    fn wos_first_author() {
        assert_eq!(SourceFormat::WoS.first_author("Smith, J; Doe, A"), "Smith");
    }

    #[test]
    fn scopus_first_author_and_placeholder() {
        assert_eq!(
            SourceFormat::Scopus.first_author("Garcia J., Lopez M."),
            "Garcia J."
        );
        assert_eq!(
            SourceFormat::Scopus.first_author("Garcia J., Lopez M., Chen W."),
            "Garcia J."
        );
        assert_eq!(
            SourceFormat::Scopus.first_author("[No author name available]"),
            "unknown"
        );
    }

    #[test]
    fn ieee_first_author_strips_initials() {
        assert_eq!(SourceFormat::Ieee.first_author("J. A. Smith; B. Jones"), "Smith");
        assert_eq!(SourceFormat::Ieee.first_author("Madonna"), "Madonna");
    }

    #[test]
    fn empty_author_becomes_unknown() {
        for format in SourceFormat::ALL {
            assert_eq!(format.first_author("  "), "unknown");
        }
    }

    #[test]
    fn format_layouts() {
        assert_eq!(SourceFormat::WoS.delimiter(), b'\t');
        assert_eq!(SourceFormat::WoS.extension(), "txt");
        assert_eq!(SourceFormat::Ieee.fields().title, "Document Title");
        assert!(!SourceFormat::WoS.uses_quoting());
    }
}
