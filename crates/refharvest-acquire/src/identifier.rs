use std::fmt;

use refharvest_core::ReferenceRecord;

use crate::error::{AcquireError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Doi {
    pub raw: String,
    pub normalized: String,
}

impl Doi {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        const PREFIXES: [&str; 6] = [
            "https://doi.org/",
            "http://doi.org/",
            "https://dx.doi.org/",
            "http://dx.doi.org/",
            "doi:",
            "DOI:",
        ];
        let stripped = PREFIXES
            .iter()
            .find_map(|prefix| input.strip_prefix(prefix))
            .map(str::trim_start)
            .unwrap_or(input);

        // Must start with "10.", contain "/", and have a non-empty suffix
        if !stripped.starts_with("10.") {
            return Err(AcquireError::InvalidDoi(input.to_string()));
        }
        let slash_pos = stripped
            .find('/')
            .ok_or_else(|| AcquireError::InvalidDoi(input.to_string()))?;
        if stripped[slash_pos + 1..].is_empty() {
            return Err(AcquireError::InvalidDoi(input.to_string()));
        }

        Ok(Self {
            raw: input.to_string(),
            normalized: stripped.to_lowercase(),
        })
    }
}

/// What a document lookup is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Doi,
    Title,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Doi => "doi",
            Self::Title => "title",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub kind: IdentifierKind,
    pub value: String,
}

impl Identifier {
    pub fn doi(value: impl Into<String>) -> Self {
        Self {
            kind: IdentifierKind::Doi,
            value: value.into(),
        }
    }

    pub fn title(value: impl Into<String>) -> Self {
        Self {
            kind: IdentifierKind::Title,
            value: value.into(),
        }
    }

    /// Lookups to try for a record, most specific first.
    pub fn candidates(record: &ReferenceRecord, title_fallback: bool) -> Vec<Self> {
        match record.doi() {
            Some(doi) if title_fallback => vec![Self::doi(doi), Self::title(&record.title)],
            Some(doi) => vec![Self::doi(doi)],
            None => vec![Self::title(&record.title)],
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.kind, self.value)
    }
}
