use std::path::PathBuf;

use thiserror::Error;

/// All errors that can occur in refharvest-core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Directory does not exist: {0}")]
    DirectoryNotFound(String),

    #[error("No recognized source folder under {0}")]
    NoSourceFolders(String),

    #[error("No reference record survived ingestion")]
    EmptyTable,

    #[error("Missing column {column:?} in {}", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("Invalid year {value:?} at {}:{row}", path.display())]
    InvalidYear {
        path: PathBuf,
        row: usize,
        value: String,
    },

    #[error("Missing title at {}:{row}", path.display())]
    MissingTitle { path: PathBuf, row: usize },

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl CoreError {
    /// Errors scoped to a single row or file. The run keeps going after these.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            Self::MissingColumn { .. }
                | Self::InvalidYear { .. }
                | Self::MissingTitle { .. }
                | Self::Csv(_)
        )
    }
}

/// Process exit codes for the CLI.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NoInput = 2,
    InvalidConfig = 3,
    FileSystemError = 4,
    NetworkError = 6,
}

impl From<&CoreError> for ExitCode {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::NoSourceFolders(_) | CoreError::EmptyTable | CoreError::DirectoryNotFound(_) => {
                Self::NoInput
            }
            CoreError::ConfigError(_) | CoreError::TomlParse(_) | CoreError::TomlSerialize(_) => {
                Self::InvalidConfig
            }
            CoreError::Io(_) | CoreError::Checkpoint(_) => Self::FileSystemError,
            _ => Self::GeneralError,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
