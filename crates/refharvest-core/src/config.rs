use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Root application configuration, loaded from `~/.config/refharvest/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub acquisition: AcquisitionConfig,
    pub cleanup: CleanupConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root holding one sub-folder per citation database export.
    pub resources_dir: String,
    pub documents_dir: String,
    /// Scratch folder for compression candidates, relative to `documents_dir`.
    pub compress_subdir: String,
    /// Checkpoint file name, relative to `resources_dir`.
    pub checkpoint_file: String,
    pub log_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Artifacts at or below this size are failure placeholders, not documents.
    pub viability_threshold_bytes: u64,
    pub max_file_stem_len: usize,
    /// Retry by title when a DOI lookup yields nothing usable.
    pub title_fallback: bool,
    pub concurrency: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    pub mirrors: Vec<String>,
    pub request_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub user_agent: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionBackend {
    Lopdf,
    Ghostscript,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Wipe and recreate the document folders before acquisition.
    pub reset_directories: bool,
    pub compress: bool,
    pub backend: CompressionBackend,
    /// 0 (least aggressive) to 4 (smallest output).
    pub quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: bool,
    pub file_level: String,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            resources_dir: "res".to_string(),
            documents_dir: "res/docs".to_string(),
            compress_subdir: "compress".to_string(),
            checkpoint_file: "result_query.csv".to_string(),
            log_dir: "log".to_string(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            viability_threshold_bytes: 200,
            max_file_stem_len: 40,
            title_fallback: true,
            concurrency: 1,
            proxy: None,
            mirrors: Vec::new(),
            request_interval_ms: 2000,
            request_timeout_secs: 60,
            max_retries: 2,
            user_agent: format!("refharvest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            reset_directories: true,
            compress: true,
            backend: CompressionBackend::Lopdf,
            quality: 3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: true,
            file_level: "warn".to_string(),
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/refharvest/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("REFHARVEST_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("refharvest")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.acquisition.concurrency == 0 {
            return Err(CoreError::ConfigError(
                "acquisition.concurrency must be at least 1".to_string(),
            ));
        }
        if self.acquisition.max_file_stem_len == 0 {
            return Err(CoreError::ConfigError(
                "acquisition.max_file_stem_len must be at least 1".to_string(),
            ));
        }
        if self.cleanup.quality > 4 {
            return Err(CoreError::ConfigError(format!(
                "cleanup.quality must be between 0 and 4, got {}",
                self.cleanup.quality
            )));
        }
        if self.paths.compress_subdir.trim().is_empty() {
            return Err(CoreError::ConfigError(
                "paths.compress_subdir must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    // ─── Derived paths ─────────────────────────────────────

    pub fn resources_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.resources_dir)
    }

    pub fn documents_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.documents_dir)
    }

    pub fn compress_dir(&self) -> PathBuf {
        self.documents_dir().join(&self.paths.compress_subdir)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.resources_dir().join(&self.paths.checkpoint_file)
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.log_dir)
    }
}
