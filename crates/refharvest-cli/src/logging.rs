use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use refharvest_core::config::LoggingConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// `<log_dir>/<YYYY-mm-dd_HH-MM-SS>.log`
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    log_dir.join(format!("{stamp}.log"))
}

/// Install the stderr layer and, when enabled, a per-run log file.
///
/// `RUST_LOG` overrides the stderr level. Returns the log file path.
pub fn init(config: &LoggingConfig, log_dir: &Path) -> Result<Option<PathBuf>> {
    let filter = stderr_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok(), &config.level);
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    let (file_layer, file_path) = if config.file {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("cannot create log directory {}", log_dir.display()))?;
        let path = log_file_path(log_dir);
        let file = File::create(&path)
            .with_context(|| format!("cannot create log file {}", path.display()))?;
        let layer = fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_filter(EnvFilter::new(&config.file_level));
        (Some(layer), Some(path))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;
    Ok(file_path)
}

/// Directives from `RUST_LOG` win when they parse; otherwise the configured level.
fn stderr_filter(from_env: Option<String>, level: &str) -> EnvFilter {
    from_env
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}
