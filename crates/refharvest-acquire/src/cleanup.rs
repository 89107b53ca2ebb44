use std::path::{Path, PathBuf};

use refharvest_core::fs_ops::{file_size, move_file, reset_directory};
use refharvest_core::{AppConfig, ReferenceRecord};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::compress::{CompressionLevel, DocumentCompressor};
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrepareReport {
    pub reset: bool,
    pub removed_files: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompressionReport {
    pub evaluated: usize,
    pub replaced: usize,
    pub kept_original: usize,
    pub failed: usize,
    pub bytes_saved: u64,
}

enum Verdict {
    Replaced(u64),
    KeptOriginal,
    Failed,
}

/// Owns the documents directory: resets it before acquisition and runs the
/// size-gated compression pass afterwards.
pub struct CleanupCoordinator<'a> {
    compressor: &'a dyn DocumentCompressor,
    documents_dir: PathBuf,
    compress_dir: PathBuf,
    reset_directories: bool,
    level: CompressionLevel,
}

impl<'a> CleanupCoordinator<'a> {
    pub fn new(config: &AppConfig, compressor: &'a dyn DocumentCompressor) -> Self {
        Self {
            compressor,
            documents_dir: config.documents_dir(),
            compress_dir: config.compress_dir(),
            reset_directories: config.cleanup.reset_directories,
            level: CompressionLevel::new(config.cleanup.quality),
        }
    }

    pub fn prepare_directories(&self) -> Result<PrepareReport> {
        let mut report = PrepareReport {
            reset: self.reset_directories,
            ..Default::default()
        };

        if self.reset_directories {
            for dir in [&self.documents_dir, &self.compress_dir] {
                let reset = reset_directory(dir, true)?;
                report.removed_files += reset.removed_files;
                report.errors.extend(reset.errors);
            }
            info!(
                "reset {} ({} files removed)",
                self.documents_dir.display(),
                report.removed_files
            );
        } else {
            std::fs::create_dir_all(&self.compress_dir)?;
            debug!("keeping existing documents in {}", self.documents_dir.display());
        }
        Ok(report)
    }

    /// Compress every stored document, keeping the candidate only when it is
    /// strictly smaller than the original.
    pub fn compress_documents(&self, records: &[ReferenceRecord]) -> Result<CompressionReport> {
        std::fs::create_dir_all(&self.compress_dir)?;
        let mut report = CompressionReport::default();

        let documents: Vec<&Path> = records
            .iter()
            .filter_map(|r| r.document_path.as_deref())
            .filter(|p| p.is_file())
            .collect();
        let total = documents.len();

        for (position, original) in documents.into_iter().enumerate() {
            report.evaluated += 1;
            match self.compress_one(original) {
                Verdict::Replaced(saved) => {
                    report.replaced += 1;
                    report.bytes_saved += saved;
                    info!("({}/{total}) compressed {} (-{saved} bytes)", position + 1, original.display());
                }
                Verdict::KeptOriginal => {
                    report.kept_original += 1;
                    debug!("({}/{total}) kept original {}", position + 1, original.display());
                }
                Verdict::Failed => report.failed += 1,
            }
        }

        info!(
            "compression with {}: {} replaced, {} kept, {} failed, {} bytes saved",
            self.compressor.name(),
            report.replaced,
            report.kept_original,
            report.failed,
            report.bytes_saved
        );
        Ok(report)
    }

    fn compress_one(&self, original: &Path) -> Verdict {
        let Some(file_name) = original.file_name() else {
            return Verdict::Failed;
        };
        let candidate = self.compress_dir.join(file_name);

        if let Err(e) = self.compressor.compress_document(original, &candidate, self.level) {
            warn!("cannot compress {}: {e}", original.display());
            discard(&candidate);
            return Verdict::Failed;
        }

        let (Some(before), Some(after)) = (file_size(original), file_size(&candidate)) else {
            warn!("no compressed output for {}", original.display());
            discard(&candidate);
            return Verdict::Failed;
        };

        if after >= before {
            discard(&candidate);
            return Verdict::KeptOriginal;
        }

        match move_file(&candidate, original, true) {
            Ok(true) => Verdict::Replaced(before - after),
            Ok(false) => {
                discard(&candidate);
                Verdict::KeptOriginal
            }
            Err(e) => {
                warn!("cannot replace {}: {e}", original.display());
                discard(&candidate);
                Verdict::Failed
            }
        }
    }
}

fn discard(path: &Path) {
    if path.exists()
        && let Err(e) = std::fs::remove_file(path)
    {
        warn!("cannot remove {}: {e}", path.display());
    }
}
