use std::path::Path;

use lopdf::Document;

use super::{CompressionLevel, DocumentCompressor};
use crate::error::{AcquireError, Result};

/// Lossless structural compression: drop unreferenced objects and deflate streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfCompressor;

impl DocumentCompressor for LopdfCompressor {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn compress_document(&self, input: &Path, output: &Path, _level: CompressionLevel) -> Result<()> {
        let mut document = Document::load(input).map_err(|err| {
            AcquireError::Compression(format!("lopdf failed to open {}: {err}", input.display()))
        })?;

        document.prune_objects();
        document.delete_zero_length_streams();
        document.renumber_objects();
        document.compress();

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        document.save(output).map_err(|err| {
            AcquireError::Compression(format!("lopdf failed to write {}: {err}", output.display()))
        })?;
        Ok(())
    }
}
