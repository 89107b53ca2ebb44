use std::path::Path;
use std::process::Command;

use super::{CompressionLevel, DocumentCompressor};
use crate::error::{AcquireError, Result};

/// Re-distills a PDF through the Ghostscript `pdfwrite` device.
#[derive(Debug, Clone)]
pub struct GhostscriptCompressor {
    pub binary: String,
}

impl Default for GhostscriptCompressor {
    fn default() -> Self {
        Self {
            binary: "gs".to_string(),
        }
    }
}

pub(crate) fn pdf_settings(level: CompressionLevel) -> &'static str {
    match level.value() {
        0 => "/default",
        1 => "/prepress",
        2 => "/printer",
        3 => "/ebook",
        _ => "/screen",
    }
}

impl DocumentCompressor for GhostscriptCompressor {
    fn name(&self) -> &str {
        "ghostscript"
    }

    fn compress_document(&self, input: &Path, output: &Path, level: CompressionLevel) -> Result<()> {
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let status = Command::new(&self.binary)
            .arg("-sDEVICE=pdfwrite")
            .arg("-dCompatibilityLevel=1.4")
            .arg(format!("-dPDFSETTINGS={}", pdf_settings(level)))
            .arg("-dNOPAUSE")
            .arg("-dQUIET")
            .arg("-dBATCH")
            .arg(format!("-sOutputFile={}", output.display()))
            .arg(input)
            .status()
            .map_err(|err| {
                AcquireError::Compression(format!("cannot run {}: {err}", self.binary))
            })?;

        if !status.success() {
            return Err(AcquireError::Compression(format!(
                "{} exited with {status} for {}",
                self.binary,
                input.display()
            )));
        }
        Ok(())
    }
}
