use std::path::Path;

use refharvest_core::{CleanupConfig, CompressionBackend};

use crate::error::Result;

mod ghostscript;
pub(crate) mod lopdf_backend;

pub use ghostscript::GhostscriptCompressor;
pub use lopdf_backend::LopdfCompressor;

/// Compression aggressiveness, 0 (gentlest) to 4 (smallest output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub const MAX: u8 = 4;

    pub fn new(level: u8) -> Self {
        Self(level.min(Self::MAX))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(3)
    }
}

/// A backend writing a (hopefully) smaller encoding of `input` to `output`.
///
/// The caller decides whether the result is kept.
pub trait DocumentCompressor: Send + Sync {
    fn name(&self) -> &str;

    fn compress_document(&self, input: &Path, output: &Path, level: CompressionLevel) -> Result<()>;
}

pub fn compressor_for(config: &CleanupConfig) -> Box<dyn DocumentCompressor> {
    match config.backend {
        CompressionBackend::Lopdf => Box::new(LopdfCompressor),
        CompressionBackend::Ghostscript => Box::new(GhostscriptCompressor::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_is_clamped() {
        assert_eq!(CompressionLevel::new(9).value(), 4);
        assert_eq!(CompressionLevel::default().value(), 3);
    }

    #[test]
    fn backend_selection_follows_config() {
        let mut config = CleanupConfig::default();
        assert_eq!(compressor_for(&config).name(), "lopdf");
        config.backend = CompressionBackend::Ghostscript;
        assert_eq!(compressor_for(&config).name(), "ghostscript");
    }
}
