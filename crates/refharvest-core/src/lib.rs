//! refharvest core: canonical reference records, source export formats,
//! duplicate elimination and the checkpoint table.

pub mod checkpoint;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fs_ops;
pub mod ingest;
pub mod models;
pub mod naming;

pub use checkpoint::{CheckpointLayout, checkpoint_is_valid, load_checkpoint, save_checkpoint};
pub use config::{AcquisitionConfig, AppConfig, CleanupConfig, CompressionBackend};
pub use dedup::{DedupReport, DedupStrategy, normalize_title};
pub use error::{CoreError, ExitCode, Result};
pub use ingest::{CanonicalTable, IngestReport, build_canonical_table};
pub use models::*;
