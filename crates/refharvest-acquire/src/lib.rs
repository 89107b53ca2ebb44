//! refharvest acquisition: document fetch backends, the acquisition
//! orchestrator, PDF compression and the pipeline driver tying them to the
//! canonical table from `refharvest-core`.

pub mod acquisition;
pub mod cleanup;
pub mod compress;
pub mod error;
pub mod http;
pub mod identifier;
pub mod pipeline;
pub mod sources;

pub use acquisition::{AcquisitionOrchestrator, AcquisitionPolicy, AcquisitionReport};
pub use cleanup::{CleanupCoordinator, CompressionReport, PrepareReport};
pub use compress::{CompressionLevel, DocumentCompressor, compressor_for};
pub use error::{AcquireError, Result};
pub use identifier::{Doi, Identifier, IdentifierKind};
pub use pipeline::{IngestSummary, Pipeline, RunSummary, TableStatus, inherit_documents, read_checkpoint};
pub use sources::{DocumentFetcher, SciHubFetcher};
