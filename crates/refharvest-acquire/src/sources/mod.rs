use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::identifier::Identifier;

pub mod scihub;

pub use scihub::SciHubFetcher;

/// A backend able to store the document behind an identifier at `destination`.
///
/// `Ok(())` only means the backend believes it wrote something; the caller
/// still checks that the artifact is viable.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_document(&self, identifier: &Identifier, destination: &Path) -> Result<()>;
}
