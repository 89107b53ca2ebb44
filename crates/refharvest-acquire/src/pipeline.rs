//! End-to-end driver: ingest, checkpoint, prepare, acquire, compress.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use refharvest_core::dedup::DedupReport;
use refharvest_core::ingest::FolderReport;
use refharvest_core::{
    AppConfig, CanonicalTable, CheckpointLayout, CoreError, ReferenceRecord, build_canonical_table,
    checkpoint_is_valid, load_checkpoint, save_checkpoint,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::acquisition::{AcquisitionOrchestrator, AcquisitionPolicy, AcquisitionReport};
use crate::cleanup::{CleanupCoordinator, CompressionReport, PrepareReport};
use crate::compress::{DocumentCompressor, compressor_for};
use crate::error::Result;
use crate::sources::{DocumentFetcher, SciHubFetcher};

/// Serializable view of an ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub records: usize,
    pub rows_read: usize,
    pub folders: Vec<FolderReport>,
    pub skipped_folders: Vec<PathBuf>,
    pub rejected: Vec<String>,
    pub global_dedup: Option<DedupReport>,
}

impl From<&CanonicalTable> for IngestSummary {
    fn from(table: &CanonicalTable) -> Self {
        Self {
            records: table.records.len(),
            rows_read: table.report.rows_read(),
            folders: table.report.folders.clone(),
            skipped_folders: table.report.skipped_folders.clone(),
            rejected: table.report.errors.iter().map(ToString::to_string).collect(),
            global_dedup: table.report.global_dedup,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub ingest: IngestSummary,
    /// Documents carried over from the previous checkpoint.
    pub inherited: usize,
    pub prepare: PrepareReport,
    pub acquisition: AcquisitionReport,
    pub compression: Option<CompressionReport>,
    pub checkpoint: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableStatus {
    pub total: usize,
    pub acquired: usize,
    pub unacquired: usize,
}

impl TableStatus {
    pub fn of(records: &[ReferenceRecord]) -> Self {
        let acquired = records.iter().filter(|r| r.has_document()).count();
        Self {
            total: records.len(),
            acquired,
            unacquired: records.len() - acquired,
        }
    }
}

/// Copy `document_path` from `previous` into `records` for matching normalized
/// titles whose file still exists. Returns how many records inherited one.
pub fn inherit_documents(records: &mut [ReferenceRecord], previous: &[ReferenceRecord]) -> usize {
    let known: HashMap<String, PathBuf> = previous
        .iter()
        .filter(|r| r.has_document())
        .filter_map(|r| Some((r.title_key(), r.document_path.clone()?)))
        .collect();

    let mut inherited = 0;
    for record in records.iter_mut().filter(|r| r.document_path.is_none()) {
        if let Some(path) = known.get(&record.title_key()) {
            record.document_path = Some(path.clone());
            inherited += 1;
        }
    }
    inherited
}

pub struct Pipeline {
    config: AppConfig,
    fetcher: Arc<dyn DocumentFetcher>,
    compressor: Box<dyn DocumentCompressor>,
}

impl Pipeline {
    pub fn new(
        config: AppConfig,
        fetcher: Arc<dyn DocumentFetcher>,
        compressor: Box<dyn DocumentCompressor>,
    ) -> Self {
        Self {
            config,
            fetcher,
            compressor,
        }
    }

    /// Pipeline with the Sci-Hub fetcher and the configured compression backend.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let fetcher = Arc::new(SciHubFetcher::from_config(&config.acquisition)?);
        let compressor = compressor_for(&config.cleanup);
        Ok(Self::new(config, fetcher, compressor))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Build the canonical table and write the first checkpoint.
    pub fn ingest(&self) -> Result<CanonicalTable> {
        let root = self.config.resources_dir();
        let table = build_canonical_table(&root, &[self.config.documents_dir()])?;

        if !table.report.errors.is_empty() {
            warn!("{} rows or files were rejected during ingestion", table.report.errors.len());
        }
        save_checkpoint(&self.config.checkpoint_path(), &table.records, CheckpointLayout::Ingested)?;
        info!(
            "{} records written to {}",
            table.records.len(),
            self.config.checkpoint_path().display()
        );
        Ok(table)
    }

    pub fn load_checkpoint(&self) -> Result<Vec<ReferenceRecord>> {
        read_checkpoint(&self.config.checkpoint_path())
    }

    pub fn prepare(&self) -> Result<PrepareReport> {
        CleanupCoordinator::new(&self.config, self.compressor.as_ref()).prepare_directories()
    }

    /// Acquire missing documents; the checkpoint always ends up with the `DOC path` column.
    pub async fn acquire(&self, records: &mut [ReferenceRecord]) -> Result<AcquisitionReport> {
        let orchestrator = AcquisitionOrchestrator::new(
            self.fetcher.as_ref(),
            AcquisitionPolicy::from(&self.config.acquisition),
            self.config.documents_dir(),
            self.config.checkpoint_path(),
        );
        let report = orchestrator.acquire_all(records).await?;
        save_checkpoint(&self.config.checkpoint_path(), records, CheckpointLayout::WithDocuments)?;
        Ok(report)
    }

    pub fn compress(&self, records: &[ReferenceRecord]) -> Result<CompressionReport> {
        CleanupCoordinator::new(&self.config, self.compressor.as_ref()).compress_documents(records)
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let checkpoint = self.config.checkpoint_path();
        let previous = self.previous_records();

        let mut table = self.ingest()?;
        let ingest = IngestSummary::from(&table);

        let inherited = match &previous {
            Some(previous) => inherit_documents(&mut table.records, previous),
            None => 0,
        };
        if inherited > 0 {
            info!("resuming with {inherited} documents from the previous run");
            save_checkpoint(&checkpoint, &table.records, CheckpointLayout::WithDocuments)?;
        }

        let prepare = self.prepare()?;
        let acquisition = self.acquire(&mut table.records).await?;

        let compression = if self.config.cleanup.compress {
            Some(self.compress(&table.records)?)
        } else {
            None
        };

        save_checkpoint(&checkpoint, &table.records, CheckpointLayout::WithDocuments)?;
        if !checkpoint_is_valid(&checkpoint) {
            return Err(CoreError::Checkpoint(format!("{} is missing or empty", checkpoint.display())).into());
        }

        Ok(RunSummary {
            ingest,
            inherited,
            prepare,
            acquisition,
            compression,
            checkpoint,
        })
    }

    /// The last checkpoint, when documents survive between runs.
    fn previous_records(&self) -> Option<Vec<ReferenceRecord>> {
        if self.config.cleanup.reset_directories {
            return None;
        }
        let path = self.config.checkpoint_path();
        if !checkpoint_is_valid(&path) {
            return None;
        }
        match load_checkpoint(&path) {
            Ok(records) => Some(records),
            Err(e) => {
                warn!("ignoring unreadable checkpoint {}: {e}", path.display());
                None
            }
        }
    }
}

/// Load a checkpoint without building a pipeline; a missing or empty file is an error.
pub fn read_checkpoint(path: &Path) -> Result<Vec<ReferenceRecord>> {
    if !checkpoint_is_valid(path) {
        return Err(CoreError::Checkpoint(format!("no checkpoint at {}", path.display())).into());
    }
    Ok(load_checkpoint(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::tests::{FakeFetcher, pdf_bytes};
    use crate::compress::LopdfCompressor;
    use crate::compress::lopdf_backend::tests::write_sample_pdf;
    use crate::error::AcquireError;
    use std::path::Path;
    use tempfile::TempDir;

    const WOS_HEADER: &str = "PT\tAU\tTI\tPY\tDI\n";
    const SCOPUS_HEADER: &str = "Authors,Title,Year,DOI,Source\n";

    fn workspace() -> (TempDir, AppConfig) {
        let dir = TempDir::new().unwrap();
        let res = dir.path().join("res");
        std::fs::create_dir_all(res.join("wos")).unwrap();
        std::fs::create_dir_all(res.join("scopus")).unwrap();
        std::fs::write(
            res.join("wos").join("savedrecs.txt"),
            format!(
                "{WOS_HEADER}J\tZhou, J\tDeep Learning Systems\t2020\t10.1000/dls\n\
                 J\tLi, K\tAttention Mechanisms\t2019\t10.1000/att\n"
            ),
        )
        .unwrap();
        std::fs::write(
            res.join("scopus").join("scopus.csv"),
            format!(
                "{SCOPUS_HEADER}\"Zhou J.\",\"deep learning systems\",2020,10.1000/dls,Journal\n\
                 \"Garcia J.\",\"Graph Neural Networks\",2021,,Journal\n"
            ),
        )
        .unwrap();

        let mut config = AppConfig::default();
        config.paths.resources_dir = res.to_string_lossy().to_string();
        config.paths.documents_dir = res.join("docs").to_string_lossy().to_string();
        (dir, config)
    }

    fn sample_pdf(dir: &Path) -> Vec<u8> {
        let path = dir.join("sample.pdf");
        write_sample_pdf(&path, 300);
        std::fs::read(path).unwrap()
    }

    fn pipeline(config: AppConfig, fetcher: Arc<FakeFetcher>) -> Pipeline {
        Pipeline::new(config, fetcher, Box::new(LopdfCompressor))
    }

    #[test]
    fn ingest_collapses_cross_source_duplicates() {
        let (_dir, config) = workspace();
        let checkpoint = config.checkpoint_path();
        let pipeline = pipeline(config, Arc::new(FakeFetcher::default()));

        let table = pipeline.ingest().unwrap();

        let titles: Vec<_> = table.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["Attention Mechanisms", "deep learning systems", "Graph Neural Networks"]);
        assert!(checkpoint_is_valid(&checkpoint));
    }

    #[tokio::test]
    async fn full_run_acquires_and_compresses() {
        let (dir, config) = workspace();
        let pdf = sample_pdf(dir.path());
        let fetcher = Arc::new(
            FakeFetcher::default()
                .with("10.1000/dls", pdf.clone())
                .with("Graph Neural Networks", pdf.clone()),
        );
        let pipeline = pipeline(config, fetcher.clone());

        let summary = pipeline.run().await.unwrap();

        assert_eq!(summary.ingest.records, 3);
        assert_eq!(summary.acquisition.acquired, 2);
        assert_eq!(summary.acquisition.unacquired_ids, vec![0]);
        let compression = summary.compression.unwrap();
        assert_eq!(compression.evaluated, 2);
        assert_eq!(compression.replaced, 2);

        let records = pipeline.load_checkpoint().unwrap();
        let status = TableStatus::of(&records);
        assert_eq!(status, TableStatus { total: 3, acquired: 2, unacquired: 1 });
        for record in records.iter().filter(|r| r.has_document()) {
            let size = std::fs::metadata(record.document_path.as_ref().unwrap()).unwrap().len();
            assert!(size < pdf.len() as u64);
        }
    }

    #[tokio::test]
    async fn kept_documents_are_inherited_on_rerun() {
        let (_dir, mut config) = workspace();
        config.cleanup.reset_directories = false;
        config.cleanup.compress = false;
        let fetcher = Arc::new(
            FakeFetcher::default()
                .with("10.1000/dls", pdf_bytes(400))
                .with("10.1000/att", pdf_bytes(400))
                .with("Graph Neural Networks", pdf_bytes(400)),
        );
        let pipeline = pipeline(config, fetcher.clone());

        pipeline.run().await.unwrap();
        assert_eq!(fetcher.calls(), 3);

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.inherited, 3);
        assert_eq!(summary.acquisition.attempted, 0);
        assert_eq!(fetcher.calls(), 3);
    }

    /// Fails every lookup after counting the stored documents in the checkpoint.
    struct CheckpointWatcher {
        checkpoint: PathBuf,
        seen: std::sync::Mutex<Vec<usize>>,
    }

    #[async_trait::async_trait]
    impl DocumentFetcher for CheckpointWatcher {
        fn name(&self) -> &str {
            "watcher"
        }

        async fn fetch_document(&self, identifier: &crate::identifier::Identifier, _destination: &Path) -> Result<()> {
            let stored = load_checkpoint(&self.checkpoint)
                .map(|records| records.iter().filter(|r| r.document_path.is_some()).count())
                .unwrap_or(0);
            self.seen.lock().unwrap().push(stored);
            Err(AcquireError::DocumentNotFound(identifier.value.clone()))
        }
    }

    #[tokio::test]
    async fn inherited_documents_are_checkpointed_before_acquisition() {
        let (_dir, mut config) = workspace();
        config.cleanup.reset_directories = false;
        config.cleanup.compress = false;
        let checkpoint = config.checkpoint_path();

        let first = Arc::new(FakeFetcher::default().with("10.1000/att", pdf_bytes(400)));
        let summary = pipeline(config.clone(), first).run().await.unwrap();
        assert_eq!(summary.acquisition.acquired, 1);

        let watcher = Arc::new(CheckpointWatcher {
            checkpoint,
            seen: std::sync::Mutex::new(Vec::new()),
        });
        let rerun = Pipeline::new(config, watcher.clone(), Box::new(LopdfCompressor));
        let summary = rerun.run().await.unwrap();

        assert_eq!(summary.inherited, 1);
        let seen = watcher.seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|stored| *stored == 1), "{seen:?}");
    }

    #[tokio::test]
    async fn reset_run_refetches_everything() {
        let (_dir, mut config) = workspace();
        config.cleanup.compress = false;
        let fetcher = Arc::new(FakeFetcher::default().with("10.1000/att", pdf_bytes(400)));
        let pipeline = pipeline(config, fetcher.clone());

        pipeline.run().await.unwrap();
        let summary = pipeline.run().await.unwrap();

        assert_eq!(summary.inherited, 0);
        assert_eq!(summary.prepare.removed_files, 1);
        assert_eq!(summary.acquisition.acquired, 1);
    }

    #[tokio::test]
    async fn missing_sources_fail_the_run() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.paths.resources_dir = dir.path().to_string_lossy().to_string();
        config.paths.documents_dir = dir.path().join("docs").to_string_lossy().to_string();
        let pipeline = pipeline(config, Arc::new(FakeFetcher::default()));

        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, AcquireError::Core(CoreError::NoSourceFolders(_))));
    }

    #[test]
    fn load_without_checkpoint_is_an_error() {
        let (_dir, config) = workspace();
        let pipeline = pipeline(config, Arc::new(FakeFetcher::default()));

        let err = pipeline.load_checkpoint().unwrap_err();

        assert!(matches!(err, AcquireError::Core(CoreError::Checkpoint(_))));
    }

    #[test]
    fn inherit_skips_vanished_files() {
        let dir = TempDir::new().unwrap();
        let kept = dir.path().join("kept.pdf");
        std::fs::write(&kept, b"%PDF").unwrap();

        let mut old_a = ReferenceRecord::new("a.csv", "Deep-Learning Systems", 2020, "Zhou", None);
        old_a.document_path = Some(kept.clone());
        let mut old_b = ReferenceRecord::new("a.csv", "Gone", 2020, "Zhou", None);
        old_b.document_path = Some(dir.path().join("gone.pdf"));

        let mut fresh = vec![
            ReferenceRecord::new("b.csv", "deep learning systems", 2020, "Zhou", None),
            ReferenceRecord::new("b.csv", "Gone", 2020, "Zhou", None),
        ];

        assert_eq!(inherit_documents(&mut fresh, &[old_a, old_b]), 1);
        assert_eq!(fresh[0].document_path, Some(kept));
        assert_eq!(fresh[1].document_path, None);
    }
}
