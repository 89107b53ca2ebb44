//! Document acquisition over the canonical table.
//!
//! Every record without a stored document gets one lookup per candidate
//! identifier (DOI first, then title). A downloaded artifact only counts when it
//! is larger than the viability threshold; anything smaller is deleted. Each
//! success is written to the checkpoint before the next outcome is applied, so
//! an interrupted batch resumes where it stopped.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use refharvest_core::fs_ops::file_size;
use refharvest_core::naming::document_file_name;
use refharvest_core::{AcquisitionConfig, CheckpointLayout, ReferenceRecord, save_checkpoint};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::identifier::Identifier;
use crate::sources::DocumentFetcher;

/// Knobs of the acquisition pass, taken from `[acquisition]`.
#[derive(Debug, Clone)]
pub struct AcquisitionPolicy {
    pub viability_threshold_bytes: u64,
    pub max_file_stem_len: usize,
    pub title_fallback: bool,
    pub concurrency: usize,
}

impl From<&AcquisitionConfig> for AcquisitionPolicy {
    fn from(config: &AcquisitionConfig) -> Self {
        Self {
            viability_threshold_bytes: config.viability_threshold_bytes,
            max_file_stem_len: config.max_file_stem_len,
            title_fallback: config.title_fallback,
            concurrency: config.concurrency.max(1),
        }
    }
}

impl Default for AcquisitionPolicy {
    fn default() -> Self {
        Self::from(&AcquisitionConfig::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AcquisitionReport {
    pub attempted: usize,
    /// Records whose document was already on disk.
    pub skipped: usize,
    pub acquired: usize,
    pub unacquired: usize,
    /// Row ids (table positions) still lacking a document.
    pub unacquired_ids: Vec<usize>,
}

struct Job {
    index: usize,
    candidates: Vec<Identifier>,
    destination: PathBuf,
}

pub struct AcquisitionOrchestrator<'a> {
    fetcher: &'a dyn DocumentFetcher,
    policy: AcquisitionPolicy,
    documents_dir: PathBuf,
    checkpoint_path: PathBuf,
}

impl<'a> AcquisitionOrchestrator<'a> {
    pub fn new(
        fetcher: &'a dyn DocumentFetcher,
        policy: AcquisitionPolicy,
        documents_dir: impl Into<PathBuf>,
        checkpoint_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            policy,
            documents_dir: documents_dir.into(),
            checkpoint_path: checkpoint_path.into(),
        }
    }

    /// Acquire documents for every record that lacks one.
    ///
    /// Per-record failures are counted, never returned. The only error is a
    /// checkpoint that cannot be written.
    pub async fn acquire_all(&self, records: &mut [ReferenceRecord]) -> Result<AcquisitionReport> {
        let mut report = AcquisitionReport::default();
        let jobs = self.plan(records, &mut report);
        let total = jobs.len();
        report.attempted = total;

        info!(
            "acquiring {total} documents with {} ({} already present)",
            self.fetcher.name(),
            report.skipped
        );

        let mut outcomes = futures::stream::iter(jobs)
            .map(|job| async move {
                let stored = self.attempt(&job).await;
                (job.index, stored)
            })
            .buffered(self.policy.concurrency);

        let mut position = 0;
        while let Some((index, stored)) = outcomes.next().await {
            position += 1;
            let title = &records[index].title;
            match stored {
                Some(path) => {
                    info!("({position}/{total}) acquired {title:?}");
                    records[index].document_path = Some(path);
                    report.acquired += 1;
                    save_checkpoint(&self.checkpoint_path, records, CheckpointLayout::WithDocuments)?;
                }
                None => {
                    info!("({position}/{total}) no document for {title:?}");
                    report.unacquired += 1;
                    report.unacquired_ids.push(index);
                }
            }
        }

        info!(
            "acquisition finished: {} acquired, {} unacquired, {} skipped",
            report.acquired, report.unacquired, report.skipped
        );
        Ok(report)
    }

    fn plan(&self, records: &mut [ReferenceRecord], report: &mut AcquisitionReport) -> Vec<Job> {
        let mut claimed: HashSet<PathBuf> = records
            .iter()
            .filter(|r| r.has_document())
            .filter_map(|r| r.document_path.clone())
            .collect();

        let mut jobs = Vec::new();
        for (index, record) in records.iter_mut().enumerate() {
            if record.has_document() {
                report.skipped += 1;
                continue;
            }
            if let Some(stale) = record.document_path.take() {
                debug!("document {} is gone, reacquiring", stale.display());
            }

            let destination = self.destination_for(record, index, &claimed);
            claimed.insert(destination.clone());
            jobs.push(Job {
                index,
                candidates: Identifier::candidates(record, self.policy.title_fallback),
                destination,
            });
        }
        jobs
    }

    /// Documents directory joined with the synthesized file name. Truncated
    /// stems can collide; later rows get their id appended.
    fn destination_for(&self, record: &ReferenceRecord, index: usize, claimed: &HashSet<PathBuf>) -> PathBuf {
        let name = document_file_name(record, self.policy.max_file_stem_len);
        let path = self.documents_dir.join(&name);
        if !claimed.contains(&path) {
            return path;
        }
        let stem = name.strip_suffix(".pdf").unwrap_or(&name);
        self.documents_dir.join(format!("{stem}_{index}.pdf"))
    }

    async fn attempt(&self, job: &Job) -> Option<PathBuf> {
        for identifier in &job.candidates {
            match self.fetcher.fetch_document(identifier, &job.destination).await {
                Ok(()) if self.is_viable(&job.destination) => return Some(job.destination.clone()),
                Ok(()) => debug!("{} returned a non-viable artifact for {identifier}", self.fetcher.name()),
                Err(e) => warn!("{} lookup by {identifier} failed: {e}", self.fetcher.name()),
            }
            // Whatever sits at the destination now is a reject or a stale leftover.
            discard(&job.destination);
        }
        None
    }

    fn is_viable(&self, path: &Path) -> bool {
        file_size(path).is_some_and(|size| size > self.policy.viability_threshold_bytes)
    }
}

fn discard(path: &Path) {
    if path.exists()
        && let Err(e) = std::fs::remove_file(path)
    {
        warn!("cannot remove rejected artifact {}: {e}", path.display());
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::AcquireError;
    use crate::identifier::IdentifierKind;
    use async_trait::async_trait;
    use refharvest_core::load_checkpoint;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Writes a canned payload for known identifiers, fails for the rest.
    #[derive(Default)]
    pub(crate) struct FakeFetcher {
        pub payloads: HashMap<String, Vec<u8>>,
        pub calls: AtomicUsize,
        pub seen: Mutex<Vec<Identifier>>,
    }

    impl FakeFetcher {
        pub(crate) fn with(mut self, key: &str, payload: Vec<u8>) -> Self {
            self.payloads.insert(key.to_string(), payload);
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentFetcher for FakeFetcher {
        fn name(&self) -> &str {
            "fake"
        }

        async fn fetch_document(&self, identifier: &Identifier, destination: &Path) -> crate::error::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(identifier.clone());
            match self.payloads.get(&identifier.value) {
                Some(bytes) => {
                    std::fs::write(destination, bytes)?;
                    Ok(())
                }
                None => Err(AcquireError::DocumentNotFound(identifier.value.clone())),
            }
        }
    }

    pub(crate) fn pdf_bytes(len: usize) -> Vec<u8> {
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.resize(len, b'x');
        bytes
    }

    fn record(title: &str, doi: Option<&str>) -> ReferenceRecord {
        ReferenceRecord::new("res/wos/a.txt", title, 2020, "Zhou", doi.map(str::to_string))
    }

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            std::fs::create_dir_all(dir.path().join("docs")).unwrap();
            Self { dir }
        }

        fn docs(&self) -> PathBuf {
            self.dir.path().join("docs")
        }

        fn checkpoint(&self) -> PathBuf {
            self.dir.path().join("result_query.csv")
        }

        fn orchestrator<'a>(&self, fetcher: &'a FakeFetcher) -> AcquisitionOrchestrator<'a> {
            AcquisitionOrchestrator::new(fetcher, AcquisitionPolicy::default(), self.docs(), self.checkpoint())
        }
    }

    #[tokio::test]
    async fn acquires_by_doi_and_checkpoints() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::default().with("10.1000/abc", pdf_bytes(1024));
        let mut records = vec![record("Attention Is All You Need", Some("10.1000/abc"))];

        let report = fx.orchestrator(&fetcher).acquire_all(&mut records).await.unwrap();

        assert_eq!(report.acquired, 1);
        assert_eq!(fetcher.calls(), 1);
        let stored = records[0].document_path.clone().unwrap();
        assert!(stored.starts_with(fx.docs()));
        assert!(stored.is_file());

        let persisted = load_checkpoint(&fx.checkpoint()).unwrap();
        assert_eq!(persisted[0].document_path, Some(stored));
    }

    #[tokio::test]
    async fn empty_doi_uses_title_lookup() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::default().with("Graph Neural Networks", pdf_bytes(512));
        let mut records = vec![record("Graph Neural Networks", Some(""))];

        let report = fx.orchestrator(&fetcher).acquire_all(&mut records).await.unwrap();

        assert_eq!(report.acquired, 1);
        let seen = fetcher.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, IdentifierKind::Title);
        assert_eq!(seen[0].value, "Graph Neural Networks");
    }

    #[tokio::test]
    async fn failed_doi_falls_back_to_title() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::default().with("Deep Learning", pdf_bytes(512));
        let mut records = vec![record("Deep Learning", Some("10.1000/missing"))];

        let report = fx.orchestrator(&fetcher).acquire_all(&mut records).await.unwrap();

        assert_eq!(report.acquired, 1);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn tiny_artifact_is_rejected_and_deleted() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::default().with("10.1000/tiny", pdf_bytes(200));
        let mut records = vec![record("Tiny", Some("10.1000/tiny"))];
        let mut policy = AcquisitionPolicy::default();
        policy.title_fallback = false;
        let orchestrator = AcquisitionOrchestrator::new(&fetcher, policy, fx.docs(), fx.checkpoint());

        let report = orchestrator.acquire_all(&mut records).await.unwrap();

        assert_eq!(report.acquired, 0);
        assert_eq!(report.unacquired_ids, vec![0]);
        assert!(records[0].document_path.is_none());
        assert_eq!(std::fs::read_dir(fx.docs()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn leftover_file_is_not_taken_for_a_failed_fetch() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::default();
        let mut records = vec![record("Stale", Some("10.1000/stale"))];
        let leftover = fx.docs().join(document_file_name(&records[0], 40));
        std::fs::write(&leftover, pdf_bytes(4096)).unwrap();

        let report = fx.orchestrator(&fetcher).acquire_all(&mut records).await.unwrap();

        assert_eq!(report.acquired, 0);
        assert_eq!(report.unacquired_ids, vec![0]);
        assert!(records[0].document_path.is_none());
        assert!(!leftover.exists());
    }

    #[tokio::test]
    async fn resume_makes_no_backend_calls() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::default()
            .with("10.1000/a", pdf_bytes(400))
            .with("10.1000/b", pdf_bytes(400));
        let mut records = vec![record("A", Some("10.1000/a")), record("B", Some("10.1000/b"))];

        fx.orchestrator(&fetcher).acquire_all(&mut records).await.unwrap();
        assert_eq!(fetcher.calls(), 2);

        let mut resumed = load_checkpoint(&fx.checkpoint()).unwrap();
        let report = fx.orchestrator(&fetcher).acquire_all(&mut resumed).await.unwrap();

        assert_eq!(fetcher.calls(), 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.attempted, 0);
    }

    #[tokio::test]
    async fn missing_file_is_reacquired() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::default().with("10.1000/a", pdf_bytes(400));
        let mut records = vec![record("A", Some("10.1000/a"))];
        records[0].document_path = Some(fx.docs().join("gone.pdf"));

        let report = fx.orchestrator(&fetcher).acquire_all(&mut records).await.unwrap();

        assert_eq!(report.acquired, 1);
        assert_ne!(records[0].document_path, Some(fx.docs().join("gone.pdf")));
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_batch() {
        let fx = Fixture::new();
        let fetcher = FakeFetcher::default().with("10.1000/ok", pdf_bytes(300));
        let mut records = vec![
            record("Broken", Some("10.1000/broken")),
            record("Fine", Some("10.1000/ok")),
        ];

        let report = fx.orchestrator(&fetcher).acquire_all(&mut records).await.unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.acquired, 1);
        assert_eq!(report.unacquired_ids, vec![0]);
        assert!(records[1].document_path.is_some());
    }

    #[tokio::test]
    async fn colliding_names_are_disambiguated() {
        let fx = Fixture::new();
        let prefix = "An Extremely Long Title That Shares A Prefix";
        let first = format!("{prefix} One");
        let second = format!("{prefix} Two");
        let fetcher = FakeFetcher::default()
            .with(&first, pdf_bytes(300))
            .with(&second, pdf_bytes(300));
        let mut records = vec![record(&first, None), record(&second, None)];

        fx.orchestrator(&fetcher).acquire_all(&mut records).await.unwrap();

        let a = records[0].document_path.clone().unwrap();
        let b = records[1].document_path.clone().unwrap();
        assert_ne!(a, b);
        assert!(b.to_string_lossy().ends_with("_1.pdf"));
    }

    #[tokio::test]
    async fn concurrent_outcomes_keep_row_order() {
        let fx = Fixture::new();
        let mut fetcher = FakeFetcher::default();
        let mut records = Vec::new();
        for i in 0..6 {
            let doi = format!("10.1000/{i}");
            if i % 2 == 0 {
                fetcher = fetcher.with(&doi, pdf_bytes(300));
            }
            records.push(record(&format!("Paper {i}"), Some(&doi)));
        }
        let mut policy = AcquisitionPolicy::default();
        policy.concurrency = 3;
        policy.title_fallback = false;
        let orchestrator = AcquisitionOrchestrator::new(&fetcher, policy, fx.docs(), fx.checkpoint());

        let report = orchestrator.acquire_all(&mut records).await.unwrap();

        assert_eq!(report.acquired, 3);
        assert_eq!(report.unacquired_ids, vec![1, 3, 5]);
    }
}
