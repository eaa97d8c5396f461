//! Ingestion runs: load, normalize, then either write a preview or upload.

use crate::error::IngestError;
use crate::loader::{load_curated, load_folder};
use crate::normalizer::{NormalizeStats, Normalizer};
use anmi_config::IngestConfig;
use anmi_core::index::SearchIndex;
use anmi_core::passage::Passage;
use serde::Serialize;
use std::path::Path;
use tracing::{error, info, warn};

/// Result of loading and normalizing a source folder.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub documents: usize,
    pub skipped_documents: usize,
    pub stats: NormalizeStats,
    pub passages: Vec<Passage>,
}

/// Load every document under `dir` and normalize it into passages.
pub async fn ingest_folder(dir: &Path, config: &IngestConfig) -> Result<IngestReport, IngestError> {
    let normalizer = Normalizer::new(config)?;
    let corpus = load_folder(dir).await?;

    let mut report = IngestReport {
        documents: corpus.documents.len(),
        skipped_documents: corpus.skipped.len(),
        ..IngestReport::default()
    };

    for document in &corpus.documents {
        let (passages, stats) = normalizer.normalize(document);
        info!(
            document = %document.title,
            pages = document.pages.len(),
            kept = stats.kept,
            windows = stats.windows,
            "Normalized document"
        );
        report.stats.merge(&stats);
        report.passages.extend(passages);
    }

    info!(
        documents = report.documents,
        skipped = report.skipped_documents,
        passages = report.passages.len(),
        "Folder ingestion complete"
    );
    Ok(report)
}

/// Load a curated knowledge base file.
pub async fn ingest_curated(path: &Path) -> Result<Vec<Passage>, IngestError> {
    load_curated(path).await
}

/// Write passages as pretty-printed JSON for inspection instead of uploading.
pub async fn write_dry_run(passages: &[Passage], path: &Path) -> Result<(), IngestError> {
    let json = serde_json::to_string_pretty(passages).map_err(|e| IngestError::Json {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| IngestError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    info!(path = %path.display(), passages = passages.len(), "Dry run written");
    Ok(())
}

/// Outcome of one upload batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// 1-based batch number
    pub batch: usize,
    pub total: usize,
    pub succeeded: usize,
    pub error: Option<String>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.error.is_none() && self.succeeded == self.total
    }
}

/// Upload passages in batches of `batch_size`.
///
/// A failed batch is reported and the remaining batches are still sent.
pub async fn upload_batches(
    index: &dyn SearchIndex,
    passages: &[Passage],
    batch_size: usize,
) -> Vec<BatchReport> {
    let batch_size = batch_size.max(1);
    let mut reports = Vec::with_capacity(passages.len().div_ceil(batch_size));

    for (i, batch) in passages.chunks(batch_size).enumerate() {
        let number = i + 1;
        let report = match index.upload(batch).await {
            Ok(summary) => {
                if summary.failed() > 0 {
                    warn!(
                        batch = number,
                        failed = summary.failed(),
                        total = summary.total,
                        "Index rejected some passages"
                    );
                } else {
                    info!(batch = number, total = summary.total, "Batch uploaded");
                }
                BatchReport {
                    batch: number,
                    total: batch.len(),
                    succeeded: summary.succeeded,
                    error: None,
                }
            }
            Err(e) => {
                error!(batch = number, error = %e, "Batch upload failed");
                BatchReport {
                    batch: number,
                    total: batch.len(),
                    succeeded: 0,
                    error: Some(e.to_string()),
                }
            }
        };
        reports.push(report);
    }

    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use anmi_core::error::IndexError;
    use anmi_core::index::{SearchHit, SearchRequest, UploadSummary};
    use std::sync::Mutex;

    /// Fails the batches whose 1-based number is listed; accepts the rest.
    struct FlakyIndex {
        fail_batches: Vec<usize>,
        calls: Mutex<Vec<usize>>,
    }

    impl FlakyIndex {
        fn new(fail_batches: Vec<usize>) -> Self {
            Self {
                fail_batches,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl SearchIndex for FlakyIndex {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn search(&self, _request: SearchRequest) -> Result<Vec<SearchHit>, IndexError> {
            Ok(Vec::new())
        }

        async fn upload(&self, passages: &[Passage]) -> Result<UploadSummary, IndexError> {
            let number = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(passages.len());
                calls.len()
            };
            if self.fail_batches.contains(&number) {
                return Err(IndexError::Network("connection reset".into()));
            }
            Ok(UploadSummary {
                succeeded: passages.len(),
                total: passages.len(),
            })
        }
    }

    fn passages(n: usize) -> Vec<Passage> {
        (0..n)
            .map(|i| Passage::new(format!("texto {i}"), "guia.txt", 1, i, vec!["guia.txt".into()]))
            .collect()
    }

    fn test_config() -> IngestConfig {
        IngestConfig {
            chunk_size: 200,
            chunk_overlap: 20,
            min_chars: 20,
            ..IngestConfig::default()
        }
    }

    #[tokio::test]
    async fn batches_are_sized_and_numbered() {
        let index = FlakyIndex::new(vec![]);
        let reports = upload_batches(&index, &passages(7), 3).await;

        assert_eq!(*index.calls.lock().unwrap(), vec![3, 3, 1]);
        assert_eq!(
            reports.iter().map(|r| r.batch).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(reports.iter().all(BatchReport::is_clean));
    }

    #[tokio::test]
    async fn failed_batch_does_not_stop_the_run() {
        let index = FlakyIndex::new(vec![2]);
        let reports = upload_batches(&index, &passages(6), 2).await;

        assert_eq!(reports.len(), 3);
        assert!(reports[0].is_clean());
        assert_eq!(reports[1].succeeded, 0);
        assert!(reports[1].error.as_deref().unwrap().contains("connection reset"));
        assert!(reports[2].is_clean());
    }

    #[tokio::test]
    async fn empty_input_uploads_nothing() {
        let index = FlakyIndex::new(vec![]);
        let reports = upload_batches(&index, &[], 500).await;
        assert!(reports.is_empty());
        assert!(index.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn folder_ingestion_counts_documents_and_windows() {
        let dir = tempfile::tempdir().unwrap();
        let page = "El hierro de la sangrecita ayuda a prevenir la anemia en niñas y niños menores de tres años. ";
        std::fs::write(dir.path().join("guia.txt"), format!("{page}\u{000C}{page}")).unwrap();
        std::fs::write(dir.path().join("roto.txt"), [0xff, 0xfe]).unwrap();

        let report = ingest_folder(dir.path(), &test_config()).await.unwrap();

        assert_eq!(report.documents, 1);
        assert_eq!(report.skipped_documents, 1);
        assert_eq!(report.stats.kept, report.passages.len());
        assert_eq!(report.passages.len(), 2);
        assert_eq!(report.passages[1].page, 2);
        assert!(report.passages.iter().all(|p| p.tags == vec!["guia.txt".to_string()]));
    }

    #[tokio::test]
    async fn folder_without_documents_yields_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("leeme.md"), "no es una guía").unwrap();

        let report = ingest_folder(dir.path(), &test_config()).await.unwrap();

        assert_eq!(report.documents, 0);
        assert_eq!(report.skipped_documents, 0);
        assert!(report.passages.is_empty());
        assert_eq!(report.stats, NormalizeStats::default());
    }

    #[tokio::test]
    async fn missing_folder_is_source_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = ingest_folder(&dir.path().join("data"), &test_config())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::SourceMissing(_)));
    }

    #[tokio::test]
    async fn dry_run_writes_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.json");
        write_dry_run(&passages(2), &path).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains('\n'));
        let parsed: Vec<Passage> = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].content, "texto 1");
    }
}
