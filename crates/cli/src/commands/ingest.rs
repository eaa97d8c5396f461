//! `anmi ingest` / `anmi ingest-json` — Build the passage index.

use anmi_config::AppConfig;
use anmi_core::passage::Passage;
use anmi_index::AzureSearchIndex;
use anmi_ingest::{BatchReport, IngestError};
use std::path::{Path, PathBuf};

pub async fn run_folder(
    config_path: Option<&Path>,
    source: Option<PathBuf>,
    dry_run: bool,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let source = source.unwrap_or_else(|| PathBuf::from(&config.ingest.source_dir));

    println!("📂 Reading documents from {}", source.display());
    let report = match anmi_ingest::ingest_folder(&source, &config.ingest).await {
        Ok(report) => report,
        Err(IngestError::SourceMissing(path)) => {
            println!("   ⚠️  Folder not found: {}", path.display());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if report.documents == 0 {
        println!("   ⚠️  No .txt documents in {}", source.display());
        return Ok(());
    }

    let stats = &report.stats;
    println!("   Documents:  {} ({} skipped)", report.documents, report.skipped_documents);
    println!(
        "   Windows:    {} ({} kept, {} too short, {} boilerplate, {} non-text)",
        stats.windows, stats.kept, stats.too_short, stats.discard_marker, stats.low_alpha
    );

    let output = output.unwrap_or_else(|| PathBuf::from(&config.ingest.output_file));
    publish(&config, &report.passages, dry_run, &output).await
}

pub async fn run_curated(
    config_path: Option<&Path>,
    file: &Path,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;

    println!("📄 Reading {}", file.display());
    let passages = anmi_ingest::ingest_curated(file).await?;
    println!("   Items:      {}", passages.len());

    let output = PathBuf::from(&config.ingest.json_output_file);
    publish(&config, &passages, dry_run, &output).await
}

async fn publish(
    config: &AppConfig,
    passages: &[Passage],
    dry_run: bool,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    if passages.is_empty() {
        println!("   ⚠️  Nothing to upload");
        return Ok(());
    }

    if dry_run {
        anmi_ingest::write_dry_run(passages, output).await?;
        println!("   ✅ {} passages written to {}", passages.len(), output.display());
        return Ok(());
    }

    let search = config.require_search()?;
    let index = AzureSearchIndex::from_config(&search);
    println!("⬆️  Uploading {} passages to index '{}'", passages.len(), search.index_name);

    let reports = anmi_ingest::upload_batches(&index, passages, config.ingest.batch_size).await;
    print_reports(&reports);

    let failed_batches = reports.iter().filter(|r| r.error.is_some()).count();
    if failed_batches > 0 {
        return Err(format!("{failed_batches} of {} batches failed", reports.len()).into());
    }
    Ok(())
}

fn print_reports(reports: &[BatchReport]) {
    for r in reports {
        match &r.error {
            None if r.is_clean() => println!("   ✅ Batch {}: {}/{}", r.batch, r.succeeded, r.total),
            None => println!("   ⚠️  Batch {}: {}/{}", r.batch, r.succeeded, r.total),
            Some(e) => println!("   ❌ Batch {}: {e}", r.batch),
        }
    }
    let uploaded: usize = reports.iter().map(|r| r.succeeded).sum();
    let total: usize = reports.iter().map(|r| r.total).sum();
    println!("   Uploaded {uploaded}/{total} passages");
}
