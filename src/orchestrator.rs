//! Batch orchestration: fan captures out per catalog entry, fan results into
//! the concept's archive.

use crate::archive::{ArchiveBuilder, ArchiveSummary};
use crate::capture::{capture_full_page, CaptureRequest};
use crate::catalog::ViewportCatalog;
use crate::config::{AppConfig, BatchConfig, CaptureSettings};
use crate::{EngineFactory, Error, Result};
use futures::future::join_all;
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

/// Run blocking archive I/O off the async workers.
async fn archive_io<T, F>(what: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::ArchiveError(format!("archive {} task failed: {}", what, e)))?
}

/// Capture every catalog size of one concept and archive the results.
///
/// All captures are launched at once, each in its own browser session, and
/// each successful composite is appended as soon as it is ready. The archive
/// is finalized only after every capture has settled. A failed capture is
/// skipped; an archive failure is returned once all captures have settled.
pub async fn run_batch<F>(
    factory: Arc<F>,
    catalog: &ViewportCatalog,
    batch: &BatchConfig,
    settings: &CaptureSettings,
    output_dir: &Path,
) -> Result<ArchiveSummary>
where
    F: EngineFactory,
{
    let dir = output_dir.to_path_buf();
    let concept = batch.concept.clone();
    let archive = Arc::new(archive_io("create", move || ArchiveBuilder::create(dir, &concept)).await?);
    info!(
        "capturing {} size(s) of concept {} from {}",
        catalog.len(),
        batch.concept,
        batch.base_url
    );

    let requests: Vec<CaptureRequest> = catalog
        .iter()
        .map(|entry| CaptureRequest::for_entry(batch, entry, settings))
        .collect();

    let tasks = requests.iter().map(|request| {
        let factory = factory.clone();
        let archive = archive.clone();
        async move {
            match capture_full_page(factory, request, settings).await {
                Some(shot) => {
                    let size = request.size;
                    archive_io("append", move || archive.append_screenshot(size, &shot)).await?;
                    Ok::<_, Error>(true)
                }
                None => Ok(false),
            }
        }
    });
    let outcomes = join_all(tasks).await;

    let mut skipped = Vec::new();
    for (request, outcome) in requests.iter().zip(outcomes) {
        if !outcome? {
            skipped.push(request.size.to_string());
        }
    }
    if !skipped.is_empty() {
        warn!(
            "concept {}: no image for {}; archive will not contain them",
            batch.concept,
            skipped.join(", ")
        );
    }

    let archive = Arc::try_unwrap(archive)
        .map_err(|_| Error::ArchiveError(format!("archive for {} is still shared at finalize", batch.concept)))?;
    archive_io("finalize", move || archive.finalize()).await
}

/// Outcome of one configured batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub concept: String,
    pub result: Result<ArchiveSummary>,
}

/// Run every configured batch concurrently against the same catalog.
pub async fn run_all<F>(factory: Arc<F>, config: &AppConfig, catalog: &ViewportCatalog) -> Vec<BatchOutcome>
where
    F: EngineFactory,
{
    let runs = config.batches.iter().map(|batch| {
        let factory = factory.clone();
        async move {
            let result = run_batch(factory, catalog, batch, &config.capture, &config.output_dir).await;
            BatchOutcome {
                concept: batch.concept.clone(),
                result,
            }
        }
    });
    join_all(runs).await
}
