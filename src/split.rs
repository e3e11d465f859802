//! Job splitting: turn one statement into stored chunks and work items.
//!
//! This is the dispatch half of the distributed variant. The splitter
//! validates the job, materialises page-range sub-documents, persists each
//! one to the chunk store, and only then emits work items — all of them
//! carrying the final total, so a consumer never sees a moving chunk count.
//! A failure anywhere before dispatch is fatal and nothing is emitted.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::jobs::{ChunkCompleteNotice, JobRequest, WorkItem};
use crate::notify::CompletionNotifier;
use crate::pipeline::{chunker, input};
use crate::store::ChunkStore;
use tracing::info;

/// Split the job's statement into stored chunks and return the work items.
///
/// Side effect: announces the total chunk count to the notifier (with zero
/// pages processed) before returning, so a progress tracker can show
/// "0 of N" immediately rather than only after the first chunk lands.
///
/// # Errors
/// Fatal for a missing job id or source, an unreadable/corrupt/encrypted
/// document, zero pages, or a storage failure. No work items are emitted
/// on any error — dispatch is all-or-nothing.
pub async fn split_job(
    request: &JobRequest,
    config: &ExtractionConfig,
    store: &dyn ChunkStore,
    notifier: &dyn CompletionNotifier,
) -> Result<Vec<WorkItem>, ExtractError> {
    if request.job_id.trim().is_empty() {
        return Err(ExtractError::MissingJobParameter("jobId"));
    }
    if request.source.trim().is_empty() {
        return Err(ExtractError::MissingJobParameter("source"));
    }

    let resolved = input::resolve_input(&request.source, config.download_timeout_secs).await?;

    let chunks = chunker::materialize_chunks(
        resolved.path(),
        config.password.clone(),
        config.max_pages_per_chunk,
    )
    .await?;

    let total_chunks = chunks.len();

    // Persist every chunk before emitting any work item.
    let mut items = Vec::with_capacity(total_chunks);
    for (index, chunk) in chunks.iter().enumerate() {
        let key = chunk_key(&request.job_id, &chunk.range);
        store.put(&key, &chunk.bytes)?;
        items.push(WorkItem {
            job_id: request.job_id.clone(),
            chunk_key: key,
            chunk_index: index,
            total_chunks,
        });
    }

    info!(
        job_id = %request.job_id,
        total_chunks,
        "job split and chunks stored"
    );

    // Seed the progress tracker with the authoritative total.
    notifier
        .chunk_complete(
            &request.job_id,
            ChunkCompleteNotice {
                pages: 0,
                total_chunks: Some(total_chunks),
            },
        )
        .await;

    Ok(items)
}

/// Store key for a materialised chunk: `chunks/{job_id}/{chunk_id}.pdf`.
pub fn chunk_key(job_id: &str, range: &chunker::PageRange) -> String {
    format!("chunks/{}/{}.pdf", job_id, range.id())
}
