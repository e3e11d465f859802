//! Chunk worker: process one queued work item end to end.
//!
//! The processing half of the distributed variant. A work item references a
//! stored page-range chunk; the worker fetches it, runs the same stages the
//! in-process pipeline uses (text extraction, normalisation, record
//! extraction, post-processing), and reports the outcome to the notifier.
//!
//! Work items arrive at least once. Processing is a pure recomputation over
//! the stored chunk bytes — no counters are mutated in place — so a
//! redelivered item produces an equivalent result and the progress
//! tracker's idempotent transitions absorb the duplicate notification.

use crate::config::ExtractionConfig;
use crate::error::{ChunkError, ExtractError};
use crate::jobs::{ChunkCompleteNotice, ChunkFailNotice, WorkItem};
use crate::notify::CompletionNotifier;
use crate::ocr::{OcrEngine, TesseractOcr};
use crate::output::ChunkReport;
use crate::pipeline::postprocess::{postprocess, HeaderColumns};
use crate::pipeline::{extract_text, llm, normalize};
use crate::store::ChunkStore;
use crate::transaction::Transaction;
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of processing one work item.
#[derive(Debug, Clone)]
pub struct WorkItemOutcome {
    pub report: ChunkReport,
    /// Canonical transactions extracted from this chunk.
    pub transactions: Vec<Transaction>,
    /// Pages the chunk contained.
    pub pages: usize,
}

/// Process one work item: fetch, extract, normalise, call the model,
/// post-process, notify.
///
/// A chunk whose pages yield no text is reported as failed to the notifier
/// and returned as `Ok` with [`ChunkError::Unreadable`] in its report — the
/// queue consumer should acknowledge it, not redeliver. Fatal errors
/// (storage, decryption, provider) are notified and then propagated so the
/// consumer can decide between retry and dead-letter.
pub async fn process_work_item(
    item: &WorkItem,
    config: &ExtractionConfig,
    store: &dyn ChunkStore,
    notifier: &dyn CompletionNotifier,
) -> Result<WorkItemOutcome, ExtractError> {
    match process_inner(item, config, store).await {
        Ok(outcome) => {
            match outcome.report.error {
                None => {
                    notifier
                        .chunk_complete(
                            &item.job_id,
                            ChunkCompleteNotice {
                                pages: outcome.pages,
                                total_chunks: Some(item.total_chunks),
                            },
                        )
                        .await;
                }
                Some(ref e) => {
                    notifier
                        .chunk_failed(
                            &item.job_id,
                            ChunkFailNotice {
                                error: e.to_string(),
                            },
                        )
                        .await;
                }
            }
            Ok(outcome)
        }
        Err(e) => {
            warn!(
                job_id = %item.job_id,
                chunk = %item.chunk_key,
                "work item failed: {}", e
            );
            notifier
                .chunk_failed(
                    &item.job_id,
                    ChunkFailNotice {
                        error: e.to_string(),
                    },
                )
                .await;
            Err(e)
        }
    }
}

async fn process_inner(
    item: &WorkItem,
    config: &ExtractionConfig,
    store: &dyn ChunkStore,
) -> Result<WorkItemOutcome, ExtractError> {
    let bytes = store.get(&item.chunk_key)?;

    // pdfium wants a file path, so the chunk lands in a temp file that
    // lives for the duration of this invocation.
    let mut tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| ExtractError::Internal(format!("tempfile: {}", e)))?;
    tmp.write_all(&bytes)
        .map_err(|e| ExtractError::Internal(format!("temp write: {}", e)))?;

    let ocr: Arc<dyn OcrEngine> = Arc::new(TesseractOcr::new());
    let pages = extract_text::extract_pages(
        tmp.path(),
        config.password.clone(),
        ocr,
        config.ocr_threshold,
        None,
    )
    .await?;

    let full_text = extract_text::joined_text(&pages);
    if full_text.trim().is_empty() {
        warn!(
            job_id = %item.job_id,
            chunk = %item.chunk_key,
            "no text recoverable from chunk"
        );
        return Ok(WorkItemOutcome {
            report: ChunkReport {
                index: item.chunk_index,
                id: item.chunk_key.clone(),
                records: 0,
                retries: 0,
                error: Some(ChunkError::Unreadable {
                    chunk: item.chunk_key.clone(),
                    pages: pages.len(),
                }),
            },
            transactions: Vec::new(),
            pages: pages.len(),
        });
    }

    let first_page = pages
        .iter()
        .find_map(|p| p.text.as_deref())
        .unwrap_or_default();
    let statement = normalize::normalize(first_page, &full_text, config.rows_per_chunk);

    let provider = crate::extract::resolve_provider(config)?;
    let bank_name = llm::detect_bank_name(&provider, &pages, config).await;
    let header_row = statement.header_row.as_deref().unwrap_or_default();

    let mut raw_records = Vec::new();
    let mut retries = 0u8;
    let mut error = None;
    for (index, row_chunk) in statement.row_chunks.iter().enumerate() {
        let result = llm::extract_records(
            &provider,
            index,
            &format!("{}#rows_{}", item.chunk_key, index),
            row_chunk,
            header_row,
            bank_name.as_deref(),
            config,
        )
        .await;
        retries = retries.saturating_add(result.retries);
        if error.is_none() {
            error = result.error;
        }
        raw_records.extend(result.records);
    }

    let columns = HeaderColumns::from_header_row(statement.header_row.as_deref());
    let records = raw_records.len();
    let transactions = postprocess(raw_records, &columns, bank_name.as_deref());

    info!(
        job_id = %item.job_id,
        chunk = %item.chunk_key,
        pages = pages.len(),
        transactions = transactions.len(),
        "chunk processed"
    );

    Ok(WorkItemOutcome {
        report: ChunkReport {
            index: item.chunk_index,
            id: item.chunk_key.clone(),
            records,
            retries,
            error,
        },
        transactions,
        pages: pages.len(),
    })
}
