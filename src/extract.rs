//! Single-document extraction: the primary library entry point.
//!
//! This module wires the pipeline stages together for the in-process case:
//! resolve the input, pull text from every page, normalise it into row
//! chunks, fan the chunks out to the model, and post-process the records
//! into canonical transactions. The distributed variant (queue-driven
//! chunk workers) reuses the same stages through [`crate::split`] and
//! [`crate::worker`].

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::ocr::{OcrEngine, TesseractOcr};
use crate::output::{ChunkReport, ExtractionOutput, ExtractionStats};
use crate::pipeline::extract_text;
use crate::pipeline::postprocess::{postprocess, HeaderColumns};
use crate::pipeline::{input, llm, normalize};
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract transactions from a bank-statement PDF at a local path or URL.
///
/// # Returns
/// `Ok(ExtractionOutput)` on success, even if some pages or row chunks
/// failed (check `output.stats` and `output.chunks`).
///
/// # Errors
/// Only fatal, document-level failures:
/// - File not found / permission denied / not a PDF
/// - Corrupt, encrypted, or empty document
/// - No model provider configured
pub async fn extract_transactions(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();

    // ── Step 2: Resolve the model provider ───────────────────────────────
    let provider = resolve_provider(config)?;

    // ── Step 3: Extract per-page text (native, OCR fallback) ─────────────
    let extract_start = Instant::now();
    let ocr: Arc<dyn OcrEngine> = Arc::new(TesseractOcr::new());
    let pages = extract_text::extract_pages(
        &pdf_path,
        config.password.clone(),
        ocr,
        config.ocr_threshold,
        config.progress_callback.clone(),
    )
    .await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

    let full_text = extract_text::joined_text(&pages);
    if pages.is_empty() || full_text.trim().is_empty() {
        return Err(ExtractError::EmptyDocument {
            path: pdf_path,
            pages: pages.len(),
        });
    }

    // ── Step 4: Normalise into header + row chunks ───────────────────────
    let first_page = pages
        .iter()
        .find_map(|p| p.text.as_deref())
        .unwrap_or_default();
    let statement = normalize::normalize(first_page, &full_text, config.rows_per_chunk);
    info!(
        "normalised into {} row chunks (header: {})",
        statement.row_chunks.len(),
        statement.header_row.as_deref().unwrap_or("<none>")
    );

    // ── Step 5: Detect bank identity once per document ───────────────────
    let bank_name = llm::detect_bank_name(&provider, &pages, config).await;

    // ── Step 6: Extract records per row chunk, concurrently ──────────────
    let model_start = Instant::now();
    let results = process_row_chunks(
        &provider,
        &statement.row_chunks,
        statement.header_row.as_deref().unwrap_or_default(),
        bank_name.as_deref(),
        config,
    )
    .await;
    let model_duration_ms = model_start.elapsed().as_millis() as u64;

    // ── Step 7: Post-process into canonical transactions ─────────────────
    let columns = HeaderColumns::from_header_row(statement.header_row.as_deref());
    let records_extracted: usize = results.iter().map(|r| r.records.len()).sum();
    let input_tokens: u64 = results.iter().map(|r| r.input_tokens).sum();
    let output_tokens: u64 = results.iter().map(|r| r.output_tokens).sum();

    let mut chunks = Vec::with_capacity(results.len());
    let mut raw_records = Vec::with_capacity(records_extracted);
    for result in results {
        chunks.push(ChunkReport {
            index: result.index,
            id: format!("rows_{}", result.index),
            records: result.records.len(),
            retries: result.retries,
            error: result.error,
        });
        raw_records.extend(result.records);
    }

    let transactions = postprocess(raw_records, &columns, bank_name.as_deref());
    info!(
        "extracted {} transactions from {} raw records",
        transactions.len(),
        records_extracted
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(transactions.len());
    }

    let stats = ExtractionStats {
        total_pages: pages.len(),
        ocr_pages: pages.iter().filter(|p| p.via_ocr && !p.failed()).count(),
        failed_pages: extract_text::failed_pages(&pages),
        row_chunks: statement.row_chunks.len(),
        model_calls: statement.row_chunks.len() + 1,
        records_extracted,
        records_kept: transactions.len(),
        input_tokens,
        output_tokens,
        extract_duration_ms,
        model_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    Ok(ExtractionOutput {
        transactions,
        bank_name,
        header_row: statement.header_row,
        chunks,
        stats,
    })
}

/// Extract and write the transaction array to `output_path` as JSON.
///
/// The write is atomic (temp file + rename) so a crash mid-write never
/// leaves a truncated JSON file behind.
pub async fn extract_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let output = extract_transactions(input_str, config).await?;
    let output_path = output_path.as_ref();

    let json = output
        .transactions_json()
        .map_err(|e| ExtractError::Internal(format!("serialisation failed: {}", e)))?;

    let tmp_path = output_path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| ExtractError::OutputWriteFailed {
            path: tmp_path.clone(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, output_path)
        .await
        .map_err(|e| ExtractError::OutputWriteFailed {
            path: output_path.to_path_buf(),
            source: e,
        })?;

    debug!("wrote {} transactions to {}", output.transactions.len(), output_path.display());
    Ok(output)
}

/// Process row chunks concurrently, preserving statement order.
async fn process_row_chunks(
    provider: &Arc<dyn LLMProvider>,
    row_chunks: &[String],
    header_row: &str,
    bank_name: Option<&str>,
    config: &ExtractionConfig,
) -> Vec<llm::RowChunkResult> {
    let total = row_chunks.len();

    let mut results: Vec<llm::RowChunkResult> = stream::iter(row_chunks.iter().enumerate().map(
        |(index, chunk)| {
            let provider = Arc::clone(provider);
            let config = config.clone();
            let chunk_id = format!("rows_{}", index);
            async move {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_chunk_start(index, total);
                }
                let result = llm::extract_records(
                    &provider,
                    index,
                    &chunk_id,
                    chunk,
                    header_row,
                    bank_name,
                    &config,
                )
                .await;
                if let Some(ref cb) = config.progress_callback {
                    match result.error {
                        None => cb.on_chunk_complete(index, total, result.records.len()),
                        Some(ref e) => cb.on_chunk_error(index, total, &e.to_string()),
                    }
                }
                result
            }
        },
    ))
    .buffer_unordered(config.concurrency)
    .collect()
    .await;

    results.sort_by_key(|r| r.index);
    results
}

/// Resolve the model provider from config, env pair, or key auto-detection.
pub(crate) fn resolve_provider(
    config: &ExtractionConfig,
) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    // 1) User-provided provider takes priority
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    // 2) Provider name + model
    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return create_provider(name, model);
    }

    // 3) Honour the EDGEQUAKE_LLM_PROVIDER + EDGEQUAKE_MODEL pair when both set
    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    // Prefer OpenAI when a key is present so users with multiple provider
    // keys get a deterministic default.
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExtractError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        warn!("provider '{}' not configured: {}", provider_name, e);
        ExtractError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
