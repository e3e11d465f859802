//! Output types for a statement extraction run.
//!
//! The caller-facing contract is the JSON array of canonical transactions;
//! everything else here (per-chunk reports, statistics) exists so partial
//! failure is inspectable instead of silent. A run with three of four row
//! chunks succeeded still returns `Ok` — callers decide how much failure
//! they tolerate by looking at `chunks` and `stats`.

use crate::error::ChunkError;
use crate::transaction::Transaction;
use serde::Serialize;

/// Complete result of one extraction run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOutput {
    /// Validated, sign-resolved transactions in statement order.
    pub transactions: Vec<Transaction>,
    /// Document-level bank identity, when detection succeeded.
    pub bank_name: Option<String>,
    /// The detected column-header line, verbatim.
    pub header_row: Option<String>,
    /// One report per row chunk sent to the model.
    pub chunks: Vec<ChunkReport>,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// The caller-facing contract: a JSON array of transaction objects.
    pub fn transactions_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.transactions)
    }

    /// Number of row chunks that produced no records because of a failure.
    pub fn failed_chunks(&self) -> usize {
        self.chunks.iter().filter(|c| c.error.is_some()).count()
    }
}

/// Outcome of one row-chunk model call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkReport {
    /// 0-based position of the chunk within the statement.
    pub index: usize,
    /// Stable chunk identifier.
    pub id: String,
    /// Raw records the model returned for this chunk (before validation).
    pub records: usize,
    pub retries: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ChunkError>,
}

/// Aggregate statistics for the run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionStats {
    pub total_pages: usize,
    /// Pages whose text came from the OCR fallback.
    pub ocr_pages: usize,
    /// Pages that yielded no text from either path.
    pub failed_pages: Vec<usize>,
    pub row_chunks: usize,
    /// Model round-trips made (row chunks plus bank-name detection),
    /// counting only first attempts, not retries.
    pub model_calls: usize,
    /// Raw records returned by the model across all chunks.
    pub records_extracted: usize,
    /// Records surviving post-processing.
    pub records_kept: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub extract_duration_ms: u64,
    pub model_duration_ms: u64,
    pub total_duration_ms: u64,
}
