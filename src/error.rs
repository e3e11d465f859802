//! Error types for the pdf2txn library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal**: the extraction cannot proceed at all
//!   (bad input file, wrong password, wholly unreadable document, provider
//!   not configured). Returned as `Err(ExtractError)` from the top-level
//!   entry points.
//!
//! * [`ChunkError`] — **Non-fatal**: a single page-range chunk or row chunk
//!   failed (no recoverable text, model retries exhausted) but the rest of
//!   the document is fine. Stored inside [`crate::output::ChunkReport`] so
//!   callers can inspect partial success instead of losing the whole
//!   statement to one bad chunk.
//!
//! The separation mirrors the processing model: only document-level
//! structural failures abort a run; everything per-chunk or per-record is
//! recovered, logged, and reported.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2txn library.
///
/// Chunk-level failures use [`ChunkError`] and are stored in
/// [`crate::output::ChunkReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Document errors ───────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// No text could be recovered from any page, native or OCR.
    #[error("PDF '{path}' yielded no text on any of its {pages} pages (empty or non-standard statement)")]
    EmptyDocument { path: PathBuf, pages: usize },

    // ── Job errors ────────────────────────────────────────────────────────
    /// A job submission was missing a required field.
    #[error("Missing job parameter: {0}")]
    MissingJobParameter(&'static str),

    /// A chunk could not be written to or read from the chunk store.
    #[error("Chunk store operation failed for key '{key}': {detail}")]
    Storage { key: String, detail: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single chunk.
///
/// Stored inside [`crate::output::ChunkReport`] when a chunk fails.
/// The overall extraction continues for the sibling chunks.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ChunkError {
    /// Neither native extraction nor OCR recovered any text for the chunk.
    #[error("Chunk {chunk}: no text recoverable from any of its {pages} pages")]
    Unreadable { chunk: String, pages: usize },

    /// The model call failed after all retries; the chunk yields no records.
    #[error("Chunk {chunk}: model call failed after {attempts} attempts: {detail}")]
    ModelFailed {
        chunk: String,
        attempts: u32,
        detail: String,
    },

    /// The model replied with something that is not a transaction array.
    #[error("Chunk {chunk}: malformed model response: {detail}")]
    MalformedResponse { chunk: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_required_display() {
        let e = ExtractError::PasswordRequired {
            path: PathBuf::from("stmt.pdf"),
        };
        assert!(e.to_string().contains("password"));
    }

    #[test]
    fn empty_document_display() {
        let e = ExtractError::EmptyDocument {
            path: PathBuf::from("stmt.pdf"),
            pages: 12,
        };
        let msg = e.to_string();
        assert!(msg.contains("12 pages"), "got: {msg}");
    }

    #[test]
    fn missing_job_parameter_display() {
        let e = ExtractError::MissingJobParameter("jobId");
        assert!(e.to_string().contains("jobId"));
    }

    #[test]
    fn chunk_error_display() {
        let e = ChunkError::ModelFailed {
            chunk: "chunk_0_3".into(),
            attempts: 5,
            detail: "rate limit".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("chunk_0_3"));
        assert!(msg.contains("5 attempts"));
    }

    #[test]
    fn chunk_error_round_trips_through_json() {
        let e = ChunkError::Unreadable {
            chunk: "chunk_4_7".into(),
            pages: 4,
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: ChunkError = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, ChunkError::Unreadable { pages: 4, .. }));
    }
}
