//! Pipeline stages for statement-to-transaction extraction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (a different OCR engine, a different store)
//! without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ chunker ──▶ extract_text ──▶ normalize ──▶ llm ──▶ postprocess
//! (path/URL) (page      (native/OCR      (header,      (model  (sign, dedup,
//!            ranges)     per page)        row chunks)   calls)  canonical)
//! ```
//!
//! 1. [`input`]        — canonicalise the user-supplied path or URL to a local file
//! 2. [`chunker`]      — partition pages into ranges and materialise sub-documents;
//!    runs in `spawn_blocking` because pdfium is not async-safe
//! 3. [`extract_text`] — per-page native text with OCR fallback (also blocking)
//! 4. [`normalize`]    — pure text processing: header detection, noise stripping,
//!    row chunking
//! 5. [`llm`]          — the only stage with model I/O; retry/backoff lives here
//! 6. [`postprocess`]  — validation, sign resolution, canonicalisation

pub mod chunker;
pub mod extract_text;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod postprocess;
