//! # pdf2txn
//!
//! Extract a normalised transaction list from bank-statement PDFs using an
//! LLM for record extraction.
//!
//! ## Why this crate?
//!
//! Bank statements are the worst kind of PDF: every issuer has its own
//! column layout, sign convention (`Debit`/`Credit` columns, `Dr`/`Cr`
//! indicators, bare signed amounts), and a tail of legend text that looks
//! exactly like transactions. Template-based parsers break on the next
//! bank. This crate instead extracts the raw text (falling back to OCR for
//! scanned statements), strips the noise deterministically, and lets a
//! model transcribe the surviving rows — then validates and sign-corrects
//! every record before it reaches the caller.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Extract    per-page native text, OCR fallback (spawn_blocking)
//!  ├─ 3. Normalise  header detection, noise stripping, 50-row chunks
//!  ├─ 4. Model      concurrent record extraction per row chunk
//!  ├─ 5. Validate   sign resolution, denylist, balance coercion
//!  └─ 6. Output     JSON transaction array + per-chunk stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2txn::{extract_transactions, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = ExtractionConfig::default();
//!     let output = extract_transactions("statement.pdf", &config).await?;
//!     println!("{}", output.transactions_json()?);
//!     eprintln!(
//!         "{} transactions, {} of {} pages via OCR",
//!         output.transactions.len(),
//!         output.stats.ocr_pages,
//!         output.stats.total_pages
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Distributed processing
//!
//! For large statements or queue-based deployments, [`split::split_job`]
//! materialises page-range chunks into a [`store::ChunkStore`] and emits
//! one [`WorkItem`] per chunk; [`worker::process_work_item`] processes a
//! redelivered-at-least-once item idempotently, and [`JobProgress`] tracks
//! completion with idempotent per-chunk state transitions.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2txn` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2txn = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod jobs;
pub mod notify;
pub mod ocr;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod retry;
pub mod split;
pub mod store;
pub mod transaction;
pub mod worker;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ChunkError, ExtractError};
pub use extract::{extract_to_file, extract_transactions};
pub use jobs::{ChunkState, JobProgress, JobRequest, WorkItem};
pub use output::{ChunkReport, ExtractionOutput, ExtractionStats};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback};
pub use transaction::{RawRecord, RawTransaction, Transaction};
