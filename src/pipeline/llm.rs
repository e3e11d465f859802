//! Model interaction: record extraction per row chunk and one-shot
//! bank-name detection.
//!
//! This module is intentionally thin — all prompt engineering lives in
//! [`crate::prompts`] and the retry loop in [`crate::retry`], so the code
//! here is only message assembly, response unwrapping, and bookkeeping.
//!
//! ## Failure model
//!
//! Nothing in this module propagates an error upward. A row chunk whose
//! model call fails (rate limits exhausted, transport dead, reply not JSON)
//! yields an empty record list plus a [`ChunkError`] in its result; sibling
//! chunks are unaffected. Bank-name detection failure simply yields `None`.

use crate::config::ExtractionConfig;
use crate::error::ChunkError;
use crate::pipeline::extract_text::Page;
use crate::prompts::{bank_name_prompt, record_extraction_prompt};
use crate::retry::RetryPolicy;
use crate::transaction::RawRecord;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of one row-chunk model call.
#[derive(Debug, Clone)]
pub struct RowChunkResult {
    /// 0-based index of the row chunk within the statement.
    pub index: usize,
    pub records: Vec<RawRecord>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
    pub retries: u8,
    /// Set when the chunk yielded no usable records because of a failure.
    pub error: Option<ChunkError>,
}

/// Envelope keys under which models wrap the transaction array.
const ENVELOPE_KEYS: &[&str] = &["value", "items", "data"];

/// Errors worth retrying: rate limiting and transient transport faults.
fn is_retryable(detail: &str) -> bool {
    let lower = detail.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("429")
        || lower.contains("503")
        || lower.contains("overloaded")
        || lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("connection")
}

fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// One model round-trip with the per-call timeout applied.
///
/// The timeout must stay short relative to any queue visibility window; a
/// stuck call that outlives visibility causes duplicate delivery and
/// duplicate model spend.
async fn chat_once(
    provider: &Arc<dyn LLMProvider>,
    messages: &[ChatMessage],
    options: &CompletionOptions,
    timeout_secs: u64,
) -> Result<(String, u64, u64), String> {
    let call = provider.chat(messages, Some(options));
    match tokio::time::timeout(Duration::from_secs(timeout_secs), call).await {
        Ok(Ok(response)) => Ok((
            response.content,
            response.prompt_tokens as u64,
            response.completion_tokens as u64,
        )),
        Ok(Err(e)) => Err(format!("{}", e)),
        Err(_) => Err(format!("model call timed out after {}s", timeout_secs)),
    }
}

/// Extract raw transaction records from one row chunk.
///
/// Retries rate-limit and transport failures with linear backoff; any other
/// failure (or retry exhaustion, or a malformed reply) produces an empty
/// record list with the error recorded — never a propagated error.
pub async fn extract_records(
    provider: &Arc<dyn LLMProvider>,
    index: usize,
    chunk_id: &str,
    row_chunk: &str,
    header_row: &str,
    bank_name: Option<&str>,
    config: &ExtractionConfig,
) -> RowChunkResult {
    let start = Instant::now();
    let prompt = record_extraction_prompt(row_chunk, header_row, bank_name);
    let messages = vec![ChatMessage::user(prompt)];
    let options = build_options(config);

    let policy = RetryPolicy::linear(config.max_attempts, config.retry_backoff_secs);
    let attempts = std::sync::atomic::AtomicU32::new(0);

    let outcome = policy
        .run(
            || {
                attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                chat_once(provider, &messages, &options, config.api_timeout_secs)
            },
            |e| is_retryable(e),
        )
        .await;

    let attempts = attempts.load(std::sync::atomic::Ordering::SeqCst);
    let retries = attempts.saturating_sub(1) as u8;
    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok((content, input_tokens, output_tokens)) => {
            debug!(
                "chunk {}: {} input tokens, {} output tokens, {}ms",
                chunk_id, input_tokens, output_tokens, duration_ms
            );
            match parse_records(&content) {
                Ok(records) => RowChunkResult {
                    index,
                    records,
                    input_tokens,
                    output_tokens,
                    duration_ms,
                    retries,
                    error: None,
                },
                Err(detail) => {
                    warn!("chunk {}: malformed model response: {}", chunk_id, detail);
                    RowChunkResult {
                        index,
                        records: Vec::new(),
                        input_tokens,
                        output_tokens,
                        duration_ms,
                        retries,
                        error: Some(ChunkError::MalformedResponse {
                            chunk: chunk_id.to_string(),
                            detail,
                        }),
                    }
                }
            }
        }
        Err(detail) => {
            warn!(
                "chunk {}: model call failed after {} attempts: {}",
                chunk_id, attempts, detail
            );
            RowChunkResult {
                index,
                records: Vec::new(),
                input_tokens: 0,
                output_tokens: 0,
                duration_ms,
                retries,
                error: Some(ChunkError::ModelFailed {
                    chunk: chunk_id.to_string(),
                    attempts,
                    detail,
                }),
            }
        }
    }
}

/// Detect the issuing bank once per document from the statement's opening
/// pages. Any failure yields `None`; per-record bank names are the fallback.
pub async fn detect_bank_name(
    provider: &Arc<dyn LLMProvider>,
    pages: &[Page],
    config: &ExtractionConfig,
) -> Option<String> {
    let mut leading = String::new();
    for page in pages.iter().filter(|p| p.index < 2) {
        if let Some(ref text) = page.text {
            leading.push_str(text);
            leading.push('\n');
        }
    }
    let leading = clip(&leading, config.bank_scan_char_budget);
    if leading.trim().is_empty() {
        return None;
    }

    let messages = vec![ChatMessage::user(bank_name_prompt(leading))];
    let options = build_options(config);
    let policy = RetryPolicy::linear(config.max_attempts, config.retry_backoff_secs);

    let outcome = policy
        .run(
            || chat_once(provider, &messages, &options, config.api_timeout_secs),
            |e| is_retryable(e),
        )
        .await;

    match outcome {
        Ok((content, _, _)) => {
            let name = first_token(&content)?;
            debug!("detected bank name: {}", name);
            Some(name)
        }
        Err(detail) => {
            warn!("bank-name detection failed: {}", detail);
            None
        }
    }
}

/// Keep only the first whitespace-separated token, trimmed of punctuation.
/// "unknown" (the prompt's can't-tell sentinel) maps to `None`.
fn first_token(reply: &str) -> Option<String> {
    let token = reply
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !c.is_alphanumeric());
    if token.is_empty() || token.len() > 40 || token.eq_ignore_ascii_case("unknown") {
        return None;
    }
    Some(token.to_string())
}

/// Truncate to at most `budget` bytes on a char boundary.
fn clip(text: &str, budget: usize) -> &str {
    if text.len() <= budget {
        return text;
    }
    let mut end = budget;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Parse a model reply into raw records.
///
/// Strips code fences, unwraps known envelopes, and deserialises each array
/// element. Elements that do not look like transactions survive as
/// [`RawRecord::Unknown`] so the post-processor can drop them with a log
/// line instead of this stage guessing.
pub fn parse_records(reply: &str) -> Result<Vec<RawRecord>, String> {
    let body = strip_fences(reply);
    let value: Value =
        serde_json::from_str(body).map_err(|e| format!("not valid JSON: {}", e))?;
    let items = unwrap_envelope(value)?;

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<RawRecord>(item) {
            Ok(record) => records.push(record),
            Err(e) => return Err(format!("unparseable array element: {}", e)),
        }
    }
    Ok(records)
}

/// Strip Markdown code-fence markers, including an optional language tag
/// immediately after the opening fence.
fn strip_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line ("json", "JSON", or nothing).
    let rest = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Accept a bare array, or an object wrapping the array under a known key.
fn unwrap_envelope(value: Value) -> Result<Vec<Value>, String> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            for key in ENVELOPE_KEYS {
                if let Some(Value::Array(items)) = map.remove(*key) {
                    return Ok(items);
                }
            }
            Err(format!(
                "object reply has none of the known envelope keys {:?}",
                ENVELOPE_KEYS
            ))
        }
        other => Err(format!("expected array, got {}", type_name(&other))),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
