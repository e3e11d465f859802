//! Configuration for statement extraction.
//!
//! All pipeline behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one struct
//! makes it trivial to share configs across tasks and to diff two runs when
//! their outputs disagree.
//!
//! # Design choice: injected provider, no hidden global
//! The model client is an explicitly constructed `Arc<dyn LLMProvider>`
//! passed in here (or resolved once at pipeline start from the provider
//! name / environment). There is no process-wide cached client.

use crate::error::ExtractError;
use crate::progress::ExtractionProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for a statement extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2txn::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .max_pages_per_chunk(4)
///     .rows_per_chunk(50)
///     .model("gpt-4.1-nano")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Maximum pages per page-range chunk. Default: 4.
    ///
    /// Four pages keeps each sub-document comfortably inside a single
    /// worker invocation while still amortising the per-chunk dispatch
    /// overhead across multiple pages.
    pub max_pages_per_chunk: usize,

    /// Maximum cleaned statement rows per model call. Default: 50.
    ///
    /// Fifty rows plus the repeated header row stays well inside the
    /// context window of every supported model while keeping the number of
    /// round-trips low for a typical monthly statement.
    pub rows_per_chunk: usize,

    /// Binarisation threshold for the OCR fallback path. Default: 150.
    ///
    /// Grayscale values above the threshold map to pure white, the rest to
    /// pure black. 150 suits the light-grey watermarks and faint table
    /// rules common on scanned bank statements.
    pub ocr_threshold: u8,

    /// Character budget for the bank-name detection call. Default: 4000.
    ///
    /// The issuer name is virtually always in the letterhead, so the first
    /// two pages truncated to this budget are plenty; sending more only
    /// spends tokens.
    pub bank_scan_char_budget: usize,

    /// Number of concurrent model calls for row chunks. Default: 4.
    pub concurrency: usize,

    /// LLM model identifier, e.g. "gpt-4.1-nano".
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, auto-detects from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the model completion. Default: 0.0.
    ///
    /// Transcription of tabular data wants full determinism; anything above
    /// zero invites invented merchants and shifted amounts.
    pub temperature: f32,

    /// Maximum tokens the model may generate per row chunk. Default: 2048.
    pub max_tokens: usize,

    /// Total attempts per model call on a retryable failure. Default: 5.
    ///
    /// Rate-limit (429) and transport errors are retried; anything else
    /// fails the attempt loop immediately and the chunk yields an empty
    /// result.
    pub max_attempts: u32,

    /// Linear backoff step in seconds (`step * attempt`). Default: 5.
    ///
    /// The wait sequence is 5 s → 10 s → 15 s → 20 s. Linear rather than
    /// exponential because rate-limit windows on the statement-parsing
    /// models reset on fixed intervals; doubling overshoots them.
    pub retry_backoff_secs: u64,

    /// PDF user password for encrypted statements.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-model-call timeout in seconds. Default: 30.
    ///
    /// Must stay short relative to any queue visibility timeout; a stuck
    /// call that outlives visibility causes duplicate delivery and
    /// duplicate model spend.
    pub api_timeout_secs: u64,

    /// Progress callback for per-page and per-chunk events. Default: None.
    pub progress_callback: Option<Arc<dyn ExtractionProgressCallback>>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_pages_per_chunk: 4,
            rows_per_chunk: 50,
            ocr_threshold: 150,
            bank_scan_char_budget: 4000,
            concurrency: 4,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 2048,
            max_attempts: 5,
            retry_backoff_secs: 5,
            password: None,
            download_timeout_secs: 120,
            api_timeout_secs: 30,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("max_pages_per_chunk", &self.max_pages_per_chunk)
            .field("rows_per_chunk", &self.rows_per_chunk)
            .field("ocr_threshold", &self.ocr_threshold)
            .field("bank_scan_char_budget", &self.bank_scan_char_budget)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_secs", &self.retry_backoff_secs)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn max_pages_per_chunk(mut self, n: usize) -> Self {
        self.config.max_pages_per_chunk = n.max(1);
        self
    }

    pub fn rows_per_chunk(mut self, n: usize) -> Self {
        self.config.rows_per_chunk = n.max(1);
        self
    }

    pub fn ocr_threshold(mut self, t: u8) -> Self {
        self.config.ocr_threshold = t;
        self
    }

    pub fn bank_scan_char_budget(mut self, n: usize) -> Self {
        self.config.bank_scan_char_budget = n.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn retry_backoff_secs(mut self, secs: u64) -> Self {
        self.config.retry_backoff_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn ExtractionProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.max_pages_per_chunk == 0 {
            return Err(ExtractError::InvalidConfig(
                "max_pages_per_chunk must be ≥ 1".into(),
            ));
        }
        if c.rows_per_chunk == 0 {
            return Err(ExtractError::InvalidConfig(
                "rows_per_chunk must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(ExtractError::InvalidConfig("concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}
