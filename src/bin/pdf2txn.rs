//! CLI binary for pdf2txn.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` and prints the transaction array.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2txn::{
    extract_to_file, extract_transactions, ExtractionConfig, ExtractionProgressCallback,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a page-extraction progress bar followed by
/// per-row-chunk log lines. Chunk events may arrive out of order when
/// concurrency > 1.
struct CliProgressCallback {
    bar: ProgressBar,
    ocr_pages: AtomicUsize,
    chunk_errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Bar length is set by `on_extraction_start` once the PDF is open.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            ocr_pages: AtomicUsize::new(0),
            chunk_errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Reading");
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Reading {total_pages} pages…"))
        ));
    }

    fn on_page_extracted(&self, page_index: usize, via_ocr: bool, failed: bool) {
        if via_ocr {
            self.ocr_pages.fetch_add(1, Ordering::SeqCst);
        }
        if failed {
            self.bar.println(format!(
                "  {} Page {:>3}  {}",
                red("✗"),
                page_index + 1,
                red("no text recovered")
            ));
        } else if via_ocr {
            self.bar.println(format!(
                "  {} Page {:>3}  {}",
                green("✓"),
                page_index + 1,
                dim("via OCR")
            ));
        }
        self.bar.inc(1);
    }

    fn on_chunk_start(&self, chunk_index: usize, total_chunks: usize) {
        self.bar.set_prefix("Extracting");
        self.bar
            .set_message(format!("rows {}/{}", chunk_index + 1, total_chunks));
    }

    fn on_chunk_complete(&self, chunk_index: usize, total_chunks: usize, records: usize) {
        self.bar.println(format!(
            "  {} Rows {:>3}/{:<3}  {}",
            green("✓"),
            chunk_index + 1,
            total_chunks,
            dim(&format!("{records} records")),
        ));
    }

    fn on_chunk_error(&self, chunk_index: usize, total_chunks: usize, error: &str) {
        self.chunk_errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Rows {:>3}/{:<3}  {}",
            red("✗"),
            chunk_index + 1,
            total_chunks,
            red(&msg),
        ));
    }

    fn on_extraction_complete(&self, transactions: usize) {
        self.bar.finish_and_clear();
        let errors = self.chunk_errors.load(Ordering::SeqCst);
        if errors == 0 {
            eprintln!(
                "{} {} transactions extracted",
                green("✔"),
                bold(&transactions.to_string())
            );
        } else {
            eprintln!(
                "{} {} transactions extracted  ({} row chunks failed)",
                cyan("⚠"),
                bold(&transactions.to_string()),
                red(&errors.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic extraction (JSON array to stdout)
  pdf2txn statement.pdf

  # Write to a file
  pdf2txn statement.pdf -o transactions.json

  # Encrypted statement
  pdf2txn statement.pdf --password hunter2

  # Use a specific model
  pdf2txn --model gpt-4.1-mini --provider openai statement.pdf

  # Extract from a URL
  pdf2txn https://example.com/statement.pdf -o txns.json

  # Full run report (stats, per-chunk outcomes)
  pdf2txn --json statement.pdf > report.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium

SETUP:
  1. Install OCR fallback:  apt install tesseract-ocr   (scanned statements only)
  2. Set API key:           export OPENAI_API_KEY=sk-...
  3. Extract:               pdf2txn statement.pdf -o transactions.json
"#;

/// Extract transactions from bank-statement PDFs using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2txn",
    version,
    about = "Extract a normalised transaction list from bank-statement PDFs",
    long_about = "Extract transactions from bank-statement PDFs (local files or URLs) into a \
normalised JSON array. Native PDF text is used where available, with an OCR fallback for \
scanned pages; an LLM transcribes the cleaned statement rows and every record is validated \
and sign-corrected before output.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the transaction array to this file instead of stdout.
    #[arg(short, long, env = "PDF2TXN_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// PDF user password for encrypted statements.
    #[arg(long, env = "PDF2TXN_PASSWORD")]
    password: Option<String>,

    /// Cleaned statement rows per model call.
    #[arg(long, env = "PDF2TXN_ROWS_PER_CHUNK", default_value_t = 50)]
    rows_per_chunk: usize,

    /// Pages per chunk when splitting for distributed processing.
    #[arg(long, env = "PDF2TXN_MAX_PAGES_PER_CHUNK", default_value_t = 4)]
    max_pages_per_chunk: usize,

    /// Binarisation threshold for the OCR fallback (0-255).
    #[arg(long, env = "PDF2TXN_OCR_THRESHOLD", default_value_t = 150)]
    ocr_threshold: u8,

    /// Number of concurrent model calls.
    #[arg(short, long, env = "PDF2TXN_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Total attempts per model call on rate-limit failures.
    #[arg(long, env = "PDF2TXN_MAX_ATTEMPTS", default_value_t = 5)]
    max_attempts: u32,

    /// Max model output tokens per row chunk.
    #[arg(long, env = "PDF2TXN_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Model temperature (0.0-2.0).
    #[arg(long, env = "PDF2TXN_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2TXN_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-model-call timeout in seconds.
    #[arg(long, env = "PDF2TXN_API_TIMEOUT", default_value_t = 30)]
    api_timeout: u64,

    /// Output the full run report (stats, per-chunk outcomes) instead of
    /// the bare transaction array.
    #[arg(long, env = "PDF2TXN_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "PDF2TXN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TXN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the result.
    #[arg(short, long, env = "PDF2TXN_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let mut builder = ExtractionConfig::builder()
        .rows_per_chunk(cli.rows_per_chunk)
        .max_pages_per_chunk(cli.max_pages_per_chunk)
        .ocr_threshold(cli.ocr_threshold)
        .concurrency(cli.concurrency)
        .max_attempts(cli.max_attempts)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        builder = builder.progress_callback(cb as Arc<dyn ExtractionProgressCallback>);
    }

    let config = builder.build().context("Invalid configuration")?;

    // ── Run extraction ───────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let output = extract_to_file(&cli.input, output_path, &config)
            .await
            .context("Extraction failed")?;
        if !cli.quiet {
            eprintln!(
                "{} Wrote {} transactions to {}",
                green("✔"),
                bold(&output.transactions.len().to_string()),
                output_path.display()
            );
        }
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("Failed to serialise report")?
            );
        }
        return Ok(());
    }

    let output = extract_transactions(&cli.input, &config)
        .await
        .context("Extraction failed")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if cli.json {
        let report =
            serde_json::to_string_pretty(&output).context("Failed to serialise report")?;
        writeln!(handle, "{report}")?;
    } else {
        let json = output
            .transactions_json()
            .context("Failed to serialise transactions")?;
        writeln!(handle, "{json}")?;
    }

    Ok(())
}
