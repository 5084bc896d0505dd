//! CLI binary for pdf2table.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` and prints per-item results and a summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2table::{
    extract_batch, transcribe_images, DocumentResult, ExtractionConfig,
    ExtractionProgressCallback,
};
use std::io;
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

/// Terminal progress callback: a live bar plus per-item log lines. Items
/// complete out-of-order under concurrency, so every counter is atomic.
struct CliProgressCallback {
    bar: ProgressBar,
    verified: AtomicUsize,
    rejected: AtomicUsize,
    failed: AtomicUsize,
}

impl CliProgressCallback {
    /// Bar length is set dynamically by `on_capture_complete` once the
    /// candidate count is known.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("Detecting table candidates…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            verified: AtomicUsize::new(0),
            rejected: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} candidates  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Verifying");
    }

    fn truncated(error: &str) -> String {
        if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error.to_string()
        }
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_capture_complete(&self, candidates: usize) {
        self.activate_bar(candidates);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{candidates} table candidates captured"))
        ));
    }

    fn on_item_verified(&self, image: &str) {
        self.verified.fetch_add(1, Ordering::SeqCst);
        self.bar
            .println(format!("  {} {}  {}", green("✓"), image, dim("table")));
        self.bar.inc(1);
    }

    fn on_item_rejected(&self, image: &str) {
        self.rejected.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {}  {}",
            yellow("○"),
            dim(image),
            dim("not a table, skipped")
        ));
        self.bar.inc(1);
    }

    fn on_item_failed(&self, image: &str, error: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {}  {}",
            red("✗"),
            image,
            red(&Self::truncated(error))
        ));
        self.bar.inc(1);
    }

    fn on_item_transcribed(&self, image: &str, html_len: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            image,
            dim(&format!("{html_len} bytes of HTML"))
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract and transcribe every table in a document
  pdf2table report.pdf

  # Several documents in one run
  pdf2table q1.pdf q2.pdf q3.pdf

  # Pick the provider and model explicitly
  pdf2table --provider gemini --model gemini-1.5-pro-002 report.pdf

  # Keep the verified crops, skip transcription
  pdf2table --no-transcribe report.pdf

  # Higher-resolution crops, fewer concurrent calls
  pdf2table --dpi 300 --concurrency 2 report.pdf

SUPPORTED PROVIDERS:
  anthropic (alias: claude)   default model claude-3-5-sonnet-20241022
  gemini                      default model gemini-1.5-pro-002

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY    Anthropic API key
  GEMINI_API_KEY       Google Gemini API key
  PDFIUM_LIB_PATH      Path to an existing libpdfium

OUTPUT LAYOUT:
  table_images/   verified table crops (PNG)
  output_html/    one HTML file per transcribed table
  temp_images/    transient crops awaiting verification (emptied each run)
"#;

/// Extract tables from PDFs as images and HTML using vision models.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2table",
    version,
    about = "Extract tables from PDFs as images and HTML using vision models",
    long_about = "Detect table candidates in PDF documents, crop them as PNG images, \
confirm each one with a vision model, and transcribe the confirmed tables to \
structure-preserving HTML. Supports Anthropic and Google Gemini.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// One or more local PDF files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Vision provider: anthropic (alias claude) or gemini.
    #[arg(long, env = "PDF2TABLE_PROVIDER", default_value = "anthropic")]
    provider: String,

    /// Model ID override (provider default used when unset).
    #[arg(long, env = "PDF2TABLE_MODEL")]
    model: Option<String>,

    /// API key (read from the provider's env var when unset).
    #[arg(long, env = "PDF2TABLE_API_KEY")]
    api_key: Option<String>,

    /// Rendering DPI for page rasterisation (72–400).
    #[arg(long, env = "PDF2TABLE_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Number of concurrent vision-model calls.
    #[arg(short, long, env = "PDF2TABLE_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Retries per candidate on verification failure.
    #[arg(long, env = "PDF2TABLE_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-API-call timeout in seconds.
    #[arg(long, env = "PDF2TABLE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2TABLE_PASSWORD")]
    password: Option<String>,

    /// Directory for transient candidate crops.
    #[arg(long, env = "PDF2TABLE_TEMP_DIR", default_value = "temp_images")]
    temp_dir: PathBuf,

    /// Directory for verified table crops.
    #[arg(long, env = "PDF2TABLE_TABLE_DIR", default_value = "table_images")]
    table_dir: PathBuf,

    /// Directory for transcribed HTML files.
    #[arg(long, env = "PDF2TABLE_HTML_DIR", default_value = "output_html")]
    html_dir: PathBuf,

    /// Stop after the verification gate; keep crops, write no HTML.
    #[arg(long, env = "PDF2TABLE_NO_TRANSCRIBE")]
    no_transcribe: bool,

    /// Require the model verdict to lead with True/False instead of
    /// accepting any response containing "True".
    #[arg(long, env = "PDF2TABLE_STRICT_VERDICT")]
    strict_verdict: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2TABLE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TABLE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2TABLE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar supplies all routine feedback; library INFO logs
    // would tear it up.
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
    let progress_cb = if show_progress {
        Some(CliProgressCallback::new_dynamic())
    } else {
        None
    };

    let mut builder = ExtractionConfig::builder()
        .dpi(cli.dpi)
        .concurrency(cli.concurrency)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .provider_name(cli.provider.clone())
        .strict_verdict(cli.strict_verdict)
        .temp_image_dir(cli.temp_dir.clone())
        .table_image_dir(cli.table_dir.clone())
        .html_dir(cli.html_dir.clone());
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref cb) = progress_cb {
        builder = builder.progress_callback(
            Arc::clone(cb) as Arc<dyn ExtractionProgressCallback>
        );
    }
    let config = builder.build().context("Invalid configuration")?;

    // ── Extraction gate ──────────────────────────────────────────────────
    let batch = extract_batch(&cli.inputs, &config).await;

    let mut verified_paths = Vec::new();
    let mut accepted = 0usize;
    let mut rejected = 0usize;
    let mut item_failures = 0usize;
    for doc in &batch.documents {
        if let DocumentResult::Processed { output, .. } = doc {
            accepted += output.stats.accepted;
            rejected += output.stats.rejected;
            item_failures += output.stats.failed;
            verified_paths.extend(output.image_paths());
        }
    }

    // ── Transcription ────────────────────────────────────────────────────
    let mut transcribed = 0usize;
    let mut transcription_failures = 0usize;
    if !cli.no_transcribe && !verified_paths.is_empty() {
        if let Some(ref cb) = progress_cb {
            cb.bar.set_prefix("Transcribing");
        }
        let provider = pdf2table::create_provider(
            &cli.provider,
            config.api_key.as_deref(),
            config.model.as_deref(),
            config.api_timeout_secs,
        )
        .context("Provider setup failed")?;
        let output = transcribe_images(&provider, &verified_paths, &config).await;
        transcribed = output.results.len();
        transcription_failures = output.failures.len();
    }

    if let Some(ref cb) = progress_cb {
        cb.bar.finish_and_clear();
    }

    // ── Summary ──────────────────────────────────────────────────────────
    let doc_failures = batch.failed_documents();
    if !cli.quiet {
        eprintln!(
            "{} {} tables verified  {} skipped  {} failed",
            if item_failures == 0 && doc_failures.is_empty() {
                green("✔")
            } else {
                cyan("⚠")
            },
            bold(&accepted.to_string()),
            rejected,
            item_failures,
        );
        if !cli.no_transcribe {
            eprintln!(
                "  {} HTML files in {}  ({} transcription failures)",
                bold(&transcribed.to_string()),
                cli.html_dir.display(),
                transcription_failures,
            );
        } else {
            eprintln!("  crops kept in {}", cli.table_dir.display());
        }
        for (pdf, error) in &doc_failures {
            eprintln!("  {} {}: {}", red("✘"), pdf.display(), red(error));
        }
    }

    if accepted == 0 && !doc_failures.is_empty() && doc_failures.len() == batch.documents.len() {
        anyhow::bail!("All {} documents failed", doc_failures.len());
    }
    Ok(())
}
