//! Configuration for table extraction and transcription.
//!
//! Every knob lives in [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. Keeping the whole configuration in one
//! struct makes it trivial to share across tasks, log, and diff two runs
//! to understand why their outputs differ.

use crate::error::ExtractError;
use crate::pipeline::capture::CaptureRoutine;
use crate::progress::ExtractionProgressCallback;
use crate::provider::VisionProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Configuration for a table-extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2table::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .dpi(200)
///     .provider_name("anthropic")
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rendering DPI used when rasterising a page for cropping. Range: 72–400. Default: 200.
    ///
    /// Document coordinates are 72 DPI, so the pixel scale factor is
    /// `dpi / 72.0`. 200 DPI keeps small table text legible to a vision
    /// model without producing oversized crops.
    pub dpi: u32,

    /// Minimum candidate bounding-box width and height in document units. Default: 50.0.
    ///
    /// Regions smaller than this in either dimension are almost always
    /// detector noise (decorative boxes, underlines), never real tables.
    pub min_region_size: f32,

    /// Minimum extracted row count for a candidate. Default: 2.
    ///
    /// A single-row "table" is indistinguishable from a ruled heading.
    pub min_rows: usize,

    /// Minimum characters of extracted text inside the bbox. Default: 30.
    ///
    /// Graphics-only regions misdetected as tables carry almost no text.
    pub min_text_chars: usize,

    /// Maximum vector line primitives tolerated inside the bbox. Default: 5.
    ///
    /// Charts and diagrams carry many stroke primitives that are not table
    /// rules; beyond this count the region is treated as a graphic.
    pub max_graphic_lines: usize,

    /// Number of concurrent vision-model calls. Default: 4.
    ///
    /// Verification and transcription calls are independent network
    /// round-trips with no shared state, so they parallelise freely.
    /// Lower this if the provider rate-limits.
    pub concurrency: usize,

    /// Maximum retry attempts for a failed verification call. Default: 3.
    ///
    /// Transcription calls are deliberately not retried; see
    /// [`crate::pipeline::transcribe`].
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt (500 ms → 1 s → 2 s), capped at 60 s.
    pub retry_backoff_ms: u64,

    /// Per-API-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Vision provider name ("anthropic"/"claude" or "gemini").
    /// Required unless `provider` is set.
    pub provider_name: Option<String>,

    /// API key for the named provider. If `None`, read from the provider's
    /// environment variable (`ANTHROPIC_API_KEY` / `GEMINI_API_KEY`).
    pub api_key: Option<String>,

    /// Model identifier override. If `None`, the provider default is used.
    pub model: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn VisionProvider>>,

    /// Custom verification prompt. If `None`, [`crate::prompts::VERIFY_PROMPT`].
    pub verify_prompt: Option<String>,

    /// Custom transcription prompt. If `None`, [`crate::prompts::TRANSCRIBE_PROMPT`].
    pub transcribe_prompt: Option<String>,

    /// Strict verdict parsing: require the response's leading token to equal
    /// the affirmative literal instead of substring containment. Default: false.
    ///
    /// The substring match is the original, validated behaviour; the strict
    /// parse avoids accepting responses like "False, this is not True".
    pub strict_verdict: bool,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Directory for transient crops awaiting verification. Default: `temp_images`.
    pub temp_image_dir: PathBuf,

    /// Directory for verified table crops. Default: `table_images`.
    pub table_image_dir: PathBuf,

    /// Directory for transcribed HTML files. Default: `output_html`.
    pub html_dir: PathBuf,

    /// Replacement detection+capture routine. If `None`, the built-in
    /// pdfium-based capture is used. This is the designed extension point
    /// for alternative page-layout engines.
    pub capture: Option<Arc<dyn CaptureRoutine>>,

    /// Cooperative cancellation flag, checked between items (never mid-call).
    pub cancel_flag: Option<Arc<AtomicBool>>,

    /// Progress callback for per-item events.
    pub progress_callback: Option<Arc<dyn ExtractionProgressCallback>>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            min_region_size: 50.0,
            min_rows: 2,
            min_text_chars: 30,
            max_graphic_lines: 5,
            concurrency: 4,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            provider_name: None,
            api_key: None,
            model: None,
            provider: None,
            verify_prompt: None,
            transcribe_prompt: None,
            strict_verdict: false,
            password: None,
            temp_image_dir: PathBuf::from("temp_images"),
            table_image_dir: PathBuf::from("table_images"),
            html_dir: PathBuf::from("output_html"),
            capture: None,
            cancel_flag: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("min_region_size", &self.min_region_size)
            .field("min_rows", &self.min_rows)
            .field("min_text_chars", &self.min_text_chars)
            .field("max_graphic_lines", &self.max_graphic_lines)
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn VisionProvider>"))
            .field("strict_verdict", &self.strict_verdict)
            .field("temp_image_dir", &self.temp_image_dir)
            .field("table_image_dir", &self.table_image_dir)
            .field("html_dir", &self.html_dir)
            .field("capture", &self.capture.as_ref().map(|_| "<dyn CaptureRoutine>"))
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

    /// The document-space → pixel scale factor (`dpi / 72.0`).
    pub fn scale(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn min_region_size(mut self, units: f32) -> Self {
        self.config.min_region_size = units.max(0.0);
        self
    }

    pub fn min_rows(mut self, n: usize) -> Self {
        self.config.min_rows = n;
        self
    }

    pub fn min_text_chars(mut self, n: usize) -> Self {
        self.config.min_text_chars = n;
        self
    }

    pub fn max_graphic_lines(mut self, n: usize) -> Self {
        self.config.max_graphic_lines = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn VisionProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn verify_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.verify_prompt = Some(prompt.into());
        self
    }

    pub fn transcribe_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.transcribe_prompt = Some(prompt.into());
        self
    }

    pub fn strict_verdict(mut self, v: bool) -> Self {
        self.config.strict_verdict = v;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn temp_image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_image_dir = dir.into();
        self
    }

    pub fn table_image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.table_image_dir = dir.into();
        self
    }

    pub fn html_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.html_dir = dir.into();
        self
    }

    pub fn capture(mut self, routine: Arc<dyn CaptureRoutine>) -> Self {
        self.config.capture = Some(routine);
        self
    }

    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.config.cancel_flag = Some(flag);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn ExtractionProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(ExtractError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(ExtractError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.min_rows < 1 {
            return Err(ExtractError::InvalidConfig(
                "min_rows must be ≥ 1".into(),
            ));
        }
        if c.temp_image_dir == c.table_image_dir {
            return Err(ExtractError::InvalidConfig(
                "temp_image_dir and table_image_dir must differ".into(),
            ));
        }
        Ok(self.config)
    }
}
