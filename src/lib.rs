//! # pdf2table
//!
//! Extract tables from PDF documents as cropped images and HTML, using a
//! vision model as both a verification gate and a transcription engine.
//!
//! ## Pipeline
//!
//! 1. **Detect** — scan each page's vector geometry for ruled grids and
//!    keep candidates that pass the row/size/text/graphics heuristics.
//! 2. **Capture** — render each page at the configured DPI and crop every
//!    surviving candidate to a PNG in the temp directory.
//! 3. **Verify** — ask the vision model a yes/no question per crop;
//!    accepted crops move to the table-image directory, denied crops are
//!    deleted.
//! 4. **Transcribe** — ask the model for a structure-preserving HTML table
//!    per verified crop and write `{image_stem}.html`.
//!
//! Stages 3 and 4 run their items concurrently with retry/backoff; a
//! failed item never aborts the batch.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use pdf2table::{extract_and_transcribe, ExtractionConfig};
//! use std::path::Path;
//!
//! # async fn run() -> Result<(), pdf2table::ExtractError> {
//! let config = ExtractionConfig::builder()
//!     .provider_name("anthropic")
//!     .dpi(200)
//!     .build()?;
//!
//! let (extraction, transcription) =
//!     extract_and_transcribe(Path::new("report.pdf"), &config).await?;
//! println!(
//!     "{} tables verified, {} transcribed",
//!     extraction.table_images.len(),
//!     transcription.results.len()
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Extension points
//!
//! * [`VisionProvider`] — bring your own model backend (the built-ins are
//!   Anthropic and Gemini, selected by name via [`create_provider`]).
//! * [`CaptureRoutine`] — replace the pdfium-based detection + cropping
//!   with another page-layout engine.
//! * [`ExtractionProgressCallback`] — observe per-item progress.

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompt_store;
pub mod prompts;
pub mod provider;
pub mod session;

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ExtractError, ItemError};
pub use extract::{extract_and_transcribe, extract_batch, extract_tables};
pub use output::{
    BatchOutput, DocumentResult, ExtractionOutput, ExtractionStats, GateOutcome, TableImage,
    TranscriptionOutput, TranscriptionResult,
};
pub use pipeline::capture::{table_image_name, CaptureRoutine, PdfiumCapture};
pub use pipeline::transcribe::{repair_table, transcribe_images};
pub use pipeline::verify::verify_images;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback};
pub use prompt_store::{record_prompt, records_by_stage, PromptRecord};
pub use provider::{create_provider, ImageData, VisionProvider, AVAILABLE_PROVIDERS};
pub use session::SessionContext;
