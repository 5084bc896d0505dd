//! Table transcription: verified image → HTML table file.
//!
//! One provider call per image with the structure-preserving prompt. A
//! non-empty response is success: it is post-processed, written to
//! `{image_stem}.html` in the HTML directory, and the source image is
//! deleted (its job is done). An empty response or a failed call is a
//! per-item failure — the image is kept for a later retry by the caller,
//! and the batch continues. No retry happens here: transcription retries
//! are an orchestration-layer concern, unlike the gate's cheap yes/no
//! calls.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, ItemError};
use crate::output::{TranscriptionOutput, TranscriptionResult};
use crate::pipeline::postprocess;
use crate::prompts::{REPAIR_PROMPT, TRANSCRIBE_PROMPT};
use crate::provider::{ImageData, VisionProvider};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Transcribe a batch of verified table images.
///
/// Items are independent and run under the configured concurrency bound.
/// Cancellation is checked before each item is issued. Results preserve
/// input order; failures go to the failure list, never silently dropped.
pub async fn transcribe_images(
    provider: &Arc<dyn VisionProvider>,
    images: &[PathBuf],
    config: &ExtractionConfig,
) -> TranscriptionOutput {
    let mut indexed: Vec<(usize, Result<TranscriptionResult, ItemError>)> =
        stream::iter(images.iter().cloned().enumerate().map(|(i, path)| {
            let provider = Arc::clone(provider);
            let config = config.clone();
            async move {
                if let Some(ref flag) = config.cancel_flag {
                    if flag.load(Ordering::SeqCst) {
                        return (
                            i,
                            Err(ItemError::Cancelled {
                                image: file_name(&path),
                            }),
                        );
                    }
                }
                let result = transcribe_one(&provider, &path, &config).await;
                if let Some(ref cb) = config.progress_callback {
                    match &result {
                        Ok(r) => cb.on_item_transcribed(&file_name(&r.image), r.html.len()),
                        Err(e) => cb.on_item_failed(e.item(), &e.to_string()),
                    }
                }
                (i, result)
            }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    indexed.sort_by_key(|(i, _)| *i);

    let mut results = Vec::new();
    let mut failures = Vec::new();
    for (_, r) in indexed {
        match r {
            Ok(result) => results.push(result),
            Err(e) => failures.push(e),
        }
    }
    TranscriptionOutput { results, failures }
}

/// Transcribe a single image to an HTML file.
pub async fn transcribe_one(
    provider: &Arc<dyn VisionProvider>,
    image_path: &Path,
    config: &ExtractionConfig,
) -> Result<TranscriptionResult, ItemError> {
    let image_name = file_name(image_path);

    let image = tokio::fs::read(image_path)
        .await
        .map(|bytes| ImageData::from_png_bytes(&bytes))
        .map_err(|e| ItemError::FileOpFailed {
            path: image_name.clone(),
            detail: format!("read failed: {e}"),
        })?;

    let prompt = config
        .transcribe_prompt
        .as_deref()
        .unwrap_or(TRANSCRIBE_PROMPT);

    let response = provider
        .generate(prompt, Some(&image))
        .await
        .map_err(|e| ItemError::TranscriptionFailed {
            image: image_name.clone(),
            detail: e.to_string(),
        })?;

    let html = postprocess::clean_html(&response);
    if html.trim().is_empty() {
        return Err(ItemError::EmptyTranscription { image: image_name });
    }

    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| image_name.clone());
    let html_path = config.html_dir.join(format!("{stem}.html"));

    tokio::fs::write(&html_path, &html)
        .await
        .map_err(|e| ItemError::FileOpFailed {
            path: html_path.to_string_lossy().to_string(),
            detail: format!("write failed: {e}"),
        })?;
    info!("HTML table saved to {}", html_path.display());

    // The verified crop has served its purpose; failure to remove it is
    // log-worthy but not an error.
    if let Err(e) = tokio::fs::remove_file(image_path).await {
        warn!("Error deleting {}: {}", image_path.display(), e);
    }

    Ok(TranscriptionResult {
        image: image_path.to_path_buf(),
        html,
        html_path,
    })
}

/// Optional idempotent repair pass over a previously generated HTML table.
///
/// Asks the model to re-validate the table's row/column spans. Returns the
/// corrected table, or the input unchanged when the model judges it
/// well-formed (or answers with nothing usable — cell content is never
/// dropped by this pass). Not wired into the main pipeline.
pub async fn repair_table(
    provider: &Arc<dyn VisionProvider>,
    html: &str,
) -> Result<String, ExtractError> {
    let prompt = format!("{REPAIR_PROMPT}\n\n{html}");
    let response = provider.generate(&prompt, None).await?;
    let repaired = postprocess::clean_html(&response);
    if repaired.trim().is_empty() {
        debug!("Repair pass returned nothing usable; keeping original table");
        return Ok(html.to_string());
    }
    Ok(repaired)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
