//! Top-level orchestration: validate input, run capture, gate, transcribe.
//!
//! The entry points are [`extract_tables`] for one document,
//! [`extract_batch`] for many, and [`extract_and_transcribe`] for the full
//! pipeline through to HTML files. All of them validate eagerly — input
//! file, output directories, provider resolution — so configuration
//! mistakes surface as a fatal [`ExtractError`] before any model call is
//! made or any file is written.

use crate::config::ExtractionConfig;
use crate::output::{
    BatchOutput, DocumentResult, ExtractionOutput, ExtractionStats, GateOutcome, TableImage,
    TranscriptionOutput,
};
use crate::pipeline::capture::{CaptureRoutine, PdfiumCapture};
use crate::pipeline::{transcribe, verify};
use crate::error::ExtractError;
use crate::provider::{self, VisionProvider};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract verified table images from one PDF.
///
/// Runs detection + capture on a blocking thread, then the concurrent
/// verification gate. On success the accepted crops sit in
/// `config.table_image_dir` and are listed (with provenance) in the
/// returned [`ExtractionOutput`]; rejected crops have been deleted.
pub async fn extract_tables(
    pdf: &Path,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    validate_input(pdf)?;
    prepare_dirs(config)?;
    let provider = resolve_provider(config)?;

    let capture_started = Instant::now();
    run_capture(pdf, config).await?;
    let capture_duration_ms = capture_started.elapsed().as_millis() as u64;

    let candidates = candidate_images(pdf, &config.temp_image_dir)?;
    info!(
        "{}: {} candidate images captured in {}ms",
        pdf.display(),
        candidates.len(),
        capture_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_capture_complete(candidates.len());
    }

    let candidate_count = candidates.len();
    let gate_started = Instant::now();
    let outcomes = verify::verify_images(&provider, candidates, config).await;
    let gate_duration_ms = gate_started.elapsed().as_millis() as u64;

    let mut table_images = Vec::new();
    let mut rejected = 0usize;
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            GateOutcome::Accepted { image } => match table_image_from_path(&image) {
                Some(t) => table_images.push(t),
                None => {
                    // An accepted file with an unparseable name still counts;
                    // provenance fields just degrade to zero.
                    warn!("Accepted image has unexpected name: {}", image.display());
                    table_images.push(TableImage {
                        path: image.clone(),
                        source_pdf: String::new(),
                        page_index: 0,
                        candidate_index: 0,
                        verified: true,
                    });
                }
            },
            GateOutcome::Rejected { image } => {
                debug!("Gate rejected '{}'", image);
                rejected += 1;
            }
            GateOutcome::Failed(e) => failures.push(e),
        }
    }

    let stats = ExtractionStats {
        candidates: candidate_count,
        accepted: table_images.len(),
        rejected,
        failed: failures.len(),
        capture_duration_ms,
        gate_duration_ms,
    };
    info!(
        "{}: {} accepted, {} rejected, {} failed ({}ms gate)",
        pdf.display(),
        stats.accepted,
        stats.rejected,
        stats.failed,
        gate_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(stats.accepted, stats.rejected, stats.failed);
    }

    Ok(ExtractionOutput {
        table_images,
        rejected,
        failures,
        stats,
    })
}

/// Extract tables from several PDFs.
///
/// A document that fails outright (unreadable, corrupt) is recorded in the
/// batch output and the remaining documents continue; results keep the
/// input order.
pub async fn extract_batch(pdfs: &[PathBuf], config: &ExtractionConfig) -> BatchOutput {
    let mut batch = BatchOutput::default();
    for pdf in pdfs {
        match extract_tables(pdf, config).await {
            Ok(output) => batch.documents.push(DocumentResult::Processed {
                pdf: pdf.clone(),
                output,
            }),
            Err(e) => {
                warn!("Document {} failed: {}", pdf.display(), e);
                batch.documents.push(DocumentResult::Failed {
                    pdf: pdf.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    batch
}

/// Full pipeline for one PDF: extraction gate plus transcription to HTML.
pub async fn extract_and_transcribe(
    pdf: &Path,
    config: &ExtractionConfig,
) -> Result<(ExtractionOutput, TranscriptionOutput), ExtractError> {
    let extraction = extract_tables(pdf, config).await?;
    let provider = resolve_provider(config)?;
    let transcription =
        transcribe::transcribe_images(&provider, &extraction.image_paths(), config).await;
    Ok((extraction, transcription))
}

/// Check the input file exists, is readable, and starts with the PDF magic.
fn validate_input(pdf: &Path) -> Result<(), ExtractError> {
    if !pdf.exists() {
        return Err(ExtractError::FileNotFound {
            path: pdf.to_path_buf(),
        });
    }

    let mut file = std::fs::File::open(pdf).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => ExtractError::PermissionDenied {
            path: pdf.to_path_buf(),
        },
        std::io::ErrorKind::NotFound => ExtractError::FileNotFound {
            path: pdf.to_path_buf(),
        },
        _ => ExtractError::Internal(format!("cannot open '{}': {e}", pdf.display())),
    })?;

    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)
        .map_err(|_| ExtractError::NotAPdf {
            path: pdf.to_path_buf(),
            magic: [0; 4],
        })?;
    if &magic != b"%PDF" {
        return Err(ExtractError::NotAPdf {
            path: pdf.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

/// Idempotently create the three output directories.
fn prepare_dirs(config: &ExtractionConfig) -> Result<(), ExtractError> {
    for dir in [
        &config.temp_image_dir,
        &config.table_image_dir,
        &config.html_dir,
    ] {
        std::fs::create_dir_all(dir).map_err(|e| ExtractError::OutputWriteFailed {
            path: dir.clone(),
            source: e,
        })?;
    }
    Ok(())
}

/// Resolve the vision provider: an injected instance wins, otherwise the
/// named provider is constructed (failing fast on unknown name or missing
/// key).
pub(crate) fn resolve_provider(
    config: &ExtractionConfig,
) -> Result<Arc<dyn VisionProvider>, ExtractError> {
    if let Some(ref p) = config.provider {
        return Ok(Arc::clone(p));
    }
    let name = config.provider_name.as_deref().ok_or_else(|| {
        ExtractError::InvalidConfig(
            "No vision provider configured: set provider_name or inject a provider".into(),
        )
    })?;
    provider::create_provider(
        name,
        config.api_key.as_deref(),
        config.model.as_deref(),
        config.api_timeout_secs,
    )
}

/// Run the configured capture routine on a blocking thread.
///
/// pdfium is synchronous and CPU-bound; `spawn_blocking` keeps it off the
/// async worker threads.
async fn run_capture(pdf: &Path, config: &ExtractionConfig) -> Result<(), ExtractError> {
    let routine: Arc<dyn CaptureRoutine> = match config.capture {
        Some(ref custom) => Arc::clone(custom),
        None => Arc::new(PdfiumCapture::new(config)),
    };
    let pdf = pdf.to_path_buf();
    let output_dir = config.temp_image_dir.clone();
    tokio::task::spawn_blocking(move || routine.capture(&pdf, &output_dir))
        .await
        .map_err(|e| ExtractError::Internal(format!("capture task panicked: {e}")))?
}

/// PNG crops in the temp directory belonging to `pdf`, sorted by name.
///
/// A crop belongs to `pdf` iff its name parses against the naming scheme
/// and the parsed document stem is exactly `pdf`'s stem. A plain prefix
/// check would also pull in crops of a sibling document whose own stem
/// ends in `_page_…`.
fn candidate_images(pdf: &Path, temp_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());

    let entries = std::fs::read_dir(temp_dir).map_err(|e| ExtractError::Internal(format!(
        "cannot list '{}': {e}",
        temp_dir.display()
    )))?;

    let mut images: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
                return false;
            };
            IMAGE_NAME_RE
                .captures(&name)
                .is_some_and(|caps| &caps["stem"] == stem.as_str())
        })
        .collect();
    images.sort();
    Ok(images)
}

static IMAGE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<stem>.+)_page_(?P<page>\d+)_table_(?P<idx>\d+)_\d{8}_\d{6}\.(?i:png)$")
        .expect("image name pattern is valid")
});

/// Parse provenance out of a crop's file name.
fn table_image_from_path(path: &Path) -> Option<TableImage> {
    let name = path.file_name()?.to_string_lossy();
    let caps = IMAGE_NAME_RE.captures(&name)?;
    Some(TableImage {
        path: path.to_path_buf(),
        source_pdf: caps["stem"].to_string(),
        page_index: caps["page"].parse().ok()?,
        candidate_index: caps["idx"].parse().ok()?,
        verified: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_file_not_found() {
        let err = validate_input(Path::new("/no/such/file.pdf")).unwrap_err();
        assert!(matches!(err, ExtractError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_content_is_rejected_with_magic_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"PNG rubbish").unwrap();

        let err = validate_input(&path).unwrap_err();
        match err {
            ExtractError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PNG "),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[test]
    fn pdf_magic_passes_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("real.pdf");
        std::fs::write(&path, b"%PDF-1.7\n...").unwrap();
        assert!(validate_input(&path).is_ok());
    }

    #[test]
    fn truncated_file_is_not_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.pdf");
        std::fs::write(&path, b"%P").unwrap();
        assert!(matches!(
            validate_input(&path).unwrap_err(),
            ExtractError::NotAPdf { .. }
        ));
    }

    #[test]
    fn provenance_parsed_from_image_name() {
        let t = table_image_from_path(Path::new(
            "table_images/annual_report_page_12_table_3_20250101_120000.png",
        ))
        .unwrap();
        assert_eq!(t.source_pdf, "annual_report");
        assert_eq!(t.page_index, 12);
        assert_eq!(t.candidate_index, 3);
        assert!(t.verified);
    }

    #[test]
    fn stems_containing_page_markers_still_parse() {
        // Greedy stem match keeps the rightmost page/table markers.
        let t = table_image_from_path(Path::new(
            "notes_page_summary_page_0_table_1_20250101_120000.png",
        ))
        .unwrap();
        assert_eq!(t.source_pdf, "notes_page_summary");
        assert_eq!(t.page_index, 0);
        assert_eq!(t.candidate_index, 1);
    }

    #[test]
    fn unrelated_names_do_not_parse() {
        assert!(table_image_from_path(Path::new("screenshot.png")).is_none());
        assert!(table_image_from_path(Path::new("doc_page_x_table_0_20250101_120000.png")).is_none());
    }

    #[test]
    fn candidate_listing_filters_by_document_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mk = |name: &str| std::fs::write(dir.path().join(name), b"png").unwrap();
        mk("report_page_0_table_0_20250101_120000.png");
        mk("report_page_1_table_0_20250101_120000.PNG");
        mk("other_page_0_table_0_20250101_120000.png");
        mk("report_notes.txt");

        let images = candidate_images(Path::new("in/report.pdf"), dir.path()).unwrap();
        assert_eq!(images.len(), 2);
        assert!(images.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn candidate_listing_requires_exact_stem_match() {
        // "report_page_summary.pdf" crops start with "report_page_" too; a
        // run over "report.pdf" must not pick them up.
        let dir = tempfile::tempdir().unwrap();
        let mk = |name: &str| std::fs::write(dir.path().join(name), b"png").unwrap();
        mk("report_page_0_table_0_20250101_120000.png");
        mk("report_page_summary_page_0_table_0_20250101_120000.png");

        let images = candidate_images(Path::new("report.pdf"), dir.path()).unwrap();
        assert_eq!(images.len(), 1);
        assert!(images[0]
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("report_page_0"));

        let sibling = candidate_images(Path::new("report_page_summary.pdf"), dir.path()).unwrap();
        assert_eq!(sibling.len(), 1);
    }

    #[test]
    fn provider_resolution_requires_a_name_or_instance() {
        let config = ExtractionConfig::default();
        assert!(matches!(
            resolve_provider(&config).unwrap_err(),
            ExtractError::InvalidConfig(_)
        ));
    }
}
