//! Page rasterisation and candidate cropping.
//!
//! [`CaptureRoutine`] is the system's designed extension point: any
//! detection+capture strategy that writes PNG crops into the output
//! directory using the documented naming scheme can replace the built-in
//! one. The original system accepted user-supplied code here; this crate
//! replaces that with a statically-typed strategy trait — implementations
//! are ordinary vetted Rust types, never dynamically executed input.
//!
//! The built-in [`PdfiumCapture`] renders each page that has surviving
//! candidates once, at `dpi / 72` scale, then crops every candidate's
//! bounding box out of the bitmap. pdfium is not async-safe, so callers
//! run `capture` inside `tokio::task::spawn_blocking`
//! (see [`crate::extract`]).

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::pipeline::detect::{self, filter_candidates, TableCandidate};
use chrono::Local;
use pdfium_render::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Timestamp layout embedded in output names: `YYYYMMDD_HHMMSS`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Environment variable naming a directory with an existing pdfium library.
const PDFIUM_LIB_PATH_VAR: &str = "PDFIUM_LIB_PATH";

/// Bind to pdfium: the directory named by `PDFIUM_LIB_PATH` wins, otherwise
/// the system library. A failed bind is a configuration error and reports
/// as [`ExtractError::PdfiumBindingFailed`], never a panic.
fn bind_pdfium() -> Result<Pdfium, ExtractError> {
    bind_pdfium_at(std::env::var(PDFIUM_LIB_PATH_VAR).ok().as_deref())
}

fn bind_pdfium_at(lib_dir: Option<&str>) -> Result<Pdfium, ExtractError> {
    let bindings = match lib_dir {
        Some(dir) if !dir.is_empty() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ExtractError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

/// Build a candidate image file name:
/// `{pdf_stem}_page_{page_id}_table_{idx}_{YYYYMMDD_HHMMSS}.png`.
///
/// The pattern is part of the external contract — downstream stages and
/// replacement capture routines both rely on it.
pub fn table_image_name(pdf_stem: &str, page_id: usize, idx: usize, timestamp: &str) -> String {
    format!("{pdf_stem}_page_{page_id}_table_{idx}_{timestamp}.png")
}

/// A replaceable detection+capture strategy.
///
/// Contract: scan `pdf_path`, write zero or more PNG crops of table
/// candidates into `output_dir` named per [`table_image_name`]. Runs on a
/// blocking thread; implementations may do CPU-heavy work freely.
pub trait CaptureRoutine: Send + Sync {
    fn capture(&self, pdf_path: &Path, output_dir: &Path) -> Result<(), ExtractError>;
}

/// The built-in capture routine: pdfium rule-cluster detection, heuristic
/// filtering, single page render, per-candidate crop.
pub struct PdfiumCapture {
    config: ExtractionConfig,
}

impl PdfiumCapture {
    pub fn new(config: &ExtractionConfig) -> Self {
        let mut config = config.clone();
        // The routine must not hold a handle back into the config's own
        // capture slot.
        config.capture = None;
        Self { config }
    }
}

impl CaptureRoutine for PdfiumCapture {
    fn capture(&self, pdf_path: &Path, output_dir: &Path) -> Result<(), ExtractError> {
        let pdfium = bind_pdfium()?;
        let document = pdfium
            .load_pdf_from_file(pdf_path, self.config.password.as_deref())
            .map_err(|e| {
                let detail = format!("{e:?}");
                if detail.to_ascii_lowercase().contains("password") {
                    ExtractError::PasswordRequired {
                        path: pdf_path.to_path_buf(),
                    }
                } else {
                    ExtractError::CorruptPdf {
                        path: pdf_path.to_path_buf(),
                        detail,
                    }
                }
            })?;

        let stem = pdf_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());

        let pages = document.pages();
        let page_count = pages.len() as usize;
        info!("PDF loaded: {} pages", page_count);

        // Pass 1: detect and filter candidates across the whole document.
        let mut by_page: BTreeMap<usize, Vec<TableCandidate>> = BTreeMap::new();
        for (page_index, page) in pages.iter().enumerate() {
            let found = detect::find_candidates(&page, page_index);
            let kept = filter_candidates(found, &self.config);
            debug!("Page {}: {} candidates kept", page_index + 1, kept.len());
            if !kept.is_empty() {
                by_page.insert(page_index, kept);
            }
        }

        // Pass 2: render each page once and crop its candidates.
        let scale = self.config.scale();
        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

        for (page_index, candidates) in by_page {
            // Candidates can carry out-of-range page ids when they come from
            // an external source; a bad id skips the candidates, never the
            // whole document.
            if page_index >= page_count {
                warn!(
                    "Skipping candidates on page {} (out of range, total={})",
                    page_index + 1,
                    page_count
                );
                continue;
            }

            let page = match pages.get(page_index as u16) {
                Ok(p) => p,
                Err(e) => {
                    warn!("Skipping page {}: {:?}", page_index + 1, e);
                    continue;
                }
            };

            let bitmap = match page.render_with_config(&render_config) {
                Ok(b) => b,
                Err(e) => {
                    warn!("Rasterisation failed for page {}: {:?}", page_index + 1, e);
                    continue;
                }
            };
            let page_image = bitmap.as_image();

            // `idx` restarts on every page; the page id in the name keeps
            // crops from different pages disjoint.
            for (idx, candidate) in candidates.iter().enumerate() {
                let pixels = candidate
                    .bbox
                    .to_pixels(scale)
                    .clamped(page_image.width(), page_image.height());
                if pixels.width() == 0 || pixels.height() == 0 {
                    warn!(
                        "Page {}: candidate {} maps to an empty crop, skipping",
                        page_index + 1,
                        idx
                    );
                    continue;
                }

                let cropped =
                    page_image.crop_imm(pixels.x0, pixels.y0, pixels.width(), pixels.height());

                let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
                let name = table_image_name(&stem, page_index, idx, &timestamp);
                let output_path = output_dir.join(&name);

                match cropped.save(&output_path) {
                    Ok(()) => info!("Saved table crop: {}", output_path.display()),
                    Err(e) => warn!(
                        "Failed to save crop for page {} candidate {}: {}",
                        page_index + 1,
                        idx,
                        e
                    ),
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_name_matches_documented_pattern() {
        let name = table_image_name("report", 2, 0, "20250101_120000");
        assert_eq!(name, "report_page_2_table_0_20250101_120000.png");
    }

    #[test]
    fn image_names_disjoint_within_one_second() {
        // Same second, same PDF and page: the candidate index keeps names apart.
        let a = table_image_name("doc", 1, 0, "20250101_120000");
        let b = table_image_name("doc", 1, 1, "20250101_120000");
        assert_ne!(a, b);
    }

    #[test]
    fn timestamp_format_has_second_granularity() {
        use chrono::TimeZone;
        let t = chrono::Local.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(t.format(TIMESTAMP_FORMAT).to_string(), "20250102_030405");
    }

    #[test]
    fn missing_library_at_override_path_is_a_binding_error() {
        let err = bind_pdfium_at(Some("/no/such/pdfium/dir")).unwrap_err();
        assert!(matches!(err, ExtractError::PdfiumBindingFailed(_)));
        // The message must point the user at the override variable.
        assert!(err.to_string().contains("PDFIUM_LIB_PATH"));
    }

    #[test]
    fn library_override_is_read_from_the_environment() {
        std::env::set_var(PDFIUM_LIB_PATH_VAR, "/no/such/pdfium/dir");
        let err = bind_pdfium().unwrap_err();
        std::env::remove_var(PDFIUM_LIB_PATH_VAR);
        assert!(matches!(err, ExtractError::PdfiumBindingFailed(_)));
    }
}
