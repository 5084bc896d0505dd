//! Output types for extraction and transcription runs.
//!
//! Every run reports three distinct per-item outcomes: **produced** (an
//! artifact exists), **skipped** (a heuristic or the verification gate
//! rejected the item — noise, not an error), and **failed** (an error
//! occurred while processing the item). Callers must be able to tell the
//! last two apart, so skips carry no [`ItemError`] and failures always do.

use crate::error::ItemError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A cropped table image and its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableImage {
    /// Filesystem location of the PNG.
    pub path: PathBuf,
    /// File stem of the source PDF.
    pub source_pdf: String,
    /// 0-based index of the source page.
    pub page_index: usize,
    /// 0-based index of the candidate within its document.
    pub candidate_index: usize,
    /// Set once the verification gate has accepted the image.
    pub verified: bool,
}

/// Outcome of the verification gate for one candidate image.
#[derive(Debug, Clone)]
pub enum GateOutcome {
    /// The model confirmed a table; the file now lives in the table-image directory.
    Accepted { image: PathBuf },
    /// The model denied a table; the temp file was deleted.
    Rejected { image: String },
    /// The item errored (model call or file operation).
    Failed(ItemError),
}

/// Result of one successful transcription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// The verified table image that was transcribed.
    pub image: PathBuf,
    /// Raw HTML table returned by the model (post-processed).
    pub html: String,
    /// Where the HTML was persisted (`{image_stem}.html`).
    pub html_path: PathBuf,
}

/// Output of the extraction stage (capture + verification gate) for one document.
#[derive(Debug)]
pub struct ExtractionOutput {
    /// Verified table images, in name order.
    pub table_images: Vec<TableImage>,
    /// Count of candidate images the gate rejected as non-tables (skipped, not failed).
    pub rejected: usize,
    /// Per-item failures; empty on a clean run.
    pub failures: Vec<ItemError>,
    /// Timing and counting stats.
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// Paths of the verified images, for feeding into transcription.
    pub fn image_paths(&self) -> Vec<PathBuf> {
        self.table_images.iter().map(|t| t.path.clone()).collect()
    }
}

/// Output of the transcription stage for a set of verified images.
#[derive(Debug)]
pub struct TranscriptionOutput {
    /// Successful transcriptions, in input order.
    pub results: Vec<TranscriptionResult>,
    /// Per-item failures; empty on a clean run.
    pub failures: Vec<ItemError>,
}

/// Stats for one extraction run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Candidate images the capture routine wrote to the temp directory.
    pub candidates: usize,
    /// Images the gate accepted.
    pub accepted: usize,
    /// Images the gate rejected (skipped).
    pub rejected: usize,
    /// Items that errored.
    pub failed: usize,
    /// Wall-clock milliseconds spent in detection + capture.
    pub capture_duration_ms: u64,
    /// Wall-clock milliseconds spent in the verification gate.
    pub gate_duration_ms: u64,
}

/// Per-document result inside a multi-document batch.
#[derive(Debug)]
pub enum DocumentResult {
    /// The document was processed (possibly with item failures inside).
    Processed {
        pdf: PathBuf,
        output: ExtractionOutput,
    },
    /// The document itself could not be processed at all.
    Failed { pdf: PathBuf, error: String },
}

/// Output of a multi-document batch.
///
/// One unreadable document never aborts the batch; it is recorded here
/// while the remaining documents continue.
#[derive(Debug, Default)]
pub struct BatchOutput {
    pub documents: Vec<DocumentResult>,
}

impl BatchOutput {
    /// All verified table images across the batch.
    pub fn table_images(&self) -> Vec<&TableImage> {
        self.documents
            .iter()
            .filter_map(|d| match d {
                DocumentResult::Processed { output, .. } => Some(&output.table_images),
                DocumentResult::Failed { .. } => None,
            })
            .flatten()
            .collect()
    }

    /// Documents that failed outright.
    pub fn failed_documents(&self) -> Vec<(&PathBuf, &str)> {
        self.documents
            .iter()
            .filter_map(|d| match d {
                DocumentResult::Failed { pdf, error } => Some((pdf, error.as_str())),
                DocumentResult::Processed { .. } => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_output_separates_failures_from_results() {
        let batch = BatchOutput {
            documents: vec![
                DocumentResult::Processed {
                    pdf: PathBuf::from("a.pdf"),
                    output: ExtractionOutput {
                        table_images: vec![TableImage {
                            path: PathBuf::from("table_images/a_page_2_table_0_20250101_120000.png"),
                            source_pdf: "a".into(),
                            page_index: 2,
                            candidate_index: 0,
                            verified: true,
                        }],
                        rejected: 1,
                        failures: vec![],
                        stats: ExtractionStats::default(),
                    },
                },
                DocumentResult::Failed {
                    pdf: PathBuf::from("b.pdf"),
                    error: "PDF file not found".into(),
                },
            ],
        };

        assert_eq!(batch.table_images().len(), 1);
        let failed = batch.failed_documents();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, &PathBuf::from("b.pdf"));
    }

    #[test]
    fn image_paths_preserve_order() {
        let out = ExtractionOutput {
            table_images: vec![
                TableImage {
                    path: PathBuf::from("x_page_0_table_0_20250101_120000.png"),
                    source_pdf: "x".into(),
                    page_index: 0,
                    candidate_index: 0,
                    verified: true,
                },
                TableImage {
                    path: PathBuf::from("x_page_1_table_0_20250101_120000.png"),
                    source_pdf: "x".into(),
                    page_index: 1,
                    candidate_index: 0,
                    verified: true,
                },
            ],
            rejected: 0,
            failures: vec![],
            stats: ExtractionStats::default(),
        };
        let paths = out.image_paths();
        assert!(paths[0].to_string_lossy().contains("page_0"));
        assert!(paths[1].to_string_lossy().contains("page_1"));
    }
}
