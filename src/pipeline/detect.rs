//! Table-candidate detection: heuristic filters plus the built-in
//! pdfium-backed region finder.
//!
//! Detection has two halves with a deliberate seam between them:
//!
//! 1. A **region finder** produces raw [`TableCandidate`]s from a page —
//!    bounding box, extracted row count, text length, and the count of
//!    vector line primitives inside the box. The built-in finder clusters
//!    ruled lines from pdfium page objects; alternative engines plug in
//!    through [`crate::pipeline::capture::CaptureRoutine`].
//!
//! 2. The **filters** ([`filter_candidates`]) reject false positives. The
//!    four checks are conjunctive and all-or-nothing: failing any one
//!    discards the candidate with a [`RejectReason`], so callers can report
//!    "skipped as noise" distinctly from "failed with an error".

use crate::config::ExtractionConfig;
use crate::pipeline::geometry::Rect;
use pdfium_render::prelude::*;
use tracing::{debug, trace};

/// A page region flagged as possibly containing a table, before
/// heuristic and vision confirmation.
///
/// `bbox` is in document space (72 DPI, top-down y; see
/// [`crate::pipeline::geometry`]). Candidates are created per page during
/// detection and consumed immediately by the capture stage; they are never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TableCandidate {
    /// 0-based source page.
    pub page_index: usize,
    /// Bounding box in document space.
    pub bbox: Rect,
    /// Number of extracted table rows.
    pub row_count: usize,
    /// Characters of extracted text within the bbox (trimmed).
    pub text_len: usize,
    /// Vector line primitives within the bbox that are not table rules.
    pub graphic_line_count: usize,
}

/// Why a candidate was rejected by the heuristic filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Fewer than the minimum extracted rows (single-row detections are noise).
    TooFewRows,
    /// Bounding box under the minimum width/height in document units.
    TooSmall,
    /// Too little extracted text — likely a graphics-only region.
    SparseText,
    /// Too many vector line primitives — likely a chart or diagram.
    TooManyGraphicLines,
}

impl TableCandidate {
    /// Evaluate the four conjunctive filters against `config`'s thresholds.
    ///
    /// Returns the first failing check, or `None` if the candidate passes
    /// all of them. Check order mirrors cost: counting rows is free, text
    /// and line counts were already gathered by the finder.
    pub fn reject_reason(&self, config: &ExtractionConfig) -> Option<RejectReason> {
        if self.row_count < config.min_rows {
            return Some(RejectReason::TooFewRows);
        }
        if self.bbox.width() < config.min_region_size || self.bbox.height() < config.min_region_size
        {
            return Some(RejectReason::TooSmall);
        }
        if self.text_len < config.min_text_chars {
            return Some(RejectReason::SparseText);
        }
        if self.graphic_line_count > config.max_graphic_lines {
            return Some(RejectReason::TooManyGraphicLines);
        }
        None
    }
}

/// Keep only candidates passing all heuristic filters.
///
/// Rejections are logged at debug level; acceptance is all-or-nothing per
/// region.
pub fn filter_candidates(
    candidates: Vec<TableCandidate>,
    config: &ExtractionConfig,
) -> Vec<TableCandidate> {
    candidates
        .into_iter()
        .filter(|c| match c.reject_reason(config) {
            None => true,
            Some(reason) => {
                debug!(
                    "Page {}: rejected candidate {:?} ({:?})",
                    c.page_index + 1,
                    c.bbox,
                    reason
                );
                false
            }
        })
        .collect()
}

// ── Built-in pdfium region finder ────────────────────────────────────────
//
// Ruled tables leave a trail of thin stroked path objects. The finder
// classifies each path object as a horizontal rule, a vertical rule, or a
// graphic mark, clusters nearby rules into grid regions, and derives row
// counts from the distinct horizontal rule levels. Borderless tables are
// not found by this finder; a custom CaptureRoutine covers those.

/// Maximum thickness of a path's bounding box for it to count as a rule.
const RULE_THICKNESS: f32 = 2.5;
/// Minimum length for a thin path to count as a rule rather than a tick.
const MIN_RULE_LENGTH: f32 = 8.0;
/// Two rules whose expanded boxes touch within this margin share a region.
const CLUSTER_MARGIN: f32 = 3.0;
/// Rule midlines closer than this collapse into one grid level.
const LEVEL_TOLERANCE: f32 = 2.0;
/// A mark covering at least this share of a region is a background fill,
/// not a graphic line.
const BACKGROUND_AREA_RATIO: f32 = 0.8;

#[derive(Debug, Clone, Copy)]
enum Stroke {
    HRule(Rect),
    VRule(Rect),
}

/// Find raw table candidates on one page.
///
/// Text-extraction failures degrade to zero text length (the candidate then
/// fails the text-density filter) rather than aborting the page.
pub(crate) fn find_candidates(page: &PdfPage, page_index: usize) -> Vec<TableCandidate> {
    let page_height = page.height().value;

    let mut rules: Vec<Stroke> = Vec::new();
    let mut marks: Vec<Rect> = Vec::new();

    for object in page.objects().iter() {
        if object.as_path_object().is_none() {
            continue;
        }
        let Ok(bounds) = object.bounds() else {
            continue;
        };
        let rect = Rect::new(
            bounds.left().value,
            page_height - bounds.top().value,
            bounds.right().value,
            page_height - bounds.bottom().value,
        );
        let (w, h) = (rect.width(), rect.height());
        if h <= RULE_THICKNESS && w >= MIN_RULE_LENGTH {
            rules.push(Stroke::HRule(rect));
        } else if w <= RULE_THICKNESS && h >= MIN_RULE_LENGTH {
            rules.push(Stroke::VRule(rect));
        } else {
            marks.push(rect);
        }
    }

    trace!(
        "Page {}: {} rule strokes, {} marks",
        page_index + 1,
        rules.len(),
        marks.len()
    );

    let clusters = cluster_rules(&rules);
    let text = page.text().ok();

    let mut candidates = Vec::new();
    for members in clusters {
        let Some(region) = grid_region(&rules, &members) else {
            continue;
        };

        let text_len = text
            .as_ref()
            .map(|t| text_len_inside(t, &region.bbox, page_height))
            .unwrap_or(0);

        let graphic_line_count = marks
            .iter()
            .filter(|m| {
                region.bbox.contains(m)
                    && m.width() * m.height()
                        < BACKGROUND_AREA_RATIO * region.bbox.width() * region.bbox.height()
            })
            .count();

        candidates.push(TableCandidate {
            page_index,
            bbox: region.bbox,
            row_count: region.row_count,
            text_len,
            graphic_line_count,
        });
    }

    // Page order is preserved by sorting top-to-bottom, then left-to-right.
    candidates.sort_by(|a, b| {
        (a.bbox.y0, a.bbox.x0)
            .partial_cmp(&(b.bbox.y0, b.bbox.x0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates
}

fn stroke_rect(s: &Stroke) -> Rect {
    match s {
        Stroke::HRule(r) | Stroke::VRule(r) => *r,
    }
}

/// Group rule strokes into connected clusters by bbox proximity.
///
/// Plain union-find; rule counts per page are small enough that the
/// quadratic pairing step never matters in practice.
fn cluster_rules(rules: &[Stroke]) -> Vec<Vec<usize>> {
    let n = rules.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut Vec<usize>, i: usize) -> usize {
        if parent[i] != i {
            let root = find(parent, parent[i]);
            parent[i] = root;
        }
        parent[i]
    }

    for i in 0..n {
        let a = stroke_rect(&rules[i]).expanded(CLUSTER_MARGIN);
        for j in (i + 1)..n {
            let b = stroke_rect(&rules[j]);
            if a.intersects(&b) {
                let (ra, rb) = (find(&mut parent, i), find(&mut parent, j));
                if ra != rb {
                    parent[ra] = rb;
                }
            }
        }
    }

    let mut groups: std::collections::HashMap<usize, Vec<usize>> = std::collections::HashMap::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }
    groups.into_values().collect()
}

struct GridRegion {
    bbox: Rect,
    row_count: usize,
}

/// Turn a rule cluster into a grid region, or `None` if it is not a grid.
///
/// A grid needs at least two horizontal and two vertical rule levels
/// (anything less is an underline or a single divider). `row_count` is the
/// number of gaps between horizontal levels.
fn grid_region(rules: &[Stroke], members: &[usize]) -> Option<GridRegion> {
    let mut h_levels: Vec<f32> = Vec::new();
    let mut v_levels: Vec<f32> = Vec::new();
    let mut bbox: Option<Rect> = None;

    for &i in members {
        let rect = stroke_rect(&rules[i]);
        bbox = Some(match bbox {
            Some(b) => b.union(&rect),
            None => rect,
        });
        match rules[i] {
            Stroke::HRule(r) => push_level(&mut h_levels, (r.y0 + r.y1) / 2.0),
            Stroke::VRule(r) => push_level(&mut v_levels, (r.x0 + r.x1) / 2.0),
        }
    }

    if h_levels.len() < 2 || v_levels.len() < 2 {
        return None;
    }

    Some(GridRegion {
        bbox: bbox?,
        row_count: h_levels.len() - 1,
    })
}

fn push_level(levels: &mut Vec<f32>, value: f32) {
    if !levels.iter().any(|l| (l - value).abs() <= LEVEL_TOLERANCE) {
        levels.push(value);
    }
}

/// Count characters of text inside a document-space rect.
///
/// Converts the top-down rect back to pdfium's bottom-up `PdfRect` at this
/// boundary; everything else in the crate stays top-down.
fn text_len_inside(text: &PdfPageText, bbox: &Rect, page_height: f32) -> usize {
    let rect = PdfRect::new(
        PdfPoints::new(page_height - bbox.y1),
        PdfPoints::new(bbox.x0),
        PdfPoints::new(page_height - bbox.y0),
        PdfPoints::new(bbox.x1),
    );
    text.inside_rect(rect).trim().chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(
        width: f32,
        height: f32,
        row_count: usize,
        text_len: usize,
        graphic_line_count: usize,
    ) -> TableCandidate {
        TableCandidate {
            page_index: 0,
            bbox: Rect::new(100.0, 100.0, 100.0 + width, 100.0 + height),
            row_count,
            text_len,
            graphic_line_count,
        }
    }

    fn config() -> ExtractionConfig {
        ExtractionConfig::default()
    }

    #[test]
    fn genuine_table_passes_all_filters() {
        let c = candidate(100.0, 200.0, 4, 80, 0);
        assert_eq!(c.reject_reason(&config()), None);
    }

    #[test]
    fn small_bbox_rejected_regardless_of_other_attributes() {
        // Width under 50 units: rejected even with perfect rows/text/lines.
        let c = candidate(49.0, 300.0, 10, 500, 0);
        assert_eq!(c.reject_reason(&config()), Some(RejectReason::TooSmall));
        // Height under 50 units likewise.
        let c = candidate(300.0, 49.9, 10, 500, 0);
        assert_eq!(c.reject_reason(&config()), Some(RejectReason::TooSmall));
    }

    #[test]
    fn single_row_rejected_even_when_everything_else_passes() {
        let c = candidate(200.0, 200.0, 1, 500, 0);
        assert_eq!(c.reject_reason(&config()), Some(RejectReason::TooFewRows));
    }

    #[test]
    fn sparse_text_rejected() {
        let c = candidate(200.0, 200.0, 3, 29, 0);
        assert_eq!(c.reject_reason(&config()), Some(RejectReason::SparseText));
        let c = candidate(200.0, 200.0, 3, 30, 0);
        assert_eq!(c.reject_reason(&config()), None);
    }

    #[test]
    fn too_many_graphic_lines_rejected() {
        let c = candidate(200.0, 200.0, 3, 100, 6);
        assert_eq!(
            c.reject_reason(&config()),
            Some(RejectReason::TooManyGraphicLines)
        );
        let c = candidate(200.0, 200.0, 3, 100, 5);
        assert_eq!(c.reject_reason(&config()), None);
    }

    #[test]
    fn filters_are_conjunctive_and_all_or_nothing() {
        // One genuine 4-row table and one decorative box, as in a document
        // with a table on one page and ornament on another: only the table
        // survives.
        let genuine = TableCandidate {
            page_index: 1,
            bbox: Rect::new(100.0, 100.0, 200.0, 300.0),
            row_count: 4,
            text_len: 80,
            graphic_line_count: 0,
        };
        let decorative = TableCandidate {
            page_index: 0,
            bbox: Rect::new(10.0, 10.0, 70.0, 70.0),
            row_count: 2,
            text_len: 5,
            graphic_line_count: 0,
        };
        let kept = filter_candidates(vec![decorative, genuine.clone()], &config());
        assert_eq!(kept, vec![genuine]);
    }

    #[test]
    fn thresholds_come_from_config() {
        let cfg = ExtractionConfig::builder()
            .min_rows(3)
            .min_text_chars(10)
            .build()
            .unwrap();
        let c = candidate(200.0, 200.0, 2, 50, 0);
        assert_eq!(c.reject_reason(&cfg), Some(RejectReason::TooFewRows));
    }

    #[test]
    fn grid_region_needs_two_levels_each_way() {
        // Two horizontal rules + two vertical rules: a 1-row grid.
        let rules = vec![
            Stroke::HRule(Rect::new(0.0, 0.0, 100.0, 1.0)),
            Stroke::HRule(Rect::new(0.0, 50.0, 100.0, 51.0)),
            Stroke::VRule(Rect::new(0.0, 0.0, 1.0, 51.0)),
            Stroke::VRule(Rect::new(99.0, 0.0, 100.0, 51.0)),
        ];
        let region = grid_region(&rules, &[0, 1, 2, 3]).expect("grid expected");
        assert_eq!(region.row_count, 1);
        assert_eq!(region.bbox, Rect::new(0.0, 0.0, 100.0, 51.0));

        // A lone underline is not a grid.
        assert!(grid_region(&rules, &[0]).is_none());
    }

    #[test]
    fn near_coincident_rules_collapse_into_one_level() {
        // Double-struck border: two rules 1pt apart count as one level.
        let rules = vec![
            Stroke::HRule(Rect::new(0.0, 0.0, 100.0, 1.0)),
            Stroke::HRule(Rect::new(0.0, 1.0, 100.0, 2.0)),
            Stroke::HRule(Rect::new(0.0, 50.0, 100.0, 51.0)),
            Stroke::VRule(Rect::new(0.0, 0.0, 1.0, 51.0)),
            Stroke::VRule(Rect::new(99.0, 0.0, 100.0, 51.0)),
        ];
        let region = grid_region(&rules, &[0, 1, 2, 3, 4]).expect("grid expected");
        assert_eq!(region.row_count, 1);
    }

    #[test]
    fn clustering_separates_distant_grids() {
        let rules = vec![
            // Grid A around origin.
            Stroke::HRule(Rect::new(0.0, 0.0, 100.0, 1.0)),
            Stroke::HRule(Rect::new(0.0, 50.0, 100.0, 51.0)),
            Stroke::VRule(Rect::new(0.0, 0.0, 1.0, 51.0)),
            // Grid B far below.
            Stroke::HRule(Rect::new(0.0, 500.0, 100.0, 501.0)),
            Stroke::HRule(Rect::new(0.0, 550.0, 100.0, 551.0)),
            Stroke::VRule(Rect::new(0.0, 500.0, 1.0, 551.0)),
        ];
        let clusters = cluster_rules(&rules);
        assert_eq!(clusters.len(), 2);
        let mut sizes: Vec<usize> = clusters.iter().map(|c| c.len()).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![3, 3]);
    }
}
