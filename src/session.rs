//! Explicit per-run session context.
//!
//! A batch run accumulates artifacts (verified table images, HTML files)
//! and a failure list. The session owns exactly the files it recorded —
//! [`SessionContext::clear`] removes those and only those, so clearing one
//! user's session never touches another session's output sitting in the
//! same directories. Create one context per batch run and clear it
//! explicitly when new input replaces the old; nothing here is implicitly
//! shared or global.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Artifacts and failures accumulated by one batch run.
#[derive(Debug, Default)]
pub struct SessionContext {
    /// Verified table images, keyed by source-PDF display name.
    extracted_images: BTreeMap<String, Vec<PathBuf>>,
    /// HTML files generated this session.
    generated_html: Vec<PathBuf>,
    /// Human-readable identifiers of failed items.
    failed_items: Vec<String>,
    /// Whether the extraction stage has completed for the current input.
    run_done: bool,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a verified image produced from `pdf_name`.
    pub fn record_image(&mut self, pdf_name: &str, path: PathBuf) {
        self.extracted_images
            .entry(pdf_name.to_string())
            .or_default()
            .push(path);
    }

    /// Record a generated HTML file.
    pub fn record_html(&mut self, path: PathBuf) {
        self.generated_html.push(path);
    }

    /// Record a failed item identifier.
    pub fn record_failure(&mut self, item: impl Into<String>) {
        self.failed_items.push(item.into());
    }

    pub fn mark_run_done(&mut self) {
        self.run_done = true;
    }

    pub fn run_done(&self) -> bool {
        self.run_done
    }

    /// Verified images per source PDF, in insertion order per document.
    pub fn extracted_images(&self) -> &BTreeMap<String, Vec<PathBuf>> {
        &self.extracted_images
    }

    /// All verified image paths across documents.
    pub fn all_images(&self) -> Vec<&PathBuf> {
        self.extracted_images.values().flatten().collect()
    }

    pub fn generated_html(&self) -> &[PathBuf] {
        &self.generated_html
    }

    pub fn failed_items(&self) -> &[String] {
        &self.failed_items
    }

    /// Delete only the HTML files this session generated and forget them.
    ///
    /// Called before re-running transcription so stale output never mixes
    /// with fresh output.
    pub fn clear_generated_html(&mut self) {
        for path in self.generated_html.drain(..) {
            remove_quietly(&path);
        }
    }

    /// Delete every file this session produced and reset all state.
    ///
    /// Called when new input replaces the old (the equivalent of a fresh
    /// upload). Files recorded by other sessions are untouched.
    pub fn clear(&mut self) {
        for paths in std::mem::take(&mut self.extracted_images).into_values() {
            for path in paths {
                remove_quietly(&path);
            }
        }
        self.clear_generated_html();
        self.failed_items.clear();
        self.run_done = false;
    }
}

fn remove_quietly(path: &Path) {
    if path.exists() {
        match std::fs::remove_file(path) {
            Ok(()) => debug!("Session cleanup removed {}", path.display()),
            Err(e) => warn!("Session cleanup failed for {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_removes_only_recorded_files() {
        let dir = tempfile::tempdir().unwrap();
        let mine = dir.path().join("mine.png");
        let theirs = dir.path().join("theirs.png");
        std::fs::write(&mine, b"png").unwrap();
        std::fs::write(&theirs, b"png").unwrap();

        let mut session = SessionContext::new();
        session.record_image("doc.pdf", mine.clone());
        session.mark_run_done();
        session.clear();

        assert!(!mine.exists());
        assert!(theirs.exists());
        assert!(!session.run_done());
        assert!(session.all_images().is_empty());
    }

    #[test]
    fn clear_generated_html_keeps_images() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("t.png");
        let html = dir.path().join("t.html");
        std::fs::write(&img, b"png").unwrap();
        std::fs::write(&html, b"<table></table>").unwrap();

        let mut session = SessionContext::new();
        session.record_image("doc.pdf", img.clone());
        session.record_html(html.clone());
        session.clear_generated_html();

        assert!(img.exists());
        assert!(!html.exists());
        assert!(session.generated_html().is_empty());
    }

    #[test]
    fn failures_accumulate_per_session() {
        let mut session = SessionContext::new();
        session.record_failure("a_page_0_table_0_20250101_120000.png");
        session.record_failure("b.pdf");
        assert_eq!(session.failed_items().len(), 2);
        session.clear();
        assert!(session.failed_items().is_empty());
    }
}
