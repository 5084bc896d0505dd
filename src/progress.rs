//! Progress-callback trait for per-item pipeline events.
//!
//! Inject an `Arc<dyn ExtractionProgressCallback>` via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the gate and the transcription service process each item.
//! Callbacks are the least-invasive integration point: hosts forward
//! events to a progress bar, a channel, or a log without the library
//! knowing how they communicate.
//!
//! All methods have default no-op implementations so callers only override
//! what they care about. Items are processed concurrently, so
//! implementations must protect shared mutable state themselves.

/// Called by the pipeline as items move through the gate and transcription.
///
/// The verified/rejected/failed split mirrors the three user-visible
/// outcomes: produced, skipped-as-noise, failed-as-error.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Capture finished; `candidates` images await verification.
    fn on_capture_complete(&self, candidates: usize) {
        let _ = candidates;
    }

    /// The gate accepted an image as a genuine table.
    fn on_item_verified(&self, image: &str) {
        let _ = image;
    }

    /// The gate rejected an image (skipped, not an error).
    fn on_item_rejected(&self, image: &str) {
        let _ = image;
    }

    /// An item errored (model call or file operation).
    fn on_item_failed(&self, image: &str, error: &str) {
        let _ = (image, error);
    }

    /// An image was transcribed; `html_len` is the byte length written.
    fn on_item_transcribed(&self, image: &str, html_len: usize) {
        let _ = (image, html_len);
    }

    /// The gate finished for one document.
    fn on_run_complete(&self, accepted: usize, rejected: usize, failed: usize) {
        let _ = (accepted, rejected, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        verified: AtomicUsize,
        rejected: AtomicUsize,
        failed: AtomicUsize,
    }

    impl ExtractionProgressCallback for Counting {
        fn on_item_verified(&self, _image: &str) {
            self.verified.fetch_add(1, Ordering::SeqCst);
        }
        fn on_item_rejected(&self, _image: &str) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
        }
        fn on_item_failed(&self, _image: &str, _error: &str) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_capture_complete(3);
        cb.on_item_verified("a.png");
        cb.on_item_rejected("b.png");
        cb.on_item_failed("c.png", "boom");
        cb.on_item_transcribed("a.png", 120);
    }

    #[test]
    fn callback_distinguishes_the_three_outcomes() {
        let cb = Arc::new(Counting {
            verified: AtomicUsize::new(0),
            rejected: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        });
        cb.on_item_verified("a.png");
        cb.on_item_rejected("b.png");
        cb.on_item_rejected("c.png");
        cb.on_item_failed("d.png", "timeout");
        assert_eq!(cb.verified.load(Ordering::SeqCst), 1);
        assert_eq!(cb.rejected.load(Ordering::SeqCst), 2);
        assert_eq!(cb.failed.load(Ordering::SeqCst), 1);
    }
}
