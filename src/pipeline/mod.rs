//! Pipeline stages for table extraction and transcription.
//!
//! Each submodule implements exactly one transformation step, so every
//! stage is independently testable and replaceable without touching its
//! neighbours.
//!
//! ## Data flow
//!
//! ```text
//! detect ──▶ geometry ──▶ capture ──▶ verify ──▶ transcribe ──▶ postprocess
//! (regions)  (doc→px)     (PNG crops)  (gate)     (HTML)         (cleanup)
//! ```
//!
//! 1. [`detect`]      — find table candidates and filter false positives
//! 2. [`geometry`]    — map document-space boxes to raster pixels
//! 3. [`capture`]     — render pages and crop candidates (injectable stage)
//! 4. [`verify`]      — vision yes/no gate; the only stage that deletes
//! 5. [`transcribe`]  — vision transcription to HTML files
//! 6. [`postprocess`] — deterministic cleanup of model output

pub mod capture;
pub mod detect;
pub mod geometry;
pub mod postprocess;
pub mod transcribe;
pub mod verify;
