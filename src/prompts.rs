//! Default prompts for the verification gate and the transcription service.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the verdict token the gate matches on
//!    and the prompt that elicits it live side by side, so they cannot
//!    drift apart.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without a
//!    real model call.
//!
//! Callers override the defaults via
//! [`crate::config::ExtractionConfig::verify_prompt`] and
//! [`crate::config::ExtractionConfig::transcribe_prompt`].

/// The literal token whose presence in a verification response means "accept".
pub const AFFIRMATIVE_TOKEN: &str = "True";

/// Default yes/no prompt for the verification gate.
///
/// The model is asked to answer with the exact [`AFFIRMATIVE_TOKEN`] so the
/// gate can match on it.
pub const VERIFY_PROMPT: &str =
    "If the image contains a complete table, answer 'True', otherwise answer 'False'.";

/// Default structure-preserving transcription prompt.
///
/// Asks for verbatim transcription into an HTML table whose structure,
/// including any colspan/rowspan, matches the source image. Multi-line cell
/// text must stay merged in its cell rather than being split across cells.
pub const TRANSCRIBE_PROMPT: &str = "\
Transcribe the table in the attached image, preserving its original hierarchy.
If a cell contains multiple lines of text, merge them into that single cell's
content; do not split them across cells. Do not interpret or analyse the
content — faithfully preserve all text and layout levels. Then, using the
transcribed content, regenerate an HTML table following the table's original
hierarchy, making sure the structure, the text, and any column or row spans
(colspan, rowspan) match the source image exactly.";

/// Prompt for the optional table-repair pass.
///
/// Given a previously generated HTML table, the model either returns it
/// unchanged (if well-formed) or returns a corrected table with identical
/// cell content. See [`crate::pipeline::transcribe::repair_table`].
pub const REPAIR_PROMPT: &str = "\
Read this HTML-format table. Its layout may be broken. If you judge the
layout to be correct, respond with the same HTML table unchanged. If the
layout is wrong, fix the formatting and respond with a new HTML table.
Never delete or alter the content of any cell.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_prompt_mentions_the_affirmative_token() {
        // The gate matches on AFFIRMATIVE_TOKEN; the prompt must ask for it.
        assert!(VERIFY_PROMPT.contains(AFFIRMATIVE_TOKEN));
    }

    #[test]
    fn transcribe_prompt_requests_spans() {
        assert!(TRANSCRIBE_PROMPT.contains("colspan"));
        assert!(TRANSCRIBE_PROMPT.contains("rowspan"));
    }
}
