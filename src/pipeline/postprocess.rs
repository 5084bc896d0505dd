//! Post-processing: deterministic cleanup of model-generated HTML.
//!
//! Vision models disobey output-format instructions in predictable ways:
//! wrapping the table in a ```` ```html ```` fence, prefixing a sentence of
//! commentary ("Here is the transcribed table:"), or emitting Windows line
//! endings. These passes are cheap, deterministic string rules that fix
//! the wrapper without touching table content, so the prompt can stay
//! focused on *what to transcribe* rather than formatting edge cases.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup passes to a raw model transcription.
///
/// Passes, in order:
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip an outer code fence (```` ```html … ``` ````)
/// 3. Extract the `<table>…</table>` span when commentary surrounds it
/// 4. Trim and ensure a single trailing newline
pub fn clean_html(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_code_fences(&s);
    let s = extract_table_span(&s);
    ensure_final_newline(s.trim())
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:html)?\s*\n(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

/// Cut the response down to its `<table>…</table>` span, if one exists.
///
/// Models often add a sentence before or after the table; the table markup
/// itself is all downstream consumers want. Responses without a table tag
/// pass through unchanged — the transcription contract only requires
/// non-empty text, not well-formed HTML.
fn extract_table_span(input: &str) -> String {
    let lower = input.to_ascii_lowercase();
    let Some(start) = lower.find("<table") else {
        return input.to_string();
    };
    let Some(end) = lower.rfind("</table>") else {
        return input.to_string();
    };
    if end < start {
        return input.to_string();
    }
    input[start..end + "</table>".len()].to_string()
}

fn ensure_final_newline(input: &str) -> String {
    if input.is_empty() {
        String::new()
    } else {
        format!("{input}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_html_fence() {
        let raw = "```html\n<table><tr><td>a</td></tr></table>\n```";
        assert_eq!(clean_html(raw), "<table><tr><td>a</td></tr></table>\n");
    }

    #[test]
    fn strips_bare_fence() {
        let raw = "```\n<table></table>\n```";
        assert_eq!(clean_html(raw), "<table></table>\n");
    }

    #[test]
    fn extracts_table_from_commentary() {
        let raw = "Here is the transcribed table:\n<table><tr><td>x</td></tr></table>\nLet me know if you need anything else.";
        assert_eq!(clean_html(raw), "<table><tr><td>x</td></tr></table>\n");
    }

    #[test]
    fn keeps_attributes_and_spans_intact() {
        let raw = "<table border=\"1\"><tr><td colspan=\"2\">merged</td></tr></table>";
        assert_eq!(
            clean_html(raw),
            "<table border=\"1\"><tr><td colspan=\"2\">merged</td></tr></table>\n"
        );
    }

    #[test]
    fn passes_through_non_table_text() {
        // The contract only requires non-empty text; no table tag, no cut.
        assert_eq!(clean_html("no table here"), "no table here\n");
    }

    #[test]
    fn normalises_crlf() {
        let raw = "<table>\r\n<tr><td>a</td></tr>\r\n</table>";
        assert_eq!(clean_html(raw), "<table>\n<tr><td>a</td></tr>\n</table>\n");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(clean_html(""), "");
        assert_eq!(clean_html("   \n "), "");
    }
}
