//! Vision verification gate: confirm or deny each candidate crop.
//!
//! Each candidate image goes to the provider with a yes/no prompt. A
//! response containing the affirmative token accepts the image (it is
//! relocated to the table-image directory); anything else rejects it (the
//! temp file is deleted immediately, so no orphans survive a run). A
//! failed model call is neither acceptance nor rejection — it becomes a
//! per-item error and the rest of the batch continues.
//!
//! ## Retry strategy
//!
//! Rate limits and transient 5xx errors are frequent under concurrent
//! load. Exponential backoff (`retry_backoff_ms` doubling per attempt,
//! capped at 60 s) avoids the
//! thundering-herd problem where every worker retries at once.

use crate::config::ExtractionConfig;
use crate::error::ItemError;
use crate::output::GateOutcome;
use crate::prompts::{AFFIRMATIVE_TOKEN, VERIFY_PROMPT};
use crate::provider::{ImageData, VisionProvider};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Interpret a model response as an accept/reject verdict.
///
/// The default interpretation is substring containment of the affirmative
/// token, tolerating verbose responses like "True, this is a table.". The
/// strict mode instead requires the response's *leading* token, trimmed of
/// punctuation and case-normalised, to equal the affirmative literal —
/// closing the gap where "False, this is not True" would be accepted.
pub fn verdict_accepts(response: &str, strict: bool) -> bool {
    if strict {
        let lead = response
            .split_whitespace()
            .next()
            .unwrap_or("")
            .trim_matches(|c: char| !c.is_alphanumeric());
        lead.eq_ignore_ascii_case(AFFIRMATIVE_TOKEN)
    } else {
        response.contains(AFFIRMATIVE_TOKEN)
    }
}

/// Run the verification gate over a set of candidate images.
///
/// Items are independent; up to `config.concurrency` model calls run at
/// once. Cancellation is checked before each item is issued — an in-flight
/// call always completes. Outcomes come back in input order.
pub async fn verify_images(
    provider: &Arc<dyn VisionProvider>,
    images: Vec<PathBuf>,
    config: &ExtractionConfig,
) -> Vec<GateOutcome> {
    let mut outcomes: Vec<(usize, GateOutcome)> = stream::iter(images.into_iter().enumerate().map(
        |(i, path)| {
            let provider = Arc::clone(provider);
            let config = config.clone();
            async move {
                if let Some(ref flag) = config.cancel_flag {
                    if flag.load(Ordering::SeqCst) {
                        let image = file_name(&path);
                        debug!("Cancelled before verifying '{}'", image);
                        return (i, GateOutcome::Failed(ItemError::Cancelled { image }));
                    }
                }
                let outcome = verify_one(&provider, &path, &config).await;
                if let Some(ref cb) = config.progress_callback {
                    match &outcome {
                        GateOutcome::Accepted { image } => cb.on_item_verified(&file_name(image)),
                        GateOutcome::Rejected { image } => cb.on_item_rejected(image),
                        GateOutcome::Failed(e) => cb.on_item_failed(e.item(), &e.to_string()),
                    }
                }
                (i, outcome)
            }
        },
    ))
    .buffer_unordered(config.concurrency)
    .collect()
    .await;

    outcomes.sort_by_key(|(i, _)| *i);
    outcomes.into_iter().map(|(_, o)| o).collect()
}

/// Verify one candidate image: model call with retries, then move or delete.
async fn verify_one(
    provider: &Arc<dyn VisionProvider>,
    path: &Path,
    config: &ExtractionConfig,
) -> GateOutcome {
    let image_name = file_name(path);

    let image = match tokio::fs::read(path).await {
        Ok(bytes) => ImageData::from_png_bytes(&bytes),
        Err(e) => {
            return GateOutcome::Failed(ItemError::FileOpFailed {
                path: image_name,
                detail: format!("read failed: {e}"),
            });
        }
    };

    let prompt = config.verify_prompt.as_deref().unwrap_or(VERIFY_PROMPT);

    let mut last_err: Option<String> = None;
    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_delay_ms(config.retry_backoff_ms, attempt);
            warn!(
                "'{}': retry {}/{} after {}ms",
                image_name, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match provider.generate(prompt, Some(&image)).await {
            Ok(response) => {
                debug!("'{}': verdict response: {:?}", image_name, response);
                return if verdict_accepts(&response, config.strict_verdict) {
                    accept(path, &image_name, config).await
                } else {
                    reject(path, &image_name).await
                };
            }
            Err(e) => {
                warn!("'{}': attempt {} failed — {}", image_name, attempt + 1, e);
                last_err = Some(e.to_string());
            }
        }
    }

    GateOutcome::Failed(ItemError::VerificationFailed {
        image: image_name,
        retries: config.max_retries,
        detail: last_err.unwrap_or_else(|| "unknown error".to_string()),
    })
}

/// Relocate an accepted image to the stable table-image directory.
async fn accept(path: &Path, image_name: &str, config: &ExtractionConfig) -> GateOutcome {
    let target = config.table_image_dir.join(image_name);

    if let Err(rename_err) = tokio::fs::rename(path, &target).await {
        // Rename fails across filesystems; fall back to copy + remove.
        debug!(
            "'{}': rename failed ({}), copying instead",
            image_name, rename_err
        );
        if let Err(e) = tokio::fs::copy(path, &target).await {
            return GateOutcome::Failed(ItemError::FileOpFailed {
                path: image_name.to_string(),
                detail: format!("move to table-image dir failed: {e}"),
            });
        }
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("'{}': failed to remove temp copy: {}", image_name, e);
        }
    }

    info!("Moved: {} -> {}", path.display(), target.display());
    GateOutcome::Accepted { image: target }
}

/// Delete a rejected image. Deletion failure is logged, never fatal.
async fn reject(path: &Path, image_name: &str) -> GateOutcome {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!("Deleted: {}", path.display()),
        Err(e) => warn!("Error deleting {}: {}", path.display(), e),
    }
    GateOutcome::Rejected {
        image: image_name.to_string(),
    }
}

/// Longest delay between two attempts, whatever the retry count.
const MAX_BACKOFF_MS: u64 = 60_000;

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, with
/// saturating arithmetic and capped at [`MAX_BACKOFF_MS`] so arbitrarily
/// large retry counts never overflow the doubling.
fn backoff_delay_ms(base: u64, attempt: u32) -> u64 {
    let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
    base.saturating_mul(factor).min(MAX_BACKOFF_MS)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affirmative_token_anywhere_accepts_by_default() {
        assert!(verdict_accepts("True", false));
        assert!(verdict_accepts("True, this is a table.", false));
        assert!(verdict_accepts("The answer is True.", false));
    }

    #[test]
    fn responses_without_the_token_reject() {
        assert!(!verdict_accepts("False", false));
        assert!(!verdict_accepts("false", false));
        assert!(!verdict_accepts("This is a chart.", false));
        assert!(!verdict_accepts("", false));
    }

    #[test]
    fn substring_match_is_case_sensitive_like_the_original() {
        // 'true' lowercase does not contain the literal token.
        assert!(!verdict_accepts("true", false));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay_ms(500, 1), 500);
        assert_eq!(backoff_delay_ms(500, 2), 1000);
        assert_eq!(backoff_delay_ms(500, 3), 2000);
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        // Attempts past the shift width must cap, not panic.
        assert_eq!(backoff_delay_ms(500, 65), MAX_BACKOFF_MS);
        assert_eq!(backoff_delay_ms(500, u32::MAX), MAX_BACKOFF_MS);
        assert_eq!(backoff_delay_ms(0, 80), 0);
        // The cap also bounds legitimate long retry chains.
        assert_eq!(backoff_delay_ms(500, 10), 60_000.min(500 * 512));
    }

    #[test]
    fn strict_mode_requires_leading_token() {
        assert!(verdict_accepts("True", true));
        assert!(verdict_accepts("True, this is a table.", true));
        assert!(verdict_accepts("true.", true));
        // The known ambiguity the strict parse closes:
        assert!(!verdict_accepts("False, this is not True", true));
        assert!(!verdict_accepts("Not True", true));
        assert!(!verdict_accepts("", true));
    }
}
