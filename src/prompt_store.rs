//! Append-only store for user-liked prompts.
//!
//! A purely auxiliary feature with no bearing on pipeline correctness:
//! hosts can record that a prompt worked well for a given stage and later
//! list prompts for that stage ranked by like count. Liking an already
//! recorded (stage, prompt) pair increments its count instead of
//! duplicating the record. The store is a single JSON file; a missing or
//! corrupt file reads as empty rather than failing the host.

use crate::error::ExtractError;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// One liked-prompt record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptRecord {
    /// ISO-8601 creation time of the record.
    pub timestamp: String,
    /// Pipeline stage label the prompt belongs to.
    pub stage: String,
    /// The prompt text itself.
    pub prompt: String,
    /// How many times this prompt has been liked.
    pub like_count: u32,
}

/// Record a like for `prompt` under `stage`.
///
/// Creates the record with a like count of 1, or increments the count when
/// the (stage, prompt) pair already exists.
pub fn record_prompt(store: &Path, stage: &str, prompt: &str) -> Result<(), ExtractError> {
    let mut records = load(store);

    match records
        .iter_mut()
        .find(|r| r.stage == stage && r.prompt == prompt)
    {
        Some(existing) => existing.like_count += 1,
        None => records.push(PromptRecord {
            timestamp: Local::now().to_rfc3339(),
            stage: stage.to_string(),
            prompt: prompt.to_string(),
            like_count: 1,
        }),
    }

    let json = serde_json::to_string_pretty(&records)
        .map_err(|e| ExtractError::Internal(format!("prompt store serialisation: {e}")))?;
    std::fs::write(store, json).map_err(|e| ExtractError::OutputWriteFailed {
        path: store.to_path_buf(),
        source: e,
    })
}

/// All records for `stage`, sorted by like count descending.
pub fn records_by_stage(store: &Path, stage: &str) -> Vec<PromptRecord> {
    let mut records: Vec<PromptRecord> = load(store)
        .into_iter()
        .filter(|r| r.stage == stage)
        .collect();
    records.sort_by(|a, b| b.like_count.cmp(&a.like_count));
    records
}

fn load(store: &Path) -> Vec<PromptRecord> {
    let Ok(raw) = std::fs::read_to_string(store) else {
        return Vec::new();
    };
    match serde_json::from_str(&raw) {
        Ok(records) => records,
        Err(e) => {
            warn!("Prompt store {} unreadable ({}), starting fresh", store.display(), e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_like_creates_record_with_count_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("prompt_records.json");

        record_prompt(&store, "verification", "is this a table?").unwrap();
        let records = records_by_stage(&store, "verification");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].like_count, 1);
        assert_eq!(records[0].prompt, "is this a table?");
    }

    #[test]
    fn repeat_like_increments_instead_of_duplicating() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("prompt_records.json");

        record_prompt(&store, "transcription", "transcribe it").unwrap();
        record_prompt(&store, "transcription", "transcribe it").unwrap();
        record_prompt(&store, "transcription", "transcribe it").unwrap();

        let records = records_by_stage(&store, "transcription");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].like_count, 3);
    }

    #[test]
    fn records_sorted_by_like_count_descending() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("prompt_records.json");

        record_prompt(&store, "verification", "loved").unwrap();
        record_prompt(&store, "verification", "loved").unwrap();
        record_prompt(&store, "verification", "liked once").unwrap();

        let records = records_by_stage(&store, "verification");
        assert_eq!(records[0].prompt, "loved");
        assert_eq!(records[1].prompt, "liked once");
    }

    #[test]
    fn stages_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("prompt_records.json");

        record_prompt(&store, "verification", "a").unwrap();
        record_prompt(&store, "transcription", "b").unwrap();

        assert_eq!(records_by_stage(&store, "verification").len(), 1);
        assert_eq!(records_by_stage(&store, "transcription").len(), 1);
        assert!(records_by_stage(&store, "other").is_empty());
    }

    #[test]
    fn corrupt_store_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("prompt_records.json");
        std::fs::write(&store, "not json at all").unwrap();

        assert!(records_by_stage(&store, "verification").is_empty());
        // And recording over it recovers.
        record_prompt(&store, "verification", "fresh").unwrap();
        assert_eq!(records_by_stage(&store, "verification").len(), 1);
    }
}
