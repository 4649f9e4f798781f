//! Collapsing re-rendered comments across overlapping sub-pages.

use std::collections::HashSet;

use tracing::debug;

use crate::config::DedupConfig;
use crate::models::CommentRecord;

/// Drops every record whose key was already seen. First occurrence wins.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    body_prefix_chars: usize,
    timestamp_prefix_chars: Option<usize>,
}

impl Deduplicator {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            body_prefix_chars: config.body_prefix_chars,
            timestamp_prefix_chars: config.timestamp_prefix_chars,
        }
    }

    pub fn dedup(&self, records: Vec<CommentRecord>) -> Vec<CommentRecord> {
        let before = records.len();
        let mut seen = HashSet::with_capacity(before);

        let kept: Vec<CommentRecord> = records
            .into_iter()
            .filter(|r| seen.insert(r.dedup_key(self.body_prefix_chars, self.timestamp_prefix_chars)))
            .collect();

        if kept.len() < before {
            debug!("Dropped {} duplicate comments", before - kept.len());
        }
        kept
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(&DedupConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NestingDepth;

    fn record(author: &str, time: &str, body: &str, page: u32) -> CommentRecord {
        CommentRecord {
            author_name: author.to_string(),
            timestamp_text: time.to_string(),
            score_text: None,
            body_text: body.to_string(),
            nesting_depth: NestingDepth::default(),
            source_page_index: page,
            source_ordinal: 0,
        }
    }

    #[test]
    fn test_same_author_and_prefix_on_later_page_dropped() {
        let prefix = "a".repeat(50);
        let records = vec![
            record("Max", "gestern", &format!("{prefix} first ending"), 1),
            record("Erika", "heute", "Different comment", 1),
            record("Max", "heute", &format!("{prefix} second ending"), 2),
        ];

        let kept = Deduplicator::default().dedup(records);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].source_page_index, 1);
        assert!(kept[0].body_text.ends_with("first ending"));
        assert_eq!(kept[1].author_name, "Erika");
    }

    #[test]
    fn test_different_author_same_body_kept() {
        let records = vec![
            record("Max", "x", "Same body", 1),
            record("Moritz", "x", "Same body", 1),
        ];
        assert_eq!(Deduplicator::default().dedup(records).len(), 2);
    }

    #[test]
    fn test_timestamp_prefix_narrows_key() {
        let dedup = Deduplicator::new(&DedupConfig {
            body_prefix_chars: 50,
            timestamp_prefix_chars: Some(10),
        });
        let records = vec![
            record("Max", "2024-05-01T10:00", "+1", 1),
            record("Max", "2024-05-02T10:00", "+1", 2),
            record("Max", "2024-05-01T11:00", "+1", 2),
        ];
        let kept = dedup.dedup(records);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].timestamp_text, "2024-05-02T10:00");
    }

    #[test]
    fn test_output_is_ordered_subsequence_and_idempotent() {
        let records: Vec<CommentRecord> = (0..30)
            .map(|i| record(&format!("user{}", i % 7), "t", &format!("body {}", i % 11), i / 10 + 1))
            .collect();
        let dedup = Deduplicator::default();

        let once = dedup.dedup(records.clone());
        assert!(once.len() <= records.len());

        let mut cursor = records.iter();
        for kept in &once {
            assert!(cursor.any(|r| r == kept), "output must be a subsequence of the input");
        }

        let twice = dedup.dedup(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_input() {
        assert!(Deduplicator::default().dedup(Vec::new()).is_empty());
    }
}
