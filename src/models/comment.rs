//! Comment records harvested from sub-pages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Deepest indentation level a comment can be assigned.
pub const MAX_NESTING_DEPTH: u8 = 8;

/// Sentinel for author/time fields that could not be read.
pub const UNKNOWN_FIELD: &str = "—";

/// Approximate reply level inferred from layout indentation.
///
/// The rendered markup does not expose which comment a reply belongs to, so
/// this is only a visual estimate: two comments at depth 2 are not known to
/// share a parent, and a depth-3 comment is not known to answer the comment
/// above it. Always within `0..=MAX_NESTING_DEPTH`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct NestingDepth(u8);

impl NestingDepth {
    /// Clamp any level into the valid range.
    pub fn clamped(level: i64) -> Self {
        Self(level.clamp(0, MAX_NESTING_DEPTH as i64) as u8)
    }

    /// Estimate a level from an accumulated left offset in CSS pixels.
    pub fn from_offset(offset_px: f64, px_per_level: f64) -> Self {
        if !offset_px.is_finite() || !px_per_level.is_finite() || px_per_level <= 0.0 {
            return Self::default();
        }
        Self::clamped((offset_px / px_per_level).round() as i64)
    }

    pub fn level(self) -> u8 {
        self.0
    }
}

impl From<u8> for NestingDepth {
    fn from(level: u8) -> Self {
        Self::clamped(level as i64)
    }
}

impl From<NestingDepth> for u8 {
    fn from(depth: NestingDepth) -> Self {
        depth.0
    }
}

impl fmt::Display for NestingDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "~{}", self.0)
    }
}

/// A single comment as read from one sub-page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub author_name: String,
    /// Timestamp exactly as the page shows it (datetime attribute or text).
    pub timestamp_text: String,
    pub score_text: Option<String>,
    pub body_text: String,
    pub nesting_depth: NestingDepth,
    /// Ordinal of the sub-page the record came from (1-based).
    pub source_page_index: u32,
    /// Position among the records accepted on that sub-page (0-based).
    pub source_ordinal: usize,
}

impl CommentRecord {
    /// Key used to collapse re-renders of the same comment.
    pub fn dedup_key(&self, body_prefix_chars: usize, timestamp_prefix_chars: Option<usize>) -> DeduplicationKey {
        DeduplicationKey {
            author: self.author_name.clone(),
            body_prefix: self.body_text.chars().take(body_prefix_chars).collect(),
            timestamp_prefix: timestamp_prefix_chars
                .map(|n| self.timestamp_text.chars().take(n).collect()),
        }
    }

    /// Short identity of the comment, used to tell sub-pages apart.
    pub fn signature(&self, body_chars: usize) -> String {
        let body: String = self.body_text.chars().take(body_chars).collect();
        format!("{}|{}|{}", self.author_name, self.timestamp_text, body)
    }

    /// Single header line: author, timestamp and score when present.
    pub fn header_line(&self) -> String {
        match self.score_text.as_deref().filter(|s| !s.is_empty()) {
            Some(score) => format!("{}  —  {}  —  {}", self.author_name, self.timestamp_text, score),
            None => format!("{}  —  {}", self.author_name, self.timestamp_text),
        }
    }
}

/// Coarse identity of a comment: author plus a fixed-length body prefix,
/// optionally narrowed by a timestamp prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeduplicationKey {
    pub author: String,
    pub body_prefix: String,
    pub timestamp_prefix: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(author: &str, body: &str) -> CommentRecord {
        CommentRecord {
            author_name: author.to_string(),
            timestamp_text: "2024-05-01T10:00:00Z".to_string(),
            score_text: None,
            body_text: body.to_string(),
            nesting_depth: NestingDepth::default(),
            source_page_index: 1,
            source_ordinal: 0,
        }
    }

    #[test]
    fn test_nesting_depth_clamps() {
        assert_eq!(NestingDepth::clamped(-3).level(), 0);
        assert_eq!(NestingDepth::clamped(5).level(), 5);
        assert_eq!(NestingDepth::clamped(40).level(), MAX_NESTING_DEPTH);
        assert_eq!(NestingDepth::from(200u8).level(), MAX_NESTING_DEPTH);
    }

    #[test]
    fn test_nesting_depth_from_offset() {
        assert_eq!(NestingDepth::from_offset(0.0, 24.0).level(), 0);
        assert_eq!(NestingDepth::from_offset(48.0, 24.0).level(), 2);
        assert_eq!(NestingDepth::from_offset(35.0, 24.0).level(), 1);
        assert_eq!(NestingDepth::from_offset(10_000.0, 24.0).level(), 8);
        assert_eq!(NestingDepth::from_offset(f64::NAN, 24.0).level(), 0);
        assert_eq!(NestingDepth::from_offset(48.0, 0.0).level(), 0);
    }

    #[test]
    fn test_nesting_depth_deserialize_clamps() {
        let depth: NestingDepth = serde_json::from_str("12").unwrap();
        assert_eq!(depth.level(), 8);
    }

    #[test]
    fn test_dedup_key_uses_char_prefix() {
        let a = record("Max", "Grüße aus Köln, der Deal ist super");
        let key = a.dedup_key(5, None);
        assert_eq!(key.body_prefix, "Grüße");
        assert_eq!(key.timestamp_prefix, None);

        let key = a.dedup_key(5, Some(10));
        assert_eq!(key.timestamp_prefix.as_deref(), Some("2024-05-01"));
    }

    #[test]
    fn test_header_line_with_and_without_score() {
        let mut r = record("Max", "text");
        assert_eq!(r.header_line(), "Max  —  2024-05-01T10:00:00Z");
        r.score_text = Some("12 Likes".to_string());
        assert_eq!(r.header_line(), "Max  —  2024-05-01T10:00:00Z  —  12 Likes");
    }
}
