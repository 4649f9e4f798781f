//! Thread head (the deal post itself).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Upper bound on image URLs kept on the head record.
pub const MAX_HEAD_IMAGES: usize = 12;

/// The post that opens a thread, read once from the start document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadHead {
    pub title: String,
    pub description: String,
    pub price: Option<String>,
    pub merchant: Option<String>,
    pub expiry: Option<String>,
    /// Canonical link of the thread (falls back to the start location).
    pub link: Url,
    /// Absolute image URLs, at most [`MAX_HEAD_IMAGES`].
    pub images: Vec<String>,
    pub captured_at: DateTime<Utc>,
}

impl ThreadHead {
    /// Head with only a title and link, used when the start document yields nothing else.
    pub fn bare(title: impl Into<String>, link: Url) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            price: None,
            merchant: None,
            expiry: None,
            link,
            images: Vec::new(),
            captured_at: Utc::now(),
        }
    }

    /// Optional `label: value` facts that are present, in display order.
    pub fn facts(&self) -> Vec<(&'static str, &str)> {
        [
            ("Price", self.price.as_deref()),
            ("Merchant", self.merchant.as_deref()),
            ("Expires", self.expiry.as_deref()),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.filter(|v| !v.is_empty()).map(|v| (label, v)))
        .collect()
    }
}
