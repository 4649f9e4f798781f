//! Budgets and heuristics for the harvesting pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Discovery and expansion budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Ceiling for page ordinals read from pagination links.
    pub max_pagination_ordinal: u32,
    /// Highest ordinal probed when the page shows no pagination links.
    pub max_probe_pages: u32,
    /// Body characters included in a page's content signature.
    pub signature_body_chars: usize,
    /// Expansion rounds per sub-page.
    pub max_rounds: u32,
    /// Wall-clock budget for expanding one sub-page, in seconds.
    pub expansion_budget_secs: u64,
    /// Synthetic scroll steps at the start of each round.
    pub scroll_steps: u32,
    pub scroll_delta_px: i64,
    pub scroll_pause_ms: u64,
    /// Controls triggered at most per round.
    pub max_controls_per_round: usize,
    pub control_timeout_ms: u64,
    pub trigger_pause_ms: u64,
    pub round_pause_ms: u64,
    /// Pause after finishing a sub-page.
    pub page_pause_ms: u64,
    /// Only consider controls inside comment containers.
    pub scope_controls_to_comments: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_pagination_ordinal: 50,
            max_probe_pages: 50,
            signature_body_chars: 80,
            max_rounds: 25,
            expansion_budget_secs: 90,
            scroll_steps: 8,
            scroll_delta_px: 1200,
            scroll_pause_ms: 150,
            max_controls_per_round: 50,
            control_timeout_ms: 3000,
            trigger_pause_ms: 120,
            round_pause_ms: 400,
            page_pause_ms: 400,
            scope_controls_to_comments: false,
        }
    }
}

impl HarvestConfig {
    pub fn expansion_budget(&self) -> Duration {
        Duration::from_secs(self.expansion_budget_secs)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }

    /// Same budgets with every pause removed.
    pub fn without_pauses(self) -> Self {
        Self {
            scroll_pause_ms: 0,
            trigger_pause_ms: 0,
            round_pause_ms: 0,
            page_pause_ms: 0,
            ..self
        }
    }
}

/// Selector chains and thresholds used to read records from a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Candidate comment containers, most trusted tier first.
    pub comment_selector_tiers: Vec<Vec<String>>,
    pub body_selectors: Vec<String>,
    pub author_selectors: Vec<String>,
    pub time_selectors: Vec<String>,
    pub score_selectors: Vec<String>,
    pub title_selectors: Vec<String>,
    pub description_selectors: Vec<String>,
    pub price_selectors: Vec<String>,
    pub merchant_selectors: Vec<String>,
    pub expiry_selectors: Vec<String>,
    /// Bodies shorter than this (in characters) are treated as noise.
    pub min_body_chars: usize,
    /// Left offset that counts as one reply level, in CSS pixels.
    pub indent_px_per_level: f64,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            comment_selector_tiers: vec![
                strings(&["[data-test*='comment']", "[id^='comment']"]),
                strings(&[".comment", ".c-comment", "article", "li"]),
            ],
            body_selectors: strings(&[
                "[data-test*='body']",
                "[class*='body']",
                "[class*='content']",
                ".md",
                ".markdown",
                "p",
            ]),
            author_selectors: strings(&[
                "a[href*='/profil']",
                "[rel='author']",
                "[data-test*='author']",
                "[class*='author']",
            ]),
            time_selectors: strings(&["time"]),
            score_selectors: strings(&[
                "[data-test*='vote']",
                "[class*='vote']",
                "[aria-label*='Gefällt']",
            ]),
            title_selectors: strings(&["[data-test='thread-title']", "h1"]),
            description_selectors: strings(&[
                "[data-test*='description']",
                ".threadBody",
                "article .content",
                ".userHtml",
                "article",
            ]),
            price_selectors: strings(&["[data-test*='price']", ".thread-price", "[class*='price']"]),
            merchant_selectors: strings(&["[data-test*='merchant']", "[class*='merchant']"]),
            expiry_selectors: strings(&["[data-test*='expir']", "[class*='expir']"]),
            min_body_chars: 2,
            indent_px_per_level: 24.0,
        }
    }
}

/// How comment identity is derived for deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub body_prefix_chars: usize,
    /// Also compare this many leading timestamp characters.
    pub timestamp_prefix_chars: Option<usize>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            body_prefix_chars: 50,
            timestamp_prefix_chars: None,
        }
    }
}
