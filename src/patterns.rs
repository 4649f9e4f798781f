//! Locale-specific phrase matching for pagination, expansion and consent controls.
//!
//! All wording lives in [`PatternConfig`] so it can be replaced from the config
//! file; [`PatternSet`] compiles it once into case-insensitive regexes.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("Invalid {kind} pattern '{pattern}': {source}")]
    Invalid {
        kind: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("No {0} phrases configured")]
    Empty(&'static str),
}

/// Phrase configuration as it appears in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Labels of controls that reveal hidden replies (matched as substrings).
    pub expansion_phrases: Vec<String>,
    /// Labels of consent-dialog buttons to dismiss.
    pub consent_phrases: Vec<String>,
    /// Regexes matched against link labels; every capture group names a page
    /// ordinal (the current page or the total).
    pub page_label_patterns: Vec<String>,
    /// Query parameter that carries the page ordinal.
    pub page_param: String,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            expansion_phrases: [
                "Mehr Antworten anzeigen",
                "Weitere Antworten",
                "Mehr Kommentare",
                "Mehr anzeigen",
                "Antworten anzeigen",
                "Show more replies",
                "More replies",
                "Load more comments",
            ]
            .map(String::from)
            .to_vec(),
            consent_phrases: ["Akzeptieren", "Einverstanden", "Zustimmen", "Accept all", "Accept"]
                .map(String::from)
                .to_vec(),
            page_label_patterns: [
                r"^\s*(\d{1,4})\s*$",
                r"^\s*(\d{1,4})\s*/\s*(\d{1,4})\s*$",
                r"^\s*(?:seite|page)\s*(\d{1,4})\b",
                r"^\s*(?:zu\s+)?seite\s+(\d{1,4})\s+(?:von|of)\s+(\d{1,4})\b",
                r"^\s*(?:go\s+to\s+)?page\s+(\d{1,4})\s+(?:of|/)\s+(\d{1,4})\b",
            ]
            .map(String::from)
            .to_vec(),
            page_param: "page".to_string(),
        }
    }
}

/// Compiled phrase matchers.
#[derive(Debug, Clone)]
pub struct PatternSet {
    expansion: Regex,
    consent: Regex,
    page_labels: Vec<Regex>,
    page_param: String,
}

impl PatternSet {
    pub fn compile(config: &PatternConfig) -> Result<Self, PatternError> {
        Ok(Self {
            expansion: phrase_alternation("expansion", &config.expansion_phrases)?,
            consent: phrase_alternation("consent", &config.consent_phrases)?,
            page_labels: config
                .page_label_patterns
                .iter()
                .map(|p| {
                    RegexBuilder::new(p)
                        .case_insensitive(true)
                        .build()
                        .map_err(|source| PatternError::Invalid {
                            kind: "page label",
                            pattern: p.clone(),
                            source,
                        })
                })
                .collect::<Result<_, _>>()?,
            page_param: config.page_param.clone(),
        })
    }

    /// Whether a control label asks to reveal more replies.
    pub fn is_expansion_label(&self, label: &str) -> bool {
        self.expansion.is_match(label)
    }

    /// Whether a button label accepts a consent dialog.
    pub fn is_consent_label(&self, label: &str) -> bool {
        self.consent.is_match(label)
    }

    /// Highest page ordinal named in a link label, if any. "Seite 1 von 7"
    /// yields 7.
    pub fn page_ordinal_in_label(&self, label: &str) -> Option<u32> {
        let label = label.trim();
        if label.is_empty() {
            return None;
        }
        self.page_labels
            .iter()
            .filter_map(|re| re.captures(label))
            .flat_map(|caps| {
                caps.iter()
                    .skip(1)
                    .flatten()
                    .filter_map(|m| m.as_str().parse::<u32>().ok())
                    .collect::<Vec<_>>()
            })
            .filter(|n| *n > 0)
            .max()
    }

    pub fn page_param(&self) -> &str {
        &self.page_param
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        // The built-in phrases are plain literals and always compile.
        Self::compile(&PatternConfig::default()).unwrap_or_else(|e| unreachable!("{e}"))
    }
}

/// Build one case-insensitive regex matching any of the literal phrases.
fn phrase_alternation(kind: &'static str, phrases: &[String]) -> Result<Regex, PatternError> {
    let escaped: Vec<String> = phrases
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(regex::escape)
        .collect();
    if escaped.is_empty() {
        return Err(PatternError::Empty(kind));
    }
    let pattern = format!("(?:{})", escaped.join("|"));
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| PatternError::Invalid {
            kind,
            pattern,
            source,
        })
}
