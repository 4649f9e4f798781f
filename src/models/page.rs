//! Sub-page locations.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// One pagination unit of a thread, addressed by its ordinal (1-based).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubPageLocation {
    pub ordinal: u32,
    pub url: Url,
}

impl SubPageLocation {
    pub fn new(ordinal: u32, url: Url) -> Self {
        Self { ordinal, url }
    }
}

impl fmt::Display for SubPageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.ordinal, self.url)
    }
}
