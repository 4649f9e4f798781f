//! Completion notice via ntfy.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::NotifyConfig;

/// Posts a plain-text summary to an ntfy topic. Delivery failures are
/// logged and otherwise ignored.
pub struct Notifier {
    client: reqwest::Client,
    url: String,
    title: String,
    tags: String,
}

impl Notifier {
    /// `None` when no topic is configured.
    pub fn from_config(config: &NotifyConfig) -> Option<Self> {
        let url = config.ntfy_url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .unwrap_or_default();

        Some(Self {
            client,
            url: url.to_string(),
            title: config.title.clone(),
            tags: config.tags.clone(),
        })
    }

    pub fn message(thread_title: &str, comment_count: usize, page_count: usize, output: &Path) -> String {
        let file = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| output.display().to_string());
        format!(
            "{}\nComments: {}\nSub-pages: {}\nFile: {}",
            thread_title, comment_count, page_count, file
        )
    }

    /// Returns whether the topic accepted the message.
    pub async fn send(&self, message: &str) -> bool {
        let result = self
            .client
            .post(&self.url)
            .header("Title", header_safe(&self.title))
            .header("Tags", header_safe(&self.tags))
            .body(message.to_string())
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                debug!("Notification sent to {}", self.url);
                true
            }
            Ok(resp) => {
                warn!("Notification rejected by {}: HTTP {}", self.url, resp.status());
                false
            }
            Err(e) => {
                warn!("Notification to {} failed: {}", self.url, e);
                false
            }
        }
    }
}

/// Header values must be visible ASCII.
fn header_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}
