//! The live-document capability the harvesting core works against.
//!
//! The core never launches or owns a browser. It receives something that
//! implements [`ThreadDocument`] (a browser tab in production, an in-memory
//! fake in tests) and drives it one interaction at a time.

use async_trait::async_trait;
use scraper::Html;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Attribute the snapshot script writes with an element's own left offset in px.
pub const INDENT_ATTR: &str = "data-harvest-indent";

/// Attribute the snapshot script writes on zero-size or fully transparent elements.
pub const HIDDEN_ATTR: &str = "data-harvest-hidden";

/// Failures reported by a document collaborator. Callers recover from all of
/// them locally; none of them is fatal on its own.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("Script evaluation failed: {0}")]
    Script(String),
    #[error("Interaction failed: {0}")]
    Interaction(String),
    #[error("Invalid location '{0}'")]
    InvalidLocation(String),
    #[error("{0}")]
    Unsupported(&'static str),
}

/// Serialized view of the document at one instant.
///
/// The HTML comes from a clone of the live DOM in which every element
/// carries its computed `max(margin-left, padding-left)` in [`INDENT_ATTR`]
/// and invisible elements carry [`HIDDEN_ATTR`]. Parsing is done on demand
/// because [`Html`] is not `Send`.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentSnapshot {
    pub location: Url,
    pub html: String,
}

impl DocumentSnapshot {
    pub fn new(location: Url, html: impl Into<String>) -> Self {
        Self {
            location,
            html: html.into(),
        }
    }

    pub fn parse(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

/// A disclosure-control candidate found in the live document.
#[derive(Debug, Clone)]
pub struct ControlCandidate<C> {
    /// Visible label (inner text, falling back to aria-label).
    pub label: String,
    pub handle: C,
}

/// Where disclosure controls are looked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlScope {
    WholePage,
    /// Only descendants of comment containers.
    CommentContainers,
}

/// Full-page image of one sub-page.
#[derive(Debug, Clone)]
pub struct PageCapture {
    pub page_ordinal: u32,
    /// Encoded JPEG data.
    pub jpeg: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
}

/// A ready, rendered document that can be navigated, inspected and poked.
///
/// Methods that change the document take `&mut self`; snapshots and queries
/// take `&self`, so extraction cannot overlap an expansion in progress.
#[async_trait]
pub trait ThreadDocument: Send {
    /// Handle to an interactive element, valid until the document changes.
    type Control: Send + Sync;

    /// Navigate and wait until the document is ready.
    async fn navigate(&mut self, location: &Url) -> Result<(), DocumentError>;

    /// Location the document actually shows (after redirects).
    async fn current_location(&self) -> Result<Url, DocumentError>;

    /// Dismiss consent dialogs and similar overlays. Returns whether anything was clicked.
    async fn dismiss_overlays(&mut self) -> Result<bool, DocumentError>;

    /// Scroll the viewport vertically by `delta_px`.
    async fn scroll_by(&mut self, delta_px: i64) -> Result<(), DocumentError>;

    /// Serialize the current document.
    async fn snapshot(&self) -> Result<DocumentSnapshot, DocumentError>;

    /// Enumerate interactive elements as they exist right now. Never cached.
    async fn disclosure_controls(
        &self,
        scope: ControlScope,
    ) -> Result<Vec<ControlCandidate<Self::Control>>, DocumentError>;

    /// Scroll a control into view and activate it.
    async fn trigger(&mut self, control: &Self::Control) -> Result<(), DocumentError>;

    /// Capture the whole document as a JPEG.
    async fn capture(&mut self, page_ordinal: u32) -> Result<PageCapture, DocumentError>;
}
