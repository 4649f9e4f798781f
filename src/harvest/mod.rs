//! The harvesting pipeline.
//!
//! One start document is located into sub-pages; every sub-page is then
//! loaded, expanded and extracted strictly in order, and the combined
//! comment list is deduplicated once at the end.

mod dedup;
mod expander;
mod extractor;
mod locator;
#[cfg(test)]
pub(crate) mod testing;

pub use dedup::Deduplicator;
pub use expander::{ExpansionReport, ReplyExpander};
pub use extractor::{ExtractError, RecordExtractor};
pub use locator::{page_location, resolved_ordinal, DiscoveryTier, LocatedPages, PageSetLocator};

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::document::{DocumentError, DocumentSnapshot, PageCapture, ThreadDocument};
use crate::models::{CommentRecord, SubPageLocation, ThreadHead};
use crate::patterns::{PatternError, PatternSet};

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Patterns(#[from] PatternError),
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    #[error("Could not load start page {url}: {source}")]
    StartPage {
        url: String,
        #[source]
        source: DocumentError,
    },
    #[error("None of the {0} sub-pages could be loaded")]
    NoPagesLoaded(usize),
}

/// Progress notifications for whoever drives the run.
#[derive(Debug, Clone)]
pub enum HarvestEvent {
    /// Sub-pages were discovered.
    Located {
        pages: Vec<SubPageLocation>,
        tier: DiscoveryTier,
    },
    /// Work on a sub-page began.
    PageStarted { ordinal: u32 },
    /// A sub-page was expanded and extracted.
    PageDone {
        ordinal: u32,
        comments: usize,
        expansions: usize,
    },
    /// A sub-page could not be loaded and was skipped.
    PageSkipped { ordinal: u32, error: String },
}

/// Everything gathered from one thread.
#[derive(Debug)]
pub struct HarvestOutcome {
    pub head: ThreadHead,
    pub pages: Vec<SubPageLocation>,
    pub tier: DiscoveryTier,
    /// Deduplicated, in page order.
    pub comments: Vec<CommentRecord>,
    /// Records extracted before deduplication.
    pub raw_count: usize,
    /// One capture per loaded sub-page, when captures were requested.
    pub captures: Vec<PageCapture>,
    pub expansions: usize,
    pub skipped_pages: Vec<u32>,
}

/// Head and sub-page set of a thread, without visiting the sub-pages.
#[derive(Debug)]
pub struct Discovery {
    pub head: ThreadHead,
    pub located: LocatedPages,
}

/// Drives one document through the whole pipeline.
pub struct Harvester {
    config: crate::config::HarvestConfig,
    patterns: PatternSet,
    extractor: RecordExtractor,
    dedup: Deduplicator,
    capture_pages: bool,
    events: Option<mpsc::Sender<HarvestEvent>>,
}

impl Harvester {
    pub fn new(config: &Config) -> Result<Self, HarvestError> {
        Ok(Self {
            config: config.harvest.clone(),
            patterns: PatternSet::compile(&config.patterns)?,
            extractor: RecordExtractor::new(&config.extraction)?,
            dedup: Deduplicator::new(&config.dedup),
            capture_pages: false,
            events: None,
        })
    }

    /// Take a full-page capture of every sub-page after expansion.
    pub fn with_captures(mut self, capture_pages: bool) -> Self {
        self.capture_pages = capture_pages;
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<HarvestEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// Open the start page, read the head and find all sub-pages.
    pub async fn discover<D: ThreadDocument>(
        &self,
        doc: &mut D,
        start: &Url,
    ) -> Result<Discovery, HarvestError> {
        let snapshot = self.open_start(doc, start).await?;
        let head = self.extractor.extract_head(&snapshot);
        info!("Thread: {}", head.title);

        let located = self.locator().locate(doc, &snapshot).await;
        info!("Found {} sub-page(s) via {}", located.pages.len(), located.tier);
        Ok(Discovery { head, located })
    }

    /// Run the whole pipeline against `doc`, starting at `start`.
    pub async fn harvest<D: ThreadDocument>(
        &self,
        doc: &mut D,
        start: &Url,
    ) -> Result<HarvestOutcome, HarvestError> {
        let Discovery { head, located } = self.discover(doc, start).await?;
        self.emit(HarvestEvent::Located {
            pages: located.pages.clone(),
            tier: located.tier,
        })
        .await;

        let expander = ReplyExpander::new(&self.patterns, &self.config);
        let mut collected = Vec::new();
        let mut captures = Vec::new();
        let mut expansions = 0;
        let mut skipped_pages = Vec::new();

        for page in &located.pages {
            self.emit(HarvestEvent::PageStarted { ordinal: page.ordinal }).await;

            if let Err(e) = doc.navigate(&page.url).await {
                warn!("Skipping page {}: {}", page, e);
                skipped_pages.push(page.ordinal);
                self.emit(HarvestEvent::PageSkipped {
                    ordinal: page.ordinal,
                    error: e.to_string(),
                })
                .await;
                continue;
            }
            if let Err(e) = doc.dismiss_overlays().await {
                debug!("Overlay dismissal failed on page {}: {}", page.ordinal, e);
            }

            let report = expander.expand(doc).await;
            expansions += report.triggered;
            debug!(
                "Page {}: {} expansions in {} rounds",
                page.ordinal, report.triggered, report.rounds
            );

            if self.capture_pages {
                match doc.capture(page.ordinal).await {
                    Ok(capture) => captures.push(capture),
                    Err(e) => warn!("Could not capture page {}: {}", page.ordinal, e),
                }
            }

            let comments = match doc.snapshot().await {
                Ok(snapshot) => self.extractor.extract_comments(&snapshot, page.ordinal),
                Err(e) => {
                    warn!("Could not read page {}: {}", page.ordinal, e);
                    Vec::new()
                }
            };
            info!("Page {}: {} comments", page.ordinal, comments.len());
            self.emit(HarvestEvent::PageDone {
                ordinal: page.ordinal,
                comments: comments.len(),
                expansions: report.triggered,
            })
            .await;
            collected.extend(comments);

            if self.config.page_pause_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.page_pause_ms)).await;
            }
        }

        if skipped_pages.len() == located.pages.len() {
            return Err(HarvestError::NoPagesLoaded(located.pages.len()));
        }

        let raw_count = collected.len();
        let comments = self.dedup.dedup(collected);
        info!("{} comments after removing {} duplicates", comments.len(), raw_count - comments.len());

        Ok(HarvestOutcome {
            head,
            pages: located.pages,
            tier: located.tier,
            comments,
            raw_count,
            captures,
            expansions,
            skipped_pages,
        })
    }

    fn locator(&self) -> PageSetLocator<'_> {
        PageSetLocator::new(
            &self.patterns,
            &self.extractor,
            self.config.max_pagination_ordinal,
            self.config.max_probe_pages,
            self.config.signature_body_chars,
        )
    }

    async fn open_start<D: ThreadDocument>(
        &self,
        doc: &mut D,
        start: &Url,
    ) -> Result<DocumentSnapshot, HarvestError> {
        let start_err = |source| HarvestError::StartPage {
            url: start.to_string(),
            source,
        };

        doc.navigate(start).await.map_err(start_err)?;
        match doc.dismiss_overlays().await {
            Ok(true) => debug!("Dismissed consent overlay"),
            Ok(false) => {}
            Err(e) => debug!("Overlay dismissal failed: {}", e),
        }
        doc.snapshot().await.map_err(start_err)
    }

    async fn emit(&self, event: HarvestEvent) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(event).await;
        }
    }
}
