//! In-memory thread used by the harvesting tests.

use std::collections::{HashSet, VecDeque};
use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::locator::{page_location, resolved_ordinal};
use crate::document::{
    ControlCandidate, ControlScope, DocumentError, DocumentSnapshot, PageCapture, ThreadDocument,
};

pub(crate) const EXPAND_LABEL: &str = "Mehr Antworten anzeigen";
const SHARE_CONTROL: u32 = u32::MAX;

/// What the fake serves for ordinals past the last page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Overflow {
    /// Redirect to the first page.
    Redirect,
    /// Serve the last page again under the requested location.
    RepeatLast,
    /// Serve a page without comments under the requested location.
    Empty,
}

/// Markup for a page holding the given (author, body) comments.
pub(crate) fn comment_page(comments: &[(&str, &str)]) -> String {
    let items: String = comments
        .iter()
        .map(|(author, body)| {
            format!(
                r#"<div data-test="comment"><span class="comment-author">{author}</span><time>heute</time><div data-test="comment-body">{body}</div></div>"#
            )
        })
        .collect();
    format!(r#"<html><head><title>Thread</title></head><body><h1>Thread</h1><section>{items}</section></body></html>"#)
}

/// A small JPEG of the given size.
pub(crate) fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image::RgbImage::from_pixel(width, height, image::Rgb([200, 200, 200]))
        .write_to(&mut out, image::ImageFormat::Jpeg)
        .unwrap();
    out.into_inner()
}

pub(crate) struct FakeThread {
    base: Url,
    pages: Vec<String>,
    empty_page: String,
    overflow: Overflow,
    location: Url,
    /// Index into `pages`, or `None` for the comment-less overflow page.
    showing: Option<usize>,
    fail_navigation_from: Option<u32>,
    waves: VecDeque<usize>,
    visible: Vec<u32>,
    next_control: u32,
    failing: HashSet<u32>,
    enumeration_delay: Option<Duration>,
    pub navigations: Vec<Url>,
    pub scrolls: u32,
    pub triggers: u32,
}

impl FakeThread {
    pub fn new(base: &str, pages: Vec<String>) -> Self {
        let base = Url::parse(base).unwrap();
        Self {
            location: base.clone(),
            base,
            pages,
            empty_page: comment_page(&[]),
            overflow: Overflow::Redirect,
            showing: Some(0),
            fail_navigation_from: None,
            waves: VecDeque::new(),
            visible: Vec::new(),
            next_control: 0,
            failing: HashSet::new(),
            enumeration_delay: None,
            navigations: Vec::new(),
            scrolls: 0,
            triggers: 0,
        }
    }

    pub fn overflow(mut self, overflow: Overflow) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn fail_navigation_from(mut self, ordinal: u32) -> Self {
        self.fail_navigation_from = Some(ordinal);
        self
    }

    /// Disclosure controls appear in waves: the next wave shows up once
    /// every control of the current one has been triggered.
    pub fn with_waves(mut self, waves: &[usize]) -> Self {
        self.waves = waves.iter().copied().collect();
        self.reveal_next_wave();
        self
    }

    /// The first `count` controls of the first wave fail when triggered.
    pub fn failing_controls(mut self, count: usize) -> Self {
        self.failing = self.visible.iter().take(count).copied().collect();
        self
    }

    /// Every control enumeration takes `delay` before answering.
    pub fn slow_enumeration(mut self, delay: Duration) -> Self {
        self.enumeration_delay = Some(delay);
        self
    }

    fn reveal_next_wave(&mut self) {
        if let Some(size) = self.waves.pop_front() {
            for _ in 0..size {
                self.visible.push(self.next_control);
                self.next_control += 1;
            }
        }
    }
}

#[async_trait]
impl ThreadDocument for FakeThread {
    type Control = u32;

    async fn navigate(&mut self, location: &Url) -> Result<(), DocumentError> {
        self.navigations.push(location.clone());
        let requested = resolved_ordinal(location, "page");
        if self.fail_navigation_from.is_some_and(|n| requested >= n) {
            return Err(DocumentError::Navigation {
                url: location.to_string(),
                message: "net::ERR_CONNECTION_RESET".to_string(),
            });
        }

        let index = requested as usize - 1;
        if index < self.pages.len() {
            self.location = location.clone();
            self.showing = Some(index);
        } else {
            match self.overflow {
                Overflow::Redirect => {
                    self.location = page_location(&self.base, "page", 1);
                    self.showing = Some(0);
                }
                Overflow::RepeatLast => {
                    self.location = location.clone();
                    self.showing = Some(self.pages.len() - 1);
                }
                Overflow::Empty => {
                    self.location = location.clone();
                    self.showing = None;
                }
            }
        }
        Ok(())
    }

    async fn current_location(&self) -> Result<Url, DocumentError> {
        Ok(self.location.clone())
    }

    async fn dismiss_overlays(&mut self) -> Result<bool, DocumentError> {
        Ok(false)
    }

    async fn scroll_by(&mut self, _delta_px: i64) -> Result<(), DocumentError> {
        self.scrolls += 1;
        Ok(())
    }

    async fn snapshot(&self) -> Result<DocumentSnapshot, DocumentError> {
        Ok(DocumentSnapshot::new(
            self.location.clone(),
            self.showing
                .map_or(&self.empty_page, |i| &self.pages[i])
                .clone(),
        ))
    }

    async fn disclosure_controls(
        &self,
        _scope: ControlScope,
    ) -> Result<Vec<ControlCandidate<u32>>, DocumentError> {
        if let Some(delay) = self.enumeration_delay {
            tokio::time::sleep(delay).await;
        }
        let mut controls: Vec<ControlCandidate<u32>> = self
            .visible
            .iter()
            .map(|id| ControlCandidate {
                label: EXPAND_LABEL.to_string(),
                handle: *id,
            })
            .collect();
        controls.push(ControlCandidate {
            label: "Teilen".to_string(),
            handle: SHARE_CONTROL,
        });
        Ok(controls)
    }

    async fn trigger(&mut self, control: &u32) -> Result<(), DocumentError> {
        self.triggers += 1;
        if self.failing.contains(control) {
            return Err(DocumentError::Interaction("element detached".to_string()));
        }
        self.visible.retain(|id| id != control);
        if self.visible.iter().all(|id| self.failing.contains(id)) {
            self.reveal_next_wave();
        }
        Ok(())
    }

    async fn capture(&mut self, page_ordinal: u32) -> Result<PageCapture, DocumentError> {
        Ok(PageCapture {
            page_ordinal,
            jpeg: jpeg(40, 60),
            width_px: 40,
            height_px: 60,
        })
    }
}
