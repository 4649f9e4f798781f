//! A browser tab driven as a [`ThreadDocument`].

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, NavigateParams};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Element, Page};
use image::codecs::jpeg::JpegDecoder;
use image::ImageDecoder;
use tracing::{debug, info, warn};
use url::Url;

use super::{scripts, CONTROL_SELECTOR};
use crate::config::BrowserEngineConfig;
use crate::document::{
    ControlCandidate, ControlScope, DocumentError, DocumentSnapshot, PageCapture, ThreadDocument,
};
use crate::patterns::PatternSet;

pub struct BrowserPage {
    page: Page,
    config: BrowserEngineConfig,
    patterns: PatternSet,
    scoped_selector: String,
    capture_quality: u8,
}

impl BrowserPage {
    pub(super) fn new(
        page: Page,
        config: BrowserEngineConfig,
        patterns: PatternSet,
        scoped_selector: String,
        capture_quality: u8,
    ) -> Self {
        Self {
            page,
            config,
            patterns,
            scoped_selector,
            capture_quality: capture_quality.clamp(1, 100),
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout)
    }

    async fn settle(&self) {
        if self.config.settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;
        }
    }

    async fn wait_until_ready(&self) {
        match tokio::time::timeout(self.timeout(), self.page.evaluate(scripts::WAIT_FOR_READY.to_string())).await {
            Ok(Ok(result)) => {
                let state: String = result.into_value().unwrap_or_else(|_| "unknown".to_string());
                debug!("Page ready state: {}", state);
            }
            Ok(Err(e)) => debug!("Could not check ready state: {}", e),
            Err(_) => warn!("Timeout waiting for page ready state"),
        }
    }

    async fn apply_stealth(&self) {
        for script in scripts::STEALTH {
            if let Err(e) = self.page.evaluate(script.to_string()).await {
                debug!("Stealth script failed: {}", e);
            }
        }
    }

    async fn wait_for_selector(&self) {
        let Some(ref selector) = self.config.wait_for_selector else {
            return;
        };
        debug!("Waiting for selector: {}", selector);
        match tokio::time::timeout(self.timeout(), self.page.find_element(selector.as_str())).await {
            Ok(Ok(_)) => debug!("Selector found"),
            Ok(Err(e)) => warn!("Selector not found: {}", e),
            Err(_) => warn!("Timeout waiting for selector"),
        }
    }

    /// Label of an element: inner text, falling back to aria-label.
    async fn label_of(element: &Element) -> Option<String> {
        let text = element.inner_text().await.ok().flatten().unwrap_or_default();
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !text.is_empty() {
            return Some(text);
        }
        element
            .attribute("aria-label")
            .await
            .ok()
            .flatten()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
    }

    /// Labelled elements matching `selector`, bounded by the page timeout.
    async fn candidates(&self, selector: &str) -> Result<Vec<ControlCandidate<Element>>, DocumentError> {
        let timeout = self.timeout();
        tokio::time::timeout(timeout, self.enumerate(selector))
            .await
            .map_err(|_| DocumentError::Timeout(timeout))?
    }

    async fn enumerate(&self, selector: &str) -> Result<Vec<ControlCandidate<Element>>, DocumentError> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| DocumentError::Script(e.to_string()))?;

        let mut candidates = Vec::with_capacity(elements.len());
        for element in elements {
            if let Some(label) = Self::label_of(&element).await {
                candidates.push(ControlCandidate {
                    label,
                    handle: element,
                });
            }
        }
        Ok(candidates)
    }
}

#[async_trait]
impl ThreadDocument for BrowserPage {
    type Control = Element;

    async fn navigate(&mut self, location: &Url) -> Result<(), DocumentError> {
        let nav_err = |message: String| DocumentError::Navigation {
            url: location.to_string(),
            message,
        };

        info!("Navigating to {}", location);
        let params = NavigateParams::builder()
            .url(location.as_str())
            .build()
            .map_err(nav_err)?;

        let timeout = self.timeout();
        match tokio::time::timeout(timeout, self.page.execute(params)).await {
            Ok(Ok(response)) => {
                if let Some(error) = response.result.error_text.clone() {
                    return Err(nav_err(error));
                }
            }
            Ok(Err(e)) => return Err(nav_err(e.to_string())),
            Err(_) => return Err(DocumentError::Timeout(timeout)),
        }

        self.wait_until_ready().await;
        self.apply_stealth().await;
        self.settle().await;
        self.wait_for_selector().await;
        Ok(())
    }

    async fn current_location(&self) -> Result<Url, DocumentError> {
        let current = self
            .page
            .url()
            .await
            .map_err(|e| DocumentError::Script(e.to_string()))?
            .unwrap_or_default();
        Url::parse(&current).map_err(|_| DocumentError::InvalidLocation(current))
    }

    async fn dismiss_overlays(&mut self) -> Result<bool, DocumentError> {
        let candidates = self.candidates(CONTROL_SELECTOR).await?;
        let Some(consent) = candidates
            .into_iter()
            .find(|c| self.patterns.is_consent_label(&c.label))
        else {
            return Ok(false);
        };

        debug!("Accepting consent dialog via '{}'", consent.label);
        consent
            .handle
            .click()
            .await
            .map_err(|e| DocumentError::Interaction(e.to_string()))?;
        self.settle().await;
        Ok(true)
    }

    async fn scroll_by(&mut self, delta_px: i64) -> Result<(), DocumentError> {
        self.page
            .evaluate(scripts::scroll_by(delta_px))
            .await
            .map_err(|e| DocumentError::Script(e.to_string()))?;
        Ok(())
    }

    async fn snapshot(&self) -> Result<DocumentSnapshot, DocumentError> {
        let result = tokio::time::timeout(self.timeout(), self.page.evaluate(scripts::SNAPSHOT.to_string()))
            .await
            .map_err(|_| DocumentError::Timeout(self.timeout()))?
            .map_err(|e| DocumentError::Script(e.to_string()))?;
        result
            .into_value::<DocumentSnapshot>()
            .map_err(|e| DocumentError::Script(format!("Unexpected snapshot payload: {}", e)))
    }

    async fn disclosure_controls(
        &self,
        scope: ControlScope,
    ) -> Result<Vec<ControlCandidate<Element>>, DocumentError> {
        let selector = match scope {
            ControlScope::WholePage => CONTROL_SELECTOR,
            ControlScope::CommentContainers => self.scoped_selector.as_str(),
        };
        self.candidates(selector).await
    }

    async fn trigger(&mut self, control: &Element) -> Result<(), DocumentError> {
        let interaction = |e: chromiumoxide::error::CdpError| DocumentError::Interaction(e.to_string());
        control.scroll_into_view().await.map_err(interaction)?;
        control.click().await.map_err(interaction)?;
        Ok(())
    }

    async fn capture(&mut self, page_ordinal: u32) -> Result<PageCapture, DocumentError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Jpeg)
            .quality(self.capture_quality as i64)
            .full_page(true)
            .build();
        let jpeg = self
            .page
            .screenshot(params)
            .await
            .map_err(|e| DocumentError::Interaction(format!("Screenshot failed: {}", e)))?;

        let (width_px, height_px) = JpegDecoder::new(Cursor::new(jpeg.as_slice()))
            .map(|decoder| decoder.dimensions())
            .map_err(|e| DocumentError::Interaction(format!("Unreadable screenshot: {}", e)))?;
        debug!("Captured page {} at {}x{}", page_ordinal, width_px, height_px);

        Ok(PageCapture {
            page_ordinal,
            jpeg,
            width_px,
            height_px,
        })
    }
}
