//! One full-page capture per output page.

use tracing::debug;

use super::metrics::FontFace;
use super::{
    probe_jpeg, DocumentRenderer, PageItem, PlacedImage, RenderError, RenderedDocument,
    RenderedPage, Rgb, TextLine, A4_HEIGHT, A4_WIDTH,
};
use crate::config::RenderStrategy;
use crate::document::PageCapture;
use crate::models::{CommentRecord, ThreadHead};

const MARGIN: f32 = 36.0;
const TITLE_SIZE: f32 = 16.0;
/// Largest page side PDF viewers accept, in points.
const MAX_PAGE_SIDE: f32 = 14_400.0;

/// Places each sub-page capture on its own page, scaled by a single
/// pixel-to-point factor so all pages share one zoom level.
///
/// Pages are A4 wide; a capture taller than A4 gets a taller page instead of
/// being cut, up to the PDF page size limit.
#[derive(Debug, Clone)]
pub struct RasterRenderer {
    pixel_to_point: f32,
}

impl RasterRenderer {
    pub fn new(pixel_to_point: f32) -> Self {
        let pixel_to_point = if pixel_to_point.is_finite() && pixel_to_point > 0.0 {
            pixel_to_point
        } else {
            0.75
        };
        Self { pixel_to_point }
    }

    fn title_page(head: &ThreadHead) -> RenderedPage {
        let mut page = RenderedPage::new(A4_WIDTH, A4_HEIGHT);
        page.items.push(PageItem::Text(TextLine {
            x: MARGIN,
            baseline: A4_HEIGHT - MARGIN - TITLE_SIZE,
            size: TITLE_SIZE,
            face: FontFace::Bold,
            color: Rgb::DARK_BLUE,
            text: head.title.clone(),
        }));
        page
    }
}

impl DocumentRenderer for RasterRenderer {
    fn strategy(&self) -> RenderStrategy {
        RenderStrategy::Raster
    }

    fn needs_page_captures(&self) -> bool {
        true
    }

    fn render(
        &self,
        head: &ThreadHead,
        _comments: &[CommentRecord],
        captures: &[PageCapture],
    ) -> Result<RenderedDocument, RenderError> {
        if captures.is_empty() {
            return Ok(RenderedDocument {
                title: head.title.clone(),
                pages: vec![Self::title_page(head)],
            });
        }

        let mut probed = Vec::with_capacity(captures.len());
        for capture in captures {
            probed.push((capture, probe_jpeg(capture)?));
        }

        // Shrink uniformly if the widest or tallest capture would not fit.
        let content_width = A4_WIDTH - 2.0 * MARGIN;
        let content_height = MAX_PAGE_SIDE - 2.0 * MARGIN;
        let widest = probed.iter().map(|(_, (w, _, _))| *w).max().unwrap_or(1).max(1);
        let tallest = probed.iter().map(|(_, (_, h, _))| *h).max().unwrap_or(1).max(1);
        let scale = self
            .pixel_to_point
            .min(content_width / widest as f32)
            .min(content_height / tallest as f32);
        debug!("Raster scale {:.3} pt/px for {} captures", scale, probed.len());

        let pages = probed
            .into_iter()
            .map(|(capture, (width_px, height_px, grayscale))| {
                let width = width_px as f32 * scale;
                let height = height_px as f32 * scale;
                let page_height = A4_HEIGHT.max(height + 2.0 * MARGIN).min(MAX_PAGE_SIDE);

                let mut page = RenderedPage::new(A4_WIDTH, page_height);
                page.items.push(PageItem::Image(PlacedImage {
                    x: MARGIN,
                    y: page_height - MARGIN - height,
                    width,
                    height,
                    jpeg: capture.jpeg.clone(),
                    width_px,
                    height_px,
                    grayscale,
                }));
                page
            })
            .collect();

        Ok(RenderedDocument {
            title: head.title.clone(),
            pages,
        })
    }
}
