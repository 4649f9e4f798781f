//! Paginated output documents.
//!
//! A renderer lays the harvested records out into a [`RenderedDocument`]
//! (fixed-size pages of placed text lines and images) which is serialized
//! to PDF exactly once, after everything has been laid out.

mod flowed;
pub mod metrics;
mod raster;

pub use flowed::FlowedTextRenderer;
pub use metrics::FontFace;
pub use raster::RasterRenderer;

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegDecoder;
use image::{ColorType, ImageDecoder};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use thiserror::Error;
use tracing::debug;

use crate::config::{RenderConfig, RenderStrategy};
use crate::document::PageCapture;
use crate::models::{CommentRecord, ThreadHead};

/// A4 portrait in points.
pub const A4_WIDTH: f32 = 595.28;
pub const A4_HEIGHT: f32 = 841.89;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("Capture of page {page} is not a usable JPEG: {source}")]
    Image {
        page: u32,
        #[source]
        source: image::ImageError,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize PDF: {0}")]
    Serialize(String),
    #[error("Document has no pages")]
    Empty,
}

/// DeviceRGB color components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);
    pub const DARK_BLUE: Rgb = Rgb(0.1, 0.2, 0.5);
    pub const GREY: Rgb = Rgb(0.4, 0.4, 0.4);
}

/// One line of text. `baseline` is measured from the bottom of the page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub x: f32,
    pub baseline: f32,
    pub size: f32,
    pub face: FontFace,
    pub color: Rgb,
    pub text: String,
}

/// A JPEG drawn into a rectangle. `y` is the bottom edge.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedImage {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub jpeg: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
    pub grayscale: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageItem {
    Text(TextLine),
    Image(PlacedImage),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub width: f32,
    pub height: f32,
    pub items: Vec<PageItem>,
}

impl RenderedPage {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            items: Vec::new(),
        }
    }

    pub fn text_lines(&self) -> impl Iterator<Item = &TextLine> {
        self.items.iter().filter_map(|item| match item {
            PageItem::Text(line) => Some(line),
            PageItem::Image(_) => None,
        })
    }
}

/// Laid-out output, ready for serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub title: String,
    pub pages: Vec<RenderedPage>,
}

impl RenderedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Every text line in reading order.
    pub fn text(&self) -> String {
        self.pages
            .iter()
            .flat_map(|p| p.text_lines())
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Serialize to PDF.
    pub fn to_pdf_bytes(&self) -> Result<Vec<u8>, RenderError> {
        if self.pages.is_empty() {
            return Err(RenderError::Empty);
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut fonts = lopdf::Dictionary::new();
        for face in [FontFace::Regular, FontFace::Bold] {
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => face.base_font(),
                "Encoding" => "WinAnsiEncoding",
            });
            fonts.set(face.resource_name(), font_id);
        }

        let mut kids = Vec::with_capacity(self.pages.len());
        let mut image_count = 0usize;
        for page in &self.pages {
            let mut operations = Vec::new();
            let mut xobjects = lopdf::Dictionary::new();

            for item in &page.items {
                match item {
                    PageItem::Text(line) => push_text(&mut operations, line),
                    PageItem::Image(image) => {
                        image_count += 1;
                        let name = format!("Im{}", image_count);
                        let color_space = if image.grayscale { "DeviceGray" } else { "DeviceRGB" };
                        let stream = Stream::new(
                            dictionary! {
                                "Type" => "XObject",
                                "Subtype" => "Image",
                                "Width" => image.width_px as i64,
                                "Height" => image.height_px as i64,
                                "ColorSpace" => color_space,
                                "BitsPerComponent" => 8,
                                "Filter" => "DCTDecode",
                            },
                            image.jpeg.clone(),
                        )
                        .with_compression(false);
                        let image_id = doc.add_object(stream);
                        xobjects.set(name.as_bytes().to_vec(), image_id);
                        push_image(&mut operations, image, &name);
                    }
                }
            }

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let resources = dictionary! {
                "Font" => fonts.clone(),
                "XObject" => xobjects,
            };
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), page.width.into(), page.height.into()],
                "Resources" => resources,
                "Contents" => content_id,
            });
            kids.push(Object::from(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(metrics::encode_win_ansi(&self.title)),
            "Producer" => Object::string_literal(concat!("threadpress ", env!("CARGO_PKG_VERSION"))),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        doc.compress();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| RenderError::Serialize(e.to_string()))?;
        debug!("Serialized {} pages ({} bytes)", self.pages.len(), bytes.len());
        Ok(bytes)
    }

    /// Serialize and write the finished document in one step.
    pub async fn write_to(&self, path: &Path) -> Result<(), RenderError> {
        let bytes = self.to_pdf_bytes()?;
        let write_err = |source| RenderError::Write {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        tokio::fs::write(path, bytes).await.map_err(write_err)
    }
}

fn push_text(operations: &mut Vec<Operation>, line: &TextLine) {
    let Rgb(r, g, b) = line.color;
    operations.extend([
        Operation::new("BT", vec![]),
        Operation::new("rg", vec![r.into(), g.into(), b.into()]),
        Operation::new("Tf", vec![line.face.resource_name().into(), line.size.into()]),
        Operation::new("Td", vec![line.x.into(), line.baseline.into()]),
        Operation::new("Tj", vec![Object::string_literal(metrics::encode_win_ansi(&line.text))]),
        Operation::new("ET", vec![]),
    ]);
}

fn push_image(operations: &mut Vec<Operation>, image: &PlacedImage, name: &str) {
    operations.extend([
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                image.width.into(),
                0.into(),
                0.into(),
                image.height.into(),
                image.x.into(),
                image.y.into(),
            ],
        ),
        Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]);
}

/// Pixel size and color model of a JPEG capture.
pub(crate) fn probe_jpeg(capture: &PageCapture) -> Result<(u32, u32, bool), RenderError> {
    let image_err = |source| RenderError::Image {
        page: capture.page_ordinal,
        source,
    };
    let decoder = JpegDecoder::new(Cursor::new(capture.jpeg.as_slice())).map_err(image_err)?;
    let (width, height) = decoder.dimensions();
    let grayscale = matches!(decoder.color_type(), ColorType::L8 | ColorType::L16);
    Ok((width, height, grayscale))
}

/// Turns harvested records into a paginated document.
pub trait DocumentRenderer: Send + Sync {
    fn strategy(&self) -> RenderStrategy;

    /// Whether [`render`](Self::render) expects one capture per sub-page.
    fn needs_page_captures(&self) -> bool;

    fn render(
        &self,
        head: &ThreadHead,
        comments: &[CommentRecord],
        captures: &[PageCapture],
    ) -> Result<RenderedDocument, RenderError>;
}

/// Renderer for the configured strategy.
pub fn renderer_for(config: &RenderConfig) -> Box<dyn DocumentRenderer> {
    match config.strategy {
        RenderStrategy::Flowed => Box::new(FlowedTextRenderer::new(config.labels.clone())),
        RenderStrategy::Raster => Box::new(RasterRenderer::new(config.pixel_to_point)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RenderedDocument {
        let mut page = RenderedPage::new(A4_WIDTH, A4_HEIGHT);
        page.items.push(PageItem::Text(TextLine {
            x: 36.0,
            baseline: 800.0,
            size: 12.0,
            face: FontFace::Bold,
            color: Rgb::DARK_BLUE,
            text: "Günstige Kopfhörer".to_string(),
        }));
        RenderedDocument {
            title: "Günstige Kopfhörer".to_string(),
            pages: vec![page.clone(), page],
        }
    }

    #[test]
    fn test_pdf_round_trips_through_lopdf() {
        let bytes = sample().to_pdf_bytes().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let parsed = Document::load_mem(&bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 2);
    }

    #[test]
    fn test_empty_document_is_rejected() {
        let doc = RenderedDocument {
            title: String::new(),
            pages: Vec::new(),
        };
        assert!(matches!(doc.to_pdf_bytes(), Err(RenderError::Empty)));
    }

    #[tokio::test]
    async fn test_write_to_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/thread.pdf");
        sample().write_to(&path).await.unwrap();
        let written = std::fs::read(&path).unwrap();
        assert!(written.starts_with(b"%PDF"));
    }

    #[test]
    fn test_renderer_for_strategy() {
        let mut config = RenderConfig::default();
        assert!(!renderer_for(&config).needs_page_captures());
        config.strategy = RenderStrategy::Raster;
        let renderer = renderer_for(&config);
        assert!(renderer.needs_page_captures());
        assert_eq!(renderer.strategy(), RenderStrategy::Raster);
    }
}
