//! Word-wrapped text output on A4 pages.

use super::metrics::{text_width, FontFace};
use super::{
    DocumentRenderer, PageItem, RenderError, RenderedDocument, RenderedPage, Rgb, TextLine,
    A4_HEIGHT, A4_WIDTH,
};
use crate::config::{RenderLabels, RenderStrategy};
use crate::document::PageCapture;
use crate::models::{CommentRecord, ThreadHead, MAX_NESTING_DEPTH};

pub const MARGIN: f32 = 36.0;
pub const LINE_HEIGHT: f32 = 13.0;
const INDENT_PER_LEVEL: f32 = 12.0;
const COMMENT_GAP: f32 = 6.0;
/// A comment never starts with less room than this left on the page.
const MIN_REMAINING: f32 = 40.0;

const TITLE_SIZE: f32 = 16.0;
const HEADING_SIZE: f32 = 12.0;
const TEXT_SIZE: f32 = 11.0;
const COMMENT_SIZE: f32 = 10.0;
const NOTE_SIZE: f32 = 9.0;

#[derive(Debug, Clone, Copy)]
struct Style {
    face: FontFace,
    size: f32,
    color: Rgb,
}

impl Style {
    const TITLE: Style = Style {
        face: FontFace::Bold,
        size: TITLE_SIZE,
        color: Rgb::DARK_BLUE,
    };
    const HEADING: Style = Style {
        face: FontFace::Bold,
        size: HEADING_SIZE,
        color: Rgb::BLACK,
    };
    const TEXT: Style = Style {
        face: FontFace::Regular,
        size: TEXT_SIZE,
        color: Rgb::BLACK,
    };
    const NOTE: Style = Style {
        face: FontFace::Regular,
        size: NOTE_SIZE,
        color: Rgb::GREY,
    };
    const COMMENT_HEADER: Style = Style {
        face: FontFace::Bold,
        size: COMMENT_SIZE,
        color: Rgb::BLACK,
    };
    const COMMENT_BODY: Style = Style {
        face: FontFace::Regular,
        size: COMMENT_SIZE,
        color: Rgb::BLACK,
    };
}

/// Greedy word wrap to `width` points. Words wider than a line are broken
/// between characters; explicit line breaks are not interpreted here.
pub fn wrap(text: &str, face: FontFace, size: f32, width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        for piece in break_word(word, face, size, width) {
            if line.is_empty() {
                line = piece;
                continue;
            }
            let candidate = format!("{line} {piece}");
            if text_width(&candidate, face, size) > width {
                lines.push(std::mem::replace(&mut line, piece));
            } else {
                line = candidate;
            }
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn break_word(word: &str, face: FontFace, size: f32, width: f32) -> Vec<String> {
    if text_width(word, face, size) <= width {
        return vec![word.to_string()];
    }

    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut piece_width = 0.0;
    for c in word.chars() {
        let w = super::metrics::char_width(c, face, size);
        if !piece.is_empty() && piece_width + w > width {
            pieces.push(std::mem::take(&mut piece));
            piece_width = 0.0;
        }
        piece.push(c);
        piece_width += w;
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

/// Cursor over a growing list of A4 pages.
struct Flow {
    pages: Vec<RenderedPage>,
    /// Top of the next line, from the bottom of the page.
    cursor: f32,
}

impl Flow {
    fn new() -> Self {
        Self {
            pages: vec![RenderedPage::new(A4_WIDTH, A4_HEIGHT)],
            cursor: A4_HEIGHT - MARGIN,
        }
    }

    fn content_width() -> f32 {
        A4_WIDTH - 2.0 * MARGIN
    }

    fn new_page(&mut self) {
        self.pages.push(RenderedPage::new(A4_WIDTH, A4_HEIGHT));
        self.cursor = A4_HEIGHT - MARGIN;
    }

    fn line(&mut self, text: String, style: Style, indent: f32) {
        if self.cursor - LINE_HEIGHT < MARGIN {
            self.new_page();
        }
        let baseline = self.cursor - LINE_HEIGHT;
        if let Some(page) = self.pages.last_mut() {
            page.items.push(PageItem::Text(TextLine {
                x: MARGIN + indent,
                baseline,
                size: style.size,
                face: style.face,
                color: style.color,
                text,
            }));
        }
        self.cursor = baseline;
    }

    /// Wrapped text; blank lines separate paragraphs, single line breaks
    /// are kept.
    fn block(&mut self, text: &str, style: Style, indent: f32) {
        let width = Self::content_width() - indent;
        let paragraphs: Vec<&str> = text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        for (i, paragraph) in paragraphs.iter().enumerate() {
            if i > 0 {
                self.space(LINE_HEIGHT);
            }
            for hard_line in paragraph.lines() {
                for wrapped in wrap(hard_line, style.face, style.size, width) {
                    self.line(wrapped, style, indent);
                }
            }
        }
    }

    fn space(&mut self, points: f32) {
        self.cursor -= points;
        if self.cursor - LINE_HEIGHT < MARGIN {
            self.new_page();
        }
    }

    /// Vertical gap; starts a new page when less than `min_remaining` is
    /// left above the bottom margin.
    fn gap(&mut self, points: f32, min_remaining: f32) {
        self.cursor -= points;
        if self.cursor < MARGIN + min_remaining {
            self.new_page();
        }
    }

    fn finish(self) -> Vec<RenderedPage> {
        self.pages
    }
}

/// Head and comments as flowing text.
#[derive(Debug, Clone, Default)]
pub struct FlowedTextRenderer {
    labels: RenderLabels,
}

impl FlowedTextRenderer {
    pub fn new(labels: RenderLabels) -> Self {
        Self { labels }
    }

    fn head(&self, flow: &mut Flow, head: &ThreadHead) {
        let title = if head.title.trim().is_empty() {
            self.labels.untitled.as_str()
        } else {
            head.title.as_str()
        };
        flow.block(title, Style::TITLE, 0.0);
        flow.block(head.link.as_str(), Style::NOTE, 0.0);
        for (label, value) in head.facts() {
            flow.block(&format!("{label}: {value}"), Style::TEXT, 0.0);
        }
        flow.block(
            &format!(
                "{}: {}",
                self.labels.captured,
                head.captured_at.format("%Y-%m-%d %H:%M UTC")
            ),
            Style::NOTE,
            0.0,
        );

        if !head.description.trim().is_empty() {
            flow.space(LINE_HEIGHT / 2.0);
            flow.block(&self.labels.description, Style::HEADING, 0.0);
            flow.block(&head.description, Style::TEXT, 0.0);
        }

        if !head.images.is_empty() {
            flow.space(LINE_HEIGHT / 2.0);
            flow.block(&self.labels.images, Style::HEADING, 0.0);
            for url in &head.images {
                flow.block(url, Style::NOTE, 0.0);
            }
        }
    }

    fn comments(&self, flow: &mut Flow, comments: &[CommentRecord]) {
        flow.space(LINE_HEIGHT / 2.0);
        flow.block(&self.labels.comments, Style::HEADING, 0.0);
        flow.block(
            &format!("{}: {}", self.labels.total, comments.len()),
            Style::NOTE,
            0.0,
        );
        flow.space(COMMENT_GAP);

        for comment in comments {
            let level = comment.nesting_depth.level().min(MAX_NESTING_DEPTH);
            let indent = level as f32 * INDENT_PER_LEVEL;

            flow.block(&comment.header_line(), Style::COMMENT_HEADER, indent);
            flow.block(&comment.body_text, Style::COMMENT_BODY, indent);

            flow.gap(COMMENT_GAP, MIN_REMAINING);
        }
    }
}

impl DocumentRenderer for FlowedTextRenderer {
    fn strategy(&self) -> RenderStrategy {
        RenderStrategy::Flowed
    }

    fn needs_page_captures(&self) -> bool {
        false
    }

    fn render(
        &self,
        head: &ThreadHead,
        comments: &[CommentRecord],
        _captures: &[PageCapture],
    ) -> Result<RenderedDocument, RenderError> {
        let mut flow = Flow::new();
        self.head(&mut flow, head);
        self.comments(&mut flow, comments);

        Ok(RenderedDocument {
            title: head.title.clone(),
            pages: flow.finish(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NestingDepth;
    use url::Url;

    fn head(title: &str) -> ThreadHead {
        ThreadHead::bare(title, Url::parse("https://deals.example/diskussion/t-42").unwrap())
    }

    fn comment(i: usize, depth: i64) -> CommentRecord {
        CommentRecord {
            author_name: format!("user{i}"),
            timestamp_text: "vor 3 Std.".to_string(),
            score_text: (i % 3 == 0).then(|| format!("{i} Gefällt mir")),
            body_text: format!(
                "Comment number {i}. Lorem ipsum dolor sit amet, consectetur adipiscing elit, \
                 sed do eiusmod tempor incididunt ut labore et dolore magna aliqua.\n\nSecond paragraph."
            ),
            nesting_depth: NestingDepth::clamped(depth),
            source_page_index: 1,
            source_ordinal: i,
        }
    }

    #[test]
    fn test_wrap_respects_width() {
        let text = "The quick brown fox jumps over the lazy dog ".repeat(10);
        let lines = wrap(&text, FontFace::Regular, 10.0, 200.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, FontFace::Regular, 10.0) <= 200.0, "{line:?} too wide");
        }
        assert_eq!(lines.join(" "), text.trim_end());
    }

    #[test]
    fn test_wrap_breaks_overlong_words() {
        let url = format!("https://example.com/{}", "x".repeat(300));
        let lines = wrap(&url, FontFace::Regular, 10.0, 100.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), url);
        assert!(lines.iter().all(|l| text_width(l, FontFace::Regular, 10.0) <= 100.0));
    }

    #[test]
    fn test_wrap_empty_text() {
        assert!(wrap("   ", FontFace::Bold, 10.0, 100.0).is_empty());
    }

    #[test]
    fn test_gap_breaks_page_when_room_runs_out() {
        let mut flow = Flow::new();
        flow.gap(COMMENT_GAP, MIN_REMAINING);
        assert_eq!(flow.pages.len(), 1);
        assert_eq!(flow.cursor, A4_HEIGHT - MARGIN - COMMENT_GAP);

        flow.cursor = MARGIN + MIN_REMAINING + COMMENT_GAP - 1.0;
        flow.gap(COMMENT_GAP, MIN_REMAINING);
        assert_eq!(flow.pages.len(), 2);
        assert_eq!(flow.cursor, A4_HEIGHT - MARGIN);
    }

    #[test]
    fn test_thread_without_comments_fits_one_page() {
        let rendered = FlowedTextRenderer::default()
            .render(&head("Cheap headphones"), &[], &[])
            .unwrap();
        assert_eq!(rendered.page_count(), 1);

        let first = rendered.pages[0].text_lines().next().unwrap();
        assert_eq!(first.text, "Cheap headphones");
        assert_eq!(first.face, FontFace::Bold);
        assert_eq!(first.size, TITLE_SIZE);
        assert!(rendered.text().contains("Total: 0"));
    }

    #[test]
    fn test_untitled_thread_uses_label() {
        let rendered = FlowedTextRenderer::default().render(&head(""), &[], &[]).unwrap();
        assert!(rendered.text().starts_with("Untitled thread"));
    }

    #[test]
    fn test_long_thread_paginates_within_margins() {
        let comments: Vec<CommentRecord> = (0..120).map(|i| comment(i, (i % 12) as i64)).collect();
        let rendered = FlowedTextRenderer::default()
            .render(&head("Busy thread"), &comments, &[])
            .unwrap();

        assert!(rendered.page_count() > 1);
        for page in &rendered.pages {
            assert_eq!((page.width, page.height), (A4_WIDTH, A4_HEIGHT));
            for line in page.text_lines() {
                assert!(line.baseline >= MARGIN, "baseline {} below margin", line.baseline);
                assert!(line.baseline <= A4_HEIGHT - MARGIN);
                let right = line.x + text_width(&line.text, line.face, line.size);
                assert!(right <= A4_WIDTH - MARGIN + 0.01, "line overflows: {:?}", line.text);
            }
        }
        assert!(rendered.text().contains("Total: 120"));
    }

    #[test]
    fn test_comment_indent_follows_depth() {
        let comments = vec![comment(1, 0), comment(2, 3), comment(4, 8)];
        let rendered = FlowedTextRenderer::default()
            .render(&head("Indents"), &comments, &[])
            .unwrap();

        let x_of = |author: &str| {
            rendered
                .pages
                .iter()
                .flat_map(|p| p.text_lines())
                .find(|l| l.text.starts_with(author))
                .map(|l| l.x)
                .unwrap()
        };
        assert_eq!(x_of("user1 "), MARGIN);
        assert_eq!(x_of("user2 "), MARGIN + 36.0);
        assert_eq!(x_of("user4 "), MARGIN + 96.0);
    }

    #[test]
    fn test_head_facts_and_images_listed() {
        let mut head = head("Deal");
        head.price = Some("19,99€".to_string());
        head.description = "Line one\nLine two".to_string();
        head.images = vec!["https://cdn.example/a.jpg".to_string()];

        let text = FlowedTextRenderer::default().render(&head, &[], &[]).unwrap().text();
        assert!(text.contains("Price: 19,99€"));
        assert!(text.contains("Line one\nLine two"));
        assert!(text.contains("Images (URLs):\nhttps://cdn.example/a.jpg"));
    }
}
