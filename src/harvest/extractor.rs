//! Heuristic extraction of head and comment records from a document snapshot.
//!
//! Everything here is a pure read of [`DocumentSnapshot`]. Individual fields
//! degrade to sentinels; a malformed candidate is skipped, never fatal.

use std::collections::HashSet;

use chrono::Utc;
use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Html, Node, Selector};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::ExtractionConfig;
use crate::document::{DocumentSnapshot, HIDDEN_ATTR, INDENT_ATTR};
use crate::models::{CommentRecord, NestingDepth, ThreadHead, MAX_HEAD_IMAGES, UNKNOWN_FIELD};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },
}

/// Elements whose contents never contribute to extracted text.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Elements that end a line of text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "blockquote", "pre", "section", "article", "header", "footer",
    "h1", "h2", "h3", "h4", "h5", "h6", "tr", "table", "figure", "figcaption", "dl", "dt", "dd",
];

/// Page chrome that never holds comments.
const CHROME_TAGS: &[&str] = &["nav", "header", "footer"];

fn compile_chain(selectors: &[String]) -> Result<Vec<Selector>, ExtractError> {
    selectors
        .iter()
        .map(|s| {
            Selector::parse(s).map_err(|e| ExtractError::Selector {
                selector: s.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

fn compile_one(selector: &str) -> Result<Selector, ExtractError> {
    compile_chain(&[selector.to_string()]).map(|mut v| v.remove(0))
}

/// Compiled selector chains for one deployment.
#[derive(Debug)]
pub struct RecordExtractor {
    comment_tiers: Vec<Vec<Selector>>,
    body: Vec<Selector>,
    author: Vec<Selector>,
    time: Vec<Selector>,
    score: Vec<Selector>,
    title: Vec<Selector>,
    description: Vec<Selector>,
    price: Vec<Selector>,
    merchant: Vec<Selector>,
    expiry: Vec<Selector>,
    canonical: Selector,
    document_title: Selector,
    images: Selector,
    min_body_chars: usize,
    indent_px_per_level: f64,
}

impl RecordExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        Ok(Self {
            comment_tiers: config
                .comment_selector_tiers
                .iter()
                .map(|tier| compile_chain(tier))
                .collect::<Result<_, _>>()?,
            body: compile_chain(&config.body_selectors)?,
            author: compile_chain(&config.author_selectors)?,
            time: compile_chain(&config.time_selectors)?,
            score: compile_chain(&config.score_selectors)?,
            title: compile_chain(&config.title_selectors)?,
            description: compile_chain(&config.description_selectors)?,
            price: compile_chain(&config.price_selectors)?,
            merchant: compile_chain(&config.merchant_selectors)?,
            expiry: compile_chain(&config.expiry_selectors)?,
            canonical: compile_one("link[rel='canonical']")?,
            document_title: compile_one("title")?,
            images: compile_one("img")?,
            min_body_chars: config.min_body_chars,
            indent_px_per_level: config.indent_px_per_level,
        })
    }

    /// Read the thread head.
    pub fn extract_head(&self, snapshot: &DocumentSnapshot) -> ThreadHead {
        self.head_from(&snapshot.parse(), &snapshot.location)
    }

    /// Read every comment on the snapshot, tagged with its sub-page ordinal.
    pub fn extract_comments(&self, snapshot: &DocumentSnapshot, page_index: u32) -> Vec<CommentRecord> {
        self.comments_from(&snapshot.parse(), page_index)
    }

    fn head_from(&self, html: &Html, location: &Url) -> ThreadHead {
        let root = html.root_element();

        let title = first_text(root, &self.title)
            .or_else(|| first_text(root, std::slice::from_ref(&self.document_title)))
            .unwrap_or_default();
        let description = self
            .description
            .iter()
            .flat_map(|sel| root.select(sel))
            .map(element_text)
            .find(|t| !t.is_empty())
            .unwrap_or_default();

        let link = root
            .select(&self.canonical)
            .filter_map(|el| el.value().attr("href"))
            .find_map(|href| location.join(href.trim()).ok())
            .unwrap_or_else(|| location.clone());

        let mut seen = HashSet::new();
        let images: Vec<String> = root
            .select(&self.images)
            .filter_map(|img| {
                let value = img.value();
                value
                    .attr("src")
                    .filter(|s| !s.trim().is_empty())
                    .or_else(|| value.attr("data-src"))
            })
            .map(str::trim)
            .filter(|src| !src.is_empty() && !src.starts_with("data:"))
            .filter_map(|src| location.join(src).ok())
            .map(|u| u.to_string())
            .filter(|u| seen.insert(u.clone()))
            .take(MAX_HEAD_IMAGES)
            .collect();

        ThreadHead {
            title,
            description,
            price: first_text(root, &self.price),
            merchant: first_text(root, &self.merchant),
            expiry: first_text(root, &self.expiry),
            link,
            images,
            captured_at: Utc::now(),
        }
    }

    fn comments_from(&self, html: &Html, page_index: u32) -> Vec<CommentRecord> {
        let root = html.root_element();

        // First tier that matches anything wins; selectors within a tier are
        // unioned in document order.
        let candidates: Vec<ElementRef> = self
            .comment_tiers
            .iter()
            .map(|tier| {
                root.descendants()
                    .filter_map(ElementRef::wrap)
                    .filter(|el| tier.iter().any(|sel| sel.matches(el)))
                    .filter(|el| !inside_page_chrome(*el))
                    .collect::<Vec<_>>()
            })
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        // Classify with ownership over every candidate, then read fields with
        // ownership over the records that survive, so fragments such as a
        // body wrapper fold back into their comment.
        let all = CandidateScope::of(candidates.iter().copied());
        let authored: HashSet<NodeId> = candidates
            .iter()
            .filter(|el| all.first_text(**el, &self.author).is_some())
            .map(|el| el.id())
            .collect();
        let effective: Vec<ElementRef> = candidates
            .into_iter()
            .filter(|el| {
                authored.contains(&el.id())
                    || !el.descendants().skip(1).any(|d| authored.contains(&d.id()))
            })
            .collect();
        let effective_ids: HashSet<NodeId> = effective.iter().map(|el| el.id()).collect();
        let kept: Vec<ElementRef> = effective
            .into_iter()
            .filter(|el| {
                authored.contains(&el.id())
                    || !el.ancestors().any(|a| effective_ids.contains(&a.id()))
            })
            .collect();
        let scope = CandidateScope::of(kept.iter().copied());

        let mut records = Vec::new();
        for el in kept {
            let author = scope.first_text(el, &self.author);

            let body_text = match scope.owned(el, &self.body).next() {
                Some(body) => element_text(body),
                None => scope.text_without_nested(el),
            };
            if body_text.chars().count() < self.min_body_chars.max(1) {
                continue;
            }

            records.push(CommentRecord {
                author_name: author.unwrap_or_else(|| UNKNOWN_FIELD.to_string()),
                timestamp_text: scope
                    .timestamp_of(el, &self.time)
                    .unwrap_or_else(|| UNKNOWN_FIELD.to_string()),
                score_text: scope.score_of(el, &self.score),
                body_text,
                nesting_depth: self.depth_of(el),
                source_page_index: page_index,
                source_ordinal: records.len(),
            });
        }

        debug!("Extracted {} comments from page {}", records.len(), page_index);
        records
    }

    /// Sum of indentation from the element up to (not including) `body`.
    fn depth_of(&self, el: ElementRef) -> NestingDepth {
        let mut offset = indent_of(el);
        for ancestor in el.ancestors().filter_map(ElementRef::wrap) {
            if matches!(ancestor.value().name(), "body" | "html") {
                break;
            }
            offset += indent_of(ancestor);
        }
        NestingDepth::from_offset(offset, self.indent_px_per_level)
    }
}

/// The set of comment candidates on one page. A field match belongs to the
/// candidate that is its nearest candidate ancestor, so a comment never
/// borrows its author, time or body from a nested reply.
struct CandidateScope {
    ids: HashSet<NodeId>,
}

impl CandidateScope {
    fn of<'a>(candidates: impl Iterator<Item = ElementRef<'a>>) -> Self {
        Self {
            ids: candidates.map(|el| el.id()).collect(),
        }
    }

    fn owner(&self, el: ElementRef) -> Option<NodeId> {
        el.ancestors().map(|a| a.id()).find(|id| self.ids.contains(id))
    }

    fn owned<'a>(
        &'a self,
        el: ElementRef<'a>,
        chain: &'a [Selector],
    ) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        chain
            .iter()
            .flat_map(move |sel| el.select(sel))
            .filter(move |m| self.owner(*m) == Some(el.id()))
    }

    fn first_text(&self, el: ElementRef, chain: &[Selector]) -> Option<String> {
        self.owned(el, chain)
            .map(element_text)
            .find(|t| !t.is_empty())
    }

    fn timestamp_of(&self, el: ElementRef, chain: &[Selector]) -> Option<String> {
        self.owned(el, chain).find_map(|t| {
            t.value()
                .attr("datetime")
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .or_else(|| Some(element_text(t)).filter(|s| !s.is_empty()))
        })
    }

    fn score_of(&self, el: ElementRef, chain: &[Selector]) -> Option<String> {
        self.owned(el, chain).find_map(|s| {
            s.value()
                .attr("aria-label")
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .or_else(|| Some(element_text(s)).filter(|t| !t.is_empty()))
        })
    }

    fn text_without_nested(&self, el: ElementRef) -> String {
        let mut raw = String::new();
        collect_text(*el, &|id| id != el.id() && self.ids.contains(&id), &mut raw);
        normalize_text(&raw)
    }
}

fn indent_of(el: ElementRef) -> f64 {
    el.value()
        .attr(INDENT_ATTR)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn inside_page_chrome(el: ElementRef) -> bool {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .any(|e| CHROME_TAGS.contains(&e.value().name()))
}

/// First non-empty text of a chain, most trusted selector first.
fn first_text(scope: ElementRef, chain: &[Selector]) -> Option<String> {
    chain
        .iter()
        .flat_map(|sel| scope.select(sel))
        .map(element_text)
        .find(|t| !t.is_empty())
}

/// Visible text of an element with line and paragraph breaks kept.
pub(crate) fn element_text(el: ElementRef) -> String {
    let mut raw = String::new();
    collect_text(*el, &|_| false, &mut raw);
    normalize_text(&raw)
}

/// Append the text below `node`, skipping subtrees for which `exclude` holds.
fn collect_text(node: NodeRef<Node>, exclude: &dyn Fn(NodeId) -> bool, out: &mut String) {
    match node.value() {
        Node::Text(text) => {
            for c in text.chars() {
                out.push(if c.is_whitespace() { ' ' } else { c });
            }
        }
        Node::Element(e) => {
            if e.name() == "br" {
                out.push('\n');
                return;
            }
            if exclude(node.id()) || e.attr(HIDDEN_ATTR).is_some() || SKIPPED_TAGS.contains(&e.name()) {
                return;
            }
            for child in node.children() {
                collect_text(child, exclude, out);
            }
            if BLOCK_TAGS.contains(&e.name()) {
                out.push_str("\n\n");
            }
        }
        _ => {
            for child in node.children() {
                collect_text(child, exclude, out);
            }
        }
    }
}

/// Collapse spaces within lines and runs of blank lines to one paragraph break.
fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_blank = false;

    for line in raw.split('\n') {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push_str(if pending_blank { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        pending_blank = false;
    }

    out
}
