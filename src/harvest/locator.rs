//! Discovery of every sub-page that makes up a thread.
//!
//! Tier 1 reads pagination evidence from the start document. Tier 2 walks
//! synthesized locations one by one and stops at the first page that is
//! missing, empty or a repeat of its predecessor.

use scraper::{ElementRef, Selector};
use tracing::{debug, info};
use url::Url;

use super::extractor::{element_text, RecordExtractor};
use crate::document::{DocumentSnapshot, ThreadDocument, HIDDEN_ATTR};
use crate::models::SubPageLocation;
use crate::patterns::PatternSet;

const LINK_LIKE: &str = "a[href], button, [role='link'], [role='button']";
const PAGINATION_LANDMARK: &str =
    "nav, [role='navigation'], [class*='pagination'], [class*='Pagination'], [data-test*='pagination']";

/// How the page set was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryTier {
    /// No evidence of more than one page.
    Single,
    /// Pagination controls in the start document.
    Structural,
    /// Sequential probing of synthesized locations.
    Probed,
}

impl std::fmt::Display for DiscoveryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single page"),
            Self::Structural => write!(f, "pagination links"),
            Self::Probed => write!(f, "probing"),
        }
    }
}

/// Ordered sub-pages, ordinals strictly increasing from 1.
#[derive(Debug, Clone)]
pub struct LocatedPages {
    pub pages: Vec<SubPageLocation>,
    pub tier: DiscoveryTier,
}

/// Location of sub-page `ordinal` derived from `base`. Ordinal 1 is the base
/// without the page parameter; the fragment is always dropped.
pub fn page_location(base: &Url, param: &str, ordinal: u32) -> Url {
    let retained: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| key != param)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = base.clone();
    url.set_fragment(None);
    url.set_query(None);
    if !retained.is_empty() || ordinal > 1 {
        let mut pairs = url.query_pairs_mut();
        pairs.extend_pairs(retained);
        if ordinal > 1 {
            pairs.append_pair(param, &ordinal.to_string());
        }
    }
    url
}

/// Ordinal a location actually shows. A missing or unreadable parameter
/// means the first page.
pub fn resolved_ordinal(location: &Url, param: &str) -> u32 {
    location
        .query_pairs()
        .find(|(key, _)| key == param)
        .and_then(|(_, value)| value.trim().parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1)
}

pub struct PageSetLocator<'a> {
    patterns: &'a PatternSet,
    extractor: &'a RecordExtractor,
    max_ordinal: u32,
    max_probe_pages: u32,
    signature_body_chars: usize,
    link_like: Selector,
    landmark: Selector,
}

impl<'a> PageSetLocator<'a> {
    pub fn new(
        patterns: &'a PatternSet,
        extractor: &'a RecordExtractor,
        max_ordinal: u32,
        max_probe_pages: u32,
        signature_body_chars: usize,
    ) -> Self {
        Self {
            patterns,
            extractor,
            max_ordinal: max_ordinal.max(1),
            max_probe_pages,
            signature_body_chars,
            link_like: selector(LINK_LIKE),
            landmark: selector(PAGINATION_LANDMARK),
        }
    }

    /// Find all sub-pages of the thread shown by `start`.
    ///
    /// Only probing navigates; the document is left on whatever page was
    /// probed last.
    pub async fn locate<D: ThreadDocument>(
        &self,
        doc: &mut D,
        start: &DocumentSnapshot,
    ) -> LocatedPages {
        let param = self.patterns.page_param();
        let base = &start.location;

        if let Some(max) = self.scan(start).filter(|max| *max > 1) {
            info!("Pagination links point to {} pages", max);
            return LocatedPages {
                pages: (1..=max)
                    .map(|n| SubPageLocation::new(n, page_location(base, param, n)))
                    .collect(),
                tier: DiscoveryTier::Structural,
            };
        }

        let pages = self.probe(doc, start).await;
        let tier = if pages.len() > 1 {
            DiscoveryTier::Probed
        } else {
            DiscoveryTier::Single
        };
        LocatedPages { pages, tier }
    }

    /// Tier 1: highest page ordinal named by a visible link or control.
    pub fn scan(&self, snapshot: &DocumentSnapshot) -> Option<u32> {
        let html = snapshot.parse();
        let param = self.patterns.page_param();
        let base = &snapshot.location;

        let mut highest: Option<u32> = None;
        for el in html.select(&self.link_like) {
            if is_hidden(el) {
                continue;
            }

            let from_href = el
                .value()
                .attr("href")
                .and_then(|href| base.join(href.trim()).ok())
                .filter(|target| same_thread(base, target))
                .filter(|target| target.query_pairs().any(|(key, _)| key == param))
                .map(|target| resolved_ordinal(&target, param));

            let aria_label = el.value().attr("aria-label").map(str::to_string);
            let from_label = [Some(element_text(el)), aria_label]
                .into_iter()
                .flatten()
                .filter(|label| !is_bare_number(label) || self.in_pagination(el))
                .filter_map(|label| self.patterns.page_ordinal_in_label(&label))
                .max();

            for ordinal in from_href.into_iter().chain(from_label) {
                debug!("Pagination evidence: page {}", ordinal);
                highest = Some(highest.map_or(ordinal, |h| h.max(ordinal)));
            }
        }

        highest.map(|h| h.min(self.max_ordinal))
    }

    /// Tier 2: walk ordinals from 2 until a page is missing or repeats.
    async fn probe<D: ThreadDocument>(&self, doc: &mut D, start: &DocumentSnapshot) -> Vec<SubPageLocation> {
        let param = self.patterns.page_param();
        let base = &start.location;
        let mut pages = vec![SubPageLocation::new(1, page_location(base, param, 1))];
        let mut previous = self.signature(start);

        for ordinal in 2..=self.max_probe_pages {
            let target = page_location(base, param, ordinal);
            if let Err(e) = doc.navigate(&target).await {
                debug!("Probe of page {} ended: {}", ordinal, e);
                break;
            }

            match doc.current_location().await {
                Ok(location) if resolved_ordinal(&location, param) == ordinal => {}
                Ok(location) => {
                    debug!("Page {} redirected to {}", ordinal, location);
                    break;
                }
                Err(e) => {
                    debug!("Probe of page {} ended: {}", ordinal, e);
                    break;
                }
            }

            let signature = match doc.snapshot().await {
                Ok(snapshot) => self.signature(&snapshot),
                Err(e) => {
                    debug!("Probe of page {} ended: {}", ordinal, e);
                    break;
                }
            };
            if signature.is_empty() {
                debug!("Page {} shows no comments", ordinal);
                break;
            }
            if signature == previous {
                debug!("Page {} repeats page {}", ordinal, ordinal - 1);
                break;
            }

            pages.push(SubPageLocation::new(ordinal, target));
            previous = signature;
        }

        if pages.len() > 1 {
            info!("Probing found {} pages", pages.len());
        }
        pages
    }

    /// Identity of the first comment shown, empty when there is none.
    pub fn signature(&self, snapshot: &DocumentSnapshot) -> String {
        self.extractor
            .extract_comments(snapshot, 0)
            .first()
            .map(|c| c.signature(self.signature_body_chars))
            .unwrap_or_default()
    }

    fn in_pagination(&self, el: ElementRef) -> bool {
        el.ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| self.landmark.matches(&a))
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| unreachable!("static selector {css:?}: {e}"))
}

fn is_hidden(el: ElementRef) -> bool {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .any(|e| {
            let value = e.value();
            value.attr(HIDDEN_ATTR).is_some()
                || value
                    .attr("aria-hidden")
                    .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
        })
}

fn same_thread(base: &Url, target: &Url) -> bool {
    base.origin() == target.origin() && base.path() == target.path()
}

fn is_bare_number(label: &str) -> bool {
    let trimmed = label.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionConfig;
    use crate::harvest::testing::{comment_page, FakeThread, Overflow};

    const BASE: &str = "https://deals.example/diskussion/t-42";

    fn fixtures() -> (PatternSet, RecordExtractor) {
        (
            PatternSet::default(),
            RecordExtractor::new(&ExtractionConfig::default()).unwrap(),
        )
    }

    fn start(html: &str) -> DocumentSnapshot {
        DocumentSnapshot::new(Url::parse(BASE).unwrap(), html)
    }

    fn ordinals(located: &LocatedPages) -> Vec<u32> {
        located.pages.iter().map(|p| p.ordinal).collect()
    }

    #[test]
    fn test_page_location_rewrites_parameter() {
        let base = Url::parse("https://deals.example/t-42?sort=new&page=3#comments").unwrap();
        assert_eq!(
            page_location(&base, "page", 1).as_str(),
            "https://deals.example/t-42?sort=new"
        );
        assert_eq!(
            page_location(&base, "page", 5).as_str(),
            "https://deals.example/t-42?sort=new&page=5"
        );

        let bare = Url::parse("https://deals.example/t-42?page=2").unwrap();
        assert_eq!(page_location(&bare, "page", 1).as_str(), "https://deals.example/t-42");
    }

    #[test]
    fn test_resolved_ordinal() {
        let url = |s: &str| Url::parse(s).unwrap();
        assert_eq!(resolved_ordinal(&url("https://x.example/t?page=4"), "page"), 4);
        assert_eq!(resolved_ordinal(&url("https://x.example/t"), "page"), 1);
        assert_eq!(resolved_ordinal(&url("https://x.example/t?page=abc"), "page"), 1);
        assert_eq!(resolved_ordinal(&url("https://x.example/t?page=0"), "page"), 1);
    }

    #[tokio::test]
    async fn test_structural_scan_orders_discovered_ordinals() {
        let (patterns, extractor) = fixtures();
        let locator = PageSetLocator::new(&patterns, &extractor, 50, 50, 80);
        let html = r#"<html><body>
            <nav class="pagination">
              <a href="?page=1">1</a>
              <a href="?page=3">3</a>
              <a href="?page=2">2</a>
            </nav>
        </body></html>"#;
        let mut doc = FakeThread::new(BASE, vec![html.to_string()]);

        let located = locator.locate(&mut doc, &start(html)).await;
        assert_eq!(located.tier, DiscoveryTier::Structural);
        assert_eq!(ordinals(&located), vec![1, 2, 3]);
        assert_eq!(located.pages[0].url.as_str(), BASE);
        assert_eq!(located.pages[2].url.as_str(), format!("{BASE}?page=3"));
        assert!(doc.navigations.is_empty(), "structural discovery must not navigate");
    }

    #[test]
    fn test_scan_reads_labels_and_ignores_hidden_controls() {
        let (patterns, extractor) = fixtures();
        let locator = PageSetLocator::new(&patterns, &extractor, 50, 50, 80);

        let html = r#"<html><body>
            <button aria-label="Seite 4 von 4">»</button>
            <a href="?page=9" data-harvest-hidden="1">9</a>
            <div aria-hidden="true"><a href="?page=12">12</a></div>
            <button>17</button>
            <a href="/other-thread?page=30">30</a>
        </body></html>"#;
        assert_eq!(locator.scan(&start(html)), Some(4));
    }

    #[test]
    fn test_scan_reads_page_total_from_label() {
        let (patterns, extractor) = fixtures();
        let locator = PageSetLocator::new(&patterns, &extractor, 50, 50, 80);
        let html = r#"<html><body>
            <nav class="pagination">
              <button aria-label="Seite 1 von 7">1 / 7</button>
              <a href="?page=2" rel="next">Weiter</a>
            </nav>
        </body></html>"#;
        assert_eq!(locator.scan(&start(html)), Some(7));
    }

    #[test]
    fn test_scan_clamps_to_ceiling() {
        let (patterns, extractor) = fixtures();
        let locator = PageSetLocator::new(&patterns, &extractor, 50, 50, 80);
        let html = r#"<html><body><nav><a href="?page=400">400</a></nav></body></html>"#;
        assert_eq!(locator.scan(&start(html)), Some(50));
    }

    #[tokio::test]
    async fn test_single_page_without_evidence() {
        let (patterns, extractor) = fixtures();
        let locator = PageSetLocator::new(&patterns, &extractor, 50, 50, 80);
        let html = "<html><body><h1>Deal</h1></body></html>";
        let mut doc = FakeThread::new(BASE, vec![html.to_string()]);

        let located = locator.locate(&mut doc, &start(html)).await;
        assert_eq!(located.tier, DiscoveryTier::Single);
        assert_eq!(ordinals(&located), vec![1]);
        assert_eq!(located.pages[0].url.as_str(), BASE);
    }

    #[tokio::test]
    async fn test_probe_stops_on_repeated_signature() {
        let (patterns, extractor) = fixtures();
        let locator = PageSetLocator::new(&patterns, &extractor, 50, 50, 80);
        let pages = vec![
            comment_page(&[("Max", "First page opener")]),
            comment_page(&[("Erika", "Second page opener")]),
            comment_page(&[("Moritz", "Third page opener")]),
        ];
        let first = pages[0].clone();
        let mut doc = FakeThread::new(BASE, pages).overflow(Overflow::RepeatLast);

        let located = locator.locate(&mut doc, &start(&first)).await;
        assert_eq!(located.tier, DiscoveryTier::Probed);
        assert_eq!(ordinals(&located), vec![1, 2, 3]);
        assert_eq!(doc.navigations.len(), 3);
    }

    #[tokio::test]
    async fn test_probe_stops_on_redirect() {
        let (patterns, extractor) = fixtures();
        let locator = PageSetLocator::new(&patterns, &extractor, 50, 50, 80);
        let pages = vec![
            comment_page(&[("Max", "First page opener")]),
            comment_page(&[("Erika", "Second page opener")]),
        ];
        let first = pages[0].clone();
        let mut doc = FakeThread::new(BASE, pages).overflow(Overflow::Redirect);

        let located = locator.locate(&mut doc, &start(&first)).await;
        assert_eq!(ordinals(&located), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_probe_stops_on_page_without_comments() {
        let (patterns, extractor) = fixtures();
        let locator = PageSetLocator::new(&patterns, &extractor, 50, 50, 80);
        let pages = vec![
            comment_page(&[("Max", "First page opener")]),
            comment_page(&[("Erika", "Second page opener")]),
        ];
        let first = pages[0].clone();
        let mut doc = FakeThread::new(BASE, pages).overflow(Overflow::Empty);

        let located = locator.locate(&mut doc, &start(&first)).await;
        assert_eq!(located.tier, DiscoveryTier::Probed);
        assert_eq!(ordinals(&located), vec![1, 2]);
        let last = doc.navigations.last().unwrap();
        assert_eq!(resolved_ordinal(last, "page"), 3, "page 3 was visited and found empty");
        assert_eq!(doc.navigations.len(), 2);
    }

    #[tokio::test]
    async fn test_probe_treats_navigation_failure_as_end() {
        let (patterns, extractor) = fixtures();
        let locator = PageSetLocator::new(&patterns, &extractor, 50, 50, 80);
        let pages = vec![
            comment_page(&[("Max", "First page opener")]),
            comment_page(&[("Erika", "Second page opener")]),
        ];
        let first = pages[0].clone();
        let mut doc = FakeThread::new(BASE, pages).fail_navigation_from(2);

        let located = locator.locate(&mut doc, &start(&first)).await;
        assert_eq!(located.tier, DiscoveryTier::Single);
        assert_eq!(ordinals(&located), vec![1]);
    }

    #[tokio::test]
    async fn test_probe_respects_cap() {
        let (patterns, extractor) = fixtures();
        let locator = PageSetLocator::new(&patterns, &extractor, 50, 3, 80);
        let pages: Vec<String> = (1..=6)
            .map(|i| comment_page(&[("Max", &format!("Opener of page {i}"))]))
            .collect();
        let first = pages[0].clone();
        let mut doc = FakeThread::new(BASE, pages);

        let located = locator.locate(&mut doc, &start(&first)).await;
        assert_eq!(ordinals(&located), vec![1, 2, 3]);
    }
}
