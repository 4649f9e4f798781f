//! JavaScript evaluated inside the tab.

/// Resolves once the document is interactive.
pub const WAIT_FOR_READY: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// Masks the most common automation tells.
pub const STEALTH: &[&str] = &[
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    r#"
    window.chrome = window.chrome || { runtime: {}, app: {} };
    "#,
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['de-DE', 'de', 'en'],
        configurable: true
    });
    "#,
];

/// Clone of the live DOM with layout facts written into data attributes.
///
/// Live and cloned elements are paired by document order. Elements inside
/// `<head>` are never marked hidden, so the document title stays readable.
pub const SNAPSHOT: &str = r#"
    (() => {
        const root = document.documentElement;
        const live = [root, ...root.querySelectorAll('*')];
        const copy = root.cloneNode(true);
        const copies = [copy, ...copy.querySelectorAll('*')];
        const n = Math.min(live.length, copies.length);
        for (let i = 0; i < n; i++) {
            const el = live[i];
            const style = window.getComputedStyle(el);
            const indent = Math.max(parseFloat(style.marginLeft) || 0, parseFloat(style.paddingLeft) || 0);
            if (indent > 0) {
                copies[i].setAttribute('data-harvest-indent', String(Math.round(indent)));
            }
            if (el.closest('head')) continue;
            const rect = el.getBoundingClientRect();
            const hidden = style.display === 'none'
                || style.visibility === 'hidden'
                || parseFloat(style.opacity) === 0
                || (rect.width === 0 && rect.height === 0 && el.tagName !== 'BR');
            if (hidden) {
                copies[i].setAttribute('data-harvest-hidden', '1');
            }
        }
        return { location: window.location.href, html: '<!DOCTYPE html>' + copy.outerHTML };
    })()
"#;

/// Scrolls the viewport vertically and reports the new offset.
pub fn scroll_by(delta_px: i64) -> String {
    format!("window.scrollBy(0, {delta_px}); window.scrollY")
}
