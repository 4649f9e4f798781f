//! Chromium-backed thread documents.
//!
//! Uses chromiumoxide (CDP). A [`BrowserSession`] owns the browser process
//! (or a connection to a remote one) and hands out [`BrowserPage`] tabs that
//! implement [`ThreadDocument`](crate::document::ThreadDocument).

#[cfg(feature = "browser")]
mod page;
#[cfg(feature = "browser")]
mod scripts;

#[cfg(feature = "browser")]
pub use page::BrowserPage;

use crate::config::Config;

/// Selector for every clickable element that can carry a control label.
pub const CONTROL_SELECTOR: &str = "button, a, [role='button']";

/// Control selector restricted to descendants of the most trusted tier of
/// comment containers.
pub fn scoped_control_selector(config: &Config) -> String {
    let containers = config
        .extraction
        .comment_selector_tiers
        .first()
        .cloned()
        .unwrap_or_default();
    if containers.is_empty() {
        return CONTROL_SELECTOR.to_string();
    }

    containers
        .iter()
        .flat_map(|c| {
            [
                format!("{c} button"),
                format!("{c} a"),
                format!("{c} [role='button']"),
            ]
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(feature = "browser")]
mod session {
    use std::path::{Path, PathBuf};

    use anyhow::{Context, Result};
    use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
    use chromiumoxide::{Browser, BrowserConfig};
    use futures::StreamExt;
    use tokio::task::JoinHandle;
    use tracing::{debug, info};

    use super::{scoped_control_selector, BrowserPage};
    use crate::config::{BrowserEngineConfig, Config};
    use crate::patterns::PatternSet;

    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &[&str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    const CHROME_COMMANDS: &[&str] = &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ];

    /// A running (or connected) browser.
    pub struct BrowserSession {
        config: BrowserEngineConfig,
        browser: Browser,
        handler: JoinHandle<()>,
        /// Launched by us, so closed by us.
        owned: bool,
    }

    impl BrowserSession {
        /// Launch a local browser, or connect to `remote_url` when configured.
        pub async fn launch(config: &BrowserEngineConfig) -> Result<Self> {
            if let Some(remote_url) = config.remote_url.as_deref() {
                return Self::connect_remote(config, remote_url).await;
            }

            info!("Launching browser (headless={})", config.headless);
            let chrome_path = find_chrome()?;

            let mut builder = BrowserConfig::builder()
                .chrome_executable(chrome_path)
                .window_size(config.viewport_width, config.viewport_height);
            if !config.headless {
                builder = builder.with_head();
            }
            if let Some(ref proxy) = config.proxy {
                builder = builder.arg(format!("--proxy-server={}", proxy));
            }
            builder = builder
                .arg("--disable-blink-features=AutomationControlled")
                .arg("--disable-infobars")
                .arg("--disable-dev-shm-usage")
                .arg("--no-first-run")
                .arg("--no-default-browser-check")
                .arg("--disable-sync")
                .arg("--no-sandbox")
                .arg("--disable-gpu")
                .arg("--lang=de-DE");
            for arg in &config.chrome_args {
                builder = builder.arg(arg);
            }

            let browser_config = builder
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;
            let (browser, handler) = Browser::launch(browser_config)
                .await
                .context("Failed to launch browser")?;

            Ok(Self {
                config: config.clone(),
                browser,
                handler: spawn_handler(handler),
                owned: true,
            })
        }

        async fn connect_remote(config: &BrowserEngineConfig, url: &str) -> Result<Self> {
            info!("Connecting to remote browser at {}", url);

            let http_url = url
                .replace("ws://", "http://")
                .replace("wss://", "https://");
            let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

            let resp: serde_json::Value = reqwest::Client::new()
                .get(&version_url)
                .send()
                .await
                .context("Failed to connect to remote browser")?
                .json()
                .await
                .context("Failed to parse browser version info")?;
            let ws_url = resp
                .get("webSocketDebuggerUrl")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow::anyhow!("No webSocketDebuggerUrl in response"))?;

            debug!("Connecting to WebSocket: {}", ws_url);
            let (browser, handler) = Browser::connect(ws_url)
                .await
                .context("Failed to connect to remote browser")?;

            Ok(Self {
                config: config.clone(),
                browser,
                handler: spawn_handler(handler),
                owned: false,
            })
        }

        /// Open a blank tab prepared for harvesting.
        pub async fn open_page(&self, config: &Config) -> Result<BrowserPage> {
            let patterns = PatternSet::compile(&config.patterns)?;
            let page = self
                .browser
                .new_page("about:blank")
                .await
                .context("Failed to open browser tab")?;
            page.execute(SetUserAgentOverrideParams::new(self.config.user_agent.clone()))
                .await
                .context("Failed to set user agent")?;

            Ok(BrowserPage::new(
                page,
                self.config.clone(),
                patterns,
                scoped_control_selector(config),
                config.render.capture_quality,
            ))
        }

        /// Close the browser if this session launched it.
        pub async fn close(mut self) -> Result<()> {
            if self.owned {
                self.browser.close().await.context("Failed to close browser")?;
            }
            self.handler.abort();
            Ok(())
        }
    }

    fn spawn_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        })
    }

    fn find_chrome() -> Result<PathBuf> {
        if let Some(path) = CHROME_PATHS.iter().map(Path::new).find(|p| p.exists()) {
            info!("Found Chrome at: {}", path.display());
            return Ok(path.to_path_buf());
        }
        if let Some(path) = CHROME_COMMANDS.iter().find_map(|cmd| which::which(cmd).ok()) {
            info!("Found Chrome in PATH: {}", path.display());
            return Ok(path);
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found. Please install it:\n\
             - Arch/Manjaro: sudo pacman -S chromium\n\
             - Ubuntu/Debian: sudo apt install chromium-browser\n\
             - Fedora: sudo dnf install chromium\n\
             - Or set BROWSER_URL to a running Chrome's DevTools endpoint"
        ))
    }
}

#[cfg(feature = "browser")]
pub use session::BrowserSession;

#[cfg(not(feature = "browser"))]
mod stub {
    use anyhow::Result;
    use async_trait::async_trait;
    use url::Url;

    use crate::config::{BrowserEngineConfig, Config};
    use crate::document::{
        ControlCandidate, ControlScope, DocumentError, DocumentSnapshot, PageCapture,
        ThreadDocument,
    };

    const NOT_COMPILED: &str = "Browser support not compiled. Rebuild with: cargo build --features browser";

    /// Stub when browser feature is disabled.
    pub struct BrowserSession;

    impl BrowserSession {
        pub async fn launch(_config: &BrowserEngineConfig) -> Result<Self> {
            Err(anyhow::anyhow!(NOT_COMPILED))
        }

        pub async fn open_page(&self, _config: &Config) -> Result<BrowserPage> {
            Err(anyhow::anyhow!(NOT_COMPILED))
        }

        pub async fn close(self) -> Result<()> {
            Ok(())
        }
    }

    /// Stub when browser feature is disabled.
    pub struct BrowserPage;

    #[async_trait]
    impl ThreadDocument for BrowserPage {
        type Control = ();

        async fn navigate(&mut self, _location: &Url) -> Result<(), DocumentError> {
            Err(DocumentError::Unsupported(NOT_COMPILED))
        }

        async fn current_location(&self) -> Result<Url, DocumentError> {
            Err(DocumentError::Unsupported(NOT_COMPILED))
        }

        async fn dismiss_overlays(&mut self) -> Result<bool, DocumentError> {
            Err(DocumentError::Unsupported(NOT_COMPILED))
        }

        async fn scroll_by(&mut self, _delta_px: i64) -> Result<(), DocumentError> {
            Err(DocumentError::Unsupported(NOT_COMPILED))
        }

        async fn snapshot(&self) -> Result<DocumentSnapshot, DocumentError> {
            Err(DocumentError::Unsupported(NOT_COMPILED))
        }

        async fn disclosure_controls(
            &self,
            _scope: ControlScope,
        ) -> Result<Vec<ControlCandidate<()>>, DocumentError> {
            Err(DocumentError::Unsupported(NOT_COMPILED))
        }

        async fn trigger(&mut self, _control: &()) -> Result<(), DocumentError> {
            Err(DocumentError::Unsupported(NOT_COMPILED))
        }

        async fn capture(&mut self, _page_ordinal: u32) -> Result<PageCapture, DocumentError> {
            Err(DocumentError::Unsupported(NOT_COMPILED))
        }
    }
}

#[cfg(not(feature = "browser"))]
pub use stub::{BrowserPage, BrowserSession};
