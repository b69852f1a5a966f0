use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use pagewatch_core::error::AppError;
use pagewatch_core::traits::Fetcher;
use rand::Rng;

use crate::cookies::CookieStore;

const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Headless-browser fetcher using Chromium via the Chrome DevTools Protocol.
///
/// Facebook timelines are rendered client-side and lazy-load on scroll, so a
/// plain HTTP GET sees almost nothing. This fetcher navigates, waits for the
/// body, scrolls a configurable number of times with randomized pauses, and
/// returns the rendered DOM.
///
/// A single Chromium process is shared across all clones of this struct;
/// each [`Fetcher::fetch`] call opens a new tab and closes it when done.
/// With a [`CookieStore`] attached, saved session cookies are installed
/// before navigation and written back after each fetch.
#[derive(Clone)]
pub struct BrowserFetcher {
    browser: Arc<Browser>,
    timeout: Duration,
    scrolls: usize,
    cookies: Option<CookieStore>,
}

impl BrowserFetcher {
    /// Launches a headless Chromium with a 120 s fetch timeout and 5 scroll
    /// passes.
    pub async fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(120)).await
    }

    pub async fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let mut builder = BrowserConfig::builder();
        builder = builder.no_sandbox().disable_default_args();

        // Snap-packaged Chromium exposes a wrapper that rejects standard
        // Chrome CLI flags. Try to locate the real binary first, falling
        // back to chromiumoxide's own lookup.
        if let Some(bin) = Self::find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .window_size(1920, 1080)
            .build()
            .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        Ok(Self {
            browser: Arc::new(browser),
            timeout,
            scrolls: 5,
            cookies: None,
        })
    }

    /// Number of scroll-to-bottom passes before the DOM is captured.
    pub fn scrolls(mut self, scrolls: usize) -> Self {
        self.scrolls = scrolls;
        self
    }

    /// Attach a cookie store for session persistence across runs.
    pub fn cookie_store(mut self, store: CookieStore) -> Self {
        self.cookies = Some(store);
        self
    }

    /// Tries to locate the real Chrome/Chromium binary.
    ///
    /// `CHROME_BIN` wins if set; otherwise check snap internals, flatpak,
    /// and common system paths. `None` lets chromiumoxide do its own lookup.
    fn find_chrome_binary() -> Option<PathBuf> {
        if let Ok(p) = std::env::var("CHROME_BIN") {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
        }

        let candidates: &[&str] = &[
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ];
        candidates.iter().map(PathBuf::from).find(|p| p.exists())
    }

    async fn fetch_rendered(&self, url: &str) -> Result<String, AppError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to open tab: {e}")))?;

        let _ = page.set_user_agent(DESKTOP_UA).await;

        // Install saved session cookies before navigating. A corrupt blob is
        // logged and skipped; the crawl proceeds logged-out.
        if let Some(store) = &self.cookies
            && let Some(blob) = store.load()?
        {
            match serde_json::from_str::<Vec<CookieParam>>(&blob) {
                Ok(params) if !params.is_empty() => {
                    if let Err(e) = page.set_cookies(params).await {
                        tracing::warn!(error = %e, "Failed to install session cookies");
                    } else {
                        tracing::info!(path = %store.path().display(), "Loaded session cookies");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring unreadable cookie file");
                }
            }
        }

        page.goto(url)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to navigate to {url}: {e}")))?;

        page.find_element("body")
            .await
            .map_err(|e| AppError::BrowserError(format!("Page did not render body: {e}")))?;

        self.scroll_timeline(&page).await;

        let html = page
            .content()
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to read page content: {e}")))?;

        if let Some(store) = &self.cookies {
            match page.get_cookies().await {
                Ok(cookies) => {
                    let blob = serde_json::to_string(&cookies)?;
                    if let Err(e) = store.save(&blob) {
                        tracing::warn!(error = %e, "Failed to persist session cookies");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Failed to read session cookies"),
            }
        }

        let _ = page.close().await;
        Ok(html)
    }

    /// Scroll to the bottom repeatedly so the timeline lazy-loads, pausing a
    /// randomized interval between passes and occasionally scrolling back up
    /// the way a reader would.
    async fn scroll_timeline(&self, page: &chromiumoxide::Page) {
        for i in 0..self.scrolls {
            if let Err(e) = page
                .evaluate("window.scrollTo(0, document.body.scrollHeight)")
                .await
            {
                tracing::warn!(error = %e, "Scroll evaluation failed");
                break;
            }
            let pause = Duration::from_millis(rand::rng().random_range(2_000..=4_000));
            tokio::time::sleep(pause).await;

            if i % 3 == 0 {
                let _ = page.evaluate("window.scrollBy(0, -300)").await;
                let pause = Duration::from_millis(rand::rng().random_range(1_000..=2_000));
                tokio::time::sleep(pause).await;
            }
        }
    }
}

impl Fetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        match tokio::time::timeout(self.timeout, self.fetch_rendered(url)).await {
            Ok(inner) => inner,
            Err(_) => Err(AppError::Timeout(self.timeout.as_secs())),
        }
    }
}
