//! Headless Chrome transport for pages that only render client-side.
//!
//! `headless_chrome` is a blocking API, so every browser interaction runs on
//! tokio's blocking pool. The browser process is launched lazily on the first
//! render and lives until [`BrowserTransport::close_browser`]. Launches are
//! serialized, and a launch that finishes after the transport was closed is
//! shut down again instead of being stored. Each render opens its own tab,
//! sized to the configured viewport, which is closed again on every exit path
//! by [`PageGuard`].
//!
//! Chrome's DevTools protocol has no direct "network idle" wait here, so
//! settling is `wait_until_navigated` followed by the fixed settle delay.
//!
//! Scrapers depend on the [`PageRenderer`] trait rather than on this type so
//! their parsing can be exercised against fixture HTML.

use super::SessionPhase;
use crate::config::ScraperConfig;
use crate::error::{NewsError, Result};
use async_trait::async_trait;
use headless_chrome::types::Bounds;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// How long an idle browser connection is kept before headless_chrome drops it.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Produces the settled HTML of a page.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Navigate to `url`, wait for the page to settle and return its DOM as HTML.
    async fn render(&self, url: &str) -> Result<String>;

    /// Acquire the underlying resources now, or again after [`close`](Self::close).
    async fn open(&self) -> Result<()>;

    /// Release the underlying resources. Later renders fail until re-opened.
    async fn close(&self);
}

enum BrowserState<B = Browser> {
    Uninitialized,
    Active(B),
    Closed,
}

/// A launched browser that was not stored and has to be shut down.
#[derive(Debug, PartialEq)]
struct Rejected<B> {
    spare: B,
    /// The browser renders should use instead, if one is active.
    current: Option<B>,
}

impl<B: Clone> BrowserState<B> {
    fn phase(&self) -> SessionPhase {
        match self {
            BrowserState::Uninitialized => SessionPhase::Uninitialized,
            BrowserState::Active(_) => SessionPhase::Active,
            BrowserState::Closed => SessionPhase::Closed,
        }
    }

    /// `None` while nothing has been launched yet.
    fn current(&self) -> Option<Result<B>> {
        match self {
            BrowserState::Uninitialized => None,
            BrowserState::Active(browser) => Some(Ok(browser.clone())),
            BrowserState::Closed => Some(Err(NewsError::SessionClosed("browser".to_string()))),
        }
    }

    /// Store a freshly launched browser. An active browser is never replaced,
    /// and a closed state only accepts one when `reopen` is set.
    fn install(&mut self, browser: B, reopen: bool) -> std::result::Result<B, Rejected<B>> {
        match self {
            BrowserState::Active(current) => Err(Rejected {
                spare: browser,
                current: Some(current.clone()),
            }),
            BrowserState::Closed if !reopen => Err(Rejected {
                spare: browser,
                current: None,
            }),
            _ => {
                *self = BrowserState::Active(browser.clone());
                Ok(browser)
            }
        }
    }
}

pub struct BrowserTransport {
    headless: bool,
    chrome_path: Option<PathBuf>,
    viewport: (u32, u32),
    user_agent: String,
    navigation_timeout: Duration,
    settle_delay: Duration,
    state: Mutex<BrowserState>,
    launch_lock: tokio::sync::Mutex<()>,
}

impl BrowserTransport {
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            headless: config.browser.headless,
            chrome_path: config.browser.chrome_path.as_ref().map(PathBuf::from),
            viewport: config.browser.viewport,
            user_agent: config.user_agent.clone(),
            navigation_timeout: config.navigation_timeout(),
            settle_delay: config.browser.settle_delay,
            state: Mutex::new(BrowserState::Uninitialized),
            launch_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock_state().phase()
    }

    /// Launch the browser now. A no-op while active; this is the only way
    /// back from a closed transport.
    pub async fn init_browser(&self) -> Result<()> {
        let _launching = self.launch_lock.lock().await;
        if self.phase() == SessionPhase::Active {
            return Ok(());
        }
        let browser = self.launch().await?;
        self.install(browser, true).await.map(drop)
    }

    /// Run `f` against a fresh tab configured with the viewport, user agent and
    /// navigation timeout. The tab is closed afterwards whatever `f` returns.
    pub async fn with_page<T, F>(&self, url: &str, f: F) -> Result<T>
    where
        F: FnOnce(&Tab) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let browser = self.browser().await?;
        let user_agent = self.user_agent.clone();
        let bounds = viewport_bounds(self.viewport);
        let timeout = self.navigation_timeout;

        let outcome = tokio::task::spawn_blocking(move || -> anyhow::Result<T> {
            let page = PageGuard(browser.new_tab()?);
            page.0.set_bounds(bounds)?;
            page.0.set_user_agent(&user_agent, None, None)?;
            page.0.set_default_timeout(timeout);
            f(&page.0)
        })
        .await
        .map_err(|e| NewsError::Scraping(format!("browser task failed for {url}: {e}")))?;

        outcome.map_err(|e| classify_browser_error(url, timeout, &e))
    }

    /// Close the browser process. Idempotent.
    pub async fn close_browser(&self) {
        let previous = std::mem::replace(&mut *self.lock_state(), BrowserState::Closed);
        if let BrowserState::Active(browser) = previous {
            shut_down(browser).await;
            info!("browser closed");
        }
    }

    /// The active browser, launching it on first use.
    async fn browser(&self) -> Result<Browser> {
        let current = self.lock_state().current();
        if let Some(current) = current {
            return current;
        }

        let _launching = self.launch_lock.lock().await;
        // Another task may have launched or closed while this one waited.
        let current = self.lock_state().current();
        if let Some(current) = current {
            return current;
        }
        let browser = self.launch().await?;
        self.install(browser, false).await
    }

    async fn install(&self, browser: Browser, reopen: bool) -> Result<Browser> {
        let outcome = self.lock_state().install(browser, reopen);
        match outcome {
            Ok(browser) => Ok(browser),
            Err(Rejected { spare, current }) => {
                warn!(closed = current.is_none(), "discarding freshly launched browser");
                shut_down(spare).await;
                current.ok_or_else(|| NewsError::SessionClosed("browser".to_string()))
            }
        }
    }

    #[instrument(level = "info", skip(self), fields(headless = self.headless))]
    async fn launch(&self) -> Result<Browser> {
        let options = LaunchOptions::default_builder()
            .headless(self.headless)
            .sandbox(false)
            .window_size(Some(self.viewport))
            .path(self.chrome_path.clone())
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .build()
            .map_err(|e| NewsError::Scraping(format!("invalid browser options: {e}")))?;

        let t0 = Instant::now();
        let browser = tokio::task::spawn_blocking(move || Browser::new(options))
            .await
            .map_err(|e| NewsError::Scraping(format!("browser launch task failed: {e}")))?
            .map_err(|e| NewsError::Scraping(format!("failed to launch browser: {e}")))?;

        info!(elapsed_ms = t0.elapsed().as_millis() as u64, "browser launched");
        Ok(browser)
    }

    fn lock_state(&self) -> MutexGuard<'_, BrowserState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PageRenderer for BrowserTransport {
    #[instrument(level = "debug", skip(self))]
    async fn render(&self, url: &str) -> Result<String> {
        let target = url.to_string();
        let settle = self.settle_delay;
        let t0 = Instant::now();

        let html = self
            .with_page(url, move |tab| navigate_and_settle(tab, &target, settle))
            .await?;

        debug!(
            bytes = html.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "page rendered"
        );
        Ok(html)
    }

    async fn open(&self) -> Result<()> {
        self.init_browser().await
    }

    async fn close(&self) {
        self.close_browser().await;
    }
}

/// Dropping the last handle kills the Chrome process, which blocks.
async fn shut_down(browser: Browser) {
    if let Err(e) = tokio::task::spawn_blocking(move || drop(browser)).await {
        warn!(error = %e, "browser shutdown task failed");
    }
}

/// Window bounds giving a tab the configured viewport.
fn viewport_bounds((width, height): (u32, u32)) -> Bounds {
    Bounds::Normal {
        left: Some(0),
        top: Some(0),
        width: Some(f64::from(width)),
        height: Some(f64::from(height)),
    }
}

/// Load `url`, wait for navigation to finish plus `settle` for client-side
/// rendering, and return the resulting DOM.
pub fn navigate_and_settle(tab: &Tab, url: &str, settle: Duration) -> anyhow::Result<String> {
    tab.navigate_to(url)?.wait_until_navigated()?;
    std::thread::sleep(settle);
    tab.get_content()
}

/// Navigation failures that mention a timeout are [`NewsError::Timeout`];
/// everything else is [`NewsError::Scraping`].
pub fn classify_browser_error(url: &str, timeout: Duration, err: &anyhow::Error) -> NewsError {
    let message = format!("{err:#}");
    let lowered = message.to_lowercase();
    if lowered.contains("timeout") || lowered.contains("timed out") {
        NewsError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else {
        NewsError::Scraping(format!("{url}: {message}"))
    }
}

struct PageGuard(Arc<Tab>);

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.close(false) {
            debug!(error = %e, "failed to close tab");
        }
    }
}
