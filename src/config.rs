//! Runtime settings shared by every scraper and transport.
//!
//! [`ScraperConfig`] is built once from the CLI (see [`crate::cli::Cli`]) and
//! handed to each scraper constructor. Defaults mirror the CLI defaults so
//! tests can use `ScraperConfig::default()` directly.

use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Exponential backoff schedule for retryable transport failures.
///
/// The wait before retry `n` (0-based) is `base_delay * 2^n`, capped at
/// `max_delay`, plus up to `jitter` of random noise.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: Duration::ZERO,
        }
    }
}

/// Headless browser launch and navigation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserConfig {
    pub headless: bool,
    /// Chrome/Chromium binary; auto-detected when `None`.
    pub chrome_path: Option<String>,
    pub viewport: (u32, u32),
    /// Navigation deadline is the request timeout times this factor.
    pub timeout_multiplier: u32,
    /// Extra wait after the page reports loaded, for client-side rendering.
    pub settle_delay: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            viewport: (1920, 1080),
            timeout_multiplier: 2,
            settle_delay: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScraperConfig {
    pub request_timeout: Duration,
    pub user_agent: String,
    pub retry: RetryPolicy,
    pub browser: BrowserConfig,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryPolicy::default(),
            browser: BrowserConfig::default(),
        }
    }
}

impl ScraperConfig {
    pub fn navigation_timeout(&self) -> Duration {
        self.request_timeout
            .saturating_mul(self.browser.timeout_multiplier.max(1))
    }
}
