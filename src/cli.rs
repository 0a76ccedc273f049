//! Command-line interface definitions for the game news server.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every tuning option can also be provided through an environment variable,
//! which is how MCP clients usually configure stdio servers.

use crate::config::{BrowserConfig, DEFAULT_USER_AGENT, RetryPolicy, ScraperConfig};
use clap::{Parser, Subcommand};
use std::time::Duration;

/// Command-line arguments for the game news server.
///
/// # Examples
///
/// ```sh
/// # Serve the six news tools over stdio (default)
/// game_news_mcp
///
/// # One-off call, printing the same text a tool call would return
/// game_news_mcp call get_game_announcements --game epic_seven --limit 5
/// game_news_mcp call get_announcement_detail --game lordnine \
///     --url https://page.onstove.com/l9/global/view/1234567
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Per-request timeout for API calls, in seconds
    #[arg(long, env = "GAME_NEWS_REQUEST_TIMEOUT", default_value_t = 30)]
    pub request_timeout: u64,

    /// Browser navigation deadline as a multiple of the request timeout
    #[arg(long, env = "GAME_NEWS_BROWSER_TIMEOUT_MULTIPLIER", default_value_t = 2)]
    pub browser_timeout_multiplier: u32,

    /// Extra wait after page load before reading the DOM, in milliseconds
    #[arg(long, env = "GAME_NEWS_SETTLE_DELAY_MS", default_value_t = 2000)]
    pub settle_delay_ms: u64,

    /// Retries for network failures and timeouts (API errors are never retried)
    #[arg(long, env = "GAME_NEWS_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: usize,

    /// First backoff delay in milliseconds; doubles on each retry
    #[arg(long, env = "GAME_NEWS_RETRY_BASE_DELAY_MS", default_value_t = 1000)]
    pub retry_base_delay_ms: u64,

    /// Upper bound for a single backoff delay, in milliseconds
    #[arg(long, env = "GAME_NEWS_RETRY_MAX_DELAY_MS", default_value_t = 30_000)]
    pub retry_max_delay_ms: u64,

    /// Random jitter added to each backoff delay, in milliseconds
    #[arg(long, env = "GAME_NEWS_RETRY_JITTER_MS", default_value_t = 0)]
    pub retry_jitter_ms: u64,

    /// User-Agent sent to upstream APIs and pages
    #[arg(long, env = "GAME_NEWS_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Path to the Chrome/Chromium binary (auto-detected when omitted)
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<String>,

    /// Show the browser window instead of running headless
    #[arg(long, env = "GAME_NEWS_HEADFUL", default_value_t = false)]
    pub headful: bool,

    /// Open every scraper at startup, launching Chrome before the first
    /// Lost Ark request instead of on it
    #[arg(long, env = "GAME_NEWS_WARM_UP", default_value_t = false)]
    pub warm_up: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Serve the news tools over MCP stdio
    Serve,
    /// Run one tool call and print its text response
    Call {
        /// Tool name, e.g. get_game_announcements
        tool: String,
        /// Game key: lordnine, epic_seven or lost_ark
        #[arg(long)]
        game: String,
        /// Article URL for detail tools
        #[arg(long)]
        url: Option<String>,
        /// Maximum items for list tools (1-50)
        #[arg(long)]
        limit: Option<i64>,
    },
}

impl Cli {
    /// Settings handed to every scraper.
    pub fn scraper_config(&self) -> ScraperConfig {
        ScraperConfig {
            request_timeout: Duration::from_secs(self.request_timeout),
            user_agent: self.user_agent.clone(),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                base_delay: Duration::from_millis(self.retry_base_delay_ms),
                max_delay: Duration::from_millis(self.retry_max_delay_ms),
                jitter: Duration::from_millis(self.retry_jitter_ms),
            },
            browser: BrowserConfig {
                headless: !self.headful,
                chrome_path: self.chrome_path.clone(),
                timeout_multiplier: self.browser_timeout_multiplier,
                settle_delay: Duration::from_millis(self.settle_delay_ms),
                ..BrowserConfig::default()
            },
        }
    }
}
