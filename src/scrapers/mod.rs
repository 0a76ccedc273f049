//! Per-game news scrapers.
//!
//! Every scraper implements [`NewsScraper`] and produces validated
//! [`NewsRecord`]s. The two STOVE community boards are JSON APIs reached
//! through [`crate::transport::HttpTransport`]; the Lost Ark site only renders
//! in a browser and goes through a [`crate::transport::PageRenderer`].
//!
//! # Supported Sources
//!
//! | Game | Module | Method | Notes |
//! |------|--------|--------|-------|
//! | Lordnine | [`lordnine`] | STOVE board API | Updates synthesized from announcements; no detail endpoint |
//! | Epic Seven | [`epic_seven`] | STOVE board API | Detail endpoint with list fallback; decorated titles |
//! | Lost Ark | [`lost_ark`] | Headless Chrome | CSS selector cascade over rendered pages |
//!
//! # Common Patterns
//!
//! - List fetches skip items that fail to parse (logged at `debug`) and never
//!   fail the whole list for one bad entry. An empty list is not an error.
//! - Detail fetches return `Ok(None)` when the article cannot be found.
//! - Scrapers are built once into a [`ScraperRegistry`] and shared by `Arc`.

pub mod epic_seven;
pub mod lordnine;
pub mod lost_ark;

use crate::config::ScraperConfig;
use crate::error::{NewsError, Result};
use crate::models::{GameKind, NewsCategory, NewsRecord};
use crate::transport::validate_shape;
use async_trait::async_trait;
use futures::future::{join_all, try_join_all};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub use epic_seven::EpicSevenScraper;
pub use lordnine::LordnineScraper;
pub use lost_ark::LostArkScraper;

/// Capability contract shared by every game source.
///
/// Implementors provide [`fetch_list`](NewsScraper::fetch_list) and
/// [`fetch_detail`](NewsScraper::fetch_detail); the six per-category
/// operations are derived from them.
#[async_trait]
pub trait NewsScraper: Send + Sync {
    fn game(&self) -> GameKind;

    /// One page of records for `category`, in upstream order.
    async fn fetch_list(&self, category: NewsCategory) -> Result<Vec<NewsRecord>>;

    /// The record behind `url`, or `None` when it cannot be found.
    async fn fetch_detail(&self, url: &str, category: NewsCategory) -> Result<Option<NewsRecord>>;

    /// Bring the scraper's transport up now. Also the way back after
    /// [`close`](NewsScraper::close); otherwise transports start on first use.
    async fn open(&self) -> Result<()>;

    /// Tear down the scraper's transport.
    async fn close(&self);

    async fn list_announcements(&self) -> Result<Vec<NewsRecord>> {
        self.fetch_list(NewsCategory::Announcement).await
    }

    async fn detail_announcement(&self, url: &str) -> Result<Option<NewsRecord>> {
        self.fetch_detail(url, NewsCategory::Announcement).await
    }

    async fn list_events(&self) -> Result<Vec<NewsRecord>> {
        self.fetch_list(NewsCategory::Event).await
    }

    async fn detail_event(&self, url: &str) -> Result<Option<NewsRecord>> {
        self.fetch_detail(url, NewsCategory::Event).await
    }

    async fn list_updates(&self) -> Result<Vec<NewsRecord>> {
        self.fetch_list(NewsCategory::Update).await
    }

    async fn detail_update(&self, url: &str) -> Result<Option<NewsRecord>> {
        self.fetch_detail(url, NewsCategory::Update).await
    }
}

/// Scrapers keyed by game, constructed once at startup.
#[derive(Default)]
pub struct ScraperRegistry {
    scrapers: HashMap<GameKind, Arc<dyn NewsScraper>>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All three production scrapers sharing one configuration.
    pub fn from_config(config: &ScraperConfig) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(LordnineScraper::new(config)?));
        registry.register(Arc::new(EpicSevenScraper::new(config)?));
        registry.register(Arc::new(LostArkScraper::new(config)));
        Ok(registry)
    }

    /// Add or replace the scraper for its game.
    pub fn register(&mut self, scraper: Arc<dyn NewsScraper>) {
        self.scrapers.insert(scraper.game(), scraper);
    }

    /// Look up a scraper by its tool-argument key (`lordnine`, `epic_seven`, `lost_ark`).
    ///
    /// # Errors
    ///
    /// [`NewsError::UnsupportedGame`] for unknown keys and for known games
    /// without a registered scraper.
    pub fn get(&self, key: &str) -> Result<Arc<dyn NewsScraper>> {
        let game: GameKind = key.parse()?;
        self.scrapers
            .get(&game)
            .cloned()
            .ok_or_else(|| NewsError::UnsupportedGame(key.to_string()))
    }

    pub fn games(&self) -> Vec<GameKind> {
        let mut games: Vec<GameKind> = self.scrapers.keys().copied().collect();
        games.sort();
        games
    }

    /// Open every scraper concurrently, failing on the first error.
    pub async fn open_all(&self) -> Result<()> {
        try_join_all(self.scrapers.values().map(|scraper| scraper.open())).await?;
        info!(count = self.scrapers.len(), "all scrapers opened");
        Ok(())
    }

    /// Close every scraper concurrently.
    pub async fn close_all(&self) {
        join_all(self.scrapers.values().map(|scraper| scraper.close())).await;
        info!(count = self.scrapers.len(), "all scrapers closed");
    }
}

/// Query parameters shared by every STOVE board list request.
pub(crate) fn stove_list_params(size: &str) -> Vec<(&str, &str)> {
    vec![
        ("interaction_type_code", "LIKE,DISLIKE,COMMENT,VIEW"),
        ("content_yn", "Y"),
        ("summary_yn", "Y"),
        ("sort_type_code", "LATEST"),
        ("headline_title_yn", "Y"),
        ("translation_yn", "N"),
        ("page", "1"),
        ("size", size),
    ]
}

/// The `value.list` array of a STOVE list response.
pub(crate) fn stove_article_list<'a>(payload: &'a Value, endpoint: &str) -> Result<&'a [Value]> {
    if !validate_shape(payload, &["value"]) {
        return Err(NewsError::Api {
            endpoint: endpoint.to_string(),
            status: None,
            message: "response has no 'value' object".to_string(),
        });
    }
    payload["value"]
        .get("list")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| NewsError::Api {
            endpoint: endpoint.to_string(),
            status: None,
            message: "response has no 'value.list' array".to_string(),
        })
}

/// An id field that may arrive as a JSON number or string.
pub(crate) fn json_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

pub(crate) fn json_str<'a>(item: &'a Value, pointer: &str) -> Option<&'a str> {
    item.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// A count that may arrive as a number or numeric string.
pub(crate) fn json_count(item: &Value, pointer: &str) -> Option<i64> {
    match item.pointer(pointer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
