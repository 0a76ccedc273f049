//! Routes tool calls to scrapers and renders the results as text.
//!
//! The dispatcher is the boundary between scraper errors and callers: every
//! call yields a [`DispatchResponse`], never an `Err`. Failures are the same
//! text channel with a `❌` prefix plus an `is_error` flag the MCP layer can
//! forward.

use crate::error::NewsError;
use crate::models::{GameKind, NewsCategory, NewsRecord};
use crate::scrapers::{NewsScraper, ScraperRegistry};
use crate::utils::{format_view_count, is_valid_url, truncate_text};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 50;

/// Detail bodies longer than this are cut in responses.
pub const MAX_CONTENT_CHARS: usize = 1000;

const FAILURE_MARKER: &str = "❌";

/// The six tool-call operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolOperation {
    GameAnnouncements,
    AnnouncementDetail,
    GameEvents,
    EventDetail,
    GameUpdates,
    UpdateDetail,
}

impl ToolOperation {
    pub const ALL: [ToolOperation; 6] = [
        ToolOperation::GameAnnouncements,
        ToolOperation::AnnouncementDetail,
        ToolOperation::GameEvents,
        ToolOperation::EventDetail,
        ToolOperation::GameUpdates,
        ToolOperation::UpdateDetail,
    ];

    /// Tool name as exposed to clients.
    pub fn name(&self) -> &'static str {
        match self {
            ToolOperation::GameAnnouncements => "get_game_announcements",
            ToolOperation::AnnouncementDetail => "get_announcement_detail",
            ToolOperation::GameEvents => "get_game_events",
            ToolOperation::EventDetail => "get_event_detail",
            ToolOperation::GameUpdates => "get_game_updates",
            ToolOperation::UpdateDetail => "get_update_detail",
        }
    }

    pub fn category(&self) -> NewsCategory {
        match self {
            ToolOperation::GameAnnouncements | ToolOperation::AnnouncementDetail => {
                NewsCategory::Announcement
            }
            ToolOperation::GameEvents | ToolOperation::EventDetail => NewsCategory::Event,
            ToolOperation::GameUpdates | ToolOperation::UpdateDetail => NewsCategory::Update,
        }
    }

    pub fn is_detail(&self) -> bool {
        matches!(
            self,
            ToolOperation::AnnouncementDetail | ToolOperation::EventDetail | ToolOperation::UpdateDetail
        )
    }
}

impl fmt::Display for ToolOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ToolOperation {
    type Err = NewsError;

    fn from_str(s: &str) -> Result<Self, NewsError> {
        ToolOperation::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| NewsError::Validation(format!("unknown tool: {s}")))
    }
}

/// Named parameters of a tool call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolArguments {
    pub game: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResponse {
    pub text: String,
    pub is_error: bool,
}

impl DispatchResponse {
    fn success(text: String) -> Self {
        Self { text, is_error: false }
    }

    fn failure(message: impl fmt::Display) -> Self {
        Self {
            text: format!("{FAILURE_MARKER} {message}"),
            is_error: true,
        }
    }
}

pub struct Dispatcher {
    registry: Arc<ScraperRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ScraperRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ScraperRegistry> {
        &self.registry
    }

    /// Handle one call by tool name. Never fails; see [`DispatchResponse`].
    #[instrument(level = "info", skip(self, arguments), fields(game = %arguments.game))]
    pub async fn dispatch(&self, tool: &str, arguments: &ToolArguments) -> DispatchResponse {
        let scraper = match self.registry.get(&arguments.game) {
            Ok(scraper) => scraper,
            Err(e) => {
                info!(error = %e, "rejected call");
                return DispatchResponse::failure(e);
            }
        };
        let Ok(operation) = tool.parse::<ToolOperation>() else {
            info!("unknown tool");
            return DispatchResponse::failure(format!("Unknown tool: {tool}"));
        };

        let t0 = Instant::now();
        let response = self.run(operation, scraper.as_ref(), arguments).await;
        if response.is_error {
            error!(
                elapsed_ms = t0.elapsed().as_millis() as u64,
                response = %response.text,
                "tool call failed"
            );
        } else {
            info!(elapsed_ms = t0.elapsed().as_millis() as u64, "tool call completed");
        }
        response
    }

    async fn run(
        &self,
        operation: ToolOperation,
        scraper: &dyn NewsScraper,
        arguments: &ToolArguments,
    ) -> DispatchResponse {
        let game = scraper.game();
        let category = operation.category();

        if !operation.is_detail() {
            let limit = clamp_limit(arguments.limit);
            return match list(scraper, category).await {
                Ok(records) if records.is_empty() => DispatchResponse::success(format!(
                    "📋 No {} found for {}.",
                    category.plural(),
                    game.display_name()
                )),
                Ok(records) => DispatchResponse::success(format_list(
                    game,
                    category,
                    &records[..records.len().min(limit)],
                )),
                Err(e) => DispatchResponse::failure(format!("{operation} failed: {e}")),
            };
        }

        let Some(url) = arguments.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
            return DispatchResponse::failure(format!("{operation} requires a url"));
        };
        if !is_valid_url(url) {
            return DispatchResponse::failure(format!("invalid url: {url}"));
        }
        match detail(scraper, category, url).await {
            Ok(Some(record)) => DispatchResponse::success(format_detail(&record)),
            Ok(None) => DispatchResponse::failure(NewsError::ContentNotFound(format!(
                "no {category} at {url}"
            ))),
            Err(e) => DispatchResponse::failure(format!("{operation} failed: {e}")),
        }
    }
}

async fn list(scraper: &dyn NewsScraper, category: NewsCategory) -> crate::error::Result<Vec<NewsRecord>> {
    match category {
        NewsCategory::Announcement => scraper.list_announcements().await,
        NewsCategory::Event => scraper.list_events().await,
        NewsCategory::Update => scraper.list_updates().await,
    }
}

async fn detail(
    scraper: &dyn NewsScraper,
    category: NewsCategory,
    url: &str,
) -> crate::error::Result<Option<NewsRecord>> {
    match category {
        NewsCategory::Announcement => scraper.detail_announcement(url).await,
        NewsCategory::Event => scraper.detail_event(url).await,
        NewsCategory::Update => scraper.detail_update(url).await,
    }
}

/// `limit` clamped to 1..=50, defaulting to 10.
pub fn clamp_limit(limit: Option<i64>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT) as usize
}

fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M").to_string()
}

/// Numbered list with date, link and tags per record.
pub fn format_list(game: GameKind, category: NewsCategory, records: &[NewsRecord]) -> String {
    let mut out = format!(
        "{} **{} {}** ({})\n\n",
        category.marker(),
        game.display_name(),
        category.plural(),
        records.len()
    );
    for (i, record) in records.iter().enumerate() {
        out.push_str(&format!("**{}. {}**\n", i + 1, record.title));
        out.push_str(&format!("   📅 {}\n", format_date(&record.published_at)));
        out.push_str(&format!("   🔗 {}\n", record.url));
        if record.view_count.is_some() {
            out.push_str(&format!("   👁️ {}\n", format_view_count(record.view_count)));
        }
        if !record.tags.is_empty() {
            out.push_str(&format!("   🏷️ {}\n", record.tags.iter().join(", ")));
        }
        out.push('\n');
    }
    out
}

/// Title, date, url, tags and (truncated) content of one record.
pub fn format_detail(record: &NewsRecord) -> String {
    let mut out = format!("{} **{}**\n\n", record.category.marker(), record.title);
    out.push_str(&format!("📅 **Published:** {}\n", format_date(&record.published_at)));
    out.push_str(&format!("🔗 **URL:** {}\n", record.url));
    if record.view_count.is_some() {
        out.push_str(&format!("👁️ **Views:** {}\n", format_view_count(record.view_count)));
    }
    if !record.tags.is_empty() {
        out.push_str(&format!("🏷️ **Tags:** {}\n", record.tags.iter().join(", ")));
    }
    out.push('\n');

    if let Some(content) = &record.content {
        out.push_str("📝 **Content:**\n");
        if content.chars().count() > MAX_CONTENT_CHARS {
            out.push_str(&truncate_text(content, MAX_CONTENT_CHARS, ""));
            out.push_str("...\n\n(Content truncated)");
        } else {
            out.push_str(content);
        }
    }
    out
}
