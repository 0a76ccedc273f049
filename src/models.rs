//! Data models for normalized game news.
//!
//! This module defines the data structures every scraper produces:
//! - [`GameKind`]: The supported titles, one per scraper
//! - [`NewsCategory`]: The board a record was fetched from
//! - [`NewsRecord`]: One validated, normalized article
//! - [`NewsDraft`]: Unvalidated input collected by a scraper before normalization
//!
//! Records are created fresh on every fetch and are never persisted. Outside of
//! [`NewsRecord::promote_summary_to_content`] they are not mutated after
//! construction.

use crate::error::{NewsError, Result};
use crate::utils::{clean_text, normalize_url};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A game whose news this crate can collect.
///
/// The string form (`lordnine`, `epic_seven`, `lost_ark`) is the key accepted
/// by the tool-call surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Lordnine,
    EpicSeven,
    LostArk,
}

impl GameKind {
    pub const ALL: [GameKind; 3] = [GameKind::Lordnine, GameKind::EpicSeven, GameKind::LostArk];

    /// The key used in tool arguments.
    pub fn key(&self) -> &'static str {
        match self {
            GameKind::Lordnine => "lordnine",
            GameKind::EpicSeven => "epic_seven",
            GameKind::LostArk => "lost_ark",
        }
    }

    /// Human-readable title for response headers.
    pub fn display_name(&self) -> &'static str {
        match self {
            GameKind::Lordnine => "Lordnine",
            GameKind::EpicSeven => "Epic Seven",
            GameKind::LostArk => "Lost Ark",
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for GameKind {
    type Err = NewsError;

    fn from_str(s: &str) -> Result<Self> {
        GameKind::ALL
            .into_iter()
            .find(|game| game.key() == s.trim())
            .ok_or_else(|| NewsError::UnsupportedGame(s.to_string()))
    }
}

/// The upstream board a record belongs to. Fixed per fetch operation, never
/// inferred from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsCategory {
    Announcement,
    Event,
    Update,
}

impl NewsCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewsCategory::Announcement => "announcement",
            NewsCategory::Event => "event",
            NewsCategory::Update => "update",
        }
    }

    /// Plural label used in response headers ("announcements", "events", ...).
    pub fn plural(&self) -> &'static str {
        match self {
            NewsCategory::Announcement => "announcements",
            NewsCategory::Event => "events",
            NewsCategory::Update => "updates",
        }
    }

    /// Leading marker used when decorating titles and response headers.
    pub fn marker(&self) -> &'static str {
        match self {
            NewsCategory::Announcement => "📢",
            NewsCategory::Event => "🎉",
            NewsCategory::Update => "🔄",
        }
    }
}

impl fmt::Display for NewsCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized news article.
///
/// Every field invariant is checked once in [`NewsRecord::from_draft`]:
///
/// - `title` is non-empty after tag stripping and whitespace collapsing
/// - `url` is absolute (scheme and host present)
/// - `published_at` is not in the future
/// - `view_count`, when present, is non-negative (it is unsigned)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsRecord {
    /// Native article id when extractable from the URL, else a short content hash.
    pub id: String,
    pub title: String,
    /// Long-form body. Present on detail fetches.
    pub content: Option<String>,
    pub summary: Option<String>,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub game: GameKind,
    pub category: NewsCategory,
    pub is_important: bool,
    pub tags: BTreeSet<String>,
    pub view_count: Option<u64>,
}

/// Raw field values collected by a scraper, prior to cleanup and validation.
///
/// `view_count` is signed because upstreams occasionally report garbage;
/// negative values normalize to `None`.
#[derive(Debug, Clone)]
pub struct NewsDraft {
    pub id: String,
    pub title: String,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub category: NewsCategory,
    pub is_important: bool,
    pub tags: Vec<String>,
    pub view_count: Option<i64>,
}

impl NewsRecord {
    /// Clean and validate a draft into a record for `game`.
    ///
    /// # Errors
    ///
    /// - [`NewsError::Validation`] if the id or cleaned title is empty, or the
    ///   timestamp lies in the future
    /// - [`NewsError::InvalidUrl`] if the URL is not absolute
    pub fn from_draft(game: GameKind, draft: NewsDraft) -> Result<Self> {
        let title = clean_text(&draft.title);
        if title.is_empty() {
            return Err(NewsError::Validation(format!(
                "empty title for article {}",
                draft.id
            )));
        }
        if draft.id.trim().is_empty() {
            return Err(NewsError::Validation(format!("empty id for '{title}'")));
        }

        let url = normalize_url(&draft.url, None)?;

        let now = Utc::now();
        if draft.published_at > now {
            return Err(NewsError::Validation(format!(
                "published_at {} is in the future",
                draft.published_at.to_rfc3339()
            )));
        }

        let tags = draft
            .tags
            .iter()
            .map(|tag| clean_text(tag))
            .filter(|tag| !tag.is_empty())
            .collect::<BTreeSet<_>>();

        Ok(NewsRecord {
            id: draft.id.trim().to_string(),
            title,
            content: non_empty(draft.content.as_deref().map(clean_text)),
            summary: non_empty(draft.summary.as_deref().map(clean_text)),
            url,
            published_at: draft.published_at,
            game,
            category: draft.category,
            is_important: draft.is_important,
            tags,
            view_count: draft.view_count.and_then(|v| u64::try_from(v).ok()),
        })
    }

    /// Use the summary as the body. Applied when a detail lookup had to fall
    /// back to the list endpoint, which only carries summaries.
    pub fn promote_summary_to_content(mut self) -> Self {
        self.content = self.summary.clone();
        self
    }

    /// Same record relabelled under another category.
    pub fn with_category(mut self, category: NewsCategory) -> Self {
        self.category = category;
        self
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn draft() -> NewsDraft {
        NewsDraft {
            id: "12345".to_string(),
            title: "  <b>[Notice]</b>   Server   maintenance ".to_string(),
            content: Some("<p>Body</p>".to_string()),
            summary: Some("".to_string()),
            url: "https://page.onstove.com/epicseven/global/view/12345".to_string(),
            published_at: Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap(),
            category: NewsCategory::Announcement,
            is_important: true,
            tags: vec!["notice".into(), " notice ".into(), "".into()],
            view_count: Some(120),
        }
    }

    #[test]
    fn test_from_draft_cleans_fields() {
        let record = NewsRecord::from_draft(GameKind::EpicSeven, draft()).unwrap();
        assert_eq!(record.title, "[Notice] Server maintenance");
        assert_eq!(record.content.as_deref(), Some("Body"));
        assert_eq!(record.summary, None);
        assert_eq!(record.tags.len(), 1);
        assert_eq!(record.view_count, Some(120));
        assert_eq!(record.game, GameKind::EpicSeven);
    }

    #[test]
    fn test_from_draft_rejects_empty_title() {
        let mut d = draft();
        d.title = "<span>   </span>".to_string();
        let err = NewsRecord::from_draft(GameKind::Lordnine, d).unwrap_err();
        assert!(matches!(err, NewsError::Validation(_)));
    }

    #[test]
    fn test_from_draft_rejects_future_timestamp() {
        let mut d = draft();
        d.published_at = Utc::now() + Duration::days(1);
        let err = NewsRecord::from_draft(GameKind::Lordnine, d).unwrap_err();
        assert!(matches!(err, NewsError::Validation(_)));
    }

    #[test]
    fn test_from_draft_rejects_relative_url() {
        let mut d = draft();
        d.url = "/News/Notice/Views/1".to_string();
        let err = NewsRecord::from_draft(GameKind::LostArk, d).unwrap_err();
        assert!(matches!(err, NewsError::InvalidUrl(_)));
    }

    #[test]
    fn test_negative_view_count_is_absent() {
        let mut d = draft();
        d.view_count = Some(-5);
        let record = NewsRecord::from_draft(GameKind::Lordnine, d).unwrap();
        assert_eq!(record.view_count, None);
    }

    #[test]
    fn test_promote_summary_to_content() {
        let mut d = draft();
        d.summary = Some("Short summary".to_string());
        let record = NewsRecord::from_draft(GameKind::EpicSeven, d)
            .unwrap()
            .promote_summary_to_content();
        assert_eq!(record.content.as_deref(), Some("Short summary"));
    }

    #[test]
    fn test_game_kind_from_str() {
        assert_eq!("lordnine".parse::<GameKind>().unwrap(), GameKind::Lordnine);
        assert_eq!("epic_seven".parse::<GameKind>().unwrap(), GameKind::EpicSeven);
        assert_eq!("lost_ark".parse::<GameKind>().unwrap(), GameKind::LostArk);
        assert!(matches!(
            "unknown_game".parse::<GameKind>(),
            Err(NewsError::UnsupportedGame(_))
        ));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = NewsRecord::from_draft(GameKind::EpicSeven, draft()).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"publishedAt\""));
        assert!(json.contains("\"isImportant\":true"));
        assert!(json.contains("\"game\":\"epic_seven\""));
        assert!(json.contains("\"category\":\"announcement\""));
    }
}
