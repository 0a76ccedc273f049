//! Lordnine news from the STOVE community board API.
//!
//! Announcements and events are separate boards. There is no update board:
//! updates are announcements whose titles mention an update, patch or release,
//! relabelled as [`NewsCategory::Update`]. The board API has no usable detail
//! endpoint, so detail lookups search the category's list and promote the
//! summary to the body.
//!
//! # URL Pattern
//!
//! Public article pages look like `https://page.onstove.com/l9/global/view/{article_id}`.

use super::{NewsScraper, json_count, json_id, json_str, stove_article_list, stove_list_params};
use crate::config::ScraperConfig;
use crate::error::{NewsError, Result};
use crate::heuristics::{ImportanceSignals, TagRule, contains_keyword, extract_tags, is_important};
use crate::models::{GameKind, NewsCategory, NewsDraft, NewsRecord};
use crate::transport::HttpTransport;
use crate::utils::{extract_article_id, parse_json_timestamp};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument};

pub const API_BASE: &str = "https://api.onstove.com/cwms/v3.0";
pub const PAGE_BASE: &str = "https://page.onstove.com/l9/global/view";

const ANNOUNCEMENT_BOARD: &str = "128074";
const EVENT_BOARD: &str = "128451";
const PAGE_SIZE: &str = "24";

const IMPORTANT_KEYWORDS: &[&str] = &[
    "공지", "점검", "긴급", "중요", "필독",
    "notice", "maintenance", "urgent", "important",
];

const UPDATE_KEYWORDS: &[&str] = &[
    "업데이트", "패치", "버전", "출시", "릴리스", "개선",
    "update", "patch", "version", "release",
];

const TAG_RULES: &[TagRule] = &[
    TagRule { tag: "공지", keywords: &["공지", "알림", "notice"] },
    TagRule { tag: "이벤트", keywords: &["이벤트", "행사", "event"] },
    TagRule { tag: "점검", keywords: &["점검", "maintenance"] },
    TagRule { tag: "업데이트", keywords: &["업데이트", "패치", "버전", "update", "patch"] },
    TagRule { tag: "출시", keywords: &["출시", "릴리스", "런칭", "release", "launch"] },
];

pub struct LordnineScraper {
    http: HttpTransport,
    api_base: String,
    page_base: String,
}

impl LordnineScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Self::with_base_urls(config, API_BASE, PAGE_BASE)
    }

    /// Point the scraper at another API host and public page prefix.
    pub fn with_base_urls(config: &ScraperConfig, api_base: &str, page_base: &str) -> Result<Self> {
        let http = HttpTransport::new("lordnine", config)?
            .with_header("referer", "https://page.onstove.com/")?
            .with_header("origin", "https://page.onstove.com")?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            page_base: page_base.trim_end_matches('/').to_string(),
        })
    }

    #[instrument(level = "info", skip(self), fields(game = "lordnine"))]
    async fn fetch_board(&self, board: &str, category: NewsCategory) -> Result<Vec<NewsRecord>> {
        let endpoint = format!("{}/article_group/BOARD/{board}/article/list", self.api_base);
        let payload = self
            .http
            .request_with_retry(&endpoint, &stove_list_params(PAGE_SIZE))
            .await?;
        let items = stove_article_list(&payload, &endpoint)?;

        let records: Vec<NewsRecord> = items
            .iter()
            .filter_map(|item| match self.parse_article(item, category) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!(error = %e, "skipping Lordnine article");
                    None
                }
            })
            .collect();

        info!(
            %category,
            received = items.len(),
            count = records.len(),
            "fetched Lordnine board"
        );
        Ok(records)
    }

    async fn fetch_updates(&self) -> Result<Vec<NewsRecord>> {
        let announcements = self.fetch_board(ANNOUNCEMENT_BOARD, NewsCategory::Announcement).await?;
        Ok(announcements
            .into_iter()
            .filter(|record| contains_keyword(&record.title, UPDATE_KEYWORDS))
            .map(|record| record.with_category(NewsCategory::Update))
            .collect())
    }

    fn parse_article(&self, item: &Value, category: NewsCategory) -> Result<NewsRecord> {
        let id = json_id(item.get("article_id"))
            .ok_or_else(|| NewsError::Validation("article without article_id".into()))?;
        let title = json_str(item, "/title")
            .ok_or_else(|| NewsError::Validation(format!("article {id} without title")))?;
        let created = item
            .get("create_datetime")
            .ok_or_else(|| NewsError::Validation(format!("article {id} without create_datetime")))?;
        let published_at = parse_json_timestamp(created)?;

        let headline = json_str(item, "/headline_info/headline_name");
        let official_type = json_str(item, "/admin_option_summary_info/official_type_code");
        let view_count = json_count(item, "/user_interaction_score_info/view_score");

        let pinned = json_str(item, "/fixed_yn") == Some("Y")
            || matches!(official_type, Some("NOTICE" | "MAINTENANCE"))
            || notice_everywhere(item.pointer("/admin_option_summary_info/notice_position_code"));

        let important = is_important(
            &ImportanceSignals {
                title,
                secondary_text: headline,
                pinned,
                view_count,
            },
            IMPORTANT_KEYWORDS,
        );

        let official_tag = match official_type {
            Some("NOTICE") => Some("공지"),
            Some("MAINTENANCE") => Some("점검"),
            _ => None,
        };
        let tags = extract_tags(title, headline.into_iter().chain(official_tag), TAG_RULES);

        NewsRecord::from_draft(
            GameKind::Lordnine,
            NewsDraft {
                url: format!("{}/{id}", self.page_base),
                id,
                title: title.to_string(),
                content: None,
                summary: json_str(item, "/summary").map(str::to_string),
                published_at,
                category,
                is_important: important,
                tags,
                view_count,
            },
        )
    }
}

/// `notice_position_code` arrives either as a list of codes or a joined string.
fn notice_everywhere(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Array(codes)) => codes.iter().any(|code| code.as_str() == Some("ALL")),
        Some(Value::String(codes)) => codes.contains("ALL"),
        _ => false,
    }
}

#[async_trait]
impl NewsScraper for LordnineScraper {
    fn game(&self) -> GameKind {
        GameKind::Lordnine
    }

    async fn fetch_list(&self, category: NewsCategory) -> Result<Vec<NewsRecord>> {
        match category {
            NewsCategory::Announcement => self.fetch_board(ANNOUNCEMENT_BOARD, category).await,
            NewsCategory::Event => self.fetch_board(EVENT_BOARD, category).await,
            NewsCategory::Update => self.fetch_updates().await,
        }
    }

    #[instrument(level = "info", skip(self), fields(game = "lordnine"))]
    async fn fetch_detail(&self, url: &str, category: NewsCategory) -> Result<Option<NewsRecord>> {
        let id = extract_article_id(url)
            .ok_or_else(|| NewsError::Validation(format!("no article id in {url}")))?;

        let found = self
            .fetch_list(category)
            .await?
            .into_iter()
            .find(|record| record.id == id)
            .map(NewsRecord::promote_summary_to_content);

        debug!(%id, found = found.is_some(), "Lordnine detail resolved from list");
        Ok(found)
    }

    async fn open(&self) -> Result<()> {
        self.http.init_session()
    }

    async fn close(&self) {
        self.http.close();
    }
}
