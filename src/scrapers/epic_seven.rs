//! Epic Seven news from the STOVE community board API.
//!
//! All three categories have their own board. A per-article detail endpoint
//! exists but does not answer reliably; when it fails, returns something
//! that does not parse or answers with a different article, the record is
//! looked up in its category list instead and the summary stands in for the
//! body.
//!
//! Titles are decorated for display: `📌` for important posts, `🔥` for posts
//! with at least 10,000 views, and the category marker in front.

use super::{NewsScraper, json_count, json_id, json_str, stove_article_list, stove_list_params};
use crate::config::ScraperConfig;
use crate::error::{NewsError, Result};
use crate::heuristics::{ImportanceSignals, TagRule, decorate_title, extract_tags, is_important};
use crate::models::{GameKind, NewsCategory, NewsDraft, NewsRecord};
use crate::transport::HttpTransport;
use crate::utils::{extract_article_id, parse_json_timestamp};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

pub const API_BASE: &str = "https://api.onstove.com/cwms/v3.0";
pub const PAGE_BASE: &str = "https://page.onstove.com/epicseven/global/view";

const PAGE_SIZE: &str = "20";

const IMPORTANT_KEYWORDS: &[&str] = &[
    "긴급", "중요", "점검", "공지", "안내", "업데이트", "패치", "이벤트", "출시", "릴리스",
    "오픈", "종료", "마감", "urgent", "important", "maintenance", "notice", "update",
    "patch",
];

const TAG_RULES: &[TagRule] = &[
    TagRule { tag: "점검", keywords: &["점검", "maintenance"] },
    TagRule { tag: "업데이트", keywords: &["업데이트", "update"] },
    TagRule { tag: "패치", keywords: &["패치", "patch"] },
    TagRule { tag: "이벤트", keywords: &["이벤트", "event"] },
    TagRule { tag: "출시", keywords: &["출시", "release"] },
    TagRule { tag: "종료", keywords: &["종료", "ends"] },
];

fn board_for(category: NewsCategory) -> &'static str {
    match category {
        NewsCategory::Announcement => "995",
        NewsCategory::Event => "1000",
        NewsCategory::Update => "997",
    }
}

pub struct EpicSevenScraper {
    http: HttpTransport,
    api_base: String,
    page_base: String,
}

impl EpicSevenScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Self::with_base_urls(config, API_BASE, PAGE_BASE)
    }

    pub fn with_base_urls(config: &ScraperConfig, api_base: &str, page_base: &str) -> Result<Self> {
        let http = HttpTransport::new("epic_seven", config)?
            .with_header("referer", "https://page.onstove.com/epicseven/global")?
            .with_header("origin", "https://page.onstove.com")?
            .with_header("x-client-lang", "ko")?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            page_base: page_base.trim_end_matches('/').to_string(),
        })
    }

    /// Direct lookup through `/article/{id}`. Any failure here is recoverable.
    async fn fetch_article(&self, id: &str, category: NewsCategory) -> Result<NewsRecord> {
        let endpoint = format!("{}/article/{id}", self.api_base);
        let payload = self
            .http
            .request(
                &endpoint,
                Method::GET,
                &[
                    ("interaction_type_code", "LIKE,DISLIKE,COMMENT,VIEW"),
                    ("content_yn", "Y"),
                ],
            )
            .await?;

        let article = payload
            .get("value")
            .filter(|value| value.is_object())
            .ok_or_else(|| NewsError::Api {
                endpoint: endpoint.clone(),
                status: None,
                message: "response has no 'value' object".to_string(),
            })?;
        let record = self.parse_article(article, category)?;
        if record.id != id {
            return Err(NewsError::Api {
                endpoint,
                status: None,
                message: format!("detail id mismatch: asked for {id}, got {}", record.id),
            });
        }
        Ok(record)
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

        let view_count = json_count(item, "/view_count");
        let flag = |key: &str| item.get(key).and_then(Value::as_bool).unwrap_or(false);
        let pinned = flag("is_headline") || flag("is_top");

        let important = is_important(
            &ImportanceSignals {
                title,
                secondary_text: None,
                pinned,
                view_count,
            },
            IMPORTANT_KEYWORDS,
        );
        let labels = [json_str(item, "/category"), json_str(item, "/article_type")];
        let tags = extract_tags(title, labels.into_iter().flatten(), TAG_RULES);

        NewsRecord::from_draft(
            GameKind::EpicSeven,
            NewsDraft {
                url: format!("{}/{id}", self.page_base),
                id,
                title: decorate_title(title, category, important, view_count),
                content: json_str(item, "/content").map(str::to_string),
                summary: json_str(item, "/summary").map(str::to_string),
                published_at,
                category,
                is_important: important,
                tags,
                view_count,
            },
        )
    }

    async fn find_in_list(&self, id: &str, category: NewsCategory) -> Result<Option<NewsRecord>> {
        Ok(self
            .fetch_list(category)
            .await?
            .into_iter()
            .find(|record| record.id == id)
            .map(NewsRecord::promote_summary_to_content))
    }
}

#[async_trait]
impl NewsScraper for EpicSevenScraper {
    fn game(&self) -> GameKind {
        GameKind::EpicSeven
    }

    #[instrument(level = "info", skip(self), fields(game = "epic_seven"))]
    async fn fetch_list(&self, category: NewsCategory) -> Result<Vec<NewsRecord>> {
        let endpoint = format!(
            "{}/article_group/BOARD/{}/article/list",
            self.api_base,
            board_for(category)
        );
        let payload = self
            .http
            .request_with_retry(&endpoint, &stove_list_params(PAGE_SIZE))
            .await?;
        let items = stove_article_list(&payload, &endpoint)?;

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            match self.parse_article(item, category) {
                Ok(record) => records.push(record),
                Err(e) => debug!(error = %e, "skipping Epic Seven article"),
            }
        }

        info!(received = items.len(), count = records.len(), "fetched Epic Seven board");
        Ok(records)
    }

    #[instrument(level = "info", skip(self), fields(game = "epic_seven"))]
    async fn fetch_detail(&self, url: &str, category: NewsCategory) -> Result<Option<NewsRecord>> {
        let id = extract_article_id(url)
            .ok_or_else(|| NewsError::Validation(format!("no article id in {url}")))?;

        match self.fetch_article(&id, category).await {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(%id, kind = e.kind(), error = %e, "detail endpoint failed; searching list");
                self.find_in_list(&id, category).await
            }
        }
    }

    async fn open(&self) -> Result<()> {
        self.http.init_session()
    }

    async fn close(&self) {
        self.http.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::time::Duration;

    fn article(id: u64, title: &str, views: u64) -> Value {
        json!({
            "article_id": id,
            "title": title,
            "create_datetime": 1704844800000u64,
            "summary": format!("summary of {id}"),
            "content": format!("<p>content of {id}</p>"),
            "view_count": views,
            "category": "공지사항",
        })
    }

    fn list_for(board: &str) -> Value {
        match board {
            "995" => json!({"value": {"list": [
                article(10867009, "Server maintenance notice", 800),
                article(10867010, "Fan art showcase", 20_000),
                {"article_id": 10867011, "title": "", "create_datetime": 1704844800000u64},
            ]}}),
            "1000" => json!({"value": {"list": [
                {
                    "article_id": 20001,
                    "title": "Moonlight summon event",
                    "create_datetime": "2024-01-10T00:00:00Z",
                    "is_top": true,
                    "article_type": "EVENT",
                    "summary": "Summon rates doubled",
                },
            ]}}),
            "997" => json!({"value": {"list": [article(30001, "1.2 patch notes", 100)]}}),
            _ => json!({"value": {}}),
        }
    }

    /// `/article/{id}` answers for 20001 only; everything else is a 500.
    async fn detail(Path(id): Path<String>) -> Response {
        if id == "20001" {
            Json(json!({"value": {
                "article_id": 20001,
                "title": "Moonlight summon event",
                "create_datetime": 1704844800000u64,
                "content": "<p>Full event rules</p>",
                "summary": "short",
            }}))
            .into_response()
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, "detail unavailable").into_response()
        }
    }

    async fn scraper() -> EpicSevenScraper {
        let router = Router::new()
            .route(
                "/article_group/BOARD/{board}/article/list",
                get(|Path(board): Path<String>| async move { Json(list_for(&board)) }),
            )
            .route("/article/{id}", get(detail));
        let base = serve(router).await;
        EpicSevenScraper::with_base_urls(&ScraperConfig::default(), &base, PAGE_BASE).unwrap()
    }

    #[tokio::test]
    async fn test_list_decorates_titles() {
        let scraper = scraper().await;
        let records = scraper.list_announcements().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "📢 📌 Server maintenance notice");
        assert!(records[0].is_important);
        assert_eq!(records[1].title, "📢 🔥 📌 Fan art showcase");
        assert_eq!(records[1].view_count, Some(20_000));
        assert_eq!(records[0].url, "https://page.onstove.com/epicseven/global/view/10867009");
        assert_eq!(records[0].content.as_deref(), Some("content of 10867009"));
        assert!(records[0].tags.contains("공지사항"));
        assert!(records[0].tags.contains("점검"));
    }

    #[tokio::test]
    async fn test_pinned_event_and_update_board() {
        let scraper = scraper().await;

        let events = scraper.list_events().await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_important);
        assert!(events[0].tags.contains("EVENT"));
        assert!(events[0].title.starts_with("🎉 "));

        let updates = scraper.list_updates().await.unwrap();
        assert_eq!(updates[0].id, "30001");
        assert!(updates[0].title.starts_with("🔄 "));
        assert_eq!(updates[0].category, NewsCategory::Update);
    }

    #[tokio::test]
    async fn test_detail_uses_detail_endpoint_when_available() {
        let scraper = scraper().await;
        let record = scraper
            .detail_event("https://page.onstove.com/epicseven/global/view/20001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.content.as_deref(), Some("Full event rules"));
        assert_eq!(record.summary.as_deref(), Some("short"));
    }

    #[tokio::test]
    async fn test_detail_falls_back_to_list_search() {
        let scraper = scraper().await;
        let record = scraper
            .detail_announcement("https://page.onstove.com/epicseven/global/view/10867010")
            .await
            .unwrap()
            .expect("found through the list");

        assert_eq!(record.id, "10867010");
        assert_eq!(record.content, record.summary);
        assert_eq!(record.content.as_deref(), Some("summary of 10867010"));
    }

    async fn scraper_with_detail(config: &ScraperConfig, detail: Router) -> EpicSevenScraper {
        let router = Router::new()
            .route(
                "/article_group/BOARD/{board}/article/list",
                get(|Path(board): Path<String>| async move { Json(list_for(&board)) }),
            )
            .merge(detail);
        let base = serve(router).await;
        EpicSevenScraper::with_base_urls(config, &base, PAGE_BASE).unwrap()
    }

    #[tokio::test]
    async fn test_detail_for_another_article_falls_back_to_list() {
        let detail = Router::new().route(
            "/article/{id}",
            get(|| async { Json(json!({"value": article(55555, "Some other article", 5)})) }),
        );
        let scraper = scraper_with_detail(&ScraperConfig::default(), detail).await;

        let record = scraper
            .detail_event("https://page.onstove.com/epicseven/global/view/20001")
            .await
            .unwrap()
            .expect("found through the list");

        assert_eq!(record.id, "20001");
        assert_eq!(record.url, "https://page.onstove.com/epicseven/global/view/20001");
        assert!(record.title.contains("Moonlight summon event"));
        assert_eq!(record.content.as_deref(), Some("Summon rates doubled"));
    }

    #[tokio::test]
    async fn test_stalled_detail_endpoint_falls_back_to_list() {
        let detail = Router::new().route(
            "/article/{id}",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"value": article(10867010, "Fan art showcase", 20_000)}))
            }),
        );
        let mut config = ScraperConfig::default();
        config.request_timeout = Duration::from_millis(100);
        config.retry.base_delay = Duration::from_millis(1);
        let scraper = scraper_with_detail(&config, detail).await;

        let record = scraper
            .detail_announcement("https://page.onstove.com/epicseven/global/view/10867010")
            .await
            .unwrap()
            .expect("found through the list");

        assert_eq!(record.id, "10867010");
        assert_eq!(record.content.as_deref(), Some("summary of 10867010"));
        assert_eq!(record.content, record.summary);
    }

    #[tokio::test]
    async fn test_detail_missing_everywhere_is_none() {
        let scraper = scraper().await;
        let missing = scraper
            .detail_update("https://page.onstove.com/epicseven/global/view/404404")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_malformed_list_payload_is_api_error() {
        let router = Router::new().route(
            "/article_group/BOARD/{board}/article/list",
            get(|| async { Json(json!({"value": {}})) }),
        );
        let base = serve(router).await;
        let scraper =
            EpicSevenScraper::with_base_urls(&ScraperConfig::default(), &base, PAGE_BASE).unwrap();

        let err = scraper.list_events().await.unwrap_err();
        assert!(matches!(err, NewsError::Api { .. }), "{err:?}");
    }
}
