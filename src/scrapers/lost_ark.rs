//! Lost Ark news scraped from the rendered official site.
//!
//! The site has no public API and builds its boards client-side, so pages
//! are rendered through a [`PageRenderer`] and the settled HTML is parsed
//! with `scraper`. There is no stable markup contract: list items are found
//! by trying an ordered list of selectors per category and keeping the first
//! one that matches often enough (see [`list_strategies`]).
//!
//! # URL Pattern
//!
//! | Category | List page |
//! |----------|-----------|
//! | announcement | `/News/Notice/List` |
//! | event | `/News/Event/Now` |
//! | update | `/News/Update/List` |
//!
//! Article links are relative (`/News/Notice/Views/12950`) and are resolved
//! against the site base before validation.

use super::NewsScraper;
use crate::config::ScraperConfig;
use crate::error::{NewsError, Result};
use crate::heuristics::{ImportanceSignals, TagRule, contains_keyword, extract_tags, is_important};
use crate::models::{GameKind, NewsCategory, NewsDraft, NewsRecord};
use crate::transport::{BrowserTransport, PageRenderer};
use crate::utils::{clean_text, generate_news_id, normalize_url, parse_display_date};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};

pub const BASE_URL: &str = "https://lostark.game.onstove.com";

/// Most records taken from one list page.
pub const MAX_ITEMS: usize = 20;

/// Generic selectors must match more than this many elements to be trusted.
const GENERIC_MIN_MATCHES: usize = 5;

/// Title used when a detail page has a body but no recognizable title.
pub const NO_TITLE: &str = "No title";

const SUMMARY_CHARS: usize = 200;

const IMPORTANT_KEYWORDS: &[&str] = &[
    "긴급", "중요", "공지", "안내", "업데이트", "패치", "점검", "오픈", "출시", "종료", "마감",
    "이벤트", "urgent", "important", "notice", "maintenance", "update", "patch",
];

const MAINTENANCE_KEYWORDS: &[&str] = &["점검", "maintenance"];
const MAINTENANCE_TAGS: [&str; 2] = ["점검", "maintenance"];

const TAG_RULES: &[TagRule] = &[
    TagRule { tag: "업데이트", keywords: &["업데이트", "update"] },
    TagRule { tag: "패치", keywords: &["패치", "patch"] },
    TagRule { tag: "이벤트", keywords: &["이벤트", "event"] },
    TagRule { tag: "점검", keywords: &["점검", "maintenance"] },
    TagRule { tag: "공지", keywords: &["공지", "notice"] },
    TagRule { tag: "출시", keywords: &["출시", "release"] },
    TagRule { tag: "종료", keywords: &["종료"] },
];

const ITEM_TITLE_SELECTORS: &[&str] = &[
    ".list__title", ".title", ".subject", ".tit", "h3", "h4", ".news-title", ".notice-title",
    "strong",
];
const ITEM_DATE_SELECTORS: &[&str] = &[
    ".list__date", ".date", ".time", ".regdate", ".created", ".publish-date", ".write-date",
];
const DETAIL_TITLE_SELECTORS: &[&str] = &[
    ".article__title", ".view-title", ".detail-title", ".content-title", "h1", "h2", ".title",
    ".subject",
];
const DETAIL_DATE_SELECTORS: &[&str] = &[
    ".article__date", ".view-date", ".detail-date", ".publish-date", ".date", ".time", ".regdate",
];
const DETAIL_CONTENT_SELECTORS: &[&str] = &[
    ".fr-view", ".article__data", ".view-content", ".detail-content", ".content-body",
    ".article-content", ".news-content", ".notice-content", ".content", ".body", ".text",
];

/// One candidate selector for list items and how many matches make it usable.
#[derive(Debug, Clone, Copy)]
pub struct SelectorStrategy {
    pub css: &'static str,
    pub min_matches: usize,
}

const fn specific(css: &'static str) -> SelectorStrategy {
    SelectorStrategy { css, min_matches: 1 }
}

const fn generic(css: &'static str) -> SelectorStrategy {
    SelectorStrategy {
        css,
        min_matches: GENERIC_MIN_MATCHES + 1,
    }
}

const ANNOUNCEMENT_STRATEGIES: &[SelectorStrategy] = &[
    specific(r#"a[href*="Notice/View"]"#),
    generic(r#"a[href*="/View"]"#),
    generic(".board tbody tr"),
    generic("table tr"),
];

const EVENT_STRATEGIES: &[SelectorStrategy] = &[
    specific(r#"a[href*="Event/View"]"#),
    specific(r#"a[href*="/Event/"]"#),
    generic(r#"a[href*="/View"]"#),
    generic(".board tbody tr"),
    generic("table tr"),
];

const UPDATE_STRATEGIES: &[SelectorStrategy] = &[
    specific(r#"a[href*="Update/View"]"#),
    specific(r#"a[href*="/Update/"]"#),
    generic(r#"a[href*="/View"]"#),
    generic(".board tbody tr"),
    generic("table tr"),
];

/// Category-specific link patterns first, then generic board markup.
pub fn list_strategies(category: NewsCategory) -> &'static [SelectorStrategy] {
    match category {
        NewsCategory::Announcement => ANNOUNCEMENT_STRATEGIES,
        NewsCategory::Event => EVENT_STRATEGIES,
        NewsCategory::Update => UPDATE_STRATEGIES,
    }
}

fn list_path(category: NewsCategory) -> &'static str {
    match category {
        NewsCategory::Announcement => "/News/Notice/List",
        NewsCategory::Event => "/News/Event/Now",
        NewsCategory::Update => "/News/Update/List",
    }
}

pub struct LostArkScraper<R = BrowserTransport> {
    renderer: R,
    base_url: String,
}

impl LostArkScraper<BrowserTransport> {
    pub fn new(config: &ScraperConfig) -> Self {
        Self::with_renderer(BrowserTransport::new(config), BASE_URL)
    }
}

impl<R: PageRenderer> LostArkScraper<R> {
    pub fn with_renderer(renderer: R, base_url: &str) -> Self {
        Self {
            renderer,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[cfg(test)]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}

#[async_trait]
impl<R: PageRenderer + 'static> NewsScraper for LostArkScraper<R> {
    fn game(&self) -> GameKind {
        GameKind::LostArk
    }

    #[instrument(level = "info", skip(self), fields(game = "lost_ark"))]
    async fn fetch_list(&self, category: NewsCategory) -> Result<Vec<NewsRecord>> {
        let page_url = format!("{}{}", self.base_url, list_path(category));
        let html = self.renderer.render(&page_url).await?;
        let records = extract_news_list(&html, category, &self.base_url);
        info!(count = records.len(), "fetched Lost Ark list");
        Ok(records)
    }

    #[instrument(level = "info", skip(self), fields(game = "lost_ark"))]
    async fn fetch_detail(&self, url: &str, category: NewsCategory) -> Result<Option<NewsRecord>> {
        let url = normalize_url(url, Some(&self.base_url))?;
        let html = self.renderer.render(&url).await?;
        extract_detail(&html, &url, category)
    }

    async fn open(&self) -> Result<()> {
        self.renderer.open().await
    }

    async fn close(&self) {
        self.renderer.close().await;
    }
}

/// Parse a rendered list page into at most [`MAX_ITEMS`] records.
///
/// Elements that do not yield a title and a resolvable link are skipped.
pub fn extract_news_list(html: &str, category: NewsCategory, base_url: &str) -> Vec<NewsRecord> {
    let document = Html::parse_document(html);
    let candidates = select_candidates(&document, category);

    candidates
        .into_iter()
        .take(MAX_ITEMS)
        .filter_map(|element| match parse_list_item(element, category, base_url) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(error = %e, "skipping Lost Ark list item");
                None
            }
        })
        .collect()
}

/// Parse a rendered article page.
///
/// Returns `Ok(None)` when the page has neither a title nor a body, which is
/// what the site serves for removed articles. A missing title alone falls
/// back to [`NO_TITLE`]; a missing date falls back to now.
pub fn extract_detail(html: &str, url: &str, category: NewsCategory) -> Result<Option<NewsRecord>> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let title = first_text(root, DETAIL_TITLE_SELECTORS);
    let content = first_text(root, DETAIL_CONTENT_SELECTORS);
    if title.is_none() && content.is_none() {
        debug!(%url, "no article on page");
        return Ok(None);
    }
    let title = title.unwrap_or_else(|| NO_TITLE.to_string());
    let (published_at, parsed_date) = page_date(root, DETAIL_DATE_SELECTORS);

    let summary = content.as_deref().map(|body| {
        if body.chars().count() > SUMMARY_CHARS {
            let head: String = body.chars().take(SUMMARY_CHARS).collect();
            format!("{head}...")
        } else {
            body.to_string()
        }
    });

    NewsRecord::from_draft(
        GameKind::LostArk,
        NewsDraft {
            id: generate_news_id(&title, url, parsed_date.then_some(published_at)),
            is_important: title_is_important(&title),
            tags: title_tags(&title),
            title,
            content,
            summary,
            url: url.to_string(),
            published_at,
            category,
            view_count: None,
        },
    )
    .map(Some)
}

fn select_candidates<'a>(document: &'a Html, category: NewsCategory) -> Vec<ElementRef<'a>> {
    for strategy in list_strategies(category) {
        let Ok(selector) = Selector::parse(strategy.css) else {
            continue;
        };
        let matches: Vec<ElementRef<'a>> = document.select(&selector).collect();
        if matches.len() >= strategy.min_matches {
            debug!(selector = strategy.css, matches = matches.len(), "list selector accepted");
            return matches;
        }
    }
    debug!(%category, "no list selector matched");
    Vec::new()
}

fn parse_list_item(element: ElementRef<'_>, category: NewsCategory, base_url: &str) -> Result<NewsRecord> {
    let title = first_text(element, ITEM_TITLE_SELECTORS)
        .or_else(|| {
            element
                .text()
                .map(str::trim)
                .find(|text| !text.is_empty())
                .map(clean_text)
        })
        .ok_or_else(|| NewsError::Validation("list item without title".into()))?;

    let href = link_of(element)
        .ok_or_else(|| NewsError::Validation(format!("list item '{title}' without link")))?;
    let url = normalize_url(href, Some(base_url))?;
    let (published_at, parsed_date) = page_date(element, ITEM_DATE_SELECTORS);

    NewsRecord::from_draft(
        GameKind::LostArk,
        NewsDraft {
            id: generate_news_id(&title, &url, parsed_date.then_some(published_at)),
            is_important: title_is_important(&title),
            tags: title_tags(&title),
            title,
            content: None,
            summary: None,
            url,
            published_at,
            category,
            view_count: None,
        },
    )
}

/// The element's own `href`, else the first descendant link.
fn link_of(element: ElementRef<'_>) -> Option<&str> {
    if let Some(href) = element.value().attr("href") {
        return Some(href);
    }
    let links = Selector::parse("a[href]").ok()?;
    element
        .select(&links)
        .find_map(|link| link.value().attr("href"))
}

/// Cleaned text of the first descendant matching any selector, in order.
fn first_text(scope: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        let found = scope.select(&selector).next()?;
        let text = clean_text(&found.text().collect::<Vec<_>>().join(" "));
        (!text.is_empty()).then_some(text)
    })
}

/// The first parseable date under `scope`, or now. The flag says whether the
/// date came from the page.
fn page_date(scope: ElementRef<'_>, selectors: &[&str]) -> (DateTime<Utc>, bool) {
    selectors
        .iter()
        .filter_map(|css| {
            let selector = Selector::parse(css).ok()?;
            let found = scope.select(&selector).next()?;
            parse_display_date(&found.text().collect::<Vec<_>>().join(" ")).ok()
        })
        .next()
        .map(|dt| (dt, true))
        .unwrap_or_else(|| (Utc::now(), false))
}

fn title_is_important(title: &str) -> bool {
    is_important(
        &ImportanceSignals {
            title,
            ..Default::default()
        },
        IMPORTANT_KEYWORDS,
    )
}

fn title_tags(title: &str) -> Vec<String> {
    let mut tags = extract_tags(title, None::<&str>, TAG_RULES);
    if contains_keyword(title, MAINTENANCE_KEYWORDS) {
        tags.extend(MAINTENANCE_TAGS.iter().map(|tag| tag.to_string()));
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves fixture HTML by URL instead of driving Chrome.
    #[derive(Default)]
    struct FakeRenderer {
        pages: HashMap<String, String>,
        rendered: Mutex<Vec<String>>,
        opened: AtomicUsize,
        closed: AtomicUsize,
    }

    impl FakeRenderer {
        fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
            self.pages.insert(url.to_string(), html.into());
            self
        }
    }

    #[async_trait]
    impl PageRenderer for FakeRenderer {
        async fn render(&self, url: &str) -> Result<String> {
            self.rendered.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| NewsError::Timeout {
                    url: url.to_string(),
                    timeout: std::time::Duration::from_secs(60),
                })
        }

        async fn open(&self) -> Result<()> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    const NOTICE_LIST: &str = r#"
        <html><body>
          <nav><a href="/News/Notice/List">공지사항</a></nav>
          <div class="list">
            <ul>
              <li><a href="/News/Notice/Views/12950">
                <span class="list__category">점검</span>
                <span class="list__title">[점검] 1월 10일(수) 정기 점검 안내</span>
                <div class="list__date">2024.01.09</div>
              </a></li>
              <li><a href="/News/Notice/Views/12949">
                <span class="list__title">신규 클래스 업데이트 안내</span>
                <div class="list__date">2024.01.08 18:30</div>
              </a></li>
              <li><a href="/News/Notice/Views/12948"></a></li>
              <li><a href="/News/Notice/Views/12947">
                <span class="list__title">Guild ranking reset</span>
              </a></li>
              <li><a href="javascript:void(0)/Notice/View">
                <span class="list__title">Broken link</span>
              </a></li>
            </ul>
          </div>
        </body></html>
    "#;

    fn event_list(count: usize) -> String {
        let items: String = (1..=count)
            .map(|n| {
                format!(
                    r#"<li><a href="/News/Event/Views/{n}"><span class="list__title">Event {n}</span><div class="list__date">2024.01.05</div></a></li>"#
                )
            })
            .collect();
        format!("<html><body><ul>{items}</ul></body></html>")
    }

    fn board_rows(count: usize) -> String {
        let rows: String = (1..=count)
            .map(|n| {
                format!(
                    r#"<tr><td class="subject">Patch {n} notes</td><td><a href="/Board/Read?no={n}">read</a></td><td class="date">2024/01/0{n}</td></tr>"#
                )
            })
            .collect();
        format!(r#"<html><body><table class="board"><tbody>{rows}</tbody></table></body></html>"#)
    }

    const DETAIL_PAGE: &str = r#"
        <html><body>
          <div class="article__head">
            <h2 class="article__title">[점검] 1월 10일(수) 정기 점검 안내</h2>
            <div class="article__date">2024.01.09 10:00</div>
          </div>
          <div class="fr-view"><p>BODY</p></div>
        </body></html>
    "#;

    fn scraper(renderer: FakeRenderer) -> LostArkScraper<FakeRenderer> {
        LostArkScraper::with_renderer(renderer, BASE_URL)
    }

    #[tokio::test]
    async fn test_announcements_from_rendered_list() {
        let renderer =
            FakeRenderer::default().with_page(&format!("{BASE_URL}/News/Notice/List"), NOTICE_LIST);
        let scraper = scraper(renderer);

        let records = scraper.list_announcements().await.unwrap();
        assert_eq!(records.len(), 3);

        let maintenance = &records[0];
        assert_eq!(maintenance.id, "12950");
        assert_eq!(maintenance.url, "https://lostark.game.onstove.com/News/Notice/Views/12950");
        assert_eq!(maintenance.title, "[점검] 1월 10일(수) 정기 점검 안내");
        assert!(maintenance.is_important);
        assert!(maintenance.tags.contains("점검"));
        assert!(maintenance.tags.contains("maintenance"));
        // 2024.01.09 00:00 KST
        assert_eq!(
            maintenance.published_at,
            Utc.with_ymd_and_hms(2024, 1, 8, 15, 0, 0).unwrap()
        );

        assert_eq!(
            records[1].published_at,
            Utc.with_ymd_and_hms(2024, 1, 8, 9, 30, 0).unwrap()
        );
        assert!(records[1].tags.contains("업데이트"));

        let undated = &records[2];
        assert_eq!(undated.id, "12947");
        assert!(!undated.is_important);
        assert!(undated.published_at <= Utc::now());
    }

    #[tokio::test]
    async fn test_list_is_capped() {
        let renderer =
            FakeRenderer::default().with_page(&format!("{BASE_URL}/News/Event/Now"), event_list(25));
        let records = scraper(renderer).list_events().await.unwrap();

        assert_eq!(records.len(), MAX_ITEMS);
        assert!(records.iter().all(|r| r.category == NewsCategory::Event));
        assert_eq!(records[0].id, "1");
    }

    #[test]
    fn test_generic_selectors_need_more_than_five_matches() {
        let six = extract_news_list(&board_rows(6), NewsCategory::Update, BASE_URL);
        assert_eq!(six.len(), 6);
        assert_eq!(six[0].id, "1");
        assert_eq!(six[0].title, "Patch 1 notes");
        assert_eq!(six[0].url, "https://lostark.game.onstove.com/Board/Read?no=1");
        assert!(six[0].tags.contains("패치"));

        let three = extract_news_list(&board_rows(3), NewsCategory::Update, BASE_URL);
        assert!(three.is_empty());
    }

    #[tokio::test]
    async fn test_detail_extracts_title_date_and_body() {
        let url = format!("{BASE_URL}/News/Notice/Views/12950");
        let body = "점검 내용 ".repeat(60);
        let html = DETAIL_PAGE.replace("BODY", &body);
        let renderer = FakeRenderer::default().with_page(&url, html);

        let record = scraper(renderer)
            .detail_announcement(&url)
            .await
            .unwrap()
            .expect("article on page");

        assert_eq!(record.id, "12950");
        assert_eq!(record.title, "[점검] 1월 10일(수) 정기 점검 안내");
        assert_eq!(record.published_at, Utc.with_ymd_and_hms(2024, 1, 9, 1, 0, 0).unwrap());
        let content = record.content.as_deref().unwrap();
        assert_eq!(content, body.trim());
        let summary = record.summary.as_deref().unwrap();
        assert!(summary.ends_with("..."));
        assert_eq!(summary.chars().count(), SUMMARY_CHARS + 3);
        assert!(record.tags.contains("maintenance"));
    }

    #[tokio::test]
    async fn test_detail_accepts_relative_urls() {
        let renderer = FakeRenderer::default()
            .with_page(&format!("{BASE_URL}/News/Event/Views/77"), DETAIL_PAGE.replace("BODY", "short"));
        let scraper = scraper(renderer);

        let record = scraper.detail_event("/News/Event/Views/77").await.unwrap().unwrap();
        assert_eq!(record.url, "https://lostark.game.onstove.com/News/Event/Views/77");
        assert_eq!(record.summary.as_deref(), Some("short"));
        assert_eq!(record.category, NewsCategory::Event);
    }

    #[test]
    fn test_detail_placeholder_and_missing_article() {
        let url = "https://lostark.game.onstove.com/News/Update/Views/5";

        let untitled = extract_detail(
            r#"<html><body><div class="fr-view">Body only</div></body></html>"#,
            url,
            NewsCategory::Update,
        )
        .unwrap()
        .unwrap();
        assert_eq!(untitled.title, NO_TITLE);
        assert_eq!(untitled.id, "5");

        let missing = extract_detail(
            "<html><body><p>Not found</p></body></html>",
            url,
            NewsCategory::Update,
        )
        .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_render_failures_propagate_and_close_reaches_renderer() {
        let scraper = scraper(FakeRenderer::default());

        let err = scraper.list_updates().await.unwrap_err();
        assert!(matches!(err, NewsError::Timeout { .. }), "{err:?}");
        assert_eq!(
            scraper.renderer().rendered.lock().unwrap().as_slice(),
            [format!("{BASE_URL}/News/Update/List")]
        );

        scraper.close().await;
        assert_eq!(scraper.renderer().closed.load(Ordering::SeqCst), 1);

        scraper.open().await.unwrap();
        assert_eq!(scraper.renderer().opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_detail_url_is_rejected_before_rendering() {
        let scraper = scraper(FakeRenderer::default());
        let err = scraper.detail_update("ftp://example.com/1").await.unwrap_err();
        assert!(matches!(err, NewsError::InvalidUrl(_)), "{err:?}");
        assert!(scraper.renderer().rendered.lock().unwrap().is_empty());
    }
}
