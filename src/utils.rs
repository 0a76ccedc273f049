//! Pure helpers for timestamps, URLs and text cleanup.
//!
//! Nothing in this module performs I/O. Functions that can fail return
//! [`NewsError::Format`] or [`NewsError::InvalidUrl`] and leave the fallback
//! decision (e.g. "use the current time") to the caller.

use crate::error::{NewsError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use url::Url;

/// Epoch values above this are milliseconds, at or below it seconds.
const MILLIS_THRESHOLD: i64 = 10_000_000_000;

/// Length of the content-hash fallback id.
const HASH_ID_LEN: usize = 12;

/// Offset of the publisher's wall clock used by rendered pages (KST).
const PUBLISHER_OFFSET_SECS: i32 = 9 * 3600;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Ordered article-id patterns; the first match wins.
static ARTICLE_ID_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"/view/(\d+)",
        r"/article/(\d+)",
        r"article_id=(\d+)",
        r"[?&]id=(\d+)",
        r"[?&]no=(\d+)",
        r"/(\d+)/?(?:[?#]|$)",
        r"/(\d+)/",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid article id regex"))
    .collect()
});

static DISPLAY_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(\d{4})\s*[./]\s*(\d{1,2})\s*[./]\s*(\d{1,2})\.?(?:\s+(\d{1,2}):(\d{2})(?::(\d{2}))?)?",
    )
    .expect("valid display date regex")
});

/// A timestamp as it arrives from an upstream, before normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawTimestamp<'a> {
    /// Unix epoch in seconds or milliseconds, disambiguated by magnitude.
    Epoch(i64),
    /// ISO-8601 or a numeric string.
    Text(&'a str),
    /// Already typed; passed through.
    Parsed(DateTime<Utc>),
}

impl From<i64> for RawTimestamp<'_> {
    fn from(value: i64) -> Self {
        RawTimestamp::Epoch(value)
    }
}

impl<'a> From<&'a str> for RawTimestamp<'a> {
    fn from(value: &'a str) -> Self {
        RawTimestamp::Text(value)
    }
}

impl From<DateTime<Utc>> for RawTimestamp<'_> {
    fn from(value: DateTime<Utc>) -> Self {
        RawTimestamp::Parsed(value)
    }
}

/// Normalize an upstream timestamp to UTC.
///
/// Integers above 10^10 are treated as epoch milliseconds, others as epoch
/// seconds. Strings are tried as RFC 3339 (`Z` is UTC), then as naive ISO
/// date-times and dates (assumed UTC), then as a numeric epoch.
///
/// # Errors
///
/// Returns [`NewsError::Format`] when the value cannot be interpreted.
///
/// # Examples
///
/// ```ignore
/// let a = parse_timestamp(1704844800000).unwrap();
/// let b = parse_timestamp(1704844800).unwrap();
/// assert_eq!(a, b);
/// ```
pub fn parse_timestamp<'a>(value: impl Into<RawTimestamp<'a>>) -> Result<DateTime<Utc>> {
    match value.into() {
        RawTimestamp::Parsed(dt) => Ok(dt),
        RawTimestamp::Epoch(n) => from_epoch(n),
        RawTimestamp::Text(text) => parse_text_timestamp(text),
    }
}

/// [`parse_timestamp`] for a JSON field, which may be a number or a string.
pub fn parse_json_timestamp(value: &Value) -> Result<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                from_epoch(i)
            } else if let Some(f) = n.as_f64() {
                from_epoch(f as i64)
            } else {
                Err(NewsError::Format(n.to_string()))
            }
        }
        Value::String(s) => parse_timestamp(s.as_str()),
        other => Err(NewsError::Format(other.to_string())),
    }
}

/// Parse a date shown on a rendered page.
///
/// Anything [`parse_timestamp`] accepts is tried first. Otherwise the text is
/// searched for `YYYY.MM.DD` or `YYYY/MM/DD` with an optional `HH:MM[:SS]`,
/// read as the publisher's local time (UTC+09:00).
pub fn parse_display_date(text: &str) -> Result<DateTime<Utc>> {
    let text = clean_text(text);
    if let Ok(dt) = parse_timestamp(text.as_str()) {
        return Ok(dt);
    }

    let caps = DISPLAY_DATE_RE
        .captures(&text)
        .ok_or_else(|| NewsError::Format(text.clone()))?;
    let num = |i: usize| -> u32 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };

    let year = caps
        .get(1)
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .ok_or_else(|| NewsError::Format(text.clone()))?;
    let date = NaiveDate::from_ymd_opt(year, num(2), num(3))
        .ok_or_else(|| NewsError::Format(text.clone()))?;
    let time = NaiveTime::from_hms_opt(num(4), num(5), num(6))
        .ok_or_else(|| NewsError::Format(text.clone()))?;

    let offset = FixedOffset::east_opt(PUBLISHER_OFFSET_SECS)
        .ok_or_else(|| NewsError::Format(text.clone()))?;
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| NewsError::Format(text))
}

fn from_epoch(n: i64) -> Result<DateTime<Utc>> {
    let parsed = if n > MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(n)
    } else {
        DateTime::from_timestamp(n, 0)
    };
    parsed.ok_or_else(|| NewsError::Format(n.to_string()))
}

fn parse_text_timestamp(text: &str) -> Result<DateTime<Utc>> {
    let trimmed = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return from_epoch(n);
    }

    Err(NewsError::Format(trimmed.to_string()))
}

/// Resolve `url` against `base` when it has no scheme, then require an
/// absolute http(s) URL with a host.
///
/// # Errors
///
/// Returns [`NewsError::InvalidUrl`] for empty, unresolvable or host-less input.
pub fn normalize_url(url: &str, base: Option<&str>) -> Result<String> {
    let url = url.trim();
    if url.is_empty() {
        return Err(NewsError::InvalidUrl(url.to_string()));
    }

    let has_scheme = url.starts_with("http://") || url.starts_with("https://");
    let parsed = match (has_scheme, base) {
        (false, Some(base)) => Url::parse(base)
            .and_then(|b| b.join(url))
            .map_err(|_| NewsError::InvalidUrl(url.to_string()))?,
        _ => Url::parse(url).map_err(|_| NewsError::InvalidUrl(url.to_string()))?,
    };

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(NewsError::InvalidUrl(url.to_string()));
    }
    Ok(parsed.to_string())
}

/// Whether `url` parses as an absolute URL with a host.
pub fn is_valid_url(url: &str) -> bool {
    normalize_url(url, None).is_ok()
}

/// Strip HTML tags, decode the common entities, collapse whitespace and trim.
///
/// Never fails; empty input yields an empty string.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let stripped = TAG_RE.replace_all(text, "");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    WS_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Extract the upstream's native article id from a URL.
///
/// Tries `/view/{n}`, `/article/{n}`, `article_id={n}`, `id={n}`, `no={n}`,
/// a trailing `/{n}` and finally an inner `/{n}/`.
pub fn extract_article_id(url: &str) -> Option<String> {
    ARTICLE_ID_RES
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Stable id for a record: the native article id when the URL carries one,
/// otherwise a truncated SHA-256 of `title|url|timestamp`.
///
/// Pass `None` for `published_at` when the timestamp was a "now" fallback so
/// repeated fetches hash to the same id.
pub fn generate_news_id(title: &str, url: &str, published_at: Option<DateTime<Utc>>) -> String {
    if let Some(id) = extract_article_id(url) {
        return id;
    }
    let stamp = published_at.map(|dt| dt.to_rfc3339()).unwrap_or_default();
    let digest = Sha256::digest(format!("{title}|{url}|{stamp}").as_bytes());
    let hex = format!("{digest:x}");
    hex[..HASH_ID_LEN].to_string()
}

/// Truncate to `max_chars` characters, appending `suffix` when cut.
///
/// Counts characters rather than bytes so Korean titles never split a code point.
pub fn truncate_text(text: &str, max_chars: usize, suffix: &str) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(suffix.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(suffix);
    out
}

/// Truncate a string for logging purposes.
///
/// Long strings keep their first `max` characters followed by `…(+N bytes)`.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Compact view count: `950`, `12.3K`, `1.2M`.
pub fn format_view_count(count: Option<u64>) -> String {
    match count {
        None => "0".to_string(),
        Some(n) if n >= 1_000_000 => format!("{:.1}M", n as f64 / 1_000_000.0),
        Some(n) if n >= 1_000 => format!("{:.1}K", n as f64 / 1_000.0),
        Some(n) => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jan_10() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_timestamp_millis_and_seconds_agree() {
        assert_eq!(parse_timestamp(1_704_844_800_000).unwrap(), jan_10());
        assert_eq!(parse_timestamp(1_704_844_800).unwrap(), jan_10());
    }

    #[test]
    fn test_parse_timestamp_iso_strings() {
        assert_eq!(parse_timestamp("2024-01-10T00:00:00Z").unwrap(), jan_10());
        assert_eq!(parse_timestamp("2024-01-10T09:00:00+09:00").unwrap(), jan_10());
        assert_eq!(parse_timestamp("2024-01-10T00:00:00").unwrap(), jan_10());
        assert_eq!(parse_timestamp("2024-01-10").unwrap(), jan_10());
        assert_eq!(parse_timestamp("1704844800000").unwrap(), jan_10());
    }

    #[test]
    fn test_parse_timestamp_passthrough() {
        assert_eq!(parse_timestamp(jan_10()).unwrap(), jan_10());
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(matches!(parse_timestamp("yesterday"), Err(NewsError::Format(_))));
        assert!(matches!(parse_timestamp(""), Err(NewsError::Format(_))));
    }

    #[test]
    fn test_parse_json_timestamp() {
        assert_eq!(parse_json_timestamp(&json!(1704844800000_i64)).unwrap(), jan_10());
        assert_eq!(parse_json_timestamp(&json!("2024-01-10T00:00:00Z")).unwrap(), jan_10());
        assert!(parse_json_timestamp(&json!(null)).is_err());
    }

    #[test]
    fn test_parse_display_date_is_kst() {
        // 09:00 KST == 00:00 UTC
        assert_eq!(parse_display_date("2024.01.10 09:00").unwrap(), jan_10());
        assert_eq!(parse_display_date("등록일 2024. 1. 10. 09:00").unwrap(), jan_10());
        assert_eq!(
            parse_display_date("2024/01/10").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 9, 15, 0, 0).unwrap()
        );
        assert_eq!(parse_display_date("2024-01-10").unwrap(), jan_10());
        assert!(parse_display_date("상시 진행").is_err());
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("/News/Notice/Views/13046", Some("https://lostark.game.onstove.com")).unwrap(),
            "https://lostark.game.onstove.com/News/Notice/Views/13046"
        );
        assert_eq!(
            normalize_url("https://example.com/a", Some("https://other.com")).unwrap(),
            "https://example.com/a"
        );
        assert!(matches!(normalize_url("", None), Err(NewsError::InvalidUrl(_))));
        assert!(matches!(normalize_url("/relative", None), Err(NewsError::InvalidUrl(_))));
        assert!(matches!(normalize_url("javascript:void(0)", None), Err(NewsError::InvalidUrl(_))));
        assert!(is_valid_url("https://example.com"));
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("<p>Hello</p>\n\n  <b>world</b> "), "Hello world");
        assert_eq!(clean_text("Tom &amp; Jerry&nbsp;show"), "Tom & Jerry show");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_extract_article_id() {
        assert_eq!(
            extract_article_id("https://host/epicseven/global/view/12345").as_deref(),
            Some("12345")
        );
        assert_eq!(
            extract_article_id("https://host/board?article_id=777&page=2").as_deref(),
            Some("777")
        );
        assert_eq!(
            extract_article_id("https://lostark.game.onstove.com/News/Notice/Views/13046?page=1").as_deref(),
            Some("13046")
        );
        assert_eq!(extract_article_id("https://host/news/latest"), None);
    }

    #[test]
    fn test_generate_news_id_falls_back_to_hash() {
        assert_eq!(generate_news_id("t", "https://host/view/42", None), "42");

        let a = generate_news_id("Title", "https://host/news/latest", Some(jan_10()));
        let b = generate_news_id("Title", "https://host/news/latest", Some(jan_10()));
        let c = generate_news_id("Title", "https://host/news/latest", None);
        assert_eq!(a.len(), 12);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_truncate_text_is_char_safe() {
        assert_eq!(truncate_text("점검 안내입니다", 4, "..."), "점...");
        assert_eq!(truncate_text("short", 10, "..."), "short");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_format_view_count() {
        assert_eq!(format_view_count(None), "0");
        assert_eq!(format_view_count(Some(950)), "950");
        assert_eq!(format_view_count(Some(15_000)), "15.0K");
        assert_eq!(format_view_count(Some(2_500_000)), "2.5M");
    }
}
