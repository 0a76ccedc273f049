//! Keyword heuristics for importance, tags and title decoration.
//!
//! Upstreams do not say which posts matter, so importance is inferred:
//! a record is important when its title contains one of a fixed list of
//! keywords, when the upstream pinned it, or when its view count exceeds
//! [`VIEW_COUNT_THRESHOLD`]. Matching is case-insensitive substring search,
//! which works for both the Korean and English forms of a keyword.
//!
//! Keyword lists and tag rules belong to each scraper; nothing here is
//! source-specific.

use crate::models::NewsCategory;
use once_cell::sync::Lazy;
use regex::Regex;

/// Views above this mark a record important regardless of title.
pub const VIEW_COUNT_THRESHOLD: i64 = 10_000;

static BRACKET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]").expect("valid bracket regex"));

/// A tag and the title keywords that imply it.
#[derive(Debug, Clone, Copy)]
pub struct TagRule {
    pub tag: &'static str,
    pub keywords: &'static [&'static str],
}

/// Everything that can make a record important.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportanceSignals<'a> {
    pub title: &'a str,
    /// Extra upstream text matched like the title (e.g. a headline label).
    pub secondary_text: Option<&'a str>,
    /// Upstream pinned/headline/fixed flag.
    pub pinned: bool,
    pub view_count: Option<i64>,
}

/// Whether any keyword occurs in `text`, ignoring case.
pub fn contains_keyword(text: &str, keywords: &[&str]) -> bool {
    let lowered = text.to_lowercase();
    keywords
        .iter()
        .any(|keyword| lowered.contains(&keyword.to_lowercase()))
}

/// Keyword match, OR pinned, OR views above [`VIEW_COUNT_THRESHOLD`].
pub fn is_important(signals: &ImportanceSignals<'_>, keywords: &[&str]) -> bool {
    contains_keyword(signals.title, keywords)
        || signals
            .secondary_text
            .is_some_and(|text| contains_keyword(text, keywords))
        || signals.pinned
        || signals
            .view_count
            .is_some_and(|views| views > VIEW_COUNT_THRESHOLD)
}

/// The `[...]` segments of a title, e.g. `"[공지] [점검] Server"` → `["공지", "점검"]`.
pub fn bracket_tags(title: &str) -> Vec<String> {
    BRACKET_RE
        .captures_iter(title)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Tags whose keywords occur in the title.
pub fn keyword_tags(title: &str, rules: &[TagRule]) -> Vec<String> {
    rules
        .iter()
        .filter(|rule| contains_keyword(title, rule.keywords))
        .map(|rule| rule.tag.to_string())
        .collect()
}

/// Union of bracket prefixes, upstream labels and keyword tags.
///
/// Order and duplicates do not matter here; records store tags as a set.
pub fn extract_tags<'a>(
    title: &str,
    upstream_labels: impl IntoIterator<Item = &'a str>,
    rules: &[TagRule],
) -> Vec<String> {
    let mut tags = bracket_tags(title);
    tags.extend(
        upstream_labels
            .into_iter()
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string),
    );
    tags.extend(keyword_tags(title, rules));
    tags
}

/// Prefix decorative markers: `📌` when important, `🔥` at or above the view
/// threshold, and the category marker outermost.
///
/// `"Patch notes"` for an important, popular update becomes
/// `"🔄 🔥 📌 Patch notes"`.
pub fn decorate_title(
    title: &str,
    category: NewsCategory,
    is_important: bool,
    view_count: Option<i64>,
) -> String {
    let mut decorated = title.to_string();
    if is_important {
        decorated = format!("📌 {decorated}");
    }
    if view_count.is_some_and(|views| views >= VIEW_COUNT_THRESHOLD) {
        decorated = format!("🔥 {decorated}");
    }
    format!("{} {decorated}", category.marker())
}
