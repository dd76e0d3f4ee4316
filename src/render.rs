//! View models for the page templates.
//!
//! Everything here is presentational: truncation, relative times, counts and
//! dropdown options, computed from the snapshot and the filter state.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Utc};

use crate::filter::{is_same_day, FilterState, TimeWindow, ALL};
use crate::model::{parse_timestamp, Article, Source};

pub const TITLE_MAX_CHARS: usize = 80;
pub const SUMMARY_MAX_CHARS: usize = 150;
pub const MAX_KEYWORDS: usize = 3;
const DEFAULT_SOURCE_ICON: &str = "newspaper";

pub struct ArticleCard {
    pub source: String,
    pub category: String,
    pub title: String,
    pub short_title: String,
    pub url: String,
    pub relative_time: String,
    pub sentiment: String,
    pub summary: String,
    pub keywords: Vec<String>,
}

impl ArticleCard {
    pub fn from_article<Tz: TimeZone>(article: &Article, now: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            source: article.source.clone(),
            category: article.category.clone(),
            title: article.title.clone(),
            short_title: truncate_text(&article.title, TITLE_MAX_CHARS),
            url: article.url.clone(),
            relative_time: article
                .effective_at()
                .map(|at| format_relative_time(at, now))
                .unwrap_or_else(|| "unknown".to_string()),
            sentiment: article
                .sentiment
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            summary: truncate_text(article.summary_text(), SUMMARY_MAX_CHARS),
            keywords: article.keywords.iter().take(MAX_KEYWORDS).cloned().collect(),
        }
    }
}

pub struct SourceCard {
    pub name: String,
    pub icon: String,
    pub category: String,
    pub kind: String,
    pub description: String,
}

impl From<&Source> for SourceCard {
    fn from(source: &Source) -> Self {
        Self {
            name: source.name.clone(),
            icon: source
                .icon
                .clone()
                .unwrap_or_else(|| DEFAULT_SOURCE_ICON.to_string()),
            category: source.category.clone(),
            kind: source.kind.clone(),
            description: source.description.clone().unwrap_or_default(),
        }
    }
}

pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    fn new(value: &str, label: &str, current: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
            selected: value == current,
        }
    }
}

pub struct Stats {
    pub total_articles: String,
    pub total_sources: usize,
    pub today_articles: usize,
    pub last_update_time: String,
    pub updated_label: String,
}

impl Stats {
    pub fn compute<Tz: TimeZone>(
        articles: &[Article],
        sources: &[Source],
        last_update: Option<&str>,
        now: &DateTime<Tz>,
    ) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let parsed = last_update.and_then(parse_timestamp);

        Self {
            total_articles: format_count(articles.len()),
            total_sources: sources.len(),
            today_articles: articles.iter().filter(|a| is_same_day(a, now)).count(),
            last_update_time: format_time(parsed, now),
            updated_label: parsed
                .map(|at| format!("Updated {}", format_relative_time(at, now)))
                .unwrap_or_default(),
        }
    }
}

/// Cut `text` to `max_chars` characters, appending `...` when shortened.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}...", &text[..cut]),
    }
}

pub fn format_relative_time<Tz: TimeZone>(at: DateTime<Utc>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let elapsed = now.with_timezone(&Utc) - at;
    let minutes = elapsed.num_minutes().max(0);
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 60 {
        format!("{}m ago", minutes)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else if days < 7 {
        format!("{}d ago", days)
    } else {
        at.with_timezone(&now.timezone())
            .format("%-m/%-d/%Y")
            .to_string()
    }
}

/// `HH:MM` in the timezone of `now`, or `--:--` when unknown.
pub fn format_time<Tz: TimeZone>(at: Option<DateTime<Utc>>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match at {
        Some(at) => at.with_timezone(&now.timezone()).format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

/// Thousands-separated count, e.g. `12,345`.
pub fn format_count(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn source_options(sources: &[Source], filters: &FilterState) -> Vec<SelectOption> {
    let names: BTreeSet<&str> = sources.iter().map(|s| s.name.as_str()).collect();
    with_all_option(names, "All Sources", &filters.source)
}

pub fn category_options(
    sources: &[Source],
    articles: &[Article],
    filters: &FilterState,
) -> Vec<SelectOption> {
    let categories: BTreeSet<&str> = sources
        .iter()
        .map(|s| s.category.as_str())
        .chain(articles.iter().map(|a| a.category.as_str()))
        .filter(|c| !c.is_empty())
        .collect();
    with_all_option(categories, "All Categories", &filters.category)
}

pub fn time_options(filters: &FilterState) -> Vec<SelectOption> {
    TimeWindow::VARIANTS
        .iter()
        .map(|w| SelectOption::new(w.as_str(), w.label(), filters.time.as_str()))
        .collect()
}

fn with_all_option(values: BTreeSet<&str>, all_label: &str, current: &str) -> Vec<SelectOption> {
    let current = if current.is_empty() { ALL } else { current };
    std::iter::once(SelectOption::new(ALL, all_label, current))
        .chain(values.into_iter().map(|v| SelectOption::new(v, v, current)))
        .collect()
}
