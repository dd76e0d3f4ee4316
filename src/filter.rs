//! Filter state, its reducer, and the filter pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Months, TimeZone};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Article;

/// Sentinel value meaning "do not filter on this field".
pub const ALL: &str = "all";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("unknown filter field '{0}'")]
    UnknownField(String),

    #[error("unknown time window '{0}'")]
    UnknownTimeWindow(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    #[default]
    All,
    Today,
    Week,
    Month,
}

impl TimeWindow {
    pub const VARIANTS: [TimeWindow; 4] = [
        TimeWindow::All,
        TimeWindow::Today,
        TimeWindow::Week,
        TimeWindow::Month,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::All => "all",
            TimeWindow::Today => "today",
            TimeWindow::Week => "week",
            TimeWindow::Month => "month",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeWindow::All => "All Time",
            TimeWindow::Today => "Today",
            TimeWindow::Week => "This Week",
            TimeWindow::Month => "This Month",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "all" => Ok(TimeWindow::All),
            "today" => Ok(TimeWindow::Today),
            "week" => Ok(TimeWindow::Week),
            "month" => Ok(TimeWindow::Month),
            other => Err(FilterError::UnknownTimeWindow(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub source: String,
    pub category: String,
    pub time: TimeWindow,
    pub search: String,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            source: ALL.to_string(),
            category: ALL.to_string(),
            time: TimeWindow::All,
            search: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterAction {
    SetSource(String),
    SetCategory(String),
    SetTime(TimeWindow),
    SetSearch(String),
    Reset,
}

/// A single filter change as submitted by the page.
#[derive(Debug, Deserialize)]
pub struct FilterForm {
    pub field: String,
    #[serde(default)]
    pub value: String,
}

impl TryFrom<FilterForm> for FilterAction {
    type Error = FilterError;

    fn try_from(form: FilterForm) -> Result<Self, Self::Error> {
        match form.field.as_str() {
            "source" => Ok(FilterAction::SetSource(form.value)),
            "category" => Ok(FilterAction::SetCategory(form.value)),
            "time" => Ok(FilterAction::SetTime(form.value.parse()?)),
            "search" => Ok(FilterAction::SetSearch(form.value)),
            "reset" => Ok(FilterAction::Reset),
            other => Err(FilterError::UnknownField(other.to_string())),
        }
    }
}

impl FilterState {
    pub fn reduce(self, action: FilterAction) -> Self {
        match action {
            FilterAction::SetSource(source) => Self {
                source: or_all(source),
                ..self
            },
            FilterAction::SetCategory(category) => Self {
                category: or_all(category),
                ..self
            },
            FilterAction::SetTime(time) => Self { time, ..self },
            FilterAction::SetSearch(search) => Self { search, ..self },
            FilterAction::Reset => Self::default(),
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

fn or_all(value: String) -> String {
    if value.is_empty() {
        ALL.to_string()
    } else {
        value
    }
}

fn is_wildcard(value: &str) -> bool {
    value.is_empty() || value == ALL
}

/// Run the filter pipeline over `articles`, newest first.
///
/// Time windows are evaluated in the timezone of `now`.
pub fn filter_articles<Tz: TimeZone>(
    articles: &[Article],
    filters: &FilterState,
    now: &DateTime<Tz>,
) -> Vec<Article> {
    let search = filters.search.trim().to_lowercase();

    let mut filtered: Vec<Article> = articles
        .iter()
        .filter(|a| is_wildcard(&filters.source) || a.source == filters.source)
        .filter(|a| is_wildcard(&filters.category) || a.category == filters.category)
        .filter(|a| in_time_window(a, filters.time, now))
        .filter(|a| search.is_empty() || matches_search(a, &search))
        .cloned()
        .collect();

    // None sorts below any Some, so reversing the comparison puts undated articles last
    filtered.sort_by(|a, b| b.effective_at().cmp(&a.effective_at()));
    filtered
}

fn in_time_window<Tz: TimeZone>(article: &Article, window: TimeWindow, now: &DateTime<Tz>) -> bool {
    if window == TimeWindow::All {
        return true;
    }
    let Some(at) = article.effective_at() else {
        return false;
    };
    let at = at.with_timezone(&now.timezone());

    match window {
        TimeWindow::All => true,
        TimeWindow::Today => at.date_naive() == now.date_naive(),
        TimeWindow::Week => at >= now.clone() - Duration::days(7),
        TimeWindow::Month => match now.clone().checked_sub_months(Months::new(1)) {
            Some(month_ago) => at >= month_ago,
            None => true,
        },
    }
}

fn matches_search(article: &Article, term: &str) -> bool {
    let contains = |text: &str| text.to_lowercase().contains(term);

    contains(&article.title)
        || article.summary.as_deref().is_some_and(contains)
        || article.content.as_deref().is_some_and(contains)
}

/// True when the effective time falls on the same calendar day as `now`.
pub fn is_same_day<Tz: TimeZone>(article: &Article, now: &DateTime<Tz>) -> bool {
    in_time_window(article, TimeWindow::Today, now)
}
