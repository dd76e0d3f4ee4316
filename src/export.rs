use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::filter::FilterState;
use crate::model::Article;

/// Downloadable snapshot of the currently displayed articles.
#[derive(Debug, Serialize)]
pub struct ExportDocument<'a> {
    pub exported_at: String,
    pub filters: &'a FilterState,
    pub articles: &'a [Article],
}

impl<'a> ExportDocument<'a> {
    pub fn new(filters: &'a FilterState, articles: &'a [Article], exported_at: DateTime<Utc>) -> Self {
        Self {
            exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            filters,
            articles,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// `{prefix}-export-{YYYY-MM-DD}.json`
pub fn export_file_name(prefix: &str, exported_at: DateTime<Utc>) -> String {
    format!("{}-export-{}.json", prefix, exported_at.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{filter_articles, FilterAction, TimeWindow};
    use crate::model::{validate_entries, RawArticle};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn exported_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 9, 23, 30, 0).unwrap()
    }

    fn articles() -> Vec<Article> {
        let now = exported_at();
        let entries = vec![
            json!({
                "source": "BusinessDay", "category": "business", "title": "Naira rallies",
                "url": "https://a.com/1", "published_at": (now - Duration::hours(1)).to_rfc3339(),
                "summary": "FX market", "keywords": ["fx"], "sentiment": "positive"
            }),
            json!({
                "source": "BusinessDay", "category": "business", "title": "Old naira story",
                "url": "https://a.com/2", "published_at": (now - Duration::days(30)).to_rfc3339()
            }),
            json!({
                "source": "The Cable", "category": "general", "title": "Budget",
                "url": "https://b.com/1", "timestamp": (now - Duration::hours(2)).to_rfc3339(),
                "content": "naira appears only in content"
            }),
        ];
        validate_entries::<RawArticle, Article>(entries, "article").0
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            export_file_name("news", exported_at()),
            "news-export-2024-12-09.json"
        );
    }

    #[test]
    fn test_document_shape() {
        let filters = FilterState::default();
        let articles = articles();
        let doc = ExportDocument::new(&filters, &articles, exported_at());

        let value: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(value["exported_at"], "2024-12-09T23:30:00.000Z");
        assert_eq!(
            value["filters"],
            json!({ "source": "all", "category": "all", "time": "all", "search": "" })
        );
        assert_eq!(value["articles"].as_array().unwrap().len(), 3);
        assert_eq!(value["articles"][0]["sentiment"], "positive");
    }

    #[test]
    fn test_export_refilters_to_displayed_set() {
        let now = exported_at();
        let filters = FilterState::default()
            .reduce(FilterAction::SetTime(TimeWindow::Week))
            .reduce(FilterAction::SetSearch("NAIRA".into()));
        let displayed = filter_articles(&articles(), &filters, &now);
        assert_eq!(displayed.len(), 2);

        let json = ExportDocument::new(&filters, &displayed, now).to_json().unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let exported_filters: FilterState = serde_json::from_value(value["filters"].clone()).unwrap();
        let entries = value["articles"].as_array().unwrap().clone();
        let (reloaded, rejected) = validate_entries::<RawArticle, Article>(entries, "article");
        assert_eq!(rejected, 0);

        assert_eq!(exported_filters, filters);
        assert_eq!(filter_articles(&reloaded, &exported_filters, &now), displayed);
    }
}
