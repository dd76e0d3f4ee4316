use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use url::Url;

use crate::config::Config;
use crate::model::{validate_entries, Article, RawArticle, RawSource, Source};
use crate::state::{now_rfc3339, FeedStore};

pub const NEWS_RESOURCE: &str = "news.json";
pub const SOURCES_RESOURCE: &str = "sources.json";
pub const UPDATE_RESOURCE: &str = "update.txt";

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load news data. Please try again.";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Deserialize)]
struct NewsDocument {
    #[serde(default)]
    articles: Vec<serde_json::Value>,
    last_updated: Option<String>,
}

#[derive(Deserialize)]
struct SourcesDocument {
    #[serde(default)]
    sources: Vec<serde_json::Value>,
}

#[derive(Debug)]
pub struct NewsPayload {
    pub articles: Vec<Article>,
    pub last_updated: Option<String>,
    pub rejected: usize,
}

/// Result of one settle-all load; each resource succeeds or fails on its own.
#[derive(Debug)]
pub struct LoadOutcome {
    pub news: Result<NewsPayload, FetchError>,
    pub sources: Result<Vec<Source>, FetchError>,
    pub update: Result<String, FetchError>,
}

impl LoadOutcome {
    pub fn is_total_failure(&self) -> bool {
        self.news.is_err() && self.sources.is_err() && self.update.is_err()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub news_loaded: bool,
    pub sources_loaded: bool,
    pub update_loaded: bool,
    pub rejected_entries: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Another refresh was already in flight.
    Skipped,
    Applied(LoadReport),
}

pub struct Fetcher {
    client: Client,
    base: Url,
    store: Arc<FeedStore>,
    refreshing: Arc<RwLock<bool>>,
}

impl Fetcher {
    pub fn new(config: &Config, store: Arc<FeedStore>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .user_agent("Newsdesk/1.0 (News Viewer)")
            .build()?;

        Ok(Self {
            client,
            base: config.api_base_url()?,
            store,
            refreshing: Arc::new(RwLock::new(false)),
        })
    }

    pub async fn is_refreshing(&self) -> bool {
        *self.refreshing.read().await
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        // Check if already refreshing
        {
            let mut refreshing = self.refreshing.write().await;
            if *refreshing {
                info!("Refresh already in progress, skipping");
                return RefreshOutcome::Skipped;
            }
            *refreshing = true;
        }

        let outcome = self.load().await;
        let report = self.apply(outcome).await;

        // Clear refreshing flag
        {
            let mut refreshing = self.refreshing.write().await;
            *refreshing = false;
        }

        RefreshOutcome::Applied(report)
    }

    /// Fetch all three resources concurrently, waiting for every one of them.
    pub async fn load(&self) -> LoadOutcome {
        let (news, sources, update) = tokio::join!(
            self.fetch_news(),
            self.fetch_sources(),
            self.fetch_update()
        );

        LoadOutcome {
            news,
            sources,
            update,
        }
    }

    /// Write the successful parts of `outcome` into the store.
    pub async fn apply(&self, outcome: LoadOutcome) -> LoadReport {
        let total_failure = outcome.is_total_failure();
        let mut report = LoadReport {
            news_loaded: false,
            sources_loaded: false,
            update_loaded: false,
            rejected_entries: 0,
        };

        match outcome.news {
            Ok(payload) => {
                info!(
                    "Loaded {} articles ({} rejected)",
                    payload.articles.len(),
                    payload.rejected
                );
                let last_update = payload.last_updated.unwrap_or_else(now_rfc3339);
                self.store.replace_articles(payload.articles, last_update).await;
                report.news_loaded = true;
                report.rejected_entries += payload.rejected;
            }
            Err(e) => warn!("Failed to load {}: {}", NEWS_RESOURCE, e),
        }

        match outcome.sources {
            Ok(sources) => {
                info!("Loaded {} sources", sources.len());
                self.store.replace_sources(sources).await;
                report.sources_loaded = true;
            }
            Err(e) => warn!("Failed to load {}: {}", SOURCES_RESOURCE, e),
        }

        match outcome.update {
            Ok(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    self.store.set_last_update(text.to_string()).await;
                }
                report.update_loaded = true;
            }
            Err(e) => warn!("Failed to load {}: {}", UPDATE_RESOURCE, e),
        }

        if total_failure {
            error!("All resources failed to load; keeping previous data");
            self.store.raise(LOAD_FAILED_MESSAGE).await;
        }
        self.store.finish_load().await;

        report
    }

    async fn fetch_news(&self) -> Result<NewsPayload, FetchError> {
        let body = self.fetch_text(NEWS_RESOURCE).await?;
        let document: NewsDocument = serde_json::from_str(&body)?;
        let (articles, rejected) =
            validate_entries::<RawArticle, Article>(document.articles, "article");

        Ok(NewsPayload {
            articles,
            last_updated: document.last_updated.filter(|s| !s.trim().is_empty()),
            rejected,
        })
    }

    async fn fetch_sources(&self) -> Result<Vec<Source>, FetchError> {
        let body = self.fetch_text(SOURCES_RESOURCE).await?;
        let document: SourcesDocument = serde_json::from_str(&body)?;
        let (sources, _) = validate_entries::<RawSource, Source>(document.sources, "source");
        Ok(sources)
    }

    async fn fetch_update(&self) -> Result<String, FetchError> {
        self.fetch_text(UPDATE_RESOURCE).await
    }

    async fn fetch_text(&self, resource: &str) -> Result<String, FetchError> {
        let url = self.resource_url(resource)?;
        info!("Fetching {}", url);

        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    /// Endpoint URL with a cache-busting `t` parameter.
    pub fn resource_url(&self, resource: &str) -> Result<Url, FetchError> {
        let mut url = self.base.join(resource)?;
        url.query_pairs_mut()
            .append_pair("t", &Utc::now().timestamp_millis().to_string());
        Ok(url)
    }
}

pub async fn start_background_refresh(fetcher: Arc<Fetcher>, interval_minutes: u64) {
    let interval = Duration::from_secs(interval_minutes * 60);

    // Do initial fetch
    info!("Starting initial news load");
    fetcher.refresh().await;

    // Then schedule periodic refreshes
    loop {
        tokio::time::sleep(interval).await;
        info!("Starting scheduled news refresh");
        fetcher.refresh().await;
    }
}
