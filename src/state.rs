use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::filter::{FilterAction, FilterState};
use crate::model::{Article, Source};

/// How long an error notification stays visible.
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(5);

/// Everything the last successful loads produced.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub articles: Vec<Article>,
    pub sources: Vec<Source>,
    pub last_update: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    raised_at: Instant,
}

impl Notification {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            raised_at: Instant::now(),
        }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.raised_at) >= NOTIFICATION_TTL
    }

    /// Milliseconds left before the notification expires.
    pub fn remaining_ms(&self, now: Instant) -> u64 {
        NOTIFICATION_TTL
            .saturating_sub(now.saturating_duration_since(self.raised_at))
            .as_millis() as u64
    }
}

/// Process-wide view state shared between the loader and the handlers.
#[derive(Debug, Default)]
pub struct FeedStore {
    snapshot: RwLock<FeedSnapshot>,
    filters: RwLock<FilterState>,
    notification: RwLock<Option<Notification>>,
    // Bumped after every applied load, failed or not
    generation: RwLock<u64>,
}

impl FeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> FeedSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn replace_articles(&self, articles: Vec<Article>, last_update: String) {
        let mut snapshot = self.snapshot.write().await;
        snapshot.articles = articles;
        snapshot.last_update = Some(last_update);
    }

    pub async fn replace_sources(&self, sources: Vec<Source>) {
        self.snapshot.write().await.sources = sources;
    }

    pub async fn set_last_update(&self, last_update: String) {
        self.snapshot.write().await.last_update = Some(last_update);
    }

    pub async fn finish_load(&self) -> u64 {
        let mut generation = self.generation.write().await;
        *generation += 1;
        *generation
    }

    /// Number of loads applied so far.
    pub async fn generation(&self) -> u64 {
        *self.generation.read().await
    }

    pub async fn filters(&self) -> FilterState {
        self.filters.read().await.clone()
    }

    pub async fn dispatch(&self, action: FilterAction) -> FilterState {
        let mut filters = self.filters.write().await;
        *filters = filters.clone().reduce(action);
        filters.clone()
    }

    pub async fn raise(&self, message: impl Into<String>) {
        *self.notification.write().await = Some(Notification::new(message));
    }

    pub async fn dismiss(&self) {
        *self.notification.write().await = None;
    }

    /// The current notification, unless it has expired.
    pub async fn notification(&self) -> Option<Notification> {
        let now = Instant::now();
        let mut slot = self.notification.write().await;
        if slot.as_ref().is_some_and(|n| n.is_expired_at(now)) {
            *slot = None;
        }
        slot.clone()
    }
}

/// Fallback last-update value when the payload carries none.
pub fn now_rfc3339() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.to_rfc3339()
}
