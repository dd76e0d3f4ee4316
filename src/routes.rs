use std::sync::Arc;
use std::time::Instant;

use askama::Template;
use axum::{
    extract::{Form, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, Utc};
use serde::Deserialize;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;

use crate::config::Config;
use crate::db::{Database, StoreError};
use crate::export::{export_file_name, ExportDocument};
use crate::fetcher::Fetcher;
use crate::filter::{filter_articles, FilterAction, FilterForm};
use crate::render::{
    category_options, source_options, time_options, ArticleCard, SelectOption, SourceCard, Stats,
};
use crate::state::FeedStore;

/// How often an open page asks whether a newer load has been applied.
/// Must stay below `NOTIFICATION_TTL`.
pub const LOAD_WATCH_SECS: u64 = 2;

pub struct AppState {
    pub config: Config,
    pub db: Arc<Database>,
    pub fetcher: Arc<Fetcher>,
    pub store: Arc<FeedStore>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/articles", get(articles))
        .route("/filters", post(update_filters))
        .route("/refresh", post(refresh))
        .route("/refresh/status", get(refresh_status))
        .route("/bookmarks", get(list_bookmarks).post(add_bookmark))
        .route("/export", get(export))
        .route("/notification/dismiss", post(dismiss_notification))
        .route("/health", get(health))
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub stats: Stats,
    pub source_options: Vec<SelectOption>,
    pub category_options: Vec<SelectOption>,
    pub time_options: Vec<SelectOption>,
    pub search: String,
    pub sources: Vec<SourceCard>,
    pub cards: Vec<ArticleCard>,
    pub notification: Option<NotificationView>,
    pub refreshing: bool,
    pub generation: u64,
    pub watch_secs: u64,
    pub pull_threshold: u32,
}

#[derive(Template)]
#[template(path = "articles.html")]
pub struct ArticlesTemplate {
    pub cards: Vec<ArticleCard>,
}

#[derive(Template)]
#[template(path = "refresh_status.html")]
pub struct RefreshStatusTemplate {
    pub refreshing: bool,
}

#[derive(Template)]
#[template(path = "bookmark_result.html")]
pub struct BookmarkResultTemplate {
    pub message: String,
}

pub struct NotificationView {
    pub message: String,
    pub remaining_ms: u64,
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

// Custom error type
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    fn bad_request(err: impl Into<anyhow::Error>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: err.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, format!("Error: {}", self.error)).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: err.into(),
        }
    }
}

async fn current_cards(store: &FeedStore) -> Vec<ArticleCard> {
    let snapshot = store.snapshot().await;
    let filters = store.filters().await;
    let now = Local::now();

    filter_articles(&snapshot.articles, &filters, &now)
        .iter()
        .map(|a| ArticleCard::from_article(a, &now))
        .collect()
}

// Route handlers
pub async fn index(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    // Read before the snapshot so a load landing in between still triggers a reload
    let generation = state.store.generation().await;
    let snapshot = state.store.snapshot().await;
    let filters = state.store.filters().await;
    let now = Local::now();

    let notification = state.store.notification().await.map(|n| NotificationView {
        remaining_ms: n.remaining_ms(Instant::now()),
        message: n.message,
    });
    let refreshing = state.fetcher.is_refreshing().await;

    Ok(HtmlTemplate(IndexTemplate {
        stats: Stats::compute(
            &snapshot.articles,
            &snapshot.sources,
            snapshot.last_update.as_deref(),
            &now,
        ),
        source_options: source_options(&snapshot.sources, &filters),
        category_options: category_options(&snapshot.sources, &snapshot.articles, &filters),
        time_options: time_options(&filters),
        search: filters.search.clone(),
        sources: snapshot.sources.iter().map(SourceCard::from).collect(),
        cards: current_cards(&state.store).await,
        notification,
        refreshing,
        generation,
        watch_secs: LOAD_WATCH_SECS,
        pull_threshold: state.config.pull_refresh_threshold,
    }))
}

pub async fn articles(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    Ok(HtmlTemplate(ArticlesTemplate {
        cards: current_cards(&state.store).await,
    }))
}

pub async fn update_filters(
    State(state): State<Arc<AppState>>,
    Form(form): Form<FilterForm>,
) -> Result<impl IntoResponse, AppError> {
    let action = FilterAction::try_from(form).map_err(AppError::bad_request)?;
    let filters = state.store.dispatch(action).await;
    info!(
        "Filters now source={} category={} time={} search={:?}",
        filters.source, filters.category, filters.time, filters.search
    );

    Ok(HtmlTemplate(ArticlesTemplate {
        cards: current_cards(&state.store).await,
    }))
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    // Spawn the refresh task
    let fetcher = state.fetcher.clone();
    tokio::spawn(async move {
        fetcher.refresh().await;
    });

    // Return refreshing state immediately
    Ok(HtmlTemplate(RefreshStatusTemplate { refreshing: true }))
}

#[derive(Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub polling: bool,
    /// Load generation the page was rendered from.
    pub since: Option<u64>,
}

pub async fn refresh_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Result<Response, AppError> {
    let refreshing = state.fetcher.is_refreshing().await;
    let template = HtmlTemplate(RefreshStatusTemplate { refreshing });

    let stale = match query.since {
        Some(since) => state.store.generation().await != since,
        None => false,
    };

    // A load finished since the page rendered: reload so every area picks it up
    if !refreshing && (query.polling || stale) {
        return Ok(([("HX-Refresh", "true")], template).into_response());
    }
    Ok(template.into_response())
}

#[derive(Deserialize)]
pub struct BookmarkForm {
    #[serde(default)]
    pub url: String,
}

pub async fn add_bookmark(
    State(state): State<Arc<AppState>>,
    Form(form): Form<BookmarkForm>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .db
        .bookmark_article(&form.url)
        .await
        .map_err(|e| match e {
            StoreError::EmptyUrl => AppError::bad_request(e),
            other => AppError::from(other),
        })?;

    Ok(HtmlTemplate(BookmarkResultTemplate {
        message: outcome.message().to_string(),
    }))
}

pub async fn list_bookmarks(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.db.bookmarks().await?))
}

pub async fn export(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let snapshot = state.store.snapshot().await;
    let filters = state.store.filters().await;
    let displayed = filter_articles(&snapshot.articles, &filters, &Local::now());

    let exported_at = Utc::now();
    let body = ExportDocument::new(&filters, &displayed, exported_at).to_json()?;
    let file_name = export_file_name(&state.config.export_prefix, exported_at);
    info!("Exporting {} articles as {}", displayed.len(), file_name);

    Ok((
        [
            (header::CONTENT_TYPE, "application/json; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    ))
}

pub async fn dismiss_notification(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.store.dismiss().await;
    Html("")
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
