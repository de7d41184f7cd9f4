use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::article::ArticleExtractor;
use crate::cache::{page_slice, NewsCache};
use crate::config::Config;
use crate::error::{ArticleError, ValidationError};
use crate::fetcher::Fetcher;
use crate::model::CategorizedItem;
use crate::pipeline::AggregationPolicy;
use crate::registry::{check_http_url, FeedsByCategory, Registry, RegistryError, SiteTexts};
use crate::scheduler::{RefreshOutcome, RefreshScheduler};
use crate::trending::{ClickEvent, ClickTracker};

const DEFAULT_PAGE_SIZE: usize = 20;

pub struct AppState {
    pub cache: Arc<NewsCache>,
    pub registry: Arc<Registry>,
    pub scheduler: Arc<RefreshScheduler>,
    pub articles: ArticleExtractor,
    pub clicks: ClickTracker,
    pub trending_limit: usize,
}

impl AppState {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let fetcher = Arc::new(Fetcher::new(
            Duration::from_secs(config.fetch_timeout_secs),
            &config.user_agent,
        )?);
        let registry = Arc::new(Registry::from_config(config));
        let cache = Arc::new(NewsCache::new());
        let scheduler = Arc::new(RefreshScheduler::new(
            fetcher.clone(),
            registry.clone(),
            cache.clone(),
        ));

        Ok(Self {
            cache,
            registry,
            scheduler,
            articles: ArticleExtractor::new(fetcher, config.article_min_length),
            clicks: ClickTracker::new(),
            trending_limit: config.trending_limit,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/news/all", get(all_news))
        .route("/news/category/:category", get(category_news))
        .route("/news/bydate", get(news_by_date))
        .route("/news/full", get(full_article))
        .route("/news/search", get(search_news))
        .route("/news/trending", get(trending_news))
        .route("/news/track-click", post(track_click))
        .route("/news/site-config", get(site_texts))
        .route("/admin/rss-feeds", get(list_feeds))
        .route("/admin/rss-feeds/add", post(add_feed))
        .route("/admin/rss-feeds/remove", post(remove_feed))
        .route("/admin/site-texts", get(site_texts).post(update_site_texts))
        .route("/admin/refresh", post(refresh))
        .route("/admin/refresh/status", get(refresh_status))
        .route("/health", get(health))
        .with_state(state)
}

// Custom error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::BadRequest(m) | AppError::NotFound(m) | AppError::Internal(m) => m,
        };

        if status.is_server_error() {
            error!(status = status.as_u16(), %message, "Request failed");
        } else {
            warn!(status = status.as_u16(), %message, "Request rejected");
        }

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<QueryRejection> for AppError {
    fn from(err: QueryRejection) -> Self {
        AppError::BadRequest(err.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        AppError::BadRequest(err.body_text())
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownCategory(_) | RegistryError::FeedNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            RegistryError::Invalid(_) | RegistryError::DuplicateFeed(_) => {
                AppError::BadRequest(err.to_string())
            }
            RegistryError::Persist(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<ArticleError> for AppError {
    fn from(err: ArticleError) -> Self {
        match err {
            ArticleError::Extraction(_) => AppError::NotFound(err.to_string()),
            ArticleError::Fetch(_) => AppError::Internal(err.to_string()),
        }
    }
}

fn required_param(value: Option<String>, name: &str) -> Result<String, ValidationError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ValidationError::new(format!("{} query parameter is required", name)))
}

#[derive(Serialize)]
pub struct NewsList {
    pub news: Vec<CategorizedItem>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllNews {
    pub last_updated: Option<DateTime<Utc>>,
    pub news: Vec<CategorizedItem>,
}

pub async fn all_news(State(state): State<Arc<AppState>>) -> Json<AllNews> {
    let snapshot = state.cache.read().await;
    Json(AllNews {
        last_updated: snapshot.last_updated,
        news: snapshot.all_items(),
    })
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct CategoryNews {
    pub news: Vec<CategorizedItem>,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

pub async fn category_news(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<CategoryNews>, AppError> {
    let Query(query) = query?;

    if state.registry.snapshot().await.get(&category).is_none() {
        return Err(AppError::NotFound(format!("unknown category '{}'", category)));
    }

    let snapshot = state.cache.read().await;
    let items = snapshot.category(&category).unwrap_or_default();
    let total = items.len();

    if query.page.is_none() && query.limit.is_none() {
        return Ok(Json(CategoryNews {
            news: items.to_vec(),
            total,
            page: None,
        }));
    }

    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if page == 0 || limit == 0 {
        return Err(ValidationError::new("page and limit must be at least 1").into());
    }

    Ok(Json(CategoryNews {
        news: page_slice(items, page, limit).to_vec(),
        total,
        page: Some(page),
    }))
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

pub async fn news_by_date(
    State(state): State<Arc<AppState>>,
    query: Result<Query<DateQuery>, QueryRejection>,
) -> Result<Json<NewsList>, AppError> {
    let Query(query) = query?;
    let raw = required_param(query.date, "date")?;
    let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
        ValidationError::new(format!("invalid date '{}', expected YYYY-MM-DD", raw))
    })?;

    let snapshot = state.cache.read().await;
    Ok(Json(NewsList {
        news: snapshot.on_date(date, &Local),
    }))
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    pub url: Option<String>,
}

#[derive(Serialize)]
pub struct ArticleContent {
    pub content: String,
}

pub async fn full_article(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UrlQuery>, QueryRejection>,
) -> Result<Json<ArticleContent>, AppError> {
    let Query(query) = query?;
    let url = required_param(query.url, "url")?;
    check_http_url(&url)?;

    let content = state.articles.fetch_article(&url).await?;
    Ok(Json(ArticleContent { content }))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

pub async fn search_news(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<NewsList>, AppError> {
    let Query(query) = query?;
    let q = required_param(query.q, "q")?;
    let snapshot = state.cache.read().await;
    Ok(Json(NewsList {
        news: snapshot.search(&q),
    }))
}

pub async fn trending_news(State(state): State<Arc<AppState>>) -> Json<NewsList> {
    let table = state.registry.snapshot().await;
    let fallback = table
        .categories
        .iter()
        .find(|c| c.policy == AggregationPolicy::RoundRobin)
        .map(|c| c.key.as_str());

    let snapshot = state.cache.read().await;
    let news = state
        .clicks
        .trending(&snapshot, state.trending_limit, fallback)
        .await;
    Json(NewsList { news })
}

pub async fn track_click(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ClickEvent>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(event) = body?;
    let snapshot = state.cache.read().await;
    state.clicks.record(&event, &snapshot).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Serialize)]
pub struct SiteConfig {
    pub success: bool,
    pub texts: SiteTexts,
}

pub async fn site_texts(State(state): State<Arc<AppState>>) -> Json<SiteConfig> {
    let texts = state.registry.site_texts().await;
    Json(SiteConfig {
        success: true,
        texts: (*texts).clone(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteTextsUpdate {
    pub site_texts: SiteTexts,
}

pub async fn update_site_texts(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SiteTextsUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(update) = body?;
    state.registry.replace_site_texts(update.site_texts).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Serialize)]
pub struct FeedRegistry {
    pub success: bool,
    pub feeds: FeedsByCategory,
}

pub async fn list_feeds(State(state): State<Arc<AppState>>) -> Json<FeedRegistry> {
    Json(FeedRegistry {
        success: true,
        feeds: state.registry.feeds().await,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedChange {
    pub category: String,
    pub feed_url: String,
}

#[derive(Serialize)]
pub struct CategoryFeeds {
    pub success: bool,
    pub feeds: Vec<String>,
}

pub async fn add_feed(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FeedChange>, JsonRejection>,
) -> Result<Json<CategoryFeeds>, AppError> {
    let Json(change) = body?;
    let feeds = state
        .registry
        .add_feed(&change.category, &change.feed_url)
        .await?;
    info!(category = %change.category, url = %change.feed_url, "Feed added");
    Ok(Json(CategoryFeeds {
        success: true,
        feeds,
    }))
}

pub async fn remove_feed(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FeedChange>, JsonRejection>,
) -> Result<Json<CategoryFeeds>, AppError> {
    let Json(change) = body?;
    let feeds = state
        .registry
        .remove_feed(&change.category, &change.feed_url)
        .await?;
    info!(category = %change.category, url = %change.feed_url, "Feed removed");
    Ok(Json(CategoryFeeds {
        success: true,
        feeds,
    }))
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let scheduler = state.scheduler.clone();
    tokio::spawn(async move {
        if scheduler.run_now().await == RefreshOutcome::Skipped {
            info!("Manual refresh coalesced with the running cycle");
        }
    });

    Json(json!({ "success": true, "refreshing": true }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStatus {
    pub refreshing: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

pub async fn refresh_status(State(state): State<Arc<AppState>>) -> Json<RefreshStatus> {
    Json(RefreshStatus {
        refreshing: state.scheduler.is_refreshing().await,
        last_updated: state.cache.read().await.last_updated,
    })
}

pub async fn health() -> &'static str {
    "OK"
}
