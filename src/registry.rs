//! Feed source registry and editable site copy.
//!
//! Both are replaced wholesale on every admin edit so that a refresh cycle
//! reading the registry sees either the old table or the new one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ValidationError;
use crate::pipeline::{AggregationPolicy, KeywordClassifier};

/// Free-form site copy (`homepageHeading`, `aboutUs`, `categoryNames`, ...).
pub type SiteTexts = serde_json::Map<String, serde_json::Value>;

/// Feed URLs per category key, in configuration order.
pub type FeedsByCategory = IndexMap<String, Vec<String>>;

pub fn check_http_url(url: &str) -> Result<Url, ValidationError> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| ValidationError::new(format!("invalid URL '{}': {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(ValidationError::new(format!(
            "unsupported URL scheme '{}' in '{}'",
            scheme, url
        ))),
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("feed '{0}' is already registered for this category")]
    DuplicateFeed(String),

    #[error("feed '{0}' is not registered for this category")]
    FeedNotFound(String),

    #[error("failed to persist admin state: {0}")]
    Persist(#[from] std::io::Error),
}

/// How one category is assembled.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRule {
    pub key: String,
    pub policy: AggregationPolicy,
    pub classifier: Option<KeywordClassifier>,
    pub feeds: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedTable {
    pub categories: Vec<CategoryRule>,
}

impl FeedTable {
    pub fn from_config(config: &Config) -> Self {
        let categories = config
            .categories
            .iter()
            .map(|c| CategoryRule {
                key: c.key.clone(),
                policy: c.policy,
                classifier: c.keywords.clone().map(KeywordClassifier::new),
                feeds: c.feeds.iter().map(|f| f.trim().to_string()).collect(),
            })
            .collect();

        Self { categories }
    }

    pub fn get(&self, key: &str) -> Option<&CategoryRule> {
        self.categories.iter().find(|c| c.key == key)
    }

    pub fn feeds_by_category(&self) -> FeedsByCategory {
        self.categories
            .iter()
            .map(|c| (c.key.clone(), c.feeds.clone()))
            .collect()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    #[serde(default)]
    feeds: FeedsByCategory,
    #[serde(default)]
    site_texts: Option<SiteTexts>,
}

pub struct Registry {
    table: RwLock<Arc<FeedTable>>,
    site_texts: RwLock<Arc<SiteTexts>>,
    state_file: Option<PathBuf>,
}

impl Registry {
    pub fn new(table: FeedTable, site_texts: SiteTexts, state_file: Option<PathBuf>) -> Self {
        Self {
            table: RwLock::new(Arc::new(table)),
            site_texts: RwLock::new(Arc::new(site_texts)),
            state_file,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            FeedTable::from_config(config),
            config.site_texts.clone(),
            config.state_file.clone(),
        )
    }

    /// Overlay previously persisted admin edits, if a state file exists.
    pub async fn load_state(&self) -> anyhow::Result<()> {
        let Some(path) = &self.state_file else {
            return Ok(());
        };
        if !tokio::fs::try_exists(path).await? {
            info!(path = %path.display(), "No admin state file yet");
            return Ok(());
        }

        let content = tokio::fs::read(path).await?;
        let state: PersistedState = serde_json::from_slice(&content)?;

        let mut table = self.table.write().await;
        let mut updated = (**table).clone();
        for (key, feeds) in state.feeds {
            let Some(rule) = updated.categories.iter_mut().find(|c| c.key == key) else {
                warn!(category = %key, "Ignoring persisted feeds for unconfigured category");
                continue;
            };
            rule.feeds = feeds
                .into_iter()
                .filter(|url| match check_http_url(url) {
                    Ok(_) => true,
                    Err(e) => {
                        warn!(category = %key, error = %e, "Ignoring persisted feed");
                        false
                    }
                })
                .collect();
        }
        *table = Arc::new(updated);

        if let Some(texts) = state.site_texts {
            *self.site_texts.write().await = Arc::new(texts);
        }

        info!(path = %path.display(), "Loaded admin state");
        Ok(())
    }

    pub async fn snapshot(&self) -> Arc<FeedTable> {
        self.table.read().await.clone()
    }

    pub async fn feeds(&self) -> FeedsByCategory {
        self.snapshot().await.feeds_by_category()
    }

    /// Returns the category's feed list after the addition.
    pub async fn add_feed(&self, category: &str, url: &str) -> Result<Vec<String>, RegistryError> {
        check_http_url(url)?;
        let url = url.trim();

        self.update_feeds(category, |feeds| {
            if feeds.iter().any(|f| f == url) {
                return Err(RegistryError::DuplicateFeed(url.to_string()));
            }
            feeds.push(url.to_string());
            Ok(())
        })
        .await
    }

    /// Returns the category's feed list after the removal.
    pub async fn remove_feed(
        &self,
        category: &str,
        url: &str,
    ) -> Result<Vec<String>, RegistryError> {
        let url = url.trim();

        self.update_feeds(category, |feeds| {
            let before = feeds.len();
            feeds.retain(|f| f != url);
            if feeds.len() == before {
                return Err(RegistryError::FeedNotFound(url.to_string()));
            }
            Ok(())
        })
        .await
    }

    async fn update_feeds<F>(&self, category: &str, edit: F) -> Result<Vec<String>, RegistryError>
    where
        F: FnOnce(&mut Vec<String>) -> Result<(), RegistryError>,
    {
        let mut table = self.table.write().await;
        let mut updated = (**table).clone();
        let rule = updated
            .categories
            .iter_mut()
            .find(|c| c.key == category)
            .ok_or_else(|| RegistryError::UnknownCategory(category.to_string()))?;

        edit(&mut rule.feeds)?;
        let feeds = rule.feeds.clone();

        let texts = self.site_texts.read().await.clone();
        self.persist(&updated, &texts).await?;
        *table = Arc::new(updated);

        info!(category, feeds = feeds.len(), "Feed registry updated");
        Ok(feeds)
    }

    pub async fn site_texts(&self) -> Arc<SiteTexts> {
        self.site_texts.read().await.clone()
    }

    pub async fn replace_site_texts(&self, texts: SiteTexts) -> Result<(), RegistryError> {
        // Same lock order as update_feeds: table, then site texts.
        let table = self.table.read().await;
        let mut current = self.site_texts.write().await;
        self.persist(&table, &texts).await?;
        *current = Arc::new(texts);

        info!("Site texts updated");
        Ok(())
    }

    async fn persist(&self, table: &FeedTable, texts: &SiteTexts) -> Result<(), std::io::Error> {
        let Some(path) = &self.state_file else {
            return Ok(());
        };

        let state = PersistedState {
            feeds: table.feeds_by_category(),
            site_texts: Some(texts.clone()),
        };
        let json = serde_json::to_vec_pretty(&state)?;
        write_atomically(path, &json).await
    }
}

async fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), std::io::Error> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await
}
