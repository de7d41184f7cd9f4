use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::Snapshot;
use crate::error::ValidationError;
use crate::model::CategorizedItem;

/// A click reported by the front-end. `news_id` is the item link.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickEvent {
    pub news_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub clicked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub from_trending: bool,
}

#[derive(Debug, Clone, Copy)]
struct ClickStats {
    count: u64,
    last_clicked: DateTime<Utc>,
}

#[derive(Default)]
pub struct ClickTracker {
    clicks: RwLock<HashMap<String, ClickStats>>,
}

impl ClickTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the item's click count after recording. Clicks on links that
    /// are not in `snapshot` are ignored and report a count of 0.
    pub async fn record(
        &self,
        event: &ClickEvent,
        snapshot: &Snapshot,
    ) -> Result<u64, ValidationError> {
        let id = event.news_id.trim();
        if id.is_empty() {
            return Err(ValidationError::new("newsId is required"));
        }

        let links: HashSet<&str> = snapshot.items().map(|i| i.item.link.as_str()).collect();
        if !links.contains(id) {
            debug!(news_id = id, "Ignoring click on item outside the current snapshot");
            return Ok(0);
        }

        let at = event.clicked_at.unwrap_or_else(Utc::now);
        let mut clicks = self.clicks.write().await;
        if !clicks.contains_key(id) {
            // Counts never outlive the items they belong to.
            clicks.retain(|link, _| links.contains(link.as_str()));
        }
        let stats = clicks.entry(id.to_string()).or_insert(ClickStats {
            count: 0,
            last_clicked: at,
        });
        stats.count += 1;
        stats.last_clicked = stats.last_clicked.max(at);

        debug!(
            news_id = id,
            count = stats.count,
            category = event.category.as_deref().unwrap_or_default(),
            from_trending = event.from_trending,
            "Click recorded"
        );
        Ok(stats.count)
    }

    pub async fn count(&self, news_id: &str) -> u64 {
        self.clicks
            .read()
            .await
            .get(news_id)
            .map_or(0, |s| s.count)
    }

    /// Most-clicked items of the snapshot, most recent click breaking ties,
    /// then snapshot order. When nothing in the snapshot has been clicked, the
    /// head of `fallback_category` (or of the whole snapshot) is returned.
    pub async fn trending(
        &self,
        snapshot: &Snapshot,
        limit: usize,
        fallback_category: Option<&str>,
    ) -> Vec<CategorizedItem> {
        let clicks = self.clicks.read().await;
        let mut seen = HashSet::new();

        let mut clicked: Vec<(ClickStats, &CategorizedItem)> = snapshot
            .items()
            .filter(|i| seen.insert(i.item.link.as_str()))
            .filter_map(|i| clicks.get(&i.item.link).map(|stats| (*stats, i)))
            .collect();

        if clicked.is_empty() {
            let fallback = fallback_category
                .and_then(|key| snapshot.category(key))
                .map(|items| items.iter().take(limit).cloned().collect());
            return fallback.unwrap_or_else(|| snapshot.items().take(limit).cloned().collect());
        }

        clicked.sort_by(|(a, _), (b, _)| {
            b.count
                .cmp(&a.count)
                .then_with(|| b.last_clicked.cmp(&a.last_clicked))
        });
        clicked
            .into_iter()
            .take(limit)
            .map(|(_, item)| item.clone())
            .collect()
    }
}
