use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Days, Local, TimeZone, Utc};
use futures::future::join_all;
use indexmap::IndexMap;
use tracing::{error, info, warn};

use crate::cache::{NewsCache, Snapshot};
use crate::fetcher::Fetcher;
use crate::model::{CategorizedItem, NewsItem};
use crate::normalize::normalize;
use crate::pipeline::assemble_category;
use crate::registry::{CategoryRule, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Completed { categories: usize, items: usize },
    /// Another cycle was already running.
    Skipped,
}

pub struct RefreshScheduler {
    fetcher: Arc<Fetcher>,
    registry: Arc<Registry>,
    cache: Arc<NewsCache>,
    state: Mutex<RefreshState>,
}

impl RefreshScheduler {
    pub fn new(fetcher: Arc<Fetcher>, registry: Arc<Registry>, cache: Arc<NewsCache>) -> Self {
        Self {
            fetcher,
            registry,
            cache,
            state: Mutex::new(RefreshState::Idle),
        }
    }

    pub async fn is_refreshing(&self) -> bool {
        *self.lock_state() == RefreshState::Refreshing
    }

    /// Run one full refresh cycle and commit the result to the cache.
    /// Returns `Skipped` without doing anything if a cycle is in progress.
    pub async fn run_now(&self) -> RefreshOutcome {
        let Some(_guard) = self.begin_refresh() else {
            info!("Refresh already in progress, skipping");
            return RefreshOutcome::Skipped;
        };

        self.refresh_all().await
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_refresh(&self) -> Option<RefreshGuard<'_>> {
        let mut state = self.lock_state();
        if *state == RefreshState::Refreshing {
            return None;
        }
        *state = RefreshState::Refreshing;
        Some(RefreshGuard { scheduler: self })
    }

    async fn refresh_all(&self) -> RefreshOutcome {
        let started = Instant::now();
        let table = self.registry.snapshot().await;
        info!(categories = table.categories.len(), "Refreshing news");

        let lists = join_all(table.categories.iter().map(|rule| self.refresh_category(rule))).await;

        let categories: IndexMap<String, Vec<CategorizedItem>> = table
            .categories
            .iter()
            .map(|rule| rule.key.clone())
            .zip(lists)
            .collect();

        let snapshot = Snapshot::new(categories, Utc::now());
        let outcome = RefreshOutcome::Completed {
            categories: snapshot.categories.len(),
            items: snapshot.total_items(),
        };
        self.cache.replace(snapshot).await;

        if let RefreshOutcome::Completed { categories, items } = outcome {
            info!(
                categories,
                items,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "News refresh complete"
            );
        }
        outcome
    }

    /// Fetch every feed of one category concurrently and assemble the list.
    /// Output order follows feed configuration order, not response order.
    pub async fn refresh_category(&self, rule: &CategoryRule) -> Vec<CategorizedItem> {
        let per_feed = join_all(rule.feeds.iter().map(|url| self.fetch_items(&rule.key, url))).await;
        let items = assemble_category(&rule.key, rule.classifier.as_ref(), rule.policy, per_feed);

        if items.is_empty() && !rule.feeds.is_empty() {
            warn!(category = %rule.key, "Category has no items this cycle");
        }
        items
    }

    async fn fetch_items(&self, category: &str, url: &str) -> Vec<NewsItem> {
        match self.fetcher.fetch_feed(url).await {
            Ok(feed) => {
                let items: Vec<NewsItem> = feed
                    .entries
                    .iter()
                    .map(|entry| normalize(entry, feed.title.as_deref()))
                    .collect();
                info!(category, %url, count = items.len(), "Fetched feed");
                items
            }
            Err(e) => {
                error!(category, %url, error = %e, "Failed to fetch feed");
                Vec::new()
            }
        }
    }
}

/// Puts the scheduler back to `Idle` when the cycle ends, including when the
/// cycle panics or its future is dropped.
struct RefreshGuard<'a> {
    scheduler: &'a RefreshScheduler,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        *self.scheduler.lock_state() = RefreshState::Idle;
    }
}

/// Refresh immediately, then every day at `hour` local time.
pub async fn start_daily_refresh(scheduler: Arc<RefreshScheduler>, hour: u32) {
    info!("Starting initial news fetch");
    scheduler.run_now().await;

    loop {
        let now = Local::now();
        let next = next_run_after(&now, hour);
        let wait = (next.clone() - now).to_std().unwrap_or(Duration::ZERO);
        info!(next_run = %next.to_rfc3339(), "Next scheduled refresh");

        tokio::time::sleep(wait).await;
        info!("Starting scheduled news refresh");
        scheduler.run_now().await;
    }
}

/// The first `hour`:00 wall-clock time strictly after `now`.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();

    for offset in 0..=2 {
        let candidate = today
            .checked_add_days(Days::new(offset))
            .and_then(|date| date.and_hms_opt(hour, 0, 0))
            .and_then(|naive| tz.from_local_datetime(&naive).earliest());

        if let Some(candidate) = candidate {
            if candidate > *now {
                return candidate;
            }
        }
    }

    now.clone() + chrono::Duration::days(1)
}
