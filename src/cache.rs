//! Process-wide news cache.
//!
//! The cache holds one immutable `Snapshot` behind an `Arc`. A refresh cycle
//! builds a complete new snapshot and swaps it in with `replace`; readers
//! clone the `Arc` and never observe a half-written state.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::model::CategorizedItem;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub categories: IndexMap<String, Vec<CategorizedItem>>,
    /// Shared by every category; `None` until the first refresh completes
    pub last_updated: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn new(
        categories: IndexMap<String, Vec<CategorizedItem>>,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            categories,
            last_updated: Some(last_updated),
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &CategorizedItem> {
        self.categories.values().flatten()
    }

    /// Every category's list flattened in category order.
    pub fn all_items(&self) -> Vec<CategorizedItem> {
        self.items().cloned().collect()
    }

    pub fn category(&self, key: &str) -> Option<&[CategorizedItem]> {
        self.categories.get(key).map(Vec::as_slice)
    }

    pub fn total_items(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    /// Items whose publish time falls on `date` in the given time zone.
    /// Items without a publish time are excluded.
    pub fn on_date<Tz: TimeZone>(&self, date: NaiveDate, tz: &Tz) -> Vec<CategorizedItem> {
        self.items()
            .filter(|i| {
                i.item
                    .published_at
                    .is_some_and(|at| at.with_timezone(tz).date_naive() == date)
            })
            .cloned()
            .collect()
    }

    /// Case-insensitive substring search over titles and summaries.
    pub fn search(&self, query: &str) -> Vec<CategorizedItem> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.items()
            .filter(|i| {
                i.item.title.to_lowercase().contains(&needle)
                    || i.item.summary.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }
}

/// Slice out a 1-based page. Pages past the end are empty.
pub fn page_slice<T>(items: &[T], page: usize, limit: usize) -> &[T] {
    let start = page.saturating_sub(1).saturating_mul(limit).min(items.len());
    let end = start.saturating_add(limit).min(items.len());
    &items[start..end]
}

pub struct NewsCache {
    current: RwLock<Arc<Snapshot>>,
}

impl Default for NewsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl NewsCache {
    /// Start with an empty snapshot.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    pub async fn read(&self) -> Arc<Snapshot> {
        self.current.read().await.clone()
    }

    pub async fn replace(&self, snapshot: Snapshot) {
        *self.current.write().await = Arc::new(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewsItem;
    use chrono::FixedOffset;

    fn item(category: &str, title: &str, published_at: Option<DateTime<Utc>>) -> CategorizedItem {
        CategorizedItem::new(
            NewsItem {
                title: title.to_string(),
                link: format!("https://example.com/{}", title),
                published_at,
                source: "Test".to_string(),
                image_url: None,
                summary: format!("summary of {}", title),
            },
            category,
        )
    }

    fn late_evening() -> DateTime<Utc> {
        "2024-03-01T23:50:00Z".parse().unwrap()
    }

    fn snapshot() -> Snapshot {
        let mut categories = IndexMap::new();
        categories.insert(
            "topnews".to_string(),
            vec![
                item("topnews", "Budget", Some(late_evening())),
                item("topnews", "Undated", None),
            ],
        );
        categories.insert(
            "kheladhula".to_string(),
            vec![item(
                "kheladhula",
                "Cricket",
                Some("2024-03-02T08:00:00Z".parse().unwrap()),
            )],
        );
        Snapshot::new(categories, "2024-03-02T06:00:00Z".parse().unwrap())
    }

    mod query_tests {
        use super::*;

        #[test]
        fn test_all_items_in_category_order() {
            let all = snapshot().all_items();
            let titles: Vec<_> = all.iter().map(|i| i.item.title.as_str()).collect();
            assert_eq!(titles, vec!["Budget", "Undated", "Cricket"]);
            assert_eq!(all[2].category, "kheladhula");
        }

        #[test]
        fn test_category_lookup() {
            let snapshot = snapshot();
            assert_eq!(snapshot.category("kheladhula").map(<[_]>::len), Some(1));
            assert!(snapshot.category("binodon").is_none());
            assert_eq!(snapshot.total_items(), 3);
        }

        #[test]
        fn test_date_filter_utc_boundary() {
            let snapshot = snapshot();
            let utc = FixedOffset::east_opt(0).unwrap();

            let first = snapshot.on_date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), &utc);
            let titles: Vec<_> = first.iter().map(|i| i.item.title.as_str()).collect();
            assert_eq!(titles, vec!["Budget"]);

            let second = snapshot.on_date(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(), &utc);
            let titles: Vec<_> = second.iter().map(|i| i.item.title.as_str()).collect();
            assert_eq!(titles, vec!["Cricket"]);
        }

        #[test]
        fn test_date_filter_east_of_utc_moves_to_next_day() {
            let snapshot = snapshot();
            let dhaka = FixedOffset::east_opt(6 * 3600).unwrap();

            let first = snapshot.on_date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), &dhaka);
            assert!(first.is_empty());

            let second = snapshot.on_date(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(), &dhaka);
            assert_eq!(second.len(), 2);
        }

        #[test]
        fn test_search_title_and_summary() {
            let snapshot = snapshot();

            let by_title = snapshot.search("cricket");
            assert_eq!(by_title.len(), 1);
            assert_eq!(by_title[0].category, "kheladhula");

            let by_summary = snapshot.search("SUMMARY OF BUDGET");
            assert_eq!(by_summary.len(), 1);

            assert!(snapshot.search("   ").is_empty());
        }
    }

    mod page_tests {
        use super::*;

        #[test]
        fn test_pages() {
            let items: Vec<u32> = (1..=45).collect();

            assert_eq!(page_slice(&items, 1, 20), &items[0..20]);
            assert_eq!(page_slice(&items, 3, 20), &items[40..45]);
            assert!(page_slice(&items, 4, 20).is_empty());
        }

        #[test]
        fn test_huge_page_does_not_overflow() {
            let items = [1, 2, 3];
            assert!(page_slice(&items, usize::MAX, usize::MAX).is_empty());
        }
    }

    mod store_tests {
        use super::*;

        #[tokio::test]
        async fn test_starts_empty() {
            let cache = NewsCache::new();
            let snapshot = cache.read().await;

            assert!(snapshot.categories.is_empty());
            assert!(snapshot.last_updated.is_none());
        }

        #[tokio::test]
        async fn test_replace_swaps_whole_snapshot() {
            let cache = NewsCache::new();
            let before = cache.read().await;

            cache.replace(snapshot()).await;
            let after = cache.read().await;

            assert!(before.categories.is_empty());
            assert_eq!(after.total_items(), 3);
            assert!(after.last_updated.is_some());
        }
    }
}
