//! Per-category assembly: keyword classification, aggregation across feeds,
//! and link deduplication.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::{CategorizedItem, NewsItem};

/// How the per-feed lists of a category are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Each feed's list appended in configuration order.
    #[default]
    Concatenate,
    /// Index 0 of every feed, then index 1 of every feed, and so on.
    RoundRobin,
}

impl AggregationPolicy {
    pub fn aggregate<T>(self, per_feed: Vec<Vec<T>>) -> Vec<T> {
        match self {
            AggregationPolicy::Concatenate => per_feed.into_iter().flatten().collect(),
            AggregationPolicy::RoundRobin => interleave(per_feed),
        }
    }
}

/// Round-robin merge preserving each list's relative order. Exhausted lists
/// are skipped; ties at the same index go to the earlier list.
pub fn interleave<T>(lists: Vec<Vec<T>>) -> Vec<T> {
    let total = lists.iter().map(Vec::len).sum();
    let mut iters: Vec<_> = lists.into_iter().map(Vec::into_iter).collect();
    let mut out = Vec::with_capacity(total);

    while out.len() < total {
        for iter in iters.iter_mut() {
            if let Some(item) = iter.next() {
                out.push(item);
            }
        }
    }

    out
}

/// Case-sensitive substring filter over cleaned titles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
}

impl KeywordClassifier {
    pub fn new(keywords: Vec<String>) -> Self {
        Self { keywords }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn matches(&self, title: &str) -> bool {
        self.keywords.iter().any(|k| title.contains(k.as_str()))
    }

    pub fn retain(&self, items: Vec<NewsItem>) -> Vec<NewsItem> {
        items.into_iter().filter(|i| self.matches(&i.title)).collect()
    }
}

/// Drop later items whose link already appeared in the list. Empty links are
/// never treated as duplicates.
pub fn dedup_by_link(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| item.link.is_empty() || seen.insert(item.link.clone()))
        .collect()
}

/// Run one category's per-feed item lists (in feed configuration order)
/// through classification, aggregation and dedup, tagging the result.
pub fn assemble_category(
    category: &str,
    classifier: Option<&KeywordClassifier>,
    policy: AggregationPolicy,
    per_feed: Vec<Vec<NewsItem>>,
) -> Vec<CategorizedItem> {
    let filtered = match classifier {
        Some(classifier) => per_feed
            .into_iter()
            .map(|items| classifier.retain(items))
            .collect(),
        None => per_feed,
    };

    dedup_by_link(policy.aggregate(filtered))
        .into_iter()
        .map(|item| CategorizedItem::new(item, category))
        .collect()
}
