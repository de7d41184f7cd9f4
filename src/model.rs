use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One syndicated article reference, as produced by the normalizer.
///
/// Serialized field names follow what the front-end reads (`pubDate`, `image`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    #[serde(rename = "pubDate")]
    pub published_at: Option<DateTime<Utc>>,
    pub source: String,
    #[serde(rename = "image")]
    pub image_url: Option<String>,
    pub summary: String,
}

/// A news item placed into a category list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedItem {
    #[serde(flatten)]
    pub item: NewsItem,
    pub category: String,
}

impl CategorizedItem {
    pub fn new(item: NewsItem, category: impl Into<String>) -> Self {
        Self {
            item,
            category: category.into(),
        }
    }
}
