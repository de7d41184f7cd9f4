use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::pipeline::AggregationPolicy;
use crate::registry::{check_http_url, SiteTexts};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Local wall-clock hour of the daily refresh
    #[serde(default = "default_refresh_hour")]
    pub refresh_hour: u32,
    /// Per-request timeout for feed and article fetches, in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Minimum length (in characters) of an extracted article body
    #[serde(default = "default_article_min_length")]
    pub article_min_length: usize,
    #[serde(default = "default_trending_limit")]
    pub trending_limit: usize,
    /// Where admin edits are persisted; in-memory only when unset
    #[serde(default)]
    pub state_file: Option<PathBuf>,
    #[serde(default)]
    pub site_texts: SiteTexts,
    pub categories: Vec<CategoryConfig>,
}

fn default_bind() -> String {
    "0.0.0.0:4000".to_string()
}

fn default_refresh_hour() -> u32 {
    6
}

fn default_fetch_timeout_secs() -> u64 {
    20
}

fn default_user_agent() -> String {
    "BanglaNews/1.0 (RSS Aggregator)".to_string()
}

fn default_article_min_length() -> usize {
    200
}

fn default_trending_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct CategoryConfig {
    pub key: String,
    #[serde(default)]
    pub policy: AggregationPolicy,
    /// Titles must contain one of these to be kept; no filtering when absent
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub feeds: Vec<String>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.refresh_hour >= 24 {
            anyhow::bail!("refresh_hour must be between 0 and 23, got {}", self.refresh_hour);
        }

        let mut seen = HashSet::new();
        for category in &self.categories {
            if category.key.trim().is_empty() {
                anyhow::bail!("category key must not be empty");
            }
            if !seen.insert(category.key.as_str()) {
                anyhow::bail!("duplicate category '{}'", category.key);
            }
            if matches!(&category.keywords, Some(keywords) if keywords.is_empty()) {
                anyhow::bail!("category '{}' has an empty keyword list", category.key);
            }
            for url in &category.feeds {
                check_http_url(url)
                    .map_err(|e| anyhow::anyhow!("category '{}': {}", category.key, e))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::from_str("categories = []").unwrap();

        assert_eq!(config.bind, "0.0.0.0:4000");
        assert_eq!(config.refresh_hour, 6);
        assert_eq!(config.fetch_timeout_secs, 20);
        assert_eq!(config.article_min_length, 200);
        assert_eq!(config.trending_limit, 10);
        assert!(config.state_file.is_none());
        assert!(config.site_texts.is_empty());
        assert!(config.categories.is_empty());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
            refresh_hour = 7
            fetch_timeout_secs = 5

            [site_texts]
            homepageHeading = "সব খবর এক জায়গায়"

            [[categories]]
            key = "topnews"
            policy = "round_robin"
            feeds = ["https://www.prothomalo.com/feed", "https://samakal.com/rss.xml"]

            [[categories]]
            key = "kheladhula"
            keywords = ["ক্রিকেট", "ফুটবল"]
            feeds = ["https://news.google.com/rss/search?q=sports"]
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.refresh_hour, 7);
        assert_eq!(config.fetch_timeout_secs, 5);
        assert_eq!(config.categories.len(), 2);
        assert_eq!(config.categories[0].key, "topnews");
        assert_eq!(config.categories[0].policy, AggregationPolicy::RoundRobin);
        assert!(config.categories[0].keywords.is_none());
        assert_eq!(config.categories[0].feeds.len(), 2);
        assert_eq!(config.categories[1].policy, AggregationPolicy::Concatenate);
        assert_eq!(
            config.categories[1].keywords.as_deref(),
            Some(&["ক্রিকেট".to_string(), "ফুটবল".to_string()][..])
        );
        assert_eq!(
            config.site_texts.get("homepageHeading").and_then(|v| v.as_str()),
            Some("সব খবর এক জায়গায়")
        );
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let content = "this is not valid toml {{{";

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let result = Config::load(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_categories_is_an_error() {
        assert!(Config::from_str("refresh_hour = 6").is_err());
    }

    #[test]
    fn test_rejects_out_of_range_hour() {
        let result = Config::from_str("refresh_hour = 24\ncategories = []");
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_duplicate_category() {
        let content = r#"
            [[categories]]
            key = "topnews"

            [[categories]]
            key = "topnews"
        "#;

        let err = Config::from_str(content).unwrap_err();
        assert!(err.to_string().contains("duplicate category"));
    }

    #[test]
    fn test_rejects_empty_keyword_list() {
        let content = r#"
            [[categories]]
            key = "binodon"
            keywords = []
        "#;

        assert!(Config::from_str(content).is_err());
    }

    #[test]
    fn test_rejects_relative_feed_url() {
        let content = r#"
            [[categories]]
            key = "topnews"
            feeds = ["/feed.xml"]
        "#;

        assert!(Config::from_str(content).is_err());
    }

    #[test]
    fn test_rejects_unknown_policy() {
        let content = r#"
            [[categories]]
            key = "topnews"
            policy = "random"
        "#;

        assert!(Config::from_str(content).is_err());
    }
}
