//! Full-text extraction for the reading view.

use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use crate::error::{ArticleError, ExtractionError};
use crate::fetcher::Fetcher;

/// Tried in order; the first element whose text is long enough wins.
const CANDIDATE_SELECTORS: &[&str] = &[
    "article",
    ".article-content",
    ".article-body",
    ".story-content",
    ".news-content",
    ".post-content",
    ".entry-content",
    ".content",
    "#content",
    "main",
    "body",
];

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

pub struct ArticleExtractor {
    fetcher: Arc<Fetcher>,
    min_length: usize,
}

impl ArticleExtractor {
    pub fn new(fetcher: Arc<Fetcher>, min_length: usize) -> Self {
        Self {
            fetcher,
            min_length,
        }
    }

    #[instrument(level = "info", skip(self))]
    pub async fn fetch_article(&self, url: &str) -> Result<String, ArticleError> {
        let html = self.fetcher.fetch_page(url).await?;

        let content = extract_main_text(&html, self.min_length).ok_or_else(|| ExtractionError {
            url: url.to_string(),
            min_length: self.min_length,
        })?;

        debug!(chars = content.chars().count(), "Extracted article");
        Ok(content)
    }
}

/// Text of the first candidate block longer than `min_length` characters.
pub fn extract_main_text(html: &str, min_length: usize) -> Option<String> {
    let document = Html::parse_document(html);

    CANDIDATE_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| {
            document
                .select(&selector)
                .map(visible_text)
                .find(|text| text.chars().count() > min_length)
        })
}

fn visible_text(element: ElementRef) -> String {
    let raw: String = element
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| SKIPPED_ELEMENTS.contains(&e.name()))
            });
            (!hidden).then_some(&**text)
        })
        .collect();

    clean_text(&raw)
}

/// Trim every line and drop blank ones.
fn clean_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
