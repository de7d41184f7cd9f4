use scraper::Html;

use crate::fetcher::RawEntry;
use crate::model::NewsItem;

const TITLE_SEPARATOR: &str = " - ";
const UNKNOWN_SOURCE: &str = "Unknown";

/// Map one raw feed entry to a `NewsItem`.
pub fn normalize(entry: &RawEntry, feed_title: Option<&str>) -> NewsItem {
    let raw_title = entry.title.as_deref().map(str::trim).unwrap_or_default();
    let (title, title_source) = split_title(raw_title);

    let source = non_empty(entry.source.as_deref())
        .or(title_source)
        .or(non_empty(feed_title))
        .unwrap_or(UNKNOWN_SOURCE)
        .to_string();

    let image_url = non_empty(entry.enclosure_url.as_deref())
        .or(non_empty(entry.media_content_url.as_deref()))
        .map(str::to_string);

    NewsItem {
        title: if title.is_empty() {
            "Untitled".to_string()
        } else {
            title.to_string()
        },
        link: entry.link.as_deref().map(str::trim).unwrap_or_default().to_string(),
        published_at: entry.published,
        source,
        image_url,
        summary: summary(entry),
    }
}

/// Split `"Headline - Outlet"` into the headline (before the first separator)
/// and the outlet (after the last one).
pub fn split_title(raw: &str) -> (&str, Option<&str>) {
    match (raw.find(TITLE_SEPARATOR), raw.rfind(TITLE_SEPARATOR)) {
        (Some(first), Some(last)) => {
            let head = raw[..first].trim();
            let tail = raw[last + TITLE_SEPARATOR.len()..].trim();
            if head.is_empty() {
                (raw, None)
            } else {
                (head, non_empty(Some(tail)))
            }
        }
        _ => (raw, None),
    }
}

/// First non-empty of: plain-text snippet of the content, the raw content,
/// the summary field.
fn summary(entry: &RawEntry) -> String {
    let content = non_empty(entry.content.as_deref()).or(non_empty(entry.summary.as_deref()));
    let snippet = content.map(html_to_text);

    let text = [
        snippet.as_deref(),
        non_empty(entry.content.as_deref()),
        non_empty(entry.summary.as_deref()),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|s| !s.is_empty())
    .unwrap_or_default()
    .to_string();
    text
}

/// Reduce an HTML fragment to its text with whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: Vec<&str> = fragment.root_element().text().collect();
    text.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(title: &str) -> RawEntry {
        RawEntry {
            title: Some(title.to_string()),
            link: Some("https://example.com/a".to_string()),
            ..Default::default()
        }
    }

    mod title_tests {
        use super::*;

        #[test]
        fn test_split_title_with_source_suffix() {
            assert_eq!(
                split_title("বাংলাদেশ ক্রিকেট দল জয়ী - প্রথম আলো"),
                ("বাংলাদেশ ক্রিকেট দল জয়ী", Some("প্রথম আলো"))
            );
        }

        #[test]
        fn test_split_title_multiple_separators() {
            assert_eq!(
                split_title("Budget - what changes - The Daily Star"),
                ("Budget", Some("The Daily Star"))
            );
        }

        #[test]
        fn test_split_title_without_separator() {
            assert_eq!(split_title("No separator-here"), ("No separator-here", None));
        }

        #[test]
        fn test_split_title_leading_separator_kept_whole() {
            assert_eq!(split_title(" - Outlet"), (" - Outlet", None));
        }
    }

    mod source_tests {
        use super::*;

        #[test]
        fn test_explicit_source_tag_wins() {
            let mut raw = entry("Headline - Title Outlet");
            raw.source = Some("Tag Outlet".to_string());

            let item = normalize(&raw, Some("Feed Title"));
            assert_eq!(item.source, "Tag Outlet");
            assert_eq!(item.title, "Headline");
        }

        #[test]
        fn test_title_suffix_used_without_tag() {
            let item = normalize(&entry("Headline - Title Outlet"), Some("Feed Title"));
            assert_eq!(item.source, "Title Outlet");
        }

        #[test]
        fn test_feed_title_fallback() {
            let item = normalize(&entry("Headline"), Some("Samakal"));
            assert_eq!(item.source, "Samakal");
        }

        #[test]
        fn test_unknown_fallback() {
            let item = normalize(&entry("Headline"), None);
            assert_eq!(item.source, "Unknown");
        }

        #[test]
        fn test_blank_tag_is_ignored() {
            let mut raw = entry("Headline");
            raw.source = Some("   ".to_string());

            let item = normalize(&raw, Some("Feed"));
            assert_eq!(item.source, "Feed");
        }
    }

    mod image_tests {
        use super::*;

        #[test]
        fn test_enclosure_preferred_over_media() {
            let mut raw = entry("Headline");
            raw.enclosure_url = Some("https://img/enclosure.jpg".to_string());
            raw.media_content_url = Some("https://img/media.jpg".to_string());

            let item = normalize(&raw, None);
            assert_eq!(item.image_url.as_deref(), Some("https://img/enclosure.jpg"));
        }

        #[test]
        fn test_media_content_fallback() {
            let mut raw = entry("Headline");
            raw.media_content_url = Some("https://img/media.jpg".to_string());

            let item = normalize(&raw, None);
            assert_eq!(item.image_url.as_deref(), Some("https://img/media.jpg"));
        }

        #[test]
        fn test_no_image() {
            assert!(normalize(&entry("Headline"), None).image_url.is_none());
        }
    }

    mod summary_tests {
        use super::*;

        #[test]
        fn test_snippet_strips_html() {
            let mut raw = entry("Headline");
            raw.content = Some("<p>প্রথম <b>অনুচ্ছেদ</b></p>\n<p>দ্বিতীয়</p>".to_string());

            let item = normalize(&raw, None);
            assert_eq!(item.summary, "প্রথম অনুচ্ছেদ দ্বিতীয়");
        }

        #[test]
        fn test_summary_used_without_content() {
            let mut raw = entry("Headline");
            raw.summary = Some("Plain summary".to_string());

            assert_eq!(normalize(&raw, None).summary, "Plain summary");
        }

        #[test]
        fn test_markup_only_content_falls_back_to_raw() {
            let mut raw = entry("Headline");
            raw.content = Some("<img src=\"x.jpg\"/>".to_string());

            assert_eq!(normalize(&raw, None).summary, "<img src=\"x.jpg\"/>");
        }

        #[test]
        fn test_empty_summary() {
            assert_eq!(normalize(&entry("Headline"), None).summary, "");
        }
    }

    #[test]
    fn test_fields_carried_over() {
        let published = Utc.with_ymd_and_hms(2024, 3, 1, 23, 50, 0).unwrap();
        let raw = RawEntry {
            title: Some("  Headline  ".to_string()),
            link: Some(" https://example.com/a ".to_string()),
            published: Some(published),
            ..Default::default()
        };

        let item = normalize(&raw, None);
        assert_eq!(item.title, "Headline");
        assert_eq!(item.link, "https://example.com/a");
        assert_eq!(item.published_at, Some(published));
    }

    #[test]
    fn test_missing_title() {
        let raw = RawEntry::default();
        let item = normalize(&raw, None);
        assert_eq!(item.title, "Untitled");
        assert_eq!(item.link, "");
    }
}
