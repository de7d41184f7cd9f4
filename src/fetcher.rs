use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Client;
use tracing::debug;

use crate::error::{FeedError, FetchError, ParseError};

/// A feed entry before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    /// Per-item `<source>` tag (e.g. the outlet name in Google News feeds)
    pub source: Option<String>,
    pub enclosure_url: Option<String>,
    pub media_content_url: Option<String>,
    /// Full content (HTML); the description for RSS items without `content:encoded`
    pub content: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub entries: Vec<RawEntry>,
}

/// RSS item elements that feed_rs either drops or folds together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemExtras {
    pub source: Option<String>,
    pub enclosure_url: Option<String>,
    pub media_content_url: Option<String>,
}

pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client })
    }

    pub async fn fetch_feed(&self, url: &str) -> Result<ParsedFeed, FeedError> {
        debug!(%url, "Fetching feed");
        let bytes = self.get(url).await?.bytes().await.map_err(|source| {
            FetchError::Request {
                url: url.to_string(),
                source,
            }
        })?;

        Ok(parse_feed(url, &bytes)?)
    }

    pub async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        debug!(%url, "Fetching page");
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        Ok(response)
    }
}

/// Parse an RSS/Atom document, merging in the item extras feed_rs does not expose.
pub fn parse_feed(url: &str, bytes: &[u8]) -> Result<ParsedFeed, ParseError> {
    let parsed = parser::parse(bytes).map_err(|source| ParseError {
        url: url.to_string(),
        source,
    })?;
    let extras = extract_item_extras(bytes);

    let entries = parsed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry.links.first().map(|l| l.href.trim().to_string());
            let item_extras = link
                .as_ref()
                .and_then(|l| extras.get(&link_key(l)))
                .cloned()
                .unwrap_or_default();

            let media_content_url = item_extras.media_content_url.or_else(|| {
                entry
                    .media
                    .iter()
                    .flat_map(|m| m.content.iter())
                    .find_map(|c| c.url.as_ref().map(|u| u.to_string()))
            });

            RawEntry {
                title: entry.title.map(|t| t.content),
                link,
                published: entry.published.or(entry.updated),
                source: item_extras.source,
                enclosure_url: item_extras.enclosure_url,
                media_content_url,
                content: entry.content.and_then(|c| c.body),
                summary: entry.summary.map(|t| t.content),
            }
        })
        .collect();

    Ok(ParsedFeed {
        title: parsed.title.map(|t| t.content),
        entries,
    })
}

/// Item links in the form feed_rs reports them (percent-encoded path,
/// trailing slash on a bare host), so raw `<link>` text and entry links agree.
fn link_key(link: &str) -> String {
    let link = link.trim();
    reqwest::Url::parse(link)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| link.to_string())
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    None,
    Link,
    Source,
}

/// Scan raw RSS XML for `<source>`, `<enclosure>` and `<media:content>`,
/// keyed by each item's `<link>`. Returns what was collected up to the first
/// XML error; feed_rs is the authority on whether the document is valid.
pub fn extract_item_extras(xml_bytes: &[u8]) -> HashMap<String, ItemExtras> {
    let mut extras_map = HashMap::new();
    let xml_str = match std::str::from_utf8(xml_bytes) {
        Ok(s) => s,
        Err(_) => return extras_map,
    };

    let mut reader = Reader::from_str(xml_str);
    reader.config_mut().trim_text(true);

    let mut in_item = false;
    let mut field = Field::None;
    let mut link = String::new();
    let mut extras = ItemExtras::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"item" => {
                    in_item = true;
                    link.clear();
                    extras = ItemExtras::default();
                }
                b"link" if in_item => field = Field::Link,
                b"source" if in_item => field = Field::Source,
                name if in_item => record_media(name, &e, &mut extras),
                _ => {}
            },
            Ok(Event::Empty(e)) if in_item => record_media(e.name().as_ref(), &e, &mut extras),
            Ok(Event::Text(e)) if in_item => {
                let text = e.unescape().unwrap_or_default();
                push_field(field, &text, &mut link, &mut extras);
            }
            Ok(Event::CData(e)) if in_item => {
                let text = String::from_utf8_lossy(e.as_ref());
                push_field(field, &text, &mut link, &mut extras);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"item" if in_item => {
                    in_item = false;
                    field = Field::None;
                    if !link.trim().is_empty() {
                        extras_map.insert(link_key(&link), std::mem::take(&mut extras));
                    }
                }
                b"link" | b"source" => field = Field::None,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    extras_map
}

fn push_field(field: Field, text: &str, link: &mut String, extras: &mut ItemExtras) {
    match field {
        Field::Link => link.push_str(text),
        Field::Source => {
            let text = text.trim();
            if !text.is_empty() {
                extras
                    .source
                    .get_or_insert_with(String::new)
                    .push_str(text);
            }
        }
        Field::None => {}
    }
}

fn record_media(name: &[u8], e: &BytesStart, extras: &mut ItemExtras) {
    let slot = match name {
        b"enclosure" => &mut extras.enclosure_url,
        b"media:content" => &mut extras.media_content_url,
        _ => return,
    };
    if slot.is_none() {
        *slot = url_attribute(e);
    }
}

fn url_attribute(e: &BytesStart) -> Option<String> {
    e.try_get_attribute("url")
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.trim().to_string()))
        .filter(|v| !v.is_empty())
}
