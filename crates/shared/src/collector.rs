use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use quick_xml::de::from_str;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::models::SourceItem;

/// `feeds.json`: sources grouped by report category.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub feeds: Vec<FeedCategory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedCategory {
    pub category: String,
    pub sources: Vec<FeedSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

impl FeedConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Feed config not found: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse feed config: {}", path.display()))
    }

    pub fn source_count(&self) -> usize {
        self.feeds.iter().map(|c| c.sources.len()).sum()
    }
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl AtomEntry {
    fn alternate_link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| self.links.first())
            .map(|l| l.href.as_str())
            .filter(|href| !href.is_empty())
    }
}

/// An entry before the recency filter is applied.
struct RawEntry {
    title: Option<String>,
    link: Option<String>,
    date: Option<String>,
    summary: Option<String>,
}

/// Fetches every configured feed and keeps entries newer than the lookback
/// window. Upstream of the annotation core; dedups by link.
pub struct NewsCollector {
    client: Client,
    lookback: Duration,
}

impl NewsCollector {
    pub fn new(lookback_hours: i64) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (compatible; NewsBrief/1.0)")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            lookback: Duration::hours(lookback_hours),
        })
    }

    pub async fn collect(&self, config: &FeedConfig) -> Vec<SourceItem> {
        self.collect_at(config, Utc::now()).await
    }

    pub async fn collect_at(&self, config: &FeedConfig, now: DateTime<Utc>) -> Vec<SourceItem> {
        let cutoff = now - self.lookback;
        info!(%cutoff, sources = config.source_count(), "collecting feeds");

        let jobs: Vec<(&FeedCategory, &FeedSource)> = config
            .feeds
            .iter()
            .flat_map(|cat| cat.sources.iter().map(move |src| (cat, src)))
            .collect();

        // `buffered` keeps results in configuration order.
        let fetched: Vec<_> = stream::iter(jobs)
            .map(|(category, source)| async move {
                let body = self.fetch_feed(&source.url).await;
                (category, source, body)
            })
            .buffered(4)
            .collect()
            .await;

        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for (category, source, body) in fetched {
            let parsed = body.and_then(|xml| parse_feed(&xml, &category.category, &source.name, cutoff));
            match parsed {
                Ok(entries) => {
                    let before = items.len();
                    items.extend(entries.into_iter().filter(|i| seen.insert(i.link.clone())));
                    info!(
                        source = %source.name,
                        category = %category.category,
                        recent = items.len() - before,
                        "feed collected"
                    );
                }
                Err(e) => warn!(source = %source.name, error = %format!("{e:#}"), "feed skipped"),
            }
        }

        items
    }

    async fn fetch_feed(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch feed: {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP error {} for {}", status, url);
        }

        response.text().await.context("Failed to read feed body")
    }
}

/// Parse an RSS 2.0 or Atom document and keep entries published after
/// `cutoff`. Entries without a link or a parseable date are skipped.
pub fn parse_feed(
    xml: &str,
    category: &str,
    source: &str,
    cutoff: DateTime<Utc>,
) -> Result<Vec<SourceItem>> {
    let entries: Vec<RawEntry> = match from_str::<Rss>(xml) {
        Ok(rss) => rss
            .channel
            .items
            .into_iter()
            .map(|it| RawEntry {
                title: it.title,
                link: it.link,
                date: it.pub_date,
                summary: it.description,
            })
            .collect(),
        Err(rss_err) => {
            let atom: AtomFeed = from_str(xml)
                .map_err(|_| rss_err)
                .context("Feed is neither RSS nor Atom")?;
            atom.entries
                .into_iter()
                .map(|entry| RawEntry {
                    link: entry.alternate_link().map(str::to_string),
                    title: entry.title.map(|t| t.value),
                    date: entry.published.or(entry.updated),
                    summary: entry.summary.or(entry.content).map(|t| t.value),
                })
                .collect()
        }
    };

    let items = entries
        .into_iter()
        .filter_map(|entry| {
            let link = entry.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())?;
            let published = entry.date.as_deref().and_then(parse_date)?;
            if published <= cutoff {
                return None;
            }
            let title = entry
                .title
                .map(|t| collapse_whitespace(&t))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "No Title".to_string());
            Some(SourceItem {
                title,
                source: source.to_string(),
                link,
                published_at: published.to_rfc3339(),
                summary: entry.summary.as_deref().map(html_to_text).unwrap_or_default(),
                category: category.to_string(),
            })
        })
        .collect();

    Ok(items)
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn html_to_text(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), 10_000);
    collapse_whitespace(&text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
