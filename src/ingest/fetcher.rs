// src/ingest/fetcher.rs
use async_trait::async_trait;
use metrics::{counter, histogram};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::ingest::parser::parse_feed;
use crate::model::{FeedItem, FeedSource};

/// Retrieves and parses one source. Implementations never fail the batch:
/// a broken source yields an empty list.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, source: &FeedSource) -> Vec<FeedItem>;
}

/// Single GET per source, no retry.
pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent("newsdesk/0.1 (+rss digest)")
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    pub async fn fetch_body(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, source: &FeedSource) -> Vec<FeedItem> {
        let t0 = Instant::now();
        match self.fetch_body(&source.url).await {
            Ok(body) => {
                let items = parse_feed(&body, source);
                histogram!("fetch_source_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
                counter!("fetch_items_total").increment(items.len() as u64);
                debug!(
                    target: "fetch",
                    source = %source.name,
                    items = items.len(),
                    "feed parsed"
                );
                items
            }
            Err(e) => {
                warn!(target: "fetch", source = %source.name, url = %source.url, error = %e, "feed fetch failed");
                counter!("fetch_source_errors_total").increment(1);
                Vec::new()
            }
        }
    }
}

/// Serves stored feed bodies by URL; unknown URLs behave like a failed fetch.
#[derive(Debug, Clone, Default)]
pub struct FixtureFetcher {
    bodies: HashMap<String, String>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.bodies.insert(url.into(), body.into());
        self
    }
}

#[async_trait]
impl FeedFetcher for FixtureFetcher {
    async fn fetch(&self, source: &FeedSource) -> Vec<FeedItem> {
        match self.bodies.get(&source.url) {
            Some(body) => parse_feed(body, source),
            None => {
                warn!(target: "fetch", source = %source.name, "no fixture for source");
                Vec::new()
            }
        }
    }
}
