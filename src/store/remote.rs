// src/store/remote.rs
//! Firebase Realtime Database REST backend.
//!
//! Layout: `topics/<id>.json` and `cooldown/<lang>.json`. Conditional writes use
//! the `X-Firebase-ETag` / `if-match` handshake; a `412` means another writer won.

use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::ingest::dedup::CooldownEntry;
use crate::model::Language;
use crate::store::{CooldownStore, TopicStore, Versioned};
use crate::topic::Topic;

const ETAG_REQUEST_HEADER: &str = "X-Firebase-ETag";
const MISSING_INDEX_MARKER: &str = "Index not defined";

#[derive(Debug, Clone)]
pub struct RemoteStoreConfig {
    /// Database root, e.g. `https://project-default-rtdb.firebaseio.com`.
    pub base_url: String,
    /// Database secret or ID token, sent as the `auth` query parameter.
    pub auth: Option<String>,
    pub timeout: Duration,
}

pub struct RemoteStore {
    http: reqwest::Client,
    base_url: String,
    auth: Option<String>,
}

impl RemoteStore {
    pub fn new(cfg: &RemoteStoreConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder().timeout(cfg.timeout).build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            auth: cfg.auth.clone().filter(|a| !a.is_empty()),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let rb = self
            .http
            .request(method, format!("{}/{}.json", self.base_url, path));
        match &self.auth {
            Some(a) => rb.query(&[("auth", a.as_str())]),
            None => rb,
        }
    }

    async fn fail(path: &str, resp: reqwest::Response) -> StoreError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status == StatusCode::PRECONDITION_FAILED {
            return StoreError::Conflict(path.to_string());
        }
        if status == StatusCode::BAD_REQUEST && body.contains(MISSING_INDEX_MARKER) {
            return StoreError::MissingIndex {
                path: path.to_string(),
            };
        }
        StoreError::Status {
            status: status.as_u16(),
            body: body.chars().take(300).collect(),
        }
    }

    fn decode<T: DeserializeOwned>(context: &str, body: &str) -> Result<T, StoreError> {
        serde_json::from_str(body).map_err(|source| StoreError::Decode {
            context: context.to_string(),
            source,
        })
    }

    /// GET a collection, optionally filtered server-side with `orderBy`/`equalTo`.
    async fn get_collection(
        &self,
        path: &str,
        filter: Option<(&str, &str)>,
    ) -> Result<Vec<Topic>, StoreError> {
        let mut rb = self.request(Method::GET, path);
        if let Some((field, value)) = filter {
            rb = rb.query(&[("orderBy", format!("\"{field}\"")), ("equalTo", value.to_string())]);
        }
        let resp = rb.send().await?;
        if !resp.status().is_success() {
            return Err(Self::fail(path, resp).await);
        }
        let body = resp.text().await?;
        let raw: Option<BTreeMap<String, serde_json::Value>> = Self::decode(path, &body)?;

        let mut out = Vec::new();
        for (id, value) in raw.unwrap_or_default() {
            match serde_json::from_value::<Topic>(value) {
                Ok(mut t) => {
                    if t.id.is_empty() {
                        t.id = id;
                    }
                    out.push(t);
                }
                Err(e) => warn!(target: "store", id = %id, error = %e, "skipping undecodable topic"),
            }
        }
        Ok(out)
    }

    /// Filtered query with a full-scan fallback when the index is missing.
    async fn query_topics(
        &self,
        field: &str,
        value: &str,
        keep: impl Fn(&Topic) -> bool,
    ) -> Result<Vec<Topic>, StoreError> {
        match self.get_collection("topics", Some((field, value))).await {
            Ok(v) => Ok(v),
            Err(StoreError::MissingIndex { path }) => {
                debug!(target: "store", path = %path, field, "index missing; scanning collection");
                let all = self.get_collection("topics", None).await?;
                Ok(all.into_iter().filter(|t| keep(t)).collect())
            }
            Err(e) => Err(e),
        }
    }

    async fn put_json<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        value: &T,
        if_match: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut rb = self.request(Method::PUT, path).json(value);
        if let Some(etag) = if_match {
            rb = rb.header(header::IF_MATCH, etag);
        }
        let resp = rb.send().await?;
        if !resp.status().is_success() {
            return Err(Self::fail(path, resp).await);
        }
        Ok(())
    }
}

#[async_trait]
impl TopicStore for RemoteStore {
    async fn insert(&self, topic: &Topic) -> Result<(), StoreError> {
        self.put_json(&format!("topics/{}", topic.id), topic, None).await
    }

    async fn unposted(&self) -> Result<Vec<Topic>, StoreError> {
        self.query_topics("posted", "false", |t| !t.posted).await
    }

    async fn by_language(&self, language: Language) -> Result<Vec<Topic>, StoreError> {
        let quoted = format!("\"{}\"", language.code());
        self.query_topics("language", &quoted, |t| t.language == language)
            .await
    }

    async fn fetch_versioned(&self, id: &str) -> Result<Versioned<Topic>, StoreError> {
        let path = format!("topics/{id}");
        let resp = self
            .request(Method::GET, &path)
            .header(ETAG_REQUEST_HEADER, "true")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::fail(&path, resp).await);
        }
        let version = resp
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| StoreError::Status {
                status: resp.status().as_u16(),
                body: "response carried no ETag".into(),
            })?;
        let body = resp.text().await?;
        let value: Option<Topic> = Self::decode(&path, &body)?;
        let mut value = value.ok_or_else(|| StoreError::NotFound(path.clone()))?;
        if value.id.is_empty() {
            value.id = id.to_string();
        }
        Ok(Versioned { value, version })
    }

    async fn replace_if_version(&self, topic: &Topic, version: &str) -> Result<(), StoreError> {
        self.put_json(&format!("topics/{}", topic.id), topic, Some(version))
            .await
    }
}

#[async_trait]
impl CooldownStore for RemoteStore {
    async fn load(&self, language: Language) -> Result<CooldownEntry, StoreError> {
        let path = format!("cooldown/{}", language.code());
        let resp = self.request(Method::GET, &path).send().await?;
        if !resp.status().is_success() {
            return Err(Self::fail(&path, resp).await);
        }
        let body = resp.text().await?;
        let entry: Option<CooldownEntry> = Self::decode(&path, &body)?;
        Ok(entry.unwrap_or_default())
    }

    async fn save(&self, language: Language, entry: &CooldownEntry) -> Result<(), StoreError> {
        self.put_json(&format!("cooldown/{}", language.code()), entry, None)
            .await
    }
}
