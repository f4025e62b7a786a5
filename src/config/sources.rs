// src/config/sources.rs
//! Feed source registry, keyed by language.
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::model::{FeedSource, Language};

pub const DEFAULT_FEEDS_TOML: &str = include_str!("../../config/feeds.toml");
pub const ENV_FEED_SOURCES_PATH: &str = "FEED_SOURCES_PATH";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRegistry {
    by_language: BTreeMap<Language, Vec<FeedSource>>,
}

#[derive(Deserialize)]
struct SourcesFile {
    sources: Vec<FeedSource>,
}

impl SourceRegistry {
    pub fn builtin() -> Result<Self> {
        parse_sources(DEFAULT_FEEDS_TOML, "toml").context("embedded feed sources")
    }

    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading feed sources from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_sources(&content, ext.as_str())
    }

    /// `path` when given (it must exist), else the embedded list.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) if p.exists() => Self::load_from(p),
            Some(p) => Err(anyhow!("{ENV_FEED_SOURCES_PATH} points to non-existent path {}", p.display())),
            None => Self::builtin(),
        }
    }

    pub fn for_language(&self, lang: Language) -> &[FeedSource] {
        self.by_language.get(&lang).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn into_map(self) -> BTreeMap<Language, Vec<FeedSource>> {
        self.by_language
    }

    pub fn len(&self) -> usize {
        self.by_language.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<SourceRegistry> {
    let parsed: Vec<FeedSource> = if hint_ext == "json" {
        parse_json(s)?
    } else {
        match toml::from_str::<SourcesFile>(s) {
            Ok(f) => f.sources,
            Err(toml_err) => parse_json(s).map_err(|_| anyhow!("unsupported feed sources format: {toml_err}"))?,
        }
    };
    Ok(clean(parsed))
}

/// Accepts either `{"sources": [...]}` or a bare array.
fn parse_json(s: &str) -> Result<Vec<FeedSource>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Json {
        Wrapped(SourcesFile),
        Bare(Vec<FeedSource>),
    }
    Ok(match serde_json::from_str::<Json>(s)? {
        Json::Wrapped(f) => f.sources,
        Json::Bare(v) => v,
    })
}

/// Trim, drop blanks, keep the first occurrence of each URL per language.
fn clean(items: Vec<FeedSource>) -> SourceRegistry {
    let mut seen: BTreeSet<(Language, String)> = BTreeSet::new();
    let mut by_language: BTreeMap<Language, Vec<FeedSource>> = BTreeMap::new();
    for it in items {
        let name = it.name.trim();
        let url = it.url.trim();
        if name.is_empty() || url.is_empty() {
            continue;
        }
        if seen.insert((it.language, url.to_string())) {
            by_language
                .entry(it.language)
                .or_default()
                .push(FeedSource::new(name, url, it.language));
        }
    }
    SourceRegistry { by_language }
}
