// src/model.rs
//! Shared domain types: languages, feed sources and ingested feed items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Languages served by the pipeline. Declaration order is processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ru,
    En,
    De,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Ru, Language::En, Language::De];

    /// Language the analysis collaborator reads.
    pub const ANALYSIS: Language = Language::En;

    pub fn code(self) -> &'static str {
        match self {
            Language::Ru => "ru",
            Language::En => "en",
            Language::De => "de",
        }
    }

    /// English name, used in prompts for the language services.
    pub fn english_name(self) -> &'static str {
        match self {
            Language::Ru => "Russian",
            Language::En => "English",
            Language::De => "German",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ru" => Ok(Language::Ru),
            "en" => Ok(Language::En),
            "de" => Ok(Language::De),
            other => Err(format!("unsupported language code `{other}`")),
        }
    }
}

/// One configured feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    pub language: Language,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>, language: Language) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            language,
        }
    }

    /// Stable identifier used as the `bySource` cooldown key.
    pub fn source_id(&self) -> String {
        crate::ingest::slugify(&self.name)
    }
}

/// An item extracted from a feed. Lives for one pipeline run only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub source_id: String,
    pub source_name: String,
    pub source_language: Language,
    pub title: String,
    pub link: String,
    pub guid: String,
    /// Raw date string as found in the feed.
    pub pub_date: String,
    /// `None` when the date could not be parsed.
    pub published_at: Option<DateTime<Utc>>,
    pub description: String,
    /// Empty when the feed carries no usable image.
    pub image_url: String,
}

impl FeedItem {
    /// Lower-cased `title + " " + description`, the text the scorer reads.
    pub fn scoring_text(&self) -> String {
        format!("{} {}", self.title, self.description).to_lowercase()
    }
}
