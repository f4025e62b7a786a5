// src/topic.rs
//! Durable topic records: the unit the fetch stage produces and the cron stage publishes.

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Language;

pub const SECTION_NEWS: &str = "news";

/// Four-part analytical commentary returned by the analysis collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commentary {
    pub sense: String,
    pub why: String,
    pub view: String,
    pub question: String,
}

impl Commentary {
    /// All four fields carry non-blank text.
    pub fn is_complete(&self) -> bool {
        [&self.sense, &self.why, &self.view, &self.question]
            .iter()
            .all(|f| !f.trim().is_empty())
    }

    /// Name of the first blank field, for diagnostics.
    pub fn first_missing(&self) -> Option<&'static str> {
        [
            ("sense", &self.sense),
            ("why", &self.why),
            ("view", &self.view),
            ("question", &self.question),
        ]
        .into_iter()
        .find(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
    }
}

/// Where a message went once it was published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    pub channel_id: String,
    pub message_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeriveError {
    #[error("topic {0} is itself a translation and cannot be translated again")]
    SourceIsDerived(String),

    #[error("expected {expected} translated fields, got {got}")]
    FieldCount { expected: usize, got: usize },
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub sense: String,
    #[serde(default)]
    pub why: String,
    #[serde(default)]
    pub view: String,
    #[serde(default)]
    pub question: String,
    /// Combined body for records that carry free text instead of the four fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default = "default_section")]
    pub section: String,
    pub language: Language,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub scheduled_for: DateTime<Utc>,
    #[serde(default)]
    pub source_link: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub relevance_score: i32,
    #[serde(default)]
    pub quality_score: i32,
    #[serde(default)]
    pub posted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication: Option<Publication>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub translated_from: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_language: Option<Language>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_topic_id: Option<String>,
}

fn default_section() -> String {
    SECTION_NEWS.to_string()
}

impl Topic {
    pub fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn commentary(&self) -> Commentary {
        Commentary {
            sense: self.sense.clone(),
            why: self.why.clone(),
            view: self.view.clone(),
            question: self.question.clone(),
        }
    }

    /// True when the record carries the four structured fields.
    pub fn is_structured(&self) -> bool {
        self.commentary().is_complete()
    }

    /// Set the posted flag together with its metadata; the only way to mark a topic posted.
    pub fn mark_posted(&mut self, publication: Publication) {
        self.posted = true;
        self.publication = Some(publication);
    }

    /// Texts a translation must cover, in a fixed order.
    /// Structured: title, sense, why, view, question. Otherwise: title, text.
    pub fn translatable_fields(&self) -> Vec<String> {
        if self.is_structured() {
            vec![
                self.title.clone(),
                self.sense.clone(),
                self.why.clone(),
                self.view.clone(),
                self.question.clone(),
            ]
        } else {
            vec![self.title.clone(), self.text.clone().unwrap_or_default()]
        }
    }

    /// Build the derived record for `target` from translated fields (same order as
    /// [`Topic::translatable_fields`]). The result is unposted and keeps the
    /// original scheduling slot.
    pub fn derive_translated(
        &self,
        target: Language,
        translated: Vec<String>,
        id: String,
        now: DateTime<Utc>,
    ) -> Result<Topic, DeriveError> {
        if self.translated_from {
            return Err(DeriveError::SourceIsDerived(self.id.clone()));
        }
        let expected = self.translatable_fields().len();
        if translated.len() != expected {
            return Err(DeriveError::FieldCount {
                expected,
                got: translated.len(),
            });
        }

        let mut out = Topic {
            id,
            language: target,
            created_at: now,
            posted: false,
            publication: None,
            translated_from: true,
            source_language: Some(self.language),
            source_topic_id: Some(self.id.clone()),
            ..self.clone()
        };

        let mut it = translated.into_iter();
        out.title = it.next().unwrap_or_default();
        if self.is_structured() {
            out.sense = it.next().unwrap_or_default();
            out.why = it.next().unwrap_or_default();
            out.view = it.next().unwrap_or_default();
            out.question = it.next().unwrap_or_default();
        } else {
            out.text = it.next().filter(|t| !t.trim().is_empty());
        }
        Ok(out)
    }
}

/// First full hour strictly after `now`.
pub fn next_hour_boundary(now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = now.duration_trunc(Duration::hours(1)).unwrap_or(now);
    floor + Duration::hours(1)
}
