// src/outcome.rs
//! Run result returned by both stages and by the HTTP triggers.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::model::Language;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageOutcome {
    /// Cron stage: messages published (0 or 1).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent: Option<u32>,
    /// Fetch stage: topics written (0 or 1).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepared: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
    /// Terminal state label, e.g. `published`, `skipped`, `no_candidate`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'static str>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepared: Option<u32>,
    pub per_language: BTreeMap<Language, LanguageOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResult {
    /// Short-circuit result for a stage that could not be wired.
    pub fn config_failure(err: &ConfigError) -> Self {
        Self {
            ok: false,
            error: Some(err.to_string()),
            ..Self::default()
        }
    }

    pub fn language(&self, lang: Language) -> Option<&LanguageOutcome> {
        self.per_language.get(&lang)
    }

    pub fn sent(&self, lang: Language) -> u32 {
        self.language(lang).and_then(|o| o.sent).unwrap_or(0)
    }
}
