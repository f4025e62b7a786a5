// src/config/mod.rs
//! Deployment settings, read once from the environment.
//!
//! Reading never fails on a *missing* value; required values are checked when
//! a stage is wired (see `bootstrap`), so one stage can run while the other
//! is misconfigured.

pub mod sources;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::model::Language;
use crate::notify::telegram::DEFAULT_API_BASE;

pub const DEFAULT_TRUSTED_HEADER: &str = "x-cron-trigger";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_FETCH_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Remote,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub store_backend: StoreBackend,
    pub store_url: Option<String>,
    pub store_auth: Option<String>,

    pub telegram_bot_token: Option<String>,
    pub telegram_api_base: String,
    pub channels: BTreeMap<Language, String>,
    pub channel_handles: BTreeMap<Language, String>,

    pub cron_secret: Option<String>,
    pub cron_trusted_header: String,

    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub ai_mock: bool,

    pub feed_sources_path: Option<PathBuf>,
    pub relevance_rules_path: Option<PathBuf>,
    pub fetch_timeout: Duration,
    pub enforce_schedule_window: bool,

    pub scheduler_enabled: bool,
    pub fetch_interval: Duration,
    pub log_json: bool,
}

fn channel_key(lang: Language) -> &'static str {
    match lang {
        Language::Ru => "CHANNEL_RU",
        Language::En => "CHANNEL_EN",
        Language::De => "CHANNEL_DE",
    }
}

fn handle_key(lang: Language) -> &'static str {
    match lang {
        Language::Ru => "CHANNEL_HANDLE_RU",
        Language::En => "CHANNEL_HANDLE_EN",
        Language::De => "CHANNEL_HANDLE_DE",
    }
}

fn is_truthy(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_vars<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let flag = |k: &str| var(k).is_some_and(|v| is_truthy(&v));
        let secs = |k: &'static str, default: u64| -> Result<Duration, ConfigError> {
            match var(k) {
                None => Ok(Duration::from_secs(default)),
                Some(v) => match v.parse::<u64>() {
                    Ok(n) if n > 0 => Ok(Duration::from_secs(n)),
                    _ => Err(ConfigError::Invalid {
                        key: k,
                        reason: format!("expected a positive number of seconds, got `{v}`"),
                    }),
                },
            }
        };

        let store_backend = match var("STORE_BACKEND").as_deref().map(str::to_ascii_lowercase) {
            None => StoreBackend::Remote,
            Some(b) if b == "remote" => StoreBackend::Remote,
            Some(b) if b == "memory" => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    reason: format!("expected `remote` or `memory`, got `{other}`"),
                })
            }
        };

        let mut channels = BTreeMap::new();
        let mut channel_handles = BTreeMap::new();
        for lang in Language::ALL {
            if let Some(c) = var(channel_key(lang)) {
                channels.insert(lang, c);
            }
            if let Some(h) = var(handle_key(lang)) {
                channel_handles.insert(lang, h.trim_start_matches('@').to_string());
            }
        }

        Ok(Self {
            store_backend,
            store_url: var("STORE_URL"),
            store_auth: var("STORE_AUTH"),
            telegram_bot_token: var("TELEGRAM_BOT_TOKEN"),
            telegram_api_base: var("TELEGRAM_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            channels,
            channel_handles,
            cron_secret: var("CRON_SECRET"),
            cron_trusted_header: var("CRON_TRUSTED_HEADER")
                .unwrap_or_else(|| DEFAULT_TRUSTED_HEADER.to_string())
                .to_ascii_lowercase(),
            openai_api_key: var("OPENAI_API_KEY"),
            openai_model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_base_url: var("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            ai_mock: var("AI_TEST_MODE").is_some_and(|v| v.eq_ignore_ascii_case("mock")),
            feed_sources_path: var(sources::ENV_FEED_SOURCES_PATH).map(PathBuf::from),
            relevance_rules_path: var(crate::relevance::ENV_RELEVANCE_RULES_PATH).map(PathBuf::from),
            fetch_timeout: secs("FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT_SECS)?,
            enforce_schedule_window: flag("ENFORCE_SCHEDULE_WINDOW"),
            scheduler_enabled: flag("SCHEDULER_ENABLED"),
            fetch_interval: secs("FETCH_INTERVAL_SECS", DEFAULT_FETCH_INTERVAL_SECS)?,
            log_json: var("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }

    /// Channel id for every language, or the first missing key.
    pub fn require_channels(&self) -> Result<&BTreeMap<Language, String>, ConfigError> {
        for lang in Language::ALL {
            if !self.channels.contains_key(&lang) {
                return Err(ConfigError::Missing(channel_key(lang)));
            }
        }
        Ok(&self.channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_vars(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.store_backend, StoreBackend::Remote);
        assert_eq!(s.cron_trusted_header, DEFAULT_TRUSTED_HEADER);
        assert_eq!(s.fetch_timeout, Duration::from_secs(15));
        assert_eq!(s.telegram_api_base, DEFAULT_API_BASE);
        assert!(!s.ai_mock && !s.enforce_schedule_window && !s.scheduler_enabled);
        assert_eq!(s.require_channels().unwrap_err(), ConfigError::Missing("CHANNEL_RU"));
    }

    #[test]
    fn reads_channels_handles_and_flags() {
        let s = settings(&[
            ("STORE_BACKEND", "Memory"),
            ("CHANNEL_RU", "-1001"),
            ("CHANNEL_EN", "-1002"),
            ("CHANNEL_DE", "-1003"),
            ("CHANNEL_HANDLE_DE", "@digest_de"),
            ("AI_TEST_MODE", "mock"),
            ("ENFORCE_SCHEDULE_WINDOW", "1"),
            ("CRON_TRUSTED_HEADER", "X-Appengine-Cron"),
            ("FETCH_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(s.store_backend, StoreBackend::Memory);
        assert_eq!(s.require_channels().unwrap().len(), 3);
        assert_eq!(s.channel_handles.get(&Language::De).map(String::as_str), Some("digest_de"));
        assert!(s.ai_mock && s.enforce_schedule_window);
        assert_eq!(s.cron_trusted_header, "x-appengine-cron");
        assert_eq!(s.fetch_timeout, Duration::from_secs(5));
    }

    #[test]
    fn blank_values_are_unset() {
        let s = settings(&[("CRON_SECRET", "  "), ("STORE_URL", "")]).unwrap();
        assert!(s.cron_secret.is_none());
        assert!(s.store_url.is_none());
    }

    #[test]
    fn invalid_values_are_reported_by_key() {
        match settings(&[("FETCH_TIMEOUT_SECS", "soon")]) {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "FETCH_TIMEOUT_SECS"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            settings(&[("STORE_BACKEND", "sqlite")]),
            Err(ConfigError::Invalid { key: "STORE_BACKEND", .. })
        ));
    }
}
