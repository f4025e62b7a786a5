// src/bootstrap.rs
//! Wires settings into runnable stages. Each stage is validated on its own;
//! a stage that cannot be wired keeps its `ConfigError` and every trigger of
//! it reports that error instead of running.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::analyze::ai_adapter::{build_services, AiSettings};
use crate::analyze::{DynAnalyst, DynTranslator};
use crate::config::sources::SourceRegistry;
use crate::config::{Settings, StoreBackend};
use crate::error::ConfigError;
use crate::ingest::fetcher::HttpFeedFetcher;
use crate::notify::TelegramSender;
use crate::pipeline::{FetchParams, FetchStage};
use crate::publish::{ChannelPublisher, ChannelTarget, CronParams, CronStage};
use crate::relevance::RuleTable;
use crate::store::{DynCooldownStore, DynTopicStore, MemoryStore, RemoteStore, RemoteStoreConfig};

pub struct Stores {
    pub topics: DynTopicStore,
    pub cooldowns: DynCooldownStore,
}

pub struct Stages {
    pub fetch: Result<Arc<FetchStage>, ConfigError>,
    pub cron: Result<Arc<CronStage>, ConfigError>,
}

impl Stages {
    pub fn from_settings(settings: &Settings) -> Self {
        let stores = build_stores(settings);
        let ai = build_language_services(settings);

        let fetch = match (&stores, &ai) {
            (Ok(s), Ok((analyst, translator))) => {
                build_fetch(settings, s, analyst.clone(), translator.clone()).map(Arc::new)
            }
            (Err(e), _) | (_, Err(e)) => Err(e.clone()),
        };
        let cron = match (&stores, &ai) {
            (Ok(s), Ok((_, translator))) => build_cron(settings, s, translator.clone()).map(Arc::new),
            (Err(e), _) | (_, Err(e)) => Err(e.clone()),
        };

        match &fetch {
            Ok(_) => info!("fetch stage ready"),
            Err(e) => warn!(error = %e, "fetch stage not configured"),
        }
        match &cron {
            Ok(_) => info!("cron stage ready"),
            Err(e) => warn!(error = %e, "cron stage not configured"),
        }
        Self { fetch, cron }
    }
}

pub fn build_stores(settings: &Settings) -> Result<Stores, ConfigError> {
    match settings.store_backend {
        StoreBackend::Memory => {
            let mem = Arc::new(MemoryStore::new());
            Ok(Stores {
                topics: mem.clone(),
                cooldowns: mem,
            })
        }
        StoreBackend::Remote => {
            let base_url = settings
                .store_url
                .clone()
                .ok_or(ConfigError::Missing("STORE_URL"))?;
            let remote = RemoteStore::new(&RemoteStoreConfig {
                base_url,
                auth: settings.store_auth.clone(),
                timeout: settings.fetch_timeout,
            })
            .map_err(|e| ConfigError::Invalid {
                key: "STORE_URL",
                reason: e.to_string(),
            })?;
            let remote = Arc::new(remote);
            Ok(Stores {
                topics: remote.clone(),
                cooldowns: remote,
            })
        }
    }
}

pub fn build_language_services(settings: &Settings) -> Result<(DynAnalyst, DynTranslator), ConfigError> {
    let api_key = match (&settings.openai_api_key, settings.ai_mock) {
        (_, true) => String::new(),
        (Some(k), false) => k.clone(),
        (None, false) => return Err(ConfigError::Missing("OPENAI_API_KEY")),
    };
    let ai = AiSettings {
        api_key,
        model: settings.openai_model.clone(),
        base_url: settings.openai_base_url.clone(),
        timeout: settings.fetch_timeout * 4,
    };
    build_services(&ai, settings.ai_mock).map_err(|e| ConfigError::Invalid {
        key: "OPENAI_API_KEY",
        reason: e.to_string(),
    })
}

fn build_fetch(
    settings: &Settings,
    stores: &Stores,
    analyst: DynAnalyst,
    translator: DynTranslator,
) -> Result<FetchStage, ConfigError> {
    let sources = SourceRegistry::load(settings.feed_sources_path.as_deref()).map_err(|e| {
        ConfigError::Invalid {
            key: "FEED_SOURCES_PATH",
            reason: format!("{e:#}"),
        }
    })?;
    let rules = RuleTable::load(settings.relevance_rules_path.as_deref()).map_err(|e| {
        ConfigError::Invalid {
            key: "RELEVANCE_RULES_PATH",
            reason: format!("{e:#}"),
        }
    })?;
    let fetcher = HttpFeedFetcher::new(settings.fetch_timeout).map_err(|e| ConfigError::Invalid {
        key: "FETCH_TIMEOUT_SECS",
        reason: e.to_string(),
    })?;
    info!(sources = sources.len(), rules = rules.rules.len(), "fetch inputs loaded");

    Ok(FetchStage {
        sources: sources.into_map(),
        fetcher: Arc::new(fetcher),
        rules,
        analyst,
        translator,
        topics: stores.topics.clone(),
        cooldowns: stores.cooldowns.clone(),
        params: FetchParams::default(),
    })
}

fn build_cron(settings: &Settings, stores: &Stores, translator: DynTranslator) -> Result<CronStage, ConfigError> {
    let token = settings
        .telegram_bot_token
        .clone()
        .ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
    let channels: BTreeMap<_, _> = settings
        .require_channels()?
        .iter()
        .map(|(lang, chat_id)| {
            (
                *lang,
                ChannelTarget {
                    chat_id: chat_id.clone(),
                    handle: settings.channel_handles.get(lang).cloned(),
                },
            )
        })
        .collect();
    let sender = TelegramSender::new(token, settings.telegram_api_base.clone(), settings.fetch_timeout)
        .map_err(|e| ConfigError::Invalid {
            key: "TELEGRAM_API_BASE",
            reason: e.to_string(),
        })?;

    Ok(CronStage {
        topics: stores.topics.clone(),
        translator,
        publisher: ChannelPublisher::new(Arc::new(sender)),
        channels,
        params: CronParams {
            enforce_schedule_window: settings.enforce_schedule_window,
        },
    })
}
