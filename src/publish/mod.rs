// src/publish/mod.rs
//! Cron stage: one publication per language per tick.
//!
//! Per language the tick resolves to one of
//! `NoCandidate -> DirectPublish | FallbackTranslate -> Published | Skipped`.
//! Candidates come from a snapshot taken once at tick start.

pub mod channel;
pub mod fallback;

use chrono::{DateTime, Utc};
use metrics::gauge;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

use crate::analyze::DynTranslator;
use crate::model::Language;
use crate::outcome::{LanguageOutcome, RunResult};
use crate::store::DynTopicStore;
use crate::topic::Topic;

pub use channel::{ChannelPublisher, ChannelTarget, PublishOutcome};

#[derive(Debug, Clone, Copy, Default)]
pub struct CronParams {
    /// Only consider topics whose `scheduledFor` has passed.
    pub enforce_schedule_window: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CronState {
    NoCandidate,
    /// An own-language topic, or a translated one left from an earlier tick.
    DirectPublish(Topic),
    /// A topic from another language that still needs translating.
    FallbackTranslate(Topic),
    Published { topic_id: String, message_id: i64 },
    Skipped { reason: String },
}

impl CronState {
    pub fn label(&self) -> &'static str {
        match self {
            CronState::NoCandidate => "no_candidate",
            CronState::DirectPublish(_) => "direct_publish",
            CronState::FallbackTranslate(_) => "fallback_translate",
            CronState::Published { .. } => "published",
            CronState::Skipped { .. } => "skipped",
        }
    }
}

/// Unposted topics plus, per language, the source ids that already have a
/// translation there.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub unposted: Vec<Topic>,
    pub translated_sources: BTreeMap<Language, HashSet<String>>,
}

impl Snapshot {
    fn eligible<'a>(&'a self, params: CronParams, now: DateTime<Utc>) -> impl Iterator<Item = &'a Topic> + 'a {
        self.unposted
            .iter()
            .filter(move |t| !params.enforce_schedule_window || t.scheduled_for <= now)
    }

    /// Resolve the first transition for `lang`.
    pub fn choose(&self, lang: Language, params: CronParams, now: DateTime<Utc>) -> CronState {
        let direct = self
            .eligible(params, now)
            .filter(|t| t.language == lang && !t.translated_from)
            .max_by_key(|t| t.created_at);
        if let Some(t) = direct {
            return CronState::DirectPublish(t.clone());
        }

        let resume = self
            .eligible(params, now)
            .filter(|t| t.language == lang && t.translated_from)
            .max_by_key(|t| t.created_at);
        if let Some(t) = resume {
            return CronState::DirectPublish(t.clone());
        }

        let done = self.translated_sources.get(&lang);
        let fallback = self
            .eligible(params, now)
            .filter(|t| t.language != lang && !t.translated_from)
            .filter(|t| done.map_or(true, |ids| !ids.contains(&t.id)))
            .max_by_key(|t| (t.language == Language::En, t.created_at));
        match fallback {
            Some(t) => CronState::FallbackTranslate(t.clone()),
            None => CronState::NoCandidate,
        }
    }

    fn note_translation(&mut self, lang: Language, source_id: &str) {
        self.translated_sources
            .entry(lang)
            .or_default()
            .insert(source_id.to_string());
    }
}

pub struct CronStage {
    pub topics: DynTopicStore,
    pub translator: DynTranslator,
    pub publisher: ChannelPublisher,
    pub channels: BTreeMap<Language, ChannelTarget>,
    pub params: CronParams,
}

impl CronStage {
    pub async fn snapshot(&self) -> Result<Snapshot, crate::error::StoreError> {
        let unposted = self.topics.unposted().await?;
        let mut translated_sources = BTreeMap::new();
        for lang in Language::ALL {
            let ids: HashSet<String> = self
                .topics
                .by_language(lang)
                .await?
                .into_iter()
                .filter(|t| t.translated_from)
                .filter_map(|t| t.source_topic_id)
                .collect();
            translated_sources.insert(lang, ids);
        }
        Ok(Snapshot {
            unposted,
            translated_sources,
        })
    }

    pub async fn run(&self, now: DateTime<Utc>) -> RunResult {
        let mut result = RunResult {
            ok: true,
            ..RunResult::default()
        };

        let mut snapshot = match self.snapshot().await {
            Ok(s) => s,
            Err(e) => {
                warn!(target: "cron", error = %e, "could not read topics");
                result.ok = false;
                result.error = Some(format!("topic store unavailable: {e}"));
                for lang in Language::ALL {
                    result.per_language.insert(
                        lang,
                        LanguageOutcome {
                            sent: Some(0),
                            ..Default::default()
                        },
                    );
                }
                result.processed = Some(0);
                return result;
            }
        };

        let mut sent_total = 0;
        for lang in Language::ALL {
            let outcome = self.run_language(&mut snapshot, lang, now).await;
            sent_total += outcome.sent.unwrap_or(0);
            result.per_language.insert(lang, outcome);
        }
        result.processed = Some(sent_total);
        gauge!("pipeline_last_run_ts", "stage" => "cron").set(now.timestamp() as f64);
        info!(target: "cron", sent = sent_total, "cron run finished");
        result
    }

    async fn run_language(&self, snapshot: &mut Snapshot, lang: Language, now: DateTime<Utc>) -> LanguageOutcome {
        let mut out = LanguageOutcome {
            sent: Some(0),
            ..Default::default()
        };
        let Some(target) = self.channels.get(&lang) else {
            out.state = Some("skipped");
            out.errors.push(format!("no channel configured for {lang}"));
            return out;
        };

        let state = snapshot.choose(lang, self.params, now);
        info!(target: "cron", lang = %lang, state = state.label(), "candidate resolved");

        let topic = match state {
            CronState::DirectPublish(t) => t,
            CronState::FallbackTranslate(source) => {
                match fallback::translate_and_store(self.translator.as_ref(), self.topics.as_ref(), &source, lang, now)
                    .await
                {
                    Ok(derived) => {
                        snapshot.note_translation(lang, &source.id);
                        derived
                    }
                    Err(e) => {
                        warn!(target: "cron", lang = %lang, source_topic = %source.id, error = %e, "fallback skipped");
                        out.state = Some("skipped");
                        out.errors.push(e.to_string());
                        return out;
                    }
                }
            }
            CronState::NoCandidate => {
                out.state = Some("skipped");
                return out;
            }
            other => {
                out.state = Some(other.label());
                return out;
            }
        };

        out.topic_id = Some(topic.id.clone());
        let end = match self.publisher.publish(self.topics.as_ref(), &topic.id, target, now).await {
            Ok(PublishOutcome::Published(p)) => {
                out.sent = Some(1);
                CronState::Published {
                    topic_id: topic.id.clone(),
                    message_id: p.message_id,
                }
            }
            Ok(PublishOutcome::Unrecorded { publication, error }) => {
                out.sent = Some(1);
                out.errors.push(format!("posted flag not written: {error}"));
                CronState::Published {
                    topic_id: topic.id.clone(),
                    message_id: publication.message_id,
                }
            }
            Ok(PublishOutcome::AlreadyPosted) => CronState::Skipped {
                reason: "already posted".into(),
            },
            Err(e) => {
                warn!(target: "cron", lang = %lang, topic = %topic.id, error = %e, "publish failed");
                out.errors.push(e.to_string());
                CronState::Skipped { reason: e.to_string() }
            }
        };
        out.state = Some(end.label());
        out
    }
}
