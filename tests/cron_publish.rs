// tests/cron_publish.rs
//
// Cron stage over the in-memory store: direct publishing, cross-language
// fallback, photo retry, lost compare-and-set races and translation failures.

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use newsdesk::error::StoreError;
use newsdesk::model::Language;
use newsdesk::notify::MessageKind;
use newsdesk::publish::{ChannelPublisher, ChannelTarget, CronParams, CronStage};
use newsdesk::store::{MemoryStore, TopicStore, Versioned};
use newsdesk::topic::{Publication, Topic};

use common::{topic, RecordingSender, StubTranslator};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 3, 9, 20, 0).unwrap()
}

fn channels(langs: &[Language]) -> BTreeMap<Language, ChannelTarget> {
    langs
        .iter()
        .map(|&l| {
            (
                l,
                ChannelTarget {
                    chat_id: format!("@daily_{}", l.code()),
                    handle: Some(format!("daily_{}", l.code())),
                },
            )
        })
        .collect()
}

fn stage(
    topics: Arc<dyn TopicStore>,
    translator: StubTranslator,
    sender: Arc<RecordingSender>,
    langs: &[Language],
) -> CronStage {
    CronStage {
        topics,
        translator: Arc::new(translator),
        publisher: ChannelPublisher::new(sender),
        channels: channels(langs),
        params: CronParams::default(),
    }
}

#[tokio::test]
async fn english_topic_feeds_all_three_channels() {
    let store = Arc::new(MemoryStore::new());
    store.put(topic("en-1", Language::En, t0()));
    let sender = Arc::new(RecordingSender::new());
    let cron = stage(store.clone(), StubTranslator::default(), sender.clone(), &Language::ALL);

    let now = t0() + Duration::hours(1);
    let result = cron.run(now).await;
    assert!(result.ok);
    assert_eq!(result.processed, Some(3));
    for lang in Language::ALL {
        assert_eq!(result.sent(lang), 1, "{lang}");
        assert_eq!(result.language(lang).unwrap().state, Some("published"));
    }

    let de_id = result.language(Language::De).unwrap().topic_id.clone().unwrap();
    let de = store.get(&de_id).expect("derived topic stored");
    assert!(de.translated_from);
    assert!(de.posted);
    assert_eq!(de.language, Language::De);
    assert_eq!(de.source_language, Some(Language::En));
    assert_eq!(de.source_topic_id.as_deref(), Some("en-1"));
    assert!(de.title.starts_with("[de] "));

    let en = store.get("en-1").unwrap();
    assert!(en.posted);
    let p = en.publication.expect("publication recorded");
    assert_eq!(p.channel_id, "@daily_en");
    assert_eq!(p.posted_at, now);
    assert_eq!(p.permalink, Some(format!("https://t.me/daily_en/{}", p.message_id)));

    let sent = sender.messages();
    assert_eq!(sent.len(), 3);
    let chats: Vec<&str> = sent.iter().map(|m| m.chat_id.as_str()).collect();
    assert_eq!(chats, vec!["@daily_ru", "@daily_en", "@daily_de"]);
    assert!(sent.iter().all(|m| m.button.is_some()));
}

#[tokio::test]
async fn immediate_second_tick_sends_nothing() {
    let store = Arc::new(MemoryStore::new());
    store.put(topic("en-1", Language::En, t0()));
    let sender = Arc::new(RecordingSender::new());
    let cron = stage(store.clone(), StubTranslator::default(), sender.clone(), &Language::ALL);

    let now = t0() + Duration::hours(1);
    cron.run(now).await;
    let second = cron.run(now + Duration::seconds(5)).await;

    assert!(second.ok);
    assert_eq!(second.processed, Some(0));
    for lang in Language::ALL {
        assert_eq!(second.sent(lang), 0);
    }
    assert_eq!(sender.messages().len(), 3);
    assert_eq!(store.topics().len(), 3, "no extra translations on the second tick");
}

#[tokio::test]
async fn own_language_topic_beats_fallback() {
    let store = Arc::new(MemoryStore::new());
    store.put(topic("en-1", Language::En, t0()));
    store.put(topic("de-old", Language::De, t0() - Duration::hours(3)));
    store.put(topic("de-new", Language::De, t0() - Duration::minutes(30)));
    let sender = Arc::new(RecordingSender::new());
    let cron = stage(store.clone(), StubTranslator::default(), sender, &[Language::De]);

    let result = cron.run(t0() + Duration::hours(1)).await;
    assert_eq!(result.sent(Language::De), 1);
    assert_eq!(
        result.language(Language::De).unwrap().topic_id.as_deref(),
        Some("de-new")
    );
    assert!(!store.get("de-old").unwrap().posted);
    assert!(!store.get("en-1").unwrap().posted);
}

#[tokio::test]
async fn rejected_photo_is_retried_as_text() {
    let store = Arc::new(MemoryStore::new());
    let mut t = topic("en-photo", Language::En, t0());
    t.image = "https://img.example.test/p.jpg".into();
    store.put(t);
    let sender = Arc::new(RecordingSender::rejecting_photos());
    let cron = stage(store.clone(), StubTranslator::default(), sender.clone(), &[Language::En]);

    let result = cron.run(t0() + Duration::hours(1)).await;
    assert_eq!(result.sent(Language::En), 1);

    let sent = sender.messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, MessageKind::Text);
    assert!(store.get("en-photo").unwrap().posted);
}

#[tokio::test]
async fn lost_race_counts_as_sent_and_reports_it() {
    let store = Arc::new(MemoryStore::new());
    store.put(topic("en-1", Language::En, t0()));

    // Another run marks the topic posted while our send is in flight.
    let rival = store.clone();
    let sender = Arc::new(RecordingSender::new().with_hook(move |_| {
        if let Some(mut t) = rival.get("en-1") {
            t.mark_posted(Publication {
                channel_id: "@daily_en".into(),
                message_id: 7,
                permalink: None,
                posted_at: t0(),
            });
            rival.put(t);
        }
    }));
    let cron = stage(store.clone(), StubTranslator::default(), sender.clone(), &[Language::En]);

    let result = cron.run(t0() + Duration::hours(1)).await;
    let en = result.language(Language::En).unwrap();
    assert_eq!(en.sent, Some(1));
    assert_eq!(en.state, Some("published"));
    assert!(en.errors.iter().any(|e| e.contains("posted flag not written")));

    // The rival's record is kept untouched.
    let stored = store.get("en-1").unwrap();
    assert!(stored.posted);
    assert_eq!(stored.publication.unwrap().message_id, 7);
}

#[tokio::test]
async fn failed_translation_skips_the_language() {
    let store = Arc::new(MemoryStore::new());
    store.put(topic("en-1", Language::En, t0()));
    let sender = Arc::new(RecordingSender::new());
    let cron = stage(
        store.clone(),
        StubTranslator {
            fail: true,
            ..Default::default()
        },
        sender.clone(),
        &Language::ALL,
    );

    let result = cron.run(t0() + Duration::hours(1)).await;
    assert!(result.ok);
    assert_eq!(result.processed, Some(1));
    for lang in [Language::Ru, Language::De] {
        let o = result.language(lang).unwrap();
        assert_eq!(o.sent, Some(0));
        assert_eq!(o.state, Some("skipped"));
        assert!(o.errors.iter().any(|e| e.contains("translation failed")), "{o:?}");
    }
    assert_eq!(result.sent(Language::En), 1);
    assert_eq!(store.topics().len(), 1, "nothing derived");
}

#[tokio::test]
async fn derived_topic_left_unposted_is_resumed() {
    let store = Arc::new(MemoryStore::new());
    let source = topic("en-1", Language::En, t0());
    let mut derived = source
        .derive_translated(
            Language::De,
            source.translatable_fields().into_iter().map(|f| format!("[de] {f}")).collect(),
            "de-derived".into(),
            t0(),
        )
        .unwrap();
    derived.created_at = t0() + Duration::minutes(1);
    store.put(source);
    store.put(derived);

    let sender = Arc::new(RecordingSender::new());
    let cron = stage(store.clone(), StubTranslator::default(), sender, &[Language::De]);

    let result = cron.run(t0() + Duration::hours(1)).await;
    assert_eq!(
        result.language(Language::De).unwrap().topic_id.as_deref(),
        Some("de-derived")
    );
    assert_eq!(store.topics().len(), 2, "no second translation");
}

#[tokio::test]
async fn headline_only_topic_can_seed_a_fallback() {
    let store = Arc::new(MemoryStore::new());
    let mut t = topic("en-bare", Language::En, t0());
    t.sense.clear();
    t.why.clear();
    t.view.clear();
    t.question.clear();
    store.put(t);
    let sender = Arc::new(RecordingSender::new());
    let cron = stage(store.clone(), StubTranslator::default(), sender.clone(), &[Language::De]);

    let result = cron.run(t0() + Duration::hours(1)).await;
    let de = result.language(Language::De).unwrap();
    assert_eq!(de.sent, Some(1), "{de:?}");
    let derived = store.get(de.topic_id.as_deref().unwrap()).unwrap();
    assert!(derived.title.starts_with("[de] "));
    assert_eq!(derived.text, None);
    assert_eq!(sender.messages().len(), 1);
}

#[tokio::test]
async fn schedule_window_is_enforced_when_enabled() {
    let store = Arc::new(MemoryStore::new());
    store.put(topic("en-1", Language::En, t0()));
    let sender = Arc::new(RecordingSender::new());
    let mut cron = stage(store.clone(), StubTranslator::default(), sender, &[Language::En]);
    cron.params.enforce_schedule_window = true;

    // scheduled for 10:00
    let early = cron.run(t0() + Duration::minutes(5)).await;
    assert_eq!(early.sent(Language::En), 0);
    assert!(!store.get("en-1").unwrap().posted);

    let on_time = cron.run(Utc.with_ymd_and_hms(2025, 6, 3, 10, 0, 0).unwrap()).await;
    assert_eq!(on_time.sent(Language::En), 1);
}

#[tokio::test]
async fn missing_channel_is_reported_per_language() {
    let store = Arc::new(MemoryStore::new());
    store.put(topic("en-1", Language::En, t0()));
    let sender = Arc::new(RecordingSender::new());
    let cron = stage(store, StubTranslator::default(), sender, &[Language::En]);

    let result = cron.run(t0() + Duration::hours(1)).await;
    assert_eq!(result.sent(Language::En), 1);
    let ru = result.language(Language::Ru).unwrap();
    assert_eq!(ru.state, Some("skipped"));
    assert!(ru.errors[0].contains("no channel configured"));
}

struct UnreachableStore;

#[async_trait]
impl TopicStore for UnreachableStore {
    async fn insert(&self, _topic: &Topic) -> Result<(), StoreError> {
        Err(unavailable())
    }
    async fn unposted(&self) -> Result<Vec<Topic>, StoreError> {
        Err(unavailable())
    }
    async fn by_language(&self, _language: Language) -> Result<Vec<Topic>, StoreError> {
        Err(unavailable())
    }
    async fn fetch_versioned(&self, _id: &str) -> Result<Versioned<Topic>, StoreError> {
        Err(unavailable())
    }
    async fn replace_if_version(&self, _topic: &Topic, _version: &str) -> Result<(), StoreError> {
        Err(unavailable())
    }
}

fn unavailable() -> StoreError {
    StoreError::Status {
        status: 503,
        body: "down".into(),
    }
}

#[tokio::test]
async fn unreadable_store_fails_the_run_without_sending() {
    let sender = Arc::new(RecordingSender::new());
    let cron = stage(Arc::new(UnreachableStore), StubTranslator::default(), sender.clone(), &Language::ALL);

    let result = cron.run(t0()).await;
    assert!(!result.ok);
    assert!(result.error.as_deref().unwrap().contains("topic store unavailable"));
    assert_eq!(result.processed, Some(0));
    assert!(sender.messages().is_empty());
}
