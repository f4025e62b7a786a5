// src/store/memory.rs
//! In-memory backend. Versions are a per-store counter, bumped on every write.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::StoreError;
use crate::ingest::dedup::CooldownEntry;
use crate::model::Language;
use crate::store::{CooldownStore, TopicStore, Versioned};
use crate::topic::Topic;

#[derive(Default)]
struct State {
    next_version: u64,
    topics: BTreeMap<String, (Topic, u64)>,
    cooldown: HashMap<Language, CooldownEntry>,
}

impl State {
    fn bump(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every stored topic, ordered by id.
    pub fn topics(&self) -> Vec<Topic> {
        self.lock().topics.values().map(|(t, _)| t.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<Topic> {
        self.lock().topics.get(id).map(|(t, _)| t.clone())
    }

    pub fn cooldown(&self, language: Language) -> Option<CooldownEntry> {
        self.lock().cooldown.get(&language).cloned()
    }

    /// Unconditional write, used to seed state.
    pub fn put(&self, topic: Topic) {
        let mut st = self.lock();
        let v = st.bump();
        st.topics.insert(topic.id.clone(), (topic, v));
    }
}

#[async_trait]
impl TopicStore for MemoryStore {
    async fn insert(&self, topic: &Topic) -> Result<(), StoreError> {
        let mut st = self.lock();
        if st.topics.contains_key(&topic.id) {
            return Err(StoreError::Conflict(format!("topics/{}", topic.id)));
        }
        let v = st.bump();
        st.topics.insert(topic.id.clone(), (topic.clone(), v));
        Ok(())
    }

    async fn unposted(&self) -> Result<Vec<Topic>, StoreError> {
        Ok(self
            .lock()
            .topics
            .values()
            .filter(|(t, _)| !t.posted)
            .map(|(t, _)| t.clone())
            .collect())
    }

    async fn by_language(&self, language: Language) -> Result<Vec<Topic>, StoreError> {
        Ok(self
            .lock()
            .topics
            .values()
            .filter(|(t, _)| t.language == language)
            .map(|(t, _)| t.clone())
            .collect())
    }

    async fn fetch_versioned(&self, id: &str) -> Result<Versioned<Topic>, StoreError> {
        self.lock()
            .topics
            .get(id)
            .map(|(t, v)| Versioned {
                value: t.clone(),
                version: v.to_string(),
            })
            .ok_or_else(|| StoreError::NotFound(format!("topics/{id}")))
    }

    async fn replace_if_version(&self, topic: &Topic, version: &str) -> Result<(), StoreError> {
        let mut st = self.lock();
        let current = st
            .topics
            .get(&topic.id)
            .map(|(_, v)| v.to_string())
            .ok_or_else(|| StoreError::NotFound(format!("topics/{}", topic.id)))?;
        if current != version {
            return Err(StoreError::Conflict(format!("topics/{}", topic.id)));
        }
        let v = st.bump();
        st.topics.insert(topic.id.clone(), (topic.clone(), v));
        Ok(())
    }
}

#[async_trait]
impl CooldownStore for MemoryStore {
    async fn load(&self, language: Language) -> Result<CooldownEntry, StoreError> {
        Ok(self.lock().cooldown.get(&language).cloned().unwrap_or_default())
    }

    async fn save(&self, language: Language, entry: &CooldownEntry) -> Result<(), StoreError> {
        self.lock().cooldown.insert(language, entry.clone());
        Ok(())
    }
}
