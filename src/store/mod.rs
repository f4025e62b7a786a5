// src/store/mod.rs
//! Persistence seams: topic records and per-language cooldown documents.
//!
//! Two backends share the traits: a Firebase-style REST JSON store for
//! deployments and an in-memory store for tests and local runs.

pub mod memory;
pub mod remote;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::StoreError;
use crate::ingest::dedup::CooldownEntry;
use crate::model::Language;
use crate::topic::Topic;

pub use memory::MemoryStore;
pub use remote::{RemoteStore, RemoteStoreConfig};

/// A value together with the opaque version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: String,
}

#[async_trait]
pub trait TopicStore: Send + Sync {
    /// Create a new record under `topic.id`.
    async fn insert(&self, topic: &Topic) -> Result<(), StoreError>;

    /// Every topic with `posted == false`, any language.
    async fn unposted(&self) -> Result<Vec<Topic>, StoreError>;

    /// Every topic in `language`, posted or not.
    async fn by_language(&self, language: Language) -> Result<Vec<Topic>, StoreError>;

    async fn fetch_versioned(&self, id: &str) -> Result<Versioned<Topic>, StoreError>;

    /// Compare-and-set: write `topic` only if the stored version still equals
    /// `version`. A lost race is `StoreError::Conflict`.
    async fn replace_if_version(&self, topic: &Topic, version: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CooldownStore: Send + Sync {
    /// Missing documents read as an empty entry.
    async fn load(&self, language: Language) -> Result<CooldownEntry, StoreError>;
    async fn save(&self, language: Language, entry: &CooldownEntry) -> Result<(), StoreError>;
}

pub type DynTopicStore = Arc<dyn TopicStore>;
pub type DynCooldownStore = Arc<dyn CooldownStore>;
