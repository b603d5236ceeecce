//! Browser host interfaces
//!
//! Every browser facility the pipeline touches is an awaitable call that
//! returns a result. Bindings implement these traits on top of the real
//! extension APIs; [`crate::memory::MemoryHost`] implements them in memory.
//!
//! Futures are not required to be `Send`: the pipeline runs on a single
//! cooperative event loop.

#![allow(async_fn_in_trait)]

use crate::suppressor::BlockRule;
use crate::types::{DownloadId, TabId};

/// Error reported by a host API call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("storage: {0}")]
    Storage(String),
    #[error("download: {0}")]
    Download(String),
    #[error("tabs: {0}")]
    Tabs(String),
    #[error("rules: {0}")]
    Rules(String),
}

impl HostError {
    /// The host's own message, without the facility prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Storage(msg) | Self::Download(msg) | Self::Tabs(msg) | Self::Rules(msg) => msg,
        }
    }
}

/// Session-scoped key/value storage.
pub trait SessionStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, HostError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), HostError>;
    async fn remove(&self, key: &str) -> Result<(), HostError>;
}

/// The browser download manager.
pub trait Downloads {
    async fn download(&self, url: &str, save_as: bool) -> Result<DownloadId, HostError>;
}

/// Tab navigation.
pub trait Tabs {
    async fn update(&self, tab_id: TabId, url: &str) -> Result<(), HostError>;
    async fn create(&self, url: &str) -> Result<(), HostError>;
}

/// The declarative request-blocking engine.
pub trait RuleEngine {
    /// Remove `remove_ids` and add `add` in one update.
    async fn update_dynamic_rules(&self, remove_ids: &[u32], add: &[BlockRule]) -> Result<(), HostError>;
    async fn dynamic_rule_ids(&self) -> Result<Vec<u32>, HostError>;
}

/// Everything the background service needs from the browser.
pub trait Host: SessionStorage + Downloads + Tabs + RuleEngine {}

impl<T: SessionStorage + Downloads + Tabs + RuleEngine> Host for T {}
