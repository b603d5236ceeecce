//! Per-Tab State Store
//!
//! Latest resolved media locator per tab, kept in the host's session storage
//! so it survives the background service being suspended and woken.
//!
//! There are no locks and no read-modify-write: every operation is a single
//! storage call, applied by the host in issue order. A `clear` issued after a
//! `put` therefore wins even if the `put` reports completion later.

use crate::classifier::Classifier;
use crate::host::{HostError, SessionStorage};
use crate::types::TabId;

/// Error type for store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("no tab for id {0}")]
    InvalidTab(TabId),
    #[error("not a media locator: {0}")]
    NotALocator(String),
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Storage key for a tab.
pub fn tab_key(tab_id: TabId) -> String {
    format!("mp4_{tab_id}")
}

/// View over session storage keyed by tab id.
pub struct TabStore<'a, S: SessionStorage> {
    storage: &'a S,
    classifier: &'a Classifier,
}

impl<'a, S: SessionStorage> TabStore<'a, S> {
    pub fn new(storage: &'a S, classifier: &'a Classifier) -> Self {
        Self { storage, classifier }
    }

    /// Overwrite the tab's resolved locator.
    pub async fn put(&self, tab_id: TabId, url: &str) -> Result<(), StoreError> {
        if tab_id < 0 {
            return Err(StoreError::InvalidTab(tab_id));
        }
        if !self.classifier.is_media_locator(url) {
            return Err(StoreError::NotALocator(url.to_string()));
        }
        self.storage.set(&tab_key(tab_id), url).await?;
        Ok(())
    }

    /// The tab's resolved locator, or `None` if nothing was stored yet.
    pub async fn get(&self, tab_id: TabId) -> Result<Option<String>, StoreError> {
        if tab_id < 0 {
            return Ok(None);
        }
        Ok(self.storage.get(&tab_key(tab_id)).await?)
    }

    /// Drop the tab's locator. Clearing an absent entry is a no-op.
    pub async fn clear(&self, tab_id: TabId) -> Result<(), StoreError> {
        if tab_id < 0 {
            return Ok(());
        }
        self.storage.remove(&tab_key(tab_id)).await?;
        Ok(())
    }
}
