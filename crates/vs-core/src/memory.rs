//! In-memory host
//!
//! Implements every host trait with plain `RefCell` state and records the
//! side effects it was asked to perform. Used by tests and by the CLI replay
//! command.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use crate::host::{Downloads, HostError, RuleEngine, SessionStorage, Tabs};
use crate::suppressor::BlockRule;
use crate::types::{DownloadId, TabId};

/// A download the host was asked to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadCall {
    pub id: DownloadId,
    pub url: String,
    pub save_as: bool,
}

/// A tab navigation the host was asked to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabCall {
    Update { tab_id: TabId, url: String },
    Create { url: String },
}

#[derive(Clone, Copy)]
enum Facility {
    Storage,
    Downloads,
    Tabs,
    Rules,
}

#[derive(Debug, Default)]
struct Failures {
    storage: Option<String>,
    downloads: Option<String>,
    tabs: Option<String>,
    rules: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    session: RefCell<HashMap<String, String>>,
    rules: RefCell<BTreeMap<u32, BlockRule>>,
    downloads: RefCell<Vec<DownloadCall>>,
    tab_calls: RefCell<Vec<TabCall>>,
    next_download_id: Cell<DownloadId>,
    failures: RefCell<Failures>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            next_download_id: Cell::new(1),
            ..Default::default()
        }
    }

    pub fn fail_storage(&self, message: &str) {
        self.failures.borrow_mut().storage = Some(message.to_string());
    }

    pub fn fail_downloads(&self, message: &str) {
        self.failures.borrow_mut().downloads = Some(message.to_string());
    }

    pub fn fail_tabs(&self, message: &str) {
        self.failures.borrow_mut().tabs = Some(message.to_string());
    }

    pub fn fail_rules(&self, message: &str) {
        self.failures.borrow_mut().rules = Some(message.to_string());
    }

    /// Clear every injected failure.
    pub fn recover(&self) {
        *self.failures.borrow_mut() = Failures::default();
    }

    /// Insert a rule directly, bypassing the replace call.
    pub fn seed_rule(&self, rule: BlockRule) {
        self.rules.borrow_mut().insert(rule.id, rule);
    }

    pub fn session_entries(&self) -> BTreeMap<String, String> {
        self.session.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    pub fn installed_rules(&self) -> Vec<BlockRule> {
        self.rules.borrow().values().cloned().collect()
    }

    pub fn downloads(&self) -> Vec<DownloadCall> {
        self.downloads.borrow().clone()
    }

    pub fn tab_calls(&self) -> Vec<TabCall> {
        self.tab_calls.borrow().clone()
    }

    fn check(&self, facility: Facility) -> Option<String> {
        let failures = self.failures.borrow();
        match facility {
            Facility::Storage => failures.storage.clone(),
            Facility::Downloads => failures.downloads.clone(),
            Facility::Tabs => failures.tabs.clone(),
            Facility::Rules => failures.rules.clone(),
        }
    }
}

impl SessionStorage for MemoryHost {
    async fn get(&self, key: &str) -> Result<Option<String>, HostError> {
        if let Some(msg) = self.check(Facility::Storage) {
            return Err(HostError::Storage(msg));
        }
        Ok(self.session.borrow().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), HostError> {
        if let Some(msg) = self.check(Facility::Storage) {
            return Err(HostError::Storage(msg));
        }
        self.session.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), HostError> {
        if let Some(msg) = self.check(Facility::Storage) {
            return Err(HostError::Storage(msg));
        }
        self.session.borrow_mut().remove(key);
        Ok(())
    }
}

impl Downloads for MemoryHost {
    async fn download(&self, url: &str, save_as: bool) -> Result<DownloadId, HostError> {
        if let Some(msg) = self.check(Facility::Downloads) {
            return Err(HostError::Download(msg));
        }
        let id = self.next_download_id.get();
        self.next_download_id.set(id + 1);
        self.downloads.borrow_mut().push(DownloadCall {
            id,
            url: url.to_string(),
            save_as,
        });
        Ok(id)
    }
}

impl Tabs for MemoryHost {
    async fn update(&self, tab_id: TabId, url: &str) -> Result<(), HostError> {
        if let Some(msg) = self.check(Facility::Tabs) {
            return Err(HostError::Tabs(msg));
        }
        self.tab_calls.borrow_mut().push(TabCall::Update {
            tab_id,
            url: url.to_string(),
        });
        Ok(())
    }

    async fn create(&self, url: &str) -> Result<(), HostError> {
        if let Some(msg) = self.check(Facility::Tabs) {
            return Err(HostError::Tabs(msg));
        }
        self.tab_calls.borrow_mut().push(TabCall::Create { url: url.to_string() });
        Ok(())
    }
}

impl RuleEngine for MemoryHost {
    async fn update_dynamic_rules(&self, remove_ids: &[u32], add: &[BlockRule]) -> Result<(), HostError> {
        if let Some(msg) = self.check(Facility::Rules) {
            return Err(HostError::Rules(msg));
        }

        // The update is atomic: validate against the post-removal set first.
        let mut next = self.rules.borrow().clone();
        for id in remove_ids {
            next.remove(id);
        }
        for rule in add {
            if next.insert(rule.id, rule.clone()).is_some() {
                return Err(HostError::Rules(format!("Rule with id {} does not have a unique ID", rule.id)));
            }
        }

        *self.rules.borrow_mut() = next;
        Ok(())
    }

    async fn dynamic_rule_ids(&self) -> Result<Vec<u32>, HostError> {
        if let Some(msg) = self.check(Facility::Rules) {
            return Err(HostError::Rules(msg));
        }
        Ok(self.rules.borrow().keys().copied().collect())
    }
}
