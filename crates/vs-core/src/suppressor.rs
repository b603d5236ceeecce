//! Playback Suppressor
//!
//! Declarative blocking rules that keep the site's own player from loading.
//! The rule set is derived from the config and re-declared wholesale on every
//! service wake: remove every known id, then add the set, in a single update.
//! A partially applied or stale rule set heals on the next wake.

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::host::{HostError, RuleEngine};
use crate::types::ResourceType;

/// Blocks the player entry point when a player host loads it.
pub const PLAYER_RULE_ID: u32 = 1;
/// Blocks media files on the media hosts requested from a player host.
pub const MEDIA_RULE_ID: u32 = 2;

/// Every rule id this extension owns. Used for removal and addition alike.
pub const RULE_IDS: [u32; 2] = [PLAYER_RULE_ID, MEDIA_RULE_ID];

const RULE_PRIORITY: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub kind: ActionType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub url_filter: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub request_domains: Vec<String>,
    pub initiator_domains: Vec<String>,
    pub resource_types: Vec<String>,
}

/// One declarative rule, in the browser's JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRule {
    pub id: u32,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

impl BlockRule {
    fn block(id: u32, condition: RuleCondition) -> Self {
        Self {
            id,
            priority: RULE_PRIORITY,
            action: RuleAction { kind: ActionType::Block },
            condition,
        }
    }
}

/// Outcome of a rule (re)installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuppressorStatus {
    /// Rules are installed; holds the ids the engine reports.
    Active(Vec<u32>),
    /// Installation failed; the pipeline keeps observing without blocking.
    ObservationOnly(HostError),
}

/// Owns the rule set derived from a config.
#[derive(Debug, Clone)]
pub struct Suppressor {
    rules: Vec<BlockRule>,
}

impl Suppressor {
    pub fn new(config: &Config) -> Self {
        Self { rules: build_rules(config) }
    }

    pub fn rules(&self) -> &[BlockRule] {
        &self.rules
    }

    /// Replace the installed rule set. Never fails: errors are logged and
    /// reported through the status.
    pub async fn ensure_rules<R: RuleEngine>(&self, engine: &R) -> SuppressorStatus {
        if let Err(e) = engine.update_dynamic_rules(&RULE_IDS, &self.rules).await {
            error!(target: "vcloud_saver", "ensure_rules failed: {e}");
            return SuppressorStatus::ObservationOnly(e);
        }

        match engine.dynamic_rule_ids().await {
            Ok(ids) => {
                info!(target: "vcloud_saver", "blocking rules active: {ids:?}");
                SuppressorStatus::Active(ids)
            }
            Err(e) => {
                warn!(target: "vcloud_saver", "rules installed but read-back failed: {e}");
                SuppressorStatus::Active(self.rules.iter().map(|r| r.id).collect())
            }
        }
    }
}

/// Build the declarative rule set for a config.
pub fn build_rules(config: &Config) -> Vec<BlockRule> {
    let mut rules = Vec::with_capacity(RULE_IDS.len());

    let player_types =
        ResourceType::MAIN_FRAME | ResourceType::SUB_FRAME | ResourceType::MEDIA | ResourceType::SCRIPT;
    rules.push(BlockRule::block(
        PLAYER_RULE_ID,
        RuleCondition {
            url_filter: config.player_path.clone(),
            request_domains: Vec::new(),
            initiator_domains: config.player_hosts.clone(),
            resource_types: player_types.names().into_iter().map(String::from).collect(),
        },
    ));

    if config.block_media_from_initiators && !config.media_hosts.is_empty() {
        let media_types = ResourceType::DOCUMENT | ResourceType::MEDIA | ResourceType::XMLHTTPREQUEST;
        rules.push(BlockRule::block(
            MEDIA_RULE_ID,
            RuleCondition {
                url_filter: format!(".{}", config.media_extension),
                request_domains: config.media_hosts.clone(),
                initiator_domains: config.player_hosts.clone(),
                resource_types: media_types.names().into_iter().map(String::from).collect(),
            },
        ));
    }

    rules
}
