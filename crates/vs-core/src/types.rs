//! Core type definitions for VCloud Saver
//!
//! These types mirror the shapes of the browser's network and navigation
//! events and are used throughout the resolution pipeline.

use serde::Deserialize;

/// Browser-assigned tab identifier. Negative for requests outside a tab.
pub type TabId = i32;

/// Opaque identifier returned by the download manager.
pub type DownloadId = i64;

/// Frame id of a tab's top-level document.
pub const MAIN_FRAME_ID: i32 = 0;

// =============================================================================
// Resource Types (bit mask for type filtering)
// =============================================================================

bitflags::bitflags! {
    /// Resource type bit mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceType: u32 {
        const OTHER = 1 << 0;
        const SCRIPT = 1 << 1;
        const IMAGE = 1 << 2;
        const STYLESHEET = 1 << 3;
        const OBJECT = 1 << 4;
        const SUB_FRAME = 1 << 5;
        const MAIN_FRAME = 1 << 6;
        const XMLHTTPREQUEST = 1 << 7;
        const WEBSOCKET = 1 << 8;
        const FONT = 1 << 9;
        const MEDIA = 1 << 10;
        const PING = 1 << 11;
        const CSP_REPORT = 1 << 12;

        /// Document types (main_frame + sub_frame)
        const DOCUMENT = Self::MAIN_FRAME.bits() | Self::SUB_FRAME.bits();
    }
}

const TYPE_NAMES: &[(ResourceType, &str)] = &[
    (ResourceType::MAIN_FRAME, "main_frame"),
    (ResourceType::SUB_FRAME, "sub_frame"),
    (ResourceType::STYLESHEET, "stylesheet"),
    (ResourceType::SCRIPT, "script"),
    (ResourceType::IMAGE, "image"),
    (ResourceType::FONT, "font"),
    (ResourceType::OBJECT, "object"),
    (ResourceType::XMLHTTPREQUEST, "xmlhttprequest"),
    (ResourceType::PING, "ping"),
    (ResourceType::CSP_REPORT, "csp_report"),
    (ResourceType::MEDIA, "media"),
    (ResourceType::WEBSOCKET, "websocket"),
    (ResourceType::OTHER, "other"),
];

impl ResourceType {
    /// Parse from browser resource type string.
    pub fn from_browser_name(s: &str) -> Self {
        TYPE_NAMES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(ty, _)| *ty)
            .unwrap_or(Self::OTHER)
    }

    /// Browser names of every type set in this mask, in a stable order.
    pub fn names(self) -> Vec<&'static str> {
        TYPE_NAMES
            .iter()
            .filter(|(ty, _)| self.contains(*ty))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl<'de> Deserialize<'de> for ResourceType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_browser_name(&name))
    }
}

fn default_tab_id() -> TabId {
    -1
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_resource_type() -> ResourceType {
    ResourceType::OTHER
}

// =============================================================================
// Event Details
// =============================================================================

/// An outgoing request as reported by the before-request event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    pub url: String,
    #[serde(default = "default_tab_id")]
    pub tab_id: TabId,
    #[serde(default)]
    pub frame_id: i32,
    #[serde(rename = "type", default = "default_resource_type")]
    pub resource_type: ResourceType,
    #[serde(default = "default_method")]
    pub method: String,
    /// Origin of the page that issued the request, if any.
    #[serde(default)]
    pub initiator: Option<String>,
}

/// A server-issued redirect as reported by the before-redirect event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectDetails {
    pub url: String,
    pub redirect_url: String,
    #[serde(default = "default_tab_id")]
    pub tab_id: TabId,
    #[serde(default)]
    pub frame_id: i32,
    #[serde(rename = "type", default = "default_resource_type")]
    pub resource_type: ResourceType,
}

/// A committed navigation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationDetails {
    pub url: String,
    pub tab_id: TabId,
    #[serde(default)]
    pub frame_id: i32,
}

impl NavigationDetails {
    pub fn is_top_level(&self) -> bool {
        self.frame_id == MAIN_FRAME_ID
    }
}

/// The sender of a runtime message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageSender {
    /// Tab the message came from; absent for extension pages opened outside a tab.
    pub tab_id: Option<TabId>,
}

impl MessageSender {
    pub fn from_tab(tab_id: TabId) -> Self {
        Self { tab_id: Some(tab_id) }
    }
}
