//! Background service wiring
//!
//! Owns the classifier, the rule set and the host handle, and routes every
//! browser event to the component that handles it. Listener registration is
//! left to the binding, driven by [`Service::subscriptions`].

use log::info;
use url::Url;

use crate::classifier::Classifier;
use crate::config::{Config, ConfigError};
use crate::gateway::{Dispatch, Gateway, Request, Response};
use crate::host::Host;
use crate::navigation::{NavigationOutcome, NavigationWatcher};
use crate::observer::{observer_filter, NetworkObserver, Observation, RequestFilter};
use crate::suppressor::{Suppressor, SuppressorStatus};
use crate::types::{MessageSender, NavigationDetails, RedirectDetails, RequestDetails};

/// Browser events the service consumes.
#[derive(Debug, Clone)]
pub enum BrowserEvent {
    /// Extension installed or updated
    Installed,
    /// Browser profile started
    Startup,
    BeforeRequest(RequestDetails),
    BeforeRedirect(RedirectDetails),
    NavigationCommitted(NavigationDetails),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Rules(SuppressorStatus),
    Observed(Observation),
    Navigated(NavigationOutcome),
}

/// Every listener the binding must register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriptions {
    /// Before-request listener filter (observe only, never blocking)
    pub requests: RequestFilter,
    /// Before-redirect listener filter
    pub redirects: RequestFilter,
    /// Navigation commits are observed for every URL: any top-level commit
    /// may invalidate a tab.
    pub navigation_all_urls: bool,
    pub messages: bool,
    pub installed: bool,
    pub startup: bool,
}

pub struct Service<H: Host> {
    classifier: Classifier,
    suppressor: Suppressor,
    host: H,
    extension_base: Url,
}

impl<H: Host> Service<H> {
    /// Build the service from a config. `extension_base` is the root URL of
    /// the extension's own pages.
    pub fn new(config: Config, host: H, extension_base: Url) -> Result<Self, ConfigError> {
        let config = config.normalized().validated()?;
        Ok(Self {
            suppressor: Suppressor::new(&config),
            classifier: Classifier::new(config),
            host,
            extension_base,
        })
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn suppressor(&self) -> &Suppressor {
        &self.suppressor
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn subscriptions(&self) -> Subscriptions {
        let filter = observer_filter(&self.classifier);
        Subscriptions {
            redirects: filter.clone(),
            requests: filter,
            navigation_all_urls: true,
            messages: true,
            installed: true,
            startup: true,
        }
    }

    /// Run on every service wake, before any event is handled.
    pub async fn wake(&self) -> SuppressorStatus {
        info!(target: "vcloud_saver", "service started");
        self.suppressor.ensure_rules(&self.host).await
    }

    pub async fn dispatch(&self, event: &BrowserEvent) -> EventOutcome {
        match event {
            BrowserEvent::Installed | BrowserEvent::Startup => {
                EventOutcome::Rules(self.suppressor.ensure_rules(&self.host).await)
            }
            BrowserEvent::BeforeRequest(details) => {
                EventOutcome::Observed(self.observer().on_request(details).await)
            }
            BrowserEvent::BeforeRedirect(details) => {
                EventOutcome::Observed(self.observer().on_redirect(details).await)
            }
            BrowserEvent::NavigationCommitted(details) => EventOutcome::Navigated(
                NavigationWatcher::new(&self.classifier, &self.host, &self.extension_base)
                    .on_committed(details)
                    .await,
            ),
        }
    }

    pub fn route_message(&self, raw: &serde_json::Value, sender: &MessageSender) -> Dispatch {
        self.gateway().route(raw, sender)
    }

    pub async fn respond(&self, request: &Request, sender: &MessageSender) -> Response {
        self.gateway().respond(request, sender).await
    }

    pub async fn handle_message(&self, raw: &serde_json::Value, sender: &MessageSender) -> Option<Response> {
        self.gateway().handle(raw, sender).await
    }

    fn observer(&self) -> NetworkObserver<'_, H> {
        NetworkObserver::new(&self.classifier, &self.host)
    }

    fn gateway(&self) -> Gateway<'_, H> {
        Gateway::new(&self.classifier, &self.host, &self.extension_base)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::memory::MemoryHost;
    use crate::types::ResourceType;

    const PLAYER_URL: &str =
        "https://player.example/artplayer/index.html?url=%2Fvcloud%2Ff%2FabcDEF%2F123456%2F";
    const CANONICAL: &str = "https://player.example/vcloud/f/abcDEF/123456/";

    fn service() -> Service<MemoryHost> {
        let config = Config {
            player_hosts: vec!["player.example".to_string()],
            media_hosts: vec!["cdn.example".to_string()],
            ..Config::default()
        };
        Service::new(config, MemoryHost::new(), Url::parse("chrome-extension://extid/").unwrap()).unwrap()
    }

    fn player_request(tab_id: i32) -> BrowserEvent {
        BrowserEvent::BeforeRequest(RequestDetails {
            url: PLAYER_URL.to_string(),
            tab_id,
            frame_id: 4,
            resource_type: ResourceType::SUB_FRAME,
            method: "GET".to_string(),
            initiator: Some("https://site.example".to_string()),
        })
    }

    fn top_level_commit(tab_id: i32, url: &str) -> BrowserEvent {
        BrowserEvent::NavigationCommitted(NavigationDetails {
            url: url.to_string(),
            tab_id,
            frame_id: 0,
        })
    }

    async fn last_resolved(service: &Service<MemoryHost>, tab_id: i32) -> serde_json::Value {
        let response = service
            .handle_message(&json!({"type": "GET_LAST_RESOLVED"}), &MessageSender::from_tab(tab_id))
            .await
            .expect("message should be answered");
        serde_json::to_value(response).unwrap()
    }

    #[tokio::test]
    async fn player_request_then_ui_query() {
        let service = service();
        service.dispatch(&player_request(7)).await;

        assert_eq!(last_resolved(&service, 7).await, json!({"ok": true, "url": CANONICAL}));
        assert_eq!(last_resolved(&service, 8).await, json!({"ok": true, "url": null}));
    }

    #[tokio::test]
    async fn navigation_invalidates_resolution() {
        let service = service();
        service.dispatch(&player_request(7)).await;
        service.dispatch(&top_level_commit(7, "https://site.example/other")).await;

        assert_eq!(last_resolved(&service, 7).await, json!({"ok": true, "url": null}));
    }

    #[tokio::test]
    async fn navigation_issued_after_put_leaves_tab_empty() {
        let service = service();
        let commit = top_level_commit(7, "https://site.example/other");
        let request = player_request(7);

        let (observed, navigated) = tokio::join!(service.dispatch(&request), service.dispatch(&commit));
        assert!(matches!(observed, EventOutcome::Observed(Observation::Resolved { .. })));
        assert!(matches!(navigated, EventOutcome::Navigated(NavigationOutcome { cleared: true, .. })));
        assert_eq!(last_resolved(&service, 7).await, json!({"ok": true, "url": null}));
    }

    #[tokio::test]
    async fn wake_and_lifecycle_events_install_rules() {
        let service = service();
        assert_eq!(service.wake().await, SuppressorStatus::Active(vec![1, 2]));
        assert_eq!(
            service.dispatch(&BrowserEvent::Startup).await,
            EventOutcome::Rules(SuppressorStatus::Active(vec![1, 2]))
        );
        assert_eq!(
            service.dispatch(&BrowserEvent::Installed).await,
            EventOutcome::Rules(SuppressorStatus::Active(vec![1, 2]))
        );
        assert_eq!(service.host().installed_rules(), service.suppressor().rules());
    }

    #[tokio::test]
    async fn observation_continues_when_blocking_is_unavailable() {
        let service = service();
        service.host().fail_rules("unsupported");
        assert!(matches!(service.wake().await, SuppressorStatus::ObservationOnly(_)));

        service.dispatch(&player_request(7)).await;
        assert_eq!(last_resolved(&service, 7).await, json!({"ok": true, "url": CANONICAL}));
    }

    #[test]
    fn subscriptions_cover_configured_hosts() {
        let service = service();
        let subs = service.subscriptions();
        assert_eq!(subs.requests.urls, vec!["*://player.example/*", "*://cdn.example/*"]);
        assert_eq!(subs.requests, subs.redirects);
        assert!(subs.navigation_all_urls);
    }

    #[test]
    fn rejects_invalid_config() {
        let config = Config { player_hosts: Vec::new(), ..Config::default() };
        let result = Service::new(config, MemoryHost::new(), Url::parse("chrome-extension://x/").unwrap());
        assert!(matches!(result, Err(ConfigError::NoPlayerHosts)));
    }
}
