//! Network Observer
//!
//! Passive inspection of outgoing requests and redirects. Nothing here ever
//! blocks, cancels or rewrites a request, so it stays correct while the
//! suppressor blocks the same request: the browser reports the request to
//! observers before the blocking engine acts on it.

use log::{debug, info, warn};

use crate::classifier::Classifier;
use crate::host::SessionStorage;
use crate::store::{StoreError, TabStore};
use crate::types::{RedirectDetails, RequestDetails, ResourceType};

/// Resource types worth inspecting.
pub const OBSERVED_TYPES: ResourceType = ResourceType::MAIN_FRAME
    .union(ResourceType::SUB_FRAME)
    .union(ResourceType::MEDIA)
    .union(ResourceType::XMLHTTPREQUEST)
    .union(ResourceType::OTHER);

/// Why an event was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Canonical path recovered from a player page's query parameter
    PlayerPage,
    /// Media file requested directly from a media host
    MediaRequest,
    /// Server redirect straight to a media file
    Redirect,
}

/// Outcome of observing one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Resolved { route: Route, url: String },
    Ignored,
    Failed(StoreError),
}

/// Listener filter handed to the browser when subscribing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFilter {
    pub urls: Vec<String>,
    pub types: Vec<&'static str>,
}

/// Match patterns covering every player and media host.
pub fn observer_filter(classifier: &Classifier) -> RequestFilter {
    RequestFilter {
        urls: classifier
            .config()
            .observed_hosts()
            .map(|host| format!("*://{host}/*"))
            .collect(),
        types: OBSERVED_TYPES.names(),
    }
}

pub struct NetworkObserver<'a, S: SessionStorage> {
    classifier: &'a Classifier,
    store: TabStore<'a, S>,
}

impl<'a, S: SessionStorage> NetworkObserver<'a, S> {
    pub fn new(classifier: &'a Classifier, storage: &'a S) -> Self {
        Self {
            classifier,
            store: TabStore::new(storage, classifier),
        }
    }

    /// Handle a before-request event.
    pub async fn on_request(&self, details: &RequestDetails) -> Observation {
        if details.tab_id < 0
            || !details.method.eq_ignore_ascii_case("GET")
            || !OBSERVED_TYPES.intersects(details.resource_type)
        {
            return Observation::Ignored;
        }

        let url = details.url.as_str();
        if self.classifier.is_player_page_url(url) {
            return match self.classifier.extract_canonical_media_path(url) {
                Some(canonical) => self.record(details.tab_id, Route::PlayerPage, canonical).await,
                None => {
                    debug!(target: "vcloud_saver", "player page without media path: {url}");
                    Observation::Ignored
                }
            };
        }

        if self.classifier.is_media_host_url(url) && self.classifier.is_media_file_url(url) {
            return self.record(details.tab_id, Route::MediaRequest, url.to_string()).await;
        }

        Observation::Ignored
    }

    /// Handle a before-redirect event. Best effort: only redirects that land
    /// directly on a media file count.
    pub async fn on_redirect(&self, details: &RedirectDetails) -> Observation {
        if details.tab_id < 0 || !self.classifier.is_media_file_url(&details.redirect_url) {
            return Observation::Ignored;
        }
        self.record(details.tab_id, Route::Redirect, details.redirect_url.clone()).await
    }

    async fn record(&self, tab_id: i32, route: Route, url: String) -> Observation {
        match self.store.put(tab_id, &url).await {
            Ok(()) => {
                info!(target: "vcloud_saver", "resolved {url} for tab {tab_id} via {route:?}");
                Observation::Resolved { route, url }
            }
            Err(e) => {
                warn!(target: "vcloud_saver", "failed to store {url} for tab {tab_id}: {e}");
                Observation::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::memory::MemoryHost;

    const PLAYER_URL: &str =
        "https://player.example/artplayer/index.html?url=%2Fvcloud%2Ff%2FabcDEF%2F123456%2F";

    fn classifier() -> Classifier {
        Classifier::new(Config {
            player_hosts: vec!["player.example".to_string()],
            media_hosts: vec!["cdn.example".to_string()],
            ..Config::default()
        })
    }

    fn request(url: &str, tab_id: i32, ty: ResourceType) -> RequestDetails {
        RequestDetails {
            url: url.to_string(),
            tab_id,
            frame_id: 3,
            resource_type: ty,
            method: "GET".to_string(),
            initiator: Some("https://site.example".to_string()),
        }
    }

    #[tokio::test]
    async fn player_request_resolves_canonical_url() {
        let host = MemoryHost::new();
        let classifier = classifier();
        let observer = NetworkObserver::new(&classifier, &host);

        let outcome = observer.on_request(&request(PLAYER_URL, 7, ResourceType::SUB_FRAME)).await;
        assert_eq!(
            outcome,
            Observation::Resolved {
                route: Route::PlayerPage,
                url: "https://player.example/vcloud/f/abcDEF/123456/".to_string(),
            }
        );
        assert_eq!(
            host.session_entries().get("mp4_7").map(String::as_str),
            Some("https://player.example/vcloud/f/abcDEF/123456/")
        );
    }

    #[tokio::test]
    async fn discards_irrelevant_requests() {
        let host = MemoryHost::new();
        let classifier = classifier();
        let observer = NetworkObserver::new(&classifier, &host);

        let tabless = request(PLAYER_URL, -1, ResourceType::SUB_FRAME);
        let script = request(PLAYER_URL, 7, ResourceType::SCRIPT);
        let mut post = request(PLAYER_URL, 7, ResourceType::SUB_FRAME);
        post.method = "POST".to_string();
        let bare = request(
            "https://player.example/artplayer/index.html",
            7,
            ResourceType::SUB_FRAME,
        );
        let foreign_media = request("https://other.example/v.mp4", 7, ResourceType::MEDIA);

        for details in [tabless, script, post, bare, foreign_media] {
            assert_eq!(observer.on_request(&details).await, Observation::Ignored, "{details:?}");
        }
        assert!(host.session_entries().is_empty());
    }

    #[tokio::test]
    async fn media_host_request_is_stored_verbatim() {
        let host = MemoryHost::new();
        let classifier = classifier();
        let observer = NetworkObserver::new(&classifier, &host);

        let url = "https://cdn.example/x/video.mp4?sig=abc";
        let outcome = observer.on_request(&request(url, 4, ResourceType::MEDIA)).await;
        assert_eq!(
            outcome,
            Observation::Resolved { route: Route::MediaRequest, url: url.to_string() }
        );
    }

    #[tokio::test]
    async fn redirect_to_media_file_is_a_discovery() {
        let host = MemoryHost::new();
        let classifier = classifier();
        let observer = NetworkObserver::new(&classifier, &host);

        let redirect = RedirectDetails {
            url: "https://player.example/vcloud/f/a/b/".to_string(),
            redirect_url: "https://anywhere.example/file.MP4?t=1".to_string(),
            tab_id: 9,
            frame_id: 0,
            resource_type: ResourceType::MAIN_FRAME,
        };
        assert!(matches!(
            observer.on_redirect(&redirect).await,
            Observation::Resolved { route: Route::Redirect, .. }
        ));

        let not_media = RedirectDetails {
            redirect_url: "https://anywhere.example/login".to_string(),
            ..redirect
        };
        assert_eq!(observer.on_redirect(&not_media).await, Observation::Ignored);
    }

    #[tokio::test]
    async fn storage_failure_is_contained() {
        let host = MemoryHost::new();
        host.fail_storage("gone");
        let classifier = classifier();
        let observer = NetworkObserver::new(&classifier, &host);

        let outcome = observer.on_request(&request(PLAYER_URL, 7, ResourceType::SUB_FRAME)).await;
        assert!(matches!(outcome, Observation::Failed(StoreError::Host(_))));
    }

    #[test]
    fn filter_covers_player_and_media_hosts() {
        let filter = observer_filter(&classifier());
        assert_eq!(filter.urls, vec!["*://player.example/*", "*://cdn.example/*"]);
        assert_eq!(filter.types, vec!["main_frame", "sub_frame", "xmlhttprequest", "media", "other"]);
    }
}
