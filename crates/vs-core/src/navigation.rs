//! Navigation Watcher
//!
//! Top-level commits invalidate the tab's resolved state. A commit that lands
//! directly on a media file sends the tab to the resolution page instead of
//! letting the browser play it.

use log::{debug, info, warn};
use url::Url;

use crate::classifier::Classifier;
use crate::host::{SessionStorage, Tabs};
use crate::store::TabStore;
use crate::types::NavigationDetails;

/// Outcome of one navigation commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationOutcome {
    /// The tab's state was cleared
    pub cleared: bool,
    /// The tab was sent to this resolution page
    pub redirected_to: Option<String>,
}

impl NavigationOutcome {
    const IGNORED: Self = Self { cleared: false, redirected_to: None };
}

pub struct NavigationWatcher<'a, H: SessionStorage + Tabs> {
    classifier: &'a Classifier,
    host: &'a H,
    extension_base: &'a Url,
}

impl<'a, H: SessionStorage + Tabs> NavigationWatcher<'a, H> {
    pub fn new(classifier: &'a Classifier, host: &'a H, extension_base: &'a Url) -> Self {
        Self { classifier, host, extension_base }
    }

    pub async fn on_committed(&self, details: &NavigationDetails) -> NavigationOutcome {
        let url = details.url.as_str();

        // Our own viewer: clearing here would wipe what we just redirected to.
        if self.classifier.is_resolution_page_url(url) || details.tab_id < 0 {
            return NavigationOutcome::IGNORED;
        }

        let mut outcome = NavigationOutcome::IGNORED;

        if details.is_top_level() {
            let store = TabStore::new(self.host, self.classifier);
            match store.clear(details.tab_id).await {
                Ok(()) => {
                    debug!(target: "vcloud_saver", "cleared tab {} on navigation", details.tab_id);
                    outcome.cleared = true;
                }
                Err(e) => warn!(target: "vcloud_saver", "failed to clear tab {}: {e}", details.tab_id),
            }
        }

        if self.is_direct_media(url) {
            outcome.redirected_to = self.redirect(details).await;
        }

        outcome
    }

    fn is_direct_media(&self, url: &str) -> bool {
        (self.classifier.is_media_host_url(url) || self.classifier.is_player_host_url(url))
            && self.classifier.is_media_file_url(url)
    }

    async fn redirect(&self, details: &NavigationDetails) -> Option<String> {
        let page = self
            .classifier
            .resolution_page_url(self.extension_base, &details.url)?;

        match self.host.update(details.tab_id, &page).await {
            Ok(()) => {
                info!(target: "vcloud_saver", "media navigation in tab {} -> {page}", details.tab_id);
                Some(page)
            }
            Err(e) => {
                warn!(target: "vcloud_saver", "failed to redirect tab {}: {e}", details.tab_id);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::memory::{MemoryHost, TabCall};
    use crate::store::TabStore;

    fn classifier() -> Classifier {
        Classifier::new(Config {
            player_hosts: vec!["player.example".to_string()],
            media_hosts: vec!["cdn.example".to_string()],
            ..Config::default()
        })
    }

    fn base() -> Url {
        Url::parse("chrome-extension://extid/").unwrap()
    }

    fn commit(url: &str, tab_id: i32, frame_id: i32) -> NavigationDetails {
        NavigationDetails { url: url.to_string(), tab_id, frame_id }
    }

    #[tokio::test]
    async fn top_level_commit_clears_state() {
        let host = MemoryHost::new();
        let classifier = classifier();
        let base = base();
        let store = TabStore::new(&host, &classifier);
        store.put(7, "https://player.example/vcloud/f/abcDEF/123456/").await.unwrap();

        let watcher = NavigationWatcher::new(&classifier, &host, &base);
        let outcome = watcher.on_committed(&commit("https://site.example/next", 7, 0)).await;

        assert!(outcome.cleared);
        assert_eq!(store.get(7).await.unwrap(), None);
        assert!(host.tab_calls().is_empty());
    }

    #[tokio::test]
    async fn subframe_commit_keeps_state() {
        let host = MemoryHost::new();
        let classifier = classifier();
        let base = base();
        let store = TabStore::new(&host, &classifier);
        store.put(7, "https://cdn.example/a.mp4").await.unwrap();

        let watcher = NavigationWatcher::new(&classifier, &host, &base);
        let outcome = watcher.on_committed(&commit("https://player.example/artplayer/index.html", 7, 5)).await;

        assert_eq!(outcome, NavigationOutcome::IGNORED);
        assert!(store.get(7).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn resolution_page_commit_is_ignored() {
        let host = MemoryHost::new();
        let classifier = classifier();
        let base = base();
        let store = TabStore::new(&host, &classifier);
        store.put(7, "https://cdn.example/a.mp4").await.unwrap();

        let watcher = NavigationWatcher::new(&classifier, &host, &base);
        let page = "chrome-extension://extid/download.html?url=https%3A%2F%2Fcdn.example%2Fa.mp4";
        assert_eq!(watcher.on_committed(&commit(page, 7, 0)).await, NavigationOutcome::IGNORED);
        assert!(store.get(7).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn direct_media_navigation_redirects_tab() {
        let host = MemoryHost::new();
        let classifier = classifier();
        let base = base();
        let watcher = NavigationWatcher::new(&classifier, &host, &base);

        let outcome = watcher.on_committed(&commit("https://cdn.example/v.mp4?sig=1", 2, 0)).await;
        let expected = "chrome-extension://extid/download.html?url=https%3A%2F%2Fcdn.example%2Fv.mp4%3Fsig%3D1";

        assert!(outcome.cleared);
        assert_eq!(outcome.redirected_to.as_deref(), Some(expected));
        assert_eq!(
            host.tab_calls(),
            vec![TabCall::Update { tab_id: 2, url: expected.to_string() }]
        );
    }

    #[tokio::test]
    async fn media_on_unknown_host_is_left_alone() {
        let host = MemoryHost::new();
        let classifier = classifier();
        let base = base();
        let watcher = NavigationWatcher::new(&classifier, &host, &base);

        let outcome = watcher.on_committed(&commit("https://other.example/v.mp4", 2, 0)).await;
        assert_eq!(outcome.redirected_to, None);
        assert!(host.tab_calls().is_empty());
    }

    #[tokio::test]
    async fn redirect_failure_is_contained() {
        let host = MemoryHost::new();
        host.fail_tabs("No tab with id: 2");
        let classifier = classifier();
        let base = base();
        let watcher = NavigationWatcher::new(&classifier, &host, &base);

        let outcome = watcher.on_committed(&commit("https://cdn.example/v.mp4", 2, 1)).await;
        assert_eq!(outcome, NavigationOutcome::IGNORED);
    }
}
