//! Message Gateway
//!
//! Request/response protocol for the content script and the resolution page.
//! Messages arrive as `{type, ...fields}` and are answered with
//! `{ok, ...fields}`. Answers that need no host call are produced
//! synchronously so the binding can close the channel right away; the rest
//! are deferred and keep the channel open until they resolve.

use log::{debug, warn};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use url::Url;

use crate::classifier::Classifier;
use crate::host::{Downloads, SessionStorage, Tabs};
use crate::store::TabStore;
use crate::types::{DownloadId, MessageSender};

pub const ERR_NO_TAB: &str = "No tabId";
pub const ERR_NOT_MEDIA: &str = "Not a media url";
pub const ERR_MISSING_URL: &str = "Missing url";

/// Incoming message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    #[serde(alias = "GET_LAST_MP4")]
    GetLastResolved,
    DownloadUrl {
        #[serde(default, deserialize_with = "string_or_none")]
        url: Option<String>,
    },
    #[serde(alias = "OPEN_DOWNLOAD_PAGE")]
    OpenResolutionPage {
        #[serde(default, deserialize_with = "string_or_none")]
        url: Option<String>,
    },
    OpenUrlNewTab {
        #[serde(default, deserialize_with = "string_or_none")]
        url: Option<String>,
    },
}

/// A non-string `url` counts as absent, so the message still gets an answer.
fn string_or_none<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_str().map(str::to_owned)))
}

impl Request {
    pub fn from_json(raw: &serde_json::Value) -> Option<Self> {
        match Self::deserialize(raw) {
            Ok(request) => Some(request),
            Err(e) => {
                debug!(target: "vcloud_saver", "ignoring message {raw}: {e}");
                None
            }
        }
    }
}

/// Outgoing answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `{ok:true, url}`; `url` is null when nothing is resolved yet
    Resolved(Option<String>),
    /// `{ok:true, downloadId}`
    Downloading(DownloadId),
    /// `{ok:true}`
    Done,
    /// `{ok:false, error}`
    Failed(String),
}

impl Response {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed(error.into())
    }

    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("ok", &self.is_ok())?;
        match self {
            Self::Resolved(url) => map.serialize_entry("url", url)?,
            Self::Downloading(id) => map.serialize_entry("downloadId", id)?,
            Self::Done => {}
            Self::Failed(error) => map.serialize_entry("error", error)?,
        }
        map.end()
    }
}

/// How a message must be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Not ours: send nothing.
    Ignore,
    /// Answer now and close the channel.
    Immediate(Response),
    /// Keep the channel open and answer with [`Gateway::respond`].
    Deferred(Request),
}

fn present(url: &Option<String>) -> Option<&str> {
    url.as_deref().filter(|u| !u.is_empty())
}

pub struct Gateway<'a, H: SessionStorage + Downloads + Tabs> {
    classifier: &'a Classifier,
    host: &'a H,
    extension_base: &'a Url,
}

impl<'a, H: SessionStorage + Downloads + Tabs> Gateway<'a, H> {
    pub fn new(classifier: &'a Classifier, host: &'a H, extension_base: &'a Url) -> Self {
        Self { classifier, host, extension_base }
    }

    /// Decide how to answer a raw message.
    pub fn route(&self, raw: &serde_json::Value, sender: &MessageSender) -> Dispatch {
        let Some(request) = Request::from_json(raw) else {
            return Dispatch::Ignore;
        };
        match self.precheck(&request, sender) {
            Some(response) => Dispatch::Immediate(response),
            None => Dispatch::Deferred(request),
        }
    }

    /// Route and answer in one step; `None` for ignored messages.
    pub async fn handle(&self, raw: &serde_json::Value, sender: &MessageSender) -> Option<Response> {
        match self.route(raw, sender) {
            Dispatch::Ignore => None,
            Dispatch::Immediate(response) => Some(response),
            Dispatch::Deferred(request) => Some(self.respond(&request, sender).await),
        }
    }

    /// Answer a request, performing whatever host calls it needs.
    pub async fn respond(&self, request: &Request, sender: &MessageSender) -> Response {
        if let Some(response) = self.precheck(request, sender) {
            return response;
        }

        match request {
            Request::GetLastResolved => self.last_resolved(sender).await,
            Request::DownloadUrl { url } => self.download(present(url).unwrap_or_default()).await,
            Request::OpenResolutionPage { url } => {
                self.open_resolution_page(present(url).unwrap_or_default(), sender).await
            }
            Request::OpenUrlNewTab { url } => self.open_new_tab(present(url).unwrap_or_default()).await,
        }
    }

    /// Validation that needs no host call.
    fn precheck(&self, request: &Request, sender: &MessageSender) -> Option<Response> {
        match request {
            Request::GetLastResolved if sender.tab_id.is_none() => Some(Response::failed(ERR_NO_TAB)),
            Request::DownloadUrl { url } => match present(url) {
                Some(url) if self.classifier.is_media_file_url(url) => None,
                _ => Some(Response::failed(ERR_NOT_MEDIA)),
            },
            Request::OpenResolutionPage { url } | Request::OpenUrlNewTab { url } if present(url).is_none() => {
                Some(Response::failed(ERR_MISSING_URL))
            }
            _ => None,
        }
    }

    async fn last_resolved(&self, sender: &MessageSender) -> Response {
        let Some(tab_id) = sender.tab_id else {
            return Response::failed(ERR_NO_TAB);
        };

        match TabStore::new(self.host, self.classifier).get(tab_id).await {
            Ok(url) => Response::Resolved(url),
            Err(e) => {
                warn!(target: "vcloud_saver", "failed to read tab {tab_id}: {e}");
                Response::failed(e.to_string())
            }
        }
    }

    async fn download(&self, url: &str) -> Response {
        match self.host.download(url, true).await {
            Ok(id) => Response::Downloading(id),
            Err(e) => {
                warn!(target: "vcloud_saver", "download of {url} failed: {e}");
                Response::failed(e.message())
            }
        }
    }

    async fn open_resolution_page(&self, url: &str, sender: &MessageSender) -> Response {
        let Some(page) = self.classifier.resolution_page_url(self.extension_base, url) else {
            return Response::failed(ERR_MISSING_URL);
        };

        let result = match sender.tab_id {
            Some(tab_id) => self.host.update(tab_id, &page).await,
            None => self.host.create(&page).await,
        };

        match result {
            Ok(()) => Response::Done,
            Err(e) => {
                warn!(target: "vcloud_saver", "failed to open {page}: {e}");
                Response::failed(e.message())
            }
        }
    }

    async fn open_new_tab(&self, url: &str) -> Response {
        match self.host.create(url).await {
            Ok(()) => Response::Done,
            Err(e) => {
                warn!(target: "vcloud_saver", "failed to open {url}: {e}");
                Response::failed(e.message())
            }
        }
    }
}
