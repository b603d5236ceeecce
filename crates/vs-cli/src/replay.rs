//! Replay a recorded event trace against the in-memory host.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use url::Url;

use vs_core::memory::MemoryHost;
use vs_core::{
    BrowserEvent, Config, EventOutcome, MessageSender, NavigationDetails, RedirectDetails,
    RequestDetails, Service, TabId,
};

/// One line of a trace file.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TraceEntry {
    Install,
    Startup,
    Request(RequestDetails),
    Redirect(RedirectDetails),
    Navigation(NavigationDetails),
    Message {
        #[serde(rename = "tabId", default)]
        tab_id: Option<TabId>,
        message: serde_json::Value,
    },
}

pub struct ReplayReport {
    pub lines: Vec<String>,
    pub session: serde_json::Value,
}

pub fn read_trace(path: &Path) -> Result<Vec<TraceEntry>, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("Invalid trace '{}': {}", path.display(), e))
}

pub fn run_replay(config: Config, extension_base: &str, trace: Vec<TraceEntry>) -> Result<ReplayReport, String> {
    let base = Url::parse(extension_base).map_err(|e| format!("Invalid extension base: {}", e))?;
    let service = Service::new(config, MemoryHost::new(), base).map_err(|e| e.to_string())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))?;

    runtime.block_on(replay(&service, trace))
}

async fn replay(service: &Service<MemoryHost>, trace: Vec<TraceEntry>) -> Result<ReplayReport, String> {
    let mut lines = vec![format!("wake: {:?}", service.wake().await)];

    for (index, entry) in trace.into_iter().enumerate() {
        let line = match entry {
            TraceEntry::Install => describe(service.dispatch(&BrowserEvent::Installed).await),
            TraceEntry::Startup => describe(service.dispatch(&BrowserEvent::Startup).await),
            TraceEntry::Request(details) => describe(service.dispatch(&BrowserEvent::BeforeRequest(details)).await),
            TraceEntry::Redirect(details) => describe(service.dispatch(&BrowserEvent::BeforeRedirect(details)).await),
            TraceEntry::Navigation(details) => {
                describe(service.dispatch(&BrowserEvent::NavigationCommitted(details)).await)
            }
            TraceEntry::Message { tab_id, message } => {
                let sender = MessageSender { tab_id };
                match service.handle_message(&message, &sender).await {
                    Some(response) => serde_json::to_string(&response).map_err(|e| e.to_string())?,
                    None => "message ignored".to_string(),
                }
            }
        };
        lines.push(format!("[{index}] {line}"));
    }

    let session = serde_json::to_value(service.host().session_entries()).map_err(|e| e.to_string())?;
    Ok(ReplayReport { lines, session })
}

fn describe(outcome: EventOutcome) -> String {
    format!("{outcome:?}")
}
