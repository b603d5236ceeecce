//! Host traits implemented on the extension APIs
//!
//! Every call goes through the promise-returning form of the API and is
//! awaited with `JsFuture`, so failures arrive as rejected promises instead
//! of `runtime.lastError`.

use js_sys::{Array, Function, Object, Promise, Reflect};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use vs_core::host::{Downloads, HostError, RuleEngine, SessionStorage, Tabs};
use vs_core::types::{DownloadId, TabId};
use vs_core::BlockRule;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "session"], js_name = get)]
    fn session_get(keys: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "session"], js_name = set)]
    fn session_set(items: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "session"], js_name = remove)]
    fn session_remove(keys: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "downloads"], js_name = download)]
    fn downloads_download(options: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = update)]
    fn tabs_update(tab_id: i32, properties: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = create)]
    fn tabs_create(properties: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "declarativeNetRequest"], js_name = updateDynamicRules)]
    fn dnr_update_dynamic_rules(options: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "declarativeNetRequest"], js_name = getDynamicRules)]
    fn dnr_get_dynamic_rules() -> Result<Promise, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "runtime"], js_name = getURL)]
    pub fn runtime_get_url(path: &str) -> String;

    /// A `chrome.events.Event` object.
    pub type ChromeEvent;

    #[wasm_bindgen(method, js_name = addListener)]
    pub fn add_listener(this: &ChromeEvent, callback: &Function);

    #[wasm_bindgen(method, js_name = addListener)]
    pub fn add_listener_with_filter(this: &ChromeEvent, callback: &Function, filter: &JsValue);

    #[wasm_bindgen(method, js_name = removeListener)]
    pub fn remove_listener(this: &ChromeEvent, callback: &Function);
}

/// Look up an event object such as `chrome.webRequest.onBeforeRequest`.
pub fn chrome_event(path: &[&str]) -> Result<ChromeEvent, JsValue> {
    let mut target: JsValue = Reflect::get(&js_sys::global(), &"chrome".into())?;
    for segment in path {
        target = Reflect::get(&target, &JsValue::from_str(segment))?;
        if target.is_undefined() {
            return Err(JsValue::from_str(&format!("chrome.{} is unavailable", path.join("."))));
        }
    }
    Ok(target.unchecked_into())
}

// =============================================================================
// Conversions
// =============================================================================

/// Convert a serde value into a plain JS object.
pub fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    let text = serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))?;
    js_sys::JSON::parse(&text)
}

/// Convert a plain JS object into a serde value.
pub fn from_js<T: DeserializeOwned>(value: &JsValue) -> Result<T, JsValue> {
    let text = js_sys::JSON::stringify(value)?
        .as_string()
        .ok_or_else(|| JsValue::from_str("value is not JSON-serializable"))?;
    serde_json::from_str(&text).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Best-effort message of a thrown value or rejected promise.
pub fn error_message(err: &JsValue) -> String {
    Reflect::get(err, &"message".into())
        .ok()
        .and_then(|message| message.as_string())
        .or_else(|| err.as_string())
        .unwrap_or_else(|| format!("{err:?}"))
}

async fn settle(call: Result<Promise, JsValue>) -> Result<JsValue, String> {
    let promise = call.map_err(|e| error_message(&e))?;
    JsFuture::from(promise).await.map_err(|e| error_message(&e))
}

fn url_properties(url: &str) -> Result<JsValue, JsValue> {
    let properties = Object::new();
    Reflect::set(&properties, &"url".into(), &JsValue::from_str(url))?;
    Ok(properties.into())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RuleUpdate<'a> {
    remove_rule_ids: &'a [u32],
    add_rules: &'a [BlockRule],
}

#[derive(Deserialize)]
struct InstalledRule {
    id: u32,
}

// =============================================================================
// Host
// =============================================================================

/// The real browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeHost;

impl SessionStorage for ChromeHost {
    async fn get(&self, key: &str) -> Result<Option<String>, HostError> {
        let items = settle(session_get(&JsValue::from_str(key)))
            .await
            .map_err(HostError::Storage)?;
        let value = Reflect::get(&items, &JsValue::from_str(key))
            .map_err(|e| HostError::Storage(error_message(&e)))?;
        Ok(value.as_string())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), HostError> {
        let items = Object::new();
        Reflect::set(&items, &JsValue::from_str(key), &JsValue::from_str(value))
            .map_err(|e| HostError::Storage(error_message(&e)))?;
        settle(session_set(&items)).await.map_err(HostError::Storage)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), HostError> {
        settle(session_remove(&JsValue::from_str(key)))
            .await
            .map_err(HostError::Storage)?;
        Ok(())
    }
}

impl Downloads for ChromeHost {
    async fn download(&self, url: &str, save_as: bool) -> Result<DownloadId, HostError> {
        let options = url_properties(url).map_err(|e| HostError::Download(error_message(&e)))?;
        Reflect::set(&options, &"saveAs".into(), &JsValue::from_bool(save_as))
            .map_err(|e| HostError::Download(error_message(&e)))?;

        let id = settle(downloads_download(&options)).await.map_err(HostError::Download)?;
        id.as_f64()
            .map(|id| id as DownloadId)
            .ok_or_else(|| HostError::Download("download did not start".to_string()))
    }
}

impl Tabs for ChromeHost {
    async fn update(&self, tab_id: TabId, url: &str) -> Result<(), HostError> {
        let properties = url_properties(url).map_err(|e| HostError::Tabs(error_message(&e)))?;
        settle(tabs_update(tab_id, &properties)).await.map_err(HostError::Tabs)?;
        Ok(())
    }

    async fn create(&self, url: &str) -> Result<(), HostError> {
        let properties = url_properties(url).map_err(|e| HostError::Tabs(error_message(&e)))?;
        settle(tabs_create(&properties)).await.map_err(HostError::Tabs)?;
        Ok(())
    }
}

impl RuleEngine for ChromeHost {
    async fn update_dynamic_rules(&self, remove_ids: &[u32], add: &[BlockRule]) -> Result<(), HostError> {
        let update = RuleUpdate {
            remove_rule_ids: remove_ids,
            add_rules: add,
        };
        let options = to_js(&update).map_err(|e| HostError::Rules(error_message(&e)))?;
        settle(dnr_update_dynamic_rules(&options)).await.map_err(HostError::Rules)?;
        Ok(())
    }

    async fn dynamic_rule_ids(&self) -> Result<Vec<u32>, HostError> {
        let rules = settle(dnr_get_dynamic_rules()).await.map_err(HostError::Rules)?;
        if !Array::is_array(&rules) {
            return Err(HostError::Rules("getDynamicRules returned a non-array".to_string()));
        }
        let rules: Vec<InstalledRule> = from_js(&rules).map_err(|e| HostError::Rules(error_message(&e)))?;
        Ok(rules.into_iter().map(|rule| rule.id).collect())
    }
}
