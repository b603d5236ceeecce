//! WebAssembly bindings for VCloud Saver
//!
//! Loaded by the extension's service worker. `start` must run on every
//! worker wake: it installs the listeners and re-declares the blocking rules.

mod background;
mod chrome;
mod logger;

use std::cell::RefCell;

use log::LevelFilter;
use url::Url;
use vs_core::{Config, Service};
use wasm_bindgen::prelude::*;

use background::Background;
use chrome::{runtime_get_url, ChromeHost};

thread_local! {
    static BACKGROUND: RefCell<Option<Background>> = const { RefCell::new(None) };
}

/// Start the background service. `config_json` overrides the built-in
/// configuration when given.
#[wasm_bindgen]
pub fn start(config_json: Option<String>, debug: bool) -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    logger::init(if debug { LevelFilter::Debug } else { LevelFilter::Info });

    if is_started() {
        return Err(JsValue::from_str("Already started. Call stop() first."));
    }

    let config = match config_json {
        Some(text) => Config::from_json(&text)
            .map_err(|e| JsValue::from_str(&format!("Failed to load config: {e}")))?,
        None => Config::default(),
    };

    let extension_base = Url::parse(&runtime_get_url(""))
        .map_err(|e| JsValue::from_str(&format!("Invalid extension URL: {e}")))?;

    let service = Service::new(config, ChromeHost, extension_base)
        .map_err(|e| JsValue::from_str(&format!("Failed to load config: {e}")))?;

    let background = Background::install(service)?;
    log::info!(target: "vcloud_saver", "{} listeners installed", background.listener_count());
    background.wake();

    BACKGROUND.with(|slot| *slot.borrow_mut() = Some(background));
    Ok(())
}

/// Remove every listener. Returns false if the service was not running.
#[wasm_bindgen]
pub fn stop() -> bool {
    BACKGROUND.with(|slot| slot.borrow_mut().take()).is_some()
}

#[wasm_bindgen]
pub fn is_started() -> bool {
    BACKGROUND.with(|slot| slot.borrow().is_some())
}

/// The declarative rules the running service installs, as plain objects.
#[wasm_bindgen]
pub fn blocking_rules() -> Result<JsValue, JsValue> {
    BACKGROUND.with(|slot| match slot.borrow().as_ref() {
        Some(background) => chrome::to_js(background.service().suppressor().rules()),
        None => Err(JsValue::from_str("Not started")),
    })
}

/// Classifier check for the resolution page, using the running service's
/// configuration or the built-in one.
#[wasm_bindgen]
pub fn is_media_file_url(url: &str) -> bool {
    BACKGROUND.with(|slot| match slot.borrow().as_ref() {
        Some(background) => background.service().classifier().is_media_file_url(url),
        None => vs_core::Classifier::new(Config::default()).is_media_file_url(url),
    })
}
