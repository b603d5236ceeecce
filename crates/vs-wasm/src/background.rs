//! Listener registration
//!
//! [`Background::install`] is the only place listeners are added. Every
//! registration keeps its closure alive and removes itself from the browser
//! event when dropped, so dropping the `Background` tears everything down.

use std::any::Any;
use std::rc::Rc;

use js_sys::{Function, Reflect};
use log::warn;
use serde_json::json;
use wasm_bindgen::closure::WasmClosure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;

use vs_core::observer::RequestFilter;
use vs_core::{BrowserEvent, Dispatch, MessageSender, Response, Service};

use crate::chrome::{chrome_event, from_js, to_js, ChromeEvent, ChromeHost};

type SharedService = Rc<Service<ChromeHost>>;

struct Registration {
    event: ChromeEvent,
    callback: Function,
    _closure: Box<dyn Any>,
}

impl Registration {
    fn new<T>(event: ChromeEvent, closure: Closure<T>, filter: Option<&JsValue>) -> Self
    where
        T: ?Sized + WasmClosure + 'static,
    {
        let callback: Function = closure.as_ref().unchecked_ref::<Function>().clone();
        match filter {
            Some(filter) => event.add_listener_with_filter(&callback, filter),
            None => event.add_listener(&callback),
        }
        Self {
            event,
            callback,
            _closure: Box::new(closure),
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.event.remove_listener(&self.callback);
    }
}

/// The running background service and its listeners.
pub struct Background {
    service: SharedService,
    registrations: Vec<Registration>,
}

impl Background {
    pub fn install(service: Service<ChromeHost>) -> Result<Self, JsValue> {
        let service: SharedService = Rc::new(service);
        let subscriptions = service.subscriptions();
        let mut registrations = Vec::new();

        let requests = filter_js(&subscriptions.requests)?;
        registrations.push(Registration::new(
            chrome_event(&["webRequest", "onBeforeRequest"])?,
            event_closure(&service, |details| from_js(&details).map(BrowserEvent::BeforeRequest)),
            Some(&requests),
        ));

        let redirects = filter_js(&subscriptions.redirects)?;
        registrations.push(Registration::new(
            chrome_event(&["webRequest", "onBeforeRedirect"])?,
            event_closure(&service, |details| from_js(&details).map(BrowserEvent::BeforeRedirect)),
            Some(&redirects),
        ));

        if subscriptions.navigation_all_urls {
            registrations.push(Registration::new(
                chrome_event(&["webNavigation", "onCommitted"])?,
                event_closure(&service, |details| from_js(&details).map(BrowserEvent::NavigationCommitted)),
                None,
            ));
        }

        if subscriptions.installed {
            registrations.push(Registration::new(
                chrome_event(&["runtime", "onInstalled"])?,
                event_closure(&service, |_| Ok(BrowserEvent::Installed)),
                None,
            ));
        }

        if subscriptions.startup {
            registrations.push(Registration::new(
                chrome_event(&["runtime", "onStartup"])?,
                event_closure(&service, |_| Ok(BrowserEvent::Startup)),
                None,
            ));
        }

        if subscriptions.messages {
            registrations.push(Registration::new(
                chrome_event(&["runtime", "onMessage"])?,
                message_closure(&service),
                None,
            ));
        }

        Ok(Self { service, registrations })
    }

    /// Re-declare the blocking rules; runs on every service wake.
    pub fn wake(&self) {
        let service = Rc::clone(&self.service);
        spawn_local(async move {
            service.wake().await;
        });
    }

    pub fn service(&self) -> &Service<ChromeHost> {
        &self.service
    }

    pub fn listener_count(&self) -> usize {
        self.registrations.len()
    }
}

fn filter_js(filter: &RequestFilter) -> Result<JsValue, JsValue> {
    to_js(&filter_json(filter))
}

fn filter_json(filter: &RequestFilter) -> serde_json::Value {
    json!({ "urls": filter.urls, "types": filter.types })
}

fn event_closure<F>(service: &SharedService, parse: F) -> Closure<dyn FnMut(JsValue)>
where
    F: Fn(JsValue) -> Result<BrowserEvent, JsValue> + 'static,
{
    let service = Rc::clone(service);
    Closure::wrap(Box::new(move |details: JsValue| {
        let event = match parse(details) {
            Ok(event) => event,
            Err(e) => {
                warn!(target: "vcloud_saver", "unreadable event: {}", crate::chrome::error_message(&e));
                return;
            }
        };
        let service = Rc::clone(&service);
        spawn_local(async move {
            service.dispatch(&event).await;
        });
    }) as Box<dyn FnMut(JsValue)>)
}

fn message_closure(service: &SharedService) -> Closure<dyn FnMut(JsValue, JsValue, Function) -> JsValue> {
    let service = Rc::clone(service);
    Closure::wrap(Box::new(move |message: JsValue, sender: JsValue, send_response: Function| {
        if !message.is_object() {
            return JsValue::UNDEFINED;
        }
        let raw: serde_json::Value = match from_js(&message) {
            Ok(raw) => raw,
            Err(_) => return JsValue::UNDEFINED,
        };
        let sender = message_sender(&sender);

        match service.route_message(&raw, &sender) {
            Dispatch::Ignore => JsValue::UNDEFINED,
            Dispatch::Immediate(response) => {
                reply(&send_response, &response);
                JsValue::FALSE
            }
            Dispatch::Deferred(request) => {
                let service = Rc::clone(&service);
                spawn_local(async move {
                    let response = service.respond(&request, &sender).await;
                    reply(&send_response, &response);
                });
                // Keep the channel open until the deferred answer is sent.
                JsValue::TRUE
            }
        }
    }) as Box<dyn FnMut(JsValue, JsValue, Function) -> JsValue>)
}

fn message_sender(sender: &JsValue) -> MessageSender {
    let tab_id = Reflect::get(sender, &"tab".into())
        .ok()
        .filter(|tab| tab.is_object())
        .and_then(|tab| Reflect::get(&tab, &"id".into()).ok())
        .and_then(|id| id.as_f64())
        .map(|id| id as i32);
    MessageSender { tab_id }
}

fn reply(send_response: &Function, response: &Response) {
    match to_js(response) {
        Ok(value) => {
            if let Err(e) = send_response.call1(&JsValue::NULL, &value) {
                warn!(target: "vcloud_saver", "sendResponse failed: {}", crate::chrome::error_message(&e));
            }
        }
        Err(e) => warn!(target: "vcloud_saver", "unserializable response: {}", crate::chrome::error_message(&e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_uses_web_request_shape() {
        let filter = RequestFilter {
            urls: vec!["*://player.example/*".to_string()],
            types: vec!["sub_frame", "media"],
        };
        assert_eq!(
            filter_json(&filter),
            json!({ "urls": ["*://player.example/*"], "types": ["sub_frame", "media"] })
        );
    }
}
