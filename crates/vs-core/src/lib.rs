//! VCloud Saver Core Library
//!
//! This crate provides the per-tab media resolution pipeline for the VCloud
//! Saver browser extension. It has no browser dependency: every browser
//! facility is reached through the traits in [`host`], which the wasm
//! bindings implement on top of the extension APIs.
//!
//! # Architecture
//!
//! Network and navigation events feed a per-tab store independently; the
//! message gateway only reads that store and calls the download manager; the
//! suppressor's declarative rules are installed on wake and are otherwise
//! decoupled from per-request data flow.
//!
//! # Modules
//!
//! - `config`: immutable service configuration
//! - `classifier`: URL predicates and canonical media path extraction
//! - `store`: per-tab state over session storage
//! - `observer`: passive request and redirect observation
//! - `suppressor`: declarative blocking rules
//! - `navigation`: navigation commit handling
//! - `gateway`: message protocol
//! - `service`: event routing
//! - `memory`: in-memory host for tests and replay
//! - `url`: fast URL slicing helpers
//! - `types`: shared type definitions

pub mod classifier;
pub mod config;
pub mod gateway;
pub mod host;
pub mod memory;
pub mod navigation;
pub mod observer;
pub mod service;
pub mod store;
pub mod suppressor;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use classifier::Classifier;
pub use config::{Config, ConfigError};
pub use gateway::{Dispatch, Request, Response};
pub use host::{Host, HostError};
pub use service::{BrowserEvent, EventOutcome, Service, Subscriptions};
pub use suppressor::{BlockRule, SuppressorStatus};
pub use types::{MessageSender, NavigationDetails, RedirectDetails, RequestDetails, ResourceType, TabId};
