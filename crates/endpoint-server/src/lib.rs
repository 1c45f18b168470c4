//! # endpoint-server
//!
//! The surroundings of `endpoint-core`: JSON configuration, the websocket
//! subscriber registry that delivers payloads to browsers, REST discovery,
//! the key-press command source and the HTTP server that ties them together.

pub mod app;
pub mod config;
pub mod discovery;
pub mod keyboard;
pub mod metrics;
pub mod server;
pub mod websocket;

pub use app::{AppState, router};
pub use config::{AppConfig, ConfigError, KeyPressProfile};
pub use keyboard::{KeyListener, KeyOutcome, ListenerExit};
pub use server::{Cli, ServerError, run};
pub use websocket::{SubscriberRegistry, WebsocketSender};
