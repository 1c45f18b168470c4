//! # endpoint-core - Simulated Endpoint Event Engine
//!
//! Drives simulated network endpoints through connection-lifecycle and
//! traffic demonstrations, pushing state changes and synthetic traffic to
//! the single subscriber of each endpoint.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          EndpointManager                             │
//! │                                                                      │
//! │  Event ──> Router ──> EndpointProcessor (one per endpoint)           │
//! │                          │                                           │
//! │                          ├── HandlerTable: guard + action per kind   │
//! │                          │      │                                    │
//! │                          │      ├── payload ──────────> ClientSender │
//! │                          │      └── start/stop/delay                 │
//! │                          │             │                             │
//! │                          └── TrafficControl ──> TrafficInitiator     │
//! │                                                  │                   │
//! │                                                  └── request/response│
//! │                                                        ──> ClientSender
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Events for one endpoint are processed in the order the router saw them.
//! - At most one traffic initiator runs per endpoint; a replacement is only
//!   spawned after the previous one has stopped.
//! - Nothing in here is fatal: routing errors, inapplicable events and
//!   delivery failures are logged, and at worst an endpoint goes quiet.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use endpoint_core::{
//!     EndpointManager, Event, EventKind, ManagableEndpoint, ManagerConfig, MemoryRegistry,
//!     StartupBarrier,
//! };
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let config = ManagerConfig::default();
//! let (events, inbound) = config.event_channel();
//! let registry = Arc::new(MemoryRegistry::new());
//!
//! let manager = EndpointManager::new(
//!     vec![ManagableEndpoint::new(7, "edge-router", 16)],
//!     registry.clone(),
//!     config,
//! );
//! let barrier = StartupBarrier::new();
//! let handle = manager.start(inbound, &barrier);
//! barrier.wait().await;
//!
//! events.send(Event::new(7, EventKind::Connect)).await.unwrap();
//! events.send(Event::new(7, EventKind::StartTraffic)).await.unwrap();
//!
//! drop(events);
//! handle.join().await;
//! # }
//! ```

pub mod barrier;
pub mod config;
pub mod control;
pub mod event;
pub mod generator;
pub mod handlers;
pub mod initiator;
pub mod manager;
pub mod message;
pub mod processor;
pub mod router;
pub mod sender;
pub mod state;

pub use barrier::StartupBarrier;
pub use config::{ManagableEndpoint, ManagerConfig};
pub use control::TrafficControl;
pub use event::{EndpointId, Event, EventKind};
pub use generator::{GeneratorKind, Heartbeat, NextMessage, RandomTraffic, TrafficGenerator};
pub use handlers::{Action, EventHandler, HandlerTable};
pub use initiator::{InitiatorExit, TrafficInitiator};
pub use manager::{EndpointManager, ManagerHandle};
pub use message::{OutboundMessage, ResponseDelay};
pub use processor::EndpointProcessor;
pub use router::{Router, RouterStats};
pub use sender::{ClientSender, MemoryRegistry, MemorySender, SendError, SenderRegistry};
pub use state::{EndpointProcessingState, Phase};
