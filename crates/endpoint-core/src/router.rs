//! Event Router
//!
//! Fans the single inbound event stream out to per-endpoint channels.
//! Events for an endpoint that has no processor are logged and dropped.

use crate::event::{EndpointId, Event};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
pub struct RouterStats {
    pub routed: AtomicU64,
    pub dropped: AtomicU64,
}

impl RouterStats {
    pub fn routed(&self) -> u64 {
        self.routed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

pub struct Router {
    routes: HashMap<EndpointId, mpsc::Sender<Event>>,
    stats: Arc<RouterStats>,
}

impl Router {
    pub fn new(routes: HashMap<EndpointId, mpsc::Sender<Event>>, stats: Arc<RouterStats>) -> Self {
        Self { routes, stats }
    }

    /// Forward events until the inbound channel closes. Dropping the router
    /// afterwards closes every processor's channel.
    pub async fn run(self, mut inbound: mpsc::Receiver<Event>) {
        info!(endpoints = self.routes.len(), "Router started");

        while let Some(event) = inbound.recv().await {
            self.route(event).await;
        }

        info!(
            routed = self.stats.routed(),
            dropped = self.stats.dropped(),
            "Router stopped"
        );
    }

    async fn route(&self, event: Event) {
        let Some(route) = self.routes.get(&event.destination) else {
            warn!(
                endpoint = event.destination,
                event = %event.kind,
                "Event addressed to an unconfigured endpoint, dropping"
            );
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        debug!(endpoint = event.destination, event = %event.kind, "Routing event");
        match route.send(event).await {
            Ok(()) => {
                self.stats.routed.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                warn!(
                    endpoint = event.destination,
                    event = %event.kind,
                    "Endpoint processor has stopped, dropping event"
                );
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
