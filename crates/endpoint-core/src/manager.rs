//! Endpoint Manager
//!
//! Builds the handler table once, creates one [`EndpointProcessor`] per
//! configured endpoint and wires the [`Router`] in front of them.
//!
//! ```text
//!   events ──> Router ──┬──> processor(1) ──> sender(1)
//!                       ├──> processor(2) ──> sender(2)
//!                       └──> ...
//! ```

use crate::barrier::StartupBarrier;
use crate::config::{ManagableEndpoint, ManagerConfig};
use crate::event::Event;
use crate::handlers::HandlerTable;
use crate::processor::EndpointProcessor;
use crate::router::{Router, RouterStats};
use crate::sender::SenderRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct EndpointManager {
    endpoints: Vec<ManagableEndpoint>,
    registry: Arc<dyn SenderRegistry>,
    table: Arc<HandlerTable>,
    config: ManagerConfig,
}

/// Running manager: the spawned tasks and the router's counters
pub struct ManagerHandle {
    tasks: Vec<JoinHandle<()>>,
    stats: Arc<RouterStats>,
}

impl ManagerHandle {
    pub fn stats(&self) -> Arc<RouterStats> {
        self.stats.clone()
    }

    /// Number of tasks spawned (processors plus the router)
    #[cfg(test)]
    fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for the router and every processor to finish. They finish once
    /// the inbound event sender has been dropped.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Manager task failed");
            }
        }
    }
}

impl EndpointManager {
    pub fn new(
        endpoints: Vec<ManagableEndpoint>,
        registry: Arc<dyn SenderRegistry>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            endpoints,
            registry,
            table: Arc::new(HandlerTable::new()),
            config,
        }
    }

    /// Spawn one processor per endpoint, then the router. The barrier is
    /// credited with `endpoints + 1` tasks, each marked as it is spawned.
    pub fn start(self, inbound: mpsc::Receiver<Event>, barrier: &StartupBarrier) -> ManagerHandle {
        barrier.add(self.endpoints.len() + 1);

        let mut tasks = Vec::with_capacity(self.endpoints.len() + 1);
        let mut routes = HashMap::with_capacity(self.endpoints.len());

        for endpoint in self.endpoints {
            let (tx, rx) = mpsc::channel(self.config.endpoint_queue_capacity.max(1));
            if routes.insert(endpoint.id, tx).is_some() {
                warn!(endpoint = endpoint.id, "Duplicate endpoint id, earlier processor unreachable");
            }

            let sender = self.registry.sender_for(endpoint.id);
            let processor = EndpointProcessor::new(endpoint, self.table.clone(), sender);
            tasks.push(tokio::spawn(processor.run(rx)));
            barrier.done();
        }

        let stats = Arc::new(RouterStats::default());
        let router = Router::new(routes, stats.clone());
        tasks.push(tokio::spawn(router.run(inbound)));
        barrier.done();

        info!(tasks = tasks.len(), "Endpoint manager started");
        ManagerHandle { tasks, stats }
    }
}
