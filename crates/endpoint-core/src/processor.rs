//! Endpoint Processor
//!
//! One long-lived task per configured endpoint. It owns the endpoint's
//! [`EndpointProcessingState`] and [`TrafficControl`], receives events in
//! the order the router forwarded them and runs at most one handler at a
//! time, so no state is ever shared or locked.
//!
//! Delivery of lifecycle payloads is fire-and-forget: a failed send is
//! logged and the state transition stands.

use crate::config::ManagableEndpoint;
use crate::control::TrafficControl;
use crate::event::{Event, EventKind};
use crate::handlers::HandlerTable;
use crate::message::OutboundMessage;
use crate::sender::ClientSender;
use crate::state::EndpointProcessingState;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct EndpointProcessor {
    endpoint: ManagableEndpoint,
    table: Arc<HandlerTable>,
    sender: Arc<dyn ClientSender>,
    state: EndpointProcessingState,
    traffic: TrafficControl,
}

impl EndpointProcessor {
    pub fn new(
        endpoint: ManagableEndpoint,
        table: Arc<HandlerTable>,
        sender: Arc<dyn ClientSender>,
    ) -> Self {
        let traffic = TrafficControl::new(endpoint.id, sender.clone());
        Self {
            endpoint,
            table,
            sender,
            state: EndpointProcessingState::default(),
            traffic,
        }
    }

    pub fn state(&self) -> EndpointProcessingState {
        self.state
    }

    pub fn traffic(&self) -> &TrafficControl {
        &self.traffic
    }

    /// Apply one event. Returns the payload handed to the sender, if any.
    ///
    /// A lifecycle payload reaches the sender before any traffic from a
    /// generator the same event starts. Responses already in flight from a
    /// stopped generator may still follow it.
    pub async fn handle_event(&mut self, kind: EventKind) -> Option<OutboundMessage> {
        let handler = *self.table.get(kind);

        if !handler.accepts(&self.state) {
            debug!(
                endpoint = self.endpoint.id,
                event = %kind,
                phase = ?self.state.phase,
                "Event not applicable in current phase, ignoring"
            );
            return None;
        }

        let previous = self.state;
        let endpoint = self.endpoint.id;
        let sender = &self.sender;
        let deliver = |message: &OutboundMessage| {
            if let Err(e) = sender.send(message) {
                warn!(
                    endpoint,
                    event = %kind,
                    error = %e,
                    "Failed to deliver payload to subscriber"
                );
            }
        };
        let (payload, next) = handler.action.run(previous, &mut self.traffic, deliver).await;
        self.state = next;

        if previous.phase != next.phase {
            info!(
                endpoint,
                event = %kind,
                from = ?previous.phase,
                to = ?next.phase,
                "Endpoint transitioned"
            );
        }

        payload
    }

    /// Process events until the router closes this processor's channel
    pub async fn run(mut self, mut inbound: mpsc::Receiver<Event>) {
        info!(
            endpoint = self.endpoint.id,
            title = %self.endpoint.title,
            "Endpoint processor started"
        );

        while let Some(event) = inbound.recv().await {
            if event.destination != self.endpoint.id {
                warn!(
                    endpoint = self.endpoint.id,
                    destination = event.destination,
                    event = %event.kind,
                    "Misrouted event, dropping"
                );
                continue;
            }
            self.handle_event(event.kind).await;
        }

        self.traffic.stop().await;
        info!(endpoint = self.endpoint.id, "Endpoint processor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GeneratorKind;
    use crate::message::ResponseDelay;
    use crate::sender::MemorySender;
    use crate::state::Phase;

    fn processor(id: i64) -> (EndpointProcessor, MemorySender) {
        let sender = MemorySender::new(id);
        let processor = EndpointProcessor::new(
            ManagableEndpoint::new(id, "test", 8),
            Arc::new(HandlerTable::new()),
            Arc::new(sender.clone()),
        );
        (processor, sender)
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_only_from_down() {
        let (mut p, sender) = processor(1);

        assert_eq!(p.handle_event(EventKind::Connect).await, Some(OutboundMessage::connected()));
        assert_eq!(p.state().phase, Phase::UpWaiting);

        // second connect is ignored
        assert_eq!(p.handle_event(EventKind::Connect).await, None);
        assert_eq!(p.state().phase, Phase::UpWaiting);
        assert_eq!(sender.lifecycle_messages(), vec![OutboundMessage::connected()]);

        p.traffic.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_is_idempotent() {
        let (mut p, sender) = processor(1);
        p.handle_event(EventKind::Connect).await;
        p.handle_event(EventKind::StartTraffic).await;

        assert_eq!(
            p.handle_event(EventKind::Disconnect).await,
            Some(OutboundMessage::disconnected())
        );
        assert_eq!(p.handle_event(EventKind::Disconnect).await, None);

        assert_eq!(p.state().phase, Phase::Down);
        assert_eq!(p.traffic().active_generator(), None);
        let disconnects = sender
            .lifecycle_messages()
            .into_iter()
            .filter(|m| *m == OutboundMessage::disconnected())
            .count();
        assert_eq!(disconnects, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_issues_one_stop() {
        let (mut p, _sender) = processor(1);
        p.handle_event(EventKind::Connect).await;
        let before = p.traffic().stops_issued();

        p.handle_event(EventKind::Disconnect).await;
        assert_eq!(p.traffic().stops_issued(), before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_traffic_only_from_waiting() {
        let (mut p, _sender) = processor(1);

        assert_eq!(p.handle_event(EventKind::StartTraffic).await, None);
        assert_eq!(p.state().phase, Phase::Down);

        p.handle_event(EventKind::Connect).await;
        assert_eq!(p.handle_event(EventKind::StartTraffic).await, None);
        assert_eq!(p.state().phase, Phase::UpReceiving);
        assert_eq!(p.traffic().active_generator(), Some(GeneratorKind::RandomTraffic));

        // already receiving
        p.handle_event(EventKind::StartTraffic).await;
        assert_eq!(p.state().phase, Phase::UpReceiving);

        p.traffic.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_accepted_while_down() {
        let (mut p, sender) = processor(1);

        let payload = p.handle_event(EventKind::DelayLong).await;

        assert_eq!(payload, Some(OutboundMessage::impaired(ResponseDelay::Long)));
        assert_eq!(p.state().phase, Phase::Down);
        assert_eq!(p.state().current_delay, ResponseDelay::Long);
        assert_eq!(p.traffic().delay(), ResponseDelay::Long);
        assert_eq!(sender.messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_failure_keeps_transition() {
        let (mut p, sender) = processor(1);
        sender.set_failing(true);

        let payload = p.handle_event(EventKind::Connect).await;

        assert_eq!(payload, Some(OutboundMessage::connected()));
        assert_eq!(p.state().phase, Phase::UpWaiting);
        assert!(sender.messages().is_empty());

        p.traffic.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_connected_precedes_first_heartbeat() {
        for _ in 0..50 {
            let (mut p, sender) = processor(1);

            p.handle_event(EventKind::Connect).await;
            tokio::task::yield_now().await;

            assert_eq!(sender.messages().first(), Some(&OutboundMessage::connected()));
            p.handle_event(EventKind::Disconnect).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exits_when_channel_closes() {
        let (p, sender) = processor(4);
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(p.run(rx));

        tx.send(Event::new(4, EventKind::Connect)).await.unwrap();
        tx.send(Event::new(5, EventKind::Disconnect)).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(sender.lifecycle_messages(), vec![OutboundMessage::connected()]);
    }
}
