//! Traffic Control Channels
//!
//! Each endpoint processor owns one [`TrafficControl`]: the stop signal for
//! whichever traffic initiator is currently active and the live response
//! delay that initiator reads. Nothing here is shared between endpoints.
//!
//! Starting a generator always stops the previous one first and waits for
//! its task to finish, so two initiators never run for the same endpoint.
//! Stopping when nothing is running returns immediately.

use crate::event::EndpointId;
use crate::generator::GeneratorKind;
use crate::initiator::{InitiatorExit, TrafficInitiator};
use crate::message::ResponseDelay;
use crate::sender::ClientSender;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct ActiveInitiator {
    kind: GeneratorKind,
    stop: CancellationToken,
    handle: JoinHandle<InitiatorExit>,
}

pub struct TrafficControl {
    endpoint: EndpointId,
    sender: Arc<dyn ClientSender>,
    delay: watch::Sender<ResponseDelay>,
    active: Option<ActiveInitiator>,
    stops_issued: u64,
}

impl TrafficControl {
    pub fn new(endpoint: EndpointId, sender: Arc<dyn ClientSender>) -> Self {
        let (delay, _) = watch::channel(ResponseDelay::default());
        Self {
            endpoint,
            sender,
            delay,
            active: None,
            stops_issued: 0,
        }
    }

    /// Replace the active generator (if any) with a fresh one of `kind`
    pub async fn start(&mut self, kind: GeneratorKind) {
        self.stop().await;

        let stop = CancellationToken::new();
        let initiator = TrafficInitiator::new(
            self.endpoint,
            self.sender.clone(),
            kind.create(),
            stop.clone(),
            self.delay.subscribe(),
        );
        let handle = tokio::spawn(initiator.run());

        debug!(endpoint = self.endpoint, generator = ?kind, "Generator started");
        self.active = Some(ActiveInitiator { kind, stop, handle });
    }

    /// Signal the active generator to stop and wait until it has.
    ///
    /// Returns how the generator ended, or `None` if none was active.
    pub async fn stop(&mut self) -> Option<InitiatorExit> {
        let active = self.active.take()?;
        self.stops_issued += 1;
        active.stop.cancel();

        match active.handle.await {
            Ok(exit) => {
                debug!(
                    endpoint = self.endpoint,
                    generator = ?active.kind,
                    exit = ?exit,
                    stops = self.stops_issued,
                    "Generator stopped"
                );
                Some(exit)
            }
            Err(e) => {
                warn!(endpoint = self.endpoint, error = %e, "Generator task failed");
                None
            }
        }
    }

    /// Change the response delay seen by the active (and any later) generator
    pub fn set_delay(&self, delay: ResponseDelay) {
        self.delay.send_replace(delay);
    }

    pub fn delay(&self) -> ResponseDelay {
        *self.delay.borrow()
    }

    /// Kind of the generator that is still running, if any.
    ///
    /// A generator that ended on a delivery error is no longer reported.
    pub fn active_generator(&self) -> Option<GeneratorKind> {
        self.active
            .as_ref()
            .filter(|a| !a.handle.is_finished())
            .map(|a| a.kind)
    }

    /// Number of stop signals issued to a generator over this control's life
    #[cfg(test)]
    pub(crate) fn stops_issued(&self) -> u64 {
        self.stops_issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::OutboundMessage;
    use crate::sender::MemorySender;
    use std::time::Duration;

    fn control(sender: &MemorySender) -> TrafficControl {
        TrafficControl::new(1, Arc::new(sender.clone()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_without_generator_returns_immediately() {
        let sender = MemorySender::new(1);
        let mut traffic = control(&sender);

        assert_eq!(traffic.stop().await, None);
        assert_eq!(traffic.stops_issued(), 0);
        assert_eq!(traffic.active_generator(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_replaces_previous_generator() {
        let sender = MemorySender::new(1);
        let mut traffic = control(&sender);

        traffic.start(GeneratorKind::Heartbeat).await;
        assert_eq!(traffic.active_generator(), Some(GeneratorKind::Heartbeat));

        traffic.start(GeneratorKind::RandomTraffic).await;
        assert_eq!(traffic.active_generator(), Some(GeneratorKind::RandomTraffic));
        assert_eq!(traffic.stops_issued(), 1);

        assert_eq!(traffic.stop().await, Some(InitiatorExit::Stopped));
        assert_eq!(traffic.active_generator(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_cadence() {
        let sender = MemorySender::new(1);
        let mut traffic = control(&sender);

        traffic.start(GeneratorKind::Heartbeat).await;
        tokio::time::sleep(Duration::from_millis(3100)).await;
        traffic.stop().await;

        let heartbeat = OutboundMessage::request(crate::generator::HEARTBEAT_SYMBOL);
        let requests = sender.messages().iter().filter(|m| **m == heartbeat).count();
        assert_eq!(requests, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_is_inherited_by_next_generator() {
        let sender = MemorySender::new(1);
        let mut traffic = control(&sender);

        traffic.set_delay(ResponseDelay::NoResponse);
        traffic.start(GeneratorKind::Heartbeat).await;
        tokio::time::sleep(Duration::from_millis(2000)).await;
        traffic.stop().await;

        assert_eq!(traffic.delay(), ResponseDelay::NoResponse);
        assert!(sender
            .messages()
            .iter()
            .all(|m| matches!(m, OutboundMessage::TrafficRequest { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_generator_is_not_reported_active() {
        let sender = MemorySender::new(1);
        sender.set_failing(true);
        let mut traffic = control(&sender);

        traffic.start(GeneratorKind::Heartbeat).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(traffic.active_generator(), None);

        // stopping a generator that already exited does not block
        let exit = traffic.stop().await;
        assert!(matches!(exit, Some(InitiatorExit::DeliveryFailed(_))));
    }
}
