//! Traffic Initiator
//!
//! Drives request/response pairs through an endpoint's sender until told
//! to stop. One iteration:
//!
//! ```text
//!   ┌─> stop requested? ──────────────────────────────> exit (Stopped)
//!   │   delay changed?  ── adopt new delay ──> loop
//!   │   next = generator.next_message()
//!   │   spawn emit_pair(next.symbol, delay)   (request, wait, response)
//!   │   wait for the first of:
//!   │     next.wait elapsed ──────────────────────────> loop
//!   │     stop requested ─────────────────────────────> exit (Stopped)
//!   │     delay changed ──────────────────────────────> loop
//!   └──── emission reported a delivery error ─────────> exit (DeliveryFailed)
//! ```
//!
//! Emission runs in its own task so a slow response never stretches the
//! cadence. Delivery errors are not retried.

use crate::event::EndpointId;
use crate::generator::TrafficGenerator;
use crate::message::{OutboundMessage, ResponseDelay};
use crate::sender::{ClientSender, SendError};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Why an initiator loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitiatorExit {
    /// A stop signal was observed
    Stopped,
    /// A request or response could not be delivered
    DeliveryFailed(SendError),
    /// The delay control was dropped by its owner
    ControlClosed,
}

enum Wake {
    Timer,
    Stop,
    DelayChanged,
    ControlClosed,
    Failed(SendError),
}

pub struct TrafficInitiator {
    endpoint: EndpointId,
    sender: Arc<dyn ClientSender>,
    generator: Box<dyn TrafficGenerator>,
    stop: CancellationToken,
    delay: watch::Receiver<ResponseDelay>,
}

impl TrafficInitiator {
    pub fn new(
        endpoint: EndpointId,
        sender: Arc<dyn ClientSender>,
        generator: Box<dyn TrafficGenerator>,
        stop: CancellationToken,
        delay: watch::Receiver<ResponseDelay>,
    ) -> Self {
        Self {
            endpoint,
            sender,
            generator,
            stop,
            delay,
        }
    }

    pub async fn run(mut self) -> InitiatorExit {
        let (err_tx, mut err_rx) = mpsc::channel::<SendError>(1);
        let mut response_delay = *self.delay.borrow_and_update();

        debug!(
            endpoint = self.endpoint,
            generator = self.generator.name(),
            delay_ms = response_delay.as_millis(),
            "Traffic initiator started"
        );

        let exit = loop {
            if self.stop.is_cancelled() {
                break InitiatorExit::Stopped;
            }
            match self.delay.has_changed() {
                Ok(true) => {
                    response_delay = *self.delay.borrow_and_update();
                    debug!(
                        endpoint = self.endpoint,
                        delay_ms = response_delay.as_millis(),
                        "Response delay updated"
                    );
                    continue;
                }
                Ok(false) => {}
                Err(_) => break InitiatorExit::ControlClosed,
            }

            let next = self.generator.next_message();
            tokio::spawn(emit_pair(
                self.sender.clone(),
                next.symbol,
                response_delay,
                err_tx.clone(),
            ));

            let wake = tokio::select! {
                biased;
                _ = self.stop.cancelled() => Wake::Stop,
                changed = self.delay.changed() => match changed {
                    Ok(()) => Wake::DelayChanged,
                    Err(_) => Wake::ControlClosed,
                },
                Some(err) = err_rx.recv() => Wake::Failed(err),
                _ = tokio::time::sleep(next.wait) => Wake::Timer,
            };

            match wake {
                Wake::Timer => continue,
                Wake::Stop => break InitiatorExit::Stopped,
                Wake::DelayChanged => {
                    response_delay = *self.delay.borrow_and_update();
                    debug!(
                        endpoint = self.endpoint,
                        delay_ms = response_delay.as_millis(),
                        "Response delay updated"
                    );
                }
                Wake::ControlClosed => break InitiatorExit::ControlClosed,
                Wake::Failed(err) => {
                    warn!(
                        endpoint = self.endpoint,
                        generator = self.generator.name(),
                        error = %err,
                        "Traffic delivery failed, initiator stopping"
                    );
                    break InitiatorExit::DeliveryFailed(err);
                }
            }
        };

        debug!(
            endpoint = self.endpoint,
            generator = self.generator.name(),
            exit = ?exit,
            "Traffic initiator finished"
        );
        exit
    }
}

/// Send one request and, unless the endpoint has stopped responding, its
/// matching response after the delay plus render latency.
async fn emit_pair(
    sender: Arc<dyn ClientSender>,
    symbol: String,
    delay: ResponseDelay,
    errors: mpsc::Sender<SendError>,
) {
    if let Err(err) = sender.send(&OutboundMessage::request(&symbol)) {
        let _ = errors.try_send(err);
        return;
    }

    let Some(wait) = delay.response_after() else {
        return;
    };
    tokio::time::sleep(wait).await;

    if let Err(err) = sender.send(&OutboundMessage::response(&symbol)) {
        let _ = errors.try_send(err);
    }
}
