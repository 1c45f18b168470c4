//! Handler Table
//!
//! Maps every [`EventKind`] to a guard over the current state and the action
//! to run when the guard passes. The table is built once and shared by all
//! processors; it holds no per-endpoint data.
//!
//! | Phase       | Connect    | Disconnect | StartTraffic | StopTraffic | Delay* / Stop/StartResponding |
//! |-------------|------------|------------|--------------|-------------|-------------------------------|
//! | Down        | UpWaiting  | -          | -            | -           | delay updated, phase kept     |
//! | UpWaiting   | -          | Down       | UpReceiving  | -           | delay updated, phase kept     |
//! | UpReceiving | -          | Down       | -            | UpWaiting   | delay updated, phase kept     |
//! | Impaired    | -          | Down       | -            | UpWaiting   | delay updated, phase kept     |

use crate::control::TrafficControl;
use crate::event::EventKind;
use crate::generator::GeneratorKind;
use crate::message::{OutboundMessage, ResponseDelay};
use crate::state::{EndpointProcessingState, Phase};

/// Pure predicate over the current state
pub type Guard = fn(&EndpointProcessingState) -> bool;

/// What a handler does once its guard has passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Connect,
    Disconnect,
    StartTraffic,
    StopTraffic,
    Impair(ResponseDelay),
}

impl Action {
    /// Run side effects against the endpoint's traffic control and return the
    /// payload (if any) together with the next state.
    ///
    /// The payload is passed to `deliver` at the point where the subscriber
    /// should see it: after a stopped generator has been joined, and before
    /// a newly started one can emit. Any generator swap stops and joins the
    /// old initiator before the new one is spawned.
    pub async fn run<F>(
        self,
        previous: EndpointProcessingState,
        traffic: &mut TrafficControl,
        deliver: F,
    ) -> (Option<OutboundMessage>, EndpointProcessingState)
    where
        F: FnOnce(&OutboundMessage),
    {
        match self {
            Action::Connect => {
                let payload = OutboundMessage::connected();
                deliver(&payload);
                traffic.start(GeneratorKind::Heartbeat).await;
                (Some(payload), previous.with_phase(Phase::UpWaiting))
            }
            Action::Disconnect => {
                traffic.stop().await;
                let payload = OutboundMessage::disconnected();
                deliver(&payload);
                (Some(payload), previous.with_phase(Phase::Down))
            }
            Action::StartTraffic => {
                traffic.start(GeneratorKind::RandomTraffic).await;
                (None, previous.with_phase(Phase::UpReceiving))
            }
            Action::StopTraffic => {
                traffic.start(GeneratorKind::Heartbeat).await;
                traffic.set_delay(previous.current_delay);
                (None, previous.with_phase(Phase::UpWaiting))
            }
            Action::Impair(delay) => {
                traffic.set_delay(delay);
                let payload = OutboundMessage::impaired(delay);
                deliver(&payload);
                (Some(payload), previous.with_delay(delay))
            }
        }
    }
}

#[derive(Clone, Copy)]
pub struct EventHandler {
    pub guard: Guard,
    pub action: Action,
}

impl EventHandler {
    pub fn accepts(&self, state: &EndpointProcessingState) -> bool {
        (self.guard)(state)
    }
}

impl std::fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandler")
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Guards
// ============================================================================

fn is_down(state: &EndpointProcessingState) -> bool {
    state.phase == Phase::Down
}

fn is_up(state: &EndpointProcessingState) -> bool {
    state.phase.is_up()
}

fn is_waiting(state: &EndpointProcessingState) -> bool {
    state.phase == Phase::UpWaiting
}

fn is_trafficking(state: &EndpointProcessingState) -> bool {
    matches!(state.phase, Phase::UpReceiving | Phase::Impaired)
}

fn always(_: &EndpointProcessingState) -> bool {
    true
}

// ============================================================================
// Table
// ============================================================================

#[derive(Debug)]
pub struct HandlerTable {
    handlers: [EventHandler; EventKind::COUNT],
}

impl HandlerTable {
    pub fn new() -> Self {
        Self {
            handlers: EventKind::ALL.map(Self::entry),
        }
    }

    fn entry(kind: EventKind) -> EventHandler {
        let (guard, action): (Guard, Action) = match kind {
            EventKind::Connect => (is_down, Action::Connect),
            EventKind::Disconnect => (is_up, Action::Disconnect),
            EventKind::StartTraffic => (is_waiting, Action::StartTraffic),
            EventKind::StopTraffic => (is_trafficking, Action::StopTraffic),
            EventKind::DelayShort => (always, Action::Impair(ResponseDelay::Short)),
            EventKind::DelayMedium => (always, Action::Impair(ResponseDelay::Medium)),
            EventKind::DelayLong => (always, Action::Impair(ResponseDelay::Long)),
            EventKind::StopResponding => (always, Action::Impair(ResponseDelay::NoResponse)),
            EventKind::StartResponding => (always, Action::Impair(ResponseDelay::Immediate)),
        };
        EventHandler { guard, action }
    }

    pub fn get(&self, kind: EventKind) -> &EventHandler {
        &self.handlers[kind.index()]
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}
