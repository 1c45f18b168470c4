//! Per-endpoint processing state
//!
//! Owned by exactly one [`EndpointProcessor`](crate::EndpointProcessor) and
//! only ever replaced by that processor's handler actions.

use crate::message::ResponseDelay;

/// Connection phase of a simulated endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Down,
    /// Connected, heartbeating, no traffic
    UpWaiting,
    /// Connected and exchanging random traffic
    UpReceiving,
    Impaired,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Down,
        Phase::UpWaiting,
        Phase::UpReceiving,
        Phase::Impaired,
    ];

    pub fn is_up(self) -> bool {
        self != Phase::Down
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EndpointProcessingState {
    pub phase: Phase,
    pub current_delay: ResponseDelay,
}

impl EndpointProcessingState {
    pub fn new(phase: Phase, current_delay: ResponseDelay) -> Self {
        Self {
            phase,
            current_delay,
        }
    }

    pub fn with_phase(self, phase: Phase) -> Self {
        Self { phase, ..self }
    }

    pub fn with_delay(self, current_delay: ResponseDelay) -> Self {
        Self {
            current_delay,
            ..self
        }
    }
}
