//! Inbound Commands
//!
//! An [`Event`] is an immutable command addressed to exactly one endpoint.
//! Events carry no payload beyond their kind: two events of the same kind
//! for the same endpoint are indistinguishable.

use std::fmt;

/// Integer identity of a configured endpoint
pub type EndpointId = i64;

/// The closed set of commands an endpoint understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Disconnect,
    StartTraffic,
    StopTraffic,
    DelayShort,
    DelayMedium,
    DelayLong,
    StopResponding,
    StartResponding,
}

impl EventKind {
    pub const COUNT: usize = 9;

    /// Every kind, in declaration order (index == discriminant)
    pub const ALL: [EventKind; Self::COUNT] = [
        EventKind::Connect,
        EventKind::Disconnect,
        EventKind::StartTraffic,
        EventKind::StopTraffic,
        EventKind::DelayShort,
        EventKind::DelayMedium,
        EventKind::DelayLong,
        EventKind::StopResponding,
        EventKind::StartResponding,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventKind::Connect => "Connect",
            EventKind::Disconnect => "Disconnect",
            EventKind::StartTraffic => "StartTraffic",
            EventKind::StopTraffic => "StopTraffic",
            EventKind::DelayShort => "DelayShort",
            EventKind::DelayMedium => "DelayMedium",
            EventKind::DelayLong => "DelayLong",
            EventKind::StopResponding => "StopResponding",
            EventKind::StartResponding => "StartResponding",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A command for one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Endpoint that must process this event
    pub destination: EndpointId,
    /// What the endpoint should do
    pub kind: EventKind,
}

impl Event {
    pub fn new(destination: EndpointId, kind: EventKind) -> Self {
        Self { destination, kind }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> endpoint {}", self.kind, self.destination)
    }
}
