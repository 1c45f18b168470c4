//! Outbound Payloads
//!
//! Everything the core hands to a subscriber. Payloads are transient: they
//! are built by a handler action or a traffic initiator, passed to the
//! endpoint's [`ClientSender`](crate::ClientSender) and then dropped.
//!
//! Wire format (JSON, tagged on `id`):
//!
//! ```text
//! {"id":"EndpointConnected","numConnections":16}
//! {"id":"EndpointDisconnected"}
//! {"id":"EndpointImpaired","worstResponse":3000,"time":1000}
//! {"id":"TrafficRequest","character":"🐷"}
//! {"id":"TrafficResponse","character":"🐷"}
//! ```

use serde::{Serialize, Serializer};
use std::time::Duration;

/// Connection count advertised in every `EndpointConnected` payload
pub const CONNECTED_NUM_CONNECTIONS: u32 = 16;

/// Time the subscriber needs to render a request before a response makes sense
pub const CLIENT_RENDER_LATENCY: Duration = Duration::from_millis(400);

/// Artificial response delay applied to an endpoint's traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResponseDelay {
    /// Answer straight away (0 ms)
    #[default]
    Immediate,
    /// 500 ms
    Short,
    /// 1000 ms
    Medium,
    /// 3000 ms
    Long,
    /// Requests are received but never answered (-1)
    NoResponse,
}

impl ResponseDelay {
    /// Worst delay an endpoint can be impaired to
    pub const WORST: ResponseDelay = ResponseDelay::Long;

    pub fn as_millis(self) -> i64 {
        match self {
            ResponseDelay::Immediate => 0,
            ResponseDelay::Short => 500,
            ResponseDelay::Medium => 1000,
            ResponseDelay::Long => 3000,
            ResponseDelay::NoResponse => -1,
        }
    }

    /// How long after a request its response is sent, or `None` if never
    pub fn response_after(self) -> Option<Duration> {
        match self {
            ResponseDelay::NoResponse => None,
            delay => Some(Duration::from_millis(delay.as_millis() as u64) + CLIENT_RENDER_LATENCY),
        }
    }
}

impl Serialize for ResponseDelay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_millis())
    }
}

/// A payload for the subscriber of one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "id")]
pub enum OutboundMessage {
    EndpointConnected {
        #[serde(rename = "numConnections")]
        num_connections: u32,
    },
    EndpointDisconnected,
    EndpointImpaired {
        #[serde(rename = "worstResponse")]
        worst_response: ResponseDelay,
        time: ResponseDelay,
    },
    TrafficRequest {
        character: String,
    },
    TrafficResponse {
        character: String,
    },
}

impl OutboundMessage {
    pub fn connected() -> Self {
        OutboundMessage::EndpointConnected {
            num_connections: CONNECTED_NUM_CONNECTIONS,
        }
    }

    pub fn disconnected() -> Self {
        OutboundMessage::EndpointDisconnected
    }

    pub fn impaired(delay: ResponseDelay) -> Self {
        OutboundMessage::EndpointImpaired {
            worst_response: ResponseDelay::WORST,
            time: delay,
        }
    }

    pub fn request(character: &str) -> Self {
        OutboundMessage::TrafficRequest {
            character: character.to_string(),
        }
    }

    pub fn response(character: &str) -> Self {
        OutboundMessage::TrafficResponse {
            character: character.to_string(),
        }
    }

    /// True for request/response traffic, false for lifecycle payloads
    pub fn is_traffic(&self) -> bool {
        matches!(
            self,
            OutboundMessage::TrafficRequest { .. } | OutboundMessage::TrafficResponse { .. }
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lifecycle_wire_format() {
        let connected = serde_json::to_value(OutboundMessage::connected()).unwrap();
        assert_eq!(connected, json!({"id": "EndpointConnected", "numConnections": 16}));

        let disconnected = serde_json::to_value(OutboundMessage::disconnected()).unwrap();
        assert_eq!(disconnected, json!({"id": "EndpointDisconnected"}));
    }

    #[test]
    fn test_impairment_carries_worst_and_current() {
        let msg = serde_json::to_value(OutboundMessage::impaired(ResponseDelay::Medium)).unwrap();
        assert_eq!(
            msg,
            json!({"id": "EndpointImpaired", "worstResponse": 3000, "time": 1000})
        );

        let silent =
            serde_json::to_value(OutboundMessage::impaired(ResponseDelay::NoResponse)).unwrap();
        assert_eq!(silent["time"], json!(-1));
    }

    #[test]
    fn test_traffic_wire_format() {
        let json = OutboundMessage::request("X").to_json().unwrap();
        assert_eq!(json, r#"{"id":"TrafficRequest","character":"X"}"#);
        assert!(OutboundMessage::response("X").is_traffic());
        assert!(!OutboundMessage::connected().is_traffic());
    }

    #[test]
    fn test_response_after_includes_render_latency() {
        assert_eq!(
            ResponseDelay::Immediate.response_after(),
            Some(Duration::from_millis(400))
        );
        assert_eq!(
            ResponseDelay::Medium.response_after(),
            Some(Duration::from_millis(1400))
        );
        assert_eq!(ResponseDelay::NoResponse.response_after(), None);
    }
}
