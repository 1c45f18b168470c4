//! Application configuration.
//!
//! Loaded once from `config.json` at startup:
//!
//! ```json
//! {
//!   "endpoints": [ { "id": 1, "title": "Edge Router", "maxConns": 32 } ],
//!   "keypressProfiles": [
//!     { "ID": 1, "Connect": "q", "StartTraffic": "w", "StopTraffic": "e",
//!       "Delay500ms": "r", "Delay1000ms": "t", "Delay5000ms": "y",
//!       "StopResponding": "u", "StartResponding": "i", "Disconnect": "o" }
//!   ]
//! }
//! ```

use endpoint_core::{EndpointId, Event, EventKind, ManagableEndpoint};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Key that ends the process; it can never be bound to an event
pub const QUIT_KEY: char = '`';

/// Errors that can occur while loading the configuration
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    /// Two endpoints share an id
    DuplicateEndpoint(EndpointId),
    /// A key is bound more than once across all profiles
    DuplicateKey(char),
    /// The quit key was bound to an event
    ReservedKey(char),
    /// A key profile targets an endpoint that is not configured
    UnknownEndpoint { key: char, endpoint: EndpointId },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Failed to read config: {}", e),
            Self::Parse(e) => write!(f, "Failed to parse config: {}", e),
            Self::DuplicateEndpoint(id) => write!(f, "Endpoint {} is configured twice", id),
            Self::DuplicateKey(key) => write!(f, "Key {:?} is bound more than once", key),
            Self::ReservedKey(key) => write!(f, "Key {:?} is reserved for quitting", key),
            Self::UnknownEndpoint { key, endpoint } => write!(
                f,
                "Key {:?} is bound to endpoint {} which is not configured",
                key, endpoint
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

/// Keys driving one endpoint. Every binding is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KeyPressProfile {
    #[serde(rename = "ID")]
    pub id: EndpointId,
    #[serde(rename = "Connect", default)]
    pub connect: Option<char>,
    #[serde(rename = "StartTraffic", default)]
    pub start_traffic: Option<char>,
    #[serde(rename = "StopTraffic", default)]
    pub stop_traffic: Option<char>,
    #[serde(rename = "Delay500ms", default)]
    pub delay_short: Option<char>,
    #[serde(rename = "Delay1000ms", default)]
    pub delay_medium: Option<char>,
    #[serde(rename = "Delay5000ms", default)]
    pub delay_long: Option<char>,
    #[serde(rename = "StopResponding", default)]
    pub stop_responding: Option<char>,
    #[serde(rename = "StartResponding", default)]
    pub start_responding: Option<char>,
    #[serde(rename = "Disconnect", default)]
    pub disconnect: Option<char>,
}

impl KeyPressProfile {
    /// Bound keys with the event kind each one triggers
    pub fn bindings(&self) -> impl Iterator<Item = (char, EventKind)> + '_ {
        [
            (self.connect, EventKind::Connect),
            (self.start_traffic, EventKind::StartTraffic),
            (self.stop_traffic, EventKind::StopTraffic),
            (self.delay_short, EventKind::DelayShort),
            (self.delay_medium, EventKind::DelayMedium),
            (self.delay_long, EventKind::DelayLong),
            (self.stop_responding, EventKind::StopResponding),
            (self.start_responding, EventKind::StartResponding),
            (self.disconnect, EventKind::Disconnect),
        ]
        .into_iter()
        .filter_map(|(key, kind)| key.map(|k| (k, kind)))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    pub endpoints: Vec<ManagableEndpoint>,
    #[serde(rename = "keypressProfiles", default)]
    pub key_profiles: Vec<KeyPressProfile>,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        raw.parse()
    }

    /// Reject configurations the key listener or manager could not honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut ids = HashSet::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            if !ids.insert(endpoint.id) {
                return Err(ConfigError::DuplicateEndpoint(endpoint.id));
            }
        }

        let mut keys = HashSet::new();
        for profile in &self.key_profiles {
            for (key, _) in profile.bindings() {
                if key == QUIT_KEY {
                    return Err(ConfigError::ReservedKey(key));
                }
                if !keys.insert(key) {
                    return Err(ConfigError::DuplicateKey(key));
                }
                if !ids.contains(&profile.id) {
                    return Err(ConfigError::UnknownEndpoint {
                        key,
                        endpoint: profile.id,
                    });
                }
            }
        }
        Ok(())
    }

    /// Flatten all profiles into one key -> event lookup
    pub fn key_map(&self) -> HashMap<char, Event> {
        self.key_profiles
            .iter()
            .flat_map(|profile| {
                profile
                    .bindings()
                    .map(move |(key, kind)| (key, Event::new(profile.id, kind)))
            })
            .collect()
    }
}

impl std::str::FromStr for AppConfig {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let config: AppConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }
}
