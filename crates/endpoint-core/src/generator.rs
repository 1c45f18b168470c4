//! Traffic Patterns
//!
//! A [`TrafficGenerator`] decides what the next message looks like and how
//! long the initiator waits before producing another one:
//!
//! | Pattern          | Symbol                          | Next message after |
//! |------------------|---------------------------------|--------------------|
//! | `Heartbeat`      | ❤️                              | 3000 ms            |
//! | `RandomTraffic`  | one of 🐷 🐤 🏈 ⚽ 🍋 🍌 (uniform) | uniform [0, 2000) ms |

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

pub const HEARTBEAT_SYMBOL: &str = "❤️";
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(3000);

pub const TRAFFIC_SYMBOLS: [&str; 6] = ["🐷", "🐤", "🏈", "⚽", "🍋", "🍌"];
pub const MAX_WAIT_FOR_NEXT_MESSAGE: Duration = Duration::from_millis(2000);

/// One step of a traffic pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextMessage {
    /// Symbol carried by the request/response pair
    pub symbol: String,
    /// Time to wait before producing the following message
    pub wait: Duration,
}

/// Which built-in pattern a generator follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorKind {
    Heartbeat,
    RandomTraffic,
}

impl GeneratorKind {
    /// Build a fresh generator for a built-in pattern
    pub fn create(self) -> Box<dyn TrafficGenerator> {
        match self {
            GeneratorKind::Heartbeat => Box::new(Heartbeat),
            GeneratorKind::RandomTraffic => Box::new(RandomTraffic::new()),
        }
    }
}

/// Strategy used by a traffic initiator to produce messages
pub trait TrafficGenerator: Send {
    /// Human-readable name of the pattern
    fn name(&self) -> &str;

    fn next_message(&mut self) -> NextMessage;
}

/// Fixed symbol on a fixed interval
#[derive(Debug, Clone, Copy, Default)]
pub struct Heartbeat;

impl TrafficGenerator for Heartbeat {
    fn name(&self) -> &str {
        "heartbeat"
    }

    fn next_message(&mut self) -> NextMessage {
        NextMessage {
            symbol: HEARTBEAT_SYMBOL.to_string(),
            wait: HEARTBEAT_INTERVAL,
        }
    }
}

/// Random symbol on a random interval
#[derive(Debug, Clone)]
pub struct RandomTraffic {
    rng: StdRng,
}

impl RandomTraffic {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Reproducible sequence
    #[cfg(test)]
    fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomTraffic {
    fn default() -> Self {
        Self::new()
    }
}

impl TrafficGenerator for RandomTraffic {
    fn name(&self) -> &str {
        "random_traffic"
    }

    fn next_message(&mut self) -> NextMessage {
        let symbol = TRAFFIC_SYMBOLS[self.rng.random_range(0..TRAFFIC_SYMBOLS.len())];
        let wait_ms = self
            .rng
            .random_range(0..MAX_WAIT_FOR_NEXT_MESSAGE.as_millis() as u64);

        NextMessage {
            symbol: symbol.to_string(),
            wait: Duration::from_millis(wait_ms),
        }
    }
}
