//! Prometheus metrics.
//!
//! Delivery counters are bumped by the subscriber registry as payloads go
//! out. Router counters live in the core's `RouterStats` and are copied
//! into prometheus when `/metrics` is scraped.

use endpoint_core::RouterStats;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntGauge, TextEncoder};
use std::sync::Mutex;

pub static PAYLOADS_SENT: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new(
        "endpoint_payloads_sent_total",
        "Payloads queued to a subscriber",
    )
    .expect("valid metric");
    prometheus::register(Box::new(c.clone())).expect("metric registered once");
    c
});

pub static PAYLOAD_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new(
        "endpoint_payload_failures_total",
        "Payloads that could not be delivered",
    )
    .expect("valid metric");
    prometheus::register(Box::new(c.clone())).expect("metric registered once");
    c
});

pub static SUBSCRIBERS: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("endpoint_subscribers", "Registered websocket subscribers")
        .expect("valid metric");
    prometheus::register(Box::new(g.clone())).expect("metric registered once");
    g
});

pub static EVENTS_ROUTED: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new(
        "endpoint_events_routed_total",
        "Events forwarded to an endpoint processor",
    )
    .expect("valid metric");
    prometheus::register(Box::new(c.clone())).expect("metric registered once");
    c
});

pub static EVENTS_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new(
        "endpoint_events_dropped_total",
        "Events dropped for an unknown or stopped endpoint",
    )
    .expect("valid metric");
    prometheus::register(Box::new(c.clone())).expect("metric registered once");
    c
});

/// Force registration so every series shows up on the first scrape
pub fn init() {
    let _ = &*PAYLOADS_SENT;
    let _ = &*PAYLOAD_FAILURES;
    let _ = &*SUBSCRIBERS;
    let _ = &*EVENTS_ROUTED;
    let _ = &*EVENTS_DROPPED;
}

/// Serializes the read-then-add in [`sync_router_stats`]
static ROUTER_SYNC: Mutex<()> = Mutex::new(());

/// Bring the router counters up to the router's own totals
pub fn sync_router_stats(stats: &RouterStats) {
    let _guard = ROUTER_SYNC
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let routed = stats.routed().saturating_sub(EVENTS_ROUTED.get());
    EVENTS_ROUTED.inc_by(routed);
    let dropped = stats.dropped().saturating_sub(EVENTS_DROPPED.get());
    EVENTS_DROPPED.inc_by(dropped);
}

/// Text exposition of every registered metric
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_render_lists_all_series() {
        init();
        let text = render().unwrap();

        for name in [
            "endpoint_payloads_sent_total",
            "endpoint_payload_failures_total",
            "endpoint_subscribers",
            "endpoint_events_routed_total",
            "endpoint_events_dropped_total",
        ] {
            assert!(text.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_router_stats_never_double_count() {
        let stats = RouterStats::default();
        stats.dropped.store(EVENTS_DROPPED.get() + 3, Ordering::Relaxed);
        let target = stats.dropped();

        sync_router_stats(&stats);
        sync_router_stats(&stats);

        assert_eq!(EVENTS_DROPPED.get(), target);
    }

    #[test]
    fn test_concurrent_scrapes_never_double_count() {
        let stats = RouterStats::default();
        for _ in 0..200 {
            stats.routed.fetch_add(1, Ordering::Relaxed);
            let target = stats.routed();
            let barrier = std::sync::Barrier::new(8);

            std::thread::scope(|scope| {
                for _ in 0..8 {
                    scope.spawn(|| {
                        barrier.wait();
                        sync_router_stats(&stats);
                    });
                }
            });

            assert_eq!(EVENTS_ROUTED.get(), target);
        }
    }
}
