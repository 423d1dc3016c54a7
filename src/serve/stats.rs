//! Live request counters.
//!
//! Counters are injected into the serving layer rather than reached as
//! process globals. Increments are lock-free relaxed atomics; the stats
//! endpoint reads a snapshot at whatever instant it is asked.

use std::sync::atomic::{AtomicU64, Ordering};

/// Named 64-bit counters covering every non-stats response for the lifetime
/// of the process.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    requests_total: AtomicU64,
    responses_ok: AtomicU64,
    responses_not_modified: AtomicU64,
    responses_not_found: AtomicU64,
    responses_other: AtomicU64,
    bytes_served: AtomicU64,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a 200 response and its body length.
    pub fn record_ok(&self, body_bytes: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.responses_ok.fetch_add(1, Ordering::Relaxed);
        self.bytes_served.fetch_add(body_bytes, Ordering::Relaxed);
    }

    /// Record a 304 response.
    pub fn record_not_modified(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.responses_not_modified.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a 404 response.
    pub fn record_not_found(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.responses_not_found.fetch_add(1, Ordering::Relaxed);
    }

    /// Record any other response class.
    pub fn record_other(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.responses_other.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values, in stable render order.
    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("requests_total", self.requests_total.load(Ordering::Relaxed)),
            ("responses_ok", self.responses_ok.load(Ordering::Relaxed)),
            (
                "responses_not_modified",
                self.responses_not_modified.load(Ordering::Relaxed),
            ),
            (
                "responses_not_found",
                self.responses_not_found.load(Ordering::Relaxed),
            ),
            ("responses_other", self.responses_other.load(Ordering::Relaxed)),
            ("bytes_served", self.bytes_served.load(Ordering::Relaxed)),
        ]
    }

    /// Plain-text rendering for the stats endpoint: one `name value` line
    /// per counter.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, value) in self.snapshot() {
            out.push_str(&format!("{name} {value}\n"));
        }
        out
    }
}
