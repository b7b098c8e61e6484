//! Counter and gauge instruments.
//!
//! Both are cheap to clone; clones share the same atomic. Publishing one
//! registers a producer that reads the atomic on every query.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use crate::registry::Registry;

/// Monotonically increasing count.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by 1.
    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Register this counter under `key`.
    pub fn publish(&self, registry: &Registry, key: impl Into<String>) {
        let c = self.clone();
        registry.register(key, move || c.value());
    }
}

/// Value that moves both ways (queue depth, open connections, ...).
#[derive(Debug, Clone, Default)]
pub struct Gauge {
    value: Arc<AtomicI64>,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn dec(&self) {
        self.add(-1);
    }

    /// Add a signed delta.
    pub fn add(&self, delta: i64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn set(&self, v: i64) {
        self.value.store(v, Ordering::Relaxed);
    }

    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Register this gauge under `key`.
    pub fn publish(&self, registry: &Registry, key: impl Into<String>) {
        let g = self.clone();
        registry.register(key, move || g.value());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use gmx_core::Value;

    #[test]
    fn published_counter_tracks_increments() {
        let reg = Registry::new();
        let c = Counter::new();
        c.publish(&reg, "requests");
        c.inc();
        c.add(4);
        assert_eq!(reg.lookup("requests").unwrap()(), Value::Int(5));
    }

    #[test]
    fn gauge_moves_both_ways() {
        let reg = Registry::new();
        let g = Gauge::new();
        g.publish(&reg, "inflight");
        g.inc();
        g.inc();
        g.dec();
        assert_eq!(reg.lookup("inflight").unwrap()(), Value::Int(1));
        g.set(-3);
        assert_eq!(g.value(), -3);
        assert_eq!(reg.lookup("inflight").unwrap()(), Value::Int(-3));
    }
}
