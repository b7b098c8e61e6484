//! Process-wide default registry.
//!
//! Most programs want one registry and one server for the whole process.
//! The default registry is created on first use; [`start`] binds this
//! process's endpoint and serves it, at most once per process. The returned
//! [`Agent`] must be kept alive and should be shut down explicitly before
//! exit so the endpoint file is removed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use gmx_core::error::{GmxError, Result};
use gmx_core::Value;

use crate::config::AgentConfig;
use crate::instrument::{Counter, Gauge};
use crate::registry::Registry;
use crate::server::Agent;

static DEFAULT: OnceLock<Arc<Registry>> = OnceLock::new();
static STARTED: AtomicBool = AtomicBool::new(false);

/// The process-wide registry.
pub fn registry() -> Arc<Registry> {
    Arc::clone(DEFAULT.get_or_init(|| Arc::new(Registry::new())))
}

/// Register `f` under `key` in the process-wide registry.
pub fn publish<F, V>(key: impl Into<String>, f: F)
where
    F: Fn() -> V + Send + Sync + 'static,
    V: Into<Value>,
{
    registry().register(key, f);
}

/// New counter published under `key` in the process-wide registry.
pub fn counter(key: impl Into<String>) -> Counter {
    let c = Counter::new();
    c.publish(&registry(), key);
    c
}

/// New gauge published under `key` in the process-wide registry.
pub fn gauge(key: impl Into<String>) -> Gauge {
    let g = Gauge::new();
    g.publish(&registry(), key);
    g
}

/// Serve the process-wide registry on this process's endpoint.
///
/// Fails with [`GmxError::AlreadyStarted`] after a successful call. A failed
/// start may be retried.
pub async fn start(cfg: &AgentConfig) -> Result<Agent> {
    if STARTED.swap(true, Ordering::SeqCst) {
        return Err(GmxError::AlreadyStarted);
    }
    let res = Agent::start(registry(), cfg).await;
    if res.is_err() {
        STARTED.store(false, Ordering::SeqCst);
    }
    res
}
