use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gmx_core::Value;

/// Zero-argument function computing the current value of a key.
pub type Producer = Arc<dyn Fn() -> Value + Send + Sync>;

/// Registry of producers: `key -> Producer`.
///
/// One exclusive lock guards the map. It is held only for a lookup or an
/// insert, never while a producer runs, so a slow producer stalls nothing
/// but the response it belongs to.
#[derive(Default)]
pub struct Registry {
    entries: Mutex<HashMap<String, Producer>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register `f` under `key`. An existing producer for `key` is replaced.
    pub fn register<F, V>(&self, key: impl Into<String>, f: F)
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        let producer: Producer = Arc::new(move || f().into());
        self.entries().insert(key.into(), producer);
    }

    /// Producer for `key`, if registered.
    pub fn lookup(&self, key: &str) -> Option<Producer> {
        self.entries().get(key).cloned()
    }

    /// Point-in-time copy of the registered key names, sorted.
    pub fn snapshot_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    // Producers never run under the lock, so a poisoned map is still consistent.
    fn entries(&self) -> MutexGuard<'_, HashMap<String, Producer>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
