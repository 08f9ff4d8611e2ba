//! Shared value store: latest value per metric name.
//!
//! Last-writer-wins, no deletion, memory-resident for the process
//! lifetime. Every session holds the same store; each call takes the lock
//! on its own, so a `get` across several names is not a consistent
//! snapshot and is not required to be.

use ahash::AHashMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};

#[derive(Default)]
pub struct ValueStore {
    inner: RwLock<AHashMap<String, Value>>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the latest value for `name`.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.inner.write().insert(name.into(), value);
    }

    /// Latest value for `name`, if any writer has published one.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.read().get(name).cloned()
    }

    /// Look up a batch of names. The result has exactly the requested
    /// keys; names never set resolve to `null`, not an error.
    pub fn get_many(&self, names: &[String]) -> Map<String, Value> {
        let guard = self.inner.read();
        let mut values = Map::with_capacity(names.len());
        for name in names {
            let value = guard.get(name).cloned().unwrap_or(Value::Null);
            values.insert(name.clone(), value);
        }
        values
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
