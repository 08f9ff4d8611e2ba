//! Shared metrics engine: the value store plus the derived-value registry.
//!
//! One engine is created at startup and handed to every session as an
//! `Arc`. Store calls are atomic per operation; the transformer list for
//! each raw metric name sits behind its own mutex so two sessions
//! delivering samples for the same name never interleave a transformer's
//! read-modify-write. Sessions themselves hold no locks.

use ahash::AHashMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::clock::Clock;
use crate::derive::Transformer;
use crate::store::ValueStore;

pub struct MetricsEngine {
    store: ValueStore,
    transformers: AHashMap<String, Mutex<Vec<Box<dyn Transformer>>>>,
    clock: Arc<dyn Clock>,
}

impl MetricsEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MetricsEngine {
            store: ValueStore::new(),
            transformers: AHashMap::new(),
            clock,
        }
    }

    /// Attach a transformer to a raw metric name. Registration happens
    /// only during startup, before the engine is shared.
    pub fn register(&mut self, raw_name: impl Into<String>, transformer: Box<dyn Transformer>) {
        self.transformers
            .entry(raw_name.into())
            .or_default()
            .lock()
            .push(transformer);
    }

    pub fn store(&self) -> &ValueStore {
        &self.store
    }

    /// Apply one `set` batch: every raw value is stored unconditionally,
    /// then each registered transformer for that name runs and its
    /// outputs are stored under their derived names.
    pub fn apply_set(&self, args: Map<String, Value>) {
        for (name, value) in args {
            self.store.set(name.clone(), value.clone());

            if let Some(list) = self.transformers.get(&name) {
                let mut list = list.lock();
                // Read the clock under the lock: timestamps handed to a
                // given transformer stay monotone even when sessions race
                // on the same raw metric name.
                let now_ms = self.clock.now_ms();
                for transformer in list.iter_mut() {
                    for (derived_name, derived_value) in transformer.compute(&value, now_ms) {
                        debug!(raw = %name, derived = %derived_name, value = %derived_value, "derived value");
                        self.store.set(derived_name, derived_value);
                    }
                }
            }
        }
    }

    /// Resolve a `get` batch; names never set come back as `null`.
    pub fn lookup(&self, names: &[String]) -> Map<String, Value> {
        self.store.get_many(names)
    }
}
