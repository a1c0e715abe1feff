//! Write-through lookup cache keyed by the full dotted key.
//!
//! Only hits are stored. Disabling the cache drops its contents; a rebuilt
//! tree always starts with a fresh cache.

use crate::tree::ResourceValue;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

#[derive(Debug, Default)]
pub struct LookupCache {
    enabled: AtomicBool,
    entries: RwLock<HashMap<String, ResourceValue>>,
}

impl LookupCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn enable(&self) {
        if !self.enabled.swap(true, Ordering::AcqRel) {
            debug!("lookup cache enabled");
        }
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
        self.clear();
        debug!("lookup cache disabled");
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns the cached value for `key`, or runs `resolve` and stores a hit.
    ///
    /// When disabled this is a plain call to `resolve`.
    pub fn get_or_resolve<F>(&self, key: &str, resolve: F) -> Option<ResourceValue>
    where
        F: FnOnce() -> Option<ResourceValue>,
    {
        if !self.is_enabled() {
            return resolve();
        }
        if let Some(hit) = self.entries.read().get(key) {
            return Some(hit.clone());
        }

        let value = resolve()?;
        if self.is_enabled() {
            self.entries.write().insert(key.to_string(), value.clone());
        }
        Some(value)
    }
}
