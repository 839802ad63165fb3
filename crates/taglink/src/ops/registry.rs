// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Deferred struct-ops registration table.
//!
//! Bundles are registered by type name, usually before the composite type
//! exists, and claimed by the linker when that type links.
//!
//! # Lifecycle
//!
//! Populated during start-up (or by a hot-reload pass), read while linking.
//! Re-registering a name replaces the bundle. Outside hot reload the old
//! bundle is dropped once nothing holds it; during hot reload it is moved to a
//! retired list and kept for the life of the registry, since instances built
//! against it may still dispatch through it.

use super::StructOps;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

static GLOBAL_OPS: OnceLock<Arc<StructOpsRegistry>> = OnceLock::new();

#[derive(Debug, Default)]
pub struct StructOpsRegistry {
    bundles: RwLock<HashMap<String, Arc<StructOps>>>,
    retired: Mutex<Vec<Arc<StructOps>>>,
    hot_reload: AtomicBool,
}

impl StructOpsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide table.
    pub fn global() -> Arc<StructOpsRegistry> {
        Arc::clone(GLOBAL_OPS.get_or_init(|| Arc::new(StructOpsRegistry::new())))
    }

    /// Store (or replace) the bundle for `type_name`.
    pub fn defer_register(&self, type_name: &str, ops: StructOps) -> Arc<StructOps> {
        let ops = Arc::new(ops);
        let previous = self
            .bundles
            .write()
            .insert(type_name.to_string(), Arc::clone(&ops));
        if let Some(previous) = previous {
            self.retire(type_name, previous);
        }
        log::debug!("[ops] registered struct ops for '{}'", type_name);
        ops
    }

    /// Remove the bundle for `type_name`.
    pub fn deregister(&self, type_name: &str) -> Option<Arc<StructOps>> {
        let removed = self.bundles.write().remove(type_name)?;
        if self.is_hot_reload() {
            self.retire(type_name, Arc::clone(&removed));
        }
        Some(removed)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.bundles.read().contains_key(type_name)
    }

    pub fn find(&self, type_name: &str) -> Option<Arc<StructOps>> {
        self.bundles.read().get(type_name).cloned()
    }

    pub fn len(&self) -> usize {
        self.bundles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.read().is_empty()
    }

    pub fn set_hot_reload(&self, enabled: bool) {
        self.hot_reload.store(enabled, Ordering::Release);
    }

    pub fn is_hot_reload(&self) -> bool {
        self.hot_reload.load(Ordering::Acquire)
    }

    /// Bundles kept alive by hot reload.
    pub fn retired_count(&self) -> usize {
        self.retired.lock().len()
    }

    fn retire(&self, type_name: &str, previous: Arc<StructOps>) {
        if self.is_hot_reload() {
            log::info!(
                "[ops] hot reload: keeping replaced struct ops for '{}' alive",
                type_name
            );
            self.retired.lock().push(previous);
        } else if Arc::strong_count(&previous) > 1 {
            log::debug!(
                "[ops] struct ops for '{}' replaced while still referenced",
                type_name
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_find_replace() {
        let registry = StructOpsRegistry::new();
        assert!(!registry.contains("Color"));

        registry.defer_register("Color", StructOps::new(4, 1));
        assert!(registry.contains("Color"));
        assert_eq!(registry.find("Color").map(|ops| ops.size()), Some(4));

        registry.defer_register("Color", StructOps::new(4, 4));
        assert_eq!(registry.find("Color").map(|ops| ops.alignment()), Some(4));
        assert_eq!(registry.retired_count(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_hot_reload_retires_old_bundles() {
        let registry = StructOpsRegistry::new();
        registry.set_hot_reload(true);
        let first = registry.defer_register("Transform", StructOps::new(48, 16));
        registry.defer_register("Transform", StructOps::new(64, 16));
        assert_eq!(registry.retired_count(), 1);
        // Old bundle still usable by holders.
        assert_eq!(first.size(), 48);

        assert!(registry.deregister("Transform").is_some());
        assert_eq!(registry.retired_count(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_global_is_shared() {
        let a = StructOpsRegistry::global();
        let b = StructOpsRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
