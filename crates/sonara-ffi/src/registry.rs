//! Process-wide lookup from wire descriptors and instance handles to the
//! adapter that owns them
//!
//! The C operation table carries no context pointer, so every trampoline
//! resolves its adapter here. Handles are opaque tokens allocated from a
//! counter; they are never dereferenced and never reused, so a stale handle
//! simply misses.

use crate::abi::{PluginHandle, WirePluginDescriptor};
use crate::adapter::AdapterCore;
use parking_lot::{Mutex, RwLock};
use sonara_kernel::Plugin;
use std::collections::HashMap;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// A live plugin instance and the adapter that created it
#[derive(Clone)]
pub struct InstanceEntry {
    pub adapter: Arc<AdapterCore>,
    pub plugin: Arc<Mutex<Box<dyn Plugin>>>,
}

pub struct AdapterRegistry {
    descriptors: RwLock<HashMap<usize, Arc<AdapterCore>>>,
    instances: RwLock<HashMap<usize, InstanceEntry>>,
    next_handle: AtomicUsize,
}

static GLOBAL_REGISTRY: OnceLock<AdapterRegistry> = OnceLock::new();

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            descriptors: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
            next_handle: AtomicUsize::new(1),
        }
    }

    /// The registry used by the exported C operations
    pub fn global() -> &'static AdapterRegistry {
        GLOBAL_REGISTRY.get_or_init(AdapterRegistry::new)
    }

    pub fn register_descriptor(&self, descriptor: *const WirePluginDescriptor, adapter: Arc<AdapterCore>) {
        debug!(descriptor = ?descriptor, "registering plugin descriptor");
        self.descriptors.write().insert(descriptor.addr(), adapter);
    }

    pub fn unregister_descriptor(&self, descriptor: *const WirePluginDescriptor) -> Option<Arc<AdapterCore>> {
        self.descriptors.write().remove(&descriptor.addr())
    }

    pub fn adapter_for_descriptor(&self, descriptor: *const WirePluginDescriptor) -> Option<Arc<AdapterCore>> {
        self.descriptors.read().get(&descriptor.addr()).cloned()
    }

    pub fn is_adapter_registered(&self, adapter: &Arc<AdapterCore>) -> bool {
        self.descriptors.read().values().any(|a| Arc::ptr_eq(a, adapter))
    }

    /// Store a new instance and return its freshly allocated handle
    pub fn register_instance(&self, entry: InstanceEntry) -> PluginHandle {
        let token = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.instances.write().insert(token, entry);
        ptr::without_provenance_mut(token)
    }

    pub fn unregister_instance(&self, handle: PluginHandle) -> Option<InstanceEntry> {
        self.instances.write().remove(&handle.addr())
    }

    pub fn instance(&self, handle: PluginHandle) -> Option<InstanceEntry> {
        if handle.is_null() {
            return None;
        }
        self.instances.read().get(&handle.addr()).cloned()
    }

    pub fn adapter_for_instance(&self, handle: PluginHandle) -> Option<Arc<AdapterCore>> {
        self.instance(handle).map(|entry| entry.adapter)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.read().len()
    }

    pub fn descriptor_count(&self) -> usize {
        self.descriptors.read().len()
    }
}
