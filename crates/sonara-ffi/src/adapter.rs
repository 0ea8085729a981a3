//! Exposes a native [`Plugin`] type through the C operation table
//!
//! One [`PluginAdapter`] exists per exported plugin type. On first request
//! it builds the type's [`WirePluginDescriptor`] from a throwaway instance
//! and registers it with the [`AdapterRegistry`]; the descriptor then stays
//! fixed for the life of the adapter.
//!
//! Every operation in the table is a trampoline that resolves its adapter
//! and instance through the registry and forwards to the native plugin.
//! Panics never cross the boundary: each trampoline catches them and
//! returns a neutral value (NULL, zero, or nothing).

use crate::abi::{
    INPUT_DOMAIN_FREQUENCY, INPUT_DOMAIN_TIME, PluginHandle, WireFeatureSet, WireOutputDescriptor,
    WirePluginDescriptor,
};
use crate::buffers::FeatureBuffers;
use crate::ownership::{self, DescriptorArena};
use crate::registry::{AdapterRegistry, InstanceEntry};
use parking_lot::Mutex;
use sonara_kernel::{ABI_VERSION, FeatureSet, InputDomain, OutputDescriptor, Plugin, RealTime};
use std::collections::HashMap;
use std::ffi::{c_int, c_uint};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, trace, warn};

/// Sample rate used for the metadata-only instance behind a descriptor
pub const METADATA_SAMPLE_RATE: f32 = 48000.0;

/// Creates a plugin instance for an input sample rate
pub type PluginFactory = Box<dyn Fn(f32) -> Option<Box<dyn Plugin>> + Send + Sync>;

struct Populated {
    descriptor: Box<WirePluginDescriptor>,
    _arena: DescriptorArena,
    parameters: Vec<String>,
    programs: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct Geometry {
    channels: usize,
    frames: usize,
}

#[derive(Default)]
struct InstanceState {
    outputs: Option<Vec<OutputDescriptor>>,
    geometry: Option<Geometry>,
    buffers: FeatureBuffers,
}

/// Shared state of one adapter, referenced by the registry and by every
/// live instance it created
pub struct AdapterCore {
    factory: PluginFactory,
    populated: OnceLock<Populated>,
    populate_lock: Mutex<()>,
    instances: Mutex<HashMap<usize, InstanceState>>,
}

impl AdapterCore {
    /// The populated descriptor, or NULL before population succeeded
    pub fn descriptor_ptr(&self) -> *const WirePluginDescriptor {
        self.populated
            .get()
            .map_or(ptr::null(), |p| &*p.descriptor as *const WirePluginDescriptor)
    }

    /// Number of instances with buffers held by this adapter
    pub fn live_instances(&self) -> usize {
        self.instances.lock().len()
    }

    fn populate(self: &Arc<Self>) -> Option<&Populated> {
        if let Some(populated) = self.populated.get() {
            return Some(populated);
        }

        let _guard = self.populate_lock.lock();
        if let Some(populated) = self.populated.get() {
            return Some(populated);
        }

        let Some(plugin) = (self.factory)(METADATA_SAMPLE_RATE) else {
            error!("plugin factory failed while building descriptor");
            return None;
        };

        if plugin.abi_version() != ABI_VERSION {
            error!(
                plugin = %plugin.identifier(),
                plugin_abi = plugin.abi_version(),
                expected = ABI_VERSION,
                "plugin was built for a different ABI version; not exporting it"
            );
            return None;
        }

        let populated = self.populated.get_or_init(|| Populated::build(plugin.as_ref()));
        AdapterRegistry::global().register_descriptor(&*populated.descriptor, self.clone());
        debug!(plugin = %plugin.identifier(), "plugin descriptor populated");
        Some(populated)
    }

    fn instantiate(self: &Arc<Self>, registry: &AdapterRegistry, input_sample_rate: f32) -> PluginHandle {
        let Some(plugin) = (self.factory)(input_sample_rate) else {
            warn!(input_sample_rate, "plugin factory refused to create an instance");
            return ptr::null_mut();
        };

        let handle = registry.register_instance(InstanceEntry {
            adapter: self.clone(),
            plugin: Arc::new(Mutex::new(plugin)),
        });
        self.instances.lock().insert(handle.addr(), InstanceState::default());
        debug!(handle = ?handle, "plugin instance created");
        handle
    }

    fn release_instance(&self, handle: PluginHandle) {
        self.instances.lock().remove(&handle.addr());
    }

    fn parameter_id(&self, index: c_int) -> Option<&str> {
        let index = usize::try_from(index).ok()?;
        self.populated.get()?.parameters.get(index).map(String::as_str)
    }

    fn programs(&self) -> &[String] {
        self.populated.get().map(|p| p.programs.as_slice()).unwrap_or(&[])
    }

    /// Forget cached output descriptors after a change that may alter them
    fn mark_outputs_changed(&self, handle: PluginHandle) {
        if let Some(state) = self.instances.lock().get_mut(&handle.addr()) {
            state.outputs = None;
        }
    }

    fn set_geometry(&self, handle: PluginHandle, geometry: Option<Geometry>) {
        if let Some(state) = self.instances.lock().get_mut(&handle.addr()) {
            state.geometry = geometry;
            state.outputs = None;
        }
    }

    fn geometry(&self, handle: PluginHandle) -> Option<Geometry> {
        self.instances.lock().get(&handle.addr()).and_then(|s| s.geometry)
    }

    /// Run `f` over the instance's output descriptors, querying the plugin
    /// only when the cache is empty. The plugin is never locked while the
    /// adapter state is.
    fn with_outputs<R>(
        &self,
        handle: PluginHandle,
        plugin: &Mutex<Box<dyn Plugin>>,
        f: impl FnOnce(&[OutputDescriptor]) -> R,
    ) -> R {
        {
            let instances = self.instances.lock();
            if let Some(outputs) = instances.get(&handle.addr()).and_then(|s| s.outputs.as_ref()) {
                return f(outputs);
            }
        }

        let fresh = plugin.lock().output_descriptors();
        let result = f(&fresh);
        if let Some(state) = self.instances.lock().get_mut(&handle.addr()) {
            state.outputs = Some(fresh);
        }
        result
    }

    fn convert(&self, handle: PluginHandle, features: &FeatureSet, output_count: usize) -> *const WireFeatureSet {
        match self.instances.lock().get_mut(&handle.addr()) {
            Some(state) => state.buffers.convert(features, output_count),
            None => ptr::null(),
        }
    }
}

impl Populated {
    fn build(plugin: &dyn Plugin) -> Self {
        let mut arena = DescriptorArena::new();
        let parameter_descs = plugin.parameter_descriptors();
        let programs = plugin.programs();

        let descriptor = Box::new(WirePluginDescriptor {
            abi_version: ABI_VERSION,
            identifier: arena.string(&plugin.identifier()),
            name: arena.string(&plugin.name()),
            description: arena.string(&plugin.description()),
            maker: arena.string(&plugin.maker()),
            plugin_version: plugin.plugin_version(),
            copyright: arena.string(&plugin.copyright()),
            parameter_count: parameter_descs.len() as c_uint,
            parameters: arena.parameter_table(&parameter_descs),
            program_count: programs.len() as c_uint,
            programs: if programs.is_empty() {
                ptr::null()
            } else {
                arena.string_table(&programs)
            },
            input_domain: match plugin.input_domain() {
                InputDomain::TimeDomain => INPUT_DOMAIN_TIME,
                InputDomain::FrequencyDomain => INPUT_DOMAIN_FREQUENCY,
            },
            instantiate: Some(instantiate),
            cleanup: Some(cleanup),
            initialise: Some(initialise),
            reset: Some(reset),
            get_parameter: Some(get_parameter),
            set_parameter: Some(set_parameter),
            get_current_program: Some(get_current_program),
            select_program: Some(select_program),
            get_preferred_step_size: Some(get_preferred_step_size),
            get_preferred_block_size: Some(get_preferred_block_size),
            get_min_channel_count: Some(get_min_channel_count),
            get_max_channel_count: Some(get_max_channel_count),
            get_output_count: Some(get_output_count),
            get_output_descriptor: Some(get_output_descriptor),
            release_output_descriptor: Some(release_output_descriptor),
            process: Some(process),
            get_remaining_features: Some(get_remaining_features),
            release_feature_set: Some(release_feature_set),
        });

        Self {
            descriptor,
            _arena: arena,
            parameters: parameter_descs.into_iter().map(|p| p.identifier).collect(),
            programs,
        }
    }
}

/// Owner of the descriptor for one exported plugin type
pub struct PluginAdapter {
    core: Arc<AdapterCore>,
}

impl PluginAdapter {
    pub fn new<P, F>(factory: F) -> Self
    where
        P: Plugin + 'static,
        F: Fn(f32) -> Option<P> + Send + Sync + 'static,
    {
        Self::from_factory(Box::new(move |rate| {
            factory(rate).map(|p| Box::new(p) as Box<dyn Plugin>)
        }))
    }

    pub fn from_factory(factory: PluginFactory) -> Self {
        Self {
            core: Arc::new(AdapterCore {
                factory,
                populated: OnceLock::new(),
                populate_lock: Mutex::new(()),
                instances: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn core(&self) -> &Arc<AdapterCore> {
        &self.core
    }

    /// The wire descriptor, building and registering it on first use.
    ///
    /// `None` when the plugin cannot be constructed or reports an ABI
    /// version other than [`ABI_VERSION`].
    pub fn descriptor(&self) -> Option<&WirePluginDescriptor> {
        self.core.populate().map(|p| &*p.descriptor)
    }

    pub fn descriptor_ptr(&self) -> *const WirePluginDescriptor {
        self.descriptor()
            .map_or(ptr::null(), |d| d as *const WirePluginDescriptor)
    }

    pub fn is_registered(&self) -> bool {
        AdapterRegistry::global().is_adapter_registered(&self.core)
    }
}

impl Drop for PluginAdapter {
    fn drop(&mut self) {
        let descriptor = self.core.descriptor_ptr();
        if !descriptor.is_null() {
            AdapterRegistry::global().unregister_descriptor(descriptor);
        }
    }
}

/// Run `body`, converting a panic into `fallback`
pub(crate) fn guarded<T>(operation: &'static str, fallback: T, body: impl FnOnce() -> T) -> T {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => value,
        Err(_) => {
            error!(operation, "plugin panicked; the panic was contained at the C boundary");
            fallback
        }
    }
}

fn lookup(handle: PluginHandle, operation: &'static str) -> Option<InstanceEntry> {
    let entry = AdapterRegistry::global().instance(handle);
    if entry.is_none() {
        warn!(operation, handle = ?handle, "operation on unknown plugin handle");
    }
    entry
}

unsafe extern "C" fn instantiate(descriptor: *const WirePluginDescriptor, input_sample_rate: f32) -> PluginHandle {
    guarded("instantiate", ptr::null_mut(), || {
        let registry = AdapterRegistry::global();
        let Some(adapter) = registry.adapter_for_descriptor(descriptor) else {
            warn!(descriptor = ?descriptor, "instantiate called with an unregistered descriptor");
            return ptr::null_mut();
        };
        adapter.instantiate(registry, input_sample_rate)
    })
}

unsafe extern "C" fn cleanup(handle: PluginHandle) {
    guarded("cleanup", (), || match AdapterRegistry::global().unregister_instance(handle) {
        Some(entry) => {
            entry.adapter.release_instance(handle);
            debug!(handle = ?handle, "plugin instance destroyed");
        }
        None => warn!(handle = ?handle, "cleanup of unknown or already released plugin handle"),
    })
}

unsafe extern "C" fn initialise(handle: PluginHandle, channels: c_uint, step_size: c_uint, block_size: c_uint) -> c_int {
    guarded("initialise", 0, || {
        let Some(entry) = lookup(handle, "initialise") else {
            return 0;
        };
        let (ok, domain) = {
            let mut plugin = entry.plugin.lock();
            let ok = plugin.initialise(channels as usize, step_size as usize, block_size as usize);
            (ok, plugin.input_domain())
        };

        let frames = match domain {
            InputDomain::TimeDomain => block_size as usize,
            InputDomain::FrequencyDomain => block_size as usize + 2,
        };
        let geometry = ok.then_some(Geometry {
            channels: channels as usize,
            frames,
        });
        entry.adapter.set_geometry(handle, geometry);
        ok as c_int
    })
}

unsafe extern "C" fn reset(handle: PluginHandle) {
    guarded("reset", (), || {
        if let Some(entry) = lookup(handle, "reset") {
            entry.plugin.lock().reset();
        }
    })
}

unsafe extern "C" fn get_parameter(handle: PluginHandle, index: c_int) -> f32 {
    guarded("get_parameter", 0.0, || {
        let Some(entry) = lookup(handle, "get_parameter") else {
            return 0.0;
        };
        match entry.adapter.parameter_id(index) {
            Some(id) => entry.plugin.lock().parameter(id),
            None => 0.0,
        }
    })
}

unsafe extern "C" fn set_parameter(handle: PluginHandle, index: c_int, value: f32) {
    guarded("set_parameter", (), || {
        let Some(entry) = lookup(handle, "set_parameter") else {
            return;
        };
        if let Some(id) = entry.adapter.parameter_id(index) {
            entry.plugin.lock().set_parameter(id, value);
            entry.adapter.mark_outputs_changed(handle);
        }
    })
}

unsafe extern "C" fn get_current_program(handle: PluginHandle) -> c_uint {
    guarded("get_current_program", 0, || {
        let Some(entry) = lookup(handle, "get_current_program") else {
            return 0;
        };
        let current = entry.plugin.lock().current_program();
        entry
            .adapter
            .programs()
            .iter()
            .position(|p| *p == current)
            .unwrap_or(0) as c_uint
    })
}

unsafe extern "C" fn select_program(handle: PluginHandle, index: c_uint) {
    guarded("select_program", (), || {
        let Some(entry) = lookup(handle, "select_program") else {
            return;
        };
        if let Some(name) = entry.adapter.programs().get(index as usize) {
            entry.plugin.lock().select_program(name);
            entry.adapter.mark_outputs_changed(handle);
        }
    })
}

fn count_query(handle: PluginHandle, operation: &'static str, query: impl FnOnce(&dyn Plugin) -> usize) -> c_uint {
    guarded(operation, 0, || match lookup(handle, operation) {
        Some(entry) => query(&**entry.plugin.lock()) as c_uint,
        None => 0,
    })
}

unsafe extern "C" fn get_preferred_step_size(handle: PluginHandle) -> c_uint {
    count_query(handle, "get_preferred_step_size", |p| p.preferred_step_size())
}

unsafe extern "C" fn get_preferred_block_size(handle: PluginHandle) -> c_uint {
    count_query(handle, "get_preferred_block_size", |p| p.preferred_block_size())
}

unsafe extern "C" fn get_min_channel_count(handle: PluginHandle) -> c_uint {
    count_query(handle, "get_min_channel_count", |p| p.min_channel_count())
}

unsafe extern "C" fn get_max_channel_count(handle: PluginHandle) -> c_uint {
    count_query(handle, "get_max_channel_count", |p| p.max_channel_count())
}

unsafe extern "C" fn get_output_count(handle: PluginHandle) -> c_uint {
    guarded("get_output_count", 0, || match lookup(handle, "get_output_count") {
        Some(entry) => entry
            .adapter
            .with_outputs(handle, &entry.plugin, |outputs| outputs.len() as c_uint),
        None => 0,
    })
}

unsafe extern "C" fn get_output_descriptor(handle: PluginHandle, index: c_uint) -> *mut WireOutputDescriptor {
    guarded("get_output_descriptor", ptr::null_mut(), || {
        let Some(entry) = lookup(handle, "get_output_descriptor") else {
            return ptr::null_mut();
        };
        entry.adapter.with_outputs(handle, &entry.plugin, |outputs| {
            outputs
                .get(index as usize)
                .map_or(ptr::null_mut(), ownership::alloc_output_descriptor)
        })
    })
}

unsafe extern "C" fn release_output_descriptor(descriptor: *mut WireOutputDescriptor) {
    guarded("release_output_descriptor", (), || unsafe {
        ownership::release_output_descriptor(descriptor)
    })
}

unsafe extern "C" fn process(
    handle: PluginHandle,
    input_buffers: *const *const f32,
    sec: c_int,
    nsec: c_int,
) -> *const WireFeatureSet {
    guarded("process", ptr::null(), || {
        let Some(entry) = lookup(handle, "process") else {
            return ptr::null();
        };
        let Some(geometry) = entry.adapter.geometry(handle) else {
            warn!(handle = ?handle, "process called before a successful initialise");
            return ptr::null();
        };
        if input_buffers.is_null() {
            warn!(handle = ?handle, "process called without input buffers");
            return ptr::null();
        }

        let mut channels: Vec<&[f32]> = Vec::with_capacity(geometry.channels);
        for c in 0..geometry.channels {
            let channel = unsafe { *input_buffers.add(c) };
            if channel.is_null() {
                warn!(handle = ?handle, channel = c, "process called with a NULL channel buffer");
                return ptr::null();
            }
            channels.push(unsafe { std::slice::from_raw_parts(channel, geometry.frames) });
        }

        let output_count = entry
            .adapter
            .with_outputs(handle, &entry.plugin, |outputs| outputs.len());
        let features = entry.plugin.lock().process(&channels, RealTime::new(sec, nsec));
        entry.adapter.convert(handle, &features, output_count)
    })
}

unsafe extern "C" fn get_remaining_features(handle: PluginHandle) -> *const WireFeatureSet {
    guarded("get_remaining_features", ptr::null(), || {
        let Some(entry) = lookup(handle, "get_remaining_features") else {
            return ptr::null();
        };
        let output_count = entry
            .adapter
            .with_outputs(handle, &entry.plugin, |outputs| outputs.len());
        let features = entry.plugin.lock().remaining_features();
        entry.adapter.convert(handle, &features, output_count)
    })
}

unsafe extern "C" fn release_feature_set(features: *const WireFeatureSet) {
    // storage belongs to the instance and is reused by its next call
    trace!(features = ?features, "feature set released");
}
