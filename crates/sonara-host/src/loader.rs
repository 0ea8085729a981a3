//! Plugin discovery and loading
//!
//! A [`PluginLoader`] collects wire descriptors from plugin libraries,
//! either opened from disk with `libloading` or registered in-process as a
//! bare entry point, and addresses them by [`PluginKey`]. Loading a plugin
//! instantiates it through its descriptor and wraps it in the capability
//! adapters the request allows.

use crate::adapters::{AdapterFlags, BufferDefaults, HostCapabilities, build_chain};
use crate::config::HostConfig;
use crate::error::{LoadError, LoadResult};
use crate::host_adapter::{PluginHostAdapter, string_from_wire};
use crate::key::{PluginKey, library_basename};
use crate::static_data::{PluginConfiguration, PluginStaticData};
use error_stack::{Report, ResultExt};
use libloading::{Library, Symbol};
use parking_lot::RwLock;
use sonara_ffi::abi::{ENTRY_POINT_SYMBOL, GetDescriptorFn, WirePluginDescriptor};
use sonara_kernel::{ABI_VERSION, InputDomain, Plugin};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sample rate used when instantiating a plugin only to read its metadata
pub const METADATA_SAMPLE_RATE: f32 = 48000.0;

/// Descriptor pointer owned by a library that outlives every use of it
#[derive(Debug, Clone, Copy)]
struct DescriptorPtr(*const WirePluginDescriptor);

// Descriptors are immutable after export and live as long as their library.
unsafe impl Send for DescriptorPtr {}
unsafe impl Sync for DescriptorPtr {}

struct PluginEntry {
    descriptor: DescriptorPtr,
    library: Option<Arc<Library>>,
}

/// What to load and how to adapt it
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub plugin_key: PluginKey,
    pub input_sample_rate: f32,
    /// `None` uses the loader's configured flags
    pub adapter_flags: Option<AdapterFlags>,
    /// Channels the host will supply
    pub channels: usize,
    /// Domain of the samples the host will supply
    pub host_domain: InputDomain,
}

impl LoadRequest {
    pub fn new(plugin_key: PluginKey, input_sample_rate: f32) -> Self {
        Self {
            plugin_key,
            input_sample_rate,
            adapter_flags: None,
            channels: 1,
            host_domain: InputDomain::TimeDomain,
        }
    }

    pub fn with_adapter_flags(mut self, flags: AdapterFlags) -> Self {
        self.adapter_flags = Some(flags);
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_host_domain(mut self, domain: InputDomain) -> Self {
        self.host_domain = domain;
        self
    }
}

pub struct LoadResponse {
    /// The plugin, wrapped in whatever adapters were needed
    pub plugin: Box<dyn Plugin>,
    pub static_data: PluginStaticData,
    /// Current parameter values with the sizes the host should initialise with
    pub default_configuration: PluginConfiguration,
    pub warnings: Vec<String>,
}

pub struct PluginLoader {
    plugins: RwLock<BTreeMap<PluginKey, PluginEntry>>,
    libraries: RwLock<HashMap<PathBuf, Arc<Library>>>,
    buffer_defaults: BufferDefaults,
    default_flags: AdapterFlags,
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginLoader {
    pub fn new() -> Self {
        Self {
            plugins: RwLock::new(BTreeMap::new()),
            libraries: RwLock::new(HashMap::new()),
            buffer_defaults: BufferDefaults::default(),
            default_flags: AdapterFlags::NONE,
        }
    }

    /// A loader using the configured buffer sizes, with the configured
    /// adapter flags applied to requests that set none
    pub fn with_config(config: &HostConfig) -> Self {
        Self {
            buffer_defaults: config.buffer_defaults(),
            default_flags: config.adapter_flags,
            ..Self::new()
        }
    }

    /// Flags applied when a request leaves them unset
    pub fn default_adapter_flags(&self) -> AdapterFlags {
        self.default_flags
    }

    /// Open a plugin library and register every valid descriptor it exports.
    ///
    /// Loading the same path twice reuses the open library.
    ///
    /// # Safety
    ///
    /// Opening a library runs its initialisers, and its entry point must
    /// return descriptors laid out as [`WirePluginDescriptor`].
    pub unsafe fn load_library(&self, path: impl AsRef<Path>) -> LoadResult<Vec<PluginKey>> {
        let path = path.as_ref().to_path_buf();

        let existing = self.libraries.read().get(&path).cloned();
        let library = match existing {
            Some(library) => library,
            None => {
                info!(path = %path.display(), "loading plugin library");
                let library = unsafe { Library::new(&path) }
                    .map_err(|e| Report::new(LoadError::LibraryLoad(e.to_string())))
                    .attach(format!("path {}", path.display()))?;
                let library = Arc::new(library);
                self.libraries.write().insert(path.clone(), library.clone());
                library
            }
        };

        let entry: GetDescriptorFn = {
            let symbol: Symbol<'_, GetDescriptorFn> = unsafe { library.get(ENTRY_POINT_SYMBOL) }
                .map_err(|e| Report::new(LoadError::SymbolNotFound(e.to_string())))
                .attach(format!("path {}", path.display()))?;
            *symbol
        };

        let keys = unsafe { self.register_descriptors(&library_basename(&path), entry, Some(library)) };
        info!(path = %path.display(), plugins = keys.len(), "plugin library loaded");
        Ok(keys)
    }

    /// Register the plugins behind an in-process entry point under the
    /// library name `library`.
    ///
    /// # Safety
    ///
    /// `entry` must return NULL or descriptors that stay valid for the life
    /// of the process.
    pub unsafe fn register_entry_point(&self, library: &str, entry: GetDescriptorFn) -> Vec<PluginKey> {
        unsafe { self.register_descriptors(&library.to_lowercase(), entry, None) }
    }

    unsafe fn register_descriptors(
        &self,
        library_name: &str,
        entry: GetDescriptorFn,
        library: Option<Arc<Library>>,
    ) -> Vec<PluginKey> {
        let mut keys = Vec::new();
        let mut index = 0;
        loop {
            let descriptor = unsafe { entry(index) };
            if descriptor.is_null() {
                break;
            }
            index += 1;

            let desc = unsafe { &*descriptor };
            let identifier = unsafe { string_from_wire(desc.identifier) };
            if desc.abi_version != ABI_VERSION {
                warn!(
                    library = library_name,
                    plugin = %identifier,
                    expected = ABI_VERSION,
                    found = desc.abi_version,
                    "skipping plugin with mismatched ABI version"
                );
                continue;
            }
            if desc.operations().is_none() {
                warn!(library = library_name, plugin = %identifier, "skipping plugin with incomplete descriptor");
                continue;
            }

            let key = PluginKey::new(library_name, &identifier);
            let previous = self.plugins.write().insert(
                key.clone(),
                PluginEntry {
                    descriptor: DescriptorPtr(descriptor),
                    library: library.clone(),
                },
            );
            if previous.is_some() {
                warn!(key = %key, "plugin key registered twice; keeping the later descriptor");
            }
            debug!(key = %key, "registered plugin");
            keys.push(key);
        }
        keys
    }

    /// Keys of every registered plugin, in key order
    pub fn list_plugins(&self) -> Vec<PluginKey> {
        self.plugins.read().keys().cloned().collect()
    }

    fn instantiate(&self, key: &PluginKey, input_sample_rate: f32) -> LoadResult<PluginHostAdapter> {
        let (descriptor, library) = {
            let plugins = self.plugins.read();
            let entry = plugins
                .get(key)
                .ok_or_else(|| Report::new(LoadError::UnknownPlugin(key.to_string())))?;
            (entry.descriptor, entry.library.clone())
        };

        unsafe { PluginHostAdapter::new(descriptor.0, input_sample_rate, library) }
            .attach(format!("plugin {key}"))
    }

    /// Metadata of a registered plugin, read from a throwaway instance
    pub fn static_data(&self, key: &PluginKey) -> LoadResult<PluginStaticData> {
        let plugin = self.instantiate(key, METADATA_SAMPLE_RATE)?;
        Ok(PluginStaticData::from_plugin(key.clone(), &plugin))
    }

    /// Instantiate a plugin and wrap it for the host described by `request`
    pub fn load_plugin(&self, request: LoadRequest) -> LoadResult<LoadResponse> {
        let plugin = self.instantiate(&request.plugin_key, request.input_sample_rate)?;
        let static_data = PluginStaticData::from_plugin(request.plugin_key.clone(), &plugin);

        let host = HostCapabilities {
            channels: request.channels,
            domain: request.host_domain,
        };
        let flags = request.adapter_flags.unwrap_or(self.default_flags);
        let chain = build_chain(Box::new(plugin), flags, host, self.buffer_defaults)
            .attach(format!("plugin {}", request.plugin_key))?;

        let (step, block) = self.default_sizes(chain.plugin.as_ref());
        let default_configuration = PluginConfiguration::from_plugin(chain.plugin.as_ref(), request.channels, step, block);

        for warning in &chain.warnings {
            debug!(key = %request.plugin_key, warning = %warning, "plugin adapted");
        }
        info!(
            key = %request.plugin_key,
            rate = request.input_sample_rate,
            flags = %flags,
            "plugin loaded"
        );

        Ok(LoadResponse {
            plugin: chain.plugin,
            static_data,
            default_configuration,
            warnings: chain.warnings,
        })
    }

    /// Step and block size a host should use when the plugin has no
    /// preference
    fn default_sizes(&self, plugin: &dyn Plugin) -> (usize, usize) {
        let block = match plugin.preferred_block_size() {
            0 => self.buffer_defaults.block_size,
            n => n,
        };
        let step = match (plugin.preferred_step_size(), self.buffer_defaults.step_size) {
            (0, 0) if plugin.input_domain() == InputDomain::FrequencyDomain => block / 2,
            (0, 0) => block,
            (0, step) => step,
            (n, _) => n,
        };
        (step, block)
    }
}
