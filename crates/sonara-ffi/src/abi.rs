//! Wire records exchanged across the dynamic-library boundary
//!
//! Everything here is `#[repr(C)]` and built only from primitives, C
//! strings, arrays and `extern "C"` function pointers, so a plugin and a
//! host built by different compilers (or in different languages) agree on
//! the layout. Enumerations travel as plain `u32` constants: reading an
//! out-of-range discriminant into a Rust enum would be undefined behaviour.
//!
//! Ownership: whichever side allocates a string or array is the side that
//! frees it. Hosts hand output descriptors back through
//! [`WirePluginDescriptor::release_output_descriptor`] and feature sets back
//! through [`WirePluginDescriptor::release_feature_set`]; they never free
//! them directly.

use std::ffi::{c_char, c_int, c_uint, c_void};

/// Symbol every plugin library exports, resolving to [`GetDescriptorFn`]
pub const ENTRY_POINT_SYMBOL: &[u8] = b"sonara_get_plugin_descriptor\0";

/// `fn(index) -> descriptor`; callers probe increasing indices until NULL
pub type GetDescriptorFn = unsafe extern "C" fn(index: c_uint) -> *const WirePluginDescriptor;

/// Opaque token for one live plugin instance. NULL means "no instance".
pub type PluginHandle = *mut c_void;

pub const INPUT_DOMAIN_TIME: c_uint = 0;
pub const INPUT_DOMAIN_FREQUENCY: c_uint = 1;

pub const SAMPLE_TYPE_ONE_PER_STEP: c_uint = 0;
pub const SAMPLE_TYPE_FIXED_RATE: c_uint = 1;
pub const SAMPLE_TYPE_VARIABLE_RATE: c_uint = 2;

#[repr(C)]
#[derive(Debug)]
pub struct WireParameterDescriptor {
    pub identifier: *const c_char,
    pub name: *const c_char,
    pub description: *const c_char,
    pub unit: *const c_char,
    pub min_value: f32,
    pub max_value: f32,
    pub default_value: f32,
    pub is_quantized: c_int,
    pub quantize_step: f32,
    /// NULL-terminated, or NULL when there are no value names
    pub value_names: *const *const c_char,
}

#[repr(C)]
#[derive(Debug)]
pub struct WireOutputDescriptor {
    pub identifier: *const c_char,
    pub name: *const c_char,
    pub description: *const c_char,
    pub unit: *const c_char,
    pub has_fixed_bin_count: c_int,
    pub bin_count: c_uint,
    /// `bin_count` entries (each possibly NULL), or NULL
    pub bin_names: *const *const c_char,
    pub has_known_extents: c_int,
    pub min_value: f32,
    pub max_value: f32,
    pub is_quantized: c_int,
    pub quantize_step: f32,
    pub sample_type: c_uint,
    pub sample_rate: f32,
    pub has_duration: c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct WireFeature {
    pub has_timestamp: c_int,
    pub sec: c_int,
    pub nsec: c_int,
    pub has_duration: c_int,
    pub duration_sec: c_int,
    pub duration_nsec: c_int,
    pub value_count: c_uint,
    pub values: *const f32,
    /// NULL when the feature has no label
    pub label: *const c_char,
}

impl Default for WireFeature {
    fn default() -> Self {
        Self {
            has_timestamp: 0,
            sec: 0,
            nsec: 0,
            has_duration: 0,
            duration_sec: 0,
            duration_nsec: 0,
            value_count: 0,
            values: std::ptr::null(),
            label: std::ptr::null(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct WireFeatureList {
    pub feature_count: c_uint,
    pub features: *const WireFeature,
}

impl Default for WireFeatureList {
    fn default() -> Self {
        Self {
            feature_count: 0,
            features: std::ptr::null(),
        }
    }
}

/// Result of one process or get-remaining-features call: `output_count`
/// lists, dense from output 0.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct WireFeatureSet {
    pub output_count: c_uint,
    pub lists: *const WireFeatureList,
}

impl Default for WireFeatureSet {
    fn default() -> Self {
        Self {
            output_count: 0,
            lists: std::ptr::null(),
        }
    }
}

pub type InstantiateFn =
    unsafe extern "C" fn(descriptor: *const WirePluginDescriptor, input_sample_rate: f32) -> PluginHandle;
pub type CleanupFn = unsafe extern "C" fn(handle: PluginHandle);
pub type InitialiseFn = unsafe extern "C" fn(
    handle: PluginHandle,
    channels: c_uint,
    step_size: c_uint,
    block_size: c_uint,
) -> c_int;
pub type ResetFn = unsafe extern "C" fn(handle: PluginHandle);
pub type GetParameterFn = unsafe extern "C" fn(handle: PluginHandle, index: c_int) -> f32;
pub type SetParameterFn = unsafe extern "C" fn(handle: PluginHandle, index: c_int, value: f32);
pub type GetCurrentProgramFn = unsafe extern "C" fn(handle: PluginHandle) -> c_uint;
pub type SelectProgramFn = unsafe extern "C" fn(handle: PluginHandle, index: c_uint);
pub type GetCountFn = unsafe extern "C" fn(handle: PluginHandle) -> c_uint;
pub type GetOutputDescriptorFn =
    unsafe extern "C" fn(handle: PluginHandle, index: c_uint) -> *mut WireOutputDescriptor;
pub type ReleaseOutputDescriptorFn = unsafe extern "C" fn(descriptor: *mut WireOutputDescriptor);
pub type ProcessFn = unsafe extern "C" fn(
    handle: PluginHandle,
    input_buffers: *const *const f32,
    sec: c_int,
    nsec: c_int,
) -> *const WireFeatureSet;
pub type GetRemainingFeaturesFn = unsafe extern "C" fn(handle: PluginHandle) -> *const WireFeatureSet;
pub type ReleaseFeatureSetFn = unsafe extern "C" fn(features: *const WireFeatureSet);

/// Static metadata and operation table for one plugin type.
///
/// Function pointers are `Option` so that a host can detect a NULL entry in
/// a descriptor built by foreign code; see [`WirePluginDescriptor::operations`].
#[repr(C)]
#[derive(Debug)]
pub struct WirePluginDescriptor {
    pub abi_version: c_uint,
    pub identifier: *const c_char,
    pub name: *const c_char,
    pub description: *const c_char,
    pub maker: *const c_char,
    pub plugin_version: c_int,
    pub copyright: *const c_char,
    pub parameter_count: c_uint,
    pub parameters: *const *const WireParameterDescriptor,
    pub program_count: c_uint,
    pub programs: *const *const c_char,
    pub input_domain: c_uint,

    pub instantiate: Option<InstantiateFn>,
    pub cleanup: Option<CleanupFn>,
    pub initialise: Option<InitialiseFn>,
    pub reset: Option<ResetFn>,
    pub get_parameter: Option<GetParameterFn>,
    pub set_parameter: Option<SetParameterFn>,
    pub get_current_program: Option<GetCurrentProgramFn>,
    pub select_program: Option<SelectProgramFn>,
    pub get_preferred_step_size: Option<GetCountFn>,
    pub get_preferred_block_size: Option<GetCountFn>,
    pub get_min_channel_count: Option<GetCountFn>,
    pub get_max_channel_count: Option<GetCountFn>,
    pub get_output_count: Option<GetCountFn>,
    pub get_output_descriptor: Option<GetOutputDescriptorFn>,
    pub release_output_descriptor: Option<ReleaseOutputDescriptorFn>,
    pub process: Option<ProcessFn>,
    pub get_remaining_features: Option<GetRemainingFeaturesFn>,
    pub release_feature_set: Option<ReleaseFeatureSetFn>,
}

// A descriptor is immutable once populated and its pointers refer to
// storage owned for at least as long as the descriptor itself.
unsafe impl Send for WirePluginDescriptor {}
unsafe impl Sync for WirePluginDescriptor {}

/// The complete operation table of a validated descriptor
#[derive(Debug, Clone, Copy)]
pub struct Operations {
    pub instantiate: InstantiateFn,
    pub cleanup: CleanupFn,
    pub initialise: InitialiseFn,
    pub reset: ResetFn,
    pub get_parameter: GetParameterFn,
    pub set_parameter: SetParameterFn,
    pub get_current_program: GetCurrentProgramFn,
    pub select_program: SelectProgramFn,
    pub get_preferred_step_size: GetCountFn,
    pub get_preferred_block_size: GetCountFn,
    pub get_min_channel_count: GetCountFn,
    pub get_max_channel_count: GetCountFn,
    pub get_output_count: GetCountFn,
    pub get_output_descriptor: GetOutputDescriptorFn,
    pub release_output_descriptor: ReleaseOutputDescriptorFn,
    pub process: ProcessFn,
    pub get_remaining_features: GetRemainingFeaturesFn,
    pub release_feature_set: ReleaseFeatureSetFn,
}

impl WirePluginDescriptor {
    /// The operation table, or `None` if any entry is NULL
    pub fn operations(&self) -> Option<Operations> {
        Some(Operations {
            instantiate: self.instantiate?,
            cleanup: self.cleanup?,
            initialise: self.initialise?,
            reset: self.reset?,
            get_parameter: self.get_parameter?,
            set_parameter: self.set_parameter?,
            get_current_program: self.get_current_program?,
            select_program: self.select_program?,
            get_preferred_step_size: self.get_preferred_step_size?,
            get_preferred_block_size: self.get_preferred_block_size?,
            get_min_channel_count: self.get_min_channel_count?,
            get_max_channel_count: self.get_max_channel_count?,
            get_output_count: self.get_output_count?,
            get_output_descriptor: self.get_output_descriptor?,
            release_output_descriptor: self.release_output_descriptor?,
            process: self.process?,
            get_remaining_features: self.get_remaining_features?,
            release_feature_set: self.release_feature_set?,
        })
    }
}
