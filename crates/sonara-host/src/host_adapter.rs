//! Presents a plugin reached through the C ABI as a native [`Plugin`]
//!
//! Every trait method becomes one call through the descriptor's operation
//! table. Wire results are copied into native values and handed back to
//! the plugin for release before the method returns, so no wire pointer
//! outlives the call that produced it.

use crate::error::{LoadError, LoadResult};
use error_stack::Report;
use libloading::Library;
use sonara_ffi::abi::{
    INPUT_DOMAIN_FREQUENCY, Operations, PluginHandle, SAMPLE_TYPE_FIXED_RATE, SAMPLE_TYPE_VARIABLE_RATE,
    WireFeature, WireFeatureSet, WireOutputDescriptor, WireParameterDescriptor, WirePluginDescriptor,
};
use sonara_kernel::{
    ABI_VERSION, Feature, FeatureSet, InputDomain, OutputDescriptor, ParameterDescriptor, Plugin, RealTime,
    SampleType, ValueExtents,
};
use std::ffi::{CStr, c_char, c_int, c_uint};
use std::ptr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Copy a C string, treating NULL as empty
///
/// # Safety
///
/// `ptr` must be NULL or point to a NUL-terminated string.
pub unsafe fn string_from_wire(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// # Safety
///
/// `table` must be NULL or hold at least `len` valid entries.
unsafe fn strings_from_table(table: *const *const c_char, len: usize) -> Vec<String> {
    if table.is_null() {
        return Vec::new();
    }
    (0..len)
        .map(|i| unsafe { string_from_wire(*table.add(i)) })
        .collect()
}

/// # Safety
///
/// `table` must be NULL or a NULL-terminated array of C strings.
unsafe fn strings_until_null(table: *const *const c_char) -> Vec<String> {
    let mut names = Vec::new();
    if table.is_null() {
        return names;
    }
    let mut i = 0;
    loop {
        let entry = unsafe { *table.add(i) };
        if entry.is_null() {
            break;
        }
        names.push(unsafe { string_from_wire(entry) });
        i += 1;
    }
    names
}

fn quantize(is_quantized: c_int, step: f32) -> Option<f32> {
    (is_quantized != 0).then_some(step)
}

/// # Safety
///
/// `wire` must come from a plugin descriptor's parameter table.
pub unsafe fn parameter_from_wire(wire: &WireParameterDescriptor) -> ParameterDescriptor {
    unsafe {
        ParameterDescriptor {
            identifier: string_from_wire(wire.identifier),
            name: string_from_wire(wire.name),
            description: string_from_wire(wire.description),
            unit: string_from_wire(wire.unit),
            min_value: wire.min_value,
            max_value: wire.max_value,
            default_value: wire.default_value,
            quantize_step: quantize(wire.is_quantized, wire.quantize_step),
            value_names: strings_until_null(wire.value_names),
        }
    }
}

/// # Safety
///
/// `wire` must be a live output descriptor returned by a plugin.
pub unsafe fn output_from_wire(wire: &WireOutputDescriptor) -> OutputDescriptor {
    let fixed = wire.has_fixed_bin_count != 0;
    let mut bin_names = if fixed {
        unsafe { strings_from_table(wire.bin_names, wire.bin_count as usize) }
    } else {
        Vec::new()
    };
    // unnamed bins travel as NULL padding up to bin_count
    while bin_names.last().is_some_and(String::is_empty) {
        bin_names.pop();
    }

    unsafe {
        OutputDescriptor {
            identifier: string_from_wire(wire.identifier),
            name: string_from_wire(wire.name),
            description: string_from_wire(wire.description),
            unit: string_from_wire(wire.unit),
            bin_count: fixed.then_some(wire.bin_count as usize),
            bin_names,
            extents: (wire.has_known_extents != 0).then_some(ValueExtents {
                min: wire.min_value,
                max: wire.max_value,
            }),
            quantize_step: quantize(wire.is_quantized, wire.quantize_step),
            sample_type: match wire.sample_type {
                SAMPLE_TYPE_FIXED_RATE => SampleType::FixedSampleRate,
                SAMPLE_TYPE_VARIABLE_RATE => SampleType::VariableSampleRate,
                _ => SampleType::OneSamplePerStep,
            },
            sample_rate: wire.sample_rate,
            has_duration: wire.has_duration != 0,
        }
    }
}

/// # Safety
///
/// `wire` must be a feature inside a live feature set.
pub unsafe fn feature_from_wire(wire: &WireFeature) -> Feature {
    let values = if wire.values.is_null() || wire.value_count == 0 {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(wire.values, wire.value_count as usize) }.to_vec()
    };

    Feature {
        timestamp: (wire.has_timestamp != 0).then(|| RealTime::new(wire.sec, wire.nsec)),
        duration: (wire.has_duration != 0).then(|| RealTime::new(wire.duration_sec, wire.duration_nsec)),
        values,
        label: unsafe { string_from_wire(wire.label) },
    }
}

/// Copy a wire feature set. Outputs reporting zero features are omitted.
///
/// # Safety
///
/// `set` must be NULL or a live feature set returned by a plugin.
pub unsafe fn feature_set_from_wire(set: *const WireFeatureSet) -> FeatureSet {
    let mut features = FeatureSet::new();
    if set.is_null() {
        return features;
    }

    let set = unsafe { &*set };
    if set.lists.is_null() {
        return features;
    }

    for output in 0..set.output_count as usize {
        let list = unsafe { &*set.lists.add(output) };
        if list.feature_count == 0 || list.features.is_null() {
            continue;
        }
        let wire = unsafe { std::slice::from_raw_parts(list.features, list.feature_count as usize) };
        features.insert(output, wire.iter().map(|f| unsafe { feature_from_wire(f) }).collect());
    }
    features
}

/// A plugin instance created through a wire descriptor
pub struct PluginHostAdapter {
    descriptor: *const WirePluginDescriptor,
    ops: Operations,
    handle: PluginHandle,
    input_sample_rate: f32,
    parameter_ids: Vec<String>,
    programs: Vec<String>,
    // frames per channel the plugin reads, known after initialise
    frames: usize,
    padded: Vec<Vec<f32>>,
    // keeps the code behind `ops` mapped; dropped after cleanup
    _library: Option<Arc<Library>>,
}

// The handle is only driven through `&mut self` or by the single owner.
unsafe impl Send for PluginHostAdapter {}

impl PluginHostAdapter {
    /// Instantiate the plugin behind `descriptor`.
    ///
    /// # Safety
    ///
    /// `descriptor` must be NULL or point to a descriptor that stays valid
    /// while `library` (if any) is loaded.
    pub unsafe fn new(
        descriptor: *const WirePluginDescriptor,
        input_sample_rate: f32,
        library: Option<Arc<Library>>,
    ) -> LoadResult<Self> {
        if descriptor.is_null() {
            return Err(Report::new(LoadError::InstantiationFailure("NULL descriptor".into())));
        }
        let desc = unsafe { &*descriptor };

        if desc.abi_version != ABI_VERSION {
            return Err(Report::new(LoadError::AbiVersionMismatch {
                expected: ABI_VERSION,
                found: desc.abi_version,
            }));
        }

        let ops = desc
            .operations()
            .ok_or_else(|| Report::new(LoadError::IncompleteDescriptor))?;

        let identifier = unsafe { string_from_wire(desc.identifier) };
        let parameter_ids = unsafe { Self::parameter_table(desc) }
            .into_iter()
            .map(|p| p.identifier)
            .collect();
        let programs = unsafe { strings_from_table(desc.programs, desc.program_count as usize) };

        let handle = unsafe { (ops.instantiate)(descriptor, input_sample_rate) };
        if handle.is_null() {
            return Err(Report::new(LoadError::InstantiationFailure(identifier))
                .attach(format!("input sample rate {input_sample_rate}")));
        }
        debug!(plugin = %identifier, input_sample_rate, "instantiated plugin through wire descriptor");

        Ok(Self {
            descriptor,
            ops,
            handle,
            input_sample_rate,
            parameter_ids,
            programs,
            frames: 0,
            padded: Vec::new(),
            _library: library,
        })
    }

    unsafe fn parameter_table(desc: &WirePluginDescriptor) -> Vec<ParameterDescriptor> {
        if desc.parameters.is_null() {
            return Vec::new();
        }
        (0..desc.parameter_count as usize)
            .filter_map(|i| {
                let wire = unsafe { *desc.parameters.add(i) };
                (!wire.is_null()).then(|| unsafe { parameter_from_wire(&*wire) })
            })
            .collect()
    }

    fn desc(&self) -> &WirePluginDescriptor {
        unsafe { &*self.descriptor }
    }

    fn text(&self, field: fn(&WirePluginDescriptor) -> *const c_char) -> String {
        unsafe { string_from_wire(field(self.desc())) }
    }

    fn take_features(&mut self, set: *const WireFeatureSet) -> FeatureSet {
        let features = unsafe { feature_set_from_wire(set) };
        if !set.is_null() {
            unsafe { (self.ops.release_feature_set)(set) };
        }
        features
    }
}

impl Drop for PluginHostAdapter {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe { (self.ops.cleanup)(self.handle) };
            self.handle = ptr::null_mut();
        }
    }
}

impl Plugin for PluginHostAdapter {
    fn abi_version(&self) -> u32 {
        self.desc().abi_version
    }

    fn identifier(&self) -> String {
        self.text(|d| d.identifier)
    }

    fn name(&self) -> String {
        self.text(|d| d.name)
    }

    fn description(&self) -> String {
        self.text(|d| d.description)
    }

    fn maker(&self) -> String {
        self.text(|d| d.maker)
    }

    fn copyright(&self) -> String {
        self.text(|d| d.copyright)
    }

    fn plugin_version(&self) -> i32 {
        self.desc().plugin_version
    }

    fn input_sample_rate(&self) -> f32 {
        self.input_sample_rate
    }

    fn parameter_descriptors(&self) -> Vec<ParameterDescriptor> {
        unsafe { Self::parameter_table(self.desc()) }
    }

    fn parameter(&self, identifier: &str) -> f32 {
        match self.parameter_ids.iter().position(|p| p == identifier) {
            Some(index) => unsafe { (self.ops.get_parameter)(self.handle, index as c_int) },
            None => 0.0,
        }
    }

    fn set_parameter(&mut self, identifier: &str, value: f32) {
        if let Some(index) = self.parameter_ids.iter().position(|p| p == identifier) {
            unsafe { (self.ops.set_parameter)(self.handle, index as c_int, value) };
        }
    }

    fn programs(&self) -> Vec<String> {
        self.programs.clone()
    }

    fn current_program(&self) -> String {
        if self.programs.is_empty() {
            return String::new();
        }
        let index = unsafe { (self.ops.get_current_program)(self.handle) } as usize;
        self.programs.get(index).cloned().unwrap_or_default()
    }

    fn select_program(&mut self, name: &str) {
        if let Some(index) = self.programs.iter().position(|p| p == name) {
            unsafe { (self.ops.select_program)(self.handle, index as c_uint) };
        }
    }

    fn input_domain(&self) -> InputDomain {
        match self.desc().input_domain {
            INPUT_DOMAIN_FREQUENCY => InputDomain::FrequencyDomain,
            _ => InputDomain::TimeDomain,
        }
    }

    fn preferred_step_size(&self) -> usize {
        unsafe { (self.ops.get_preferred_step_size)(self.handle) as usize }
    }

    fn preferred_block_size(&self) -> usize {
        unsafe { (self.ops.get_preferred_block_size)(self.handle) as usize }
    }

    fn min_channel_count(&self) -> usize {
        unsafe { (self.ops.get_min_channel_count)(self.handle) as usize }
    }

    fn max_channel_count(&self) -> usize {
        unsafe { (self.ops.get_max_channel_count)(self.handle) as usize }
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        let count = unsafe { (self.ops.get_output_count)(self.handle) };
        (0..count)
            .filter_map(|i| unsafe {
                let wire = (self.ops.get_output_descriptor)(self.handle, i);
                if wire.is_null() {
                    return None;
                }
                let desc = output_from_wire(&*wire);
                (self.ops.release_output_descriptor)(wire);
                Some(desc)
            })
            .collect()
    }

    fn initialise(&mut self, channels: usize, step_size: usize, block_size: usize) -> bool {
        let ok = unsafe {
            (self.ops.initialise)(
                self.handle,
                channels as c_uint,
                step_size as c_uint,
                block_size as c_uint,
            ) != 0
        };
        self.frames = match (ok, self.input_domain()) {
            (false, _) => 0,
            (true, InputDomain::TimeDomain) => block_size,
            (true, InputDomain::FrequencyDomain) => block_size + 2,
        };
        self.padded = vec![Vec::new(); if ok { channels } else { 0 }];
        ok
    }

    fn reset(&mut self) {
        unsafe { (self.ops.reset)(self.handle) };
    }

    fn process(&mut self, input: &[&[f32]], timestamp: RealTime) -> FeatureSet {
        if self.frames == 0 || input.len() < self.padded.len() {
            warn!(
                channels = input.len(),
                "process called on an uninitialised plugin or with too few channels"
            );
            return FeatureSet::new();
        }

        // the plugin reads exactly `frames` samples per channel
        let frames = self.frames;
        let buffers: Vec<*const f32> = input
            .iter()
            .zip(self.padded.iter_mut())
            .map(|(channel, padded)| {
                if channel.len() >= frames {
                    channel.as_ptr()
                } else {
                    padded.clear();
                    padded.extend_from_slice(channel);
                    padded.resize(frames, 0.0);
                    padded.as_ptr()
                }
            })
            .collect();
        let set = unsafe { (self.ops.process)(self.handle, buffers.as_ptr(), timestamp.sec, timestamp.nsec) };
        self.take_features(set)
    }

    fn remaining_features(&mut self) -> FeatureSet {
        let set = unsafe { (self.ops.get_remaining_features)(self.handle) };
        self.take_features(set)
    }
}
