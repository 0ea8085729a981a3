//! Native analysis plugin contract
//!
//! Every analysis module, and every wrapper a host stacks around one,
//! implements [`Plugin`]. The plugin side of a dynamic-library boundary
//! drives a real implementation through this trait; the host side presents
//! a loaded library as an implementation of the same trait, so host code
//! never sees the wire records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

mod real_time;
pub use real_time::RealTime;

/// ABI revision of the wire contract this crate was compiled against.
///
/// A plugin built against a different revision is refused when its
/// descriptor is populated.
pub const ABI_VERSION: u32 = 2;

/// Whether a plugin wants raw samples or a short-time spectrum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InputDomain {
    #[default]
    TimeDomain,
    FrequencyDomain,
}

/// A user-adjustable control exposed by a plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// Machine-readable identifier, `[a-zA-Z0-9_-]` only
    pub identifier: String,
    pub name: String,
    pub description: String,
    pub unit: String,
    pub min_value: f32,
    pub max_value: f32,
    /// The plugin must start out with this value
    pub default_value: f32,
    /// Step between permitted values, if the parameter is quantized
    pub quantize_step: Option<f32>,
    /// Names for each quantized step from `min_value` to `max_value`
    pub value_names: Vec<String>,
}

impl ParameterDescriptor {
    pub fn new(identifier: &str, name: &str, min_value: f32, max_value: f32, default_value: f32) -> Self {
        Self {
            identifier: identifier.to_string(),
            name: name.to_string(),
            description: String::new(),
            unit: String::new(),
            min_value,
            max_value,
            default_value,
            quantize_step: None,
            value_names: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self
    }

    pub fn with_quantize_step(mut self, step: f32) -> Self {
        self.quantize_step = Some(step);
        self
    }

    pub fn with_value_names(mut self, names: &[&str]) -> Self {
        self.value_names = names.iter().map(|n| n.to_string()).collect();
        self
    }
}

/// Placement of an output's results on the timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SampleType {
    /// One result per process call, stamped with the block time
    #[default]
    OneSamplePerStep,
    /// Results at a fixed rate given by `OutputDescriptor::sample_rate`
    FixedSampleRate,
    /// Irregularly timed results carrying their own timestamps
    VariableSampleRate,
}

/// Known minimum and maximum of an output's values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueExtents {
    pub min: f32,
    pub max: f32,
}

/// Shape and timing of one output stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    pub identifier: String,
    pub name: String,
    pub description: String,
    pub unit: String,
    /// Fixed number of values per feature; `None` when it varies per call
    pub bin_count: Option<usize>,
    /// Optional per-bin names, only meaningful with a fixed bin count
    pub bin_names: Vec<String>,
    pub extents: Option<ValueExtents>,
    pub quantize_step: Option<f32>,
    pub sample_type: SampleType,
    /// Result rate for fixed-rate outputs, time resolution for variable ones
    pub sample_rate: f32,
    /// Whether features on this output carry a duration
    pub has_duration: bool,
}

impl OutputDescriptor {
    pub fn new(identifier: &str, name: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            name: name.to_string(),
            description: String::new(),
            unit: String::new(),
            bin_count: Some(1),
            bin_names: Vec::new(),
            extents: None,
            quantize_step: None,
            sample_type: SampleType::OneSamplePerStep,
            sample_rate: 0.0,
            has_duration: false,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self
    }

    pub fn with_bin_count(mut self, bin_count: Option<usize>) -> Self {
        self.bin_count = bin_count;
        self
    }

    pub fn with_bin_names(mut self, names: &[&str]) -> Self {
        self.bin_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_extents(mut self, min: f32, max: f32) -> Self {
        self.extents = Some(ValueExtents { min, max });
        self
    }

    pub fn with_quantize_step(mut self, step: f32) -> Self {
        self.quantize_step = Some(step);
        self
    }

    pub fn with_sample_type(mut self, sample_type: SampleType, sample_rate: f32) -> Self {
        self.sample_type = sample_type;
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_duration(mut self, has_duration: bool) -> Self {
        self.has_duration = has_duration;
        self
    }
}

/// One analysis result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Explicit time; required on variable-rate outputs
    pub timestamp: Option<RealTime>,
    pub duration: Option<RealTime>,
    /// One value per bin. The length may differ between calls.
    pub values: Vec<f32>,
    /// Empty means "no label"
    pub label: String,
}

impl Feature {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    pub fn with_timestamp(mut self, timestamp: RealTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_duration(mut self, duration: RealTime) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }
}

/// Results for one output from one call
pub type FeatureList = Vec<Feature>;

/// Results from one call, keyed by output index. Indices are dense in
/// principle but outputs with nothing to report may be absent.
pub type FeatureSet = BTreeMap<usize, FeatureList>;

/// The native analysis contract.
///
/// Methods with defaults describe a plugin with no parameters, no programs,
/// no block-size preference and exactly one input channel.
pub trait Plugin: Send {
    /// Wire ABI revision this plugin was built for
    fn abi_version(&self) -> u32 {
        ABI_VERSION
    }

    fn identifier(&self) -> String;

    fn name(&self) -> String;

    fn description(&self) -> String {
        String::new()
    }

    fn maker(&self) -> String {
        String::new()
    }

    fn copyright(&self) -> String {
        String::new()
    }

    fn plugin_version(&self) -> i32 {
        1
    }

    fn input_sample_rate(&self) -> f32;

    fn parameter_descriptors(&self) -> Vec<ParameterDescriptor> {
        Vec::new()
    }

    /// Value of the parameter with this identifier, or 0 when unknown
    fn parameter(&self, _identifier: &str) -> f32 {
        0.0
    }

    fn set_parameter(&mut self, _identifier: &str, _value: f32) {}

    fn programs(&self) -> Vec<String> {
        Vec::new()
    }

    fn current_program(&self) -> String {
        String::new()
    }

    /// Select a named program; unknown names are ignored
    fn select_program(&mut self, _name: &str) {}

    fn input_domain(&self) -> InputDomain {
        InputDomain::TimeDomain
    }

    /// Preferred step in frames; 0 means no preference
    fn preferred_step_size(&self) -> usize {
        0
    }

    /// Preferred block in frames; 0 means no preference
    fn preferred_block_size(&self) -> usize {
        0
    }

    fn min_channel_count(&self) -> usize {
        1
    }

    fn max_channel_count(&self) -> usize {
        1
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor>;

    /// Prepare for processing. Returns false if the combination of channel
    /// count, step and block size is unacceptable.
    fn initialise(&mut self, channels: usize, step_size: usize, block_size: usize) -> bool;

    fn reset(&mut self);

    /// Analyse one block. `input` holds one slice per channel: `block_size`
    /// samples in the time domain, or `block_size + 2` interleaved re/im
    /// values (bins `0..=block_size/2`) in the frequency domain.
    fn process(&mut self, input: &[&[f32]], timestamp: RealTime) -> FeatureSet;

    /// Results that can only be produced at end of stream
    fn remaining_features(&mut self) -> FeatureSet;

    /// Offset a host adapter chain applied to the timestamps it passes to
    /// the plugin. `None` unless a domain-transform adapter is present.
    fn timestamp_adjustment(&self) -> Option<RealTime> {
        None
    }
}
