//! Fixture plugins
//!
//! Small analysis plugins with predictable output, exported through the
//! same entry-point machinery a real plugin library uses.

use sonara_kernel::{
    ABI_VERSION, Feature, FeatureSet, InputDomain, OutputDescriptor, ParameterDescriptor, Plugin, RealTime,
    SampleType,
};
use tracing::debug;

/// Reports the strongest spectral bin of each block and its frequency
pub struct SineTracker {
    rate: f32,
    block_size: usize,
}

impl SineTracker {
    pub fn new(rate: f32) -> Self {
        Self { rate, block_size: 0 }
    }
}

impl Plugin for SineTracker {
    fn identifier(&self) -> String {
        "sine-tracker".into()
    }

    fn name(&self) -> String {
        "Sine Tracker".into()
    }

    fn description(&self) -> String {
        "Frequency of the strongest spectral peak".into()
    }

    fn maker(&self) -> String {
        "Sonara Fixtures".into()
    }

    fn plugin_version(&self) -> i32 {
        2
    }

    fn input_sample_rate(&self) -> f32 {
        self.rate
    }

    fn input_domain(&self) -> InputDomain {
        InputDomain::FrequencyDomain
    }

    fn preferred_block_size(&self) -> usize {
        1024
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![
            OutputDescriptor::new("peak-bin", "Peak Bin").with_quantize_step(1.0),
            OutputDescriptor::new("frequency", "Frequency")
                .with_unit("Hz")
                .with_extents(0.0, self.rate / 2.0),
        ]
    }

    fn initialise(&mut self, channels: usize, _step_size: usize, block_size: usize) -> bool {
        if channels != 1 || !block_size.is_power_of_two() {
            return false;
        }
        self.block_size = block_size;
        true
    }

    fn reset(&mut self) {}

    fn process(&mut self, input: &[&[f32]], _timestamp: RealTime) -> FeatureSet {
        let spectrum = input[0];
        let peak = (0..spectrum.len() / 2)
            .map(|bin| {
                let (re, im) = (spectrum[bin * 2], spectrum[bin * 2 + 1]);
                (bin, re * re + im * im)
            })
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best })
            .0;
        let frequency = peak as f32 * self.rate / self.block_size.max(1) as f32;

        FeatureSet::from([
            (0, vec![Feature::new(vec![peak as f32])]),
            (1, vec![Feature::new(vec![frequency])]),
        ])
    }

    fn remaining_features(&mut self) -> FeatureSet {
        FeatureSet::new()
    }
}

/// Emits its `value` parameter once per block
pub struct Constant {
    rate: f32,
    value: f32,
}

impl Constant {
    pub fn new(rate: f32) -> Self {
        Self { rate, value: 1.0 }
    }
}

impl Plugin for Constant {
    fn identifier(&self) -> String {
        "constant".into()
    }

    fn name(&self) -> String {
        "Constant".into()
    }

    fn input_sample_rate(&self) -> f32 {
        self.rate
    }

    fn preferred_block_size(&self) -> usize {
        512
    }

    fn parameter_descriptors(&self) -> Vec<ParameterDescriptor> {
        vec![ParameterDescriptor::new("value", "Value", -10.0, 10.0, 1.0)]
    }

    fn parameter(&self, identifier: &str) -> f32 {
        match identifier {
            "value" => self.value,
            _ => 0.0,
        }
    }

    fn set_parameter(&mut self, identifier: &str, value: f32) {
        if identifier == "value" {
            self.value = value.clamp(-10.0, 10.0);
        }
    }

    fn programs(&self) -> Vec<String> {
        vec!["one".into(), "minus-one".into()]
    }

    fn current_program(&self) -> String {
        if self.value < 0.0 { "minus-one" } else { "one" }.into()
    }

    fn select_program(&mut self, name: &str) {
        match name {
            "one" => self.value = 1.0,
            "minus-one" => self.value = -1.0,
            _ => {}
        }
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![OutputDescriptor::new("value", "Value")]
    }

    fn initialise(&mut self, _channels: usize, _step_size: usize, _block_size: usize) -> bool {
        true
    }

    fn reset(&mut self) {}

    fn process(&mut self, _input: &[&[f32]], _timestamp: RealTime) -> FeatureSet {
        FeatureSet::from([(0, vec![Feature::new(vec![self.value])])])
    }

    fn remaining_features(&mut self) -> FeatureSet {
        FeatureSet::new()
    }
}

/// Declares four outputs but only ever reports on the first and the last
pub struct SparseOutputs {
    rate: f32,
    blocks: usize,
}

impl SparseOutputs {
    pub fn new(rate: f32) -> Self {
        Self { rate, blocks: 0 }
    }

    /// The features `process` reports for a block
    pub fn expected(block: &[f32], timestamp: RealTime, index: usize) -> FeatureSet {
        let mean = block.iter().sum::<f32>() / block.len().max(1) as f32;
        FeatureSet::from([
            (0, vec![Feature::new(vec![mean, block.len() as f32]).with_label("block mean")]),
            (
                3,
                vec![
                    Feature::new(vec![index as f32, -0.5, 1e-3, 42.0])
                        .with_timestamp(timestamp)
                        .with_duration(RealTime::from_millis(10))
                        .with_label("onset"),
                ],
            ),
        ])
    }
}

impl Plugin for SparseOutputs {
    fn identifier(&self) -> String {
        "sparse".into()
    }

    fn name(&self) -> String {
        "Sparse Outputs".into()
    }

    fn input_sample_rate(&self) -> f32 {
        self.rate
    }

    fn max_channel_count(&self) -> usize {
        2
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![
            OutputDescriptor::new("mean", "Mean").with_bin_count(Some(2)).with_bin_names(&["mean", "frames"]),
            OutputDescriptor::new("unused-1", "Unused"),
            OutputDescriptor::new("unused-2", "Unused"),
            OutputDescriptor::new("onsets", "Onsets")
                .with_bin_count(None)
                .with_sample_type(SampleType::VariableSampleRate, 0.0)
                .with_duration(true),
        ]
    }

    fn initialise(&mut self, _channels: usize, _step_size: usize, _block_size: usize) -> bool {
        self.blocks = 0;
        true
    }

    fn reset(&mut self) {
        self.blocks = 0;
    }

    fn process(&mut self, input: &[&[f32]], timestamp: RealTime) -> FeatureSet {
        let features = Self::expected(input[0], timestamp, self.blocks);
        self.blocks += 1;
        features
    }

    fn remaining_features(&mut self) -> FeatureSet {
        FeatureSet::from([(1, Vec::new())])
    }
}

/// Reports `before` once at the start and `after` once at `switch_block`
pub struct Switch {
    rate: f32,
    switch_block: usize,
    blocks: usize,
}

impl Switch {
    pub const BEFORE: f32 = 0.0;
    pub const AFTER: f32 = 100.0;

    pub fn new(rate: f32) -> Self {
        Self {
            rate,
            switch_block: 99,
            blocks: 0,
        }
    }
}

impl Plugin for Switch {
    fn identifier(&self) -> String {
        "switch".into()
    }

    fn name(&self) -> String {
        "Switch".into()
    }

    fn input_sample_rate(&self) -> f32 {
        self.rate
    }

    fn parameter_descriptors(&self) -> Vec<ParameterDescriptor> {
        vec![ParameterDescriptor::new("switch-block", "Switch Block", 1.0, 10000.0, 99.0).with_quantize_step(1.0)]
    }

    fn parameter(&self, identifier: &str) -> f32 {
        match identifier {
            "switch-block" => self.switch_block as f32,
            _ => 0.0,
        }
    }

    fn set_parameter(&mut self, identifier: &str, value: f32) {
        if identifier == "switch-block" {
            self.switch_block = value.max(1.0) as usize;
        }
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![OutputDescriptor::new("state", "State").with_sample_type(SampleType::VariableSampleRate, 0.0)]
    }

    fn initialise(&mut self, _channels: usize, _step_size: usize, _block_size: usize) -> bool {
        self.blocks = 0;
        true
    }

    fn reset(&mut self) {
        self.blocks = 0;
    }

    fn process(&mut self, _input: &[&[f32]], timestamp: RealTime) -> FeatureSet {
        let value = match self.blocks {
            0 => Some(Self::BEFORE),
            n if n == self.switch_block => Some(Self::AFTER),
            _ => None,
        };
        self.blocks += 1;

        value
            .map(|v| FeatureSet::from([(0, vec![Feature::new(vec![v]).with_timestamp(timestamp)])]))
            .unwrap_or_default()
    }

    fn remaining_features(&mut self) -> FeatureSet {
        FeatureSet::new()
    }
}

/// Built against a newer contract than this one
pub struct FutureVersion {
    rate: f32,
}

impl FutureVersion {
    pub fn new(rate: f32) -> Self {
        Self { rate }
    }
}

impl Plugin for FutureVersion {
    fn abi_version(&self) -> u32 {
        ABI_VERSION + 1
    }

    fn identifier(&self) -> String {
        "future".into()
    }

    fn name(&self) -> String {
        "Future Version".into()
    }

    fn input_sample_rate(&self) -> f32 {
        self.rate
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        Vec::new()
    }

    fn initialise(&mut self, _channels: usize, _step_size: usize, _block_size: usize) -> bool {
        true
    }

    fn reset(&mut self) {}

    fn process(&mut self, _input: &[&[f32]], _timestamp: RealTime) -> FeatureSet {
        FeatureSet::new()
    }

    fn remaining_features(&mut self) -> FeatureSet {
        FeatureSet::new()
    }
}

/// Cannot be constructed for sample rates above [`Picky::MAX_RATE`]
pub struct Picky {
    rate: f32,
}

impl Picky {
    pub const MAX_RATE: f32 = 96000.0;

    pub fn create(rate: f32) -> Option<Self> {
        if rate > 0.0 && rate <= Self::MAX_RATE {
            Some(Self { rate })
        } else {
            debug!(rate, "refusing sample rate");
            None
        }
    }
}

impl Plugin for Picky {
    fn identifier(&self) -> String {
        "picky".into()
    }

    fn name(&self) -> String {
        "Picky".into()
    }

    fn input_sample_rate(&self) -> f32 {
        self.rate
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![OutputDescriptor::new("nothing", "Nothing")]
    }

    fn initialise(&mut self, _channels: usize, _step_size: usize, _block_size: usize) -> bool {
        true
    }

    fn reset(&mut self) {}

    fn process(&mut self, _input: &[&[f32]], _timestamp: RealTime) -> FeatureSet {
        FeatureSet::new()
    }

    fn remaining_features(&mut self) -> FeatureSet {
        FeatureSet::new()
    }
}
