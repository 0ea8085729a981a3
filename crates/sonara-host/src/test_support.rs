//! Plugins used by the unit tests in this crate

use sonara_kernel::{Feature, FeatureSet, InputDomain, OutputDescriptor, Plugin, RealTime, SampleType};
use std::collections::VecDeque;

/// Frequency-domain plugin reporting `[peak bin, input length]` per block
pub struct SpectrumProbe {
    rate: f32,
    accept_only: Option<usize>,
}

impl SpectrumProbe {
    pub fn new(rate: f32) -> Self {
        Self { rate, accept_only: None }
    }

    /// Refuse every block size except `block_size`
    pub fn accepting_only(mut self, block_size: usize) -> Self {
        self.accept_only = Some(block_size);
        self
    }
}

impl Plugin for SpectrumProbe {
    fn identifier(&self) -> String {
        "spectrum-probe".into()
    }

    fn name(&self) -> String {
        "Spectrum Probe".into()
    }

    fn input_sample_rate(&self) -> f32 {
        self.rate
    }

    fn input_domain(&self) -> InputDomain {
        InputDomain::FrequencyDomain
    }

    fn preferred_block_size(&self) -> usize {
        256
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![OutputDescriptor::new("peak", "Peak Bin").with_bin_count(Some(2))]
    }

    fn initialise(&mut self, _channels: usize, _step_size: usize, block_size: usize) -> bool {
        self.accept_only.is_none_or(|n| n == block_size)
    }

    fn reset(&mut self) {}

    fn process(&mut self, input: &[&[f32]], timestamp: RealTime) -> FeatureSet {
        let spectrum = input[0];
        let bins = spectrum.len() / 2;
        let peak = (0..bins)
            .map(|b| {
                let (re, im) = (spectrum[b * 2], spectrum[b * 2 + 1]);
                (b, re * re + im * im)
            })
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best })
            .0;

        let feature = Feature::new(vec![peak as f32, spectrum.len() as f32]).with_timestamp(timestamp);
        FeatureSet::from([(0, vec![feature])])
    }

    fn remaining_features(&mut self) -> FeatureSet {
        FeatureSet::new()
    }
}

/// Time-domain plugin reporting `[first sample, block sum]` per block
pub struct BlockCounter {
    rate: f32,
    block: usize,
    step: usize,
    channels: (usize, usize),
}

impl BlockCounter {
    pub fn new(rate: f32, preferred_block: usize, preferred_step: usize) -> Self {
        Self {
            rate,
            block: preferred_block,
            step: preferred_step,
            channels: (1, 1),
        }
    }

    pub fn with_channels(mut self, min: usize, max: usize) -> Self {
        self.channels = (min, max);
        self
    }
}

impl Plugin for BlockCounter {
    fn identifier(&self) -> String {
        "block-counter".into()
    }

    fn name(&self) -> String {
        "Block Counter".into()
    }

    fn input_sample_rate(&self) -> f32 {
        self.rate
    }

    fn preferred_block_size(&self) -> usize {
        self.block
    }

    fn preferred_step_size(&self) -> usize {
        self.step
    }

    fn min_channel_count(&self) -> usize {
        self.channels.0
    }

    fn max_channel_count(&self) -> usize {
        self.channels.1
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        vec![
            OutputDescriptor::new("block", "Block")
                .with_bin_count(Some(2))
                .with_sample_type(SampleType::OneSamplePerStep, 0.0),
        ]
    }

    fn initialise(&mut self, _channels: usize, _step_size: usize, _block_size: usize) -> bool {
        true
    }

    fn reset(&mut self) {}

    fn process(&mut self, input: &[&[f32]], _timestamp: RealTime) -> FeatureSet {
        let block = input[0];
        let first = block.first().copied().unwrap_or(0.0);
        FeatureSet::from([(0, vec![Feature::new(vec![first, block.iter().sum()])])])
    }

    fn remaining_features(&mut self) -> FeatureSet {
        FeatureSet::new()
    }
}

/// Replays a fixed sequence of feature sets, one per `process` call
pub struct Scripted {
    rate: f32,
    step: usize,
    outputs: Vec<OutputDescriptor>,
    script: VecDeque<FeatureSet>,
    tail: FeatureSet,
}

impl Scripted {
    pub fn new(rate: f32, step: usize, outputs: Vec<OutputDescriptor>) -> Self {
        Self {
            rate,
            step,
            outputs,
            script: VecDeque::new(),
            tail: FeatureSet::new(),
        }
    }

    pub fn then(mut self, features: FeatureSet) -> Self {
        self.script.push_back(features);
        self
    }

    pub fn finally(mut self, features: FeatureSet) -> Self {
        self.tail = features;
        self
    }
}

impl Plugin for Scripted {
    fn identifier(&self) -> String {
        "scripted".into()
    }

    fn name(&self) -> String {
        "Scripted".into()
    }

    fn input_sample_rate(&self) -> f32 {
        self.rate
    }

    fn preferred_step_size(&self) -> usize {
        self.step
    }

    fn preferred_block_size(&self) -> usize {
        self.step
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        self.outputs.clone()
    }

    fn initialise(&mut self, _channels: usize, _step_size: usize, _block_size: usize) -> bool {
        true
    }

    fn reset(&mut self) {}

    fn process(&mut self, _input: &[&[f32]], _timestamp: RealTime) -> FeatureSet {
        self.script.pop_front().unwrap_or_default()
    }

    fn remaining_features(&mut self) -> FeatureSet {
        std::mem::take(&mut self.tail)
    }
}
