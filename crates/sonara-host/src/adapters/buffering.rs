//! Lets a host feed blocks of any size to a plugin with its own preferred
//! step and block size
//!
//! The host initialises with `step == block` of whatever size suits it.
//! Input is queued per channel and the inner plugin sees whole blocks of
//! its own size, advancing by its own step, with timestamps derived from
//! the number of frames consumed. End of input is flushed as zero-padded
//! blocks from [`Plugin::remaining_features`].

use sonara_kernel::{FeatureSet, InputDomain, OutputDescriptor, Plugin, RealTime, SampleType};
use tracing::{debug, warn};

/// Sizes used when the plugin states no preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDefaults {
    pub block_size: usize,
    /// Zero means "same as block" in the time domain, half a block in the
    /// frequency domain
    pub step_size: usize,
}

impl Default for BufferDefaults {
    fn default() -> Self {
        Self {
            block_size: 1024,
            step_size: 0,
        }
    }
}

pub struct BufferingAdapter {
    inner: Box<dyn Plugin>,
    plugin_block: usize,
    plugin_step: usize,
    host_block: usize,
    queues: Vec<Vec<f32>>,
    // frame offset of the next inner block from the first host timestamp
    next_frame: i64,
    origin: Option<RealTime>,
    per_step_outputs: Vec<usize>,
}

impl BufferingAdapter {
    pub fn new(inner: Box<dyn Plugin>, defaults: BufferDefaults) -> Self {
        let plugin_block = match inner.preferred_block_size() {
            0 => defaults.block_size.max(1),
            n => n,
        };
        let plugin_step = match (inner.preferred_step_size(), defaults.step_size) {
            (0, 0) => match inner.input_domain() {
                InputDomain::TimeDomain => plugin_block,
                InputDomain::FrequencyDomain => (plugin_block / 2).max(1),
            },
            (0, step) => step,
            (n, _) => n,
        };

        Self {
            inner,
            plugin_block,
            plugin_step,
            host_block: 0,
            queues: Vec::new(),
            next_frame: 0,
            origin: None,
            per_step_outputs: Vec::new(),
        }
    }

    pub fn plugin_block_size(&self) -> usize {
        self.plugin_block
    }

    pub fn plugin_step_size(&self) -> usize {
        self.plugin_step
    }

    fn rate(&self) -> f32 {
        self.inner.input_sample_rate()
    }

    fn block_time(&self) -> RealTime {
        self.origin.unwrap_or(RealTime::ZERO) + RealTime::frame_to_real_time(self.next_frame, self.rate())
    }

    fn queued(&self) -> usize {
        self.queues.iter().map(Vec::len).min().unwrap_or(0)
    }

    /// Give per-step outputs explicit timestamps and merge into `into`
    fn merge(&self, into: &mut FeatureSet, features: FeatureSet, timestamp: RealTime) {
        for (output, mut list) in features {
            if self.per_step_outputs.contains(&output) {
                for feature in &mut list {
                    feature.timestamp.get_or_insert(timestamp);
                }
            }
            into.entry(output).or_default().extend(list);
        }
    }

    fn process_queued_block(&mut self, into: &mut FeatureSet) {
        let timestamp = self.block_time();
        let block = self.plugin_block;
        let features = {
            let channels: Vec<&[f32]> = self.queues.iter().map(|q| &q[..block]).collect();
            self.inner.process(&channels, timestamp)
        };
        self.merge(into, features, timestamp);

        let step = self.plugin_step.min(self.queued());
        for queue in &mut self.queues {
            queue.drain(..step);
        }
        self.next_frame += self.plugin_step as i64;
    }
}

impl Plugin for BufferingAdapter {
    forward_plugin_metadata!(inner);

    fn input_domain(&self) -> InputDomain {
        self.inner.input_domain()
    }

    fn preferred_block_size(&self) -> usize {
        self.plugin_block
    }

    fn preferred_step_size(&self) -> usize {
        self.plugin_block
    }

    fn min_channel_count(&self) -> usize {
        self.inner.min_channel_count()
    }

    fn max_channel_count(&self) -> usize {
        self.inner.max_channel_count()
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        let step_rate = self.rate() / self.plugin_step as f32;
        self.inner
            .output_descriptors()
            .into_iter()
            .map(|desc| match desc.sample_type {
                SampleType::OneSamplePerStep => desc.with_sample_type(SampleType::FixedSampleRate, step_rate),
                _ => desc,
            })
            .collect()
    }

    fn initialise(&mut self, channels: usize, step_size: usize, block_size: usize) -> bool {
        if step_size != block_size {
            warn!(
                step_size,
                block_size, "buffering adapter needs the host step size to equal its block size"
            );
            return false;
        }

        if !self.inner.initialise(channels, self.plugin_step, self.plugin_block) {
            return false;
        }

        debug!(
            host_block = block_size,
            plugin_block = self.plugin_block,
            plugin_step = self.plugin_step,
            "buffering adapter initialised"
        );
        self.host_block = block_size;
        self.queues = vec![Vec::with_capacity(self.plugin_block + block_size); channels];
        self.next_frame = 0;
        self.origin = None;
        self.per_step_outputs = self
            .inner
            .output_descriptors()
            .iter()
            .enumerate()
            .filter(|(_, d)| d.sample_type == SampleType::OneSamplePerStep)
            .map(|(i, _)| i)
            .collect();
        true
    }

    fn reset(&mut self) {
        self.inner.reset();
        for queue in &mut self.queues {
            queue.clear();
        }
        self.next_frame = 0;
        self.origin = None;
    }

    fn process(&mut self, input: &[&[f32]], timestamp: RealTime) -> FeatureSet {
        if input.len() < self.queues.len() {
            warn!(
                expected = self.queues.len(),
                received = input.len(),
                "buffering adapter received fewer channels than it was initialised with"
            );
            return FeatureSet::new();
        }
        self.origin.get_or_insert(timestamp);

        // queues stay the same length, so a short channel trims the whole block
        let frames = input
            .iter()
            .take(self.queues.len())
            .map(|channel| channel.len())
            .fold(self.host_block, usize::min);
        for (queue, channel) in self.queues.iter_mut().zip(input) {
            queue.extend_from_slice(&channel[..frames]);
        }

        let mut features = FeatureSet::new();
        while self.queued() >= self.plugin_block {
            self.process_queued_block(&mut features);
        }
        features
    }

    fn remaining_features(&mut self) -> FeatureSet {
        let mut features = FeatureSet::new();

        // every queued frame is covered by at least one padded block
        let mut unconsumed = self.queued();
        while unconsumed > 0 {
            let block = self.plugin_block;
            for queue in &mut self.queues {
                if queue.len() < block {
                    queue.resize(block, 0.0);
                }
            }
            self.process_queued_block(&mut features);
            unconsumed = unconsumed.saturating_sub(self.plugin_step);
        }

        let timestamp = self.block_time();
        let rest = self.inner.remaining_features();
        self.merge(&mut features, rest, timestamp);
        features
    }

    fn timestamp_adjustment(&self) -> Option<RealTime> {
        self.inner.timestamp_adjustment()
    }
}
