//! Down-mixes host channels for mono plugins

use crate::error::{LoadError, LoadResult};
use error_stack::Report;
use sonara_kernel::{FeatureSet, InputDomain, OutputDescriptor, Plugin, RealTime};

pub struct ChannelAdapter {
    inner: Box<dyn Plugin>,
    host_channels: usize,
    mix: Vec<f32>,
}

impl ChannelAdapter {
    /// Wrap `inner` so it can be driven with `host_channels` channels.
    ///
    /// Only down-mixing to one channel is possible: the plugin must accept
    /// a single channel and the host must offer more than it accepts.
    pub fn new(inner: Box<dyn Plugin>, host_channels: usize) -> LoadResult<Self> {
        let (min, max) = (inner.min_channel_count(), inner.max_channel_count());
        if min != 1 || host_channels <= max {
            return Err(Report::new(LoadError::ChannelCountUnsupported {
                channels: host_channels,
                min,
                max,
            })
            .attach(format!("plugin {}", inner.identifier())));
        }
        Ok(Self {
            inner,
            host_channels,
            mix: Vec::new(),
        })
    }

    pub fn host_channels(&self) -> usize {
        self.host_channels
    }
}

impl Plugin for ChannelAdapter {
    forward_plugin_metadata!(inner);

    fn input_domain(&self) -> InputDomain {
        self.inner.input_domain()
    }

    fn preferred_step_size(&self) -> usize {
        self.inner.preferred_step_size()
    }

    fn preferred_block_size(&self) -> usize {
        self.inner.preferred_block_size()
    }

    fn min_channel_count(&self) -> usize {
        self.host_channels
    }

    fn max_channel_count(&self) -> usize {
        self.host_channels
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        self.inner.output_descriptors()
    }

    fn initialise(&mut self, channels: usize, step_size: usize, block_size: usize) -> bool {
        if channels != self.host_channels {
            return false;
        }
        self.mix = vec![0.0; block_size];
        self.inner.initialise(1, step_size, block_size)
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn process(&mut self, input: &[&[f32]], timestamp: RealTime) -> FeatureSet {
        let frames = input.iter().map(|c| c.len()).min().unwrap_or(0);
        self.mix.resize(frames, 0.0);

        let scale = 1.0 / input.len().max(1) as f32;
        for (i, out) in self.mix.iter_mut().enumerate() {
            *out = input.iter().map(|c| c[i]).sum::<f32>() * scale;
        }

        let mono: [&[f32]; 1] = [&self.mix];
        self.inner.process(&mono, timestamp)
    }

    fn remaining_features(&mut self) -> FeatureSet {
        self.inner.remaining_features()
    }

    fn timestamp_adjustment(&self) -> Option<RealTime> {
        self.inner.timestamp_adjustment()
    }
}
