//! Time-domain input for frequency-domain plugins
//!
//! Each host block is Hann-windowed, rotated by half a block so the window
//! centre sits at index 0, and transformed. The plugin receives `N + 2`
//! interleaved floats per channel: real and imaginary parts of bins
//! `0..=N/2`. Timestamps handed to the plugin are shifted forward by half a
//! block, and [`Plugin::timestamp_adjustment`] reports that shift.

use super::fft::{fft_in_place, hann_window};
use crate::error::{LoadError, LoadResult};
use error_stack::Report;
use sonara_kernel::{FeatureSet, InputDomain, OutputDescriptor, Plugin, RealTime};
use tracing::{error, warn};

/// Block size used when the plugin states no preference
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

pub struct InputDomainAdapter {
    inner: Box<dyn Plugin>,
    block_size: usize,
    window: Vec<f64>,
    re: Vec<f64>,
    im: Vec<f64>,
    spectra: Vec<Vec<f32>>,
}

impl InputDomainAdapter {
    pub fn new(inner: Box<dyn Plugin>) -> Self {
        Self {
            inner,
            block_size: 0,
            window: Vec::new(),
            re: Vec::new(),
            im: Vec::new(),
            spectra: Vec::new(),
        }
    }

    /// Initialise the inner plugin, rounding `block_size` up to a power of
    /// two when needed.
    pub fn try_initialise(&mut self, channels: usize, step_size: usize, block_size: usize) -> LoadResult<()> {
        let rounded = block_size.max(2).next_power_of_two();
        if rounded != block_size {
            warn!(
                requested = block_size,
                rounded, "block size is not a power of two; rounding up for the frequency-domain plugin"
            );
        }

        if !self.inner.initialise(channels, step_size, rounded) {
            let err = LoadError::DomainAdaptationInfeasible { block_size };
            return Err(if rounded != block_size {
                Report::new(err).attach(format!("plugin rejected rounded block size {rounded}"))
            } else {
                Report::new(err)
            });
        }

        self.block_size = rounded;
        self.window = hann_window(rounded);
        self.re = vec![0.0; rounded];
        self.im = vec![0.0; rounded];
        self.spectra = vec![vec![0.0; rounded + 2]; channels];
        Ok(())
    }

    fn latency(&self) -> RealTime {
        RealTime::frame_to_real_time((self.block_size / 2) as i64, self.inner.input_sample_rate())
    }

    fn transform(&mut self, channel: usize, input: &[f32]) {
        let n = self.block_size;
        let half = n / 2;

        // window, then swap halves so the window centre lands on index 0
        for i in 0..n {
            let sample = input.get(i).copied().unwrap_or(0.0) as f64;
            self.re[(i + half) % n] = sample * self.window[i];
        }
        self.im.fill(0.0);

        fft_in_place(&mut self.re, &mut self.im);

        let out = &mut self.spectra[channel];
        for bin in 0..=half {
            out[bin * 2] = self.re[bin] as f32;
            out[bin * 2 + 1] = self.im[bin] as f32;
        }
    }
}

impl Plugin for InputDomainAdapter {
    forward_plugin_metadata!(inner);

    fn input_domain(&self) -> InputDomain {
        InputDomain::TimeDomain
    }

    fn preferred_block_size(&self) -> usize {
        match self.inner.preferred_block_size() {
            0 => DEFAULT_BLOCK_SIZE,
            n => n.next_power_of_two(),
        }
    }

    fn preferred_step_size(&self) -> usize {
        match self.inner.preferred_step_size() {
            0 => self.preferred_block_size() / 2,
            n => n,
        }
    }

    fn min_channel_count(&self) -> usize {
        self.inner.min_channel_count()
    }

    fn max_channel_count(&self) -> usize {
        self.inner.max_channel_count()
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        self.inner.output_descriptors()
    }

    fn initialise(&mut self, channels: usize, step_size: usize, block_size: usize) -> bool {
        match self.try_initialise(channels, step_size, block_size) {
            Ok(()) => true,
            Err(report) => {
                error!(error = ?report, "frequency-domain adaptation failed");
                false
            }
        }
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn process(&mut self, input: &[&[f32]], timestamp: RealTime) -> FeatureSet {
        if self.block_size == 0 {
            warn!("process called before a successful initialise");
            return FeatureSet::new();
        }

        let channels = input.len().min(self.spectra.len());
        for (c, channel) in input.iter().take(channels).enumerate() {
            self.transform(c, channel);
        }

        let shifted = timestamp + self.latency();
        let spectra: Vec<&[f32]> = self.spectra[..channels].iter().map(Vec::as_slice).collect();
        self.inner.process(&spectra, shifted)
    }

    fn remaining_features(&mut self) -> FeatureSet {
        self.inner.remaining_features()
    }

    fn timestamp_adjustment(&self) -> Option<RealTime> {
        let own = self.latency();
        Some(match self.inner.timestamp_adjustment() {
            Some(inner) => own + inner,
            None => own,
        })
    }
}
