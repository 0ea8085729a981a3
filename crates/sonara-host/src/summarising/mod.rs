//! Segment-level summaries of a plugin's output
//!
//! [`SummarisingAdapter`] passes every feature through unchanged while
//! recording, per output and bin, each value together with how long it was
//! held. A feature's hold time is its own duration when it has one, or the
//! gap until the next feature on the same output; the last feature runs to
//! the end of the input. Values are split across segment boundaries so
//! each segment only sees the part of a hold that falls inside it.
//!
//! Summaries become available once [`Plugin::remaining_features`] has been
//! called.

pub mod stats;

pub use stats::{AveragingMethod, BinSummary, SummaryType, summarise};

use sonara_kernel::{Feature, FeatureList, FeatureSet, InputDomain, OutputDescriptor, Plugin, RealTime, SampleType};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, warn};

/// Segment start times; the run is always split at zero
pub type SegmentBoundaries = BTreeSet<RealTime>;

#[derive(Debug, Default)]
struct BinSeries {
    values: Vec<f32>,
    durations: Vec<f64>,
}

#[derive(Debug)]
struct Held {
    time: RealTime,
    values: Vec<f32>,
}

#[derive(Debug, Default)]
struct OutputRecord {
    // keyed by segment start
    segments: BTreeMap<RealTime, Vec<BinSeries>>,
    awaiting_duration: Option<Held>,
    last_time: Option<RealTime>,
}

pub struct SummarisingAdapter {
    inner: Box<dyn Plugin>,
    boundaries: SegmentBoundaries,
    outputs: Vec<OutputDescriptor>,
    step_size: usize,
    records: BTreeMap<usize, OutputRecord>,
    last_process_time: Option<RealTime>,
    end_of_stream: Option<RealTime>,
    summaries: BTreeMap<usize, BTreeMap<RealTime, Vec<BinSummary>>>,
}

impl SummarisingAdapter {
    pub fn new(inner: Box<dyn Plugin>) -> Self {
        Self {
            inner,
            boundaries: SegmentBoundaries::new(),
            outputs: Vec::new(),
            step_size: 0,
            records: BTreeMap::new(),
            last_process_time: None,
            end_of_stream: None,
            summaries: BTreeMap::new(),
        }
    }

    /// Split the run at these times. Takes effect for features recorded
    /// after the call.
    pub fn set_summary_segment_boundaries(&mut self, boundaries: SegmentBoundaries) {
        if self.last_process_time.is_some() {
            warn!("segment boundaries changed after processing started");
        }
        self.boundaries = boundaries;
    }

    pub fn is_finalised(&self) -> bool {
        self.end_of_stream.is_some()
    }

    /// One feature per segment, ordered by segment start, holding the
    /// requested statistic for each bin of `output`.
    ///
    /// Empty before the run is finalised, and for outputs with no data.
    pub fn summary_for_output(&self, output: usize, summary: SummaryType, averaging: AveragingMethod) -> FeatureList {
        let Some(end) = self.end_of_stream else {
            return FeatureList::new();
        };
        let Some(segments) = self.summaries.get(&output) else {
            return FeatureList::new();
        };

        segments
            .iter()
            .map(|(&start, bins)| {
                let stop = self.segment_end(start).unwrap_or(end).max(start);
                let values = bins.iter().map(|b| b.value(summary, averaging) as f32).collect();
                Feature::new(values)
                    .with_timestamp(start)
                    .with_duration(stop - start)
                    .with_label(&summary_label(summary, averaging))
            })
            .collect()
    }

    /// [`Self::summary_for_output`] for every output that produced data
    pub fn summary_for_all_outputs(&self, summary: SummaryType, averaging: AveragingMethod) -> FeatureSet {
        self.summaries
            .keys()
            .map(|&output| (output, self.summary_for_output(output, summary, averaging)))
            .filter(|(_, list)| !list.is_empty())
            .collect()
    }

    fn segment_start(&self, time: RealTime) -> RealTime {
        self.boundaries
            .range(..=time)
            .next_back()
            .copied()
            .unwrap_or(RealTime::ZERO)
    }

    fn segment_end(&self, start: RealTime) -> Option<RealTime> {
        self.boundaries.iter().find(|&&b| b > start).copied()
    }

    fn feature_time(&self, output: usize, feature: &Feature, process_time: RealTime) -> RealTime {
        if let Some(t) = feature.timestamp {
            return t;
        }
        let desc = self.outputs.get(output);
        match (desc, self.records.get(&output).and_then(|r| r.last_time)) {
            (Some(d), Some(prev)) if d.sample_type == SampleType::FixedSampleRate && d.sample_rate > 0.0 => {
                prev + RealTime::from_seconds(1.0 / d.sample_rate as f64)
            }
            _ => process_time,
        }
    }

    fn record(&mut self, features: &FeatureSet, process_time: RealTime) {
        for (&output, list) in features {
            for feature in list {
                let time = self.feature_time(output, feature, process_time);
                self.record_feature(output, feature, time);
            }
        }
    }

    fn record_feature(&mut self, output: usize, feature: &Feature, time: RealTime) {
        let pending = {
            let record = self.records.entry(output).or_default();
            record.last_time = Some(time);
            record.awaiting_duration.take()
        };

        if let Some(held) = pending {
            self.accumulate(output, &held.values, held.time, time.max(held.time));
        }

        match feature.duration {
            Some(duration) => {
                let end = time + duration.max(RealTime::ZERO);
                self.accumulate(output, &feature.values, time, end);
            }
            None => {
                if let Some(record) = self.records.get_mut(&output) {
                    record.awaiting_duration = Some(Held {
                        time,
                        values: feature.values.clone(),
                    });
                }
            }
        }
    }

    /// Add `values` held over `[from, to)`, split at segment boundaries
    fn accumulate(&mut self, output: usize, values: &[f32], from: RealTime, to: RealTime) {
        let mut start = from;
        loop {
            let segment = self.segment_start(start);
            let piece_end = match self.segment_end(segment) {
                Some(next) if next < to => next,
                _ => to,
            };

            let duration = (piece_end - start).to_seconds().max(0.0);
            let bins = self
                .records
                .entry(output)
                .or_default()
                .segments
                .entry(segment)
                .or_default();
            if bins.len() < values.len() {
                bins.resize_with(values.len(), BinSeries::default);
            }
            for (series, &value) in bins.iter_mut().zip(values) {
                series.values.push(value);
                series.durations.push(duration);
            }

            if piece_end >= to {
                break;
            }
            start = piece_end;
        }
    }

    fn finalise(&mut self) {
        let end = match self.last_process_time {
            Some(t) if self.step_size > 0 => {
                t + RealTime::frame_to_real_time(self.step_size as i64, self.inner.input_sample_rate())
            }
            Some(t) => t,
            None => RealTime::ZERO,
        };

        let outputs: Vec<usize> = self.records.keys().copied().collect();
        for output in outputs {
            let pending = self.records.get_mut(&output).and_then(|r| r.awaiting_duration.take());
            if let Some(held) = pending {
                self.accumulate(output, &held.values, held.time, end.max(held.time));
            }
        }

        self.summaries.clear();
        for (&output, record) in &self.records {
            let mut segments = BTreeMap::new();
            for (&start, bins) in &record.segments {
                let mut summaries = Vec::with_capacity(bins.len());
                for (bin, series) in bins.iter().enumerate() {
                    match summarise(&series.values, &series.durations) {
                        Ok(summary) => summaries.push(summary),
                        Err(err) => {
                            error!(output, bin, %err, "skipping bin with inconsistent accumulation");
                            summaries.push(BinSummary::default());
                        }
                    }
                }
                segments.insert(start, summaries);
            }
            self.summaries.insert(output, segments);
        }

        debug!(outputs = self.summaries.len(), end = %end, "summaries finalised");
        self.end_of_stream = Some(end);
    }

    fn clear(&mut self) {
        self.records.clear();
        self.summaries.clear();
        self.last_process_time = None;
        self.end_of_stream = None;
    }
}

fn summary_label(summary: SummaryType, averaging: AveragingMethod) -> String {
    let weighted = matches!(
        summary,
        SummaryType::Mean | SummaryType::Median | SummaryType::Mode | SummaryType::Variance | SummaryType::StandardDeviation
    );
    if weighted && averaging == AveragingMethod::ContinuousTimeAverage {
        format!("continuous-time {summary}")
    } else {
        summary.to_string()
    }
}

impl Plugin for SummarisingAdapter {
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
        self.inner.min_channel_count()
    }

    fn max_channel_count(&self) -> usize {
        self.inner.max_channel_count()
    }

    fn output_descriptors(&self) -> Vec<OutputDescriptor> {
        self.inner.output_descriptors()
    }

    fn initialise(&mut self, channels: usize, step_size: usize, block_size: usize) -> bool {
        if !self.inner.initialise(channels, step_size, block_size) {
            return false;
        }
        self.step_size = step_size;
        self.outputs = self.inner.output_descriptors();
        self.clear();
        true
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.clear();
    }

    fn process(&mut self, input: &[&[f32]], timestamp: RealTime) -> FeatureSet {
        let features = self.inner.process(input, timestamp);
        if self.end_of_stream.is_some() {
            warn!("process called after the run was finalised; features not summarised");
            return features;
        }
        self.last_process_time = Some(timestamp);
        self.record(&features, timestamp);
        features
    }

    fn remaining_features(&mut self) -> FeatureSet {
        let features = self.inner.remaining_features();
        if self.end_of_stream.is_none() {
            let time = self.last_process_time.unwrap_or(RealTime::ZERO);
            self.record(&features, time);
            self.finalise();
        }
        features
    }

    fn timestamp_adjustment(&self) -> Option<RealTime> {
        self.inner.timestamp_adjustment()
    }
}
