//! Reusable storage behind the feature sets returned to hosts
//!
//! Each plugin instance owns one [`FeatureBuffers`]. A conversion overwrites
//! the previous result in place, so a returned set stays valid until the
//! next process or get-remaining-features call on the same instance. The
//! per-output tables only ever grow.

use crate::abi::{WireFeature, WireFeatureList, WireFeatureSet};
use crate::ownership::to_c_string;
use sonara_kernel::{Feature, FeatureSet};
use std::ffi::{CString, c_int, c_uint};
use std::ptr;
use tracing::warn;

#[derive(Default)]
struct OutputBuffer {
    features: Vec<WireFeature>,
    values: Vec<Vec<f32>>,
    labels: Vec<Option<CString>>,
}

impl OutputBuffer {
    fn reserve(&mut self, count: usize) {
        if self.features.len() < count {
            self.features.resize(count, WireFeature::default());
            self.values.resize_with(count, Vec::new);
            self.labels.resize_with(count, || None);
        }
    }

    fn fill(&mut self, list: &[Feature]) -> WireFeatureList {
        self.reserve(list.len());

        for (j, feature) in list.iter().enumerate() {
            let values = &mut self.values[j];
            values.clear();
            values.extend_from_slice(&feature.values);

            self.labels[j] = (!feature.label.is_empty()).then(|| to_c_string(&feature.label));

            let (has_timestamp, sec, nsec) = match feature.timestamp {
                Some(t) => (1, t.sec, t.nsec),
                None => (0, 0, 0),
            };
            let (has_duration, duration_sec, duration_nsec) = match feature.duration {
                Some(d) => (1, d.sec, d.nsec),
                None => (0, 0, 0),
            };

            self.features[j] = WireFeature {
                has_timestamp,
                sec: sec as c_int,
                nsec: nsec as c_int,
                has_duration,
                duration_sec: duration_sec as c_int,
                duration_nsec: duration_nsec as c_int,
                value_count: values.len() as c_uint,
                values: if values.is_empty() { ptr::null() } else { values.as_ptr() },
                label: self.labels[j].as_ref().map_or(ptr::null(), |l| l.as_ptr()),
            };
        }

        WireFeatureList {
            feature_count: list.len() as c_uint,
            features: self.features.as_ptr(),
        }
    }
}

/// Growable wire storage for one plugin instance
pub struct FeatureBuffers {
    // boxed so the returned header address survives moves of the owner
    header: Box<WireFeatureSet>,
    lists: Vec<WireFeatureList>,
    outputs: Vec<OutputBuffer>,
}

// Raw pointers here only refer into storage owned by this value.
unsafe impl Send for FeatureBuffers {}

impl Default for FeatureBuffers {
    fn default() -> Self {
        Self {
            header: Box::new(WireFeatureSet::default()),
            lists: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

impl FeatureBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of lists the table has grown to
    pub fn table_len(&self) -> usize {
        self.lists.len()
    }

    /// Write `features` into the buffers and return the wire view.
    ///
    /// Outputs at or beyond `output_count` are dropped with a warning. The
    /// table covers every output index seen so far on this instance; lists
    /// with nothing to report this call are present with zero features.
    /// Returns NULL when no output has ever produced a feature list.
    pub fn convert(&mut self, features: &FeatureSet, output_count: usize) -> *const WireFeatureSet {
        let highest = features
            .keys()
            .copied()
            .filter(|&n| n < output_count)
            .max()
            .map_or(0, |n| n + 1);

        if let Some(&n) = features.keys().find(|&&n| n >= output_count) {
            warn!(
                output = n,
                output_count, "plugin returned features for an undeclared output; dropping them"
            );
        }

        let table_len = self.lists.len().max(highest);
        if table_len == 0 {
            return ptr::null();
        }
        if self.lists.len() < table_len {
            self.lists.resize(table_len, WireFeatureList::default());
            self.outputs.resize_with(table_len, OutputBuffer::default);
        }

        for n in 0..table_len {
            self.lists[n] = match features.get(&n) {
                Some(list) => self.outputs[n].fill(list),
                None => WireFeatureList {
                    feature_count: 0,
                    features: self.outputs[n].features.as_ptr(),
                },
            };
        }

        *self.header = WireFeatureSet {
            output_count: table_len as c_uint,
            lists: self.lists.as_ptr(),
        };
        &*self.header
    }
}
