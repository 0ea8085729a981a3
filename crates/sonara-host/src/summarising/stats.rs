//! Reductions of `(value, duration)` series

use crate::error::SummaryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Statistic to report for each bin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryType {
    Minimum,
    Maximum,
    Mean,
    Median,
    Mode,
    Sum,
    Variance,
    StandardDeviation,
    Count,
}

impl SummaryType {
    pub const ALL: [SummaryType; 9] = [
        SummaryType::Minimum,
        SummaryType::Maximum,
        SummaryType::Mean,
        SummaryType::Median,
        SummaryType::Mode,
        SummaryType::Sum,
        SummaryType::Variance,
        SummaryType::StandardDeviation,
        SummaryType::Count,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SummaryType::Minimum => "minimum",
            SummaryType::Maximum => "maximum",
            SummaryType::Mean => "mean",
            SummaryType::Median => "median",
            SummaryType::Mode => "mode",
            SummaryType::Sum => "sum",
            SummaryType::Variance => "variance",
            SummaryType::StandardDeviation => "standard-deviation",
            SummaryType::Count => "count",
        }
    }
}

impl fmt::Display for SummaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SummaryType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown summary type: {s}"))
    }
}

/// How values are weighted when averaging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AveragingMethod {
    /// Every feature counts once
    #[default]
    SampleAverage,
    /// Every feature counts for as long as its value was held
    ContinuousTimeAverage,
}

/// Statistics of one bin over one segment
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BinSummary {
    pub count: usize,
    pub minimum: f64,
    pub maximum: f64,
    pub sum: f64,

    pub mean: f64,
    pub median: f64,
    pub mode: f64,
    pub variance: f64,

    pub mean_c: f64,
    pub median_c: f64,
    pub mode_c: f64,
    pub variance_c: f64,
}

impl BinSummary {
    pub fn value(&self, summary: SummaryType, averaging: AveragingMethod) -> f64 {
        let continuous = averaging == AveragingMethod::ContinuousTimeAverage;
        match summary {
            SummaryType::Minimum => self.minimum,
            SummaryType::Maximum => self.maximum,
            SummaryType::Sum => self.sum,
            SummaryType::Count => self.count as f64,
            SummaryType::Mean if continuous => self.mean_c,
            SummaryType::Mean => self.mean,
            SummaryType::Median if continuous => self.median_c,
            SummaryType::Median => self.median,
            SummaryType::Mode if continuous => self.mode_c,
            SummaryType::Mode => self.mode,
            SummaryType::Variance if continuous => self.variance_c,
            SummaryType::Variance => self.variance,
            SummaryType::StandardDeviation if continuous => self.variance_c.sqrt(),
            SummaryType::StandardDeviation => self.variance.sqrt(),
        }
    }
}

/// Reduce one bin's values, each held for the matching duration in
/// seconds.
///
/// An empty series summarises to all zeros. When every duration is zero the
/// continuous-time statistics equal the sample statistics.
pub fn summarise(values: &[f32], durations: &[f64]) -> Result<BinSummary, SummaryError> {
    if values.len() != durations.len() {
        return Err(SummaryError::LengthMismatch {
            values: values.len(),
            durations: durations.len(),
        });
    }
    if values.is_empty() {
        return Ok(BinSummary::default());
    }

    let mut pairs: Vec<(f64, f64)> = values
        .iter()
        .zip(durations)
        .map(|(&v, &d)| (v as f64, d.max(0.0)))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let count = pairs.len();
    let n = count as f64;
    let minimum = pairs[0].0;
    let maximum = pairs[count - 1].0;
    let sum: f64 = pairs.iter().map(|p| p.0).sum();
    let mean = sum / n;

    let median = if count % 2 == 0 {
        (pairs[count / 2 - 1].0 + pairs[count / 2].0) / 2.0
    } else {
        pairs[count / 2].0
    };

    let variance = pairs.iter().map(|p| (p.0 - mean).powi(2)).sum::<f64>() / n;

    // runs of equal values are adjacent after sorting
    let runs = runs_of_equal_values(&pairs);
    let mode = runs
        .iter()
        .fold((0.0, 0usize), |best, r| if r.count > best.1 { (r.value, r.count) } else { best })
        .0;

    let total: f64 = pairs.iter().map(|p| p.1).sum();
    if total <= 0.0 {
        return Ok(BinSummary {
            count,
            minimum,
            maximum,
            sum,
            mean,
            median,
            mode,
            variance,
            mean_c: mean,
            median_c: median,
            mode_c: mode,
            variance_c: variance,
        });
    }

    let mean_c = pairs.iter().map(|p| p.0 * p.1).sum::<f64>() / total;
    // spread of each value's duration-weighted contribution about mean_c
    let variance_c = pairs.iter().map(|p| (p.0 * p.1 - mean_c).powi(2)).sum::<f64>() / n;

    let mut held = 0.0;
    let median_c = pairs
        .iter()
        .find(|p| {
            held += p.1;
            held > total / 2.0
        })
        .map_or(maximum, |p| p.0);

    let mode_c = runs
        .iter()
        .fold((0.0, f64::MIN), |best, r| if r.duration > best.1 { (r.value, r.duration) } else { best })
        .0;

    Ok(BinSummary {
        count,
        minimum,
        maximum,
        sum,
        mean,
        median,
        mode,
        variance,
        mean_c,
        median_c,
        mode_c,
        variance_c,
    })
}

struct Run {
    value: f64,
    count: usize,
    duration: f64,
}

fn runs_of_equal_values(sorted: &[(f64, f64)]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for &(value, duration) in sorted {
        match runs.last_mut() {
            Some(run) if run.value == value => {
                run.count += 1;
                run.duration += duration;
            }
            _ => runs.push(Run {
                value,
                count: 1,
                duration,
            }),
        }
    }
    runs
}
