//! Summaries of plugins loaded through the C ABI

use sonara_host::summarising::{SegmentBoundaries, summarise};
use sonara_host::{AdapterFlags, AveragingMethod, HostConfig, LoadRequest, SummarisingAdapter, SummaryError, SummaryType};
use sonara_kernel::{Plugin, RealTime};
use sonara_kernel::config::Format;
use sonara_testing::{Switch, fixture_key, fixture_loader, run_mono};

const RATE: f32 = 1000.0;
const BLOCK: usize = 100;

fn summarising(identifier: &str) -> SummarisingAdapter {
    let plugin = fixture_loader()
        .load_plugin(LoadRequest::new(fixture_key(identifier), RATE).with_adapter_flags(AdapterFlags::ADAPT_ALL_SAFE))
        .unwrap()
        .plugin;
    SummarisingAdapter::new(plugin)
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

#[test]
fn constant_value_has_that_continuous_mean() {
    for blocks in [1, 7, 250] {
        let mut adapter = summarising("constant");
        adapter.set_parameter("value", 0.25);
        assert!(adapter.initialise(1, BLOCK, BLOCK));
        run_mono(&mut adapter, &vec![0.0; BLOCK * blocks], BLOCK, BLOCK);

        let mean = adapter.summary_for_output(0, SummaryType::Mean, AveragingMethod::ContinuousTimeAverage);
        assert_eq!(mean.len(), 1);
        assert!(close(mean[0].values[0], 0.25), "{blocks} blocks");

        let count = adapter.summary_for_output(0, SummaryType::Count, AveragingMethod::SampleAverage);
        assert_eq!(count[0].values, vec![blocks as f32]);
    }
}

#[test]
fn averaging_methods_diverge_for_held_values() {
    let mut adapter = summarising("switch");
    assert!(adapter.initialise(1, BLOCK, BLOCK));
    run_mono(&mut adapter, &vec![0.0; BLOCK * 100], BLOCK, BLOCK);

    let sample = adapter.summary_for_output(0, SummaryType::Mean, AveragingMethod::SampleAverage);
    let continuous = adapter.summary_for_output(0, SummaryType::Mean, AveragingMethod::ContinuousTimeAverage);
    assert!(close(sample[0].values[0], (Switch::BEFORE + Switch::AFTER) / 2.0));
    assert!(close(continuous[0].values[0], 1.0));

    let median = adapter.summary_for_output(0, SummaryType::Median, AveragingMethod::ContinuousTimeAverage);
    assert_eq!(median[0].values, vec![Switch::BEFORE]);
    let maximum = adapter.summary_for_output(0, SummaryType::Maximum, AveragingMethod::ContinuousTimeAverage);
    assert_eq!(maximum[0].values, vec![Switch::AFTER]);
}

#[test]
fn segments_report_their_own_statistics() {
    let mut adapter = summarising("switch");
    adapter.set_parameter("switch-block", 5.0);
    adapter.set_summary_segment_boundaries(SegmentBoundaries::from([RealTime::from_millis(500)]));
    assert!(adapter.initialise(1, BLOCK, BLOCK));
    run_mono(&mut adapter, &vec![0.0; BLOCK * 10], BLOCK, BLOCK);

    let mean = adapter.summary_for_output(0, SummaryType::Mean, AveragingMethod::ContinuousTimeAverage);
    assert_eq!(mean.len(), 2);
    assert_eq!(mean[0].timestamp, Some(RealTime::ZERO));
    assert_eq!(mean[0].duration, Some(RealTime::from_millis(500)));
    assert_eq!(mean[0].values, vec![Switch::BEFORE]);
    assert_eq!(mean[1].timestamp, Some(RealTime::from_millis(500)));
    assert_eq!(mean[1].duration, Some(RealTime::from_millis(500)));
    assert_eq!(mean[1].values, vec![Switch::AFTER]);
}

#[test]
fn unknown_output_summarises_to_nothing() {
    let mut adapter = summarising("constant");
    assert!(adapter.initialise(1, BLOCK, BLOCK));
    run_mono(&mut adapter, &vec![0.0; BLOCK * 3], BLOCK, BLOCK);
    assert!(adapter.summary_for_output(1, SummaryType::Mean, AveragingMethod::SampleAverage).is_empty());
    assert_eq!(
        adapter
            .summary_for_all_outputs(SummaryType::Sum, AveragingMethod::SampleAverage)
            .len(),
        1
    );
}

#[test]
fn configured_averaging_is_honoured() {
    let config = HostConfig::from_source("summary_averaging: continuous-time-average\n", Format::Yaml).unwrap();

    let mut adapter = summarising("switch");
    assert!(adapter.initialise(1, BLOCK, BLOCK));
    run_mono(&mut adapter, &vec![0.0; BLOCK * 100], BLOCK, BLOCK);
    let mean = adapter.summary_for_output(0, SummaryType::Mean, config.summary_averaging);
    assert!(close(mean[0].values[0], 1.0));
}

#[test]
fn mismatched_accumulation_is_detected() {
    assert_eq!(
        summarise(&[1.0, 2.0, 3.0], &[0.5, 0.5]),
        Err(SummaryError::LengthMismatch { values: 3, durations: 2 })
    );
}
