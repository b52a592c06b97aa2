//! End-to-end pipeline behavior over the public API

use aquaspec_core::{
    channels::CHANNEL_COUNT, Command, DeviceCommand, NoModel, OutboundEvent, RawSample,
    SpectrumVector, TelemetryPipeline,
};
use proptest::prelude::*;

fn sample(value: f32, ts: u64) -> RawSample {
    RawSample::new(SpectrumVector::splat(value), ts)
}

/// One device command per sample, never pipelined: a full N=5 session
/// issues exactly five read requests (one at start, one per accepted
/// sample except the last).
#[test]
fn ping_pong_issues_one_request_per_sample() {
    let mut pipeline = TelemetryPipeline::new(NoModel);
    let mut requests = 0;

    for event in pipeline.handle_command(Command::Calibrate { target: 5 }) {
        if matches!(event, OutboundEvent::Device(DeviceCommand::TakeReading)) {
            requests += 1;
        }
    }

    let mut finished = None;
    for i in 0..5 {
        for event in pipeline.process_sample(sample(200.0, i)) {
            match event {
                OutboundEvent::Device(DeviceCommand::TakeReading) => requests += 1,
                OutboundEvent::CalibrationFinished { success } => finished = Some(success),
                other => panic!("unexpected event during calibration: {:?}", other),
            }
        }
    }

    assert_eq!(requests, 5);
    assert_eq!(finished, Some(true));
}

/// A filtered-out sample triggers exactly one replacement request and
/// the session still requires the full accepted count.
#[test]
fn filtered_sample_extends_the_session() {
    let mut pipeline = TelemetryPipeline::new(NoModel);
    pipeline.handle_command(Command::Calibrate { target: 5 });

    let mut faulted = [100.0f32; CHANNEL_COUNT];
    faulted[0] = 0.0;

    let mut requests = 0;
    let mut finished = None;
    let feed = [
        SpectrumVector::splat(100.0),
        SpectrumVector::splat(100.0),
        SpectrumVector::from_array(faulted), // sample 3 of 5: rejected
        SpectrumVector::splat(100.0),
        SpectrumVector::splat(100.0),
        SpectrumVector::splat(100.0),
    ];
    for (i, spectrum) in feed.iter().enumerate() {
        for event in pipeline.process_sample(RawSample::new(*spectrum, i as u64)) {
            match event {
                OutboundEvent::Device(DeviceCommand::TakeReading) => requests += 1,
                OutboundEvent::CalibrationFinished { success } => finished = Some(success),
                other => panic!("unexpected event during calibration: {:?}", other),
            }
        }
    }

    // 5 replacement requests (one of them for the rejected sample)
    assert_eq!(requests, 5);
    assert_eq!(finished, Some(true));
    assert_eq!(
        pipeline.engine().baseline(),
        Some(&SpectrumVector::splat(100.0))
    );
}

/// Telemetry emission is suppressed for the whole session and resumes
/// with the new baseline applied.
#[test]
fn no_telemetry_during_calibration() {
    let mut pipeline = TelemetryPipeline::new(NoModel);
    pipeline.handle_command(Command::Calibrate { target: 2 });

    for i in 0..2 {
        for event in pipeline.process_sample(sample(100.0, i)) {
            assert!(!event.is_record());
        }
    }

    let emitted = pipeline.process_sample(sample(50.0, 10));
    let records: Vec<_> = emitted.into_iter().filter(|e| e.is_record()).collect();
    assert_eq!(records.len(), 1);
    if let OutboundEvent::Record(record) = &records[0] {
        assert!(record.calibrated);
        // -log10(50/100) ~ 0.301
        let value = record.absorbance.as_array()[0];
        assert!((value - 0.301).abs() < 1e-3);
    }
}

proptest! {
    /// Absorbance stays finite and inside [0, 6] across the declared
    /// raw-value domain, for any positive baseline.
    #[test]
    fn absorbance_is_finite_over_raw_domain(
        raw in -1_000.0f32..100_000.0,
        baseline in 0.1f32..60_000.0,
    ) {
        let mut pipeline = TelemetryPipeline::with_baseline(
            NoModel,
            SpectrumVector::splat(baseline),
        );
        let emitted = pipeline.process_sample(sample(raw, 0));
        for event in emitted {
            if let OutboundEvent::Record(record) = event {
                for (_, value) in record.absorbance.iter_named() {
                    prop_assert!(value.is_finite());
                    prop_assert!((0.0..=6.0).contains(&value));
                }
            }
        }
    }

    /// Samples brighter than the baseline always floor to exactly zero.
    #[test]
    fn brighter_than_baseline_floors_to_zero(extra in 0.001f32..50_000.0) {
        let baseline = 500.0f32;
        let mut pipeline = TelemetryPipeline::with_baseline(
            NoModel,
            SpectrumVector::splat(baseline),
        );
        let emitted = pipeline.process_sample(sample(baseline + extra, 0));
        for event in emitted {
            if let OutboundEvent::Record(record) = event {
                for (_, value) in record.absorbance.iter_named() {
                    prop_assert_eq!(value, 0.0);
                }
            }
        }
    }
}
