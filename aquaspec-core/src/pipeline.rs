//! Per-sample processing pipeline
//!
//! ## Overview
//!
//! [`TelemetryPipeline`] is the single coordinator behind the ingest
//! loop. For every inbound sample it runs one of two paths:
//!
//! ```text
//! calibrating:  sample -> CalibrationSession -> device command / result
//! otherwise:    sample -> AbsorbanceEngine -> model -> telemetry record
//! ```
//!
//! During an active calibration session samples are routed exclusively
//! to the session: no telemetry is emitted and the model is not updated.
//! On completion the averaged baseline replaces the engine's baseline
//! synchronously, before the next sample can observe the old one.
//!
//! ## State
//!
//! The ambient "current label" and the calibration flags are instance
//! state here, not process-wide globals, so independent pipelines can
//! coexist and tests stay hermetic.
//!
//! ## Emission
//!
//! Each call returns a bounded [`Emitted`] buffer of outbound events.
//! A single input can produce at most two events (a calibration result
//! is the largest case), so the buffer never overflows in practice; a
//! misbehaving extension dropping events would surface in tests, not as
//! unbounded memory growth.

use crate::{
    absorbance::AbsorbanceEngine,
    calibration::{CalibrationSession, SessionStep},
    events::{Command, DeviceCommand, OutboundEvent, TelemetryRecord},
    spectrum::{RawSample, SpectrumVector},
    traits::{Classification, Projection, SpectralModel},
};

#[cfg(not(feature = "std"))]
use alloc::string::String;

/// Capacity of the per-call emission buffer
pub const MAX_EMITTED: usize = 4;

/// Bounded buffer of events produced by one pipeline call
#[derive(Debug, Default)]
pub struct Emitted {
    events: heapless::Vec<OutboundEvent, MAX_EMITTED>,
}

impl Emitted {
    /// Empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event; reports whether it fit
    pub fn push(&mut self, event: OutboundEvent) -> bool {
        self.events.push(event).is_ok()
    }

    /// Number of buffered events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when nothing was emitted
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate the buffered events
    pub fn iter(&self) -> impl Iterator<Item = &OutboundEvent> {
        self.events.iter()
    }
}

impl IntoIterator for Emitted {
    type Item = OutboundEvent;
    type IntoIter = <heapless::Vec<OutboundEvent, MAX_EMITTED> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

/// Coordinates absorbance, calibration and the model for one sensor stream
pub struct TelemetryPipeline<M: SpectralModel> {
    engine: AbsorbanceEngine,
    session: CalibrationSession,
    model: M,
    current_label: Option<String>,
}

impl<M: SpectralModel> TelemetryPipeline<M> {
    /// Pipeline in the uncalibrated state
    pub fn new(model: M) -> Self {
        Self {
            engine: AbsorbanceEngine::new(),
            session: CalibrationSession::new(),
            model,
            current_label: None,
        }
    }

    /// Pipeline seeded with a baseline restored from persistence
    ///
    /// Restoring is not a baseline *replacement*: the model is not
    /// notified and nothing is persisted again.
    pub fn with_baseline(model: M, baseline: SpectrumVector) -> Self {
        Self {
            engine: AbsorbanceEngine::with_baseline(baseline),
            session: CalibrationSession::new(),
            model,
            current_label: None,
        }
    }

    /// The absorbance engine
    pub fn engine(&self) -> &AbsorbanceEngine {
        &self.engine
    }

    /// The calibration session
    pub fn session(&self) -> &CalibrationSession {
        &self.session
    }

    /// The model implementation
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Mutable access to the model (persistence wiring at boot)
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Ambient label applied to subsequent samples
    pub fn current_label(&self) -> Option<&str> {
        self.current_label.as_deref()
    }

    /// True while a calibration session is consuming the sample stream
    pub fn is_calibrating(&self) -> bool {
        self.session.is_active()
    }

    /// Abandon an in-progress calibration session
    pub fn cancel_calibration(&mut self) {
        self.session.cancel();
    }

    /// Apply one decoded command
    pub fn handle_command(&mut self, command: Command) -> Emitted {
        let mut out = Emitted::new();
        match command {
            Command::SetTarget(label) => {
                log::info!("current label set to {:?}", label.as_deref());
                self.current_label = label;
            }
            Command::Calibrate { target } => match self.session.start(target) {
                SessionStep::RequestReading => {
                    log::info!("calibration started, target {} samples", target);
                    out.push(OutboundEvent::Device(DeviceCommand::TakeReading));
                }
                SessionStep::Failed(err) => {
                    log::warn!("calibration refused: {}", err);
                    out.push(OutboundEvent::CalibrationFinished { success: false });
                }
                // start() only requests or fails
                SessionStep::Inactive | SessionStep::Completed(_) => {}
            },
            Command::Device(device) => {
                out.push(OutboundEvent::Device(device));
            }
        }
        out
    }

    /// Process one inbound raw sample
    pub fn process_sample(&mut self, sample: RawSample) -> Emitted {
        let mut out = Emitted::new();

        if self.session.is_active() {
            match self.session.offer_sample(&sample.spectrum) {
                SessionStep::RequestReading => {
                    out.push(OutboundEvent::Device(DeviceCommand::TakeReading));
                }
                SessionStep::Completed(mean) => {
                    let success = match self.engine.set_baseline(mean) {
                        Ok(()) => {
                            self.model.baseline_updated(&mean);
                            log::info!("baseline replaced from calibration session");
                            true
                        }
                        Err(err) => {
                            log::warn!("averaged baseline rejected: {}", err);
                            false
                        }
                    };
                    out.push(OutboundEvent::CalibrationFinished { success });
                }
                SessionStep::Failed(err) => {
                    log::warn!("calibration session failed: {}", err);
                    out.push(OutboundEvent::CalibrationFinished { success: false });
                }
                SessionStep::Inactive => {}
            }
            return out;
        }

        let absorbance = self.engine.compute(&sample.spectrum);
        let calibrated = absorbance.is_calibrated();
        let features = *absorbance.vector();

        let (projection, classification) = if calibrated {
            if let Some(label) = self.current_label.clone() {
                self.model.observe(&features, &label);
            }
            (self.model.project(&features), self.model.classify(&features))
        } else {
            (Projection::Untrained, Classification::Untrained)
        };

        out.push(OutboundEvent::Record(TelemetryRecord {
            timestamp: sample.timestamp,
            raw: sample.spectrum,
            absorbance: features,
            calibrated,
            target_label: self.current_label.clone(),
            classification,
            projection,
        }));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::NoModel;

    fn sample(value: f32) -> RawSample {
        RawSample::new(SpectrumVector::splat(value), 1_000)
    }

    fn single_record(emitted: Emitted) -> TelemetryRecord {
        let mut events: heapless::Vec<OutboundEvent, MAX_EMITTED> =
            emitted.into_iter().collect();
        assert_eq!(events.len(), 1);
        match events.pop().unwrap() {
            OutboundEvent::Record(record) => record,
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn uncalibrated_record_passes_raw_through() {
        let mut pipeline = TelemetryPipeline::new(NoModel);
        let record = single_record(pipeline.process_sample(sample(42.0)));
        assert!(!record.calibrated);
        assert_eq!(record.absorbance, record.raw);
        assert_eq!(record.classification, Classification::Untrained);
        assert_eq!(record.projection.coords(), (0.0, 0.0));
    }

    #[test]
    fn calibration_consumes_samples_until_done() {
        let mut pipeline = TelemetryPipeline::new(NoModel);
        let emitted = pipeline.handle_command(Command::Calibrate { target: 3 });
        assert!(emitted
            .iter()
            .any(|e| matches!(e, OutboundEvent::Device(DeviceCommand::TakeReading))));

        // two mid-session samples: one follow-up request each, no records
        for _ in 0..2 {
            let emitted = pipeline.process_sample(sample(100.0));
            assert_eq!(emitted.len(), 1);
            assert!(emitted.iter().all(|e| e.is_device_command()));
        }

        // final sample: baseline installed, result event, still no record
        let emitted = pipeline.process_sample(sample(100.0));
        let finished: heapless::Vec<_, MAX_EMITTED> = emitted.into_iter().collect();
        assert_eq!(
            finished.as_slice(),
            &[OutboundEvent::CalibrationFinished { success: true }]
        );
        assert!(!pipeline.is_calibrating());
        assert_eq!(
            pipeline.engine().baseline(),
            Some(&SpectrumVector::splat(100.0))
        );

        // next sample of equal brightness reports zero absorbance
        let record = single_record(pipeline.process_sample(sample(100.0)));
        assert!(record.calibrated);
        assert_eq!(record.absorbance, SpectrumVector::splat(0.0));
    }

    #[test]
    fn failed_calibration_leaves_baseline_unchanged() {
        let mut pipeline = TelemetryPipeline::new(NoModel);
        pipeline.handle_command(Command::Calibrate { target: 0 });
        assert!(!pipeline.is_calibrating());
        assert_eq!(pipeline.engine().baseline(), None);
    }

    #[test]
    fn set_target_updates_ambient_label() {
        let mut pipeline = TelemetryPipeline::new(NoModel);
        assert_eq!(pipeline.current_label(), None);

        let emitted =
            pipeline.handle_command(Command::SetTarget(Some(String::from("Chlorine"))));
        assert!(emitted.is_empty());
        assert_eq!(pipeline.current_label(), Some("Chlorine"));

        pipeline.handle_command(Command::SetTarget(None));
        assert_eq!(pipeline.current_label(), None);
    }

    #[test]
    fn device_commands_pass_through() {
        let mut pipeline = TelemetryPipeline::new(NoModel);
        let emitted = pipeline.handle_command(Command::Device(DeviceCommand::DeepSleep {
            duration_sec: 300,
        }));
        let events: heapless::Vec<_, MAX_EMITTED> = emitted.into_iter().collect();
        assert_eq!(
            events.as_slice(),
            &[OutboundEvent::Device(DeviceCommand::DeepSleep {
                duration_sec: 300
            })]
        );
    }

    #[test]
    fn label_travels_with_records() {
        let mut pipeline =
            TelemetryPipeline::with_baseline(NoModel, SpectrumVector::splat(100.0));
        pipeline.handle_command(Command::SetTarget(Some(String::from("Clean"))));
        let record = single_record(pipeline.process_sample(sample(80.0)));
        assert_eq!(record.target_label.as_deref(), Some("Clean"));
        assert!(record.calibrated);
    }
}
