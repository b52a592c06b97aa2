//! Calibration session state machine
//!
//! ## Protocol
//!
//! Acquiring a baseline is a strict ping-pong with the device: the
//! session asks for exactly one reading, waits for it, and only then asks
//! for the next. At most one request is outstanding at any time, so a
//! missed (ephemeral) request stalls the session instead of flooding a
//! sleeping device with queued reads.
//!
//! ```text
//! Idle --start(N)--> Sampling(0) --sample--> Sampling(1) --...--> Sampling(N-1)
//!                        |                                            |
//!                   RequestReading per accepted/rejected sample       |
//!                                                                     v
//!                                       average (2 dp) -> Completed(mean) -> Idle
//! ```
//!
//! ## Filtering
//!
//! A sample is rejected before it enters the buffer when any channel is
//! non-positive (sensor or LED fault) or above the saturation ceiling
//! (60000 raw counts). A rejected sample does not count toward N; the
//! session issues exactly one replacement request for it.
//!
//! ## Termination
//!
//! There is no wall-clock timeout - liveness of a silent device belongs
//! to the external watchdog. The session does bound its own failure
//! modes: a start with N = 0 fails immediately, and a run of
//! [`MAX_CONSECUTIVE_REJECTIONS`] rejected samples aborts the session so
//! a faulted sensor cannot ping-pong forever. [`CalibrationSession::cancel`]
//! returns to idle without touching the baseline.

use crate::{
    channels::SATURATION_CEILING,
    errors::TelemetryError,
    spectrum::SpectrumVector,
};

/// Default number of accepted samples per session
pub const DEFAULT_SAMPLE_TARGET: u32 = 10;

/// Hard cap on the per-session sample buffer
pub const MAX_SAMPLE_TARGET: usize = 64;

/// Consecutive rejected samples that abort a session
pub const MAX_CONSECUTIVE_REJECTIONS: u32 = 50;

/// Observable session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session running
    Idle,
    /// Collecting samples
    Sampling {
        /// Samples accepted so far
        accepted: u32,
        /// Samples required
        target: u32,
    },
}

/// Outcome of feeding the session one input
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStep {
    /// No session is active; the sample belongs to normal telemetry
    Inactive,
    /// Ask the device for one more reading
    RequestReading,
    /// Session finished; install this averaged baseline
    Completed(SpectrumVector),
    /// Session finished without a baseline
    Failed(TelemetryError),
}

/// Ephemeral multi-sample acquisition session
///
/// Lives only between a calibration-start command and
/// completion/abort; never persisted.
#[derive(Debug, Default)]
pub struct CalibrationSession {
    active: bool,
    target: u32,
    buffer: heapless::Vec<SpectrumVector, MAX_SAMPLE_TARGET>,
    rejection_streak: u32,
}

impl CalibrationSession {
    /// New idle session
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a session is collecting samples
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Current state for inspection
    pub fn state(&self) -> SessionState {
        if self.active {
            SessionState::Sampling {
                accepted: self.buffer.len() as u32,
                target: self.target,
            }
        } else {
            SessionState::Idle
        }
    }

    /// Start (or restart) a session collecting `target` samples
    ///
    /// Restarting an active session discards its buffer; the operator
    /// asked for a fresh baseline, not a continuation. A `target` above
    /// the buffer cap is clamped; a `target` of zero is the degenerate
    /// empty-buffer case and fails immediately.
    pub fn start(&mut self, target: u32) -> SessionStep {
        self.reset();
        if target == 0 {
            return SessionStep::Failed(TelemetryError::CalibrationFault {
                reason: "empty sample buffer",
            });
        }
        let clamped = target.min(MAX_SAMPLE_TARGET as u32);
        if clamped != target {
            log::warn!(
                "calibration target {} clamped to buffer cap {}",
                target,
                clamped
            );
        }
        self.target = clamped;
        self.active = true;
        SessionStep::RequestReading
    }

    /// Feed one device reading to the active session
    pub fn offer_sample(&mut self, spectrum: &SpectrumVector) -> SessionStep {
        if !self.active {
            return SessionStep::Inactive;
        }

        if !Self::acceptable(spectrum) {
            self.rejection_streak += 1;
            if self.rejection_streak >= MAX_CONSECUTIVE_REJECTIONS {
                log::warn!(
                    "calibration aborted after {} consecutive rejected samples",
                    self.rejection_streak
                );
                self.reset();
                return SessionStep::Failed(TelemetryError::CalibrationFault {
                    reason: "rejection limit reached",
                });
            }
            return SessionStep::RequestReading;
        }

        self.rejection_streak = 0;
        // target is clamped to the buffer capacity, so this cannot overflow
        let _ = self.buffer.push(*spectrum);
        if (self.buffer.len() as u32) < self.target {
            return SessionStep::RequestReading;
        }

        let step = match SpectrumVector::mean(&self.buffer) {
            Some(mean) => SessionStep::Completed(mean),
            None => SessionStep::Failed(TelemetryError::CalibrationFault {
                reason: "empty sample buffer",
            }),
        };
        self.reset();
        step
    }

    /// Abandon the session without touching the baseline
    pub fn cancel(&mut self) {
        if self.active {
            log::info!(
                "calibration cancelled with {}/{} samples collected",
                self.buffer.len(),
                self.target
            );
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.active = false;
        self.target = 0;
        self.buffer.clear();
        self.rejection_streak = 0;
    }

    /// Sample filter: every channel must be a positive, unsaturated count
    fn acceptable(spectrum: &SpectrumVector) -> bool {
        spectrum
            .as_array()
            .iter()
            .all(|&v| v.is_finite() && v > 0.0 && v <= SATURATION_CEILING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive_to_completion(session: &mut CalibrationSession, n: u32, value: f32) -> SessionStep {
        assert_eq!(session.start(n), SessionStep::RequestReading);
        let sample = SpectrumVector::splat(value);
        for _ in 0..n - 1 {
            assert_eq!(
                session.offer_sample(&sample),
                SessionStep::RequestReading
            );
        }
        session.offer_sample(&sample)
    }

    #[test]
    fn five_constant_samples_average_exactly() {
        let mut session = CalibrationSession::new();
        let step = drive_to_completion(&mut session, 5, 100.0);
        assert_eq!(step, SessionStep::Completed(SpectrumVector::splat(100.0)));
        assert!(!session.is_active());
    }

    #[test]
    fn rejected_sample_does_not_count() {
        let mut session = CalibrationSession::new();
        assert_eq!(session.start(5), SessionStep::RequestReading);

        let good = SpectrumVector::splat(100.0);
        let mut bad_values = [100.0f32; crate::channels::CHANNEL_COUNT];
        bad_values[7] = 0.0;
        let bad = SpectrumVector::from_array(bad_values);

        session.offer_sample(&good);
        session.offer_sample(&good);
        // sample 3 is faulted: filtered out, one replacement request
        assert_eq!(session.offer_sample(&bad), SessionStep::RequestReading);
        session.offer_sample(&good);
        session.offer_sample(&good);
        // still needs a fifth accepted sample
        assert_eq!(
            session.state(),
            SessionState::Sampling {
                accepted: 4,
                target: 5
            }
        );
        assert_eq!(
            session.offer_sample(&good),
            SessionStep::Completed(SpectrumVector::splat(100.0))
        );
    }

    #[test]
    fn saturated_sample_is_rejected() {
        let mut session = CalibrationSession::new();
        session.start(2);
        let saturated = SpectrumVector::splat(60_001.0);
        assert_eq!(
            session.offer_sample(&saturated),
            SessionStep::RequestReading
        );
        assert_eq!(
            session.state(),
            SessionState::Sampling {
                accepted: 0,
                target: 2
            }
        );
    }

    #[test]
    fn zero_target_fails_immediately() {
        let mut session = CalibrationSession::new();
        assert!(matches!(session.start(0), SessionStep::Failed(_)));
        assert!(!session.is_active());
    }

    #[test]
    fn rejection_streak_aborts() {
        let mut session = CalibrationSession::new();
        session.start(3);
        let bad = SpectrumVector::splat(-1.0);
        let mut last = SessionStep::Inactive;
        for _ in 0..MAX_CONSECUTIVE_REJECTIONS {
            last = session.offer_sample(&bad);
        }
        assert!(matches!(last, SessionStep::Failed(_)));
        assert!(!session.is_active());
    }

    #[test]
    fn inactive_session_ignores_samples() {
        let mut session = CalibrationSession::new();
        assert_eq!(
            session.offer_sample(&SpectrumVector::splat(1.0)),
            SessionStep::Inactive
        );
    }

    #[test]
    fn restart_discards_previous_buffer() {
        let mut session = CalibrationSession::new();
        session.start(5);
        session.offer_sample(&SpectrumVector::splat(100.0));
        session.start(2);
        let sample = SpectrumVector::splat(50.0);
        session.offer_sample(&sample);
        assert_eq!(
            session.offer_sample(&sample),
            SessionStep::Completed(SpectrumVector::splat(50.0))
        );
    }

    #[test]
    fn cancel_returns_to_idle() {
        let mut session = CalibrationSession::new();
        session.start(5);
        session.offer_sample(&SpectrumVector::splat(100.0));
        session.cancel();
        assert_eq!(session.state(), SessionState::Idle);
    }
}
