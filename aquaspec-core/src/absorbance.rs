//! Absorbance transform against the calibrated baseline
//!
//! ## Overview
//!
//! Converts a raw intensity spectrum into absorbance with the standard
//! optical-chemistry transform, per channel:
//!
//! ```text
//! A = -log10((sample + ε) / (baseline + ε))
//! ```
//!
//! ## Numeric policy
//!
//! The transform feeds an unattended telemetry stream, so it must be
//! total over the whole raw-value domain, including an LED that is off
//! (counts near zero) and a saturated sensor:
//!
//! - ε = 1e-6 keeps the ratio defined when either side is zero
//! - the ratio is clipped to `[1e-6, 2.0]` before the log, bounding the
//!   result to `[-log10(2), 6]` with no ±∞ possible
//! - negative absorbance (channel brighter than the baseline) is floored
//!   to 0.0 for reporting
//! - results are rounded to 4 decimal places
//!
//! Clipping trades a little accuracy at the extremes for the guarantee
//! that no NaN/Inf ever enters the pipeline.
//!
//! ## Uncalibrated mode
//!
//! With no baseline set the engine passes the raw vector through,
//! reinterpreted as absorbance for display, and tags the result
//! [`Absorbance::Uncalibrated`]. Callers must treat that as a flagged,
//! degraded mode - it is never silently corrected.

use crate::{
    errors::{CoreResult, TelemetryError},
    spectrum::{round_to, SpectrumVector},
};

/// Guard added to both sides of the ratio
pub const EPSILON: f32 = 1e-6;

/// Lower clip bound for the intensity ratio
pub const RATIO_FLOOR: f32 = 1e-6;

/// Upper clip bound for the intensity ratio
pub const RATIO_CEILING: f32 = 2.0;

/// Decimal places kept when reporting absorbance
pub const REPORT_DECIMALS: u32 = 4;

/// Result of an absorbance computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Absorbance {
    /// Transform applied against the live baseline
    Calibrated(SpectrumVector),
    /// No baseline available; raw vector passed through for display
    Uncalibrated(SpectrumVector),
}

impl Absorbance {
    /// The carried vector, whichever mode produced it
    pub const fn vector(&self) -> &SpectrumVector {
        match self {
            Absorbance::Calibrated(v) | Absorbance::Uncalibrated(v) => v,
        }
    }

    /// True when a baseline was applied
    pub const fn is_calibrated(&self) -> bool {
        matches!(self, Absorbance::Calibrated(_))
    }
}

/// Owns the reference baseline and applies the transform
///
/// Exactly one live baseline exists at a time. Replacement is a full
/// substitution of the stored vector - a reader always sees the old or
/// the new baseline in its entirety.
#[derive(Debug, Clone, Default)]
pub struct AbsorbanceEngine {
    baseline: Option<SpectrumVector>,
}

impl AbsorbanceEngine {
    /// Engine in the explicit uncalibrated state
    pub const fn new() -> Self {
        Self { baseline: None }
    }

    /// Engine seeded with a restored baseline
    pub const fn with_baseline(baseline: SpectrumVector) -> Self {
        Self {
            baseline: Some(baseline),
        }
    }

    /// The current baseline, if any
    pub const fn baseline(&self) -> Option<&SpectrumVector> {
        self.baseline.as_ref()
    }

    /// True once a baseline has been set
    pub const fn is_calibrated(&self) -> bool {
        self.baseline.is_some()
    }

    /// Replace the baseline unconditionally
    ///
    /// The only rejection is a vector with a non-finite component; a
    /// fixed-size spectrum cannot be "empty" in any other sense.
    pub fn set_baseline(&mut self, baseline: SpectrumVector) -> CoreResult<()> {
        if !baseline.is_finite() {
            return Err(TelemetryError::InvalidBaseline);
        }
        self.baseline = Some(baseline);
        Ok(())
    }

    /// Compute absorbance for a raw spectrum
    ///
    /// Total over all inputs: any finite or non-finite raw value maps to
    /// a finite absorbance in `[0, 6]` when calibrated.
    pub fn compute(&self, raw: &SpectrumVector) -> Absorbance {
        let baseline = match &self.baseline {
            Some(b) => b,
            None => return Absorbance::Uncalibrated(*raw),
        };

        let mut values = [0.0f32; crate::channels::CHANNEL_COUNT];
        for (slot, (sample, reference)) in values
            .iter_mut()
            .zip(raw.as_array().iter().zip(baseline.as_array().iter()))
        {
            let mut ratio = (sample + EPSILON) / (reference + EPSILON);
            if !ratio.is_finite() {
                ratio = RATIO_FLOOR;
            }
            let ratio = ratio.clamp(RATIO_FLOOR, RATIO_CEILING);
            let absorbance = -libm::log10f(ratio);
            let floored = if absorbance < 0.0 { 0.0 } else { absorbance };
            *slot = round_to(floored, REPORT_DECIMALS);
        }
        Absorbance::Calibrated(SpectrumVector::from_array(values))
    }
}
