//! Error types for the telemetry core
//!
//! The core runs unattended against a noisy physical sensor, so every
//! variant here describes a condition the caller absorbs and moves past:
//! a dropped sample, a failed session, a rejected baseline. Nothing in
//! this module may abort the processing loop.
//!
//! Variants are small and `Copy` with `&'static str` reasons - errors
//! travel through event buffers and must not allocate.
//!
//! Numeric edge cases (division by zero, log of zero) are deliberately
//! absent: the absorbance transform resolves them by clipping and
//! flooring, never by reporting an error.

use thiserror_no_std::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, TelemetryError>;

/// Faults the telemetry core can report
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    /// Malformed or missing channel data, rejected at the boundary
    #[error("sample rejected at boundary: {reason}")]
    InputFault {
        /// What made the payload unusable
        reason: &'static str,
    },

    /// A calibration session ended without producing a baseline
    #[error("calibration failed: {reason}")]
    CalibrationFault {
        /// Why the session could not complete
        reason: &'static str,
    },

    /// Baseline replacement rejected
    ///
    /// The only way a fixed-size spectrum can be unusable as a baseline
    /// is a non-finite component.
    #[error("baseline rejected: vector contains a non-finite component")]
    InvalidBaseline,
}
