//! Core telemetry engine for AquaSpec
//!
//! Converts raw multi-channel optical intensities into absorbance values,
//! runs the multi-sample calibration protocol against the probe, and
//! coordinates the per-sample processing pipeline.
//!
//! Key constraints:
//! - Every operation is total: a definite result plus a status, never a
//!   panic or an unhandled failure that stops the ingest loop
//! - Bounded buffers only in the sample path (calibration buffer, emission
//!   buffer)
//! - No NaN/Inf can escape the absorbance transform for any raw input
//!
//! ```no_run
//! use aquaspec_core::{TelemetryPipeline, NoModel, RawSample, SpectrumVector};
//!
//! let mut pipeline = TelemetryPipeline::new(NoModel);
//!
//! let sample = RawSample::new(SpectrumVector::splat(120.0), 0);
//! for event in pipeline.process_sample(sample) {
//!     // hand events to the transport collaborator
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod absorbance;
pub mod calibration;
pub mod channels;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod spectrum;
pub mod traits;

// Public API
pub use absorbance::{Absorbance, AbsorbanceEngine};
pub use calibration::{CalibrationSession, SessionState, SessionStep};
pub use errors::{CoreResult, TelemetryError};
pub use events::{Command, DeviceCommand, OutboundEvent, TelemetryRecord};
pub use pipeline::{Emitted, TelemetryPipeline};
pub use spectrum::{RawSample, SpectrumVector, Timestamp};
pub use traits::{Classification, NoModel, Projection, SpectralModel};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
