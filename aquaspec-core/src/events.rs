//! Event types crossing the core's boundaries
//!
//! ## Overview
//!
//! Three kinds of traffic meet the core:
//!
//! 1. **Inbound samples** - [`crate::spectrum::RawSample`], decoded by the
//!    transport collaborator.
//! 2. **Inbound commands** - [`Command`], decoded from cloud RPC by the
//!    transport collaborator. The core interprets `SetTarget` and
//!    `Calibrate` itself; device-mode commands pass through untouched.
//! 3. **Outbound events** - [`OutboundEvent`], everything the pipeline
//!    asks the collaborators to deliver: device instructions, telemetry
//!    records, calibration results.
//!
//! ## Delivery semantics
//!
//! The per-step calibration instruction ([`DeviceCommand::TakeReading`])
//! is ephemeral: a missed delivery stalls the session rather than being
//! queued for a sleeping device. Mode pass-throughs are retained so the
//! device picks them up on its next connect. [`DeviceCommand::is_ephemeral`]
//! carries that distinction to the transport.
//!
//! A calibration result is pipeline metadata. It must never reach the
//! telemetry sink as a normal sample, which is why it is its own
//! [`OutboundEvent`] variant instead of a field smuggled into a record.

use crate::{
    spectrum::{SpectrumVector, Timestamp},
    traits::{Classification, Projection},
};

#[cfg(not(feature = "std"))]
use alloc::string::String;

/// Instructions forwarded to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Take one reading now (calibration ping-pong step)
    TakeReading,
    /// Return to idle mode
    SetIdle,
    /// Enter continuous training-mode sampling
    StartTraining,
    /// Sleep for the given number of seconds
    DeepSleep {
        /// Sleep duration in seconds
        duration_sec: u32,
    },
    /// Take a single operator-requested measurement
    SingleMeasure,
    /// Start an over-the-air firmware update
    StartOta,
}

impl DeviceCommand {
    /// Wire name of the command
    pub const fn name(&self) -> &'static str {
        match self {
            DeviceCommand::TakeReading => "single_measure",
            DeviceCommand::SetIdle => "idle",
            DeviceCommand::StartTraining => "training_mode",
            DeviceCommand::DeepSleep { .. } => "deep_sleep",
            DeviceCommand::SingleMeasure => "single_measure",
            DeviceCommand::StartOta => "ota",
        }
    }

    /// True when the command must NOT be retained by the transport
    ///
    /// Calibration reads are only meaningful while the session is live;
    /// everything else waits for a sleeping device.
    pub const fn is_ephemeral(&self) -> bool {
        matches!(self, DeviceCommand::TakeReading)
    }
}

/// Commands addressed to the core, already decoded from cloud RPC
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Update the ambient label used to tag subsequent samples
    ///
    /// `None` clears the label and stops online learning.
    SetTarget(Option<String>),
    /// Start a calibration session collecting `target` samples
    Calibrate {
        /// Number of accepted samples required
        target: u32,
    },
    /// Pass a device-mode command through unchanged
    Device(DeviceCommand),
}

/// One assembled telemetry record, emitted per processed sample
///
/// Field-name separation between raw and derived channels is a fixed
/// namespace convention applied at serialization time (absorbance under
/// the channel names, raw under a `raw_` prefix), not a runtime
/// negotiation.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    /// Capture timestamp of the underlying sample
    pub timestamp: Timestamp,
    /// Raw channel intensities as received
    pub raw: SpectrumVector,
    /// Absorbance vector (or raw passthrough when uncalibrated)
    pub absorbance: SpectrumVector,
    /// Whether a baseline was applied
    pub calibrated: bool,
    /// Ambient label active when the sample was processed
    pub target_label: Option<String>,
    /// Classifier outcome
    pub classification: Classification,
    /// Projection outcome
    pub projection: Projection,
}

/// Everything the pipeline emits toward the collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    /// Deliver an instruction to the device
    Device(DeviceCommand),
    /// Deliver a telemetry record to the record sinks
    Record(TelemetryRecord),
    /// A calibration session finished; metadata, never a sample
    CalibrationFinished {
        /// Whether a new baseline was installed
        success: bool,
    },
}

impl OutboundEvent {
    /// True for telemetry records
    pub const fn is_record(&self) -> bool {
        matches!(self, OutboundEvent::Record(_))
    }

    /// True for device instructions
    pub const fn is_device_command(&self) -> bool {
        matches!(self, OutboundEvent::Device(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_calibration_reads_are_ephemeral() {
        assert!(DeviceCommand::TakeReading.is_ephemeral());
        assert!(!DeviceCommand::SetIdle.is_ephemeral());
        assert!(!DeviceCommand::DeepSleep { duration_sec: 60 }.is_ephemeral());
        assert!(!DeviceCommand::SingleMeasure.is_ephemeral());
    }

    #[test]
    fn wire_names() {
        assert_eq!(DeviceCommand::TakeReading.name(), "single_measure");
        assert_eq!(DeviceCommand::StartOta.name(), "ota");
        assert_eq!(
            DeviceCommand::DeepSleep { duration_sec: 600 }.name(),
            "deep_sleep"
        );
    }
}
