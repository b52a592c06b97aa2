//! The model seam and its tagged result types
//!
//! The pipeline talks to the projection/classification model through
//! [`SpectralModel`] so the core never depends on a particular
//! implementation. Degraded outcomes are explicit variants rather than
//! magic values - the wire rendering ("Unknown", "Error", `(0.0, 0.0)`)
//! happens at the reporting boundary, while callers and tests can still
//! inspect the real state.

use crate::spectrum::SpectrumVector;

#[cfg(not(feature = "std"))]
use alloc::string::String;

/// Label rendered for a classifier that has never been trained
pub const UNTRAINED_LABEL: &str = "Unknown";

/// Label rendered for a classifier that failed at inference time
pub const FAILED_LABEL: &str = "Error";

/// 2-D projection outcome
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// No model available (never trained, or projection failed at runtime)
    Untrained,
    /// Projected coordinates
    Trained {
        /// First principal coordinate
        pc1: f32,
        /// Second principal coordinate
        pc2: f32,
    },
}

impl Projection {
    /// Coordinates for reporting; the untrained sentinel is the origin
    pub const fn coords(&self) -> (f32, f32) {
        match self {
            Projection::Untrained => (0.0, 0.0),
            Projection::Trained { pc1, pc2 } => (*pc1, *pc2),
        }
    }

    /// True when real coordinates are carried
    pub const fn is_trained(&self) -> bool {
        matches!(self, Projection::Trained { .. })
    }
}

/// Classification outcome
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// The classifier has never been trained
    Untrained,
    /// Inference failed at runtime; previous model state is untouched
    Failed,
    /// Predicted label
    Label(String),
}

impl Classification {
    /// Label for reporting, with the documented sentinel strings
    pub fn label(&self) -> &str {
        match self {
            Classification::Untrained => UNTRAINED_LABEL,
            Classification::Failed => FAILED_LABEL,
            Classification::Label(label) => label,
        }
    }
}

/// Online projection + classification model as seen by the pipeline
///
/// Every method is total: implementations absorb their own failures and
/// answer with the degraded variants instead of propagating.
pub trait SpectralModel {
    /// Record one labeled feature vector for online learning
    ///
    /// Implementations retrain and persist on their own schedule; a
    /// failed retrain must leave the previous model intact.
    fn observe(&mut self, features: &SpectrumVector, label: &str);

    /// Project a feature vector to two coordinates
    fn project(&self, features: &SpectrumVector) -> Projection;

    /// Classify a feature vector
    fn classify(&self, features: &SpectrumVector) -> Classification;

    /// Notification that the baseline was replaced
    ///
    /// Implementations that persist state mirror the new baseline into
    /// their snapshot here.
    fn baseline_updated(&mut self, _baseline: &SpectrumVector) {}
}

/// Null model: never trains, always degraded
///
/// Lets the pipeline run without a model subsystem, and keeps tests of
/// the calibration/absorbance path independent of model behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoModel;

impl SpectralModel for NoModel {
    fn observe(&mut self, _features: &SpectrumVector, _label: &str) {}

    fn project(&self, _features: &SpectrumVector) -> Projection {
        Projection::Untrained
    }

    fn classify(&self, _features: &SpectrumVector) -> Classification {
        Classification::Untrained
    }
}
