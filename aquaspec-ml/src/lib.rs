//! Online spectral-fingerprint model for AquaSpec
//!
//! ## Overview
//!
//! This crate turns accumulated labeled absorbance vectors into two
//! derived artifacts:
//!
//! - a 2-D projection (principal components) for visualizing where the
//!   current water sample sits relative to everything taught so far
//! - a nearest-neighbor classifier mapping a spectrum to a previously
//!   taught label
//!
//! ## Why full refits?
//!
//! The model is deliberately NOT incrementally updated. Every qualifying
//! training-set growth triggers a complete refit of scaler, projection
//! and classifier, which makes the model a pure function of the training
//! set at the time of the last retrain - a property the tests lean on
//! and downstream consumers may rely on. At 18 features and a
//! process-lifetime training set measured in hundreds of rows, a full
//! refit costs well under a millisecond; there is nothing to optimize.
//!
//! ## Failure containment
//!
//! Inference never propagates a failure into the telemetry loop. An
//! untrained or broken model degrades to the tagged sentinel variants
//! defined by `aquaspec-core`, and a failed retrain leaves the previous
//! model in place.
//!
//! ## Memory model
//!
//! Everything is `Vec<f32>` rows; no linear-algebra dependency. The
//! covariance matrix for the projection is 18x18 and the power-iteration
//! eigensolver is a page of code - a dense-linalg crate would be the
//! heaviest dependency in the workspace for two eigenvectors.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use core::fmt;

pub mod classifier;
pub mod projection;
pub mod scaler;
pub mod store;

pub use classifier::NearestNeighbors;
pub use projection::PlanarProjection;
pub use scaler::StandardScaler;
pub use store::{ModelSnapshot, ModelStore, MIN_TRAINING_SAMPLES, NEIGHBORS};

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Model errors - reported, never fatal to the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Not enough training rows for the requested fit
    InsufficientData {
        /// Minimum rows required
        required: usize,
        /// Rows actually available
        available: usize,
    },
    /// Input vector length does not match the fitted dimension
    DimensionMismatch {
        /// Dimension the model was fitted with
        expected: usize,
        /// Dimension of the offending input
        actual: usize,
    },
    /// Training features and labels have diverged in length
    LengthMismatch {
        /// Number of feature rows
        features: usize,
        /// Number of labels
        labels: usize,
    },
    /// The persistent store could not be read or written
    Persistence(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InsufficientData {
                required,
                available,
            } => write!(f, "need {} training samples, have {}", required, available),
            ModelError::DimensionMismatch { expected, actual } => {
                write!(f, "expected {} features, got {}", expected, actual)
            }
            ModelError::LengthMismatch { features, labels } => {
                write!(f, "{} feature rows vs {} labels", features, labels)
            }
            ModelError::Persistence(detail) => write!(f, "persistence failed: {}", detail),
        }
    }
}

impl std::error::Error for ModelError {}
