//! Per-feature standard scaler
//!
//! Centers each feature on its mean and divides by its standard
//! deviation (population variance, matching the conventional fit over
//! the full training set). Zero-variance features keep a scale of 1.0 so
//! a constant channel passes through centered instead of exploding.

use serde::{Deserialize, Serialize};

use crate::{ModelError, ModelResult};

/// Deviation below which a feature is treated as constant
const DEVIATION_FLOOR: f32 = 1e-12;

/// Fitted mean/scale parameters for one feature space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f32>,
    scale: Vec<f32>,
}

impl StandardScaler {
    /// Fit mean and scale over every row of the training set
    pub fn fit(rows: &[Vec<f32>]) -> ModelResult<Self> {
        let first = rows.first().ok_or(ModelError::InsufficientData {
            required: 1,
            available: 0,
        })?;
        let dimension = first.len();
        for row in rows {
            if row.len() != dimension {
                return Err(ModelError::DimensionMismatch {
                    expected: dimension,
                    actual: row.len(),
                });
            }
        }

        let count = rows.len() as f32;
        let mut mean = vec![0.0f32; dimension];
        for row in rows {
            for (slot, value) in mean.iter_mut().zip(row.iter()) {
                *slot += value;
            }
        }
        for slot in mean.iter_mut() {
            *slot /= count;
        }

        let mut scale = vec![0.0f32; dimension];
        for row in rows {
            for ((slot, value), center) in scale.iter_mut().zip(row.iter()).zip(mean.iter()) {
                let diff = value - center;
                *slot += diff * diff;
            }
        }
        for slot in scale.iter_mut() {
            let deviation = libm::sqrtf(*slot / count);
            *slot = if deviation < DEVIATION_FLOOR { 1.0 } else { deviation };
        }

        Ok(Self { mean, scale })
    }

    /// Dimension this scaler was fitted with
    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    /// Scale one vector into standardized space
    pub fn transform(&self, row: &[f32]) -> ModelResult<Vec<f32>> {
        if row.len() != self.mean.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.mean.len(),
                actual: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(value, (mean, scale))| (value - mean) / scale)
            .collect())
    }
}
