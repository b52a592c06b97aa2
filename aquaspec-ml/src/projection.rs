//! Two-component principal projection
//!
//! A small, deterministic PCA: sample covariance of the centered
//! training rows, then power iteration with deflation for the two
//! dominant eigenvectors. The covariance matrix is symmetric positive
//! semi-definite, so power iteration converges to the dominant component
//! from any starting vector that is not orthogonal to it; the fixed
//! all-ones start plus a sign convention (first significant loading is
//! positive) makes refits reproducible bit-for-bit on identical data.
//!
//! Degenerate training data (all rows identical) yields zero
//! eigenvalues; the affected component is stored as the zero vector and
//! every projection lands on that axis's origin. This mirrors the
//! contract that retraining on degenerate data succeeds and projections
//! stay finite.

use serde::{Deserialize, Serialize};

use crate::{ModelError, ModelResult};

/// Number of retained components
pub const COMPONENTS: usize = 2;

/// Power-iteration budget per component
const MAX_ITERATIONS: usize = 256;

/// Convergence threshold on the iterate delta
const CONVERGENCE_EPS: f32 = 1e-7;

/// Eigenvalues below this are treated as zero variance
const NEGLIGIBLE_EIGENVALUE: f32 = 1e-9;

/// Loadings below this are ignored by the sign convention
const SIGN_EPS: f32 = 1e-6;

/// Fitted projection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanarProjection {
    mean: Vec<f32>,
    components: Vec<Vec<f32>>,
}

impl PlanarProjection {
    /// Fit the projection over every row of the (scaled) training set
    pub fn fit(rows: &[Vec<f32>]) -> ModelResult<Self> {
        if rows.len() < COMPONENTS {
            return Err(ModelError::InsufficientData {
                required: COMPONENTS,
                available: rows.len(),
            });
        }
        let dimension = rows[0].len();
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

        // sample covariance of the centered rows
        let mut covariance = vec![vec![0.0f32; dimension]; dimension];
        for row in rows {
            for i in 0..dimension {
                let di = row[i] - mean[i];
                for j in i..dimension {
                    let dj = row[j] - mean[j];
                    covariance[i][j] += di * dj;
                }
            }
        }
        let denominator = (rows.len() - 1) as f32;
        for i in 0..dimension {
            for j in i..dimension {
                let value = covariance[i][j] / denominator;
                covariance[i][j] = value;
                covariance[j][i] = value;
            }
        }

        let mut components = Vec::with_capacity(COMPONENTS);
        for _ in 0..COMPONENTS {
            let (component, eigenvalue) = dominant_eigenvector(&covariance);
            deflate(&mut covariance, &component, eigenvalue);
            components.push(component);
        }

        Ok(Self { mean, components })
    }

    /// Dimension this projection was fitted with
    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    /// Project one (scaled) vector onto the two components
    pub fn transform(&self, row: &[f32]) -> ModelResult<(f32, f32)> {
        if row.len() != self.mean.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.mean.len(),
                actual: row.len(),
            });
        }
        let mut coords = [0.0f32; COMPONENTS];
        for (coord, component) in coords.iter_mut().zip(self.components.iter()) {
            *coord = row
                .iter()
                .zip(self.mean.iter())
                .zip(component.iter())
                .map(|((value, mean), loading)| (value - mean) * loading)
                .sum();
        }
        Ok((coords[0], coords[1]))
    }
}

/// Dominant eigenpair of a symmetric PSD matrix by power iteration
///
/// Returns the zero vector with eigenvalue 0.0 when the matrix carries
/// no remaining variance.
fn dominant_eigenvector(matrix: &[Vec<f32>]) -> (Vec<f32>, f32) {
    let dimension = matrix.len();
    let start = 1.0 / libm::sqrtf(dimension as f32);
    let mut vector = vec![start; dimension];

    for _ in 0..MAX_ITERATIONS {
        let mut next = multiply(matrix, &vector);
        let norm = libm::sqrtf(next.iter().map(|v| v * v).sum());
        if norm < NEGLIGIBLE_EIGENVALUE {
            return (vec![0.0; dimension], 0.0);
        }
        for value in next.iter_mut() {
            *value /= norm;
        }
        let delta = next
            .iter()
            .zip(vector.iter())
            .map(|(a, b)| libm::fabsf(a - b))
            .fold(0.0f32, f32::max);
        vector = next;
        if delta < CONVERGENCE_EPS {
            break;
        }
    }

    // Rayleigh quotient; the iterate is unit length
    let image = multiply(matrix, &vector);
    let eigenvalue: f32 = image.iter().zip(vector.iter()).map(|(a, b)| a * b).sum();

    apply_sign_convention(&mut vector);
    (vector, eigenvalue)
}

fn multiply(matrix: &[Vec<f32>], vector: &[f32]) -> Vec<f32> {
    matrix
        .iter()
        .map(|row| row.iter().zip(vector.iter()).map(|(m, v)| m * v).sum())
        .collect()
}

/// Flip the component so its first significant loading is positive
fn apply_sign_convention(component: &mut [f32]) {
    let flip = component
        .iter()
        .find(|value| libm::fabsf(**value) > SIGN_EPS)
        .map(|value| *value < 0.0)
        .unwrap_or(false);
    if flip {
        for value in component.iter_mut() {
            *value = -*value;
        }
    }
}

/// Remove a captured component: `M -= lambda * v * v^T`
fn deflate(matrix: &mut [Vec<f32>], component: &[f32], eigenvalue: f32) {
    for (i, row) in matrix.iter_mut().enumerate() {
        for (j, slot) in row.iter_mut().enumerate() {
            *slot -= eigenvalue * component[i] * component[j];
        }
    }
}
