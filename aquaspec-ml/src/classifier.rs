//! Nearest-neighbor classifier
//!
//! Classic k-NN over the scaled training rows: Euclidean distance,
//! majority vote over the k nearest, ties broken in favor of the
//! closest tied label. Distances compare in squared space (the square
//! root changes nothing about ordering), and equal distances fall back
//! to insertion order so predictions are deterministic.

use serde::{Deserialize, Serialize};

use crate::{ModelError, ModelResult};

/// Fitted classifier: the training rows are the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestNeighbors {
    k: usize,
    features: Vec<Vec<f32>>,
    labels: Vec<String>,
}

impl NearestNeighbors {
    /// Fit over the full (scaled) training set
    ///
    /// `k` is clamped to the number of rows at prediction time, so a
    /// small early training set still answers.
    pub fn fit(k: usize, features: Vec<Vec<f32>>, labels: Vec<String>) -> ModelResult<Self> {
        if features.len() != labels.len() {
            return Err(ModelError::LengthMismatch {
                features: features.len(),
                labels: labels.len(),
            });
        }
        let first = features.first().ok_or(ModelError::InsufficientData {
            required: 1,
            available: 0,
        })?;
        let dimension = first.len();
        for row in &features {
            if row.len() != dimension {
                return Err(ModelError::DimensionMismatch {
                    expected: dimension,
                    actual: row.len(),
                });
            }
        }
        Ok(Self {
            k: k.max(1),
            features,
            labels,
        })
    }

    /// Number of stored training rows
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// True when no rows are stored (unreachable through `fit`)
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Configured neighbor count
    pub fn k(&self) -> usize {
        self.k
    }

    /// Predict the label for one (scaled) vector
    pub fn predict(&self, row: &[f32]) -> ModelResult<String> {
        // fit() refuses empty sets, but a snapshot restored from disk is
        // not guaranteed to have gone through fit()
        let first = self.features.first().ok_or(ModelError::InsufficientData {
            required: 1,
            available: 0,
        })?;
        let dimension = first.len();
        if row.len() != dimension {
            return Err(ModelError::DimensionMismatch {
                expected: dimension,
                actual: row.len(),
            });
        }

        let mut ranked: Vec<(f32, usize)> = self
            .features
            .iter()
            .enumerate()
            .map(|(index, candidate)| (squared_distance(row, candidate), index))
            .collect();
        ranked.sort_unstable_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(core::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });

        let neighbors = self.k.min(ranked.len());
        // vote entries keep nearest-first order, so ties resolve to the
        // label holding the closest neighbor
        let mut votes: Vec<(&str, usize)> = Vec::with_capacity(neighbors);
        for &(_, index) in ranked.iter().take(neighbors) {
            let label = self.labels[index].as_str();
            match votes.iter_mut().find(|(seen, _)| *seen == label) {
                Some((_, count)) => *count += 1,
                None => votes.push((label, 1)),
            }
        }

        let mut winner = votes[0];
        for &vote in &votes[1..] {
            if vote.1 > winner.1 {
                winner = vote;
            }
        }
        Ok(winner.0.to_owned())
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_clusters() -> NearestNeighbors {
        let features = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.1],
            vec![0.2, 0.0],
            vec![5.0, 5.0],
            vec![5.1, 4.9],
            vec![4.9, 5.1],
        ];
        let labels = vec![
            "Clean".to_owned(),
            "Clean".to_owned(),
            "Clean".to_owned(),
            "Chlorine".to_owned(),
            "Chlorine".to_owned(),
            "Chlorine".to_owned(),
        ];
        NearestNeighbors::fit(3, features, labels).unwrap()
    }

    #[test]
    fn votes_follow_the_cluster() {
        let knn = two_clusters();
        assert_eq!(knn.predict(&[0.05, 0.05]).unwrap(), "Clean");
        assert_eq!(knn.predict(&[5.0, 5.05]).unwrap(), "Chlorine");
    }

    #[test]
    fn k_clamps_to_available_rows() {
        let knn = NearestNeighbors::fit(
            3,
            vec![vec![1.0]],
            vec!["Only".to_owned()],
        )
        .unwrap();
        assert_eq!(knn.predict(&[0.0]).unwrap(), "Only");
    }

    #[test]
    fn tie_resolves_to_nearest() {
        // k=2 with one vote each: the closer row wins
        let knn = NearestNeighbors::fit(
            2,
            vec![vec![0.0], vec![1.0]],
            vec!["Near".to_owned(), "Far".to_owned()],
        )
        .unwrap();
        assert_eq!(knn.predict(&[0.2]).unwrap(), "Near");
    }

    #[test]
    fn length_mismatch_is_rejected() {
        assert_eq!(
            NearestNeighbors::fit(3, vec![vec![1.0]], vec![]),
            Err(ModelError::LengthMismatch {
                features: 1,
                labels: 0
            })
        );
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let knn = two_clusters();
        assert!(matches!(
            knn.predict(&[1.0]),
            Err(ModelError::DimensionMismatch { .. })
        ));
    }
}
