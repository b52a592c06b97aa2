//! Model lifecycle and persistence
//!
//! ## Overview
//!
//! [`ModelStore`] owns everything the model subsystem must remember:
//! the growing labeled training set, the fitted scaler/projection/
//! classifier, the `is_trained` flag and a mirror of the live baseline.
//! All of it serializes as one JSON blob so a restart restores the exact
//! model that was running before.
//!
//! ## Retraining
//!
//! `add_labeled_sample` appends and, once the set holds
//! [`MIN_TRAINING_SAMPLES`] rows, performs a complete refit. Fits are
//! staged into locals and committed only when every stage succeeded, so
//! a failed retrain leaves the previous model (and `is_trained`)
//! untouched while the appended sample stays in the training set.
//!
//! ## Persistence policy
//!
//! Writes go through a temp file and rename, so the blob on disk is
//! always either the old snapshot or the new one. A missing blob on
//! load is the documented fresh-install state; an unreadable one is
//! logged and ignored. Save failures are logged and not retried - the
//! in-memory model keeps serving either way.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use aquaspec_core::{
    spectrum::round_to,
    traits::{Classification, Projection, SpectralModel},
    SpectrumVector,
};

use crate::{
    classifier::NearestNeighbors, projection::PlanarProjection, scaler::StandardScaler,
    ModelError, ModelResult,
};

/// Training-set size that arms retraining
pub const MIN_TRAINING_SAMPLES: usize = 3;

/// Neighbor count for the classifier
pub const NEIGHBORS: usize = 3;

/// Decimal places kept on projected coordinates
const COORD_DECIMALS: u32 = 3;

/// The complete persisted state, one atomic unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    /// Live baseline mirror (None until first calibration)
    pub baseline: Option<SpectrumVector>,
    /// Accumulated feature rows
    pub training_features: Vec<Vec<f32>>,
    /// Labels, index-aligned with the feature rows
    pub training_labels: Vec<String>,
    /// Whether at least one retrain has succeeded
    pub is_trained: bool,
    /// Fitted scaler parameters
    pub scaler: Option<StandardScaler>,
    /// Fitted projection parameters
    pub projection: Option<PlanarProjection>,
    /// Fitted classifier parameters
    pub classifier: Option<NearestNeighbors>,
}

/// Owns the model artifacts and their durable snapshot
#[derive(Debug, Default)]
pub struct ModelStore {
    path: Option<PathBuf>,
    state: ModelSnapshot,
}

impl ModelStore {
    /// In-memory store with no durable backing
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backed by a snapshot file (not read yet)
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            state: ModelSnapshot::default(),
        }
    }

    /// Open a store, restoring the snapshot when one exists
    ///
    /// Never fails: a missing blob is the fresh-install state and an
    /// unreadable one is logged and replaced by defaults.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::with_path(path);
        match store.load() {
            Ok(true) => log::info!(
                "model state restored: {} training samples, trained={}",
                store.training_len(),
                store.is_trained()
            ),
            Ok(false) => log::info!("no persisted model state; starting fresh"),
            Err(err) => log::warn!("persisted model state unusable, using defaults: {}", err),
        }
        store
    }

    /// The full current state
    pub fn snapshot(&self) -> &ModelSnapshot {
        &self.state
    }

    /// Baseline mirror carried in the snapshot
    pub fn baseline(&self) -> Option<&SpectrumVector> {
        self.state.baseline.as_ref()
    }

    /// True once a retrain has succeeded
    pub fn is_trained(&self) -> bool {
        self.state.is_trained
    }

    /// Number of accumulated training samples
    pub fn training_len(&self) -> usize {
        self.state.training_features.len()
    }

    /// Append one labeled sample, retraining when the set is large enough
    ///
    /// Returns whether a retrain ran. The sample stays in the training
    /// set even when the retrain it triggered fails.
    pub fn add_labeled_sample(
        &mut self,
        features: &SpectrumVector,
        label: &str,
    ) -> ModelResult<bool> {
        self.state
            .training_features
            .push(features.as_array().to_vec());
        self.state.training_labels.push(label.to_owned());

        if self.state.training_features.len() < MIN_TRAINING_SAMPLES {
            return Ok(false);
        }
        self.retrain()?;
        if let Err(err) = self.save() {
            log::warn!("model snapshot not persisted: {}", err);
        }
        Ok(true)
    }

    /// Refit scaler, projection and classifier from the full training set
    ///
    /// Commits nothing until every fit has succeeded.
    pub fn retrain(&mut self) -> ModelResult<()> {
        let features = &self.state.training_features;
        let labels = &self.state.training_labels;
        if features.len() < MIN_TRAINING_SAMPLES {
            return Err(ModelError::InsufficientData {
                required: MIN_TRAINING_SAMPLES,
                available: features.len(),
            });
        }
        if features.len() != labels.len() {
            return Err(ModelError::LengthMismatch {
                features: features.len(),
                labels: labels.len(),
            });
        }

        let scaler = StandardScaler::fit(features)?;
        let mut scaled = Vec::with_capacity(features.len());
        for row in features {
            scaled.push(scaler.transform(row)?);
        }
        let projection = PlanarProjection::fit(&scaled)?;
        let classifier = NearestNeighbors::fit(NEIGHBORS, scaled, labels.clone())?;

        self.state.scaler = Some(scaler);
        self.state.projection = Some(projection);
        self.state.classifier = Some(classifier);
        self.state.is_trained = true;
        Ok(())
    }

    /// Write the snapshot atomically (temp file + rename)
    ///
    /// A store without a path is explicitly in-memory; saving it is a
    /// no-op, not an error.
    pub fn save(&self) -> ModelResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec(&self.state)
            .map_err(|err| ModelError::Persistence(err.to_string()))?;
        let staging = staging_path(path);
        fs::write(&staging, &bytes).map_err(|err| ModelError::Persistence(err.to_string()))?;
        fs::rename(&staging, path).map_err(|err| ModelError::Persistence(err.to_string()))?;
        Ok(())
    }

    /// Read the snapshot back; `Ok(false)` means fresh install
    ///
    /// On any failure the in-memory state is left exactly as it was.
    pub fn load(&mut self) -> ModelResult<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(ModelError::Persistence(err.to_string())),
        };
        let snapshot: ModelSnapshot = serde_json::from_slice(&bytes)
            .map_err(|err| ModelError::Persistence(err.to_string()))?;
        if snapshot.training_features.len() != snapshot.training_labels.len() {
            return Err(ModelError::Persistence(
                "feature/label count mismatch in snapshot".to_owned(),
            ));
        }
        self.state = snapshot;
        Ok(true)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "model".into());
    name.push(".tmp");
    path.with_file_name(name)
}

impl SpectralModel for ModelStore {
    fn observe(&mut self, features: &SpectrumVector, label: &str) {
        match self.add_labeled_sample(features, label) {
            Ok(true) => log::debug!("model retrained on {} samples", self.training_len()),
            Ok(false) => {}
            Err(err) => log::warn!("labeled sample kept but retrain failed: {}", err),
        }
    }

    fn project(&self, features: &SpectrumVector) -> Projection {
        if !self.state.is_trained {
            return Projection::Untrained;
        }
        let (Some(scaler), Some(projection)) = (&self.state.scaler, &self.state.projection)
        else {
            return Projection::Untrained;
        };
        let scaled = match scaler.transform(features.as_array()) {
            Ok(scaled) => scaled,
            Err(err) => {
                log::debug!("projection degraded to origin: {}", err);
                return Projection::Untrained;
            }
        };
        match projection.transform(&scaled) {
            Ok((pc1, pc2)) => Projection::Trained {
                pc1: round_to(pc1, COORD_DECIMALS),
                pc2: round_to(pc2, COORD_DECIMALS),
            },
            Err(err) => {
                log::debug!("projection degraded to origin: {}", err);
                Projection::Untrained
            }
        }
    }

    fn classify(&self, features: &SpectrumVector) -> Classification {
        if !self.state.is_trained {
            return Classification::Untrained;
        }
        let (Some(scaler), Some(classifier)) = (&self.state.scaler, &self.state.classifier)
        else {
            return Classification::Failed;
        };
        let scaled = match scaler.transform(features.as_array()) {
            Ok(scaled) => scaled,
            Err(err) => {
                log::warn!("classification failed: {}", err);
                return Classification::Failed;
            }
        };
        match classifier.predict(&scaled) {
            Ok(label) => Classification::Label(label),
            Err(err) => {
                log::warn!("classification failed: {}", err);
                Classification::Failed
            }
        }
    }

    fn baseline_updated(&mut self, baseline: &SpectrumVector) {
        self.state.baseline = Some(*baseline);
        if let Err(err) = self.save() {
            log::warn!("baseline not persisted: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(seed: f32) -> SpectrumVector {
        let mut values = [0.0f32; aquaspec_core::channels::CHANNEL_COUNT];
        for (i, slot) in values.iter_mut().enumerate() {
            *slot = seed + i as f32 * 0.1;
        }
        SpectrumVector::from_array(values)
    }

    #[test]
    fn untrained_store_degrades_cleanly() {
        let store = ModelStore::new();
        let v = spectrum(1.0);
        assert_eq!(store.project(&v), Projection::Untrained);
        assert_eq!(store.classify(&v), Classification::Untrained);
        assert!(!store.is_trained());
    }

    #[test]
    fn third_sample_arms_the_model() {
        let mut store = ModelStore::new();
        assert_eq!(store.add_labeled_sample(&spectrum(0.1), "Clean").unwrap(), false);
        assert_eq!(store.add_labeled_sample(&spectrum(0.2), "Clean").unwrap(), false);
        assert!(!store.is_trained());

        assert_eq!(store.add_labeled_sample(&spectrum(5.0), "Chlorine").unwrap(), true);
        assert!(store.is_trained());
        assert_eq!(store.training_len(), 3);
    }

    #[test]
    fn refit_on_identical_data_keeps_trained_flag() {
        let mut store = ModelStore::new();
        for _ in 0..3 {
            store.add_labeled_sample(&spectrum(1.0), "Clean").unwrap();
        }
        assert!(store.is_trained());
        // identical fourth sample: still a full refit, flag unchanged
        assert_eq!(store.add_labeled_sample(&spectrum(1.0), "Clean").unwrap(), true);
        assert!(store.is_trained());
        assert_eq!(store.training_len(), 4);
    }

    #[test]
    fn classifies_toward_the_taught_cluster() {
        let mut store = ModelStore::new();
        store.add_labeled_sample(&spectrum(0.1), "Clean").unwrap();
        store.add_labeled_sample(&spectrum(0.2), "Clean").unwrap();
        store.add_labeled_sample(&spectrum(0.15), "Clean").unwrap();
        store.add_labeled_sample(&spectrum(8.0), "Chlorine").unwrap();
        store.add_labeled_sample(&spectrum(8.2), "Chlorine").unwrap();

        assert_eq!(
            store.classify(&spectrum(0.12)),
            Classification::Label("Clean".to_owned())
        );
        assert_eq!(
            store.classify(&spectrum(8.1)),
            Classification::Label("Chlorine".to_owned())
        );
    }

    #[test]
    fn projection_is_rounded_and_finite() {
        let mut store = ModelStore::new();
        for i in 0..6 {
            let label = if i < 3 { "Clean" } else { "Chlorine" };
            store
                .add_labeled_sample(&spectrum(i as f32), label)
                .unwrap();
        }
        match store.project(&spectrum(2.5)) {
            Projection::Trained { pc1, pc2 } => {
                assert!(pc1.is_finite() && pc2.is_finite());
                assert_eq!(pc1, round_to(pc1, 3));
                assert_eq!(pc2, round_to(pc2, 3));
            }
            Projection::Untrained => panic!("model should be trained"),
        }
    }

    #[test]
    fn save_without_path_is_a_no_op() {
        let store = ModelStore::new();
        assert_eq!(store.save(), Ok(()));
    }

    #[test]
    fn baseline_mirror_updates() {
        let mut store = ModelStore::new();
        assert_eq!(store.baseline(), None);
        let baseline = SpectrumVector::splat(120.0);
        store.baseline_updated(&baseline);
        assert_eq!(store.baseline(), Some(&baseline));
    }
}
