//! Spectrum vectors keyed by the fixed channel set
//!
//! `SpectrumVector` is the one numeric carrier in the system: raw
//! intensities, baselines and absorbance values all use it. It is a plain
//! `[f32; 18]` newtype so it stays `Copy`, stack-allocated and cheap to
//! hand through event queues.

use crate::channels::{channel_index, CHANNEL_COUNT, CHANNEL_NAMES};

/// Millisecond timestamp, as stamped by the ingest boundary
pub type Timestamp = u64;

/// Round a value to the given number of decimal places
///
/// Uses `libm` so the same code path serves `std` and `no_std` builds.
pub fn round_to(value: f32, decimals: u32) -> f32 {
    let mut factor = 1.0f32;
    for _ in 0..decimals {
        factor *= 10.0;
    }
    libm::roundf(value * factor) / factor
}

/// Fixed-order numeric vector over the channel set
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpectrumVector([f32; CHANNEL_COUNT]);

impl SpectrumVector {
    /// Wrap an already-ordered channel array
    pub const fn from_array(values: [f32; CHANNEL_COUNT]) -> Self {
        Self(values)
    }

    /// Vector with the same value in every channel
    pub const fn splat(value: f32) -> Self {
        Self([value; CHANNEL_COUNT])
    }

    /// Build from (name, value) pairs with a per-domain default
    ///
    /// Unknown names are ignored; channels absent from the input keep
    /// `default`. This is the only way device payloads enter the system,
    /// so the lookup must stay total.
    pub fn from_pairs<'a, I>(pairs: I, default: f32) -> Self
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let mut values = [default; CHANNEL_COUNT];
        for (name, value) in pairs {
            if let Some(idx) = channel_index(name) {
                values[idx] = value;
            }
        }
        Self(values)
    }

    /// Value for a named channel
    pub fn get(&self, name: &str) -> Option<f32> {
        channel_index(name).map(|idx| self.0[idx])
    }

    /// The ordered channel values
    pub const fn as_array(&self) -> &[f32; CHANNEL_COUNT] {
        &self.0
    }

    /// Iterate (name, value) pairs in channel order
    pub fn iter_named(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        CHANNEL_NAMES.iter().copied().zip(self.0.iter().copied())
    }

    /// True when every component is a finite number
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Per-channel arithmetic mean over a set of vectors, rounded to
    /// 2 decimal places
    ///
    /// Returns `None` for an empty slice; averaging nothing is the
    /// degenerate calibration case and must not fabricate a vector.
    pub fn mean(vectors: &[Self]) -> Option<Self> {
        if vectors.is_empty() {
            return None;
        }
        let mut acc = [0.0f32; CHANNEL_COUNT];
        for vector in vectors {
            for (slot, value) in acc.iter_mut().zip(vector.0.iter()) {
                *slot += value;
            }
        }
        let count = vectors.len() as f32;
        let mut out = [0.0f32; CHANNEL_COUNT];
        for (slot, sum) in out.iter_mut().zip(acc.iter()) {
            *slot = round_to(sum / count, 2);
        }
        Some(Self(out))
    }
}

/// A single raw reading received from the device
///
/// Immutable once constructed; dropped after processing except while held
/// in an active calibration buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    /// Raw channel intensities
    pub spectrum: SpectrumVector,
    /// Capture timestamp stamped at the ingest boundary
    pub timestamp: Timestamp,
}

impl RawSample {
    /// Create a sample from an already-decoded spectrum
    pub const fn new(spectrum: SpectrumVector, timestamp: Timestamp) -> Self {
        Self { spectrum, timestamp }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::RAW_DEFAULT;

    #[test]
    fn from_pairs_fills_defaults_and_ignores_unknowns() {
        let v = SpectrumVector::from_pairs(
            [("A_410nm", 200.0), ("bogus", 7.0), ("L_940nm", 50.0)],
            RAW_DEFAULT,
        );
        assert_eq!(v.get("A_410nm"), Some(200.0));
        assert_eq!(v.get("L_940nm"), Some(50.0));
        assert_eq!(v.get("B_435nm"), Some(RAW_DEFAULT));
        assert_eq!(v.get("bogus"), None);
    }

    #[test]
    fn mean_is_exact_for_constant_input() {
        let vs = [SpectrumVector::splat(100.0); 5];
        let mean = SpectrumVector::mean(&vs).unwrap();
        assert_eq!(mean, SpectrumVector::splat(100.0));
    }

    #[test]
    fn mean_rounds_to_two_decimals() {
        let vs = [
            SpectrumVector::splat(1.0),
            SpectrumVector::splat(2.0),
            SpectrumVector::splat(2.0),
        ];
        let mean = SpectrumVector::mean(&vs).unwrap();
        // 5/3 = 1.666... -> 1.67
        assert!((mean.as_array()[0] - 1.67).abs() < 1e-6);
    }

    #[test]
    fn mean_of_nothing_is_none() {
        assert_eq!(SpectrumVector::mean(&[]), None);
    }

    #[test]
    fn round_to_places() {
        assert_eq!(round_to(1.23456, 4), 1.2346);
        assert_eq!(round_to(-0.00004, 4), 0.0);
        assert_eq!(round_to(100.0 / 3.0, 2), 33.33);
    }
}
