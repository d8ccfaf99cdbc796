//! Distance metrics for dense vector comparison.
//!
//! The set of supported metrics is small and fixed, so it is modeled as a
//! closed enum rather than a trait object. [`DistanceMetric::distance`]
//! validates dimensions and is the public entry point;
//! [`DistanceMetric::compute`] is the unchecked hot path used by the index,
//! whose inputs are rows of a single store and therefore always agree on
//! length.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VantageError};

/// Distance metrics for vector similarity calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Euclidean (L2) distance.
    #[default]
    Euclidean,
    /// Cosine distance (1 - cosine similarity).
    Cosine,
    /// Manhattan (L1) distance.
    Manhattan,
}

impl DistanceMetric {
    /// Calculate the distance between two vectors using this metric.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        if a.len() != b.len() {
            return Err(VantageError::dimension_mismatch(a.len(), b.len()));
        }
        Ok(self.compute(a, b))
    }

    /// Distance between two equal-length vectors.
    ///
    /// Callers must have validated dimensions; rows handed out by a
    /// [`VectorStore`](crate::store::VectorStore) always satisfy this.
    pub fn compute(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());

        match self {
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f32>()
                .sqrt(),
            DistanceMetric::Cosine => {
                let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0 // Maximum distance for zero vectors
                } else {
                    1.0 - (dot_product / (norm_a * norm_b))
                }
            }
            DistanceMetric::Manhattan => {
                a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
            }
        }
    }

    /// Get the name of this distance metric.
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Manhattan => "manhattan",
        }
    }

    /// Parse a distance metric from a string.
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "cosine" => Ok(DistanceMetric::Cosine),
            "manhattan" | "l1" => Ok(DistanceMetric::Manhattan),
            _ => Err(VantageError::invalid_argument(format!(
                "unknown distance metric: {s}"
            ))),
        }
    }
}

/// Check that a vector contains only finite values (no NaN or infinity).
pub fn is_finite(data: &[f32]) -> bool {
    data.iter().all(|x| x.is_finite())
}
