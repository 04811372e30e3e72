use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::DomainError;

/// Dissimilarity function a store is built with. Fixed for the store's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Angular,
    Euclidean,
    Manhattan,
    Hamming,
    Dot,
}

impl DistanceMetric {
    pub const ALL: [DistanceMetric; 5] = [
        DistanceMetric::Angular,
        DistanceMetric::Euclidean,
        DistanceMetric::Manhattan,
        DistanceMetric::Hamming,
        DistanceMetric::Dot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Angular => "angular",
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Manhattan => "manhattan",
            DistanceMetric::Hamming => "hamming",
            DistanceMetric::Dot => "dot",
        }
    }

    /// Distance between two vectors of equal length. Lower means more similar
    /// for every metric; `Dot` reports the negated inner product.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Angular => {
                let cos = cosine_similarity(a, b);
                (2.0 - 2.0 * cos).max(0.0).sqrt()
            }
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
            DistanceMetric::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
            DistanceMetric::Hamming => a
                .iter()
                .zip(b)
                .filter(|(x, y)| (**x != 0.0) != (**y != 0.0))
                .count() as f32,
            DistanceMetric::Dot => -dot(a, b),
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "angular" | "cosine" => Ok(DistanceMetric::Angular),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "manhattan" | "l1" => Ok(DistanceMetric::Manhattan),
            "hamming" => Ok(DistanceMetric::Hamming),
            "dot" => Ok(DistanceMetric::Dot),
            unknown => Err(DomainError::invalid_input(format!(
                "Unknown distance metric '{}'",
                unknown
            ))),
        }
    }
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn norm(a: &[f32]) -> f32 {
    dot(a, a).sqrt()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = norm(a);
    let norm_b = norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot(a, b) / (norm_a * norm_b)
}
