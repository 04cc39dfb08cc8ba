//! Weighting
//!
//! Normalized per-dimension weights and the weighted aggregate score.

use std::collections::BTreeMap;

use super::dimensions::{DimensionSet, ScoreSet};

/// Non-negative weights summing to 1, one per dimension
#[derive(Debug, Clone, PartialEq)]
pub struct WeightSet {
    weights: Vec<(String, f64)>,
}

impl WeightSet {
    pub fn equal(dimensions: &DimensionSet) -> Self {
        let n = dimensions.len().max(1) as f64;
        Self {
            weights: dimensions.iter().map(|d| (d.to_string(), 1.0 / n)).collect(),
        }
    }

    /// Normalize raw weights over `dimensions`.
    ///
    /// Negative or non-finite weights count as zero and unknown names are
    /// dropped. When nothing positive remains every dimension gets `1/n`.
    pub fn normalize<'a, I>(dimensions: &DimensionSet, raw: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut picked: Vec<(String, f64)> = dimensions.iter().map(|d| (d.to_string(), 0.0)).collect();
        for (name, w) in raw {
            let Some(canonical) = dimensions.resolve(name) else { continue };
            let w = if w.is_finite() && w > 0.0 { w } else { 0.0 };
            if let Some(slot) = picked.iter_mut().find(|(n, _)| n == canonical) {
                slot.1 = w;
            }
        }

        let sum: f64 = picked.iter().map(|(_, w)| w).sum();
        if sum <= 0.0 {
            return Self::equal(dimensions);
        }

        Self {
            weights: picked.into_iter().map(|(n, w)| (n, w / sum)).collect(),
        }
    }

    pub fn from_map(dimensions: &DimensionSet, raw: &BTreeMap<String, f64>) -> Self {
        Self::normalize(dimensions, raw.iter().map(|(k, v)| (k.as_str(), *v)))
    }

    pub fn get(&self, name: &str) -> f64 {
        self.weights
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name.trim()))
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(n, w)| (n.as_str(), *w))
    }
}

/// Round to two decimals for stable display and band comparison
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Weighted mean of `scores`, rounded to two decimals.
///
/// `None` (or weights that put nothing on the scored dimensions) means equal
/// weighting. An empty score set aggregates to zero.
pub fn aggregate(scores: &ScoreSet, weights: Option<&WeightSet>) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }

    if let Some(weights) = weights {
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for (name, score) in scores.iter() {
            let w = weights.get(name);
            numerator += score as f64 * w;
            denominator += w;
        }
        if denominator > 0.0 {
            return round2(numerator / denominator);
        }
    }

    round2(scores.total() as f64 / scores.len() as f64)
}
