//! Dimensions and Score Sets
//!
//! A `DimensionSet` is the fixed, ordered list of life dimensions a decision
//! is scored against. A `ScoreSet` always holds exactly one clamped score per
//! dimension.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::scale::ScoreScale;

/// Ordered, de-duplicated dimension names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct DimensionSet {
    names: Vec<String>,
}

impl DimensionSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.into().trim().to_string();
            if !name.is_empty() && !out.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                out.push(name);
            }
        }
        Self { names: out }
    }

    /// Core values used by the rating scorecards
    pub fn core_values() -> Self {
        Self::new(["Security", "Energy", "Meaning", "Connection", "Freedom"])
    }

    /// Life pillars used by the impact scorecard
    pub fn life_pillars() -> Self {
        Self::new(["Family", "Business", "Physical health", "Mental health"])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Case-insensitive lookup returning the canonical spelling
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let wanted = name.trim();
        self.names
            .iter()
            .find(|n| n.eq_ignore_ascii_case(wanted))
            .map(|n| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|n| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Order the dimensions by a user ranking; unranked ones keep their
    /// configured order after the ranked ones.
    pub fn ranked(&self, ranking: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for r in ranking {
            if let Some(name) = self.resolve(r) {
                if !out.iter().any(|o| o == name) {
                    out.push(name.to_string());
                }
            }
        }
        for name in self.iter() {
            if !out.iter().any(|o| o == name) {
                out.push(name.to_string());
            }
        }
        out
    }
}

impl From<Vec<String>> for DimensionSet {
    fn from(names: Vec<String>) -> Self {
        Self::new(names)
    }
}

impl From<DimensionSet> for Vec<String> {
    fn from(set: DimensionSet) -> Self {
        set.names
    }
}

/// One clamped score per dimension, in dimension order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreSet {
    scale: ScoreScale,
    entries: Vec<(String, i32)>,
}

impl ScoreSet {
    /// Every dimension at the scale default
    pub fn neutral(dimensions: &DimensionSet, scale: ScoreScale) -> Self {
        Self {
            scale,
            entries: dimensions
                .iter()
                .map(|d| (d.to_string(), scale.default_score()))
                .collect(),
        }
    }

    /// Build from loosely-typed input. Missing dimensions take the default,
    /// unknown names are dropped.
    pub fn from_raw(dimensions: &DimensionSet, scale: ScoreScale, raw: &serde_json::Map<String, Value>) -> Self {
        let mut set = Self::neutral(dimensions, scale);
        for (name, value) in raw {
            match dimensions.resolve(name) {
                Some(canonical) => {
                    let canonical = canonical.to_string();
                    set.put(&canonical, scale.clamp(value));
                }
                None => debug!("Ignoring unknown dimension '{}'", name),
            }
        }
        set
    }

    pub fn from_pairs<'a, I>(dimensions: &DimensionSet, scale: ScoreScale, pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, i64)>,
    {
        let mut set = Self::neutral(dimensions, scale);
        for (name, value) in pairs {
            match dimensions.resolve(name) {
                Some(canonical) => {
                    let canonical = canonical.to_string();
                    set.put(&canonical, scale.clamp_int(value));
                }
                None => debug!("Ignoring unknown dimension '{}'", name),
            }
        }
        set
    }

    /// Replace one score; unknown names leave the set untouched
    pub fn with_score(mut self, name: &str, raw: i64) -> Self {
        let clamped = self.scale.clamp_int(raw);
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name.trim())) {
            entry.1 = clamped;
        }
        self
    }

    fn put(&mut self, canonical: &str, score: i32) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == canonical) {
            entry.1 = score;
        }
    }

    pub fn scale(&self) -> ScoreScale {
        self.scale
    }

    pub fn get(&self, name: &str) -> Option<i32> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name.trim()))
            .map(|(_, s)| *s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.entries.iter().map(|(n, s)| (n.as_str(), *s))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Simple unweighted sum
    pub fn total(&self) -> i32 {
        self.entries.iter().map(|(_, s)| *s).sum()
    }

    /// First dimension sitting at the bottom of the scale, if any
    pub fn first_at_floor(&self) -> Option<&str> {
        let floor = self.scale.min();
        self.entries.iter().find(|(_, s)| *s == floor).map(|(n, _)| n.as_str())
    }

    pub fn to_map(&self) -> BTreeMap<String, i32> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dimension_set_dedup_and_trim() {
        let dims = DimensionSet::new([" Energy ", "Energy", "", "Freedom"]);
        assert_eq!(dims.len(), 2);
        assert_eq!(dims.iter().collect::<Vec<_>>(), vec!["Energy", "Freedom"]);
        assert_eq!(dims.resolve("energy"), Some("Energy"));
    }

    #[test]
    fn test_dimension_set_dedup_ignores_case() {
        let dims = DimensionSet::new(["Energy", "energy", "FREEDOM", "Freedom"]);
        assert_eq!(dims.iter().collect::<Vec<_>>(), vec!["Energy", "FREEDOM"]);
        assert_eq!(dims.resolve("freedom"), Some("FREEDOM"));
    }

    #[test]
    fn test_from_raw_fills_missing_and_ignores_unknown() {
        let dims = DimensionSet::core_values();
        let raw = json!({"security": 9, "Energy": "12", "Wealth": 10});
        let set = ScoreSet::from_raw(&dims, ScoreScale::Positive, raw.as_object().unwrap());

        assert_eq!(set.len(), 5);
        assert_eq!(set.get("Security"), Some(9));
        assert_eq!(set.get("Energy"), Some(10));
        assert_eq!(set.get("Meaning"), Some(5));
        assert_eq!(set.get("Wealth"), None);
    }

    #[test]
    fn test_total_and_floor() {
        let dims = DimensionSet::core_values();
        let set = ScoreSet::from_pairs(
            &dims,
            ScoreScale::Signed,
            [("Security", 1), ("Energy", -2), ("Meaning", 0), ("Connection", 1), ("Freedom", 1)],
        );
        assert_eq!(set.total(), 1);
        assert_eq!(set.first_at_floor(), Some("Energy"));
    }

    #[test]
    fn test_ranked_order() {
        let dims = DimensionSet::core_values();
        let ranked = dims.ranked(&["freedom".to_string(), "Nope".to_string(), "Energy".to_string()]);
        assert_eq!(ranked, vec!["Freedom", "Energy", "Security", "Meaning", "Connection"]);
    }

    #[test]
    fn test_dimension_set_serde_roundtrip() {
        let dims = DimensionSet::life_pillars();
        let json = serde_json::to_string(&dims).unwrap();
        assert!(json.starts_with('['));
        let back: DimensionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dims);
    }
}
