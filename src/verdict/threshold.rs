//! Threshold policy for the 1..10 rating scale.
//!
//! Guardrails are checked first and short-circuit banding. Bands are tried
//! from the highest threshold down; `aggregate >= min` wins.

use serde::{Deserialize, Serialize};

use super::{Signals, Verdict, VerdictLabel, VerdictPolicy, VerdictReason};
use crate::scoring::{ScoreScale, ScoreSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f64,
    pub label: VerdictLabel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cutoff {
    pub dimension: String,
    pub at_or_below: i32,
}

impl Cutoff {
    /// A dimension missing from the score set never satisfies a cutoff
    fn holds(&self, scores: &ScoreSet) -> bool {
        scores.get(&self.dimension).is_some_and(|s| s <= self.at_or_below)
    }
}

/// Forces NO when every cutoff holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guardrail {
    pub name: String,
    pub all_of: Vec<Cutoff>,
}

impl Guardrail {
    pub fn trips(&self, scores: &ScoreSet) -> bool {
        !self.all_of.is_empty() && self.all_of.iter().all(|c| c.holds(scores))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    pub bands: Vec<Band>,
    #[serde(default)]
    pub guardrails: Vec<Guardrail>,
    /// Label when the aggregate is below every band
    #[serde(default = "default_fallback")]
    pub fallback: VerdictLabel,
}

fn default_fallback() -> VerdictLabel {
    VerdictLabel::No
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            bands: vec![
                Band { min: 7.6, label: VerdictLabel::Act },
                Band { min: 6.4, label: VerdictLabel::Redesign },
                Band { min: 5.5, label: VerdictLabel::Wait },
            ],
            guardrails: vec![Guardrail {
                name: "security and energy both depleted".to_string(),
                all_of: vec![
                    Cutoff { dimension: "Security".to_string(), at_or_below: 3 },
                    Cutoff { dimension: "Energy".to_string(), at_or_below: 3 },
                ],
            }],
            fallback: default_fallback(),
        }
    }
}

impl VerdictPolicy for ThresholdPolicy {
    fn scale(&self) -> ScoreScale {
        ScoreScale::Positive
    }

    fn classify(&self, scores: &ScoreSet, aggregate: f64, _signals: &Signals) -> Verdict {
        let total = scores.total();

        if let Some(guardrail) = self.guardrails.iter().find(|g| g.trips(scores)) {
            return Verdict {
                label: VerdictLabel::No,
                aggregate,
                total,
                reason: VerdictReason::Guardrail { name: guardrail.name.clone() },
            };
        }

        let mut bands: Vec<&Band> = self.bands.iter().collect();
        bands.sort_by(|a, b| b.min.total_cmp(&a.min));

        match bands.into_iter().find(|b| aggregate >= b.min) {
            Some(band) => Verdict {
                label: band.label,
                aggregate,
                total,
                reason: VerdictReason::Band { threshold: band.min },
            },
            None => Verdict {
                label: self.fallback,
                aggregate,
                total,
                reason: VerdictReason::BelowBands,
            },
        }
    }
}
