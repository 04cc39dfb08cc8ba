//! Signed-sum policy for the -2..+2 impact scale.

use serde::{Deserialize, Serialize};

use super::{Signals, SumRule, Verdict, VerdictLabel, VerdictPolicy, VerdictReason};
use crate::scoring::{ScoreScale, ScoreSet};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedSumPolicy {
    /// A decision that reduces fragility acts even at a net cost
    #[serde(default = "default_true")]
    pub fragility_relief: bool,
}

impl Default for SignedSumPolicy {
    fn default() -> Self {
        Self { fragility_relief: true }
    }
}

impl SignedSumPolicy {
    fn verdict(label: VerdictLabel, aggregate: f64, total: i32, reason: VerdictReason) -> Verdict {
        Verdict { label, aggregate, total, reason }
    }
}

impl VerdictPolicy for SignedSumPolicy {
    fn scale(&self) -> ScoreScale {
        ScoreScale::Signed
    }

    fn classify(&self, scores: &ScoreSet, aggregate: f64, signals: &Signals) -> Verdict {
        let total = scores.total();

        // Veto: one dimension at the floor outweighs any total.
        if let Some(dimension) = scores.first_at_floor() {
            return Self::verdict(
                VerdictLabel::No,
                aggregate,
                total,
                VerdictReason::Veto { dimension: dimension.to_string() },
            );
        }

        let (label, rule) = if total > 0 {
            (VerdictLabel::Act, SumRule::PositiveTotal)
        } else if total == 0 && signals.high_inaction_cost {
            (VerdictLabel::Act, SumRule::NeutralWithInactionCost)
        } else if total == 0 && signals.reduces_fragility() {
            (VerdictLabel::Act, SumRule::NeutralWithFragilityRelief)
        } else if self.fragility_relief && signals.reduces_fragility() {
            (VerdictLabel::Act, SumRule::FragilityRelief)
        } else if total == 0 {
            (VerdictLabel::Wait, SumRule::NeutralTotal)
        } else {
            (VerdictLabel::Redesign, SumRule::NegativeTotal)
        };

        Self::verdict(label, aggregate, total, VerdictReason::Sum { rule })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::DimensionSet;
    use crate::verdict::Fragility;

    fn scores(pairs: [(&str, i64); 5]) -> ScoreSet {
        ScoreSet::from_pairs(&DimensionSet::core_values(), ScoreScale::Signed, pairs)
    }

    #[test]
    fn test_veto_beats_positive_total() {
        let s = scores([("Security", 1), ("Energy", -2), ("Meaning", 0), ("Connection", 1), ("Freedom", 1)]);
        let v = SignedSumPolicy::default().classify(&s, 0.2, &Signals::default());
        assert_eq!(v.label, VerdictLabel::No);
        assert_eq!(v.total, 1);
        assert_eq!(v.reason, VerdictReason::Veto { dimension: "Energy".to_string() });
    }

    #[test]
    fn test_positive_total_acts() {
        let s = scores([("Security", 1), ("Energy", 0), ("Meaning", 0), ("Connection", 0), ("Freedom", 0)]);
        let v = SignedSumPolicy::default().classify(&s, 0.2, &Signals::default());
        assert_eq!(v.label, VerdictLabel::Act);
        assert_eq!(v.reason, VerdictReason::Sum { rule: SumRule::PositiveTotal });
    }

    #[test]
    fn test_neutral_total_depends_on_signals() {
        let s = scores([("Security", 1), ("Energy", -1), ("Meaning", 0), ("Connection", 0), ("Freedom", 0)]);
        let policy = SignedSumPolicy::default();

        let plain = policy.classify(&s, 0.0, &Signals::default());
        assert_eq!(plain.label, VerdictLabel::Wait);

        let costly = Signals { high_inaction_cost: true, fragility: Fragility::Neutral };
        assert_eq!(policy.classify(&s, 0.0, &costly).label, VerdictLabel::Act);

        let buffer = Signals { high_inaction_cost: false, fragility: Fragility::Reduces };
        let v = policy.classify(&s, 0.0, &buffer);
        assert_eq!(v.label, VerdictLabel::Act);
        assert_eq!(v.reason, VerdictReason::Sum { rule: SumRule::NeutralWithFragilityRelief });
    }

    #[test]
    fn test_negative_total() {
        let s = scores([("Security", -1), ("Energy", -1), ("Meaning", 1), ("Connection", 0), ("Freedom", 0)]);
        let buffer = Signals { high_inaction_cost: true, fragility: Fragility::Reduces };

        assert_eq!(SignedSumPolicy::default().classify(&s, -0.2, &buffer).label, VerdictLabel::Act);

        let strict = SignedSumPolicy { fragility_relief: false };
        assert_eq!(strict.classify(&s, -0.2, &buffer).label, VerdictLabel::Redesign);
        assert_eq!(strict.classify(&s, -0.2, &Signals::default()).label, VerdictLabel::Redesign);
    }

    #[test]
    fn test_missing_flag_defaults_on() {
        let p: SignedSumPolicy = serde_json::from_str("{}").unwrap();
        assert!(p.fragility_relief);
    }
}
