//! Verdict Module
//!
//! Maps a score set, its aggregate and a few auxiliary signals to one of a
//! closed set of verdict labels.
//!
//! Both policies check their hard floor first (guardrails for the threshold
//! policy, the minimum-score veto for the signed-sum policy). Only when no
//! floor is hit does the aggregate or sum decide the outcome.

mod signed;
mod threshold;

pub use signed::SignedSumPolicy;
pub use threshold::{Band, Cutoff, Guardrail, ThresholdPolicy};

use serde::{Deserialize, Serialize};

use crate::scoring::{aggregate, ScoreScale, ScoreSet, WeightSet};

/// Inaction-cost text at least this long (trimmed) counts as a high cost
pub const HIGH_INACTION_MIN_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictLabel {
    Act,
    Redesign,
    Wait,
    No,
}

impl VerdictLabel {
    /// One-line guidance shown next to the label
    pub fn guidance(&self) -> &'static str {
        match self {
            VerdictLabel::Act => "Go ahead and take the next smallest action.",
            VerdictLabel::Redesign => "Worth doing, but change the shape of it first.",
            VerdictLabel::Wait => "Not yet. Revisit when something changes.",
            VerdictLabel::No => "Don't do this as framed.",
        }
    }
}

impl std::fmt::Display for VerdictLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerdictLabel::Act => write!(f, "ACT"),
            VerdictLabel::Redesign => write!(f, "REDESIGN"),
            VerdictLabel::Wait => write!(f, "WAIT"),
            VerdictLabel::No => write!(f, "NO"),
        }
    }
}

/// Answer to "does this increase or reduce fragility?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Fragility {
    Reduces,
    #[default]
    Neutral,
    Increases,
}

impl Fragility {
    pub const CHOICES: [Fragility; 3] = [Fragility::Reduces, Fragility::Neutral, Fragility::Increases];

    pub fn label(&self) -> &'static str {
        match self {
            Fragility::Reduces => "Reduces fragility (more buffer)",
            Fragility::Neutral => "Neutral",
            Fragility::Increases => "Increases fragility",
        }
    }

    /// Accepts either the display label or a short keyword
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim().to_lowercase();
        Self::CHOICES
            .into_iter()
            .find(|c| c.label().to_lowercase() == s)
            .or(match s.as_str() {
                "reduces" | "reduce" => Some(Fragility::Reduces),
                "neutral" => Some(Fragility::Neutral),
                "increases" | "increase" => Some(Fragility::Increases),
                _ => None,
            })
    }
}

/// Auxiliary inputs consulted next to the scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Signals {
    pub high_inaction_cost: bool,
    pub fragility: Fragility,
}

impl Signals {
    pub fn from_answers(inaction_cost: &str, fragility: Fragility) -> Self {
        Self {
            high_inaction_cost: inaction_cost.trim().chars().count() >= HIGH_INACTION_MIN_CHARS,
            fragility,
        }
    }

    pub fn reduces_fragility(&self) -> bool {
        self.fragility == Fragility::Reduces
    }
}

/// Which rule of the signed-sum policy fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SumRule {
    PositiveTotal,
    NeutralWithInactionCost,
    NeutralWithFragilityRelief,
    FragilityRelief,
    NeutralTotal,
    NegativeTotal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerdictReason {
    Guardrail { name: String },
    Veto { dimension: String },
    Band { threshold: f64 },
    BelowBands,
    Sum { rule: SumRule },
}

impl std::fmt::Display for VerdictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerdictReason::Guardrail { name } => write!(f, "guardrail '{}' tripped", name),
            VerdictReason::Veto { dimension } => write!(f, "{} is at the bottom of the scale", dimension),
            VerdictReason::Band { threshold } => write!(f, "aggregate reached {:.2}", threshold),
            VerdictReason::BelowBands => write!(f, "aggregate below every band"),
            VerdictReason::Sum { rule } => match rule {
                SumRule::PositiveTotal => write!(f, "net positive impact"),
                SumRule::NeutralWithInactionCost => write!(f, "neutral impact, but doing nothing is costly"),
                SumRule::NeutralWithFragilityRelief => write!(f, "neutral impact that reduces fragility"),
                SumRule::FragilityRelief => write!(f, "reduces fragility despite a net cost"),
                SumRule::NeutralTotal => write!(f, "neutral impact"),
                SumRule::NegativeTotal => write!(f, "net negative impact"),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: VerdictLabel,
    /// Weighted aggregate, two decimals
    pub aggregate: f64,
    /// Unweighted sum of all scores
    pub total: i32,
    pub reason: VerdictReason,
}

/// A verdict strategy
pub trait VerdictPolicy: Send + Sync {
    /// Scale the policy's cutoffs are expressed in
    fn scale(&self) -> ScoreScale;

    fn classify(&self, scores: &ScoreSet, aggregate: f64, signals: &Signals) -> Verdict;
}

/// Serializable choice of policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    Threshold(ThresholdPolicy),
    SignedSum(SignedSumPolicy),
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::SignedSum(SignedSumPolicy::default())
    }
}

impl VerdictPolicy for PolicyConfig {
    fn scale(&self) -> ScoreScale {
        match self {
            PolicyConfig::Threshold(p) => p.scale(),
            PolicyConfig::SignedSum(p) => p.scale(),
        }
    }

    fn classify(&self, scores: &ScoreSet, aggregate: f64, signals: &Signals) -> Verdict {
        match self {
            PolicyConfig::Threshold(p) => p.classify(scores, aggregate, signals),
            PolicyConfig::SignedSum(p) => p.classify(scores, aggregate, signals),
        }
    }
}

/// Aggregate `scores` with `weights` and classify the result
pub fn evaluate(policy: &dyn VerdictPolicy, scores: &ScoreSet, weights: Option<&WeightSet>, signals: &Signals) -> Verdict {
    let agg = aggregate(scores, weights);
    policy.classify(scores, agg, signals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_display_and_serde() {
        assert_eq!(VerdictLabel::Redesign.to_string(), "REDESIGN");
        assert_eq!(serde_json::to_string(&VerdictLabel::No).unwrap(), "\"NO\"");
        let back: VerdictLabel = serde_json::from_str("\"ACT\"").unwrap();
        assert_eq!(back, VerdictLabel::Act);
    }

    #[test]
    fn test_fragility_parse() {
        assert_eq!(Fragility::parse("Reduces fragility (more buffer)"), Some(Fragility::Reduces));
        assert_eq!(Fragility::parse(" increases "), Some(Fragility::Increases));
        assert_eq!(Fragility::parse("maybe"), None);
    }

    #[test]
    fn test_signals_inaction_threshold() {
        assert!(!Signals::from_answers("   short   ", Fragility::Neutral).high_inaction_cost);
        assert!(Signals::from_answers("we lose the lease in june", Fragility::Neutral).high_inaction_cost);
        // under 20 chars once trimmed
        assert!(!Signals::from_answers("  nineteen chars!!!!  ", Fragility::Neutral).high_inaction_cost);
    }

    #[test]
    fn test_policy_config_serde_tag() {
        let cfg = PolicyConfig::Threshold(ThresholdPolicy::default());
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["kind"], "threshold");
        let back: PolicyConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, cfg);

        let json = serde_json::to_value(PolicyConfig::default()).unwrap();
        assert_eq!(json["kind"], "signed_sum");
    }
}
