//! Decision Scorecard
//!
//! Scores a pending decision against a fixed set of life dimensions and
//! turns the scores into a verdict:
//! - Clamped score scales and weighted aggregation
//! - Threshold and signed-sum verdict policies with guardrails
//! - A step-gated wizard with derived, invalidatable artifacts
//! - Optional model-assisted scoring behind a strict JSON boundary
//! - JSON decision history

pub mod agent;
pub mod config;
pub mod orchestrator;
pub mod safety;
pub mod scoring;
pub mod storage;
pub mod utils;
pub mod verdict;
pub mod wizard;

// Re-exports for convenience
pub use config::{ProfileManager, ScorecardProfile};
pub use orchestrator::ScorecardSession;
pub use scoring::{DimensionSet, ScoreScale, ScoreSet, WeightSet};
pub use storage::{DecisionRecord, DecisionStore};
pub use verdict::{evaluate, Verdict, VerdictLabel};
pub use wizard::{Wizard, WizardError, WizardEvent, WizardState};
