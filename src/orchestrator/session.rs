//! Scorecard Session - one pass through the decision wizard
//!
//! The session owns the wizard definition and its current state. Every
//! change goes through `Wizard::apply`; the session only adds the work the
//! wizard asks for (model analysis, verdict) and turns a finished run into a
//! `DecisionRecord`.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::agent::{Analysis, AnalysisError, AnalysisRequest, LLMProvider, ScorecardAnalyst};
use crate::config::ScorecardProfile;
use crate::scoring::{ScoreSet, WeightSet};
use crate::storage::{DecisionRecord, DecisionStore};
use crate::verdict::{evaluate, Fragility, PolicyConfig, Signals, Verdict};
use crate::wizard::{Answer, DerivedRequest, StepSpec, Wizard, WizardError, WizardEvent, WizardState};

pub const ANALYSIS: &str = "analysis";
pub const VERDICT: &str = "verdict";

pub const DECISION: &str = "decision";
pub const HAS_GOAL: &str = "has_goal";
pub const GOAL: &str = "goal";
pub const INACTION_COST: &str = "inaction_cost";
pub const FRAGILITY: &str = "fragility";
pub const NEXT_ACTION: &str = "next_action";
pub const PRIORITIES: &str = "priorities";
pub const REVIEW: &str = "review";
pub const CONFIRM: &str = "confirm";

const SCORE_PREFIX: &str = "score.";

/// Values the wizard stores for its derived steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    Analysis(Analysis),
    Verdict(Verdict),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Wizard(#[from] WizardError),

    #[error("no model backend is configured")]
    NoModel,

    #[error("the analysis has to be redone before a verdict can be given")]
    MissingAnalysis,
}

/// Wizard key for a dimension's manual score
pub fn score_key(dimension: &str) -> String {
    format!("{}{}", SCORE_PREFIX, dimension)
}

/// Steps for `profile`: the decision framing, then either a model review or
/// one score per dimension, then the verdict
pub fn build_steps(profile: &ScorecardProfile) -> Vec<StepSpec> {
    let max = profile.max_text_len;
    let scale = profile.scale();

    let mut steps = vec![
        StepSpec::single_line(DECISION, "Decision (one sentence)").min_len(3).max_len(max),
        StepSpec::choice(HAS_GOAL, "Is this tied to a specific goal?", ["Yes", "No"]),
        StepSpec::single_line(GOAL, "Which goal?").when(HAS_GOAL, "Yes").max_len(max),
        StepSpec::multi_line(INACTION_COST, "If I do nothing, what's the cost over the next 6-12 months?")
            .optional()
            .max_len(max),
        StepSpec::choice(
            FRAGILITY,
            "Does this increase or reduce fragility?",
            Fragility::CHOICES.iter().map(|f| f.label()),
        ),
        StepSpec::single_line(NEXT_ACTION, "Next smallest action (24-48 hrs)").optional().max_len(max),
    ];

    if profile.assisted {
        let names: Vec<&str> = profile.dimensions.iter().collect();
        steps.push(
            StepSpec::single_line(
                PRIORITIES,
                format!("Rank your values, most important first ({})", names.join(", ")),
            )
            .optional()
            .max_len(max),
        );
        steps.push(StepSpec::multi_line(REVIEW, "Review the analysis").optional().max_len(max).derives(ANALYSIS));
    } else {
        for d in profile.dimensions.iter() {
            steps.push(StepSpec::score(score_key(d), d, scale.min(), scale.max()).optional());
        }
    }

    steps.push(StepSpec::single_line(CONFIRM, "Verdict").optional().max_len(max).derives(VERDICT));
    steps
}

fn text_of(answers: &BTreeMap<String, Answer>, key: &str) -> Option<String> {
    answers
        .get(key)
        .map(|a| a.to_string().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// What a saved record was built from
#[derive(Debug, Clone, PartialEq)]
struct SavedInputs {
    answers: BTreeMap<String, Answer>,
    analysis: Option<Analysis>,
    verdict: Verdict,
}

pub struct ScorecardSession {
    profile: ScorecardProfile,
    wizard: Wizard,
    state: WizardState<Artifact>,
    weights: Option<WeightSet>,
    analyst: Option<ScorecardAnalyst>,
    saved: Option<SavedInputs>,
}

impl ScorecardSession {
    pub fn new(profile: ScorecardProfile, provider: Option<Arc<dyn LLMProvider>>) -> Self {
        let wizard = Wizard::new(build_steps(&profile));
        let state = wizard.start();
        let analyst = provider.map(|p| {
            ScorecardAnalyst::new(
                p,
                profile.model.clone(),
                profile.dimensions.clone(),
                profile.scale(),
                profile.max_text_len,
            )
        });
        Self {
            weights: profile.weight_set(),
            profile,
            wizard,
            state,
            analyst,
            saved: None,
        }
    }

    pub fn profile(&self) -> &ScorecardProfile {
        &self.profile
    }

    pub fn wizard(&self) -> &Wizard {
        &self.wizard
    }

    pub fn state(&self) -> &WizardState<Artifact> {
        &self.state
    }

    /// Apply one event. On error the state is left as it was.
    pub fn handle(&mut self, event: WizardEvent<Artifact>) -> Result<(), WizardError> {
        let next = self.wizard.apply(&self.state, event)?;
        self.state = next;
        Ok(())
    }

    pub fn answer(&mut self, text: impl Into<String>) -> Result<(), WizardError> {
        self.handle(WizardEvent::Answer(Answer::text(text)))
    }

    pub fn next(&mut self) -> Result<(), WizardError> {
        self.handle(WizardEvent::Next)
    }

    pub fn back(&mut self) {
        if let Err(e) = self.handle(WizardEvent::Back) {
            debug!("Back ignored: {}", e);
        }
    }

    pub fn reset(&mut self) {
        self.state = self.wizard.start();
        self.saved = None;
    }

    pub fn redo(&mut self, artifact: &str, correction: impl Into<String>) -> Result<(), WizardError> {
        self.handle(WizardEvent::CorrectAndRedo {
            artifact: artifact.to_string(),
            correction: correction.into(),
        })
    }

    pub fn pending(&self) -> Option<DerivedRequest> {
        self.wizard.pending_request(&self.state)
    }

    /// Fresh analysis, if one has been computed for the current answers
    pub fn analysis(&self) -> Option<&Analysis> {
        match self.wizard.derived(&self.state, ANALYSIS) {
            Some(Artifact::Analysis(a)) => Some(a),
            _ => None,
        }
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        match self.wizard.derived(&self.state, VERDICT) {
            Some(Artifact::Verdict(v)) => Some(v),
            _ => None,
        }
    }

    /// Compute whatever the wizard is waiting on. Returns `false` when
    /// nothing was pending. On error the wizard keeps waiting so the caller
    /// can retry.
    pub async fn fulfill(&mut self) -> Result<bool, SessionError> {
        let Some(request) = self.pending() else { return Ok(false) };

        let value = match request.artifact.as_str() {
            ANALYSIS => Artifact::Analysis(self.run_analysis(&request).await?),
            VERDICT => Artifact::Verdict(self.compute_verdict()?),
            other => return Err(WizardError::UnknownArtifact(other.to_string()).into()),
        };

        self.handle(WizardEvent::DerivedReady { artifact: request.artifact, value })?;
        Ok(true)
    }

    fn analysis_request(&self, request: &DerivedRequest) -> AnalysisRequest {
        let answers = &request.inputs;
        let ranking: Vec<String> = text_of(answers, PRIORITIES)
            .map(|p| p.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let context = [INACTION_COST, FRAGILITY, NEXT_ACTION]
            .into_iter()
            .filter_map(|k| text_of(answers, k).map(|v| (k.to_string(), v)))
            .collect();

        AnalysisRequest {
            decision: text_of(answers, DECISION).unwrap_or_default(),
            goal: text_of(answers, GOAL),
            answers: context,
            dimensions: self.profile.dimensions.ranked(&ranking),
            corrections: request.corrections.clone(),
        }
    }

    async fn run_analysis(&self, request: &DerivedRequest) -> Result<Analysis, SessionError> {
        let analyst = self.analyst.as_ref().ok_or(SessionError::NoModel)?;
        let payload = self.analysis_request(request);
        match analyst.analyze(&payload).await {
            Ok(analysis) => Ok(analysis),
            Err(e) => {
                warn!("Analysis failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Scores in effect: the model's when assisted, the typed ones otherwise
    pub fn scores(&self) -> Option<ScoreSet> {
        let dims = &self.profile.dimensions;
        let scale = self.profile.scale();
        if self.profile.assisted {
            return self.analysis().map(|a| a.score_set(dims, scale));
        }

        let answers = self.wizard.effective_answers(self.state.answers());
        let pairs: Vec<(&str, i64)> = dims
            .iter()
            .filter_map(|d| answers.get(&score_key(d)).and_then(Answer::as_number).map(|n| (d, n)))
            .collect();
        Some(ScoreSet::from_pairs(dims, scale, pairs))
    }

    pub fn signals(&self) -> Signals {
        let answers = self.wizard.effective_answers(self.state.answers());
        let inaction = text_of(&answers, INACTION_COST).unwrap_or_default();
        let fragility = text_of(&answers, FRAGILITY)
            .and_then(|f| Fragility::parse(&f))
            .unwrap_or_default();
        Signals::from_answers(&inaction, fragility)
    }

    fn policy(&self) -> &PolicyConfig {
        &self.profile.policy
    }

    fn compute_verdict(&self) -> Result<Verdict, SessionError> {
        let scores = self.scores().ok_or(SessionError::MissingAnalysis)?;
        let verdict = evaluate(self.policy(), &scores, self.weights.as_ref(), &self.signals());
        info!("Verdict {} (aggregate {:.2}, total {}): {}", verdict.label, verdict.aggregate, verdict.total, verdict.reason);
        Ok(verdict)
    }

    /// Record for the current run, once a fresh verdict exists
    pub fn record(&self) -> Option<DecisionRecord> {
        let verdict = self.verdict()?;
        let scores = self.scores()?;
        let answers = self.wizard.effective_answers(self.state.answers());

        let decision = text_of(&answers, DECISION)?;

        let mut record = DecisionRecord::new(decision, &scores, verdict);
        record.goal = text_of(&answers, GOAL);
        record.inaction_cost = text_of(&answers, INACTION_COST).unwrap_or_default();
        record.fragility = self.signals().fragility;
        record.next_action = text_of(&answers, NEXT_ACTION).unwrap_or_default();
        if let Some(analysis) = self.analysis() {
            record.rationale = analysis.rationale.clone();
            record.outcome_if_acted = Some(analysis.outcome_if_acted.clone());
            record.outcome_if_not = Some(analysis.outcome_if_not.clone());
        }
        Some(record)
    }

    fn current_inputs(&self) -> Option<SavedInputs> {
        Some(SavedInputs {
            answers: self.wizard.effective_answers(self.state.answers()),
            analysis: self.analysis().cloned(),
            verdict: self.verdict()?.clone(),
        })
    }

    /// The last save matches the current answers and verdict
    pub fn is_saved(&self) -> bool {
        self.saved.is_some() && self.saved == self.current_inputs()
    }

    /// Finished with a verdict that has not been written yet
    pub fn needs_save(&self) -> bool {
        self.state.is_terminal() && self.record().is_some() && !self.is_saved()
    }

    /// Append the current record. History is append-only, so a verdict
    /// recomputed after going back is saved as a new record.
    pub async fn save(&mut self, store: &DecisionStore) -> Result<DecisionRecord> {
        let record = self.record().context("No verdict to save yet")?;
        store.append(record.clone()).await?;
        self.saved = self.current_inputs();
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::VerdictLabel;
    use crate::wizard::Phase;

    fn manual() -> ScorecardSession {
        let profile = ScorecardProfile { assisted: false, ..ScorecardProfile::pillars_preset() };
        ScorecardSession::new(profile, None)
    }

    fn step(s: &mut ScorecardSession, text: &str) {
        s.answer(text).unwrap();
        s.next().unwrap();
    }

    #[test]
    fn test_steps_follow_mode() {
        let assisted = build_steps(&ScorecardProfile::default());
        assert!(assisted.iter().any(|s| s.key == REVIEW));
        assert!(!assisted.iter().any(|s| s.key.starts_with(SCORE_PREFIX)));

        let manual = build_steps(&ScorecardProfile { assisted: false, ..ScorecardProfile::pillars_preset() });
        assert_eq!(manual.iter().filter(|s| s.key.starts_with(SCORE_PREFIX)).count(), 4);
        assert_eq!(manual.last().and_then(|s| s.artifact()), Some(VERDICT));
    }

    #[tokio::test]
    async fn test_manual_run_reaches_verdict() {
        let mut s = manual();
        step(&mut s, "Hire a part-time assistant");
        step(&mut s, "No");
        step(&mut s, "I keep burning weekends on admin");
        step(&mut s, "reduces fragility (more buffer)");
        step(&mut s, "Post the job ad");
        step(&mut s, "1");
        step(&mut s, "2");
        step(&mut s, "0");
        step(&mut s, "1");

        assert!(s.state().is_awaiting());
        assert!(s.fulfill().await.unwrap());
        let verdict = s.verdict().unwrap();
        assert_eq!(verdict.label, VerdictLabel::Act);
        assert_eq!(verdict.total, 4);

        let record = s.record().unwrap();
        assert_eq!(record.fragility, Fragility::Reduces);
        assert_eq!(record.goal, None);
        assert_eq!(record.scores["Business"], 2);
    }

    #[tokio::test]
    async fn test_answer_change_makes_verdict_stale() {
        let mut s = manual();
        step(&mut s, "Sell the car");
        step(&mut s, "No");
        step(&mut s, "");
        step(&mut s, "Neutral");
        step(&mut s, "");
        for _ in 0..4 {
            step(&mut s, "0");
        }
        s.fulfill().await.unwrap();
        assert_eq!(s.verdict().unwrap().label, VerdictLabel::Wait);

        s.back();
        s.answer("-2").unwrap();
        assert!(s.verdict().is_none());
        s.next().unwrap();
        assert_eq!(s.state().phase(), Phase::AwaitingDerived(10));
        s.fulfill().await.unwrap();
        assert_eq!(s.verdict().unwrap().label, VerdictLabel::No);
    }

    #[test]
    fn test_redo_from_first_step_cannot_skip_ahead() {
        let mut s = manual();
        assert!(matches!(s.redo(VERDICT, ""), Err(WizardError::NotReached { .. })));
        assert_eq!(s.state().phase(), Phase::Collecting(0));
        assert!(s.pending().is_none());
        assert!(s.record().is_none());
    }

    #[tokio::test]
    async fn test_recomputed_verdict_is_saved_again() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = DecisionStore::new(temp_dir.path().join("decisions.json"));

        let mut s = manual();
        step(&mut s, "Sell the car");
        step(&mut s, "No");
        step(&mut s, "");
        step(&mut s, "Neutral");
        step(&mut s, "");
        for _ in 0..4 {
            step(&mut s, "0");
        }
        s.fulfill().await.unwrap();
        s.next().unwrap();
        assert!(s.state().is_terminal());
        assert!(s.needs_save());

        s.save(&store).await.unwrap();
        assert!(s.is_saved());
        assert!(!s.needs_save());

        // back to the last score and change it
        s.back();
        s.back();
        s.answer("-2").unwrap();
        assert!(!s.is_saved());
        s.next().unwrap();
        s.fulfill().await.unwrap();
        s.next().unwrap();
        assert!(s.state().is_terminal());
        assert!(s.needs_save());

        s.save(&store).await.unwrap();
        let history = store.load().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].verdict, VerdictLabel::No);
        assert_eq!(history[1].verdict, VerdictLabel::Wait);
        assert!(!s.needs_save());

        s.reset();
        assert!(!s.is_saved());
    }

    #[tokio::test]
    async fn test_assisted_without_model_keeps_waiting() {
        let mut s = ScorecardSession::new(ScorecardProfile::default(), None);
        step(&mut s, "Move abroad");
        step(&mut s, "No");
        step(&mut s, "");
        step(&mut s, "Neutral");
        step(&mut s, "");
        step(&mut s, "");

        let pending = s.pending().unwrap();
        assert_eq!(pending.artifact, ANALYSIS);
        assert!(matches!(s.fulfill().await, Err(SessionError::NoModel)));
        assert!(s.state().is_awaiting());
        assert!(s.record().is_none());
    }
}
