//! The wizard transition function.
//!
//! `Wizard` holds the immutable step list. `apply` maps a state and an event
//! to the next state. On a validation failure it returns the error and the
//! caller keeps the old state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::state::{Derived, Phase, WizardState};
use super::step::{Answer, StepSpec};
use super::WizardError;

#[derive(Debug, Clone, PartialEq)]
pub enum WizardEvent<A> {
    /// Set the answer of the current step
    Answer(Answer),
    Next,
    Back,
    Reset,
    /// Throw away one artifact and recompute it with the user's correction
    CorrectAndRedo { artifact: String, correction: String },
    /// A collaborator finished computing an artifact
    DerivedReady { artifact: String, value: A },
}

/// What the caller has to compute before the wizard can continue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedRequest {
    pub artifact: String,
    pub step: usize,
    pub inputs: BTreeMap<String, Answer>,
    pub corrections: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Wizard {
    steps: Vec<StepSpec>,
}

impl Wizard {
    /// Later steps reusing an earlier key are dropped.
    pub fn new(steps: Vec<StepSpec>) -> Self {
        let mut unique: Vec<StepSpec> = Vec::with_capacity(steps.len());
        for step in steps {
            if unique.iter().any(|s| s.key == step.key) {
                warn!("Dropping duplicate wizard step '{}'", step.key);
                continue;
            }
            unique.push(step);
        }
        Self { steps: unique }
    }

    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&StepSpec> {
        self.steps.get(index)
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.key == key)
    }

    pub fn current_step<A>(&self, state: &WizardState<A>) -> Option<&StepSpec> {
        state.cursor().and_then(|i| self.steps.get(i))
    }

    /// Initial state: first visible step, awaiting its artifact if it has one
    pub fn start<A>(&self) -> WizardState<A> {
        let mut state = WizardState::at(Phase::Terminal);
        state.phase = match self.next_visible(&state.answers, None) {
            Some(i) => self.entry_phase(&state, i),
            None => Phase::Terminal,
        };
        state
    }

    pub fn apply<A: Clone>(&self, state: &WizardState<A>, event: WizardEvent<A>) -> Result<WizardState<A>, WizardError> {
        match event {
            WizardEvent::Answer(answer) => self.on_answer(state, answer),
            WizardEvent::Next => self.on_next(state),
            WizardEvent::Back => Ok(self.on_back(state)),
            WizardEvent::Reset => {
                debug!("Wizard reset");
                Ok(self.start())
            }
            WizardEvent::CorrectAndRedo { artifact, correction } => self.on_redo(state, &artifact, correction),
            WizardEvent::DerivedReady { artifact, value } => self.on_ready(state, &artifact, value),
        }
    }

    /// Fresh artifact value: not marked stale and computed from the answers
    /// currently in effect.
    pub fn derived<'s, A>(&self, state: &'s WizardState<A>, artifact: &str) -> Option<&'s A> {
        let slot = state.derived.get(artifact)?;
        let index = self.artifact_step(artifact)?;
        if slot.stale || slot.inputs != self.snapshot(&state.answers, index) {
            return None;
        }
        Some(&slot.value)
    }

    pub fn pending_request<A>(&self, state: &WizardState<A>) -> Option<DerivedRequest> {
        let Phase::AwaitingDerived(index) = state.phase else { return None };
        let artifact = self.steps.get(index)?.artifact()?.to_string();
        let inputs = self
            .snapshot(&state.answers, index)
            .into_iter()
            .filter_map(|(k, v)| v.map(|a| (k, a)))
            .collect();
        Some(DerivedRequest {
            corrections: state.corrections(&artifact).to_vec(),
            artifact,
            step: index,
            inputs,
        })
    }

    /// Answers of the steps that are currently asked, in effect for
    /// artifacts and summaries
    pub fn effective_answers(&self, answers: &BTreeMap<String, Answer>) -> BTreeMap<String, Answer> {
        let visible = self.visibility(answers);
        self.steps
            .iter()
            .zip(visible)
            .filter(|(_, v)| *v)
            .filter_map(|(s, _)| answers.get(&s.key).map(|a| (s.key.clone(), a.clone())))
            .collect()
    }

    /// Indices of the steps currently asked
    pub fn visible_steps<A>(&self, state: &WizardState<A>) -> Vec<usize> {
        self.visibility(&state.answers)
            .into_iter()
            .enumerate()
            .filter(|(_, v)| *v)
            .map(|(i, _)| i)
            .collect()
    }

    fn visibility(&self, answers: &BTreeMap<String, Answer>) -> Vec<bool> {
        let mut seen: BTreeMap<String, Answer> = BTreeMap::new();
        let mut out = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let visible = step.precondition.as_ref().map_or(true, |p| p.holds(&seen));
            if visible {
                if let Some(a) = answers.get(&step.key) {
                    seen.insert(step.key.clone(), a.clone());
                }
            }
            out.push(visible);
        }
        out
    }

    fn next_visible(&self, answers: &BTreeMap<String, Answer>, after: Option<usize>) -> Option<usize> {
        let start = after.map_or(0, |i| i + 1);
        self.visibility(answers)
            .into_iter()
            .enumerate()
            .skip(start)
            .find(|(_, v)| *v)
            .map(|(i, _)| i)
    }

    fn prev_visible(&self, answers: &BTreeMap<String, Answer>, before: usize) -> Option<usize> {
        self.visibility(answers)
            .into_iter()
            .enumerate()
            .take(before)
            .filter(|(_, v)| *v)
            .map(|(i, _)| i)
            .last()
    }

    fn artifact_step(&self, artifact: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.artifact() == Some(artifact))
    }

    fn dependencies(&self, index: usize) -> Vec<String> {
        match self.steps.get(index).and_then(|s| s.derives.as_ref()) {
            Some(spec) => match &spec.depends_on {
                Some(keys) => keys.clone(),
                None => self.steps[..index].iter().map(|s| s.key.clone()).collect(),
            },
            None => Vec::new(),
        }
    }

    fn snapshot(&self, answers: &BTreeMap<String, Answer>, index: usize) -> BTreeMap<String, Option<Answer>> {
        let effective = self.effective_answers(answers);
        self.dependencies(index)
            .into_iter()
            .map(|k| {
                let v = effective.get(&k).cloned();
                (k, v)
            })
            .collect()
    }

    fn entry_phase<A>(&self, state: &WizardState<A>, index: usize) -> Phase {
        match self.steps[index].artifact() {
            Some(artifact) if self.derived(state, artifact).is_none() => Phase::AwaitingDerived(index),
            _ => Phase::Collecting(index),
        }
    }

    /// Mark every artifact at or after step `from` stale
    fn invalidate_from<A>(&self, state: &mut WizardState<A>, from: usize) {
        for artifact in self.steps.iter().skip(from).filter_map(|s| s.artifact()) {
            if let Some(slot) = state.derived.get_mut(artifact) {
                if !slot.stale {
                    debug!("Artifact '{}' is now stale", artifact);
                }
                slot.stale = true;
            }
        }
    }

    fn on_answer<A: Clone>(&self, state: &WizardState<A>, answer: Answer) -> Result<WizardState<A>, WizardError> {
        let index = match state.phase {
            Phase::Collecting(i) | Phase::AwaitingDerived(i) => i,
            Phase::Terminal => return Err(WizardError::NotCollecting),
        };
        let step = &self.steps[index];
        let answer = step.normalize(answer);

        let mut next = state.clone();
        if next.answers.get(&step.key) == Some(&answer) {
            return Ok(next);
        }
        next.answers.insert(step.key.clone(), answer);

        let first_affected = (0..self.steps.len()).find(|&i| {
            self.steps[i].derives.is_some() && self.dependencies(i).iter().any(|k| k == &step.key)
        });
        if let Some(from) = first_affected {
            self.invalidate_from(&mut next, from);
        }
        Ok(next)
    }

    fn on_next<A: Clone>(&self, state: &WizardState<A>) -> Result<WizardState<A>, WizardError> {
        let index = match state.phase {
            Phase::Collecting(i) => i,
            Phase::AwaitingDerived(i) => {
                let artifact = self.steps[i].artifact().unwrap_or_default().to_string();
                return Err(WizardError::AwaitingDerived { artifact });
            }
            Phase::Terminal => return Err(WizardError::NotCollecting),
        };

        let step = &self.steps[index];
        step.validate(state.answers.get(&step.key))?;

        let mut next = state.clone();
        next.phase = match self.next_visible(&state.answers, Some(index)) {
            Some(j) => self.entry_phase(&next, j),
            None => Phase::Terminal,
        };
        debug!("Wizard next: {:?} -> {:?}", state.phase, next.phase);
        Ok(next)
    }

    fn on_back<A: Clone>(&self, state: &WizardState<A>) -> WizardState<A> {
        let target = match state.phase {
            Phase::Collecting(i) | Phase::AwaitingDerived(i) => self.prev_visible(&state.answers, i).unwrap_or(i),
            Phase::Terminal => match self.prev_visible(&state.answers, self.steps.len()) {
                Some(i) => i,
                None => return state.clone(),
            },
        };

        let mut next = state.clone();
        if let Some(artifact) = self.steps[target].artifact() {
            let deps = self.dependencies(target);
            let looks_ahead = deps
                .iter()
                .any(|k| self.position(k).is_some_and(|p| p >= target));
            if looks_ahead && next.derived.remove(artifact).is_some() {
                debug!("Discarded '{}' on back navigation", artifact);
            }
        }
        next.phase = self.entry_phase(&next, target);
        next
    }

    fn on_redo<A: Clone>(&self, state: &WizardState<A>, artifact: &str, correction: String) -> Result<WizardState<A>, WizardError> {
        let index = self
            .artifact_step(artifact)
            .ok_or_else(|| WizardError::UnknownArtifact(artifact.to_string()))?;

        // only an artifact the cursor has already reached can be redone
        let reached = match state.phase {
            Phase::Collecting(i) | Phase::AwaitingDerived(i) => i >= index,
            Phase::Terminal => true,
        };
        let computed = state.derived.contains_key(artifact) || state.phase == Phase::AwaitingDerived(index);
        if !reached || !computed {
            return Err(WizardError::NotReached { artifact: artifact.to_string() });
        }

        let mut next = state.clone();
        let correction = correction.trim().to_string();
        if !correction.is_empty() {
            next.corrections.entry(artifact.to_string()).or_default().push(correction);
        }
        next.derived.remove(artifact);
        self.invalidate_from(&mut next, index + 1);
        next.phase = Phase::AwaitingDerived(index);
        debug!("Redo requested for '{}'", artifact);
        Ok(next)
    }

    fn on_ready<A: Clone>(&self, state: &WizardState<A>, artifact: &str, value: A) -> Result<WizardState<A>, WizardError> {
        let index = self
            .artifact_step(artifact)
            .ok_or_else(|| WizardError::UnknownArtifact(artifact.to_string()))?;

        let mut next = state.clone();
        next.derived.insert(
            artifact.to_string(),
            Derived {
                value,
                inputs: self.snapshot(&state.answers, index),
                stale: false,
            },
        );
        if next.phase == Phase::AwaitingDerived(index) {
            next.phase = Phase::Collecting(index);
        }
        Ok(next)
    }
}
