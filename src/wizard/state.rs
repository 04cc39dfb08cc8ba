//! Wizard session state.
//!
//! The state is a plain value. It is only ever replaced by
//! [`Wizard::apply`](super::Wizard::apply); readers never mutate it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::step::Answer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "step", rename_all = "snake_case")]
pub enum Phase {
    Collecting(usize),
    /// Waiting on a collaborator to compute the step's artifact
    AwaitingDerived(usize),
    Terminal,
}

/// A computed artifact plus the answers it was computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Derived<A> {
    pub value: A,
    pub inputs: BTreeMap<String, Option<Answer>>,
    pub stale: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardState<A> {
    pub(super) phase: Phase,
    pub(super) answers: BTreeMap<String, Answer>,
    pub(super) derived: BTreeMap<String, Derived<A>>,
    pub(super) corrections: BTreeMap<String, Vec<String>>,
}

impl<A> WizardState<A> {
    pub(super) fn at(phase: Phase) -> Self {
        Self {
            phase,
            answers: BTreeMap::new(),
            derived: BTreeMap::new(),
            corrections: BTreeMap::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current step index, `None` once finished
    pub fn cursor(&self) -> Option<usize> {
        match self.phase {
            Phase::Collecting(i) | Phase::AwaitingDerived(i) => Some(i),
            Phase::Terminal => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == Phase::Terminal
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self.phase, Phase::AwaitingDerived(_))
    }

    pub fn answers(&self) -> &BTreeMap<String, Answer> {
        &self.answers
    }

    pub fn answer(&self, key: &str) -> Option<&Answer> {
        self.answers.get(key)
    }

    /// Raw artifact slot, including stale values
    pub fn artifact(&self, key: &str) -> Option<&Derived<A>> {
        self.derived.get(key)
    }

    pub fn corrections(&self, artifact: &str) -> &[String] {
        self.corrections.get(artifact).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

impl<A> Default for WizardState<A> {
    fn default() -> Self {
        Self::at(Phase::Collecting(0))
    }
}
