//! Wizard Module
//!
//! A step-gated data collection flow. Steps are validated before the cursor
//! moves on; artifacts computed from earlier answers (an AI reading of the
//! decision, a verdict) are invalidated whenever those answers change and
//! recomputed on the next read.

mod machine;
mod state;
mod step;

pub use machine::{DerivedRequest, Wizard, WizardEvent};
pub use state::{Derived, Phase, WizardState};
pub use step::{Answer, DerivedSpec, InputShape, Precondition, StepSpec};

use thiserror::Error;

/// Recoverable wizard failures; the state is left unchanged
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    #[error("'{step}' needs an answer")]
    Required { step: String },

    #[error("'{step}' needs at least {min} characters (got {got})")]
    TooShort { step: String, min: usize, got: usize },

    #[error("'{step}' allows at most {max} characters (got {got})")]
    TooLong { step: String, max: usize, got: usize },

    #[error("'{value}' is not one of the options for '{step}'")]
    InvalidChoice { step: String, value: String },

    #[error("still waiting for '{artifact}'")]
    AwaitingDerived { artifact: String },

    #[error("unknown derived artifact '{0}'")]
    UnknownArtifact(String),

    #[error("'{artifact}' has not been computed yet")]
    NotReached { artifact: String },

    #[error("the wizard is finished; go back or reset to change answers")]
    NotCollecting,
}
