//! Orchestrator Module
//!
//! Drives one scorecard session: wizard state, model analysis, verdict and
//! the terminal front end.

pub mod cli;
pub mod session;

pub use cli::ScorecardCLI;
pub use session::{build_steps, score_key, Artifact, ScorecardSession, SessionError, ANALYSIS, VERDICT};
