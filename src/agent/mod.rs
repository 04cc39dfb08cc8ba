//! Agent Module
//!
//! Model backends and the scorecard analyst built on top of them.

mod analyst;
mod provider;

pub use analyst::{parse_analysis, Analysis, AnalysisError, AnalysisRequest, ScorecardAnalyst, PLACEHOLDER};
pub use provider::{provider_from_config, LLMProvider, OllamaProvider, OpenAICompatibleProvider};
