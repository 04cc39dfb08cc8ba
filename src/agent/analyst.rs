//! Scorecard Analyst
//!
//! Asks a language model to score a decision against the configured
//! dimensions and validates the reply against a fixed JSON schema.
//!
//! The reply must contain a `scores` object. Everything below that is
//! repaired rather than rejected: scores are clamped, missing scores take
//! the scale default and missing text becomes [`PLACEHOLDER`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use super::LLMProvider;
use crate::safety::{GuardError, InputGuard};
use crate::scoring::{DimensionSet, ScoreScale, ScoreSet};

pub const PLACEHOLDER: &str = "No rationale provided.";

const SYSTEM_PROMPT: &str = "You help a person think through a pending life decision. \
    You score how the decision affects each of their core values and explain each score in one sentence. \
    You reply with a single JSON object and nothing else.";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("model call failed: {0}")]
    Provider(String),

    #[error("model reply is not valid JSON: {0}")]
    Malformed(String),

    #[error("model reply is missing '{0}'")]
    MissingField(&'static str),

    #[error(transparent)]
    Rejected(#[from] GuardError),
}

/// Payload describing the decision to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub decision: String,
    pub goal: Option<String>,
    /// Free-text answers keyed by question
    pub answers: BTreeMap<String, String>,
    /// Dimension names, most important first
    pub dimensions: Vec<String>,
    pub corrections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub scores: BTreeMap<String, i32>,
    pub rationale: BTreeMap<String, String>,
    pub outcome_if_acted: String,
    pub outcome_if_not: String,
}

impl Analysis {
    pub fn score_set(&self, dimensions: &DimensionSet, scale: ScoreScale) -> ScoreSet {
        ScoreSet::from_pairs(dimensions, scale, self.scores.iter().map(|(k, v)| (k.as_str(), *v as i64)))
    }
}

fn text_or_placeholder(value: Option<&Value>) -> String {
    value
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(PLACEHOLDER)
        .to_string()
}

/// Validate a raw model reply
pub fn parse_analysis(raw: &str, dimensions: &DimensionSet, scale: ScoreScale) -> Result<Analysis, AnalysisError> {
    let (start, end) = match (raw.find('{'), raw.rfind('}')) {
        (Some(s), Some(e)) if s < e => (s, e),
        _ => return Err(AnalysisError::Malformed("no JSON object in reply".to_string())),
    };

    let value: Value = serde_json::from_str(&raw[start..=end]).map_err(|e| AnalysisError::Malformed(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| AnalysisError::Malformed("reply is not a JSON object".to_string()))?;

    let raw_scores = obj
        .get("scores")
        .and_then(|v| v.as_object())
        .ok_or(AnalysisError::MissingField("scores"))?;
    let scores = ScoreSet::from_raw(dimensions, scale, raw_scores).to_map();

    let empty = Map::new();
    let raw_rationale = obj.get("rationale").and_then(|v| v.as_object()).unwrap_or(&empty);
    let mut rationale: BTreeMap<String, String> = dimensions
        .iter()
        .map(|d| (d.to_string(), PLACEHOLDER.to_string()))
        .collect();
    for (name, text) in raw_rationale {
        if let Some(canonical) = dimensions.resolve(name) {
            rationale.insert(canonical.to_string(), text_or_placeholder(Some(text)));
        }
    }

    Ok(Analysis {
        scores,
        rationale,
        outcome_if_acted: text_or_placeholder(obj.get("outcome_if_acted")),
        outcome_if_not: text_or_placeholder(obj.get("outcome_if_not")),
    })
}

pub struct ScorecardAnalyst {
    provider: Arc<dyn LLMProvider>,
    model: String,
    guard: InputGuard,
    dimensions: DimensionSet,
    scale: ScoreScale,
}

impl ScorecardAnalyst {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        model: impl Into<String>,
        dimensions: DimensionSet,
        scale: ScoreScale,
        max_chars: usize,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            guard: InputGuard::new(max_chars),
            dimensions,
            scale,
        }
    }

    /// Prompt text; every free-text field passes the input guard first
    pub fn build_prompt(&self, request: &AnalysisRequest) -> Result<String, GuardError> {
        let decision = self.guard.prepare("decision", &request.decision)?;
        let goal = match &request.goal {
            Some(g) => Some(self.guard.prepare("goal", g)?),
            None => None,
        };
        let mut answers = Map::new();
        for (question, answer) in &request.answers {
            answers.insert(question.clone(), Value::String(self.guard.prepare(question, answer)?));
        }
        let corrections = request
            .corrections
            .iter()
            .map(|c| self.guard.prepare("correction", c))
            .collect::<Result<Vec<_>, _>>()?;

        let payload = json!({
            "decision": decision,
            "goal": goal,
            "answers": answers,
            "values_ranked": request.dimensions,
            "scale": { "min": self.scale.min(), "max": self.scale.max() },
            "corrections": corrections,
        });

        let mut example_scores = Map::new();
        let mut example_rationale = Map::new();
        for d in self.dimensions.iter() {
            example_scores.insert(d.to_string(), json!(self.scale.default_score()));
            example_rationale.insert(d.to_string(), json!("one sentence"));
        }
        let schema = json!({
            "scores": example_scores,
            "rationale": example_rationale,
            "outcome_if_acted": "two sentences",
            "outcome_if_not": "two sentences",
        });

        Ok(format!(
            "Score the decision below for each value, using whole numbers from {min} to {max}. \
             If corrections are listed, they override your earlier reading of the decision.\n\n\
             Reply with JSON shaped exactly like:\n{schema}\n\nDecision:\n{payload}",
            min = self.scale.min(),
            max = self.scale.max(),
            schema = schema,
            payload = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string()),
        ))
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis, AnalysisError> {
        let prompt = self.build_prompt(request)?;
        info!("Requesting analysis from model {}", self.model);

        let raw = self
            .provider
            .generate(&self.model, prompt, Some(SYSTEM_PROMPT.to_string()))
            .await
            .map_err(|e| AnalysisError::Provider(format!("{e:#}")))?;
        debug!("Model reply: {}", raw);

        parse_analysis(&raw, &self.dimensions, self.scale)
    }
}
