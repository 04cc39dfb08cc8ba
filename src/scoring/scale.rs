//! Score Scale
//!
//! Bounded integer ranges for dimension scores and the clamping rules that
//! turn arbitrary input into an in-range score.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// The two score ranges used by the scorecard policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScale {
    /// Impact scale, -2 (severe harm) to +2 (strong benefit)
    Signed,
    /// Rating scale, 1 to 10
    Positive,
}

impl ScoreScale {
    pub fn min(&self) -> i32 {
        match self {
            ScoreScale::Signed => -2,
            ScoreScale::Positive => 1,
        }
    }

    pub fn max(&self) -> i32 {
        match self {
            ScoreScale::Signed => 2,
            ScoreScale::Positive => 10,
        }
    }

    /// Value used when input cannot be read as a number
    pub fn default_score(&self) -> i32 {
        match self {
            ScoreScale::Signed => 0,
            ScoreScale::Positive => (self.min() + self.max()) / 2,
        }
    }

    pub fn contains(&self, score: i32) -> bool {
        (self.min()..=self.max()).contains(&score)
    }

    /// All admissible scores, lowest first
    pub fn values(&self) -> Vec<i32> {
        (self.min()..=self.max()).collect()
    }

    pub fn clamp_int(&self, raw: i64) -> i32 {
        let clamped = raw.clamp(self.min() as i64, self.max() as i64) as i32;
        if clamped as i64 != raw {
            debug!("Clamped score {} into [{}, {}]", raw, self.min(), self.max());
        }
        clamped
    }

    pub fn clamp_float(&self, raw: f64) -> i32 {
        if !raw.is_finite() {
            return self.default_score();
        }
        // Saturating cast; the clamp below handles the rest.
        self.clamp_int(raw.round() as i64)
    }

    pub fn clamp_str(&self, raw: &str) -> i32 {
        let trimmed = raw.trim();
        if let Ok(v) = trimmed.parse::<i64>() {
            return self.clamp_int(v);
        }
        match trimmed.parse::<f64>() {
            Ok(v) => self.clamp_float(v),
            Err(_) => {
                debug!("Unparseable score '{}', using default {}", raw, self.default_score());
                self.default_score()
            }
        }
    }

    /// Clamp a loosely-typed value (as received from forms or model output)
    pub fn clamp(&self, raw: &Value) -> i32 {
        match raw {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    self.clamp_int(i)
                } else if let Some(u) = n.as_u64() {
                    self.clamp_int(i64::try_from(u).unwrap_or(i64::MAX))
                } else {
                    n.as_f64().map(|f| self.clamp_float(f)).unwrap_or_else(|| self.default_score())
                }
            }
            Value::String(s) => self.clamp_str(s),
            _ => self.default_score(),
        }
    }
}

impl std::fmt::Display for ScoreScale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.min(), self.max())
    }
}
