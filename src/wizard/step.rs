//! Step definitions and per-step answer validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::WizardError;

/// A collected answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Number(i64),
    Text(String),
}

impl Answer {
    pub fn text(s: impl Into<String>) -> Self {
        Answer::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Answer::Text(s) => Some(s),
            Answer::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Answer::Number(n) => Some(*n),
            Answer::Text(_) => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Answer::Text(s) if s.trim().is_empty())
    }
}

impl std::fmt::Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Answer::Number(n) => write!(f, "{}", n),
            Answer::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputShape {
    SingleLine,
    MultiLine,
    Choice { options: Vec<String> },
    Score { min: i32, max: i32 },
}

/// Only ask a step when an earlier answer equals `equals`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precondition {
    pub key: String,
    pub equals: String,
}

impl Precondition {
    pub fn holds(&self, answers: &BTreeMap<String, Answer>) -> bool {
        answers
            .get(&self.key)
            .is_some_and(|a| a.to_string().trim().eq_ignore_ascii_case(self.equals.trim()))
    }
}

/// An artifact computed by an outside collaborator when the step is reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedSpec {
    pub artifact: String,
    /// Upstream step keys; `None` means every earlier step
    pub depends_on: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    pub key: String,
    pub prompt: String,
    pub shape: InputShape,
    pub required: bool,
    pub min_len: usize,
    pub max_len: Option<usize>,
    pub precondition: Option<Precondition>,
    pub derives: Option<DerivedSpec>,
}

impl StepSpec {
    fn with_shape(key: impl Into<String>, prompt: impl Into<String>, shape: InputShape) -> Self {
        Self {
            key: key.into(),
            prompt: prompt.into(),
            shape,
            required: true,
            min_len: 0,
            max_len: None,
            precondition: None,
            derives: None,
        }
    }

    pub fn single_line(key: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::with_shape(key, prompt, InputShape::SingleLine)
    }

    pub fn multi_line(key: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::with_shape(key, prompt, InputShape::MultiLine)
    }

    pub fn choice<I, S>(key: impl Into<String>, prompt: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = options.into_iter().map(Into::into).collect();
        Self::with_shape(key, prompt, InputShape::Choice { options })
    }

    pub fn score(key: impl Into<String>, prompt: impl Into<String>, min: i32, max: i32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self::with_shape(key, prompt, InputShape::Score { min, max })
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn min_len(mut self, n: usize) -> Self {
        self.min_len = n;
        self
    }

    pub fn max_len(mut self, n: usize) -> Self {
        self.max_len = Some(n);
        self
    }

    pub fn when(mut self, key: impl Into<String>, equals: impl Into<String>) -> Self {
        self.precondition = Some(Precondition { key: key.into(), equals: equals.into() });
        self
    }

    pub fn derives(mut self, artifact: impl Into<String>) -> Self {
        self.derives = Some(DerivedSpec { artifact: artifact.into(), depends_on: None });
        self
    }

    pub fn derives_from<I, S>(mut self, artifact: impl Into<String>, depends_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.derives = Some(DerivedSpec {
            artifact: artifact.into(),
            depends_on: Some(depends_on.into_iter().map(Into::into).collect()),
        });
        self
    }

    pub fn artifact(&self) -> Option<&str> {
        self.derives.as_ref().map(|d| d.artifact.as_str())
    }

    /// Canonical form of an answer: scores clamped, choices matched to
    /// their configured spelling.
    pub fn normalize(&self, answer: Answer) -> Answer {
        match (&self.shape, answer) {
            (InputShape::Score { min, max }, Answer::Number(n)) => {
                Answer::Number(n.clamp(*min as i64, *max as i64))
            }
            (InputShape::Score { min, max }, Answer::Text(s)) => {
                let fallback = if *min <= 0 && 0 <= *max { 0 } else { (min + max) / 2 };
                let trimmed = s.trim();
                let n = trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| trimmed.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64))
                    .unwrap_or(fallback as i64);
                Answer::Number(n.clamp(*min as i64, *max as i64))
            }
            (InputShape::Choice { options }, Answer::Text(s)) => {
                match options.iter().find(|o| o.eq_ignore_ascii_case(s.trim())) {
                    Some(canonical) => Answer::Text(canonical.clone()),
                    None => Answer::Text(s),
                }
            }
            (_, other) => other,
        }
    }

    /// Check the required flag, length bounds and choice membership
    pub fn validate(&self, answer: Option<&Answer>) -> Result<(), WizardError> {
        let answer = match answer {
            Some(a) if !a.is_blank() => a,
            _ if self.required => return Err(WizardError::Required { step: self.key.clone() }),
            _ => return Ok(()),
        };

        if let Answer::Text(text) = answer {
            let got = text.trim().chars().count();
            if got < self.min_len {
                return Err(WizardError::TooShort { step: self.key.clone(), min: self.min_len, got });
            }
            if let Some(max) = self.max_len {
                let got = text.chars().count();
                if got > max {
                    return Err(WizardError::TooLong { step: self.key.clone(), max, got });
                }
            }
            if let InputShape::Choice { options } = &self.shape {
                if !options.iter().any(|o| o == text) {
                    return Err(WizardError::InvalidChoice { step: self.key.clone(), value: text.clone() });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_and_optional() {
        let step = StepSpec::single_line("decision", "Decision (one sentence)");
        assert_eq!(step.validate(None), Err(WizardError::Required { step: "decision".to_string() }));
        assert!(step.validate(Some(&Answer::text("   "))).is_err());

        let step = step.optional();
        assert!(step.validate(None).is_ok());
        assert!(step.validate(Some(&Answer::text(""))).is_ok());
    }

    #[test]
    fn test_length_bounds_count_chars() {
        let step = StepSpec::multi_line("why", "Why?").min_len(5).max_len(6);
        assert!(matches!(step.validate(Some(&Answer::text("abc"))), Err(WizardError::TooShort { got: 3, .. })));
        assert!(step.validate(Some(&Answer::text("ééééé"))).is_ok());
        assert!(matches!(step.validate(Some(&Answer::text("abcdefg"))), Err(WizardError::TooLong { got: 7, .. })));
    }

    #[test]
    fn test_choice_normalize_and_validate() {
        let step = StepSpec::choice("has_goal", "Is there a goal?", ["Yes", "No"]);
        let normalized = step.normalize(Answer::text(" yes "));
        assert_eq!(normalized, Answer::text("Yes"));
        assert!(step.validate(Some(&normalized)).is_ok());
        assert!(matches!(step.validate(Some(&Answer::text("Maybe"))), Err(WizardError::InvalidChoice { .. })));
    }

    #[test]
    fn test_score_normalize_clamps() {
        let step = StepSpec::score("Energy", "Energy", -2, 2);
        assert_eq!(step.normalize(Answer::Number(5)), Answer::Number(2));
        assert_eq!(step.normalize(Answer::text("-1")), Answer::Number(-1));
        assert_eq!(step.normalize(Answer::text("lots")), Answer::Number(0));

        let step = StepSpec::score("Energy", "Energy", 1, 10);
        assert_eq!(step.normalize(Answer::text("lots")), Answer::Number(5));
        assert_eq!(step.normalize(Answer::text("7.6")), Answer::Number(8));
    }

    #[test]
    fn test_precondition() {
        let pre = Precondition { key: "has_goal".to_string(), equals: "Yes".to_string() };
        let mut answers = BTreeMap::new();
        assert!(!pre.holds(&answers));
        answers.insert("has_goal".to_string(), Answer::text("yes"));
        assert!(pre.holds(&answers));
        answers.insert("has_goal".to_string(), Answer::text("No"));
        assert!(!pre.holds(&answers));
    }

    #[test]
    fn test_answer_untagged_serde() {
        assert_eq!(serde_json::to_string(&Answer::Number(3)).unwrap(), "3");
        let a: Answer = serde_json::from_str("\"hi\"").unwrap();
        assert_eq!(a, Answer::text("hi"));
    }
}
