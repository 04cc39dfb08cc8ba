//! Input guard applied to every free-text field before it leaves the
//! process.

use thiserror::Error;
use tracing::{debug, warn};

use super::filter::ContentFilter;
use crate::utils::truncate_chars;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{field}' was blocked: {}", reasons.join(", "))]
pub struct GuardError {
    pub field: String,
    pub reasons: Vec<String>,
}

pub struct InputGuard {
    filter: ContentFilter,
    max_chars: usize,
}

impl InputGuard {
    pub fn new(max_chars: usize) -> Self {
        Self {
            filter: ContentFilter::new(),
            max_chars,
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Strip control characters, bound the length and reject steering text
    pub fn prepare(&self, field: &str, text: &str) -> Result<String, GuardError> {
        let cleaned: String = text
            .chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect();
        let cleaned = cleaned.trim();

        let result = self.filter.check(cleaned);
        if !result.is_clean() {
            warn!("Field '{}' blocked by content filter: {:?}", field, result.reasons);
            return Err(GuardError {
                field: field.to_string(),
                reasons: result.reasons,
            });
        }

        let bounded = truncate_chars(cleaned, self.max_chars);
        if bounded.len() < cleaned.len() {
            debug!("Field '{}' truncated to {} chars", field, self.max_chars);
        }
        Ok(bounded)
    }
}
