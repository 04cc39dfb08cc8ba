//! Decision Store - keeps every scored decision in one JSON file
//!
//! Records are kept newest first and are never edited after they are
//! written. A file that cannot be read is treated as an empty history.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::scoring::ScoreSet;
use crate::verdict::{Fragility, Verdict, VerdictLabel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: String,
    /// ISO-8601, seconds precision
    pub timestamp: String,
    pub date: String,
    pub decision: String,
    #[serde(default)]
    pub goal: Option<String>,
    pub scores: BTreeMap<String, i32>,
    pub total_score: i32,
    pub aggregate: f64,
    #[serde(default)]
    pub inaction_cost: String,
    #[serde(default)]
    pub fragility: Fragility,
    #[serde(default)]
    pub next_action: String,
    pub verdict: VerdictLabel,
    #[serde(default)]
    pub rationale: BTreeMap<String, String>,
    #[serde(default)]
    pub outcome_if_acted: Option<String>,
    #[serde(default)]
    pub outcome_if_not: Option<String>,
}

impl DecisionRecord {
    /// New record stamped with the current local time
    pub fn new(decision: impl Into<String>, scores: &ScoreSet, verdict: &Verdict) -> Self {
        Self::at(Local::now(), decision, scores, verdict)
    }

    pub fn at(when: DateTime<Local>, decision: impl Into<String>, scores: &ScoreSet, verdict: &Verdict) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: when.format("%Y-%m-%dT%H:%M:%S").to_string(),
            date: when.format("%Y-%m-%d").to_string(),
            decision: decision.into(),
            goal: None,
            scores: scores.to_map(),
            total_score: verdict.total,
            aggregate: verdict.aggregate,
            inaction_cost: String::new(),
            fragility: Fragility::default(),
            next_action: String::new(),
            verdict: verdict.label,
            rationale: BTreeMap::new(),
            outcome_if_acted: None,
            outcome_if_not: None,
        }
    }
}

pub struct DecisionStore {
    path: PathBuf,
}

impl DecisionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records, newest first. Missing or unreadable files yield an
    /// empty history.
    pub async fn load(&self) -> Vec<DecisionRecord> {
        if !self.path.exists() {
            return Vec::new();
        }

        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) => {
                warn!("Could not read {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&json) {
            Ok(records) => records,
            Err(e) => {
                warn!("Ignoring unreadable history in {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    /// Prepend `record` and rewrite the file
    pub async fn append(&self, record: DecisionRecord) -> Result<()> {
        let mut records = self.load().await;
        let id = record.id.clone();
        records.insert(0, record);
        self.save(&records).await?;
        info!("Saved decision {} ({} total)", id, records.len());
        Ok(())
    }

    pub async fn save(&self, records: &[DecisionRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records).context("Failed to serialize decision history")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).await?;
        }
        Ok(())
    }
}
