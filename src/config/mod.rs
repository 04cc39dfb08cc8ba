//! Scorecard profile
//!
//! One JSON document selects the dimensions, the verdict policy, weights,
//! text bounds, the model backend and where records are kept. A missing
//! file is created with the defaults on first load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::scoring::{DimensionSet, ScoreScale, WeightSet};
use crate::verdict::{PolicyConfig, ThresholdPolicy, VerdictPolicy};

pub const ENV_MODEL: &str = "SCORECARD_MODEL";
pub const ENV_PROVIDER_URL: &str = "SCORECARD_PROVIDER_URL";
pub const ENV_API_KEY: &str = "SCORECARD_API_KEY";

/// Which model backend answers analysis requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    Ollama {
        host: String,
        port: u16,
    },
    OpenAiCompatible {
        base_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
        #[serde(default = "default_temperature")]
        temperature: f32,
    },
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Ollama {
            host: "http://localhost".to_string(),
            port: 11434,
        }
    }
}

impl ProviderConfig {
    /// Split `http://host:port` into the pieces `ollama-rs` wants
    fn ollama_from_url(url: &str) -> Self {
        let url = url.trim_end_matches('/');
        let scheme_end = url.find("://").map_or(0, |i| i + 3);
        match url[scheme_end..].rsplit_once(':') {
            Some((host, port)) => match port.parse::<u16>() {
                Ok(port) => ProviderConfig::Ollama {
                    host: format!("{}{}", &url[..scheme_end], host),
                    port,
                },
                Err(_) => ProviderConfig::Ollama { host: url.to_string(), port: 11434 },
            },
            None => ProviderConfig::Ollama { host: url.to_string(), port: 11434 },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorecardProfile {
    pub dimensions: DimensionSet,
    pub policy: PolicyConfig,
    /// Relative weight per dimension; empty means equal weighting
    pub weights: BTreeMap<String, f64>,
    /// Score with the model (true) or ask for each score by hand
    pub assisted: bool,
    /// Upper bound on any free-text answer
    pub max_text_len: usize,
    pub model: String,
    pub provider: ProviderConfig,
    pub data_file: PathBuf,
    pub log_file: PathBuf,
}

impl Default for ScorecardProfile {
    fn default() -> Self {
        Self {
            dimensions: DimensionSet::core_values(),
            policy: PolicyConfig::default(),
            weights: BTreeMap::new(),
            assisted: true,
            max_text_len: 500,
            model: "llama3.2".to_string(),
            provider: ProviderConfig::default(),
            data_file: PathBuf::from("decisions.json"),
            log_file: PathBuf::from("scorecard.log"),
        }
    }
}

impl ScorecardProfile {
    /// Core values rated 1..10 against the canonical bands
    pub fn threshold_preset() -> Self {
        Self {
            policy: PolicyConfig::Threshold(ThresholdPolicy::default()),
            ..Self::default()
        }
    }

    /// Impact on the life pillars, -2..2, signed-sum verdict
    pub fn pillars_preset() -> Self {
        Self {
            dimensions: DimensionSet::life_pillars(),
            ..Self::default()
        }
    }

    pub fn scale(&self) -> ScoreScale {
        self.policy.scale()
    }

    /// `None` when no weights are configured
    pub fn weight_set(&self) -> Option<WeightSet> {
        if self.weights.is_empty() {
            None
        } else {
            Some(WeightSet::from_map(&self.dimensions, &self.weights))
        }
    }

    /// Apply `SCORECARD_*` variables from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(model) = lookup(ENV_MODEL) {
            debug!("Model overridden from {}", ENV_MODEL);
            self.model = model;
        }

        let url = lookup(ENV_PROVIDER_URL);
        let key = lookup(ENV_API_KEY);
        self.provider = match (self.provider, url, key) {
            (ProviderConfig::Ollama { .. }, Some(url), None) => ProviderConfig::ollama_from_url(&url),
            // an API key means a hosted OpenAI-style endpoint
            (ProviderConfig::Ollama { .. }, url, Some(key)) => ProviderConfig::OpenAiCompatible {
                base_url: url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
                api_key: Some(key),
                temperature: default_temperature(),
            },
            (ProviderConfig::OpenAiCompatible { base_url, api_key, temperature }, url, key) => {
                ProviderConfig::OpenAiCompatible {
                    base_url: url.unwrap_or(base_url),
                    api_key: key.or(api_key),
                    temperature,
                }
            }
            (provider, None, None) => provider,
        };
        self
    }
}

pub struct ProfileManager {
    path: PathBuf,
}

impl ProfileManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<ScorecardProfile> {
        if !self.path.exists() {
            let default = ScorecardProfile::default();
            self.save(&default).await?;
            info!("Wrote default profile to {}", self.path.display());
            return Ok(default);
        }
        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read profile {}", self.path.display()))?;
        let profile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse profile {}", self.path.display()))?;
        Ok(profile)
    }

    pub async fn save(&self, profile: &ScorecardProfile) -> Result<()> {
        let content = serde_json::to_string_pretty(profile).context("Failed to serialize profile")?;
        fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write profile {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_profile_save_load() {
        let temp_file = NamedTempFile::new().unwrap();
        let manager = ProfileManager::new(temp_file.path());

        let mut profile = ScorecardProfile::pillars_preset();
        profile.policy = PolicyConfig::Threshold(ThresholdPolicy::default());
        profile.weights.insert("Family".to_string(), 2.0);
        profile.provider = ProviderConfig::OpenAiCompatible {
            base_url: "http://localhost:8000/v1".to_string(),
            api_key: None,
            temperature: 0.0,
        };

        manager.save(&profile).await.unwrap();
        let loaded = manager.load().await.unwrap();
        assert_eq!(profile, loaded);
    }

    #[tokio::test]
    async fn test_profile_load_writes_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("profile.json");
        let manager = ProfileManager::new(path.clone());

        let loaded = manager.load().await.unwrap();
        assert_eq!(loaded, ScorecardProfile::default());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_partial_profile_fills_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), r#"{"model": "qwen2.5", "assisted": false}"#).unwrap();

        let loaded = ProfileManager::new(temp_file.path()).load().await.unwrap();
        assert_eq!(loaded.model, "qwen2.5");
        assert!(!loaded.assisted);
        assert_eq!(loaded.scale(), ScoreScale::Signed);
        assert_eq!(loaded.dimensions, DimensionSet::core_values());
    }

    #[tokio::test]
    async fn test_broken_profile_is_an_error() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "{not json").unwrap();
        assert!(ProfileManager::new(temp_file.path()).load().await.is_err());
    }

    #[test]
    fn test_weight_set_only_when_configured() {
        let mut profile = ScorecardProfile::default();
        assert!(profile.weight_set().is_none());
        profile.weights.insert("Security".to_string(), 3.0);
        let weights = profile.weight_set().unwrap();
        assert!((weights.get("Security") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_env_overrides() {
        let env = |pairs: &'static [(&'static str, &'static str)]| {
            move |key: &str| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
        };

        let p = ScorecardProfile::default().with_overrides(env(&[(ENV_MODEL, "mistral"), (ENV_PROVIDER_URL, "http://gpu-box:11500")]));
        assert_eq!(p.model, "mistral");
        assert_eq!(p.provider, ProviderConfig::Ollama { host: "http://gpu-box".to_string(), port: 11500 });

        let p = ScorecardProfile::default().with_overrides(env(&[(ENV_API_KEY, "sk-test")]));
        assert!(matches!(
            p.provider,
            ProviderConfig::OpenAiCompatible { ref base_url, api_key: Some(ref k), .. }
                if base_url == "https://api.openai.com/v1" && k == "sk-test"
        ));

        let p = ScorecardProfile::default().with_overrides(env(&[(ENV_MODEL, "   ")]));
        assert_eq!(p, ScorecardProfile::default());
    }
}
