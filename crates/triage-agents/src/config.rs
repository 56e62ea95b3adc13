//! Runtime configuration for the triage service.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Environment variable overrides (e.g. `AUTOCRM_MODEL`)
//! 2. Values from the `--config` TOML file
//! 3. Built-in defaults
//!
//! | Env var                     | Field            | Default                     |
//! |-----------------------------|------------------|-----------------------------|
//! | `AUTOCRM_MODEL_URL`         | `model.base_url` | `https://api.openai.com/v1` |
//! | `AUTOCRM_MODEL_API_KEY`     | `model.api_key`  | `OPENAI_API_KEY` or `not-needed` |
//! | `AUTOCRM_MODEL`             | `model.model`    | `gpt-4o-mini`               |
//! | `AUTOCRM_DATABASE_URL`      | `database_url`   | unset                       |
//! | `AUTOCRM_HISTORY_LIMIT`     | `history_limit`  | 100                         |

use std::path::Path;

use anyhow::{Context, Result};
use rig::providers::openai;
use serde::{Deserialize, Serialize};

use coordination::aggregate::DEFAULT_HISTORY_LIMIT;

const DEFAULT_MODEL_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_API_KEY: &str = "not-needed";
/// Shortest ticket title the classifier accepts (after trimming).
const DEFAULT_MIN_TITLE_LEN: usize = 3;

const ENV_MODEL_URL: &str = "AUTOCRM_MODEL_URL";
const ENV_MODEL_API_KEY: &str = "AUTOCRM_MODEL_API_KEY";
const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const ENV_MODEL: &str = "AUTOCRM_MODEL";
const ENV_DATABASE_URL: &str = "AUTOCRM_DATABASE_URL";
const ENV_HISTORY_LIMIT: &str = "AUTOCRM_HISTORY_LIMIT";

/// OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl Default for ModelEndpoint {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MODEL_URL.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Top-level triage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub model: ModelEndpoint,
    /// Postgres connection string. `None` means no database is configured.
    pub database_url: Option<String>,
    /// Resolution records considered per agent-info lookup.
    pub history_limit: usize,
    pub min_title_len: usize,
    pub classifier_temperature: f64,
    pub router_temperature: f64,
    pub assigner_temperature: f64,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            model: ModelEndpoint::default(),
            database_url: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            min_title_len: DEFAULT_MIN_TITLE_LEN,
            classifier_temperature: 0.1,
            router_temperature: 0.2,
            assigner_temperature: 0.2,
        }
    }
}

impl TriageConfig {
    /// Defaults, then the optional TOML file, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply environment-style overrides from `lookup`.
    ///
    /// Unparseable numeric values are ignored and the previous value kept.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_MODEL_URL) {
            self.model.base_url = url;
        }
        if let Some(key) = lookup(ENV_MODEL_API_KEY).or_else(|| lookup(ENV_OPENAI_API_KEY)) {
            self.model.api_key = key;
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.model.model = model;
        }
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            self.database_url = Some(url);
        }
        if let Some(limit) = lookup(ENV_HISTORY_LIMIT)
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
        {
            self.history_limit = limit;
        }
    }

    /// Validate the config; return an error string if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.model.trim().is_empty() {
            return Err("model.model must not be empty".to_string());
        }
        if self.model.base_url.trim().is_empty() {
            return Err("model.base_url must not be empty".to_string());
        }
        if self.history_limit == 0 {
            return Err("history_limit must be > 0".to_string());
        }
        for (name, value) in [
            ("classifier_temperature", self.classifier_temperature),
            ("router_temperature", self.router_temperature),
            ("assigner_temperature", self.assigner_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(format!("{name} must be in [0, 2], got {value}"));
            }
        }
        Ok(())
    }

    /// Build a Rig OpenAI-compatible client for the configured endpoint.
    pub fn model_client(&self) -> Result<openai::CompletionsClient> {
        openai::CompletionsClient::builder()
            .api_key(&self.model.api_key)
            .base_url(&self.model.base_url)
            .build()
            .context("Failed to build model CompletionsClient")
    }
}

/// Check if an inference endpoint is reachable (GET /models).
pub async fn check_endpoint(url: &str, api_key: Option<&str>) -> bool {
    let models_url = format!("{}/models", url.trim_end_matches('/'));
    let mut request = reqwest::Client::new()
        .get(&models_url)
        .timeout(std::time::Duration::from_secs(5));
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }
    match request.send().await {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}
