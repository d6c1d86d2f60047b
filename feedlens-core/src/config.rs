//! Layered configuration: defaults → optional TOML file → `FEEDLENS__*` env → overrides

use crate::batcher::DEFAULT_BATCH_SIZE;
use crate::orchestrator::OrchestratorConfig;
use crate::{FeedbackError, Result};
use config as config_rs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "FEEDLENS";

#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    /// Requests per second
    pub rate_limit: f64,
    /// Upper bound on transport-level retry time for rate-limited calls
    pub max_retry_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentitySettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedlensConfig {
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
    /// Share of overall progress allotted to classification
    pub classification_progress_share: f64,
    pub top_topics: usize,
    pub llm: LlmSettings,
    pub store: StoreSettings,
    pub identity: IdentitySettings,
    #[serde(default)]
    pub database_url: Option<String>,
    pub bind_address: String,
}

impl FeedlensConfig {
    /// Load without a file or overrides.
    pub fn from_env() -> Result<Self> {
        Self::load(None, &[])
    }

    /// `overrides` are dotted keys (`llm.model`) and win over every other layer.
    pub fn load(file: Option<&Path>, overrides: &[(&str, String)]) -> Result<Self> {
        let mut builder = config_rs::Config::builder()
            .set_default("batch_size", DEFAULT_BATCH_SIZE as i64)?
            .set_default("max_concurrent_batches", 1_i64)?
            .set_default("classification_progress_share", 0.70)?
            .set_default("top_topics", 10_i64)?
            .set_default("llm.endpoint", "https://api.openai.com/v1/chat/completions")?
            .set_default("llm.model", "gpt-3.5-turbo")?
            .set_default("llm.timeout_secs", 30_i64)?
            .set_default("llm.rate_limit", 3.0)?
            .set_default("llm.max_retry_secs", 60_i64)?
            .set_default("store.path", ".feedlens/reports")?
            .set_default("identity.path", ".feedlens/client_id")?
            .set_default("bind_address", "127.0.0.1:8080")?;

        if let Some(path) = file {
            builder = builder.add_source(config_rs::File::from(path).required(true));
        }

        builder = builder.add_source(
            config_rs::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        // Conventional key name, lower priority than FEEDLENS__LLM__API_KEY
        if std::env::var(format!("{}__LLM__API_KEY", ENV_PREFIX)).is_err() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                builder = builder.set_override("llm.api_key", key)?;
            }
        }

        for (key, value) in overrides {
            builder = builder.set_override(*key, value.clone())?;
        }

        let config: FeedlensConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(FeedbackError::Configuration(
                "batch_size must be greater than zero".into(),
            ));
        }
        if !(self.classification_progress_share > 0.0 && self.classification_progress_share <= 1.0)
        {
            return Err(FeedbackError::Configuration(format!(
                "classification_progress_share must be in (0, 1], got {}",
                self.classification_progress_share
            )));
        }
        if self.llm.rate_limit <= 0.0 {
            return Err(FeedbackError::Configuration(
                "llm.rate_limit must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            batch_size: self.batch_size,
            max_concurrent_batches: self.max_concurrent_batches.max(1),
        }
    }
}
