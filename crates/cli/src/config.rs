use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "docflow.toml";
const DEFAULT_API_KEY_ENV: &str = "DOCFLOW_API_KEY";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_STATE_DIR: &str = ".docflow/runs";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocflowConfig {
    pub llm: LlmConfig,
    pub process: ProcessConfig,
    pub state: StateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub temperature: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    pub max_revisions: u32,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            max_revisions: orchestrator::documentation::MAX_REVISIONS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Persist step state here; unset keeps state in memory
    pub dir: Option<PathBuf>,
}

impl StateConfig {
    pub fn default_dir() -> PathBuf {
        PathBuf::from(DEFAULT_STATE_DIR)
    }
}

impl DocflowConfig {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        if config.process.max_revisions == 0 {
            bail!("process.max_revisions must be at least 1");
        }
        Ok(config)
    }

    pub fn api_key(&self) -> Result<String> {
        Self::key_from(&self.llm.api_key_env, std::env::var(&self.llm.api_key_env).ok())
    }

    fn key_from(var: &str, value: Option<String>) -> Result<String> {
        match value {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => bail!(
                "Missing API key: set the {} environment variable (or point llm.api_key_env at another one)",
                var
            ),
        }
    }
}
