//! Configuration management
//!
//! Model endpoint, storage location and feedback-window settings, kept in
//! a TOML file under the platform config directory. API keys are read from
//! the environment and never written to the file.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::agent::llm::ProviderConfig;
use crate::agent::session::DEFAULT_INSTRUCTIONS;
use crate::feedback::context::DEFAULT_EXAMPLE_LIMIT;
use crate::feedback::SUMMARY_WINDOW;

/// Environment variables checked for the API key, in order
pub const API_KEY_VARS: &[&str] = &["FEEDBACK_AGENT_API_KEY", "OPENAI_API_KEY", "AZURE_OPENAI_API_KEY"];

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Which chat-completions dialect to speak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    OpenRouter,
    Azure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: Provider,
    /// Overrides the provider's default URL; required for Azure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Azure deployment name (defaults to `model`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            base_url: None,
            model: default_model(),
            deployment: None,
            api_version: None,
            max_tokens: default_max_tokens(),
            temperature: None,
        }
    }
}

impl LlmConfig {
    /// Provider settings with the given key
    pub fn provider_config(&self, api_key: String) -> Result<ProviderConfig> {
        let config = match (self.provider, self.base_url.as_deref()) {
            (Provider::Azure, Some(endpoint)) => ProviderConfig::azure(
                endpoint,
                self.deployment.as_deref().unwrap_or(&self.model),
                self.api_version.as_deref(),
                api_key,
            ),
            (Provider::Azure, None) => bail!("llm.base_url must be set to the Azure OpenAI endpoint"),
            (_, Some(base_url)) => ProviderConfig::openai_compatible(base_url, api_key, &self.model),
            (Provider::OpenAi, None) => ProviderConfig::openai(api_key, &self.model),
            (Provider::OpenRouter, None) => ProviderConfig::openrouter(api_key, &self.model),
        };
        Ok(config)
    }

    /// Provider settings with the key taken from the environment
    pub fn provider_from_env(&self) -> Result<ProviderConfig> {
        let api_key = api_key_from_env().with_context(|| {
            format!("No API key found. Set one of: {}", API_KEY_VARS.join(", "))
        })?;
        self.provider_config(api_key)
    }
}

/// First non-empty API key in the environment
pub fn api_key_from_env() -> Option<String> {
    API_KEY_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|key| !key.trim().is_empty())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file; defaults to `feedback.db` in the data dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("feedback.db")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// Records the summary is computed over
    #[serde(default = "default_summary_window")]
    pub summary_window: usize,
    /// Helpful exchanges quoted in the prompt context
    #[serde(default = "default_example_limit")]
    pub example_limit: usize,
    /// Records shown by `history`
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_user_id() -> String {
    "default_user".to_string()
}

fn default_summary_window() -> usize {
    SUMMARY_WINDOW
}

fn default_example_limit() -> usize {
    DEFAULT_EXAMPLE_LIMIT
}

fn default_history_limit() -> usize {
    5
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            summary_window: default_summary_window(),
            example_limit: default_example_limit(),
            history_limit: default_history_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_instructions")]
    pub instructions: String,
}

fn default_instructions() -> String {
    DEFAULT_INSTRUCTIONS.to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            instructions: default_instructions(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, writing defaults on
    /// first use
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&contents).context("Failed to parse config file")
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent().context("Config path has no parent")?;
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "feedback-agent", "feedback-agent")
        .context("Failed to get project directories")
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

/// Print the configuration loaded from `path`
pub fn show_config(config: &Config, path: &Path) -> Result<()> {
    println!("Configuration ({}):\n", path.display());
    println!("{}", toml::to_string_pretty(config).context("Failed to serialize config")?);
    println!(
        "API key: {}",
        if api_key_from_env().is_some() { "set (environment)" } else { "not set" }
    );
    Ok(())
}

/// Get default configuration as TOML string
pub fn default_config_toml() -> String {
    let config = Config::default();
    toml::to_string_pretty(&config).unwrap_or_else(|_| "# Default configuration\n".to_string())
}
