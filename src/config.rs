use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

const CONFIG_FILE: &str = ".ai-pr-reviewer.toml";

pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat-v3-0324";
pub const DEFAULT_API_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .ai-pr-reviewer.toml.
///
/// Loaded once at startup and passed by reference into the pipeline;
/// nothing mutates it after `load` returns. All fields are optional:
/// the tool works with zero config as long as the token and API key are
/// present in the environment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// GitHub-specific settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Completion API settings
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    /// Completion API key. If None, falls back to OPENROUTER_API_KEY,
    /// then OPENAI_API_KEY.
    pub key: Option<String>,

    /// Model identifier sent with every completion request.
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible completion endpoint.
    pub base_url: Option<String>,
}

impl Config {
    /// Load configuration from .ai-pr-reviewer.toml in the current
    /// directory. Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(CONFIG_FILE);
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// falls back to GITHUB_TOKEN env var.
    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
    }

    /// Resolve the completion API key: config file value, then
    /// OPENROUTER_API_KEY, then OPENAI_API_KEY.
    pub fn api_key(&self) -> Option<String> {
        self.api
            .key
            .clone()
            .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }

    pub fn model(&self) -> &str {
        self.api.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn api_base_url(&self) -> &str {
        self.api.base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL)
    }
}
