//! Configuration loading and validation for ChatKit.
//!
//! Loads configuration from `~/.chatkit/config.toml` with environment
//! variable overrides. Validates all settings at load time.

use chatkit_stream::PathPattern;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.chatkit/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote agent backend
    #[serde(default)]
    pub backend: BackendConfig,

    /// Which patch paths render and which skills stay hidden
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Turn-level stream settings
    #[serde(default)]
    pub stream: StreamConfig,
}

/// Wire protocol spoken by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// DIP agent factory: JSON patch frames
    #[default]
    Dip,
    /// Coze v3 chat: typed delta events
    Coze,
}

impl BackendKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dip" => Some(Self::Dip),
            "coze" => Some(Self::Coze),
            _ => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dip => "dip",
            Self::Coze => "coze",
        })
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// DIP agent key, part of the completion URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,

    #[serde(default = "default_agent_version")]
    pub agent_version: String,

    #[serde(default = "default_executor_version")]
    pub executor_version: String,

    /// Bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Coze bot id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,

    /// Coze user id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:13020/api/agent-app/v1".into()
}
fn default_agent_version() -> String {
    "latest".into()
}
fn default_executor_version() -> String {
    "v2".into()
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("agent_key", &self.agent_key)
            .field("agent_id", &self.agent_id)
            .field("agent_version", &self.agent_version)
            .field("executor_version", &self.executor_version)
            .field("token", &redact(&self.token))
            .field("bot_id", &self.bot_id)
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            base_url: default_base_url(),
            agent_key: None,
            agent_id: None,
            agent_version: default_agent_version(),
            executor_version: default_executor_version(),
            token: None,
            bot_id: None,
            user_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Document paths holding the progress step array
    #[serde(default = "default_progress_roots")]
    pub progress_roots: Vec<String>,

    /// Skill names never rendered (compared case-insensitively)
    #[serde(default = "default_hidden_skills")]
    pub hidden_skills: Vec<String>,

    /// Answer actions never rendered
    #[serde(default = "default_hidden_actions")]
    pub hidden_actions: Vec<String>,
}

fn default_progress_roots() -> Vec<String> {
    vec![
        "message.content.middle_answer.progress".into(),
        "message.content.progress".into(),
    ]
}
fn default_hidden_skills() -> Vec<String> {
    vec!["search_memory".into(), "_date".into(), "build_memory".into()]
}
fn default_hidden_actions() -> Vec<String> {
    vec!["show_ds".into()]
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            progress_roots: default_progress_roots(),
            hidden_skills: default_hidden_skills(),
            hidden_actions: default_hidden_actions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Wall-clock limit for one turn (0 = none)
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,

    /// Buffered chunks between the HTTP reader and the assembler
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_turn_timeout_secs() -> u64 {
    300
}
fn default_channel_capacity() -> usize {
    64
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            turn_timeout_secs: default_turn_timeout_secs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.chatkit/config.toml).
    ///
    /// Environment variables override the file:
    /// - `CHATKIT_TOKEN`
    /// - `CHATKIT_BASE_URL`
    /// - `CHATKIT_AGENT_KEY`
    /// - `CHATKIT_BACKEND` (`dip` or `coze`)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, usually the process environment.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(token) = lookup("CHATKIT_TOKEN") {
            self.backend.token = Some(token);
        }
        if let Some(url) = lookup("CHATKIT_BASE_URL") {
            self.backend.base_url = url;
        }
        if let Some(key) = lookup("CHATKIT_AGENT_KEY") {
            self.backend.agent_key = Some(key);
        }
        if let Some(kind) = lookup("CHATKIT_BACKEND") {
            self.backend.kind = BackendKind::parse(&kind).ok_or_else(|| {
                ConfigError::ValidationError(format!("CHATKIT_BACKEND must be dip or coze, got {kind:?}"))
            })?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".chatkit")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.backend.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "backend.base_url must start with http:// or https://, got {url:?}"
            )));
        }

        if self.dispatch.progress_roots.is_empty() {
            return Err(ConfigError::ValidationError(
                "dispatch.progress_roots must not be empty".into(),
            ));
        }
        for root in &self.dispatch.progress_roots {
            // Same grammar the dispatch table compiles the roots with.
            let valid = !root.is_empty() && PathPattern::parse(root).is_some();
            if !valid {
                return Err(ConfigError::ValidationError(format!(
                    "dispatch.progress_roots has an invalid path: {root:?}"
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `chatkit config --init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
