//! Configuration loading, validation, and management for ragpilot.
//!
//! Loads `~/.ragpilot/config.toml`, overlays the project's
//! `.ragpilot/config.toml` table by table, then applies environment variable
//! overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Name of the per-project and per-user state directory.
pub const STATE_DIR: &str = ".ragpilot";

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Replaces the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Context window budgeting
    #[serde(default)]
    pub context: ContextConfig,

    /// Token counter selection
    #[serde(default)]
    pub tokenizer: TokenizerConfig,

    /// File index settings
    #[serde(default)]
    pub index: IndexConfig,

    /// Session persistence settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "deepseek".into()
}
fn default_model() -> String {
    "deepseek-chat".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("system_prompt", &self.system_prompt)
            .field("context", &self.context)
            .field("tokenizer", &self.tokenizer)
            .field("index", &self.index)
            .field("session", &self.session)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Which kind of request the context is being built for. Each profile
/// presets the share of the free window given to conversation history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskProfile {
    #[default]
    Default,
    /// File context matters more than the conversation.
    Coding,
    /// The conversation matters more than file context.
    Chat,
}

impl TaskProfile {
    pub fn history_ratio(&self) -> f32 {
        match self {
            TaskProfile::Default => 0.5,
            TaskProfile::Coding => 0.25,
            TaskProfile::Chat => 0.7,
        }
    }
}

/// Budgeting options for context assembly.
///
/// `total_context_window` and `reserved_response_tokens` have no serde
/// defaults: a `[context]` table must state both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Maximum number of tokens a single model request may contain.
    pub total_context_window: usize,

    /// Tokens kept free for the model's answer.
    pub reserved_response_tokens: usize,

    /// Share of the free window given to history, in (0, 1). When unset the
    /// task profile decides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_ratio: Option<f32>,

    #[serde(default)]
    pub task_profile: TaskProfile,

    /// A truncated snippet smaller than this is skipped instead.
    #[serde(default = "default_min_snippet_tokens")]
    pub min_snippet_tokens: usize,

    /// Number of recent turns the caller prefers to keep.
    #[serde(default = "default_recent_turns_floor")]
    pub recent_turns_floor: usize,

    /// Move unused slack between history and retrieval once.
    #[serde(default = "default_true")]
    pub rebalance: bool,
}

fn default_min_snippet_tokens() -> usize {
    16
}
fn default_recent_turns_floor() -> usize {
    2
}

impl ContextConfig {
    /// A config with the two required options and defaults for the rest.
    pub fn new(total_context_window: usize, reserved_response_tokens: usize) -> Self {
        Self {
            total_context_window,
            reserved_response_tokens,
            history_ratio: None,
            task_profile: TaskProfile::default(),
            min_snippet_tokens: default_min_snippet_tokens(),
            recent_turns_floor: default_recent_turns_floor(),
            rebalance: true,
        }
    }

    pub fn with_history_ratio(mut self, ratio: f32) -> Self {
        self.history_ratio = Some(ratio);
        self
    }

    pub fn with_min_snippet_tokens(mut self, tokens: usize) -> Self {
        self.min_snippet_tokens = tokens;
        self
    }

    pub fn with_recent_turns_floor(mut self, turns: usize) -> Self {
        self.recent_turns_floor = turns;
        self
    }

    pub fn with_rebalance(mut self, rebalance: bool) -> Self {
        self.rebalance = rebalance;
        self
    }

    /// The explicit ratio if set, otherwise the task profile's preset.
    pub fn effective_history_ratio(&self) -> f32 {
        self.history_ratio
            .unwrap_or_else(|| self.task_profile.history_ratio())
    }

    /// Tokens the assembled prompt may occupy.
    pub fn prompt_capacity(&self) -> usize {
        self.total_context_window
            .saturating_sub(self.reserved_response_tokens)
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self::new(32_768, 4_096)
    }
}

/// Which token counter to build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    /// ~4 bytes per token; no model files needed.
    #[default]
    Heuristic,
    /// A Hugging Face `tokenizer.json`.
    Huggingface,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenizerConfig {
    #[serde(default)]
    pub kind: TokenizerKind,

    /// Path to `tokenizer.json` when `kind = "huggingface"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Directory to index, relative to the working directory.
    #[serde(default = "default_index_root")]
    pub root: PathBuf,

    /// Where the index is persisted.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,

    /// File extensions (without dot) to index.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directory names never descended into.
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,

    /// Upper bound for a single chunk.
    #[serde(default = "default_max_chunk_tokens")]
    pub max_chunk_tokens: usize,

    /// Candidates returned per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_index_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_index_path() -> PathBuf {
    PathBuf::from(STATE_DIR).join("index.json")
}
fn default_extensions() -> Vec<String> {
    ["rs", "py", "md", "txt", "toml", "js", "ts", "go", "java", "c", "h", "cpp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_ignore_dirs() -> Vec<String> {
    [".git", "target", "node_modules", STATE_DIR, "__pycache__", ".venv"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_max_chunk_tokens() -> usize {
    512
}
fn default_top_k() -> usize {
    20
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            root: default_index_root(),
            path: default_index_path(),
            extensions: default_extensions(),
            ignore_dirs: default_ignore_dirs(),
            max_chunk_tokens: default_max_chunk_tokens(),
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding `session.json` and the `history/` archive.
    #[serde(default = "default_session_dir")]
    pub dir: PathBuf,
}

fn default_session_dir() -> PathBuf {
    PathBuf::from(STATE_DIR)
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dir: default_session_dir(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration for the current working directory.
    ///
    /// Also checks environment variables for API keys:
    /// - `RAGPILOT_API_KEY` (highest priority)
    /// - `DEEPSEEK_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let global = Self::config_dir().join("config.toml");
        let project = Path::new(STATE_DIR).join("config.toml");
        let mut config = Self::load_layered(&[global, project])?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::load_layered(&[path.to_path_buf()])
    }

    /// Merge every existing file in `paths`, later files winning key by key.
    /// No existing file at all yields the defaults.
    pub fn load_layered(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut merged = toml::Table::new();
        let mut last: Option<&Path> = None;

        for path in paths.iter().filter(|p| p.exists()) {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            let table: toml::Table = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            merge_tables(&mut merged, table);
            tracing::debug!(path = %path.display(), "Loaded config layer");
            last = Some(path.as_path());
        }

        let Some(last) = last else {
            tracing::info!("No config file found, using defaults");
            return Ok(Self::default());
        };

        let config: Self = toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: last.to_path_buf(),
                reason: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("RAGPILOT_API_KEY")
                .ok()
                .or_else(|| std::env::var("DEEPSEEK_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("RAGPILOT_PROVIDER") {
            self.default_provider = provider;
        }

        if let Ok(model) = std::env::var("RAGPILOT_MODEL") {
            self.default_model = model;
        }
    }

    /// Get the per-user configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(STATE_DIR)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.context.total_context_window == 0 {
            return Err(ConfigError::ValidationError(
                "context.total_context_window must be > 0".into(),
            ));
        }

        let ratio = self.context.effective_history_ratio();
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "context.history_ratio must be in (0, 1), got {ratio}"
            )));
        }

        if self.index.max_chunk_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "index.max_chunk_tokens must be > 0".into(),
            ));
        }

        if self.tokenizer.kind == TokenizerKind::Huggingface && self.tokenizer.path.is_none() {
            return Err(ConfigError::ValidationError(
                "tokenizer.path is required when tokenizer.kind = \"huggingface\"".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// A copy with every API key replaced by `[REDACTED]`, for display.
    pub fn redacted(&self) -> Self {
        let hide = |key: &Option<String>| key.as_ref().map(|_| "[REDACTED]".to_string());
        let mut config = self.clone();
        config.api_key = hide(&self.api_key);
        for provider in config.providers.values_mut() {
            provider.api_key = hide(&provider.api_key);
        }
        config
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            system_prompt: None,
            context: ContextConfig::default(),
            tokenizer: TokenizerConfig::default(),
            index: IndexConfig::default(),
            session: SessionConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Recursively overlay `overlay` onto `base`; nested tables merge, everything
/// else is replaced.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
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
