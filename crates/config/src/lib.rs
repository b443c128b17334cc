//! Configuration loading, validation, and management for simulai.
//!
//! Loads configuration from `~/.simulai/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use simulai_core::EngineKind;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.simulai/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Upstream provider configurations
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Cache, health and request limits of the unified engine
    #[serde(default)]
    pub engine: EngineConfig,

    /// Chat session layer configuration
    #[serde(default)]
    pub chat: ChatConfig,

    /// Persistence configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Bearer token verification
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Maximum accepted request body in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// CORS origin; "*" allows any origin
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

fn default_port() -> u16 {
    54321
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_body_limit() -> usize {
    // two 50k-char fields plus messages and context
    512 * 1024
}
fn default_allowed_origin() -> String {
    "*".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            body_limit_bytes: default_body_limit(),
            allowed_origin: default_allowed_origin(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "ProviderConfig::lovable")]
    pub lovable: ProviderConfig,

    #[serde(default = "ProviderConfig::gemini")]
    pub gemini: ProviderConfig,

    /// HTTP client timeout for every provider call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            lovable: ProviderConfig::lovable(),
            gemini: ProviderConfig::gemini(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ProvidersConfig {
    pub fn get(&self, engine: EngineKind) -> &ProviderConfig {
        match engine {
            EngineKind::Lovable => &self.lovable,
            EngineKind::Gemini => &self.gemini,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub api_url: String,

    pub default_model: String,
}

impl ProviderConfig {
    pub fn lovable() -> Self {
        Self {
            api_key: None,
            api_url: "https://ai.gateway.lovable.dev/v1".into(),
            default_model: "google/gemini-2.5-flash".into(),
        }
    }

    pub fn gemini() -> Self {
        Self {
            api_key: None,
            api_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            default_model: "gemini-2.5-flash".into(),
        }
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Validity window of cached responses
    #[serde(default = "default_cache_ttl_days")]
    pub cache_ttl_days: u32,

    /// Cumulative failures after which an engine is marked unhealthy
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u64,

    /// Characters of the prompt kept in `prompt_preview`
    #[serde(default = "default_preview_chars")]
    pub prompt_preview_chars: usize,

    /// Upper bound for `prompt` and `systemPrompt`
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,

    /// Primary engine when no metrics exist and no preference is given
    #[serde(default = "default_engine")]
    pub default_engine: EngineKind,

    #[serde(default = "default_true")]
    pub cache_enabled: bool,
}

fn default_cache_ttl_days() -> u32 {
    7
}
fn default_failure_threshold() -> u64 {
    5
}
fn default_preview_chars() -> usize {
    200
}
fn default_max_prompt_chars() -> usize {
    50_000
}
fn default_engine() -> EngineKind {
    EngineKind::Lovable
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_days: default_cache_ttl_days(),
            failure_threshold: default_failure_threshold(),
            prompt_preview_chars: default_preview_chars(),
            max_prompt_chars: default_max_prompt_chars(),
            default_engine: default_engine(),
            cache_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Engine tried first by the chat layer
    #[serde(default = "default_engine")]
    pub primary_engine: EngineKind,

    /// Gemini models tried in order after the primary fails
    #[serde(default = "default_fallback_models")]
    pub fallback_models: Vec<String>,

    /// Session messages replayed as history
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Cap on the full-content section of each knowledge document
    #[serde(default = "default_knowledge_chars")]
    pub knowledge_content_chars: usize,

    /// Cap on the extracted text of each attached file
    #[serde(default = "default_file_chars")]
    pub file_content_chars: usize,
}

fn default_fallback_models() -> Vec<String> {
    vec![
        "gemini-2.5-flash".into(),
        "gemini-2.0-flash".into(),
        "gemini-1.5-flash".into(),
    ]
}
fn default_history_limit() -> usize {
    20
}
fn default_knowledge_chars() -> usize {
    8_000
}
fn default_file_chars() -> usize {
    15_000
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            primary_engine: default_engine(),
            fallback_models: default_fallback_models(),
            history_limit: default_history_limit(),
            knowledge_content_chars: default_knowledge_chars(),
            file_content_chars: default_file_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// SQLite database file; defaults to `~/.simulai/simulai.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_storage_backend() -> String {
    "sqlite".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: None,
        }
    }
}

impl StorageConfig {
    /// The database path, falling back to the config directory.
    pub fn database_path(&self) -> String {
        self.path.clone().unwrap_or_else(|| {
            AppConfig::config_dir()
                .join("simulai.db")
                .to_string_lossy()
                .into_owned()
        })
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Identity provider base URL; tokens are checked at `{url}/auth/v1/user`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Public API key sent as the `apikey` header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Fixed token → user id pairs, for local development
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub static_tokens: HashMap<String, String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("url", &self.url)
            .field("api_key", &redact(&self.api_key))
            .field("static_tokens", &self.static_tokens.len())
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.simulai/config.toml).
    ///
    /// Environment variables override the file:
    /// - `LOVABLE_API_KEY`, `GEMINI_API_KEY`
    /// - `SIMULAI_AUTH_URL`, `SIMULAI_AUTH_API_KEY`
    /// - `SIMULAI_DB_PATH`, `SIMULAI_PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
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

    /// Apply environment overrides through `lookup` (injected for tests).
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(key) = lookup("LOVABLE_API_KEY") {
            self.providers.lovable.api_key = Some(key);
        }
        if let Some(key) = lookup("GEMINI_API_KEY") {
            self.providers.gemini.api_key = Some(key);
        }
        if let Some(url) = lookup("SIMULAI_AUTH_URL") {
            self.auth.url = Some(url);
        }
        if let Some(key) = lookup("SIMULAI_AUTH_API_KEY") {
            self.auth.api_key = Some(key);
        }
        if let Some(path) = lookup("SIMULAI_DB_PATH") {
            self.storage.path = Some(path);
        }
        if let Some(port) = lookup("SIMULAI_PORT") {
            self.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("SIMULAI_PORT is not a port: {port}"))
            })?;
        }
        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".simulai")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.cache_ttl_days == 0 {
            return Err(ConfigError::ValidationError(
                "engine.cache_ttl_days must be at least 1".into(),
            ));
        }

        if self.engine.failure_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "engine.failure_threshold must be at least 1".into(),
            ));
        }

        if self.engine.max_prompt_chars == 0 {
            return Err(ConfigError::ValidationError(
                "engine.max_prompt_chars must be > 0".into(),
            ));
        }

        if !matches!(self.storage.backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "storage.backend must be \"sqlite\" or \"memory\", got \"{}\"",
                self.storage.backend
            )));
        }

        Ok(())
    }

    /// Whether any upstream provider has an API key.
    pub fn has_api_key(&self) -> bool {
        self.providers.lovable.api_key.is_some() || self.providers.gemini.api_key.is_some()
    }

    /// Generate a default config TOML string (for `init`).
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.cache_ttl_days, 7);
        assert_eq!(config.engine.failure_threshold, 5);
        assert_eq!(config.engine.max_prompt_chars, 50_000);
        assert_eq!(config.chat.fallback_models.len(), 3);
        assert_eq!(config.engine.default_engine, EngineKind::Lovable);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.providers.gemini.api_url, config.providers.gemini.api_url);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let toml_str = r#"
[engine]
failure_threshold = 3
default_engine = "gemini"

[providers.gemini]
api_url = "http://localhost:9999"
default_model = "gemini-test"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.failure_threshold, 3);
        assert_eq!(config.engine.cache_ttl_days, 7);
        assert_eq!(config.engine.default_engine, EngineKind::Gemini);
        assert_eq!(config.providers.gemini.default_model, "gemini-test");
        assert!(config.providers.lovable.api_url.contains("lovable"));
    }

    #[test]
    fn zero_ttl_rejected() {
        let mut config = AppConfig::default();
        config.engine.cache_ttl_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_backend_rejected() {
        let mut config = AppConfig::default();
        config.storage.backend = "postgres".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.gateway.port, 54321);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gateway]\nport = 8080\n").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.gateway.port, 8080);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gateway\nport = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(|key| match key {
                "LOVABLE_API_KEY" => Some("lk".into()),
                "GEMINI_API_KEY" => Some("gk".into()),
                "SIMULAI_PORT" => Some("9000".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.providers.lovable.api_key.as_deref(), Some("lk"));
        assert_eq!(config.providers.gemini.api_key.as_deref(), Some("gk"));
        assert_eq!(config.gateway.port, 9000);
        assert!(config.has_api_key());
    }

    #[test]
    fn bad_port_override_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env_overrides(|key| {
            (key == "SIMULAI_PORT").then(|| "not-a-port".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.providers.lovable.api_key = Some("super-secret".into());
        config.auth.api_key = Some("anon-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("anon-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("generativelanguage.googleapis.com"));
        assert!(toml_str.contains("54321"));
    }
}
