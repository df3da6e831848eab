use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SentinelError};
use crate::types::GenerationSettings;

/// Top-level configuration for the Sentinel application.
///
/// Loaded from `~/.sentinel/config.toml` by default. Every section falls back
/// to its defaults when missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentinelConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub throttle: ThrottleConfig,
}

impl SentinelConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SentinelConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SentinelError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the local key-value database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.sentinel/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Hosted generation endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identifiers in fallback order. The first entry is the default.
    pub models: Vec<String>,
    /// Base URL of the generation service.
    pub base_url: String,
    /// API key. Takes precedence over `api_key_env`.
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: String,
    /// Timeout for establishing a streaming request, in seconds.
    pub request_timeout_secs: u64,
    /// Longest silence tolerated between two chunks of an open stream, in
    /// seconds. Bounds how long a stalled reply can hold the in-flight slot.
    pub stream_idle_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            models: vec![
                "gemini-2.5-flash-lite-latest".to_string(),
                "gemini-3-flash-preview".to_string(),
            ],
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: None,
            api_key_env: "GEMINI_API_KEY".to_string(),
            request_timeout_secs: 60,
            stream_idle_timeout_secs: 30,
        }
    }
}

/// Context window, cooldown and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Number of most recent turns sent with each request.
    pub context_turns: usize,
    /// Cooldown imposed after a rate-limit failure, in seconds.
    pub rate_limit_cooldown_secs: u32,
    /// Cooldown imposed after every successful query, in seconds.
    pub post_query_cooldown_secs: u32,
    /// Retry non-rate-limit failures against the next model in the list.
    pub retry_with_fallback: bool,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            context_turns: 6,
            rate_limit_cooldown_secs: 15,
            post_query_cooldown_secs: 4,
            retry_with_fallback: false,
        }
    }
}
