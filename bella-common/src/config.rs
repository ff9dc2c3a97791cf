//! Configuration loading and root folder resolution
//!
//! Settings come from a TOML file with per-section defaults. Individual
//! values are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::calendar::MAX_CALENDAR_DAYS;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the root folder (database location)
pub const ROOT_FOLDER_ENV: &str = "BELLA_ROOT_FOLDER";

/// API key environment variables, checked in order
pub const API_KEY_ENV_VARS: [&str; 2] = ["BELLA_OPENAI_API_KEY", "OPENAI_API_KEY"];

/// Hashtag service token environment variable
pub const HASHTAG_TOKEN_ENV: &str = "BELLA_RITEKIT_TOKEN";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "bella.db";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<String>,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub generation: GenerationConfig,
    pub governor: GovernorConfig,
    pub openai: OpenAiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Generation pipeline limits, deadlines and pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Largest day count accepted from a request (1..=30)
    pub max_days: u32,
    /// Requests longer than this skip the text-generation service entirely
    pub ai_max_days: u32,
    /// Deadline for producing one day of content, in seconds
    pub generation_timeout_secs: u64,
    /// Pause after each day, in milliseconds
    pub day_pause_ms: u64,
    /// Day cap applied to each business in a batch
    pub batch_max_days: u32,
    /// Requested chunk size for batch processing (clamped by memory pressure)
    pub batch_chunk_size: usize,
    /// Pause between batch chunks, in milliseconds
    pub batch_chunk_pause_ms: u64,
    /// Pause every 5 posts inside a batch business, in milliseconds
    pub batch_post_pause_ms: u64,
    /// Inline batches are split into sub-batches of at most this many business-days
    pub max_batch_business_days: usize,
    /// Batches with more businesses than this are queued
    pub queue_business_threshold: usize,
    /// Batches whose estimated time exceeds this are queued, in seconds
    pub queue_time_threshold_secs: f64,
    /// Estimated processing time per post, in seconds
    pub estimated_secs_per_post: f64,
    /// Interval between queue polls by the background worker, in seconds
    pub queue_poll_interval_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_days: MAX_CALENDAR_DAYS,
            ai_max_days: 7,
            generation_timeout_secs: 10,
            day_pause_ms: 100,
            batch_max_days: 10,
            batch_chunk_size: 5,
            batch_chunk_pause_ms: 500,
            batch_post_pause_ms: 100,
            max_batch_business_days: 50,
            queue_business_threshold: 10,
            queue_time_threshold_secs: 300.0,
            estimated_secs_per_post: 2.0,
            queue_poll_interval_secs: 2,
        }
    }
}

/// Admission and memory-pressure thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Requests admitted at once; extra requests are rejected as busy
    pub max_concurrent_requests: usize,
    /// Memory utilization (%) that triggers a warning before processing
    pub pre_generation_threshold: f32,
    /// Memory utilization (%) that triggers a warning after processing
    pub post_generation_threshold: f32,
    /// Memory utilization (%) reported by the background monitor
    pub monitor_threshold: f32,
    /// Background monitor sampling interval, in seconds
    pub monitor_interval_secs: u64,
    /// API requests per user per hour
    pub requests_per_hour: u32,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 5,
            pre_generation_threshold: 70.0,
            post_generation_threshold: 75.0,
            monitor_threshold: 80.0,
            monitor_interval_secs: 5,
            requests_per_hour: 100,
        }
    }
}

/// OpenAI-compatible provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub image_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Per-call timeout for text generation, in seconds
    pub request_timeout_secs: u64,
    /// Per-call timeout for image generation, in seconds
    pub image_timeout_secs: u64,
    /// Outbound rate limit shared by all provider calls
    pub requests_per_second: u32,
    /// Optional token for live hashtag suggestions
    pub hashtag_token: Option<String>,
    pub hashtag_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            image_model: "dall-e-3".to_string(),
            max_tokens: 500,
            temperature: 0.7,
            request_timeout_secs: 8,
            image_timeout_secs: 60,
            requests_per_second: 5,
            hashtag_token: None,
            hashtag_url: "https://api.ritekit.com/v1/stats/auto-hashtag".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Load from an explicit path, else the platform config file, else defaults
    ///
    /// An explicit path that cannot be read is an error; a missing platform
    /// file silently yields defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading configuration from {}", path.display());
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            _ => {
                debug!("No config file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        let gen = &self.generation;
        if gen.max_days == 0 || gen.max_days > MAX_CALENDAR_DAYS {
            return Err(Error::Config(format!(
                "generation.max_days must be between 1 and {}",
                MAX_CALENDAR_DAYS
            )));
        }
        if gen.batch_max_days == 0 {
            return Err(Error::Config("generation.batch_max_days must be at least 1".to_string()));
        }
        if gen.batch_chunk_size == 0 || gen.max_batch_business_days == 0 {
            return Err(Error::Config("generation batch sizes must be at least 1".to_string()));
        }
        if self.governor.max_concurrent_requests == 0 {
            return Err(Error::Config(
                "governor.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.openai.requests_per_second == 0 {
            return Err(Error::Config("openai.requests_per_second must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Resolve the provider API key: environment first, then TOML
    ///
    /// `None` means the service runs in fallback-only mode.
    pub fn resolve_api_key(&self) -> Option<String> {
        let mut sources = Vec::new();

        let env_key = API_KEY_ENV_VARS.iter().find_map(|name| {
            std::env::var(name)
                .ok()
                .filter(|k| is_valid_key(k))
                .map(|k| (*name, k))
        });
        if env_key.is_some() {
            sources.push("environment");
        }

        let toml_key = self.openai.api_key.as_ref().filter(|k| is_valid_key(k));
        if toml_key.is_some() {
            sources.push("TOML");
        }

        if sources.len() > 1 {
            warn!(
                "API key found in multiple sources: {}. Using environment (highest priority).",
                sources.join(", ")
            );
        }

        if let Some((name, key)) = env_key {
            info!("API key loaded from environment variable {}", name);
            return Some(key);
        }
        if let Some(key) = toml_key {
            info!("API key loaded from TOML config");
            return Some(key.clone());
        }

        warn!("No API key configured; calendars will use fallback content only");
        None
    }

    /// Resolve the hashtag service token: environment first, then TOML
    pub fn resolve_hashtag_token(&self) -> Option<String> {
        std::env::var(HASHTAG_TOKEN_ENV)
            .ok()
            .filter(|t| is_valid_key(t))
            .or_else(|| self.openai.hashtag_token.clone().filter(|t| is_valid_key(t)))
    }
}

/// Validate key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Platform configuration file path (`<config dir>/bella/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bella").join("config.toml"))
}

/// Resolve the root folder holding the database
pub fn resolve_root_folder(cli_arg: Option<&str>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(root) = &config.root_folder {
        return PathBuf::from(root);
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("bella"))
        .unwrap_or_else(|| PathBuf::from("./bella_data"))
}

/// Create the root folder if missing and return the database path inside it
pub fn prepare_root_folder(root: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root)?;
    Ok(root.join(DATABASE_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TomlConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.generation.max_days, 30);
        assert_eq!(config.governor.max_concurrent_requests, 5);
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_partial_toml_keeps_section_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            [governor]
            max_concurrent_requests = 2

            [generation]
            ai_max_days = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.governor.max_concurrent_requests, 2);
        assert_eq!(config.governor.monitor_interval_secs, 5);
        assert_eq!(config.generation.ai_max_days, 3);
        assert_eq!(config.generation.max_days, 30);
        assert_eq!(config.openai.model, "gpt-4o");
    }

    #[test]
    fn test_rejects_out_of_range_max_days() {
        let result = TomlConfig::from_toml_str("[generation]\nmax_days = 31\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let result = TomlConfig::from_toml_str("[governor]\nmax_concurrent_requests = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("sk-abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }

    #[test]
    fn test_cli_root_folder_wins() {
        let config = TomlConfig {
            root_folder: Some("/from/toml".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_root_folder(Some("/from/cli"), &config),
            PathBuf::from("/from/cli")
        );
    }
}
