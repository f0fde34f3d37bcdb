//! Configuration management for Questgate.

use serde::{Deserialize, Serialize};

use crate::error::{QuestgateError, Result};
use crate::ratelimit::DEFAULT_COOLDOWN_SECS;

/// Prefix for environment overrides, e.g. `QUESTGATE__CACHE__TTL_SECS=600`.
pub const ENV_PREFIX: &str = "QUESTGATE";

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestgateConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Daily quota and cooldown defaults
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Memoization settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Game-record API settings
    #[serde(default)]
    pub records: RecordsConfig,

    /// Resource sync settings
    #[serde(default)]
    pub resources: ResourcesConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Daily quota and cooldown defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Uses allowed per key per day
    #[serde(default = "default_daily_max")]
    pub daily_max: u64,

    /// Cooldown applied between commands, in seconds
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: i64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            daily_max: default_daily_max(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

fn default_daily_max() -> u64 {
    30
}

fn default_cooldown_secs() -> i64 {
    DEFAULT_COOLDOWN_SECS
}

/// Memoization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a successful lookup stays fresh, in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Deduplicate concurrent misses on the same key
    #[serde(default)]
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            single_flight: false,
        }
    }
}

fn default_ttl_secs() -> u64 {
    3600
}

/// Game-record API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsConfig {
    /// Base URL for game-record endpoints
    #[serde(default = "default_takumi_base")]
    pub takumi_base: String,

    /// Base URL for the monthly ledger endpoint
    #[serde(default = "default_ledger_base")]
    pub ledger_base: String,

    /// Cookies tried per lookup before giving up
    #[serde(default = "default_max_cookie_attempts")]
    pub max_cookie_attempts: u32,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            takumi_base: default_takumi_base(),
            ledger_base: default_ledger_base(),
            max_cookie_attempts: default_max_cookie_attempts(),
        }
    }
}

fn default_takumi_base() -> String {
    "https://api-takumi.mihoyo.com".to_string()
}

fn default_ledger_base() -> String {
    "https://hk4e-api.mihoyo.com".to_string()
}

fn default_max_cookie_attempts() -> u32 {
    5
}

/// Resource sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    /// Local directory holding resources
    #[serde(default = "default_resource_dir")]
    pub local_dir: String,

    /// URL of the JSON manifest
    #[serde(default = "default_manifest_url")]
    pub manifest_url: String,

    /// Base URL resources are downloaded from
    #[serde(default = "default_resource_base")]
    pub base_url: String,

    /// Mirror prefix prepended to every remote URL (may be empty)
    #[serde(default)]
    pub proxy: String,

    /// Pause between downloads, in milliseconds
    #[serde(default = "default_download_interval_ms")]
    pub download_interval_ms: u64,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            local_dir: default_resource_dir(),
            manifest_url: default_manifest_url(),
            base_url: default_resource_base(),
            proxy: String::new(),
            download_interval_ms: default_download_interval_ms(),
        }
    }
}

fn default_resource_dir() -> String {
    "resources".to_string()
}

fn default_manifest_url() -> String {
    "https://raw.githubusercontent.com/CMHopeSunshine/LittlePaimonRes/main/resources_list.json"
        .to_string()
}

fn default_resource_base() -> String {
    "https://raw.githubusercontent.com/CMHopeSunshine/LittlePaimonRes/main".to_string()
}

fn default_download_interval_ms() -> u64 {
    500
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Transport-level retries after the first attempt
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Pause between retries, in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

impl QuestgateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| QuestgateError::Config(e.to_string()))
    }

    /// Load configuration from an optional YAML file with environment
    /// variables layered on top.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::new(path, ::config::FileFormat::Yaml).required(true),
            );
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| QuestgateError::Config(e.to_string()))
    }

    /// Render the configuration as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| QuestgateError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QuestgateConfig::default();
        assert_eq!(config.limits.daily_max, 30);
        assert_eq!(config.limits.cooldown_secs, 60);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert!(!config.cache.single_flight);
        assert_eq!(config.records.max_cookie_attempts, 5);
        assert_eq!(config.resources.download_interval_ms, 500);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
cache:
  ttl_secs: 120
resources:
  proxy: "https://ghproxy.example/"
"#;
        let config = QuestgateConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.cache.ttl_secs, 120);
        assert_eq!(config.resources.proxy, "https://ghproxy.example/");
        assert_eq!(config.resources.local_dir, "resources");
        assert_eq!(config.limits.daily_max, 30);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = QuestgateConfig::from_yaml("cache: [not, a, map]").unwrap_err();
        assert!(matches!(err, QuestgateError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("absent.yaml");

        let err = QuestgateConfig::from_file(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, QuestgateError::Io(_)));
    }

    #[test]
    fn test_yaml_round_trip_through_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("questgate.yaml");
        let mut config = QuestgateConfig::default();
        config.limits.daily_max = 10;
        std::fs::write(&path, config.to_yaml().unwrap()).unwrap();

        let loaded = QuestgateConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.limits.daily_max, 10);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = QuestgateConfig::load(None).unwrap();
        assert_eq!(config.http.retries, 2);
    }
}
