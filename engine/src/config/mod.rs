//! Configuration management
//!
//! This module handles loading, validation, and management of the secure
//! updates configuration. Configuration is stored in TOML format at
//! ~/.secure-updates/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory, site home URL
//! - **host**: Custom update host URL, enablement flag, mirrored plugins file
//! - **limits**: Probe and sync cooldowns, request timeout
//! - **transport**: Plaintext allowance for loopback development hosts
//!
//! The host API key is never written to this file. It is resolved through
//! [`crate::secrets::SecretManager`] at the time an operation needs it.
//!
//! # Examples
//!
//! ```no_run
//! use secure_updates_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Update host: {}", config.host.custom_update_host_url);
//! # Ok(())
//! # }
//! ```

use sdk::errors::UpdateError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::remote::ensure_secure_url;
use crate::secrets::SecretString;

/// Option name of the custom host URL
pub const OPTION_HOST_URL: &str = "custom_update_host_url";

/// Option name of the enablement flag
pub const OPTION_HOST_ENABLED: &str = "custom_update_host_enabled";

/// Option name of the API key (stored in the keychain, not in the file)
pub const OPTION_API_KEY: &str = "custom_update_host_api_key";

/// Option name of the mirrored plugins registry
pub const OPTION_MIRRORED_PLUGINS: &str = "secure_updates_plugins";

/// Option name of the site home URL sent as `X-Client-Home`
pub const OPTION_SITE_HOME: &str = "site_home";

/// Option name of the installed plugins listing
pub const OPTION_INVENTORY_PATH: &str = "inventory_path";

/// Snapshot of the remote host settings handed to each operation
#[derive(Debug, Clone, Default)]
pub struct RemoteHostConfig {
    pub base_url: String,
    pub enabled: bool,
    pub api_key: SecretString,
}

impl RemoteHostConfig {
    pub fn new(base_url: impl Into<String>, enabled: bool, api_key: impl Into<SecretString>) -> Self {
        Self {
            base_url: base_url.into(),
            enabled,
            api_key: api_key.into(),
        }
    }

    /// A disabled configuration with no host
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Enabled host without credentials is a configuration error
    pub fn validate(&self) -> Result<(), UpdateError> {
        if self.enabled && self.base_url.trim().is_empty() {
            return Err(UpdateError::Config(
                "custom host is enabled but no host URL is set".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether outbound inventory sync may run
    pub fn can_sync(&self) -> bool {
        self.enabled && !self.base_url.trim().is_empty() && !self.api_key.is_empty()
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    pub core: CoreConfig,

    /// Custom update host settings
    pub host: HostConfig,

    /// Rate limits and timeouts
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Transport policy
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Home URL of this site, sent as `X-Client-Home`
    #[serde(default)]
    pub site_home: String,
}

/// Custom update host configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HostConfig {
    #[serde(default)]
    pub custom_update_host_url: String,

    #[serde(default)]
    pub custom_update_host_enabled: bool,

    /// JSON file holding the mirrored plugins registry (supports ~ expansion)
    #[serde(default)]
    pub mirrored_plugins_path: Option<PathBuf>,

    /// JSON file listing the installed plugins (supports ~ expansion)
    #[serde(default)]
    pub inventory_path: Option<PathBuf>,
}

/// Rate limit and timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Cooldown between interactive connection tests (seconds)
    #[serde(default = "default_probe_cooldown")]
    pub probe_cooldown_secs: u64,

    /// Suppression window for background inventory syncs (seconds)
    #[serde(default = "default_sync_cooldown")]
    pub sync_cooldown_secs: u64,

    /// Timeout applied to every remote request (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            probe_cooldown_secs: default_probe_cooldown(),
            sync_cooldown_secs: default_sync_cooldown(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl LimitsConfig {
    pub fn probe_cooldown(&self) -> Duration {
        Duration::from_secs(self.probe_cooldown_secs)
    }

    pub fn sync_cooldown(&self) -> Duration {
        Duration::from_secs(self.sync_cooldown_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Transport policy configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TransportConfig {
    /// Accept `http://` for localhost / 127.0.0.1 / ::1 only
    #[serde(default)]
    pub allow_plaintext_loopback: bool,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.secure-updates")
}

fn default_probe_cooldown() -> u64 {
    5
}

fn default_sync_cooldown() -> u64 {
    3600
}

fn default_request_timeout() -> u64 {
    15
}

impl Config {
    /// Load configuration from the default location (~/.secure-updates/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// validation fails.
    pub fn load_or_create() -> Result<Self, UpdateError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, UpdateError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| UpdateError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| UpdateError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Write configuration to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<(), UpdateError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                UpdateError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| UpdateError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| UpdateError::Config(format!("Failed to write config file: {}", e)))
    }

    fn create_default(path: &Path) -> Result<Self, UpdateError> {
        let mut config = Self::default_config();
        config.validate_and_process()?;
        config.save_to_path(path)?;
        Ok(config)
    }

    /// Get the default configuration file path (~/.secure-updates/config.toml)
    pub fn default_config_path() -> Result<PathBuf, UpdateError> {
        let home = dirs::home_dir()
            .ok_or_else(|| UpdateError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".secure-updates").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig {
                log_level: default_log_level(),
                data_dir: default_data_dir(),
                site_home: String::new(),
            },
            host: HostConfig::default(),
            limits: LimitsConfig::default(),
            transport: TransportConfig::default(),
        }
    }

    /// Build the per-operation host snapshot with the resolved API key
    pub fn remote_host(&self, api_key: SecretString) -> RemoteHostConfig {
        RemoteHostConfig {
            base_url: self.host.custom_update_host_url.clone(),
            enabled: self.host.custom_update_host_enabled,
            api_key,
        }
    }

    /// Path of the activity log database
    pub fn activity_db_path(&self) -> PathBuf {
        self.core.data_dir.join("activity.db")
    }

    /// Set one of the well-known options, applying its sanitizer
    ///
    /// The API key is rejected here because it lives in the keychain.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), UpdateError> {
        match name {
            OPTION_HOST_URL => {
                self.host.custom_update_host_url = sanitize_url(value)?;
            }
            OPTION_HOST_ENABLED => {
                self.host.custom_update_host_enabled = sanitize_boolean(value);
            }
            OPTION_MIRRORED_PLUGINS => {
                self.host.mirrored_plugins_path = sanitize_path(value)?;
            }
            OPTION_INVENTORY_PATH => {
                self.host.inventory_path = sanitize_path(value)?;
            }
            OPTION_SITE_HOME => {
                self.core.site_home = sanitize_url(value)?;
            }
            OPTION_API_KEY => {
                return Err(UpdateError::Config(
                    "the API key is stored in the keychain; use `config set-api-key`".to_string(),
                ));
            }
            other => {
                return Err(UpdateError::Config(format!("Unknown option '{}'", other)));
            }
        }
        self.validate_and_process()
    }

    /// Validate and process configuration
    ///
    /// - Validates the log level and limits
    /// - Enforces "enabled requires a host URL"
    /// - Enforces HTTPS on the host URL and site home
    /// - Expands ~ in paths
    pub fn validate_and_process(&mut self) -> Result<(), UpdateError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(UpdateError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.limits.request_timeout_secs == 0 {
            return Err(UpdateError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        let host = self.host.custom_update_host_url.trim().to_string();
        if self.host.custom_update_host_enabled && host.is_empty() {
            return Err(UpdateError::Config(format!(
                "{} is set but {} is empty",
                OPTION_HOST_ENABLED, OPTION_HOST_URL
            )));
        }
        if !host.is_empty() {
            ensure_secure_url(&host, self.transport.allow_plaintext_loopback)?;
        }
        self.host.custom_update_host_url = host;

        self.core.data_dir = expand_path(&self.core.data_dir)?;
        if let Some(path) = &self.host.mirrored_plugins_path {
            self.host.mirrored_plugins_path = Some(expand_path(path)?);
        }
        if let Some(path) = &self.host.inventory_path {
            self.host.inventory_path = Some(expand_path(path)?);
        }

        Ok(())
    }
}

/// Trim a URL option and require an http(s) scheme
///
/// An empty value clears the option.
pub fn sanitize_url(value: &str) -> Result<String, UpdateError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(String::new());
    }
    let parsed = url::Url::parse(value).map_err(|e| UpdateError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(value.to_string()),
        other => Err(UpdateError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            other
        ))),
    }
}

/// Interpret a checkbox-style value
pub fn sanitize_boolean(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Strip control characters and surrounding whitespace
pub fn sanitize_text_field(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

fn sanitize_path(value: &str) -> Result<Option<PathBuf>, UpdateError> {
    let path = sanitize_text_field(value);
    if path.is_empty() {
        return Ok(None);
    }
    expand_path(Path::new(&path)).map(Some)
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, UpdateError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| UpdateError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| UpdateError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| UpdateError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = Config::default_config();

        assert_eq!(config.core.log_level, "info");
        assert!(!config.host.custom_update_host_enabled);
        assert_eq!(config.limits.probe_cooldown_secs, 5);
        assert_eq!(config.limits.sync_cooldown_secs, 3600);
        assert_eq!(config.limits.request_timeout(), Duration::from_secs(15));
        assert!(!config.transport.allow_plaintext_loopback);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test");
        let expanded = expand_path(&path).unwrap();

        let home = dirs::home_dir().unwrap();
        assert_eq!(expanded, home.join("test"));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let path = PathBuf::from("/absolute/path");
        assert_eq!(expand_path(&path).unwrap(), path);
    }

    #[test]
    fn test_enabled_requires_url() {
        let mut config = Config::default_config();
        config.host.custom_update_host_enabled = true;
        assert!(matches!(
            config.validate_and_process(),
            Err(UpdateError::Config(_))
        ));
    }

    #[test]
    fn test_plaintext_host_rejected() {
        let mut config = Config::default_config();
        config.host.custom_update_host_url = "http://updates.example.com".to_string();
        assert!(matches!(
            config.validate_and_process(),
            Err(UpdateError::InsecureTransport(_))
        ));
    }

    #[test]
    fn test_set_option_sanitizes() {
        let mut config = Config::default_config();
        config
            .set_option(OPTION_HOST_URL, "  https://updates.example.com/ ")
            .unwrap();
        config.set_option(OPTION_HOST_ENABLED, "1").unwrap();

        assert_eq!(
            config.host.custom_update_host_url,
            "https://updates.example.com/"
        );
        assert!(config.host.custom_update_host_enabled);

        config.set_option(OPTION_HOST_ENABLED, "nope").unwrap();
        assert!(!config.host.custom_update_host_enabled);
    }

    #[test]
    fn test_set_option_rejects_api_key_and_unknown() {
        let mut config = Config::default_config();
        assert!(config.set_option(OPTION_API_KEY, "secret").is_err());
        assert!(config.set_option("not_an_option", "x").is_err());
    }

    #[test]
    fn test_sanitize_url_rejects_other_schemes() {
        assert!(sanitize_url("ftp://example.com").is_err());
        assert!(sanitize_url("not a url").is_err());
        assert_eq!(sanitize_url("   ").unwrap(), "");
    }

    #[test]
    fn test_sanitize_text_field() {
        assert_eq!(sanitize_text_field("  key\u{0007}123\n"), "key123");
    }

    #[test]
    fn test_remote_host_snapshot() {
        let mut config = Config::default_config();
        config.host.custom_update_host_url = "https://updates.example.com".to_string();
        config.host.custom_update_host_enabled = true;

        let host = config.remote_host(SecretString::new("k"));
        assert!(host.can_sync());
        assert!(host.validate().is_ok());

        let no_key = config.remote_host(SecretString::default());
        assert!(!no_key.can_sync());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default_config();
        let toml_string = toml::to_string(&config).unwrap();

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(config.core.log_level, deserialized.core.log_level);
        assert_eq!(
            config.limits.sync_cooldown_secs,
            deserialized.limits.sync_cooldown_secs
        );
    }
}
