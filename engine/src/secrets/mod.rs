pub mod string;

pub use string::SecretString;

use keyring::Entry;
use regex::Regex;
use sdk::errors::UpdateError;
use std::sync::OnceLock;

use crate::config::OPTION_API_KEY;

/// Keychain service name used for the host API key
pub const DEFAULT_SERVICE_NAME: &str = "secure-updates";

/// Environment variable that overrides the keychain entry
pub const API_KEY_ENV_VAR: &str = "SECURE_UPDATES_API_KEY";

/// SecretManager handles storage and retrieval of the update host API key.
///
/// The key is looked up in the environment first, then in the OS keychain:
/// - macOS: Keychain
/// - Windows: Credential Manager
/// - Linux: Secret Service (libsecret)
///
/// A missing key is not an error. It resolves to an empty secret, which
/// makes every authenticated operation a silent no-op.
pub struct SecretManager {
    service_name: String,
    env_var: String,
}

/// Regex patterns for detecting credentials in remote error text
static SECRET_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

fn get_secret_patterns() -> &'static Vec<Regex> {
    SECRET_PATTERNS.get_or_init(|| {
        vec![
            // Bearer tokens, as echoed back by proxies in error pages
            Regex::new(r"Bearer\s+[^\s]+").expect("Invalid Bearer pattern"),
            // api_key=... / api-key: ... query or header echoes
            Regex::new(r"(?i)api[_-]?key[=:]\s*[^\s&]+").expect("Invalid api key pattern"),
        ]
    })
}

/// Scrubs credentials from text by replacing them with [REDACTED].
///
/// # Examples
/// ```
/// use secure_updates_engine::secrets::scrub;
///
/// let scrubbed = scrub("upstream said: Authorization: Bearer abc123", None);
/// assert_eq!(scrubbed, "upstream said: Authorization: [REDACTED]");
/// ```
pub fn scrub(text: &str, known_secret: Option<&SecretString>) -> String {
    let mut result = text.to_string();

    if let Some(secret) = known_secret {
        if !secret.is_empty() {
            result = result.replace(secret.unsecure(), "[REDACTED]");
        }
    }

    for pattern in get_secret_patterns() {
        result = pattern.replace_all(&result, "[REDACTED]").to_string();
    }

    result
}

impl SecretManager {
    /// Creates a new SecretManager with the given keychain service name.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            env_var: API_KEY_ENV_VAR.to_string(),
        }
    }

    /// Use a different environment variable for the override
    pub fn with_env_var(mut self, env_var: impl Into<String>) -> Self {
        self.env_var = env_var.into();
        self
    }

    /// Resolve the host API key without prompting.
    ///
    /// # Errors
    /// Returns `UpdateError::Keyring` if the keychain exists but cannot be read.
    pub fn resolve_api_key(&self) -> Result<SecretString, UpdateError> {
        if let Ok(value) = std::env::var(&self.env_var) {
            let secret = SecretString::new(value.trim());
            if !secret.is_empty() {
                tracing::debug!("Using API key from {}", self.env_var);
                return Ok(secret);
            }
        }

        let entry = self.entry()?;
        match entry.get_password() {
            Ok(secret) => {
                tracing::debug!("Retrieved '{}' from keychain", OPTION_API_KEY);
                Ok(SecretString::new(secret))
            }
            Err(keyring::Error::NoEntry) => {
                tracing::debug!("No '{}' in keychain", OPTION_API_KEY);
                Ok(SecretString::default())
            }
            Err(e) => Err(UpdateError::Keyring(format!(
                "Failed to retrieve '{}': {}",
                OPTION_API_KEY, e
            ))),
        }
    }

    /// Stores the host API key in the OS keychain.
    pub fn set_api_key(&self, value: &SecretString) -> Result<(), UpdateError> {
        if value.is_empty() {
            return Err(UpdateError::Keyring("API key cannot be empty".to_string()));
        }

        self.entry()?
            .set_password(value.unsecure().trim())
            .map_err(|e| {
                UpdateError::Keyring(format!("Failed to store '{}': {}", OPTION_API_KEY, e))
            })?;

        tracing::info!("Stored '{}' in keychain", OPTION_API_KEY);
        Ok(())
    }

    /// Deletes the host API key from the OS keychain.
    pub fn delete_api_key(&self) -> Result<(), UpdateError> {
        self.entry()?.delete_password().map_err(|e| {
            UpdateError::Keyring(format!("Failed to delete '{}': {}", OPTION_API_KEY, e))
        })?;

        tracing::info!("Deleted '{}' from keychain", OPTION_API_KEY);
        Ok(())
    }

    /// Prompts for the API key without echoing it.
    pub fn prompt_api_key(&self) -> Result<SecretString, UpdateError> {
        let value = rpassword::prompt_password_stderr("Enter the API key provided by the secure updates server: ")
            .map_err(|e| UpdateError::Keyring(format!("Failed to read input: {}", e)))?;

        let secret = SecretString::new(crate::config::sanitize_text_field(&value));
        if secret.is_empty() {
            return Err(UpdateError::Keyring("API key cannot be empty".to_string()));
        }
        Ok(secret)
    }

    fn entry(&self) -> Result<Entry, UpdateError> {
        Entry::new(&self.service_name, OPTION_API_KEY).map_err(|e| {
            UpdateError::Keyring(format!("Failed to create keyring entry: {}", e))
        })
    }
}
