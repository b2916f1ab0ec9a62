//! Shared data model for the secure updates engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One installed extension as reported by the host inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Plugin file relative to the plugins directory (e.g. `akismet/akismet.php`)
    #[serde(alias = "file")]
    pub file_identifier: String,

    /// Value of the plugin's own `Update URI` header, if any
    #[serde(default, alias = "UpdateURI")]
    pub update_uri: Option<String>,

    /// Package URL declared by the update data; empty for registry packages
    #[serde(default, alias = "package")]
    pub declared_package_source: Option<String>,

    /// Minimum host version the plugin requires
    #[serde(default, alias = "requires")]
    pub requires_min_version: Option<String>,
}

impl PluginDescriptor {
    /// Create a descriptor with only the file identifier set
    pub fn new(file_identifier: impl Into<String>) -> Self {
        Self {
            file_identifier: file_identifier.into(),
            update_uri: None,
            declared_package_source: None,
            requires_min_version: None,
        }
    }

    /// Set the plugin's own update URI
    pub fn with_update_uri(mut self, uri: impl Into<String>) -> Self {
        self.update_uri = Some(uri.into());
        self
    }

    /// Set the declared package source
    pub fn with_package_source(mut self, source: impl Into<String>) -> Self {
        self.declared_package_source = Some(source.into());
        self
    }

    /// Set the minimum required host version
    pub fn with_requires(mut self, version: impl Into<String>) -> Self {
        self.requires_min_version = Some(version.into());
        self
    }

    /// Slug derived from the containing directory of the plugin file
    ///
    /// Returns `None` for single-file plugins that live directly in the
    /// plugins directory (their directory resolves to `.`).
    pub fn slug(&self) -> Option<&str> {
        slug_from_file(&self.file_identifier)
    }
}

/// Directory component of a plugin file identifier
///
/// ```
/// use sdk::types::slug_from_file;
///
/// assert_eq!(slug_from_file("akismet/akismet.php"), Some("akismet"));
/// assert_eq!(slug_from_file("hello.php"), None);
/// ```
pub fn slug_from_file(file: &str) -> Option<&str> {
    let trimmed = file.trim_end_matches('/');
    let (dir, _) = trimmed.rsplit_once('/')?;
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() || dir == "." {
        None
    } else {
        Some(dir)
    }
}

/// A pending update for one plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCandidate {
    pub plugin: PluginDescriptor,

    /// Package URL the host will download the update from
    #[serde(default, alias = "package")]
    pub proposed_package_url: String,
}

impl UpdateCandidate {
    pub fn new(plugin: PluginDescriptor, proposed_package_url: impl Into<String>) -> Self {
        Self {
            plugin,
            proposed_package_url: proposed_package_url.into(),
        }
    }
}

/// Why an inventory sync made no network call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Host disabled, or URL / API key missing
    NotConfigured,
    /// Sync cooldown window has not elapsed
    CoolingDown,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "custom host not configured"),
            Self::CoolingDown => write!(f, "sync cooldown active"),
        }
    }
}

/// Outcome of one inventory synchronization attempt
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncResult {
    pub attempted_slugs: BTreeSet<String>,
    pub success: bool,
    pub remote_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
}

impl SyncResult {
    /// A sync that never reached the network
    pub fn skipped(reason: SkipReason, attempted_slugs: BTreeSet<String>) -> Self {
        Self {
            attempted_slugs,
            success: false,
            remote_error: None,
            skipped: Some(reason),
        }
    }
}

/// Result column of an activity log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityResult {
    Success,
    Failure,
    Skipped,
}

impl ActivityResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Skipped => "skipped",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for ActivityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(timestamp, action, result, message)` tuple for the activity log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub result: ActivityResult,
    pub message: String,
}

impl ActivityEntry {
    pub fn new(
        action: impl Into<String>,
        result: ActivityResult,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            action: action.into(),
            result,
            message: message.into(),
        }
    }
}
