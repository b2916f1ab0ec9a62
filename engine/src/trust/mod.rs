//! Trust decisions
//!
//! Pure predicates deciding whether a plugin's updates may be redirected to
//! the custom host and whether it counts as securely updated. Every
//! predicate fails closed: missing data means "not eligible" or "not
//! trusted".
//!
//! The mirrored plugins registry ([`TrustState`]) is owned by the host's
//! settings store and only read here. It is eventually consistent with the
//! remote host and is never assumed to reflect the last inventory sync.

use sdk::errors::UpdateError;
use sdk::types::{slug_from_file, PluginDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::config::RemoteHostConfig;

/// Read-only view of the mirrored plugins registry
///
/// Maps slug to a trusted flag. Presence of the key is what counts: a slug
/// listed with `false` is still mirrored, matching how the registry is
/// written by the settings store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrustState {
    entries: HashMap<String, bool>,
}

impl TrustState {
    pub fn new(entries: HashMap<String, bool>) -> Self {
        Self { entries }
    }

    /// Build from a list of mirrored slugs
    pub fn from_slugs<I, S>(slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: slugs.into_iter().map(|s| (s.into(), true)).collect(),
        }
    }

    /// Load the registry from a JSON object file (`{"slug": true, ...}`)
    ///
    /// A missing file is an empty registry.
    pub fn load_from_path(path: &Path) -> Result<Self, UpdateError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| {
            UpdateError::Config(format!("Failed to parse mirrored plugins registry: {}", e))
        })
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.entries.contains_key(slug)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether the plugin declares its own update endpoint
///
/// Such plugins are never redirected.
pub fn has_custom_update_mechanism(plugin: &PluginDescriptor) -> bool {
    plugin
        .update_uri
        .as_deref()
        .is_some_and(|uri| !uri.trim().is_empty())
}

/// Heuristic: registry-hosted packages carry no explicit package URL
///
/// Only self-hosted and third-party packages declare one. This is a proxy,
/// not a guarantee; swap the body for a stronger signal when one exists.
pub fn is_registry_hosted(plugin: &PluginDescriptor) -> bool {
    plugin
        .declared_package_source
        .as_deref()
        .map_or(true, |source| source.trim().is_empty())
}

/// Whether the plugin's updates should come from the custom host
pub fn is_redirect_eligible(plugin: &PluginDescriptor, config: &RemoteHostConfig) -> bool {
    config.enabled && !has_custom_update_mechanism(plugin) && is_registry_hosted(plugin)
}

/// Whether the custom host mirrors the plugin with this slug
pub fn is_mirrored(slug: &str, trust_state: &TrustState) -> bool {
    !slug.is_empty() && trust_state.contains(slug)
}

/// Whether the plugin file's updates are routed through the custom host
pub fn is_securely_updated(plugin_file: &str, trust_state: &TrustState) -> bool {
    slug_from_file(plugin_file).is_some_and(|slug| is_mirrored(slug, trust_state))
}

/// Whether the host version satisfies the plugin's minimum requirement
///
/// Absent or unparsable requirements are treated as compatible, like the
/// host's own version gate.
pub fn is_compatible(plugin: &PluginDescriptor, host_version: &str) -> bool {
    let Some(required) = plugin.requires_min_version.as_deref() else {
        return true;
    };
    match (parse_lenient(required), parse_lenient(host_version)) {
        (Some(required), Some(host)) => host >= required,
        _ => true,
    }
}

/// Parse `5`, `5.8` or `5.8.1` style versions into semver
fn parse_lenient(version: &str) -> Option<semver::Version> {
    let core = version
        .trim()
        .split(|c: char| c == '-' || c == '+')
        .next()
        .unwrap_or_default();
    let mut parts = core.split('.').map(|p| p.parse::<u64>().ok());
    let major = parts.next()??;
    let minor = parts.next().unwrap_or(Some(0))?;
    let patch = parts.next().unwrap_or(Some(0))?;
    Some(semver::Version::new(major, minor, patch))
}
