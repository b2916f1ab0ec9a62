//! Update source rewriting
//!
//! During the host's update-check cycle each pending update is passed
//! through [`rewrite`]. Eligible candidates get their package URL pointed
//! at the custom host's download endpoint; everything else passes through
//! untouched. Only the package URL changes, never the plugin metadata.

use sdk::types::UpdateCandidate;
use tracing::debug;

use crate::config::RemoteHostConfig;
use crate::remote::endpoints;
use crate::trust::is_redirect_eligible;

/// Normalize a slug for use in a download path
///
/// ASCII-lowercases, turns every run of characters outside `[a-z0-9]` into
/// a single `-` and trims `-` from both ends. Total and idempotent; input
/// with no alphanumerics becomes the empty string.
///
/// ```
/// use secure_updates_engine::rewriter::slugify;
///
/// assert_eq!(slugify("Classic Editor"), "classic-editor");
/// assert_eq!(slugify("../../etc"), "etc");
/// assert_eq!(slugify(&slugify("WP_Super--Cache")), slugify("WP_Super--Cache"));
/// ```
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    out
}

/// Download URL of a plugin on the custom host
pub fn download_url(base_url: &str, slug: &str) -> String {
    endpoints::download(base_url, &slugify(slug))
}

/// Point an eligible candidate at the custom host
///
/// Ineligible candidates are returned unchanged. Never fails: a missing or
/// malformed slug degrades to an empty download path.
pub fn rewrite(candidate: UpdateCandidate, config: &RemoteHostConfig) -> UpdateCandidate {
    if !is_redirect_eligible(&candidate.plugin, config) {
        return candidate;
    }

    let slug = candidate.plugin.slug().unwrap_or_default();
    let proposed_package_url = download_url(&config.base_url, slug);

    debug!(
        "Redirecting update for {} to {}",
        candidate.plugin.file_identifier, proposed_package_url
    );

    UpdateCandidate {
        proposed_package_url,
        ..candidate
    }
}

/// Rewrite a whole batch of pending updates
///
/// One bad entry never blocks redirection of the rest.
pub fn rewrite_all(
    candidates: Vec<UpdateCandidate>,
    config: &RemoteHostConfig,
) -> Vec<UpdateCandidate> {
    if !config.enabled || candidates.is_empty() {
        return candidates;
    }

    candidates
        .into_iter()
        .map(|candidate| rewrite(candidate, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SecretString;
    use sdk::types::PluginDescriptor;

    fn enabled() -> RemoteHostConfig {
        RemoteHostConfig::new("https://updates.example.com/", true, SecretString::new("k"))
    }

    #[test]
    fn test_slugify_examples() {
        assert_eq!(slugify("akismet"), "akismet");
        assert_eq!(slugify("Classic Editor"), "classic-editor");
        assert_eq!(slugify("wp_super__cache"), "wp-super-cache");
        assert_eq!(slugify("--a--b--"), "a-b");
        assert_eq!(slugify("Ünïcode plugin"), "n-code-plugin");
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slugify_idempotent_examples() {
        for input in ["Hello World", "a/b/c", "  spaced  out ", "x--y", "ÄÖÜ"] {
            let once = slugify(input);
            assert_eq!(slugify(&once), once);
        }
    }

    #[test]
    fn test_rewrite_eligible_candidate() {
        let candidate = UpdateCandidate::new(PluginDescriptor::new("Akismet/akismet.php"), "");
        let rewritten = rewrite(candidate.clone(), &enabled());

        assert_eq!(
            rewritten.proposed_package_url,
            "https://updates.example.com/wp-json/secure-updates-server/v1/download/akismet"
        );
        assert_eq!(rewritten.plugin, candidate.plugin);
    }

    #[test]
    fn test_rewrite_ineligible_is_identity() {
        let custom = UpdateCandidate::new(
            PluginDescriptor::new("vendor/vendor.php").with_update_uri("https://vendor.example"),
            "https://vendor.example/vendor.zip",
        );
        assert_eq!(rewrite(custom.clone(), &enabled()), custom);

        let third_party = UpdateCandidate::new(
            PluginDescriptor::new("pro/pro.php").with_package_source("https://pro.example/p.zip"),
            "https://pro.example/p.zip",
        );
        assert_eq!(rewrite(third_party.clone(), &enabled()), third_party);

        let plain = UpdateCandidate::new(PluginDescriptor::new("a/a.php"), "orig");
        assert_eq!(rewrite(plain.clone(), &RemoteHostConfig::disabled()), plain);
    }

    #[test]
    fn test_rewrite_malformed_slug_degrades() {
        let candidate = UpdateCandidate::new(PluginDescriptor::new("hello.php"), "");
        let rewritten = rewrite(candidate, &enabled());
        assert_eq!(
            rewritten.proposed_package_url,
            "https://updates.example.com/wp-json/secure-updates-server/v1/download/"
        );
    }

    #[test]
    fn test_rewrite_all_keeps_going_past_bad_entries() {
        let batch = vec![
            UpdateCandidate::new(PluginDescriptor::new("???/x.php"), ""),
            UpdateCandidate::new(PluginDescriptor::new("jetpack/jetpack.php"), ""),
            UpdateCandidate::new(
                PluginDescriptor::new("own/own.php").with_update_uri("https://own.example"),
                "https://own.example/own.zip",
            ),
        ];

        let rewritten = rewrite_all(batch, &enabled());
        assert_eq!(rewritten.len(), 3);
        assert!(rewritten[0].proposed_package_url.ends_with("/download/"));
        assert!(rewritten[1].proposed_package_url.ends_with("/download/jetpack"));
        assert_eq!(rewritten[2].proposed_package_url, "https://own.example/own.zip");
    }
}
