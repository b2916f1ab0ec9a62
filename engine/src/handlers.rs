//! Command handlers for CLI operations
//!
//! Each handler opens what it needs (database, keychain, inventory), runs
//! one engine operation and prints the outcome as text or JSON. Handlers
//! return `anyhow::Result`; engine errors are wrapped with context here.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use sdk::types::{ActivityEntry, ActivityResult, PluginDescriptor, SyncResult, UpdateCandidate};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::activity_log::{ActivityLog, ACTION_VERIFY_PACKAGE};
use crate::cli::{ConfigAction, LifecycleAction};
use crate::config::{Config, RemoteHostConfig};
use crate::db::{Database, SqliteActivityLog, SqliteRateGate};
use crate::indicator::{row_badge, SecureUpdateIndicator};
use crate::inventory::{JsonInventory, PluginInventory};
use crate::probe::ConnectionProbe;
use crate::remote::HttpRemote;
use crate::rewriter::rewrite_all;
use crate::secrets::{SecretManager, DEFAULT_SERVICE_NAME};
use crate::sync::{InventorySync, LifecycleEvent, LifecycleHandler};
use crate::trust::{is_compatible, is_redirect_eligible, TrustState};
use crate::verifier;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Shared state for commands that talk to the update host
///
/// Cooldowns are admitted through the `rate_windows` table at call time, so
/// concurrent CLI processes share one window per tier.
struct EngineContext {
    database: Database,
    remote: Arc<HttpRemote>,
    gate: Arc<SqliteRateGate>,
    log: Arc<SqliteActivityLog>,
    now: Instant,
}

impl EngineContext {
    async fn open(config: &Config) -> Result<Self> {
        let database = Database::new(&config.activity_db_path())
            .await
            .context("Failed to open database")?;

        let remote = HttpRemote::new(
            config.limits.request_timeout(),
            config.transport.allow_plaintext_loopback,
        )
        .context("Failed to create HTTP client")?;

        let now = Instant::now();
        let gate = SqliteRateGate::new(
            database.rate_windows(),
            config.limits.probe_cooldown(),
            config.limits.sync_cooldown(),
        )
        .with_anchor(now, Utc::now());

        let log = Arc::new(database.activity_log());

        Ok(Self {
            database,
            remote: Arc::new(remote),
            gate: Arc::new(gate),
            log,
            now,
        })
    }

    fn inventory_sync(&self, config: &Config) -> InventorySync {
        InventorySync::new(
            self.remote.clone(),
            self.gate.clone(),
            self.log.clone(),
            config.core.site_home.clone(),
        )
    }

    async fn finish(self) -> Result<()> {
        self.database.close().await
    }
}

/// Host settings with the API key resolved from the environment or keychain
fn remote_host_config(config: &Config) -> Result<RemoteHostConfig> {
    let api_key = SecretManager::new(DEFAULT_SERVICE_NAME)
        .resolve_api_key()
        .context("Failed to resolve API key")?;
    Ok(config.remote_host(api_key))
}

fn load_trust_state(config: &Config) -> Result<TrustState> {
    match &config.host.mirrored_plugins_path {
        Some(path) => TrustState::load_from_path(path)
            .with_context(|| format!("Failed to load mirrored plugins from {}", path.display())),
        None => Ok(TrustState::default()),
    }
}

fn inventory(config: &Config) -> Result<JsonInventory> {
    config
        .host
        .inventory_path
        .as_ref()
        .map(JsonInventory::new)
        .ok_or_else(|| {
            anyhow!("No plugin inventory configured. Set it with 'config set inventory_path <file>'")
        })
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Show host settings and per-plugin secure update state
pub async fn handle_status(
    config: &Config,
    site_version: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let host = remote_host_config(config)?;
    let trust_state = load_trust_state(config)?;
    let plugins = match &config.host.inventory_path {
        Some(path) => JsonInventory::new(path)
            .plugins()
            .context("Failed to read plugin inventory")?,
        None => Vec::new(),
    };

    let rows: Vec<_> = plugins
        .iter()
        .map(|plugin| {
            json!({
                "file": plugin.file_identifier,
                "slug": plugin.slug(),
                "redirect_eligible": is_redirect_eligible(plugin, &host),
                "securely_updated": row_badge(&plugin.file_identifier, &trust_state).is_some(),
                "compatible": site_version.as_deref().map(|v| is_compatible(plugin, v)),
            })
        })
        .collect();

    match format {
        OutputFormat::Text => {
            println!("Secure Updates Status:");
            println!("  Host URL:         {}", display_or_unset(&host.base_url));
            println!("  Host enabled:     {}", yes_no(host.enabled));
            println!(
                "  API key:          {}",
                configured_or_not(!host.api_key.is_empty())
            );
            println!("  Site home:        {}", display_or_unset(&config.core.site_home));
            println!("  Mirrored plugins: {}", trust_state.len());
            println!();

            if plugins.is_empty() {
                println!("No installed plugins listed.");
                return Ok(());
            }

            println!("Plugins ({}):", plugins.len());
            for plugin in &plugins {
                let mut line = format!(
                    "  {} [redirect: {}]",
                    plugin.file_identifier,
                    yes_no(is_redirect_eligible(plugin, &host))
                );
                if let Some(badge) = row_badge(&plugin.file_identifier, &trust_state) {
                    line.push_str(&format!(" {}", badge));
                }
                if let Some(version) = site_version.as_deref() {
                    if !is_compatible(plugin, version) {
                        line.push_str(" (requires newer site version)");
                    }
                }
                println!("{}", line);
            }
        }
        OutputFormat::Json => {
            print_json(&json!({
                "host": {
                    "url": host.base_url,
                    "enabled": host.enabled,
                    "api_key_configured": !host.api_key.is_empty(),
                },
                "site_home": config.core.site_home,
                "mirrored_plugins": trust_state.len(),
                "plugins": rows,
            }))?;
        }
    }

    Ok(())
}

fn configured_or_not(value: bool) -> &'static str {
    if value {
        "configured"
    } else {
        "not set"
    }
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

/// Interactive connection test against `url` or the configured host
pub async fn handle_test_connection(
    url: Option<String>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let url = url.unwrap_or_else(|| config.host.custom_update_host_url.clone());
    let ctx = EngineContext::open(config).await?;
    let probe = ConnectionProbe::new(ctx.remote.clone(), ctx.gate.clone(), ctx.log.clone());

    let report = probe.test_connection(&url, ctx.now).await;
    ctx.finish().await?;

    match format {
        OutputFormat::Text => {
            if report.success {
                println!("✓ {}", report.message);
            } else {
                println!("✗ {}", report.message);
            }
        }
        OutputFormat::Json => print_json(&serde_json::to_value(&report)?)?,
    }

    if report.success {
        Ok(())
    } else {
        Err(anyhow!("Connection test failed: {}", report.message))
    }
}

/// Send requested slugs, or the whole inventory, to the update host
pub async fn handle_sync(slugs: Vec<String>, config: &Config, format: OutputFormat) -> Result<()> {
    let host = remote_host_config(config)?;
    let plugins: Vec<PluginDescriptor> = if slugs.is_empty() {
        inventory(config)?
            .plugins()
            .context("Failed to read plugin inventory")?
    } else {
        Vec::new()
    };

    let ctx = EngineContext::open(config).await?;
    let result = ctx
        .inventory_sync(config)
        .sync(Some(slugs.as_slice()), &plugins, &host, ctx.now)
        .await;
    ctx.finish().await?;

    print_sync_result(Some(&result), format)
}

/// Map a lifecycle event onto an inventory sync
pub async fn handle_lifecycle(
    action: LifecycleAction,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let event = match action {
        LifecycleAction::Activated { file } => LifecycleEvent::Activated(file),
        LifecycleAction::Deactivated { file } => LifecycleEvent::Deactivated(file),
        LifecycleAction::Upgraded { kind, files } => LifecycleEvent::Upgraded { kind, files },
        LifecycleAction::Scheduled => LifecycleEvent::Scheduled,
    };

    let host = remote_host_config(config)?;
    let inventory: Arc<dyn PluginInventory> = Arc::new(inventory(config)?);

    let ctx = EngineContext::open(config).await?;
    let handler = LifecycleHandler::new(ctx.inventory_sync(config), inventory);
    let result = handler.handle(event, &host, ctx.now).await;
    ctx.finish().await?;

    print_sync_result(result.as_ref(), format)
}

fn print_sync_result(result: Option<&SyncResult>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => match result {
            None => println!("Nothing to sync."),
            Some(result) if result.success => println!(
                "✓ Sent {} plugins to the update host",
                result.attempted_slugs.len()
            ),
            Some(SyncResult {
                skipped: Some(reason),
                ..
            }) => println!("Sync skipped: {}", reason),
            Some(result) => println!(
                "✗ Sync failed: {}",
                result.remote_error.as_deref().unwrap_or("unknown error")
            ),
        },
        OutputFormat::Json => print_json(&json!({ "result": result }))?,
    }
    Ok(())
}

/// Rewrite a JSON list of pending updates
pub async fn handle_rewrite(pending: &Path, config: &Config, format: OutputFormat) -> Result<()> {
    let contents = tokio::fs::read_to_string(pending)
        .await
        .with_context(|| format!("Failed to read {}", pending.display()))?;
    let candidates: Vec<UpdateCandidate> =
        serde_json::from_str(&contents).context("Failed to parse pending updates")?;

    // Rewriting never needs the API key.
    let host = config.remote_host(Default::default());
    let before: Vec<String> = candidates
        .iter()
        .map(|c| c.proposed_package_url.clone())
        .collect();
    let rewritten = rewrite_all(candidates, &host);

    match format {
        OutputFormat::Text => {
            for (old, candidate) in before.iter().zip(&rewritten) {
                if *old == candidate.proposed_package_url {
                    println!("  {} (unchanged)", candidate.plugin.file_identifier);
                } else {
                    println!(
                        "  {} -> {}",
                        candidate.plugin.file_identifier, candidate.proposed_package_url
                    );
                }
            }
        }
        OutputFormat::Json => print_json(&serde_json::to_value(&rewritten)?)?,
    }

    Ok(())
}

/// Verify a local package against a checksum
pub async fn handle_verify(
    file: &Path,
    checksum: &str,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let package = std::fs::File::open(file)
        .with_context(|| format!("Failed to open {}", file.display()))?;
    let matches = verifier::verify(checksum, std::io::BufReader::new(package));

    let database = Database::new(&config.activity_db_path())
        .await
        .context("Failed to open database")?;
    let result = if matches {
        ActivityResult::Success
    } else {
        ActivityResult::Failure
    };
    database
        .activity_log()
        .record(ActivityEntry::new(
            ACTION_VERIFY_PACKAGE,
            result,
            format!(
                "{} {}",
                file.display(),
                if matches { "matches checksum" } else { "does not match checksum" }
            ),
        ))
        .await;
    database.close().await?;

    match format {
        OutputFormat::Text => {
            if matches {
                println!("✓ Checksum verified");
            } else {
                println!("✗ Checksum mismatch");
            }
        }
        OutputFormat::Json => print_json(&json!({
            "file": file,
            "verified": matches,
        }))?,
    }

    if matches {
        Ok(())
    } else {
        Err(anyhow!("Checksum mismatch for {}", file.display()))
    }
}

/// Secure update information for one slug, optionally verifying a package
pub async fn handle_info(
    slug: &str,
    package: Option<PathBuf>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let package = package
        .map(|path| {
            std::fs::File::open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))
        })
        .transpose()?;
    let host = remote_host_config(config)?;
    let trust_state = load_trust_state(config)?;

    let ctx = EngineContext::open(config).await?;
    let indicator = SecureUpdateIndicator::new(ctx.remote.clone(), ctx.log.clone());

    let info = indicator.plugin_information(slug, &host, &trust_state).await;
    let verified = match (&info, package) {
        (Ok(Some(_)), Some(file)) => {
            Some(
                indicator
                    .verify_package(slug, &host, &trust_state, std::io::BufReader::new(file))
                    .await,
            )
        }
        _ => None,
    };
    ctx.finish().await?;

    let info = info.context("Secure update check failed")?;
    let verified = verified.transpose().context("Package verification failed")?;

    match format {
        OutputFormat::Text => match &info {
            Some(info) => {
                println!("{}: {}", info.slug, info.message);
                println!("  Checksum: {}", info.checksum);
                if verified.is_some() {
                    println!("  ✓ Package matches published checksum");
                }
            }
            None => println!("{}: no secure update information", slug),
        },
        OutputFormat::Json => print_json(&json!({
            "slug": slug,
            "secure_update": info,
            "package_verified": verified.is_some(),
        }))?,
    }

    Ok(())
}

/// Show the most recent activity entries
pub async fn handle_logs(limit: usize, config: &Config, format: OutputFormat) -> Result<()> {
    let database = Database::new(&config.activity_db_path())
        .await
        .context("Failed to open database")?;
    let entries = database
        .activity_log()
        .recent(limit)
        .await
        .context("Failed to fetch activity log")?;
    database.close().await?;

    match format {
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No activity recorded");
                return Ok(());
            }
            println!("Recent activity (last {}):", limit);
            println!();
            for entry in &entries {
                println!(
                    "{}  {:<18} {:<8} {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.action,
                    entry.result,
                    entry.message
                );
            }
        }
        OutputFormat::Json => print_json(&json!({
            "entries": entries,
            "count": entries.len(),
            "limit": limit
        }))?,
    }

    Ok(())
}

/// Show, change or validate configuration
pub async fn handle_config(
    action: ConfigAction,
    config: &Config,
    config_path: &Path,
    format: OutputFormat,
) -> Result<()> {
    let secrets = SecretManager::new(DEFAULT_SERVICE_NAME);

    match action {
        ConfigAction::Show => {
            let api_key_configured = secrets
                .resolve_api_key()
                .map(|key| !key.is_empty())
                .unwrap_or(false);
            match format {
                OutputFormat::Text => {
                    println!("# {}", config_path.display());
                    println!("{}", toml::to_string_pretty(config)?);
                    println!("# API key: {}", configured_or_not(api_key_configured));
                }
                OutputFormat::Json => print_json(&json!({
                    "path": config_path,
                    "config": config,
                    "api_key_configured": api_key_configured,
                }))?,
            }
        }
        ConfigAction::Set { name, value } => {
            let mut updated = config.clone();
            updated
                .set_option(&name, &value)
                .with_context(|| format!("Failed to set '{}'", name))?;
            updated.save_to_path(config_path)?;
            println!("Updated '{}'", name);
        }
        ConfigAction::SetApiKey => {
            let key = secrets.prompt_api_key()?;
            secrets.set_api_key(&key)?;
            println!("API key stored in keychain");
        }
        ConfigAction::DeleteApiKey => {
            secrets.delete_api_key()?;
            println!("API key removed from keychain");
        }
        ConfigAction::Validate => {
            // Loading already validated the file.
            println!("✓ Configuration is valid: {}", config_path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default_config();
        config.core.data_dir = dir.path().to_path_buf();
        config
    }

    #[test]
    fn test_inventory_requires_path() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        assert!(inventory(&config).is_err());
    }

    #[test]
    fn test_trust_state_defaults_to_empty() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        assert!(load_trust_state(&config).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_verify_handler() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let package = dir.path().join("package.zip");
        std::fs::write(&package, b"hello world").unwrap();

        let good = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
        assert!(handle_verify(&package, good, &config, OutputFormat::Json)
            .await
            .is_ok());
        assert!(handle_verify(&package, &"0".repeat(64), &config, OutputFormat::Json)
            .await
            .is_err());

        let database = Database::new(&config.activity_db_path()).await.unwrap();
        let entries = database.activity_log().recent(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, ACTION_VERIFY_PACKAGE);
    }

    #[tokio::test]
    async fn test_info_missing_package_fails_before_opening_database() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let missing = dir.path().join("missing.zip");

        let err = handle_info("akismet", Some(missing), &config, OutputFormat::Json)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to open"));
        assert!(!config.activity_db_path().exists());
    }

    #[tokio::test]
    async fn test_rewrite_handler_reads_candidates() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let pending = dir.path().join("pending.json");
        std::fs::write(
            &pending,
            r#"[{"plugin": {"file": "akismet/akismet.php"}, "proposed_package_url": "https://downloads.example/akismet.zip"}]"#,
        )
        .unwrap();

        assert!(handle_rewrite(&pending, &config, OutputFormat::Json)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_config_set_persists() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let path = dir.path().join("config.toml");

        handle_config(
            ConfigAction::Set {
                name: "custom_update_host_url".to_string(),
                value: " https://updates.example.com ".to_string(),
            },
            &config,
            &path,
            OutputFormat::Text,
        )
        .await
        .unwrap();

        let reloaded = Config::load_from_path(&path).unwrap();
        assert_eq!(
            reloaded.host.custom_update_host_url,
            "https://updates.example.com"
        );
    }
}
