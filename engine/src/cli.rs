//! CLI interface for secure-updates
//!
//! Defines the commands and global flags using clap's derive API. Each
//! command stands in for one trigger of the host site: the update-check
//! cycle, plugin lifecycle events, the daily sync and the interactive
//! connection test.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Secure updates client
///
/// Redirects plugin updates to a self-hosted mirror, keeps the mirror's
/// inventory in sync with this site and verifies downloaded packages.
#[derive(Parser, Debug)]
#[command(name = "secure-updates")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show host settings and the secure update state of installed plugins
    Status {
        /// Site version used for the compatibility column
        #[arg(long, value_name = "VERSION")]
        site_version: Option<String>,
    },

    /// Test the connection to an update host
    TestConnection {
        /// Host URL (defaults to the configured host)
        url: Option<String>,
    },

    /// Send the plugin inventory to the update host
    Sync {
        /// Only send these slugs
        #[arg(long = "slug", value_name = "SLUG")]
        slugs: Vec<String>,
    },

    /// Report a plugin lifecycle event
    Lifecycle {
        #[command(subcommand)]
        event: LifecycleAction,
    },

    /// Rewrite pending updates to point at the update host
    Rewrite {
        /// JSON file with the pending update candidates
        pending: PathBuf,
    },

    /// Verify a package file against a SHA-256 checksum
    Verify {
        /// Package file
        file: PathBuf,
        /// Expected hex digest
        checksum: String,
    },

    /// Show secure update information for a mirrored plugin
    Info {
        /// Plugin slug
        slug: String,

        /// Verify this package against the published checksum
        #[arg(long, value_name = "FILE")]
        package: Option<PathBuf>,
    },

    /// Show recent activity
    Logs {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Plugin lifecycle events
#[derive(Subcommand, Debug)]
pub enum LifecycleAction {
    /// A plugin was activated
    Activated {
        /// Plugin file, e.g. akismet/akismet.php
        file: String,
    },

    /// A plugin was deactivated
    Deactivated {
        /// Plugin file
        file: String,
    },

    /// An upgrade finished
    Upgraded {
        /// Upgrade kind; only "plugin" triggers a sync
        #[arg(long, default_value = "plugin")]
        kind: String,

        /// Upgraded plugin files
        files: Vec<String>,
    },

    /// Daily scheduled sync
    Scheduled,
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set an option
    Set {
        /// Option name (e.g., "custom_update_host_url")
        name: String,
        /// Option value
        value: String,
    },

    /// Store the update host API key in the OS keychain
    SetApiKey,

    /// Remove the update host API key from the OS keychain
    DeleteApiKey,

    /// Validate configuration file
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["secure-updates", "status"]);
        assert!(matches!(cli.command, Command::Status { site_version: None }));
        assert!(!cli.json);
        assert!(cli.log.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["secure-updates", "--json", "--log", "debug", "logs"]);
        assert!(cli.json);
        assert_eq!(cli.log, Some("debug".to_string()));
        assert!(matches!(cli.command, Command::Logs { limit: 50 }));
    }

    #[test]
    fn test_sync_slugs() {
        let cli = Cli::parse_from([
            "secure-updates",
            "sync",
            "--slug",
            "akismet",
            "--slug",
            "jetpack",
        ]);
        if let Command::Sync { slugs } = cli.command {
            assert_eq!(slugs, vec!["akismet", "jetpack"]);
        } else {
            panic!("Expected Sync command");
        }
    }

    #[test]
    fn test_lifecycle_upgraded() {
        let cli = Cli::parse_from([
            "secure-updates",
            "lifecycle",
            "upgraded",
            "akismet/akismet.php",
            "hello.php",
        ]);
        if let Command::Lifecycle {
            event: LifecycleAction::Upgraded { kind, files },
        } = cli.command
        {
            assert_eq!(kind, "plugin");
            assert_eq!(files.len(), 2);
        } else {
            panic!("Expected Lifecycle upgraded command");
        }
    }

    #[test]
    fn test_test_connection_url_optional() {
        let cli = Cli::parse_from(["secure-updates", "test-connection"]);
        assert!(matches!(cli.command, Command::TestConnection { url: None }));

        let cli = Cli::parse_from(["secure-updates", "test-connection", "https://h.example"]);
        if let Command::TestConnection { url } = cli.command {
            assert_eq!(url.as_deref(), Some("https://h.example"));
        } else {
            panic!("Expected TestConnection command");
        }
    }

    #[test]
    fn test_config_set() {
        let cli = Cli::parse_from([
            "secure-updates",
            "config",
            "set",
            "custom_update_host_enabled",
            "1",
        ]);
        if let Command::Config {
            action: ConfigAction::Set { name, value },
        } = cli.command
        {
            assert_eq!(name, "custom_update_host_enabled");
            assert_eq!(value, "1");
        } else {
            panic!("Expected ConfigAction::Set");
        }
    }
}
