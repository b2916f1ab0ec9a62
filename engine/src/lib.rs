//! Secure Updates Engine Library
//!
//! Decides which plugin updates are sourced from a self-hosted mirror,
//! rewrites their download URLs, verifies packages and keeps the mirror's
//! inventory in sync with the site. Used by the `secure-updates` binary and
//! the integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// Package checksum verification
pub mod verifier;

/// Redirect eligibility and trust predicates
pub mod trust;

/// Rate limiting module
pub mod rate_limiter;

/// Update source rewriting
pub mod rewriter;

/// Update host client and wire contract
pub mod remote;

/// Activity log collaborator
pub mod activity_log;

/// Database persistence module
pub mod db;

/// Installed plugin inventory
pub mod inventory;

/// Inventory synchronization and lifecycle triggers
pub mod sync;

/// Connection probe
pub mod probe;

/// Secure update indicator
pub mod indicator;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
