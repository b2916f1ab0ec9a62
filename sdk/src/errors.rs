//! Error types and handling
//!
//! This module provides the error types used throughout the secure updates
//! engine. All errors implement the `UpdateErrorExt` trait which provides
//! user-friendly hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! Error messages never carry the API key or the bearer header. Callers that
//! build messages from remote responses scrub them before logging.

use thiserror::Error;

/// Trait for update error extensions
///
/// Provides additional context for errors, including user-friendly hints
/// and recoverability information.
pub trait UpdateErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// credentials or internal implementation details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors are retried at the next opportunity (next
    /// lifecycle event or scheduled sync). Non-recoverable errors require
    /// operator action.
    fn is_recoverable(&self) -> bool;

    /// Classifies the error into the engine's error taxonomy
    fn class(&self) -> ErrorClass;
}

/// Error taxonomy used to decide how a failure is surfaced
///
/// - **Configuration**: disabled host or missing credentials. Silent no-op.
/// - **Transport**: timeout, DNS, TLS. Logged; generic message interactively.
/// - **RemoteRejection**: non-2xx answer. Same handling as transport.
/// - **Integrity**: checksum mismatch. Blocks the secure update indicator.
/// - **Local**: keychain, database, filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Configuration,
    Transport,
    RemoteRejection,
    Integrity,
    Local,
}

/// Main engine error type
///
/// # Examples
///
/// ```
/// use sdk::errors::{ErrorClass, UpdateError, UpdateErrorExt};
///
/// let error = UpdateError::RemoteRejection { status: 404 };
/// assert_eq!(error.class(), ErrorClass::RemoteRejection);
/// assert!(error.is_recoverable());
///
/// let integrity = UpdateError::Integrity("checksum mismatch".to_string());
/// assert!(!integrity.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum UpdateError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Insecure transport refused for {0}")]
    InsecureTransport(String),

    // Network errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Remote host rejected the request with HTTP {status}")]
    RemoteRejection { status: u16 },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    // Security errors
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    // Local errors
    #[error("Keyring error: {0}")]
    Keyring(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpdateErrorExt for UpdateError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check the secure updates configuration",
            Self::InvalidUrl(_) => "Invalid URL provided.",
            Self::InsecureTransport(_) => "The update host must be reachable over HTTPS",
            Self::Transport(_) | Self::Timeout => "Connection failed. Please check the URL.",
            Self::RemoteRejection { .. } => "Connection failed. Please check the URL.",
            Self::MalformedResponse(_) => "The update host returned an unexpected response",
            Self::Integrity(_) => "Security verification failed. Package may be tampered",
            Self::Keyring(_) => "Failed to access secure storage. Check system keychain",
            Self::Database(_) => "Failed to access the activity log",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Integrity(_) | Self::InsecureTransport(_))
    }

    fn class(&self) -> ErrorClass {
        match self {
            Self::Config(_) | Self::InvalidUrl(_) | Self::InsecureTransport(_) => {
                ErrorClass::Configuration
            }
            Self::Transport(_) | Self::Timeout | Self::MalformedResponse(_) => {
                ErrorClass::Transport
            }
            Self::RemoteRejection { .. } => ErrorClass::RemoteRejection,
            Self::Integrity(_) => ErrorClass::Integrity,
            Self::Keyring(_) | Self::Database(_) | Self::Io(_) => ErrorClass::Local,
        }
    }
}
