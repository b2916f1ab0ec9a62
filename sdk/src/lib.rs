//! Secure Updates SDK
//!
//! Shared types and error taxonomy for the secure updates engine and any
//! host integration built on top of it.

/// Error types and handling
pub mod errors;

/// Plugin, update and sync data model
pub mod types;

// Re-export commonly used types
pub use errors::{ErrorClass, UpdateError, UpdateErrorExt};
pub use types::{
    slug_from_file, ActivityEntry, ActivityResult, PluginDescriptor, SkipReason, SyncResult,
    UpdateCandidate,
};
