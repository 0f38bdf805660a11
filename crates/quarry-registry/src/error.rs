//! Error types for the registry crate.

use miette::Diagnostic;
use quarry_utils::error::{FileSystemError, LockError};
use thiserror::Error;

/// Errors that can occur while resolving, loading or caching repository
/// metadata.
#[derive(Error, Diagnostic, Debug)]
pub enum RegistryError {
    #[error("Error while {action}: {source}")]
    #[diagnostic(code(quarry_registry::io))]
    IoError {
        action: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(quarry_registry::download))]
    DownloadError(#[from] quarry_dl::error::DownloadError),

    #[error(transparent)]
    #[diagnostic(code(quarry_registry::config))]
    ConfigError(#[from] quarry_config::error::ConfigError),

    #[error(transparent)]
    #[diagnostic(
        code(quarry_registry::json),
        help("The metadata file may be corrupted or in an invalid format")
    )]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    #[diagnostic(
        code(quarry_registry::invalid_url),
        help("Ensure the URL is valid and properly formatted")
    )]
    InvalidUrl(String),

    #[error("Repository {location} is not available offline")]
    #[diagnostic(
        code(quarry_registry::offline_unavailable),
        help("Run once without --offline to populate the metadata cache")
    )]
    OfflineUnavailable { location: String },

    #[error("Repository {location} contains partial records: {}", .units.join(", "))]
    #[diagnostic(
        code(quarry_registry::partial_repository),
        help("Partial records are incomplete stand-ins and must not be consumed; fix the repository")
    )]
    PartialRepository {
        location: String,
        units: Vec<String>,
    },

    #[error("Repository {location} is unreachable: {reason}")]
    #[diagnostic(
        code(quarry_registry::unreachable),
        help("An earlier load failed without a cached copy; retry with a new session")
    )]
    Unreachable { location: String, reason: String },

    #[error("Loading {location} was cancelled")]
    #[diagnostic(code(quarry_registry::cancelled))]
    Cancelled { location: String },

    #[error("Server reported {location} as not modified but nothing is cached")]
    #[diagnostic(code(quarry_registry::not_modified_without_cache))]
    NotModifiedWithoutCache { location: String },

    #[error("Failed to lock the metadata cache: {0}")]
    #[diagnostic(
        code(quarry_registry::lock),
        help("Another quarry process may be holding the cache lock")
    )]
    Lock(#[from] LockError),

    #[error(transparent)]
    #[diagnostic(code(quarry_registry::filesystem))]
    FileSystem(#[from] FileSystemError),
}

/// A specialized Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Extension trait for adding context to I/O errors.
pub trait ErrorContext<T> {
    /// Adds context to an error, describing what action was being performed.
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            RegistryError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
