//! Error types for quarry-core.

use miette::Diagnostic;
use quarry_config::error::ConfigError;
use quarry_dl::error::DownloadError;
use quarry_registry::error::RegistryError;
use quarry_utils::error::FileSystemError;
use thiserror::Error;

/// Core error type for artifact resolution.
///
/// Failures of a single repository attempt are [`TransferError`]s and are
/// reported through the fetch status instead of this type.
#[derive(Error, Diagnostic, Debug)]
pub enum QuarryError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    #[diagnostic(code(quarry::filesystem))]
    FileSystemError(#[from] FileSystemError),

    #[error("Error while {action}")]
    #[diagnostic(code(quarry::io), help("Check file permissions and disk space"))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact '{0}' not found")]
    #[diagnostic(
        code(quarry::not_found),
        help("Check the artifact coordinates and the configured repositories")
    )]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(quarry::configuration))]
    Configuration(String),

    #[error("Illegal state: {0}")]
    #[diagnostic(
        code(quarry::illegal_state),
        help("This is an internal error, please report it")
    )]
    IllegalState(String),

    #[error("Invalid version '{version}': {source}")]
    #[diagnostic(
        code(quarry::invalid_version),
        help("Versions use semantic versioning, e.g. 1.2.3")
    )]
    InvalidVersion {
        version: String,
        source: semver::Error,
    },

    #[error("Unknown processing step '{0}'")]
    #[diagnostic(
        code(quarry::unknown_processing_step),
        help("Supported processing steps are: zstd, gzip")
    )]
    UnknownProcessingStep(String),

    #[error("Invalid artifact query: {0}")]
    #[diagnostic(
        code(quarry::invalid_query),
        help("Use format: classifier/id/version (e.g. 'binary/app/1.0.0')")
    )]
    InvalidQuery(String),

    #[error("{0}")]
    #[diagnostic(code(quarry::error))]
    Custom(String),
}

/// Failure of one repository attempt inside a fetch.
#[derive(Error, Diagnostic, Debug)]
pub enum TransferError {
    #[error("Download of {url} failed: {source}")]
    #[diagnostic(code(quarry::transfer::download))]
    Download {
        url: String,
        #[source]
        source: DownloadError,
    },

    /// The repository can serve the same bytes from another mirror; the
    /// attempt should be repeated against the same repository.
    #[error("Mirror {url} failed, another mirror is available: {reason}")]
    #[diagnostic(code(quarry::transfer::mirror_retry))]
    MirrorRetry { url: String, reason: String },

    #[error("Checksum mismatch for {url}: expected {expected}, got {actual}")]
    #[diagnostic(
        code(quarry::transfer::checksum),
        help("The stored artifact may be corrupted")
    )]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("Size mismatch for {url}: expected {expected} bytes, got {actual}")]
    #[diagnostic(code(quarry::transfer::size))]
    SizeMismatch {
        url: String,
        expected: u64,
        actual: u64,
    },

    #[error("Failed to decode artifact stream: {0}")]
    #[diagnostic(code(quarry::transfer::decode))]
    Decode(#[source] std::io::Error),

    #[error("Invalid artifact path '{path}': {reason}")]
    #[diagnostic(code(quarry::transfer::invalid_path))]
    InvalidPath { path: String, reason: String },

    #[error("Repository does not provide {0}")]
    #[diagnostic(code(quarry::transfer::unavailable))]
    Unavailable(String),

    #[error("Transfer cancelled")]
    #[diagnostic(code(quarry::transfer::cancelled))]
    Cancelled,
}

impl TransferError {
    pub fn is_mirror_retry(&self) -> bool {
        matches!(self, Self::MirrorRetry { .. })
    }
}

/// Trait for adding context to IO errors.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, QuarryError>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, QuarryError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            QuarryError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
