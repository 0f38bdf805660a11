use miette::Diagnostic;
use quarry_utils::error::{FileSystemError, PathError, UtilsError};
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(quarry_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(quarry_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Configuration file already exists: {0}")]
    #[diagnostic(
        code(quarry_config::already_exists),
        help("Remove the existing config file or use a different location")
    )]
    ConfigAlreadyExists(String),

    #[error("Duplicate repository name: {0}")]
    #[diagnostic(
        code(quarry_config::duplicate_repo),
        help("Each repository must have a unique name")
    )]
    DuplicateRepositoryName(String),

    #[error("Duplicate mirror name: {0}")]
    #[diagnostic(
        code(quarry_config::duplicate_mirror),
        help("Each mirror must have a unique name")
    )]
    DuplicateMirrorName(String),

    #[error("Invalid URL `{url}` for `{name}`: {reason}")]
    #[diagnostic(
        code(quarry_config::invalid_url),
        help("Use an absolute http://, https:// or file:// URL")
    )]
    InvalidUrl {
        name: String,
        url: String,
        reason: String,
    },

    #[error("Mirror `{0}` has an empty `mirror_of`")]
    #[diagnostic(
        code(quarry_config::empty_mirror_of),
        help("Use `*`, `external:*` or a comma-separated list of repository names")
    )]
    EmptyMirrorOf(String),

    #[error("`max_mirror_attempts` must be at least 1")]
    #[diagnostic(code(quarry_config::invalid_mirror_attempts))]
    InvalidMirrorAttempts,

    #[error("Invalid value `{value}` for `{field}`")]
    #[diagnostic(
        code(quarry_config::invalid_duration),
        help("Use `always`, `never` or a duration such as `30s`, `15m`, `3h` or `1d`")
    )]
    InvalidDuration { field: &'static str, value: String },

    #[error("IO error: {0}")]
    #[diagnostic(code(quarry_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(quarry_config::utils))]
    Utils(#[from] UtilsError),

    #[error("Failed to parse TOML: {0}")]
    #[diagnostic(code(quarry_config::toml))]
    Toml(#[from] toml_edit::TomlError),

    #[error("Encountered unexpected TOML item: {0}")]
    #[diagnostic(code(quarry_config::unexpected_toml_item))]
    UnexpectedTomlItem(String),

    #[error("Failed to annotate first table in array: {0}")]
    #[diagnostic(code(quarry_config::annotate_first_table))]
    AnnotateFirstTable(String),
}

impl From<PathError> for ConfigError {
    fn from(err: PathError) -> Self {
        Self::Utils(UtilsError::Path(err))
    }
}

impl From<FileSystemError> for ConfigError {
    fn from(err: FileSystemError) -> Self {
        Self::Utils(UtilsError::FileSystem(err))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
