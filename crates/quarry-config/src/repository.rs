use documented::{Documented, DocumentedFields};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// A repository that serves artifact metadata and artifact bytes.
///
/// Repositories are consulted in the order they are declared.
#[derive(Clone, Debug, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct RepositoryConfig {
    /// Unique name of the repository. Mirrors refer to repositories by this name.
    pub name: String,

    /// Base URL of the repository (http://, https:// or file://).
    /// The metadata is read from `<url>/repository.json`.
    pub url: String,

    /// Whether the repository is enabled.
    /// Default: true
    pub enabled: Option<bool>,
}

impl RepositoryConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_url(&self.name, &self.url)
    }
}

pub(crate) fn validate_url(name: &str, url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).map_err(|err| {
        ConfigError::InvalidUrl {
            name: name.to_string(),
            url: url.to_string(),
            reason: err.to_string(),
        }
    })?;

    match parsed.scheme() {
        "http" | "https" | "file" => Ok(()),
        other => {
            Err(ConfigError::InvalidUrl {
                name: name.to_string(),
                url: url.to_string(),
                reason: format!("unsupported scheme `{other}`"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_defaults_to_true() {
        let repo = RepositoryConfig {
            name: "central".into(),
            url: "https://repo.example.org".into(),
            enabled: None,
        };
        assert!(repo.is_enabled());
        assert!(repo.validate().is_ok());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("local", "file:///srv/repo").is_ok());
        assert!(matches!(
            validate_url("bad", "not a url"),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            validate_url("ftp", "ftp://repo.example.org"),
            Err(ConfigError::InvalidUrl { reason, .. }) if reason.contains("ftp")
        ));
    }
}
