use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use documented::{Documented, DocumentedFields};
use quarry_utils::{
    path::{resolve_path, xdg_config_home},
    time::{parse_duration, Interval},
};
use serde::{Deserialize, Serialize};
use toml_edit::DocumentMut;
use tracing::{debug, info};

use crate::{
    annotations::{annotate_toml_array_of_tables, annotate_toml_table},
    error::{ConfigError, Result},
    mirror::MirrorConfig,
    repository::RepositoryConfig,
};

const DEFAULT_MAX_MIRROR_ATTEMPTS: u32 = 3;
const DEFAULT_TIMEOUT: &str = "30s";

/// How the preferred encoding of an artifact is chosen.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransferPolicySetting {
    /// Local policy for file:// repositories, remote policy for everything else.
    #[default]
    Auto,
    /// Always prefer canonical encodings.
    Local,
    /// Always prefer processed (compressed) encodings.
    Remote,
}

/// quarry configuration
#[derive(Clone, Debug, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Config {
    /// Directory where repository metadata is cached between runs.
    /// Default: $XDG_CACHE_HOME/quarry
    pub cache_path: Option<String>,

    /// Work from cached metadata only and never touch the network.
    /// Default: false
    pub offline: Option<bool>,

    /// How long cached metadata is reused before it is revalidated:
    /// "always", "never" or a duration such as "15m", "3h", "1d".
    /// Default: "always"
    pub sync_interval: Option<String>,

    /// Maximum attempts against one repository when it reports that another
    /// of its mirrors may serve an artifact.
    /// Default: 3
    pub max_mirror_attempts: Option<u32>,

    /// Network timeout for a single HTTP request, e.g. "30s". "0s" disables it.
    /// Default: "30s"
    pub timeout: Option<String>,

    /// User agent sent with HTTP requests.
    pub user_agent: Option<String>,

    /// Encoding preference: "auto", "local" or "remote".
    /// Default: "auto"
    pub transfer_policy: Option<TransferPolicySetting>,

    /// Repositories in priority order.
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,

    /// Mirrors, matched in declaration order.
    #[serde(default)]
    pub mirrors: Vec<MirrorConfig>,
}

/// Location of the configuration file: `$QUARRY_CONFIG`, or
/// `$XDG_CONFIG_HOME/quarry/config.toml`.
pub fn config_path() -> PathBuf {
    match std::env::var("QUARRY_CONFIG") {
        Ok(path) => PathBuf::from(path),
        Err(_) => xdg_config_home().join("quarry").join("config.toml"),
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            cache_path: Some("$XDG_CACHE_HOME/quarry".to_string()),
            offline: Some(false),
            sync_interval: Some("always".to_string()),
            max_mirror_attempts: Some(DEFAULT_MAX_MIRROR_ATTEMPTS),
            timeout: Some(DEFAULT_TIMEOUT.to_string()),
            user_agent: Some(format!("quarry/{}", env!("CARGO_PKG_VERSION"))),
            transfer_policy: Some(TransferPolicySetting::Auto),
            repositories: Vec::new(),
            mirrors: Vec::new(),
        }
    }

    /// Loads the configuration from [`config_path`].
    pub fn new() -> Result<Self> {
        Self::load(config_path())
    }

    /// Loads and validates the configuration at `path`.
    ///
    /// A missing file yields the default configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => {
                debug!("loading configuration from {}", path.display());
                Self::from_toml(&content)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "no configuration at {}, using defaults",
                    path.display()
                );
                Ok(Self::default_config())
            }
            Err(err) => Err(ConfigError::IoError(err)),
        }
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.resolve()?;
        Ok(config)
    }

    /// Validates the configuration and fills in defaults.
    pub fn resolve(&mut self) -> Result<()> {
        if self.max_mirror_attempts == Some(0) {
            return Err(ConfigError::InvalidMirrorAttempts);
        }
        self.max_mirror_attempts
            .get_or_insert(DEFAULT_MAX_MIRROR_ATTEMPTS);

        if let Some(value) = &self.sync_interval {
            value.parse::<Interval>().map_err(|_| {
                ConfigError::InvalidDuration {
                    field: "sync_interval",
                    value: value.clone(),
                }
            })?;
        }

        if let Some(value) = &self.timeout {
            if parse_duration(value.trim()).is_none() || value.trim().is_empty() {
                return Err(ConfigError::InvalidDuration {
                    field: "timeout",
                    value: value.clone(),
                });
            }
        }

        let mut seen_repos = HashSet::new();
        for repo in &mut self.repositories {
            if !seen_repos.insert(repo.name.clone()) {
                return Err(ConfigError::DuplicateRepositoryName(repo.name.clone()));
            }
            repo.validate()?;
            repo.enabled.get_or_insert(true);
        }

        let mut seen_mirrors = HashSet::new();
        for mirror in &self.mirrors {
            if !seen_mirrors.insert(mirror.name.as_str()) {
                return Err(ConfigError::DuplicateMirrorName(mirror.name.clone()));
            }
            mirror.validate()?;
        }

        Ok(())
    }

    /// Cache directory, honouring `$QUARRY_CACHE`.
    pub fn get_cache_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("QUARRY_CACHE") {
            return Ok(resolve_path(&env_path)?);
        }
        match &self.cache_path {
            Some(cache_path) => Ok(resolve_path(cache_path)?),
            None => Ok(resolve_path("$XDG_CACHE_HOME/quarry")?),
        }
    }

    /// Whether to run offline, honouring `$QUARRY_OFFLINE`.
    pub fn is_offline(&self) -> bool {
        env_flag("QUARRY_OFFLINE").unwrap_or_else(|| self.offline.unwrap_or(false))
    }

    pub fn get_sync_interval(&self) -> Interval {
        self.sync_interval
            .as_deref()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    /// Per-request timeout; `None` when disabled.
    pub fn get_timeout(&self) -> Option<Duration> {
        let value = self.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT);
        parse_duration(value.trim()).filter(|duration| !duration.is_zero())
    }

    pub fn get_max_mirror_attempts(&self) -> usize {
        self.max_mirror_attempts
            .unwrap_or(DEFAULT_MAX_MIRROR_ATTEMPTS)
            .max(1) as usize
    }

    pub fn get_user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("quarry/{}", env!("CARGO_PKG_VERSION")))
    }

    pub fn get_transfer_policy(&self) -> TransferPolicySetting {
        self.transfer_policy.unwrap_or_default()
    }

    pub fn get_repository(&self, name: &str) -> Option<&RepositoryConfig> {
        self.repositories
            .iter()
            .find(|repo| repo.name == name && repo.is_enabled())
    }

    /// Enabled repositories in priority order.
    pub fn enabled_repositories(&self) -> impl Iterator<Item = &RepositoryConfig> {
        self.repositories.iter().filter(|repo| repo.is_enabled())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let serialized = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serialized)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    pub fn to_annotated_document(&self) -> Result<DocumentMut> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut doc = toml_string.parse::<DocumentMut>()?;

        annotate_toml_table::<Config>(doc.as_table_mut(), true)?;

        if let Some(repositories) = doc
            .get_mut("repositories")
            .and_then(|item| item.as_array_of_tables_mut())
        {
            annotate_toml_array_of_tables::<RepositoryConfig>(repositories)?;
        }

        if let Some(mirrors) = doc
            .get_mut("mirrors")
            .and_then(|item| item.as_array_of_tables_mut())
        {
            annotate_toml_array_of_tables::<MirrorConfig>(mirrors)?;
        }

        Ok(doc)
    }
}

/// Writes the default configuration, annotated with field documentation,
/// to `path`. Refuses to overwrite an existing file.
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();

    if path.exists() {
        return Err(ConfigError::ConfigAlreadyExists(
            path.display().to_string(),
        ));
    }

    let annotated_doc = Config::default_config().to_annotated_document()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, annotated_doc.to_string())?;
    info!(
        "Default configuration file generated with documentation at: {}",
        path.display()
    );
    Ok(())
}
