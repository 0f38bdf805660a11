//! Mapping nominal repository locations to the locations actually loaded.

use std::fmt;

use quarry_config::{config::Config, mirror::MirrorConfig};
use tracing::debug;
use url::Url;

use crate::error::{RegistryError, Result};

/// A repository as named by the user: an id plus its nominal URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryLocation {
    pub id: String,
    pub url: Url,
}

impl RepositoryLocation {
    pub fn new(id: impl Into<String>, url: Url) -> Self {
        Self {
            id: id.into(),
            url: as_directory(url),
        }
    }

    pub fn parse(id: impl Into<String>, url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|err| RegistryError::InvalidUrl(format!("{url}: {err}")))?;
        Ok(Self::new(id, url))
    }

    /// Whether this location is on the local machine.
    pub fn is_local(&self) -> bool {
        is_local_url(&self.url)
    }
}

impl fmt::Display for RepositoryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.url)
    }
}

/// Ensures the URL path ends with `/` so relative joins stay below it.
pub fn as_directory(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// `file://` URLs and loopback hosts.
pub fn is_local_url(url: &Url) -> bool {
    if url.scheme() == "file" {
        return true;
    }
    matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]") | Some("::1")
    )
}

/// Resolves the effective location of a repository.
pub trait MirrorResolver: Send + Sync {
    /// Pure lookup; no side effects.
    fn effective_location(&self, location: &RepositoryLocation) -> Url;

    /// Lookup for a location that is about to be loaded. Implementations may
    /// log the mirror in use.
    fn effective_location_and_prepare_load(&self, location: &RepositoryLocation) -> Url {
        self.effective_location(location)
    }
}

/// Every repository is loaded from its own location.
pub struct NoMirrors;

impl MirrorResolver for NoMirrors {
    fn effective_location(&self, location: &RepositoryLocation) -> Url {
        location.url.clone()
    }
}

#[derive(Debug, Clone)]
enum Selector {
    All,
    External,
    Id(String),
    Not(String),
}

#[derive(Debug, Clone)]
struct MirrorEntry {
    name: String,
    url: Url,
    selectors: Vec<Selector>,
}

impl MirrorEntry {
    fn parse(config: &MirrorConfig) -> Result<Self> {
        let url = Url::parse(&config.url)
            .map_err(|err| RegistryError::InvalidUrl(format!("{}: {err}", config.url)))?;

        let selectors = config
            .mirror_of
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| {
                match token {
                    "*" => Selector::All,
                    "external:*" => Selector::External,
                    _ => {
                        match token.strip_prefix('!') {
                            Some(id) => Selector::Not(id.trim().to_string()),
                            None => Selector::Id(token.to_string()),
                        }
                    }
                }
            })
            .collect();

        Ok(Self {
            name: config.name.clone(),
            url: as_directory(url),
            selectors,
        })
    }

    /// An explicit `!id` always wins over a positive match.
    fn matches(&self, location: &RepositoryLocation) -> bool {
        let mut matched = false;
        for selector in &self.selectors {
            match selector {
                Selector::Not(id) if *id == location.id => return false,
                Selector::Not(_) => {}
                Selector::All => matched = true,
                Selector::External => matched |= !location.is_local(),
                Selector::Id(id) => matched |= *id == location.id,
            }
        }
        matched
    }
}

/// Mirrors configured Maven-style; the first matching mirror wins.
pub struct MirrorTable {
    entries: Vec<MirrorEntry>,
}

impl MirrorTable {
    pub fn new(mirrors: &[MirrorConfig]) -> Result<Self> {
        let entries = mirrors
            .iter()
            .map(MirrorEntry::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.mirrors)
    }

    fn find(&self, location: &RepositoryLocation) -> Option<&MirrorEntry> {
        self.entries.iter().find(|entry| entry.matches(location))
    }
}

impl MirrorResolver for MirrorTable {
    fn effective_location(&self, location: &RepositoryLocation) -> Url {
        self.find(location)
            .map(|entry| entry.url.clone())
            .unwrap_or_else(|| location.url.clone())
    }

    fn effective_location_and_prepare_load(&self, location: &RepositoryLocation) -> Url {
        match self.find(location) {
            Some(entry) => {
                debug!(
                    "using mirror {} ({}) for {}",
                    entry.name, entry.url, location
                );
                entry.url.clone()
            }
            None => location.url.clone(),
        }
    }
}
