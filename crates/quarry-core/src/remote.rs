//! Repositories backed by loaded `repository.json` metadata.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    io::Write,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use quarry_dl::transport::Transport;
use quarry_registry::{
    cache::CacheEntry,
    error::RegistryError,
    manager::RepositoryManager,
    metadata::RemoteArtifact,
    mirror::{as_directory, RepositoryLocation},
};
use quarry_utils::{cancel::CancellationToken, hash::ChecksumWriter};
use rayon::prelude::*;
use tracing::{debug, warn};
use url::Url;

use crate::{
    artifact::{ArtifactDescriptor, ArtifactFormat, ArtifactKey},
    error::TransferError,
    repository::{ArtifactRepository, KeyPredicate},
    status::{Severity, Status, StatusCode},
};

#[derive(Debug, Clone)]
struct StoredEncoding {
    format: ArtifactFormat,
    path: String,
    size: Option<u64>,
    checksum: Option<String>,
}

/// A repository whose contents are described by cached metadata and whose
/// bytes are downloaded through a [`Transport`].
///
/// Artifact bytes are served from the repository's effective location or
/// from any mirror its metadata lists. When a download fails and another
/// base is left, the fetch reports a mirror retry and the next attempt uses
/// the next base. Once every base has failed for a descriptor the download
/// error is reported as is.
pub struct MetadataRepository {
    name: String,
    location: Url,
    bases: Vec<Url>,
    cursor: AtomicUsize,
    /// Consecutive failed downloads per descriptor since its last success.
    failures: Mutex<HashMap<ArtifactDescriptor, usize>>,
    artifacts: BTreeMap<ArtifactKey, Vec<StoredEncoding>>,
    transport: Arc<dyn Transport>,
}

impl MetadataRepository {
    pub fn new(entry: &CacheEntry, transport: Arc<dyn Transport>) -> Self {
        let mut bases = vec![entry.effective_location.clone()];
        for mirror in &entry.metadata.mirrors {
            match Url::parse(mirror) {
                Ok(url) => bases.push(as_directory(url)),
                Err(err) => warn!("{}: ignoring invalid mirror '{}': {}", entry.repository_id, mirror, err),
            }
        }

        let mut artifacts: BTreeMap<ArtifactKey, Vec<StoredEncoding>> = BTreeMap::new();
        for artifact in &entry.metadata.artifacts {
            let Some((key, encoding)) = Self::parse_artifact(&entry.repository_id, artifact) else {
                continue;
            };
            let encodings = artifacts.entry(key).or_default();
            if encodings.iter().any(|e| e.format == encoding.format) {
                warn!(
                    "{}: duplicate {} encoding of {}/{}/{}, keeping the first",
                    entry.repository_id, encoding.format, artifact.classifier, artifact.id, artifact.version
                );
                continue;
            }
            encodings.push(encoding);
        }

        Self {
            name: entry.repository_id.clone(),
            location: entry.effective_location.clone(),
            bases,
            cursor: AtomicUsize::new(0),
            failures: Mutex::new(HashMap::new()),
            artifacts,
            transport,
        }
    }

    fn parse_artifact(repository: &str, artifact: &RemoteArtifact) -> Option<(ArtifactKey, StoredEncoding)> {
        let key = match ArtifactKey::parse(&artifact.classifier, &artifact.id, &artifact.version) {
            Ok(key) => key,
            Err(err) => {
                warn!("{}: skipping {}/{}: {}", repository, artifact.classifier, artifact.id, err);
                return None;
            }
        };
        let format = match ArtifactFormat::from_steps(&artifact.processing) {
            Ok(format) => format,
            Err(err) => {
                warn!("{}: skipping an encoding of {}: {}", repository, key, err);
                return None;
            }
        };

        Some((
            key,
            StoredEncoding {
                format,
                path: artifact.path.clone(),
                size: artifact.size,
                checksum: artifact.checksum.clone(),
            },
        ))
    }

    /// Base URLs in the order they are tried.
    pub fn bases(&self) -> &[Url] {
        &self.bases
    }

    fn encoding(&self, descriptor: &ArtifactDescriptor) -> Option<&StoredEncoding> {
        self.artifacts
            .get(&descriptor.key)?
            .iter()
            .find(|encoding| encoding.format == descriptor.format)
    }

    fn artifact_url(&self, base: &Url, path: &str) -> Result<Url, TransferError> {
        let escapes = path.starts_with('/') || path.contains("://") || path.split('/').any(|s| s == "..");
        if escapes {
            return Err(TransferError::InvalidPath {
                path: path.to_string(),
                reason: "path must stay below the repository location".into(),
            });
        }
        base.join(path).map_err(|err| {
            TransferError::InvalidPath {
                path: path.to_string(),
                reason: err.to_string(),
            }
        })
    }
}

impl ArtifactRepository for MetadataRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> &Url {
        &self.location
    }

    fn query(&self, predicate: KeyPredicate<'_>) -> BTreeSet<ArtifactKey> {
        self.artifacts
            .keys()
            .filter(|key| predicate(key))
            .cloned()
            .collect()
    }

    fn descriptors_for(&self, key: &ArtifactKey) -> Vec<ArtifactDescriptor> {
        self.artifacts
            .get(key)
            .map(|encodings| {
                encodings
                    .iter()
                    .map(|encoding| ArtifactDescriptor::new(key.clone(), encoding.format.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn fetch_raw(
        &self,
        descriptor: &ArtifactDescriptor,
        out: &mut dyn Write,
    ) -> Result<u64, TransferError> {
        let encoding = self
            .encoding(descriptor)
            .ok_or_else(|| TransferError::Unavailable(descriptor.to_string()))?;

        let index = self.cursor.load(Ordering::SeqCst) % self.bases.len();
        let url = self.artifact_url(&self.bases[index], &encoding.path)?;
        debug!("downloading {} from {}", descriptor, url);

        let mut writer = ChecksumWriter::new(out);
        let result = self.transport.download(&url, &mut writer);
        let mut failures = self
            .failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = result {
            let failed = failures.entry(descriptor.clone()).or_default();
            *failed += 1;
            if self.bases.len() > 1 {
                self.cursor.fetch_add(1, Ordering::SeqCst);
            }
            if *failed < self.bases.len() {
                return Err(TransferError::MirrorRetry {
                    url: url.to_string(),
                    reason: err.to_string(),
                });
            }
            failures.remove(descriptor);
            return Err(TransferError::Download {
                url: url.to_string(),
                source: err,
            });
        }
        failures.remove(descriptor);
        drop(failures);

        let written = writer.bytes_written();
        if let Some(expected) = encoding.size {
            if expected != written {
                return Err(TransferError::SizeMismatch {
                    url: url.to_string(),
                    expected,
                    actual: written,
                });
            }
        }
        if let Some(expected) = &encoding.checksum {
            let actual = writer.checksum();
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(TransferError::ChecksumMismatch {
                    url: url.to_string(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        Ok(written)
    }
}

/// Loads every location through `manager` and wraps the results as
/// repositories, in the order given.
///
/// Locations that fail to load are left out; the returned status has one
/// child per failure. A repository rejected for partial records therefore
/// never contributes to queries.
pub fn load_repositories(
    manager: &RepositoryManager,
    locations: &[RepositoryLocation],
    transport: Arc<dyn Transport>,
    cancel: &CancellationToken,
) -> (Vec<Arc<dyn ArtifactRepository>>, Status) {
    let results: Vec<_> = locations
        .par_iter()
        .map(|location| (location, manager.load_repository(location, cancel)))
        .collect();

    let mut repositories: Vec<Arc<dyn ArtifactRepository>> = Vec::new();
    let mut failures = Vec::new();
    let mut cancelled = false;

    for (location, result) in results {
        match result {
            Ok(entry) => {
                repositories.push(Arc::new(MetadataRepository::new(&entry, transport.clone())));
            }
            Err(RegistryError::Cancelled {
                ..
            }) => {
                cancelled = true;
            }
            Err(err) => {
                failures.push(
                    Status::error(format!("Failed to load repository {location}")).with_cause(&err),
                );
            }
        }
    }

    let severity = if cancelled {
        Severity::Cancel
    } else if failures.is_empty() {
        Severity::Ok
    } else if repositories.is_empty() {
        Severity::Error
    } else {
        Severity::Warning
    };

    let mut status = Status::new(
        severity,
        format!("Loaded {} of {} repositories", repositories.len(), locations.len()),
    )
    .with_children(failures);
    if cancelled {
        status = status.with_code(StatusCode::Cancelled);
    }

    (repositories, status)
}
