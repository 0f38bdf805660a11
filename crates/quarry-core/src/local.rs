use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use quarry_utils::{cancel::CancellationToken, fs::sanitize_file_name};
use tracing::debug;

use crate::{
    artifact::{ArtifactDescriptor, ArtifactRef},
    provider::CompositeProvider,
    sink::FileSink,
    status::Status,
    QuarryResult,
};

/// A descriptor whose canonical bytes are materialized on disk on demand.
pub struct LocalArtifact<'a> {
    descriptor: ArtifactDescriptor,
    provider: &'a CompositeProvider,
    target_dir: PathBuf,
    resolved: Mutex<Option<PathBuf>>,
    last_status: Mutex<Option<Status>>,
}

impl<'a> LocalArtifact<'a> {
    pub fn new<P: AsRef<Path>>(
        descriptor: ArtifactDescriptor,
        provider: &'a CompositeProvider,
        target_dir: P,
    ) -> Self {
        Self {
            descriptor,
            provider,
            target_dir: target_dir.as_ref().to_path_buf(),
            resolved: Mutex::new(None),
            last_status: Mutex::new(None),
        }
    }

    pub fn descriptor(&self) -> &ArtifactDescriptor {
        &self.descriptor
    }

    /// `<target>/<classifier>/<id>-<version>`.
    pub fn target_path(&self) -> PathBuf {
        let key = &self.descriptor.key;
        self.target_dir
            .join(sanitize_file_name(&key.classifier))
            .join(sanitize_file_name(&format!("{}-{}", key.id, key.version)))
    }

    /// The local path of the artifact.
    ///
    /// Without `fetch`, returns the path only if an earlier call resolved it,
    /// and never performs I/O. With `fetch`, an unresolved artifact is fetched
    /// once; a resolved one is returned as is. A failed fetch returns `None`
    /// and leaves its status in [`last_status`](Self::last_status).
    pub fn resolve_local_path(
        &self,
        fetch: bool,
        cancel: &CancellationToken,
    ) -> QuarryResult<Option<PathBuf>> {
        let mut resolved = self
            .resolved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if resolved.is_some() || !fetch {
            return Ok(resolved.clone());
        }

        let path = self.target_path();
        debug!("materializing {} at {}", self.descriptor, path.display());

        let mut sink = FileSink::new(self.descriptor.key.clone(), &path);
        let status = self.provider.fetch(
            &mut sink,
            &ArtifactRef::Descriptor(self.descriptor.clone()),
            cancel,
        )?;
        let success = status.is_success();
        if !success {
            status.log();
        }
        *self
            .last_status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(status);

        if success {
            *resolved = Some(path);
        }
        Ok(resolved.clone())
    }

    /// Status of the most recent fetch, if any.
    pub fn last_status(&self) -> Option<Status> {
        self.last_status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::Arc};

    use tempfile::tempdir;

    use super::*;
    use crate::{
        artifact::{ArtifactKey, ProcessingStep},
        repository::ArtifactRepository,
        test_utils::{Behavior, ScriptedRepository},
    };

    fn key() -> ArtifactKey {
        ArtifactKey::parse("binary", "app", "1.0.0").unwrap()
    }

    #[test]
    fn test_fetches_exactly_once() {
        let dir = tempdir().unwrap();
        let compressed = zstd::encode_all(&b"local bytes"[..], 3).unwrap();
        let descriptor = ArtifactDescriptor::processed(key(), vec![ProcessingStep::Zstd]);
        let repo = Arc::new(ScriptedRepository::new("central").with(descriptor.clone(), &compressed));
        let provider = CompositeProvider::new(vec![repo.clone() as Arc<dyn ArtifactRepository>]);
        let artifact = LocalArtifact::new(descriptor, &provider, dir.path());
        let cancel = CancellationToken::new();

        assert_eq!(artifact.resolve_local_path(false, &cancel).unwrap(), None);
        assert_eq!(repo.accesses(), 0);

        let path = artifact.resolve_local_path(true, &cancel).unwrap().unwrap();
        assert_eq!(path, dir.path().join("binary").join("app-1.0.0"));
        assert_eq!(fs::read(&path).unwrap(), b"local bytes");

        assert_eq!(artifact.resolve_local_path(true, &cancel).unwrap(), Some(path.clone()));
        assert_eq!(artifact.resolve_local_path(false, &cancel).unwrap(), Some(path));
        assert_eq!(repo.accesses(), 1);
        assert!(artifact.last_status().unwrap().is_ok());
    }

    #[test]
    fn test_failed_fetch_stays_unresolved() {
        let dir = tempdir().unwrap();
        let descriptor = ArtifactDescriptor::canonical(key());
        let repo = Arc::new(
            ScriptedRepository::new("central")
                .with(descriptor.clone(), b"bytes")
                .behaving(Behavior::Fail),
        );
        let provider = CompositeProvider::new(vec![repo as Arc<dyn ArtifactRepository>]);
        let artifact = LocalArtifact::new(descriptor, &provider, dir.path());

        assert_eq!(
            artifact
                .resolve_local_path(true, &CancellationToken::new())
                .unwrap(),
            None
        );
        assert!(!artifact.target_path().exists());
        assert!(!artifact.last_status().unwrap().is_success());
    }
}
