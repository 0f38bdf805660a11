//! Resolving, loading and caching repository metadata.

use std::sync::Arc;

use chrono::Utc;
use quarry_config::config::Config;
use quarry_dl::transport::{FetchResponse, Transport};
use quarry_events::{EventSinkHandle, NullSink, QuarryEvent, SyncStage};
use quarry_utils::{cancel::CancellationToken, time::Interval};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    cache::{CacheEntry, CacheHeader, DiskCache, MetadataCache, Slot, StoredMetadata},
    error::{RegistryError, Result},
    metadata::{decode_metadata, find_partial_units, METADATA_FILE},
    mirror::{MirrorResolver, MirrorTable, RepositoryLocation},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerMode {
    /// Loads may use the network; cached copies are revalidated.
    Online,
    /// Loads are served from the cache only.
    Offline,
}

/// What to do with the disk tier once loaded content has been validated.
enum Persist {
    Nothing,
    /// The stored content is current; only its header changed.
    Header(CacheHeader),
    Everything(StoredMetadata),
}

/// Owns the metadata cache and resolves repository locations through the
/// configured mirrors.
pub struct RepositoryManager {
    mirrors: Arc<dyn MirrorResolver>,
    transport: Arc<dyn Transport>,
    cache: MetadataCache,
    mode: ManagerMode,
    sync_interval: Interval,
    events: EventSinkHandle,
}

impl RepositoryManager {
    pub fn new(
        mirrors: Arc<dyn MirrorResolver>,
        transport: Arc<dyn Transport>,
        cache: MetadataCache,
        mode: ManagerMode,
    ) -> Self {
        Self {
            mirrors,
            transport,
            cache,
            mode,
            sync_interval: Interval::default(),
            events: Arc::new(NullSink),
        }
    }

    /// Builds a manager with mirrors, cache directory, mode and sync
    /// interval taken from `config`.
    pub fn from_config(config: &Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let mirrors = Arc::new(MirrorTable::from_config(config)?);
        let cache = MetadataCache::with_disk(config.get_cache_path()?);
        let mode = if config.is_offline() {
            ManagerMode::Offline
        } else {
            ManagerMode::Online
        };

        Ok(Self::new(mirrors, transport, cache, mode).with_sync_interval(config.get_sync_interval()))
    }

    pub fn with_sync_interval(mut self, interval: Interval) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn with_events(mut self, events: EventSinkHandle) -> Self {
        self.events = events;
        self
    }

    pub fn mode(&self) -> ManagerMode {
        self.mode
    }

    pub fn is_offline(&self) -> bool {
        self.mode == ManagerMode::Offline
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// The effective location of `location`. No I/O and no cache effects.
    pub fn translate(&self, location: &RepositoryLocation) -> Url {
        self.mirrors.effective_location(location)
    }

    /// Like [`translate`](Self::translate), and also reserves the cache slot
    /// the subsequent load will use.
    pub fn translate_and_prepare_load(&self, location: &RepositoryLocation) -> Url {
        let effective = self.mirrors.effective_location_and_prepare_load(location);
        self.cache.slot(&effective);
        effective
    }

    fn emit(&self, location: &Url, stage: SyncStage) {
        self.events.emit(QuarryEvent::SyncProgress {
            location: location.to_string(),
            stage,
        });
    }

    /// Loads the metadata of a repository.
    ///
    /// Repeated loads of one location within this manager are answered from
    /// memory. Concurrent loads of one location are serialized, so only the
    /// first performs I/O.
    pub fn load_repository(
        &self,
        location: &RepositoryLocation,
        cancel: &CancellationToken,
    ) -> Result<Arc<CacheEntry>> {
        let effective = self.translate_and_prepare_load(location);
        let slot = self.cache.slot(&effective);
        let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        match &*guard {
            Slot::Loaded(entry) => {
                self.emit(&effective, SyncStage::Memory);
                return Ok(entry_for(entry, location));
            }
            Slot::Rejected(units) => {
                return Err(RegistryError::PartialRepository {
                    location: effective.to_string(),
                    units: units.clone(),
                });
            }
            Slot::Unreachable(reason) => {
                return Err(RegistryError::Unreachable {
                    location: effective.to_string(),
                    reason: reason.clone(),
                });
            }
            Slot::Empty => {}
        }

        if cancel.is_cancelled() {
            return Err(RegistryError::Cancelled {
                location: effective.to_string(),
            });
        }

        let _disk_lock = match self.cache.disk() {
            Some(disk) => Some(disk.lock(&effective)?),
            None => None,
        };

        let loaded = match self.mode {
            ManagerMode::Offline => self.load_offline(location, &effective),
            ManagerMode::Online => self.load_online(location, &effective),
        };
        let (content, header, persist) = match loaded {
            Ok(loaded) => loaded,
            Err(RegistryError::DownloadError(err)) => {
                *guard = Slot::Unreachable(err.to_string());
                return Err(RegistryError::DownloadError(err));
            }
            Err(err) => return Err(err),
        };

        self.emit(&effective, SyncStage::Validating);
        let metadata = decode_metadata(&content)?;
        let partial = find_partial_units(&metadata, effective.as_str(), cancel)?;
        if !partial.is_empty() {
            warn!(
                "rejecting {}: {} partial record(s)",
                location,
                partial.len()
            );
            self.emit(
                &effective,
                SyncStage::Rejected {
                    partial_units: partial.clone(),
                },
            );
            if let Some(disk) = self.cache.disk() {
                disk.remove(&effective)?;
            }
            *guard = Slot::Rejected(partial.clone());
            return Err(RegistryError::PartialRepository {
                location: effective.to_string(),
                units: partial,
            });
        }

        if let Some(disk) = self.cache.disk() {
            match persist {
                Persist::Nothing => {}
                Persist::Header(header) => disk.write_header(&effective, &header)?,
                Persist::Everything(stored) => disk.write(&effective, &stored)?,
            }
        }

        let entry = Arc::new(CacheEntry {
            repository_id: location.id.clone(),
            original_location: location.url.clone(),
            effective_location: effective.clone(),
            metadata: Arc::new(metadata),
            last_refreshed: header.last_refreshed,
        });

        self.emit(
            &effective,
            SyncStage::Complete {
                artifact_count: entry.metadata.artifacts.len(),
            },
        );
        info!(
            "loaded {} with {} artifact(s)",
            location,
            entry.metadata.artifacts.len()
        );

        *guard = Slot::Loaded(entry.clone());
        Ok(entry)
    }

    fn load_offline(
        &self,
        location: &RepositoryLocation,
        effective: &Url,
    ) -> Result<(Vec<u8>, CacheHeader, Persist)> {
        let stored = self
            .cache
            .disk()
            .and_then(|disk| disk.read(effective))
            .ok_or_else(|| {
                RegistryError::OfflineUnavailable {
                    location: location.url.to_string(),
                }
            })?;

        debug!("offline: using cached metadata for {}", location);
        self.emit(effective, SyncStage::Cached);
        Ok((stored.content, stored.header, Persist::Nothing))
    }

    fn load_online(
        &self,
        location: &RepositoryLocation,
        effective: &Url,
    ) -> Result<(Vec<u8>, CacheHeader, Persist)> {
        let disk = self.cache.disk();
        let stored = disk.and_then(|disk| disk.read(effective));
        let now = Utc::now();

        if let Some(stored) = &stored {
            if self.sync_interval.is_fresh(stored.header.age(now)) {
                debug!("cached metadata for {} is fresh", location);
                self.emit(effective, SyncStage::Cached);
                return Ok((
                    stored.content.clone(),
                    stored.header.clone(),
                    Persist::Nothing,
                ));
            }
        }

        let validators = stored
            .as_ref()
            .map(|stored| stored.header.validators())
            .unwrap_or_default();
        let metadata_url = effective
            .join(METADATA_FILE)
            .map_err(|err| RegistryError::InvalidUrl(format!("{effective}: {err}")))?;

        self.emit(effective, SyncStage::Fetching);
        match self.transport.get(&metadata_url, &validators) {
            Ok(FetchResponse::NotModified) => {
                let Some(stored) = stored else {
                    return Err(RegistryError::NotModifiedWithoutCache {
                        location: effective.to_string(),
                    });
                };
                debug!("metadata for {} not modified", location);
                self.emit(effective, SyncStage::UpToDate);
                let mut header = stored.header;
                header.last_refreshed = now;
                Ok((stored.content, header.clone(), Persist::Header(header)))
            }
            Ok(FetchResponse::Content {
                body,
                etag,
                last_modified,
            }) => {
                let header = CacheHeader {
                    repository_id: location.id.clone(),
                    original_location: location.url.to_string(),
                    effective_location: effective.to_string(),
                    etag,
                    last_modified,
                    last_refreshed: now,
                };
                let persist = Persist::Everything(StoredMetadata {
                    header: header.clone(),
                    content: body.clone(),
                });
                Ok((body, header, persist))
            }
            Err(err) => {
                match stored {
                    Some(stored) => {
                        warn!(
                            "Request to {} failed, using cached metadata instead: {}",
                            metadata_url, err
                        );
                        self.emit(
                            effective,
                            SyncStage::CacheFallback {
                                error: err.to_string(),
                            },
                        );
                        Ok((stored.content, stored.header, Persist::Nothing))
                    }
                    None => Err(err.into()),
                }
            }
        }
    }

    /// The on-disk tier, if configured.
    pub fn disk_cache(&self) -> Option<&DiskCache> {
        self.cache.disk()
    }
}

/// `entry` as seen by `location`. Locations mirrored to the same place
/// share metadata but keep their own identity.
fn entry_for(entry: &Arc<CacheEntry>, location: &RepositoryLocation) -> Arc<CacheEntry> {
    if entry.repository_id == location.id && entry.original_location == location.url {
        return entry.clone();
    }
    Arc::new(CacheEntry {
        repository_id: location.id.clone(),
        original_location: location.url.clone(),
        effective_location: entry.effective_location.clone(),
        metadata: entry.metadata.clone(),
        last_refreshed: entry.last_refreshed,
    })
}
