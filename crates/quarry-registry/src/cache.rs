//! Two-tier metadata cache: an in-memory tier owned by one manager and an
//! optional on-disk tier shared between runs.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use chrono::{DateTime, Utc};
use quarry_dl::transport::Validators;
use quarry_utils::{
    fs::{ensure_dir_exists, safe_remove, sanitize_file_name, write_atomic},
    hash::checksum_bytes,
    lock::FileLock,
};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};
use url::Url;

use crate::{
    error::{ErrorContext, Result},
    metadata::RepositoryMetadata,
};

const HEADER_FILE: &str = "cache.json";
const CONTENT_FILE: &str = "metadata";
const LOCK_DIR: &str = ".locks";

/// A loaded repository as held by the in-memory tier.
#[derive(Debug)]
pub struct CacheEntry {
    pub repository_id: String,
    pub original_location: Url,
    pub effective_location: Url,
    pub metadata: Arc<RepositoryMetadata>,
    pub last_refreshed: DateTime<Utc>,
}

/// State of one effective location in the in-memory tier.
#[derive(Debug, Default)]
pub(crate) enum Slot {
    #[default]
    Empty,
    Loaded(Arc<CacheEntry>),
    /// Rejected for partial records; never loaded again by this manager.
    Rejected(Vec<String>),
    /// The network failed and nothing was cached; holds the failure.
    Unreachable(String),
}

pub(crate) type SlotHandle = Arc<Mutex<Slot>>;

/// Header record stored next to the cached metadata bytes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheHeader {
    pub repository_id: String,
    pub original_location: String,
    pub effective_location: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub last_refreshed: DateTime<Utc>,
}

impl CacheHeader {
    pub fn validators(&self) -> Validators {
        Validators {
            etag: self.etag.clone(),
            last_modified: self.last_modified.clone(),
        }
    }

    /// Time since the copy was last confirmed current. Clock skew into the
    /// future counts as zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_refreshed).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Raw metadata bytes plus their header, as stored on disk.
#[derive(Debug, Clone)]
pub struct StoredMetadata {
    pub header: CacheHeader,
    pub content: Vec<u8>,
}

/// The on-disk tier: `<root>/<location key>/{metadata,cache.json}`.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name for a location: a readable prefix plus a digest so
    /// distinct URLs never collide after sanitizing.
    fn key(location: &Url) -> String {
        let readable: String = sanitize_file_name(location.as_str())
            .chars()
            .take(64)
            .collect();
        let digest = checksum_bytes(location.as_str().as_bytes());
        format!("{readable}-{}", &digest[..16])
    }

    pub fn entry_dir(&self, location: &Url) -> PathBuf {
        self.root.join(Self::key(location))
    }

    /// Exclusive cross-process lock on one location.
    pub fn lock(&self, location: &Url) -> Result<FileLock> {
        Ok(FileLock::acquire(
            self.root.join(LOCK_DIR),
            &Self::key(location),
        )?)
    }

    /// Reads the stored copy, if any. An unreadable copy is treated as absent.
    pub fn read(&self, location: &Url) -> Option<StoredMetadata> {
        let dir = self.entry_dir(location);
        let header_path = dir.join(HEADER_FILE);
        let content_path = dir.join(CONTENT_FILE);

        if !header_path.exists() || !content_path.exists() {
            return None;
        }

        let load = || -> Result<StoredMetadata> {
            let header = fs::read(&header_path)
                .with_context(|| format!("reading {}", header_path.display()))?;
            let header: CacheHeader = serde_json::from_slice(&header)?;
            let content = fs::read(&content_path)
                .with_context(|| format!("reading {}", content_path.display()))?;
            Ok(StoredMetadata {
                header,
                content,
            })
        };

        match load() {
            Ok(stored) => {
                trace!("read cached metadata for {} from {}", location, dir.display());
                Some(stored)
            }
            Err(err) => {
                warn!("ignoring unreadable metadata cache for {}: {}", location, err);
                None
            }
        }
    }

    /// Stores content and header. The content goes first, so a header on
    /// disk always describes complete content.
    pub fn write(&self, location: &Url, stored: &StoredMetadata) -> Result<()> {
        let dir = self.entry_dir(location);
        ensure_dir_exists(&dir)?;
        safe_remove(dir.join(HEADER_FILE))?;
        write_atomic(dir.join(CONTENT_FILE), &stored.content)?;
        self.write_header(location, &stored.header)
    }

    pub fn write_header(&self, location: &Url, header: &CacheHeader) -> Result<()> {
        let dir = self.entry_dir(location);
        ensure_dir_exists(&dir)?;
        let header = serde_json::to_vec_pretty(header)?;
        write_atomic(dir.join(HEADER_FILE), &header)?;
        Ok(())
    }

    pub fn remove(&self, location: &Url) -> Result<()> {
        Ok(safe_remove(self.entry_dir(location))?)
    }
}

/// Metadata cache owned by one `RepositoryManager`.
///
/// The in-memory tier maps each effective location to a slot guarded by its
/// own mutex, so loads of one location are serialized while loads of
/// different locations proceed independently.
#[derive(Default)]
pub struct MetadataCache {
    slots: Mutex<HashMap<Url, SlotHandle>>,
    disk: Option<DiskCache>,
}

impl MetadataCache {
    /// A cache with only the in-memory tier.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A cache backed by `root` on disk.
    pub fn with_disk<P: AsRef<Path>>(root: P) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            disk: Some(DiskCache::new(root)),
        }
    }

    pub fn disk(&self) -> Option<&DiskCache> {
        self.disk.as_ref()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<Url, SlotHandle>> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the slot for a location, reserving it if needed.
    pub(crate) fn slot(&self, location: &Url) -> SlotHandle {
        self.slots()
            .entry(location.clone())
            .or_default()
            .clone()
    }

    /// The loaded entry for a location, without any I/O.
    pub fn get(&self, location: &Url) -> Option<Arc<CacheEntry>> {
        let slot = self.slots().get(location)?.clone();
        let guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match &*guard {
            Slot::Loaded(entry) => Some(entry.clone()),
            _ => None,
        }
    }

    /// Whether a slot has been reserved for a location.
    pub fn is_reserved(&self, location: &Url) -> bool {
        self.slots().contains_key(location)
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn header(location: &Url) -> CacheHeader {
        CacheHeader {
            repository_id: "central".into(),
            original_location: location.to_string(),
            effective_location: location.to_string(),
            etag: Some("\"v1\"".into()),
            last_modified: None,
            last_refreshed: Utc::now(),
        }
    }

    #[test]
    fn test_disk_round_trip() {
        let dir = tempdir().unwrap();
        let disk = DiskCache::new(dir.path());
        let location = Url::parse("https://repo.example.org/releases/").unwrap();

        assert!(disk.read(&location).is_none());

        let stored = StoredMetadata {
            header: header(&location),
            content: b"{\"name\":\"central\"}".to_vec(),
        };
        disk.write(&location, &stored).unwrap();

        let read = disk.read(&location).unwrap();
        assert_eq!(read.header, stored.header);
        assert_eq!(read.content, stored.content);
        assert_eq!(read.header.validators().etag.as_deref(), Some("\"v1\""));

        disk.remove(&location).unwrap();
        assert!(disk.read(&location).is_none());
    }

    #[test]
    fn test_disk_keys_do_not_collide() {
        let disk = DiskCache::new("/cache");
        let a = Url::parse("https://repo.example.org/a_b/").unwrap();
        let b = Url::parse("https://repo.example.org/a/b/").unwrap();
        assert_ne!(disk.entry_dir(&a), disk.entry_dir(&b));
        assert!(disk.entry_dir(&a).starts_with("/cache"));
    }

    #[test]
    fn test_corrupt_header_is_ignored() {
        let dir = tempdir().unwrap();
        let disk = DiskCache::new(dir.path());
        let location = Url::parse("https://repo.example.org/").unwrap();

        let entry = disk.entry_dir(&location);
        fs::create_dir_all(&entry).unwrap();
        fs::write(entry.join(HEADER_FILE), "garbage").unwrap();
        fs::write(entry.join(CONTENT_FILE), "{}").unwrap();

        assert!(disk.read(&location).is_none());
    }

    #[test]
    fn test_header_age() {
        let location = Url::parse("https://repo.example.org/").unwrap();
        let mut header = header(&location);
        let now = Utc::now();

        header.last_refreshed = now - chrono::Duration::seconds(90);
        assert_eq!(header.age(now), Duration::from_secs(90));

        header.last_refreshed = now + chrono::Duration::seconds(90);
        assert_eq!(header.age(now), Duration::ZERO);
    }

    #[test]
    fn test_slot_reservation() {
        let cache = MetadataCache::in_memory();
        let location = Url::parse("https://repo.example.org/").unwrap();

        assert!(cache.is_empty());
        assert!(cache.get(&location).is_none());

        let first = cache.slot(&location);
        let second = cache.slot(&location);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.is_reserved(&location));
        assert!(cache.get(&location).is_none());
    }

    #[test]
    fn test_lock_is_exclusive_per_location() {
        let dir = tempdir().unwrap();
        let disk = DiskCache::new(dir.path());
        let location = Url::parse("https://repo.example.org/").unwrap();

        let held = disk.lock(&location).unwrap();
        let key = DiskCache::key(&location);
        assert!(FileLock::try_acquire(dir.path().join(LOCK_DIR), &key)
            .unwrap()
            .is_none());
        drop(held);
        assert!(FileLock::try_acquire(dir.path().join(LOCK_DIR), &key)
            .unwrap()
            .is_some());
    }
}
