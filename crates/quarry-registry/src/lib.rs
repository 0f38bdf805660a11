//! Repository metadata for quarry.
//!
//! This crate maps repository locations to their effective (possibly
//! mirrored) locations, loads the `repository.json` document published at
//! each location, and keeps loaded metadata in a two-tier cache so that a
//! repository is fetched at most once per manager and can be reused offline.

pub mod cache;
pub mod error;
pub mod manager;
pub mod metadata;
pub mod mirror;

pub use cache::{CacheEntry, CacheHeader, DiskCache, MetadataCache};
pub use error::{RegistryError, Result};
pub use manager::{ManagerMode, RepositoryManager};
pub use metadata::{RemoteArtifact, RemoteUnit, RepositoryMetadata};
pub use mirror::{MirrorResolver, MirrorTable, NoMirrors, RepositoryLocation};
