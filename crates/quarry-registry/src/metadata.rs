//! The `repository.json` metadata format.
//!
//! A repository publishes one JSON document listing its units and the
//! stored encodings of each artifact. The document may be zstd-compressed;
//! compression is detected by magic bytes, not by file name.

use std::io::Read;

use quarry_utils::cancel::CancellationToken;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{ErrorContext, RegistryError, Result};

/// Name of the metadata document relative to the repository location.
pub const METADATA_FILE: &str = "repository.json";

/// Magic bytes for Zstandard compressed files.
pub const ZST_MAGIC_BYTES: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RepositoryMetadata {
    pub name: String,

    /// Alternative base URLs serving the same artifact bytes.
    #[serde(default)]
    pub mirrors: Vec<String>,

    #[serde(default)]
    pub units: Vec<RemoteUnit>,

    #[serde(default)]
    pub artifacts: Vec<RemoteArtifact>,
}

/// An installable unit described by the repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RemoteUnit {
    pub id: String,
    pub version: String,

    /// Marks an incomplete stand-in record that must never be consumed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub partial: bool,
}

/// One stored encoding of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RemoteArtifact {
    pub classifier: String,
    pub id: String,
    pub version: String,

    /// Processing steps applied to the canonical bytes, in application order.
    /// Empty for the canonical encoding.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub processing: Vec<String>,

    /// Path of the stored bytes, relative to the repository location.
    pub path: String,

    /// Length of the stored bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// blake3 hex digest of the stored bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl RemoteUnit {
    pub fn label(&self) -> String {
        format!("{}/{}", self.id, self.version)
    }
}

/// Decodes a metadata document, decompressing it first if it is zstd.
pub fn decode_metadata(content: &[u8]) -> Result<RepositoryMetadata> {
    if content.len() >= 4 && content[..4] == ZST_MAGIC_BYTES {
        trace!("decompressing zstd metadata ({} bytes)", content.len());
        let mut decoder =
            zstd::Decoder::new(content).with_context(|| "creating zstd decoder".to_string())?;
        let mut decoded = Vec::new();
        decoder
            .read_to_end(&mut decoded)
            .with_context(|| "decoding zstd metadata".to_string())?;
        return Ok(serde_json::from_slice(&decoded)?);
    }

    Ok(serde_json::from_slice(content)?)
}

/// Returns the labels of all partial units.
///
/// The cancellation token is checked before every record.
pub fn find_partial_units(
    metadata: &RepositoryMetadata,
    location: &str,
    cancel: &CancellationToken,
) -> Result<Vec<String>> {
    let mut partial = Vec::new();
    for unit in &metadata.units {
        if cancel.is_cancelled() {
            return Err(RegistryError::Cancelled {
                location: location.to_string(),
            });
        }
        if unit.partial {
            partial.push(unit.label());
        }
    }
    Ok(partial)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "name": "central",
        "mirrors": ["https://mirror.example.org/central/"],
        "units": [
            {"id": "app", "version": "1.0.0"},
            {"id": "lib", "version": "2.1.0", "partial": true}
        ],
        "artifacts": [
            {"classifier": "binary", "id": "app", "version": "1.0.0",
             "path": "binary/app-1.0.0", "size": 5, "checksum": "abc"},
            {"classifier": "binary", "id": "app", "version": "1.0.0",
             "processing": ["zstd"], "path": "binary/app-1.0.0.zst"}
        ]
    }"#;

    #[test]
    fn test_decode_plain_json() {
        let metadata = decode_metadata(SAMPLE.as_bytes()).unwrap();
        assert_eq!(metadata.name, "central");
        assert_eq!(metadata.mirrors.len(), 1);
        assert_eq!(metadata.artifacts.len(), 2);
        assert!(metadata.artifacts[0].processing.is_empty());
        assert_eq!(metadata.artifacts[1].processing, vec!["zstd"]);
        assert_eq!(metadata.artifacts[1].size, None);
    }

    #[test]
    fn test_decode_zstd_json() {
        let compressed = zstd::encode_all(SAMPLE.as_bytes(), 3).unwrap();
        assert_eq!(compressed[..4], ZST_MAGIC_BYTES);

        let metadata = decode_metadata(&compressed).unwrap();
        assert_eq!(metadata, decode_metadata(SAMPLE.as_bytes()).unwrap());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_metadata(b"not json"),
            Err(RegistryError::JsonError(_))
        ));
        assert!(decode_metadata(&[0x28, 0xb5, 0x2f, 0xfd, 0x00]).is_err());
    }

    #[test]
    fn test_minimal_document() {
        let metadata = decode_metadata(br#"{"name":"empty"}"#).unwrap();
        assert!(metadata.units.is_empty());
        assert!(metadata.artifacts.is_empty());
    }

    #[test]
    fn test_find_partial_units() {
        let metadata = decode_metadata(SAMPLE.as_bytes()).unwrap();
        let partial =
            find_partial_units(&metadata, "central", &CancellationToken::new()).unwrap();
        assert_eq!(partial, vec!["lib/2.1.0"]);
    }

    #[test]
    fn test_find_partial_units_cancelled() {
        let metadata = decode_metadata(SAMPLE.as_bytes()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            find_partial_units(&metadata, "central", &cancel),
            Err(RegistryError::Cancelled { .. })
        ));
    }
}
