//! Choosing among several encodings of one artifact.

use quarry_config::config::TransferPolicySetting;
use quarry_registry::mirror::is_local_url;
use url::Url;

use crate::{artifact::ArtifactDescriptor, error::QuarryError, QuarryResult};

/// Preference between canonical and processed encodings.
///
/// Processed encodings are usually smaller, which pays off over the network;
/// locally the canonical bytes need no decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPolicy {
    Local,
    Remote,
}

impl TransferPolicy {
    /// Local for `file://` and loopback locations, remote otherwise.
    pub fn for_location(location: &Url) -> Self {
        if is_local_url(location) {
            TransferPolicy::Local
        } else {
            TransferPolicy::Remote
        }
    }

    /// A fixed policy from configuration, or `None` to choose per repository.
    pub fn from_setting(setting: TransferPolicySetting) -> Option<Self> {
        match setting {
            TransferPolicySetting::Auto => None,
            TransferPolicySetting::Local => Some(TransferPolicy::Local),
            TransferPolicySetting::Remote => Some(TransferPolicy::Remote),
        }
    }

    /// Picks the preferred descriptor. Ties go to the first descriptor of the
    /// preferred kind.
    pub fn pick_format<'a>(
        &self,
        descriptors: &'a [ArtifactDescriptor],
    ) -> QuarryResult<&'a ArtifactDescriptor> {
        let first = descriptors.first().ok_or_else(|| {
            QuarryError::Configuration("cannot pick a format from an empty descriptor list".into())
        })?;

        let preferred = match self {
            TransferPolicy::Remote => {
                descriptors
                    .iter()
                    .find(|d| !d.format.is_canonical())
                    .or_else(|| descriptors.iter().find(|d| d.format.is_canonical()))
            }
            TransferPolicy::Local => descriptors.iter().find(|d| d.format.is_canonical()),
        };

        Ok(preferred.unwrap_or(first))
    }
}
