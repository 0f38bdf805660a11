use std::{collections::BTreeSet, io::Write};

use url::Url;

use crate::{
    artifact::{ArtifactDescriptor, ArtifactKey},
    error::TransferError,
    policy::TransferPolicy,
};

/// Predicate passed to [`ArtifactRepository::query`].
pub type KeyPredicate<'a> = &'a (dyn Fn(&ArtifactKey) -> bool + Sync);

/// A single addressable source of artifacts.
///
/// Implementations are read-only once constructed and may be queried from
/// several threads at once.
pub trait ArtifactRepository: Send + Sync {
    /// Identifier used in diagnostics.
    fn name(&self) -> &str;

    fn location(&self) -> &Url;

    /// The policy this repository prefers when only a key is requested.
    fn transfer_policy(&self) -> TransferPolicy {
        TransferPolicy::for_location(self.location())
    }

    /// All keys matching `predicate`.
    fn query(&self, predicate: KeyPredicate<'_>) -> BTreeSet<ArtifactKey>;

    /// Every encoding this repository stores for `key`, without duplicates.
    fn descriptors_for(&self, key: &ArtifactKey) -> Vec<ArtifactDescriptor>;

    fn contains_key(&self, key: &ArtifactKey) -> bool {
        !self.descriptors_for(key).is_empty()
    }

    fn contains(&self, descriptor: &ArtifactDescriptor) -> bool {
        self.descriptors_for(&descriptor.key).contains(descriptor)
    }

    /// Writes the stored bytes of `descriptor` to `out` and returns their
    /// length.
    ///
    /// On error, `out` may have received part of the bytes.
    fn fetch_raw(
        &self,
        descriptor: &ArtifactDescriptor,
        out: &mut dyn Write,
    ) -> Result<u64, TransferError>;
}
