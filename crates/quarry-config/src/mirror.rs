use documented::{Documented, DocumentedFields};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    repository::validate_url,
};

/// A mirror that replaces the location of one or more repositories.
#[derive(Clone, Debug, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct MirrorConfig {
    /// Unique name of the mirror.
    pub name: String,

    /// Base URL that replaces the mirrored repository's URL.
    pub url: String,

    /// Which repositories this mirror serves:
    /// `*` for all, `external:*` for all except file:// and localhost,
    /// or a comma-separated list of repository names where `!name` excludes one.
    /// The first matching mirror in declaration order wins.
    pub mirror_of: String,
}

impl MirrorConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        validate_url(&self.name, &self.url)?;
        if self.mirror_of.split(',').all(|part| part.trim().is_empty()) {
            return Err(ConfigError::EmptyMirrorOf(self.name.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirror(mirror_of: &str) -> MirrorConfig {
        MirrorConfig {
            name: "internal".into(),
            url: "https://mirror.example.org/all".into(),
            mirror_of: mirror_of.into(),
        }
    }

    #[test]
    fn test_validate_mirror_of() {
        assert!(mirror("*").validate().is_ok());
        assert!(mirror("central, !snapshots").validate().is_ok());
        assert!(matches!(
            mirror(" , ").validate(),
            Err(ConfigError::EmptyMirrorOf(_))
        ));
    }
}
