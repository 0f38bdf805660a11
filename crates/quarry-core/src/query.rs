use fast_glob::glob_match;
use semver::VersionReq;

use crate::{artifact::ArtifactKey, error::QuarryError, QuarryResult};

/// A predicate over artifact keys.
///
/// Every present field must match: the classifier exactly, the id as a glob
/// pattern, the version against a semver requirement.
#[derive(Debug, Clone, Default)]
pub struct ArtifactQuery {
    pub classifier: Option<String>,
    pub id: Option<String>,
    pub version: Option<VersionReq>,
}

impl ArtifactQuery {
    /// Matches every key.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, key: &ArtifactKey) -> bool {
        let classifier = self
            .classifier
            .as_ref()
            .is_none_or(|classifier| *classifier == key.classifier);
        let id = self.id.as_ref().is_none_or(|glob| glob_match(glob, &key.id));
        let version = self
            .version
            .as_ref()
            .is_none_or(|req| req.matches(&key.version));

        classifier && id && version
    }
}

impl TryFrom<&str> for ArtifactQuery {
    type Error = QuarryError;

    /// Parses `[classifier/]id[@requirement]`, e.g. `binary/app-*@^1.2`.
    /// An empty classifier or id, or `*`, matches anything.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.trim();
        if value.is_empty() {
            return Err(QuarryError::InvalidQuery("Query can't be empty".into()));
        }

        let (coordinates, version) = match value.split_once('@') {
            Some((coordinates, req)) => {
                let req = VersionReq::parse(req.trim()).map_err(|err| {
                    QuarryError::InvalidQuery(format!("invalid version requirement '{req}': {err}"))
                })?;
                (coordinates, Some(req))
            }
            None => (value, None),
        };

        let (classifier, id) = match coordinates.split_once('/') {
            Some((classifier, id)) => (Some(classifier), id),
            None => (None, coordinates),
        };

        if id.contains('/') {
            return Err(QuarryError::InvalidQuery(format!(
                "'{value}' has too many path segments"
            )));
        }

        let non_wildcard = |part: &str| {
            let part = part.trim();
            (!part.is_empty() && part != "*").then(|| part.to_string())
        };

        Ok(Self {
            classifier: classifier.and_then(non_wildcard),
            id: non_wildcard(id),
            version,
        })
    }
}
