//! Artifact identities and encodings.

use std::{cmp::Ordering, fmt, str::FromStr};

use semver::Version;
use serde::Serialize;

use crate::{error::QuarryError, QuarryResult};

/// Logical identity of an artifact: what is wanted, not how it is encoded.
///
/// Keys are ordered by version first, then classifier, then id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ArtifactKey {
    pub classifier: String,
    pub id: String,
    pub version: Version,
}

impl ArtifactKey {
    pub fn new(classifier: impl Into<String>, id: impl Into<String>, version: Version) -> Self {
        Self {
            classifier: classifier.into(),
            id: id.into(),
            version,
        }
    }

    /// Builds a key from string parts, parsing the version.
    pub fn parse(classifier: &str, id: &str, version: &str) -> QuarryResult<Self> {
        let parsed = Version::parse(version.trim()).map_err(|source| {
            QuarryError::InvalidVersion {
                version: version.to_string(),
                source,
            }
        })?;
        Ok(Self::new(classifier, id, parsed))
    }
}

impl Ord for ArtifactKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version
            .cmp(&other.version)
            .then_with(|| self.classifier.cmp(&other.classifier))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for ArtifactKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.classifier, self.id, self.version)
    }
}

impl FromStr for ArtifactKey {
    type Err = QuarryError;

    /// Parses `classifier/id/version`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        match parts.as_slice() {
            [classifier, id, version]
                if !classifier.is_empty() && !id.is_empty() && !version.is_empty() =>
            {
                Self::parse(classifier, id, version)
            }
            _ => {
                Err(QuarryError::InvalidQuery(format!(
                    "'{s}' is not of the form classifier/id/version"
                )))
            }
        }
    }
}

/// A reversible transformation applied to the canonical bytes of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProcessingStep {
    Zstd,
    Gzip,
}

impl ProcessingStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStep::Zstd => "zstd",
            ProcessingStep::Gzip => "gzip",
        }
    }
}

impl fmt::Display for ProcessingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStep {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zstd" | "zst" => Ok(ProcessingStep::Zstd),
            "gzip" | "gz" => Ok(ProcessingStep::Gzip),
            other => Err(QuarryError::UnknownProcessingStep(other.to_string())),
        }
    }
}

/// How the stored bytes of a descriptor relate to the canonical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactFormat {
    Canonical,
    /// Steps in the order they were applied to the canonical bytes.
    Processed(Vec<ProcessingStep>),
}

impl ArtifactFormat {
    /// Builds a format from step names; no steps means canonical.
    pub fn from_steps<S: AsRef<str>>(steps: &[S]) -> QuarryResult<Self> {
        if steps.is_empty() {
            return Ok(ArtifactFormat::Canonical);
        }
        let steps = steps
            .iter()
            .map(|step| step.as_ref().parse())
            .collect::<QuarryResult<Vec<ProcessingStep>>>()?;
        Ok(ArtifactFormat::Processed(steps))
    }

    pub fn is_canonical(&self) -> bool {
        matches!(self, ArtifactFormat::Canonical)
    }

    pub fn steps(&self) -> &[ProcessingStep] {
        match self {
            ArtifactFormat::Canonical => &[],
            ArtifactFormat::Processed(steps) => steps,
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactFormat::Canonical => f.write_str("canonical"),
            ArtifactFormat::Processed(steps) => {
                let names: Vec<&str> = steps.iter().map(ProcessingStep::as_str).collect();
                f.write_str(&names.join("+"))
            }
        }
    }
}

impl FromStr for ArtifactFormat {
    type Err = QuarryError;

    /// Parses `canonical` or a `+`-separated list of steps such as `zstd+gzip`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("canonical") {
            return Ok(ArtifactFormat::Canonical);
        }
        let steps: Vec<&str> = s.split('+').collect();
        Self::from_steps(&steps)
    }
}

/// One concrete encoding of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactDescriptor {
    pub key: ArtifactKey,
    pub format: ArtifactFormat,
}

impl ArtifactDescriptor {
    pub fn new(key: ArtifactKey, format: ArtifactFormat) -> Self {
        Self {
            key,
            format,
        }
    }

    pub fn canonical(key: ArtifactKey) -> Self {
        Self::new(key, ArtifactFormat::Canonical)
    }

    pub fn processed(key: ArtifactKey, steps: Vec<ProcessingStep>) -> Self {
        Self::new(key, ArtifactFormat::Processed(steps))
    }
}

impl fmt::Display for ArtifactDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.key, self.format)
    }
}

/// What a fetch asks for: any encoding of a key, or one exact encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactRef {
    Key(ArtifactKey),
    Descriptor(ArtifactDescriptor),
}

impl ArtifactRef {
    pub fn key(&self) -> &ArtifactKey {
        match self {
            ArtifactRef::Key(key) => key,
            ArtifactRef::Descriptor(descriptor) => &descriptor.key,
        }
    }
}

impl From<ArtifactKey> for ArtifactRef {
    fn from(key: ArtifactKey) -> Self {
        ArtifactRef::Key(key)
    }
}

impl From<ArtifactDescriptor> for ArtifactRef {
    fn from(descriptor: ArtifactDescriptor) -> Self {
        ArtifactRef::Descriptor(descriptor)
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactRef::Key(key) => key.fmt(f),
            ArtifactRef::Descriptor(descriptor) => descriptor.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(version: &str) -> ArtifactKey {
        ArtifactKey::parse("binary", "app", version).unwrap()
    }

    #[test]
    fn test_key_ordering_by_version_first() {
        let mut keys = vec![
            ArtifactKey::parse("source", "app", "1.0.0").unwrap(),
            key("2.0.0"),
            key("1.0.0"),
            key("1.0.0-rc.1"),
        ];
        keys.sort();

        let rendered: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "binary/app/1.0.0-rc.1",
                "binary/app/1.0.0",
                "source/app/1.0.0",
                "binary/app/2.0.0",
            ]
        );
    }

    #[test]
    fn test_key_equality_uses_all_fields() {
        assert_eq!(key("1.0.0"), key("1.0.0"));
        assert_ne!(key("1.0.0"), ArtifactKey::parse("binary", "lib", "1.0.0").unwrap());
        assert_ne!(key("1.0.0"), ArtifactKey::parse("source", "app", "1.0.0").unwrap());
    }

    #[test]
    fn test_key_from_str() {
        let parsed: ArtifactKey = "binary/app/1.2.3".parse().unwrap();
        assert_eq!(parsed, key("1.2.3"));

        assert!(matches!(
            "binary/app".parse::<ArtifactKey>(),
            Err(QuarryError::InvalidQuery(_))
        ));
        assert!(matches!(
            "binary/app/latest".parse::<ArtifactKey>(),
            Err(QuarryError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("canonical".parse::<ArtifactFormat>().unwrap(), ArtifactFormat::Canonical);
        assert_eq!(
            "zstd+gz".parse::<ArtifactFormat>().unwrap(),
            ArtifactFormat::Processed(vec![ProcessingStep::Zstd, ProcessingStep::Gzip])
        );
        assert!(matches!(
            "xz".parse::<ArtifactFormat>(),
            Err(QuarryError::UnknownProcessingStep(_))
        ));

        let empty: [&str; 0] = [];
        assert!(ArtifactFormat::from_steps(&empty).unwrap().is_canonical());
    }

    #[test]
    fn test_descriptor_display() {
        let descriptor = ArtifactDescriptor::processed(key("1.0.0"), vec![ProcessingStep::Zstd]);
        assert_eq!(descriptor.to_string(), "binary/app/1.0.0 [zstd]");
        assert_eq!(
            ArtifactDescriptor::canonical(key("1.0.0")).to_string(),
            "binary/app/1.0.0 [canonical]"
        );
    }
}
