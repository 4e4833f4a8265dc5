// ABOUTME: Container image reference parsing and validation.
// ABOUTME: Accepts alpine, nginx:alpine, registry:5000/team/app:tag@sha256:...

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0}")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),
}

/// A parsed image reference.
///
/// A reference without tag or digest is normalised to `:latest`, matching
/// what the runtime pulls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    registry: Option<String>,
    repository: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        if let Some(c) = input
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !"/:.-_@".contains(*c))
        {
            return Err(ParseImageRefError::InvalidChar(c));
        }

        let (rest, digest) = match input.split_once('@') {
            Some((rest, digest)) if !digest.is_empty() => (rest, Some(digest.to_string())),
            Some(_) => return Err(ParseImageRefError::InvalidFormat(input.to_string())),
            None => (input, None),
        };

        // A colon after the last slash separates the tag; one before it is a
        // registry port.
        let last_slash = rest.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (path, tag) = match rest[last_slash..].split_once(':') {
            Some((_, tag)) if tag.is_empty() => {
                return Err(ParseImageRefError::InvalidFormat(input.to_string()));
            }
            Some((name, tag)) => (&rest[..last_slash + name.len()], Some(tag.to_string())),
            None => (rest, None),
        };

        let (registry, repository) = split_registry(path);
        if repository.is_empty() || repository.split('/').any(str::is_empty) {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }

        let tag = match (tag, &digest) {
            (None, None) => Some("latest".to_string()),
            (tag, _) => tag,
        };

        Ok(Self {
            registry,
            repository: repository.to_string(),
            tag,
            digest,
        })
    }

    /// An unqualified `repository:tag` reference.
    ///
    /// The caller guarantees both parts are well formed.
    pub(crate) fn library(repository: &str, tag: &str) -> Self {
        Self {
            registry: None,
            repository: repository.to_string(),
            tag: Some(tag.to_string()),
            digest: None,
        }
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }
}

fn split_registry(path: &str) -> (Option<String>, &str) {
    match path.split_once('/') {
        Some((first, rest))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            (Some(first.to_string()), rest)
        }
        _ => (None, path),
    }
}

impl FromStr for ImageRef {
    type Err = ParseImageRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref registry) = self.registry {
            write!(f, "{}/", registry)?;
        }
        write!(f, "{}", self.repository)?;
        if let Some(ref tag) = self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(ref digest) = self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for ImageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        ImageRef::parse(&value).map_err(serde::de::Error::custom)
    }
}
