// ABOUTME: Phantom-typed identifiers for compile-time type safety.
// ABOUTME: Keeps container and image IDs from being swapped by accident.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Marker types for phantom type parameters.
pub enum ContainerMarker {}
pub enum ImageMarker {}

/// An identifier tagged with the kind of resource it names.
///
/// A `ContainerId` cannot be passed where an `ImageId` is expected, even
/// though both are runtime-assigned strings.
#[must_use = "IDs reference resources and should not be ignored"]
pub struct Id<T> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// First 12 hex characters, as the Docker CLI prints them.
    pub fn short(&self) -> &str {
        let value = self.value.strip_prefix("sha256:").unwrap_or(&self.value);
        match value.char_indices().nth(12) {
            Some((idx, _)) => &value[..idx],
            None => value,
        }
    }

    pub fn into_inner(self) -> String {
        self.value
    }
}

// T is only a marker, so these are written by hand to avoid `T: Trait` bounds.

impl<T> std::fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Id").field("value", &self.value).finish()
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> std::fmt::Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

pub type ContainerId = Id<ContainerMarker>;
pub type ImageId = Id<ImageMarker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_strips_digest_prefix() {
        let id = ImageId::new("sha256:0123456789abcdef0123");
        assert_eq!(id.short(), "0123456789ab");
    }

    #[test]
    fn short_keeps_short_values() {
        let id = ContainerId::new("abc");
        assert_eq!(id.short(), "abc");
    }
}
