// ABOUTME: Container name validation.
// ABOUTME: Names follow the runtime's [a-zA-Z0-9][a-zA-Z0-9_.-]* rule.

use serde::{Deserialize, Deserializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContainerNameError {
    #[error("container name cannot be empty")]
    Empty,

    #[error("container name exceeds maximum length of 128 characters")]
    TooLong,

    #[error("container name must start with a letter or digit")]
    InvalidStart,

    #[error("invalid character in container name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerName(String);

impl ContainerName {
    pub fn new(value: &str) -> Result<Self, ContainerNameError> {
        // The runtime reports names with a leading slash.
        let value = value.strip_prefix('/').unwrap_or(value);

        let mut chars = value.chars();
        let first = chars.next().ok_or(ContainerNameError::Empty)?;
        if !first.is_ascii_alphanumeric() {
            return Err(ContainerNameError::InvalidStart);
        }

        if value.len() > 128 {
            return Err(ContainerNameError::TooLong);
        }

        for c in chars {
            if !c.is_ascii_alphanumeric() && c != '_' && c != '.' && c != '-' {
                return Err(ContainerNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for ContainerName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        ContainerName::new(&value).map_err(serde::de::Error::custom)
    }
}
