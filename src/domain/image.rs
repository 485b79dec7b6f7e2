//! Base image reference

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque, pull-able image reference (`registry/repo:tag` or `@digest`)
///
/// No structure is interpreted; the value is handed to the container engine
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageReference(String);

impl ImageReference {
    /// Wrap a reference, rejecting empty values and values containing whitespace
    pub fn new(reference: impl Into<String>) -> Option<Self> {
        let reference = reference.into();
        if reference.is_empty() || reference.chars().any(char::is_whitespace) {
            return None;
        }
        Some(Self(reference))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ImageReference {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
