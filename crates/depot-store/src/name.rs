//! # Artifact Names
//!
//! [`ArtifactName`] is a validated newtype over the user-supplied model
//! name. Validation happens once at construction and the inner value is
//! immutable afterward, so no raw string can reach filesystem code.
//!
//! This is a security boundary: the name becomes a single path component
//! under the artifacts directory, so anything that could escape it —
//! separators, traversal components, control characters — is rejected
//! here rather than trusted to the transport layer.

use std::fmt;

use crate::error::StoreError;

/// Maximum artifact name length in bytes (common filesystem limit).
const MAX_NAME_BYTES: usize = 255;

fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::InvalidName("name is empty".into()));
    }
    if name.len() > MAX_NAME_BYTES {
        return Err(StoreError::InvalidName(format!(
            "name is {} bytes (max {MAX_NAME_BYTES})",
            name.len()
        )));
    }
    if name == "." || name == ".." {
        return Err(StoreError::InvalidName(format!(
            "name {name:?} is a path traversal component"
        )));
    }
    if name.starts_with(char::is_whitespace) || name.ends_with(char::is_whitespace) {
        return Err(StoreError::InvalidName(
            "name has leading or trailing whitespace".into(),
        ));
    }
    for c in name.chars() {
        if c == '/' || c == '\\' {
            return Err(StoreError::InvalidName(format!(
                "name contains path separator {c:?}"
            )));
        }
        if c.is_control() {
            return Err(StoreError::InvalidName(format!(
                "name contains control character {c:?}"
            )));
        }
    }
    Ok(())
}

/// A validated artifact name — always usable as a single path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactName(String);

impl ArtifactName {
    /// Validate and wrap an artifact name.
    ///
    /// Rejects empty names, names longer than 255 bytes, `.` and `..`,
    /// path separators, control characters, and leading/trailing
    /// whitespace.
    pub fn new(name: &str) -> Result<Self, StoreError> {
        validate_name(name)?;
        Ok(Self(name.to_string()))
    }

    /// Return the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArtifactName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
