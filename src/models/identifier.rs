//! Identifiers for stored files and the locator that maps them to storage.
//!
//! An identifier is `<unix_ms>-<original_filename>`. The same string names
//! the file inside the local storage root and the object key in the remote
//! bucket, so it must always be a single, harmless path component.

use serde::{Serialize, Serializer};
use std::{
    fmt,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Longest identifier accepted. Leaves room under the common 255-byte
/// filename limit for the `.pending-` claim marker.
pub const MAX_IDENTIFIER_LEN: usize = 240;

/// Route prefix under which stored files are served.
pub const FILE_ROUTE_PREFIX: &str = "/file/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("identifier is empty")]
    Empty,
    #[error("identifier exceeds {MAX_IDENTIFIER_LEN} bytes")]
    TooLong,
    #[error("identifier must be a single path component")]
    NotAPathComponent,
    #[error("identifier contains control characters")]
    ControlCharacter,
    #[error("filename `{0}` cannot be stored")]
    UnusableFilename(String),
}

/// Validated name of a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Validate an identifier received from a client.
    ///
    /// Rejects anything that could escape the storage root or address a
    /// hidden (temporary) file: separators, NUL and other control bytes,
    /// and a leading dot (which also covers `.` and `..`).
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        if raw.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if raw.len() > MAX_IDENTIFIER_LEN {
            return Err(IdentifierError::TooLong);
        }
        if raw.starts_with('.') || raw.contains(['/', '\\']) {
            return Err(IdentifierError::NotAPathComponent);
        }
        if raw.chars().any(char::is_control) {
            return Err(IdentifierError::ControlCharacter);
        }
        Ok(Self(raw.to_string()))
    }

    /// Build the identifier for an upload made at `timestamp_ms`.
    pub fn generate(timestamp_ms: i64, filename: &str) -> Result<Self, IdentifierError> {
        Self::parse(&format!("{}-{}", timestamp_ms, filename))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Remote object key. Same string as the identifier.
    pub fn remote_key(&self) -> &str {
        &self.0
    }

    /// Relative URL understood by the retrieval route.
    pub fn url(&self) -> String {
        format!("{}{}", FILE_ROUTE_PREFIX, urlencoding::encode(&self.0))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Map an identifier to its file inside the local storage root.
pub fn identifier_to_path(root: &Path, identifier: &Identifier) -> PathBuf {
    root.join(identifier.as_str())
}

/// Reduce a client-supplied filename to something storable.
///
/// Browsers and CLI tools sometimes send full paths (`C:\tmp\a.txt`,
/// `../../a.txt`); only the final component is kept.
pub fn sanitize_filename(original: &str) -> Result<String, IdentifierError> {
    let last = original.rsplit(['/', '\\']).next().unwrap_or(original);
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return Err(IdentifierError::UnusableFilename(original.to_string()));
    }
    Ok(cleaned.to_string())
}
