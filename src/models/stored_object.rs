//! Represents a file accepted by the proxy and where its copies live.

use super::identifier::Identifier;
use serde::Serialize;
use std::path::PathBuf;

/// A stored file. Only metadata is kept here, never the bytes.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Opaque name handed back to the client.
    pub identifier: Identifier,

    /// Location of the local copy.
    pub local_path: PathBuf,

    /// Number of bytes written.
    pub size_bytes: u64,

    /// Content type recorded with the remote copy.
    pub content_type: String,

    /// Whether the remote tier received a copy.
    pub mirrored: bool,
}

/// Which storage tier served a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Local,
    Remote,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Local => "local",
            Tier::Remote => "remote",
        }
    }
}

/// JSON body returned by `POST /upload`.
///
/// `hash` duplicates `identifier` for clients written against
/// IPFS-style `add` responses.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub hash: Identifier,
    pub identifier: Identifier,
    pub url: String,
}

impl From<&StoredObject> for UploadResponse {
    fn from(object: &StoredObject) -> Self {
        Self {
            hash: object.identifier.clone(),
            identifier: object.identifier.clone(),
            url: object.identifier.url(),
        }
    }
}
