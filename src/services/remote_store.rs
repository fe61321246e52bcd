//! Remote tier abstraction.
//!
//! The proxy only needs three things from an object store: push a local
//! file under a key, open a key for streaming, and answer a cheap probe for
//! readiness. `S3RemoteStore` is the production implementation.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::{io, path::Path, pin::Pin};
use thiserror::Error;

/// Streaming body of a remote object.
pub type ObjectBody = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote upload of `{key}` failed: {message}")]
    Put { key: String, message: String },
    #[error("remote read of `{key}` failed: {message}")]
    Get { key: String, message: String },
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
    #[error("reading local file for upload failed: {0}")]
    LocalFile(#[from] io::Error),
}

/// An object returned by the remote tier.
pub struct RemoteObject {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    /// `None` when the store answered without a readable payload.
    pub body: Option<ObjectBody>,
}

impl std::fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteObject")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Upload the file at `path` under `key` as a private object.
    async fn put_file(&self, key: &str, path: &Path, content_type: &str)
    -> Result<(), RemoteError>;

    /// Open `key` for reading. `Ok(None)` means the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<RemoteObject>, RemoteError>;

    /// Verify the store is reachable and the bucket is accessible.
    async fn check(&self) -> Result<(), RemoteError>;

    /// Short human-readable description used in logs.
    fn describe(&self) -> String;
}
