//! src/services/storage_service.rs
//!
//! StorageService: the two-tier store behind the HTTP handlers. Uploads land
//! on local disk first (`base_path/<identifier>`) and are then mirrored to the
//! remote tier under the same key. Reads try the local file and fall back to
//! the remote tier on a miss. There is no index; every lookup is a computed
//! path or key.

use crate::models::{
    identifier::{Identifier, IdentifierError, identifier_to_path, sanitize_filename},
    stored_object::{StoredObject, Tier},
};
use crate::services::remote_store::{ObjectBody, RemoteError, RemoteObject, RemoteStore};
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Upper bound on millisecond bumps when an identifier is already taken.
const MAX_RESERVE_ATTEMPTS: u32 = 1000;

/// Prefix of in-flight upload files. Identifiers can never start with a dot.
const TMP_PREFIX: &str = ".tmp-";

/// Prefix of identifier claim markers.
const PENDING_PREFIX: &str = ".pending-";

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierError),
    #[error("`{0}` not found in any storage tier")]
    NotFound(String),
    #[error("upload body could not be read: {0}")]
    Body(#[source] io::Error),
    #[error("no free identifier for `{0}`")]
    IdentifierExhausted(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A readable object plus the tier it came from.
pub struct FetchedObject {
    pub identifier: Identifier,
    pub tier: Tier,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub body: ObjectBody,
}

/// StorageService ties the local tier (a flat directory) to an optional
/// remote tier. Cloning is cheap; all clones share the same remote client.
#[derive(Clone)]
pub struct StorageService {
    /// Directory holding the local copies.
    pub base_path: PathBuf,

    /// Remote tier; `None` runs local-only.
    remote: Option<Arc<dyn RemoteStore>>,
}

impl StorageService {
    pub fn new(base_path: impl Into<PathBuf>, remote: Option<Arc<dyn RemoteStore>>) -> Self {
        Self {
            base_path: base_path.into(),
            remote,
        }
    }

    pub fn local_only(base_path: impl Into<PathBuf>) -> Self {
        Self::new(base_path, None)
    }

    pub fn remote(&self) -> Option<&Arc<dyn RemoteStore>> {
        self.remote.as_ref()
    }

    /// Create the storage root. Safe to call on every request.
    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.base_path).await
    }

    /// Claim a fresh identifier without making it fetchable.
    ///
    /// The claim is a hidden `.pending-<identifier>` marker created
    /// exclusively; the identifier is only free if no published file holds it
    /// either. The identifier keeps the `<unix_ms>-<filename>` shape; on a
    /// clash the timestamp is bumped by one millisecond.
    async fn reserve(&self, filename: &str) -> StorageResult<Reservation> {
        let mut timestamp = Utc::now().timestamp_millis();
        for _ in 0..MAX_RESERVE_ATTEMPTS {
            let identifier = Identifier::generate(timestamp, filename)?;
            let marker = self
                .base_path
                .join(format!("{}{}", PENDING_PREFIX, identifier));
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&marker)
                .await
            {
                Ok(_) => {
                    let target = identifier_to_path(&self.base_path, &identifier);
                    match fs::try_exists(&target).await {
                        Ok(false) => {
                            return Ok(Reservation {
                                identifier,
                                target,
                                marker,
                            });
                        }
                        Ok(true) => {
                            remove_quietly(&marker).await;
                            debug!("identifier {} already published, retrying", identifier);
                        }
                        Err(err) => {
                            remove_quietly(&marker).await;
                            return Err(StorageError::Io(err));
                        }
                    }
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    debug!("identifier {} pending elsewhere, retrying", identifier);
                }
                Err(err) => return Err(StorageError::Io(err)),
            }
            timestamp += 1;
        }
        Err(StorageError::IdentifierExhausted(filename.to_string()))
    }

    /// Stream `stream` into `tmp_path` and fsync it.
    ///
    /// Returns the number of bytes written. The caller owns cleanup of
    /// `tmp_path`.
    async fn write_temp<S>(&self, tmp_path: &Path, stream: S) -> StorageResult<u64>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let mut file = File::create(tmp_path).await?;

        let mut size_bytes: u64 = 0;
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = chunk_res.map_err(StorageError::Body)?;
            size_bytes += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;

        Ok(size_bytes)
    }

    /// Persist an upload locally, mirror it, then publish it.
    ///
    /// All-or-nothing: the body is written to a hidden temp file, mirrored to
    /// the remote tier from there, and only then hard-linked under its
    /// identifier. Until that link exists a fetch for the identifier misses
    /// the local tier, and any failure leaves nothing behind locally.
    pub async fn store_stream<S>(
        &self,
        original_filename: &str,
        content_type: Option<String>,
        stream: S,
    ) -> StorageResult<StoredObject>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let filename = sanitize_filename(original_filename)?;
        self.ensure_root().await?;

        let reservation = self.reserve(&filename).await?;
        let tmp_path = self
            .base_path
            .join(format!("{}{}", TMP_PREFIX, Uuid::new_v4()));

        let result = self
            .write_and_publish(&reservation, &tmp_path, content_type, stream)
            .await;

        remove_quietly(&tmp_path).await;
        remove_quietly(&reservation.marker).await;

        let (size_bytes, content_type, mirrored) = result?;
        info!(
            identifier = %reservation.identifier,
            size_bytes,
            mirrored,
            "stored upload"
        );

        Ok(StoredObject {
            identifier: reservation.identifier,
            local_path: reservation.target,
            size_bytes,
            content_type,
            mirrored,
        })
    }

    async fn write_and_publish<S>(
        &self,
        reservation: &Reservation,
        tmp_path: &Path,
        content_type: Option<String>,
        stream: S,
    ) -> StorageResult<(u64, String, bool)>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let identifier = &reservation.identifier;
        let size_bytes = self.write_temp(tmp_path, stream).await?;

        let content_type = content_type
            .filter(|ct| is_valid_content_type(ct))
            .unwrap_or_else(|| guess_content_type(identifier.as_str()));

        let mirrored = match &self.remote {
            Some(remote) => {
                remote
                    .put_file(identifier.remote_key(), tmp_path, &content_type)
                    .await?;
                true
            }
            None => false,
        };

        fs::hard_link(tmp_path, &reservation.target).await?;
        Ok((size_bytes, content_type, mirrored))
    }

    /// Open an object for streaming, local tier first.
    pub async fn open(&self, raw_identifier: &str) -> StorageResult<FetchedObject> {
        let identifier = Identifier::parse(raw_identifier)?;

        if let Some(fetched) = self.open_local(&identifier).await? {
            debug!(identifier = %identifier, "local cache hit");
            return Ok(fetched);
        }

        let Some(remote) = &self.remote else {
            return Err(StorageError::NotFound(identifier.to_string()));
        };

        debug!(identifier = %identifier, remote = %remote.describe(), "local miss, trying remote");
        match remote.get(identifier.remote_key()).await? {
            Some(RemoteObject {
                content_type,
                content_length,
                body: Some(body),
            }) => {
                let content_type = content_type
                    .filter(|ct| is_valid_content_type(ct))
                    .unwrap_or_else(|| guess_content_type(identifier.as_str()));
                Ok(FetchedObject {
                    identifier,
                    tier: Tier::Remote,
                    content_type,
                    content_length,
                    body,
                })
            }
            Some(_) => {
                warn!(identifier = %identifier, "remote object has no body");
                Err(StorageError::NotFound(identifier.to_string()))
            }
            None => Err(StorageError::NotFound(identifier.to_string())),
        }
    }

    async fn open_local(&self, identifier: &Identifier) -> StorageResult<Option<FetchedObject>> {
        let path = identifier_to_path(&self.base_path, identifier);
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::Io(err)),
        };
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(FetchedObject {
            identifier: identifier.clone(),
            tier: Tier::Local,
            content_type: guess_content_type(identifier.as_str()),
            content_length: Some(metadata.len()),
            body: Box::pin(ReaderStream::new(file)),
        }))
    }
}

/// Identifier claimed for an in-flight upload.
struct Reservation {
    identifier: Identifier,
    /// Published location, absent until the upload succeeds.
    target: PathBuf,
    /// Hidden claim marker, removed once the upload settles.
    marker: PathBuf,
}

/// Remove a scratch file, logging rather than failing.
async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(_) => debug!("removed {}", path.display()),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!("could not remove {}: {}", path.display(), err),
    }
}

/// Content type from a filename extension, `application/octet-stream` if unknown.
pub fn guess_content_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first()
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string())
}

fn is_valid_content_type(value: &str) -> bool {
    value.parse::<mime_guess::mime::Mime>().is_ok()
}
