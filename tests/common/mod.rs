//! Shared helpers for router-level tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use bytes::Bytes;
use file_proxy::{
    routes::routes,
    services::{
        remote_store::{ObjectBody, RemoteError, RemoteObject, RemoteStore},
        storage_service::StorageService,
    },
};
use futures::{StreamExt, stream};
use std::{
    collections::HashMap,
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::oneshot;
use tower::ServiceExt;

pub const BOUNDARY: &str = "file-proxy-test-boundary";

/// In-memory remote tier with switchable failure modes.
#[derive(Default)]
pub struct MemoryRemote {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    unreachable: AtomicBool,
    reject_puts: AtomicBool,
}

impl MemoryRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, key: &str, data: &[u8], content_type: &str) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (data.to_vec(), content_type.to_string()));
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).map(|(data, _)| data.clone())
    }

    pub fn set_unreachable(&self, value: bool) {
        self.unreachable.store(value, Ordering::SeqCst);
    }

    pub fn set_reject_puts(&self, value: bool) {
        self.reject_puts.store(value, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), RemoteError> {
        if self.reject_puts.load(Ordering::SeqCst) || self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Put {
                key: key.to_string(),
                message: "connection refused".into(),
            });
        }
        let data = tokio::fs::read(path).await?;
        self.insert(key, &data, content_type);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<RemoteObject>, RemoteError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Get {
                key: key.to_string(),
                message: "connection refused".into(),
            });
        }
        let found = self.objects.lock().unwrap().get(key).cloned();
        Ok(found.map(|(data, content_type)| {
            let content_length = Some(data.len() as u64);
            let body: ObjectBody = Box::pin(stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from(data))]));
            RemoteObject {
                content_type: Some(content_type),
                content_length,
                body: Some(body),
            }
        }))
    }

    async fn check(&self) -> Result<(), RemoteError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("connection refused".into()));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "memory://test".into()
    }
}

pub fn app_with_remote(root: &Path, remote: Arc<MemoryRemote>, max_upload_bytes: usize) -> Router {
    let remote: Arc<dyn RemoteStore> = remote;
    routes::app(StorageService::new(root, Some(remote)), max_upload_bytes)
}

pub fn local_only_app(root: &Path) -> Router {
    routes::app(StorageService::local_only(root), 1024 * 1024)
}

/// One part of a multipart form.
pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub data: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn file(filename: &'a str, data: &'a [u8]) -> Self {
        Self {
            name: "file",
            filename: Some(filename),
            content_type: None,
            data,
        }
    }

    pub fn text(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            filename: None,
            content_type: None,
            data: value.as_bytes(),
        }
    }
}

pub fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(filename) = part.filename {
            disposition.push_str(&format!("; filename=\"{}\"", filename));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Upload of a single `file` part whose body sends `head`, then waits for
/// `release` before sending `tail` and the closing boundary.
pub fn stalled_upload_request(
    filename: &str,
    head: &'static [u8],
    tail: &'static [u8],
    release: oneshot::Receiver<()>,
) -> Request<Body> {
    let mut opening = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\r\n",
        BOUNDARY, filename
    )
    .into_bytes();
    opening.extend_from_slice(head);
    let mut closing = tail.to_vec();
    closing.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    let body = stream::once(async move { Ok::<_, std::io::Error>(Bytes::from(opening)) }).chain(
        stream::once(async move {
            let _ = release.await;
            Ok::<_, std::io::Error>(Bytes::from(closing))
        }),
    );

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from_stream(body))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// File names in `dir`, empty when the directory does not exist.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}
