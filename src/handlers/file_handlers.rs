//! HTTP handlers for the upload and retrieval routes.
//! Bodies are streamed in both directions; storage decisions live in
//! `StorageService`.

use crate::{
    errors::AppError,
    models::stored_object::UploadResponse,
    services::storage_service::{FetchedObject, StorageService},
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::Response,
};
use futures::StreamExt;
use std::io;
use tracing::debug;

/// Multipart field carrying the uploaded file.
pub const FILE_FIELD: &str = "file";

/// Response header naming the tier that served a fetch.
pub const STORAGE_TIER_HEADER: HeaderName = HeaderName::from_static("x-storage-tier");

/// Stored files never change under an identifier.
const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// `POST /upload`: store the `file` part and return its identifier.
///
/// Parts other than `file`, and a `file` part sent without a filename, are
/// skipped.
pub async fn upload_file(
    State(service): State<StorageService>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            debug!("skipping multipart field {:?}", field.name());
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            debug!("`file` field has no filename, skipping");
            continue;
        };
        let content_type = field.content_type().map(str::to_string);

        let stream = field.map(|chunk| chunk.map_err(io::Error::other));
        let stored = service
            .store_stream(&file_name, content_type, stream)
            .await?;

        return Ok(Json(UploadResponse::from(&stored)));
    }

    Err(AppError::bad_request("No file uploaded"))
}

/// `GET /file/{identifier}`: stream the file from the first tier that has it.
pub async fn get_file(
    State(service): State<StorageService>,
    Path(identifier): Path<String>,
) -> Result<Response, AppError> {
    let fetched = service.open(&identifier).await?;
    debug!(
        identifier = %fetched.identifier,
        tier = fetched.tier.as_str(),
        "serving file"
    );

    let mut headers = HeaderMap::new();
    set_file_headers(&mut headers, &fetched);

    let mut response = Response::new(Body::from_stream(fetched.body));
    *response.status_mut() = StatusCode::OK;
    *response.headers_mut() = headers;
    Ok(response)
}

fn set_file_headers(headers: &mut HeaderMap, fetched: &FetchedObject) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&fetched.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    if let Some(length) = fetched.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(IMMUTABLE_CACHE_CONTROL),
    );
    headers.insert(
        STORAGE_TIER_HEADER,
        HeaderValue::from_static(fetched.tier.as_str()),
    );
}
