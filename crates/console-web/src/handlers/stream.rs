//! Raw upload / download endpoints

use crate::{error::ApiError, AppState};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose, Engine as _};
use console_core::{ObjectUpload, StorageError};
use futures::TryStreamExt;
use http_body_util::LengthLimitError;
use serde::Deserialize;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Query parameters of the download endpoint
#[derive(Debug, Default, Deserialize)]
pub struct DownloadParams {
    #[serde(default)]
    pub token: String,
}

/// PUT /upload/{bucket}/{*object}
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Path((bucket, object)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<StatusCode, ApiError> {
    let auth = state
        .web
        .verifier()
        .authorize(&headers)
        .ok_or(ApiError::InvalidToken)?;

    let declared_size = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let received = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&received);
    let stream = body
        .into_data_stream()
        .inspect_ok(move |chunk| {
            counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
        })
        .map_err(std::io::Error::other);
    let mut upload = ObjectUpload::from_stream(Box::pin(stream));

    if let Some(size) = declared_size {
        upload = upload.with_size(size);
    }
    if let Some(content_type) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        upload = upload.with_content_type(content_type);
    }
    if let Some(md5) = headers.get("Content-MD5").and_then(|v| v.to_str().ok()) {
        upload = upload.with_expected_md5(content_md5_hex(md5)?);
    }

    let info = match state.backend.create_object(&bucket, &object, upload).await {
        Ok(info) => info,
        Err(StorageError::Io(err)) => {
            return Err(body_failure(err, declared_size, received.load(Ordering::Relaxed)))
        }
        Err(err) => return Err(err.into()),
    };
    tracing::info!(
        bucket = %bucket,
        object = %object,
        size = info.size,
        user = auth.subject(),
        "Object uploaded"
    );
    Ok(StatusCode::OK)
}

/// GET /download/{bucket}/{*object}?token=...
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path((bucket, object)): Path<(String, String)>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, ApiError> {
    state
        .web
        .verifier()
        .authorize_query_token(&params.token)
        .ok_or(ApiError::InvalidToken)?;

    let (info, stream) = state.backend.get_object(&bucket, &object).await?;

    let content_type = if info.content_type.is_empty() {
        "application/octet-stream".to_string()
    } else {
        info.content_type.clone()
    };

    let mut response = Body::from_stream(stream).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_DISPOSITION, content_disposition(&object));
    if let Ok(value) = HeaderValue::from_str(&content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(info.size));
    if let Ok(etag) = HeaderValue::from_str(&format!("\"{}\"", info.etag)) {
        headers.insert(header::ETAG, etag);
    }
    Ok(response)
}

/// Classify an I/O failure raised while the request body was streaming.
///
/// Hitting the body limit is `EntityTooLarge`; a stream that ends before the
/// declared `Content-Length` is `IncompleteBody`.
fn body_failure(err: std::io::Error, declared: Option<u64>, received: u64) -> ApiError {
    if exceeds_body_limit(&err) {
        return ApiError::BodyTooLarge;
    }
    match declared {
        Some(expected) if received < expected => {
            ApiError::Storage(StorageError::IncompleteBody { expected, received })
        }
        _ => ApiError::Storage(StorageError::Io(err)),
    }
}

fn exceeds_body_limit(err: &std::io::Error) -> bool {
    let mut source = err
        .get_ref()
        .map(|inner| inner as &(dyn std::error::Error + 'static));
    while let Some(cause) = source {
        if cause.is::<LengthLimitError>() {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Decode a base64 `Content-MD5` header into hex
fn content_md5_hex(value: &str) -> Result<String, ApiError> {
    general_purpose::STANDARD
        .decode(value.trim())
        .ok()
        .filter(|raw| raw.len() == 16)
        .map(hex::encode)
        .ok_or_else(|| {
            ApiError::Storage(StorageError::BadDigest {
                expected: value.to_string(),
                calculated: String::new(),
            })
        })
}

/// Final path segment of an object name
pub fn base_name(object: &str) -> &str {
    object.rsplit('/').next().unwrap_or(object)
}

/// Attachment hint naming only the object's base name
pub fn content_disposition(object: &str) -> HeaderValue {
    let name = base_name(object);
    let plain = format!("attachment; filename=\"{}\"", name);
    let plain_ok = name.is_ascii() && !name.contains(['"', '\\']);
    if plain_ok {
        if let Ok(value) = HeaderValue::from_str(&plain) {
            return value;
        }
    }
    let encoded = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(name)
    );
    HeaderValue::from_str(&encoded).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
