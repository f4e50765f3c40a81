//! HTTP handlers for document upload, replace, delete, listing, and
//! download links. Upload bodies are streamed into the coordinator's
//! bounded read rather than buffered by the extractor.

use crate::{
    errors::AppError,
    services::AppState,
    services::documents::sanitize_filename,
};
use axum::{
    Json,
    body::Body,
    extract::{FromRequestParts, Multipart, Path, Query, State, multipart::MultipartError},
    http::{HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use futures::StreamExt;
use serde::Deserialize;
use std::io;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Authenticated principal, resolved upstream and forwarded by the gateway
/// as an `x-user-id` header.
pub struct Principal(pub Uuid);

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .map(Principal)
            .ok_or_else(|| {
                AppError::new(
                    StatusCode::UNAUTHORIZED,
                    "missing or invalid x-user-id header",
                )
            })
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub ttl: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PresignQuery {
    pub expires: i64,
    pub signature: String,
}

/// POST `/projects/{project_id}/documents` — multipart upload.
pub async fn upload_document(
    State(state): State<AppState>,
    Principal(user_id): Principal,
    Path(project_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    while let Some(field) = next_field(&mut multipart).await? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().unwrap_or("").to_string();
        let filename = field.file_name().unwrap_or("file").to_string();
        let stream = field.map(field_chunk);

        let doc = state
            .documents
            .upload(user_id, project_id, &content_type, &filename, stream)
            .await?;
        return Ok((StatusCode::CREATED, Json(doc)).into_response());
    }
    Err(missing_file_field())
}

/// PUT `/documents/{doc_id}` — multipart replace.
pub async fn replace_document(
    State(state): State<AppState>,
    Principal(user_id): Principal,
    Path(doc_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    while let Some(field) = next_field(&mut multipart).await? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().unwrap_or("").to_string();
        let filename = field.file_name().unwrap_or("file").to_string();
        let stream = field.map(field_chunk);

        let doc = state
            .documents
            .replace(user_id, doc_id, &content_type, &filename, stream)
            .await?;
        return Ok(Json(doc).into_response());
    }
    Err(missing_file_field())
}

/// DELETE `/documents/{doc_id}` — owner-only delete.
pub async fn delete_document(
    State(state): State<AppState>,
    Principal(user_id): Principal,
    Path(doc_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.documents.delete(user_id, doc_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/projects/{project_id}/documents` — paged listing with optional
/// filename filter.
pub async fn list_documents(
    State(state): State<AppState>,
    Principal(user_id): Principal,
    Path(project_id): Path<Uuid>,
    Query(q): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = state
        .documents
        .list(user_id, project_id, q.page, q.page_size, q.q.as_deref())
        .await?;
    Ok(Json(page))
}

/// GET `/documents/{doc_id}/download` — presigned URL with clamped TTL.
pub async fn download_link(
    State(state): State<AppState>,
    Principal(user_id): Principal,
    Path(doc_id): Path<Uuid>,
    Query(q): Query<DownloadQuery>,
) -> Result<impl IntoResponse, AppError> {
    let link = state.documents.download_link(user_id, doc_id, q.ttl).await?;
    Ok(Json(link))
}

/// GET `/files/{*key}` — serve a presigned download.
///
/// No principal check here: the signature (covering key and expiry) is the
/// capability. Invalid or expired links get 403 without touching the store.
pub async fn serve_presigned(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(q): Query<PresignQuery>,
) -> Result<Response, AppError> {
    if !state
        .signer
        .verify(&key, q.expires, &q.signature, Utc::now().timestamp())
    {
        return Err(AppError::new(
            StatusCode::FORBIDDEN,
            "invalid or expired download link",
        ));
    }

    let payload = state.documents.store.get(&key).await?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(payload.reader)));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&payload.attrs.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&payload.size_bytes.max(0).to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    let disposition = format!(
        "attachment; filename=\"{}\"",
        sanitize_filename(&payload.attrs.original_filename)
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

async fn next_field<'a>(
    multipart: &'a mut Multipart,
) -> Result<Option<axum::extract::multipart::Field<'a>>, AppError> {
    multipart
        .next_field()
        .await
        .map_err(|err| AppError::new(StatusCode::BAD_REQUEST, err.to_string()))
}

fn missing_file_field() -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "missing `file` multipart field")
}

fn field_chunk(chunk: Result<bytes::Bytes, MultipartError>) -> io::Result<bytes::Bytes> {
    chunk.map_err(io::Error::other)
}
