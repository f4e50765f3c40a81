//! Defines routes for document, download, and internal event endpoints.
//!
//! ## Structure
//! - **Document endpoints**
//!   - `POST   /projects/{project_id}/documents` — upload a document
//!   - `GET    /projects/{project_id}/documents` — list documents (page, page_size, q)
//!   - `PUT    /documents/{doc_id}` — replace document content
//!   - `DELETE /documents/{doc_id}` — delete a document (owner only)
//!   - `GET    /documents/{doc_id}/download` — mint a presigned link
//!
//! - **Download endpoint**
//!   - `GET    /files/{*key}` — serve a presigned download (signature-checked)
//!
//! - **Internal endpoints**
//!   - `POST   /internal/storage-events` — feed change records to the reconciler
//!
//! The wildcard `*key` allows nested keys like `projects/{id}/abc-report.pdf`.

use crate::{
    handlers::{
        document_handlers::{
            delete_document, download_link, list_documents, replace_document, serve_presigned,
            upload_document,
        },
        event_handlers::ingest_storage_events,
        health_handlers::{healthz, readyz},
    },
    services::AppState,
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Build and return the router for the whole service.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // document routes
        .route(
            "/projects/{project_id}/documents",
            post(upload_document).get(list_documents),
        )
        .route(
            "/documents/{doc_id}",
            put(replace_document).delete(delete_document),
        )
        .route("/documents/{doc_id}/download", get(download_link))
        // presigned downloads
        .route("/files/{*key}", get(serve_presigned))
        // internal
        .route("/internal/storage-events", post(ingest_storage_events))
}
