//! Represents a document (uploaded file) belonging to a project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A single uploaded document within a project.
///
/// `object_key` is the document's stable address in the object store; the
/// blob's lifetime is bound to this row except during the narrow compensation
/// windows inside the coordinators. `filename` is only a display name and is
/// never used for addressing.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Document {
    /// Unique identifier for this document.
    pub id: Uuid,

    /// Owning project.
    pub project_id: Uuid,

    /// Display filename as declared by the uploader.
    pub filename: String,

    /// Unique object-store key, shaped `projects/{project_id}/{token}-{name}`.
    pub object_key: String,

    /// Payload size in bytes.
    pub size_bytes: i64,

    /// Uploading user; NULL once that user is removed.
    pub uploaded_by: Option<Uuid>,

    /// When the current content was uploaded (updated on replace).
    pub uploaded_at: DateTime<Utc>,
}
