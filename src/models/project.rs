//! Represents a project — a named container for documents with a byte quota.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A project owned by a user, grouping uploaded documents.
///
/// `total_size_bytes` is a cached, eventually-consistent counter of the bytes
/// consumed by the project's documents. It is incremented and decremented by
/// the document coordinators and overwritten wholesale by the reconciliation
/// worker; transient divergence from the true object-store usage is expected
/// and repaired out of band.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Project {
    /// Unique identifier for this project.
    pub id: Uuid,

    /// Display name.
    pub name: String,

    /// Optional free-form description.
    pub description: Option<String>,

    /// ID of the user that owns this project.
    pub owner_id: Uuid,

    /// Cached sum of `size_bytes` over the project's documents.
    pub total_size_bytes: i64,

    /// Configured byte ceiling for the project's documents.
    pub size_limit_bytes: i64,

    /// When this project was created.
    pub created_at: DateTime<Utc>,

    /// When this project was last modified (counter bumps included).
    pub updated_at: DateTime<Utc>,
}
