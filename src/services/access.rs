//! src/services/access.rs
//!
//! Read-only authorization checks: whether a principal may touch a project
//! at all (owner or invited member) and whether they may perform owner-only
//! operations such as delete.

use crate::models::access::ProjectAccess;
use crate::models::project::Project;
use crate::services::documents::{DocError, DocResult};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Fetch a project or fail with `NotFound`.
pub async fn fetch_project(db: &SqlitePool, project_id: Uuid) -> DocResult<Project> {
    sqlx::query_as::<_, Project>(
        "SELECT id, name, description, owner_id, total_size_bytes, size_limit_bytes,
                created_at, updated_at
         FROM projects WHERE id = ?",
    )
    .bind(project_id)
    .fetch_one(db)
    .await
    .map_err(|err| match err {
        sqlx::Error::RowNotFound => DocError::NotFound,
        other => DocError::Metadata(other),
    })
}

/// Resolve the project and require that `user_id` may read and write it.
///
/// Access is granted to the owner and to any user holding a membership row;
/// everyone else gets `NoAccess`.
pub async fn ensure_access(db: &SqlitePool, project_id: Uuid, user_id: Uuid) -> DocResult<Project> {
    let project = fetch_project(db, project_id).await?;
    if project.owner_id == user_id {
        return Ok(project);
    }

    let membership: Option<ProjectAccess> = sqlx::query_as(
        "SELECT id, project_id, user_id, role FROM project_access
         WHERE project_id = ? AND user_id = ?",
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(db)
    .await
    .map_err(DocError::Metadata)?;

    if membership.is_none() {
        return Err(DocError::NoAccess);
    }
    Ok(project)
}

/// Require strict owner identity, for owner-only operations.
pub fn ensure_owner(user_id: Uuid, project: &Project) -> DocResult<()> {
    if project.owner_id != user_id {
        return Err(DocError::NoAccess);
    }
    Ok(())
}
