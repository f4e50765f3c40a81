//! src/services/quota.rs
//!
//! Maintains a project's cached byte total against its configured ceiling.
//! Checks are optimistic snapshots; two concurrent uploads to a near-full
//! project can both pass and transiently overshoot the limit, which the
//! reconciliation worker later corrects. `apply_delta` is the only mutator
//! of the cached total outside that worker.

use crate::models::project::Project;
use crate::services::documents::{DocError, DocResult};
use chrono::Utc;
use sqlx::{Executor, Sqlite};
use uuid::Uuid;

/// Reject a projected total that would exceed the project's ceiling.
pub fn check_projected(project: &Project, projected_total: i64) -> DocResult<()> {
    if projected_total > project.size_limit_bytes {
        return Err(DocError::ProjectLimitExceeded);
    }
    Ok(())
}

/// Check whether `incoming_bytes` fits under the ceiling given the presently
/// cached total. Optimistic: no lock is taken between check and commit.
pub fn check_and_reserve(project: &Project, incoming_bytes: i64) -> DocResult<()> {
    check_projected(project, project.total_size_bytes + incoming_bytes)
}

/// Adjust the cached total by `delta` bytes, floored at zero.
pub async fn apply_delta<'e, E>(executor: E, project_id: Uuid, delta: i64) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE projects
         SET total_size_bytes = MAX(total_size_bytes + ?, 0), updated_at = ?
         WHERE id = ?",
    )
    .bind(delta)
    .bind(Utc::now())
    .bind(project_id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Overwrite the cached total with an authoritative value, floored at zero.
/// Reserved for the reconciliation worker, which trusts the object-store
/// listing as ground truth.
pub async fn recompute_absolute<'e, E>(
    executor: E,
    project_id: Uuid,
    authoritative_total: i64,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE projects SET total_size_bytes = MAX(?, 0), updated_at = ? WHERE id = ?",
    )
    .bind(authoritative_total)
    .bind(Utc::now())
    .bind(project_id)
    .execute(executor)
    .await?;
    Ok(())
}
