//! Represents a project membership edge used for authorization.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Role a user holds within a project.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Owner,
    Participant,
}

/// Membership of a user in a project, unique per (project, user).
///
/// Consulted only for authorization; membership rows carry no quota weight.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ProjectAccess {
    /// Unique identifier for this membership row.
    pub id: Uuid,

    /// Project the membership applies to.
    pub project_id: Uuid,

    /// Member user.
    pub user_id: Uuid,

    /// Role within the project.
    pub role: ProjectRole,
}
