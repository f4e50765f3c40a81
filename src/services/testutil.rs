//! Shared helpers for service tests: an in-memory, migrated SQLite pool and
//! row seeding.

use chrono::Utc;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::sync::Arc;
use uuid::Uuid;

/// Fresh in-memory database with the schema applied. A single connection so
/// every query sees the same in-memory file.
pub(crate) async fn memory_pool() -> Arc<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    for stmt in include_str!("../../migrations/0001_init.sql")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        sqlx::query(stmt).execute(&pool).await.expect("apply migration");
    }
    Arc::new(pool)
}

pub(crate) async fn seed_user(db: &SqlitePool, login_prefix: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, login, password_hash) VALUES (?, ?, ?)")
        .bind(id)
        .bind(format!("{}-{}", login_prefix, id))
        .bind("x")
        .execute(db)
        .await
        .expect("seed user");
    id
}

pub(crate) async fn seed_project(db: &SqlitePool, owner_id: Uuid, size_limit_bytes: i64) -> Uuid {
    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO projects (id, name, description, owner_id, total_size_bytes, size_limit_bytes, created_at, updated_at)
         VALUES (?, ?, NULL, ?, 0, ?, ?, ?)",
    )
    .bind(id)
    .bind(format!("project-{}", id))
    .bind(owner_id)
    .bind(size_limit_bytes)
    .bind(now)
    .bind(now)
    .execute(db)
    .await
    .expect("seed project");
    id
}

pub(crate) async fn seed_participant(db: &SqlitePool, project_id: Uuid, user_id: Uuid) {
    sqlx::query(
        "INSERT INTO project_access (id, project_id, user_id, role) VALUES (?, ?, ?, 'participant')",
    )
    .bind(Uuid::new_v4())
    .bind(project_id)
    .bind(user_id)
    .execute(db)
    .await
    .expect("seed membership");
}

pub(crate) async fn project_total(db: &SqlitePool, project_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT total_size_bytes FROM projects WHERE id = ?")
        .bind(project_id)
        .fetch_one(db)
        .await
        .expect("read project total")
}

pub(crate) async fn set_uploaded_at(db: &SqlitePool, doc_id: Uuid, rfc3339: &str) {
    sqlx::query("UPDATE documents SET uploaded_at = ? WHERE id = ?")
        .bind(rfc3339)
        .bind(doc_id)
        .execute(db)
        .await
        .expect("set uploaded_at");
}
