//! Data models for the project document store.
//!
//! These entities represent projects, their documents, and the membership
//! edges used for authorization. They map cleanly to database tables via
//! `sqlx::FromRow` and serialize naturally as JSON via `serde`.

pub mod access;
pub mod document;
pub mod event;
pub mod project;
