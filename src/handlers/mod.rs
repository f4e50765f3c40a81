//! HTTP handlers. Thin plumbing over the service layer: they extract the
//! principal and request parameters, delegate to `DocumentService` or
//! `ReconcileWorker`, and let the error translation layer map failures.

pub mod document_handlers;
pub mod event_handlers;
pub mod health_handlers;
