//! Service layer: the document coordinators, their collaborators, and the
//! reconciliation worker.

pub mod access;
pub mod documents;
pub mod object_store;
pub mod quota;
pub mod reconcile;

#[cfg(test)]
pub(crate) mod testutil;

use std::sync::Arc;

/// Shared router state.
#[derive(Clone)]
pub struct AppState {
    pub documents: documents::DocumentService,
    pub reconciler: reconcile::ReconcileWorker,
    pub signer: Arc<object_store::SignedUrls>,
}
