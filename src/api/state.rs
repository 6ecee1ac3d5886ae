//! Application state for the HTTP routes.

use std::sync::Arc;

use crate::db::Database;

/// Shared application state.
pub struct AppState<D: Database> {
    db: Arc<D>,
}

// Manual Clone impl - only the Arc is cloned, D need not be Clone
impl<D: Database> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}

impl<D: Database> AppState<D> {
    pub fn new(db: Arc<D>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &D {
        &self.db
    }
}
