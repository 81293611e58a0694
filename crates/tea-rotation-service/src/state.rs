//! Application state.

use std::sync::Arc;

use tea_rotation_store::Store;

use crate::config::ServiceConfig;
use crate::engine::AssignmentEngine;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend, constructed once at startup.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Assignee selection and session commit.
    pub engine: AssignmentEngine,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        if config.jwt_secret.is_none() {
            tracing::warn!("JWT secret not configured - summarizer identity will not be recorded");
        }
        if config.admin_api_key.is_none() {
            tracing::warn!("Admin key not configured - admin endpoints are disabled");
        }

        let engine = AssignmentEngine::new(Arc::clone(&store), &config);

        Self {
            store,
            config,
            engine,
        }
    }
}
