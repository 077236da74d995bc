//! Shared application state

use crate::auth::Authorizer;
use barback::Orchestrator;
use std::sync::Arc;

/// State shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Backup/restore orchestrator (owns the registry and the broadcaster)
    pub orchestrator: Orchestrator,
    /// Authorization gate for API calls
    pub authorizer: Arc<dyn Authorizer>,
}
