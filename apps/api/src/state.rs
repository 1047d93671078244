use std::sync::Arc;

use crate::propagation::Propagator;
use crate::store::SkillRecordStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Repository seam. `PgSkillStore` in production.
    pub store: Arc<dyn SkillRecordStore>,
    /// Owns the per-user read-model tables; shares `store`.
    pub propagator: Arc<Propagator>,
}
