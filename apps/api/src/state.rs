use std::sync::Arc;

use crate::config::Config;
use crate::resume::cache::ResumeCaches;
use crate::resume::dashboard::DashboardFixture;
use crate::resume::store::ResumeStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pluggable store. Default: PgResumeStore.
    pub store: Arc<dyn ResumeStore>,
    pub caches: Arc<ResumeCaches>,
    pub dashboard: Arc<DashboardFixture>,
    pub config: Config,
}
