use axum::{extract::State, http::HeaderMap, Json};
use subtle::ConstantTimeEq;
use tracing::info;

use crate::errors::AppError;
use crate::resume::canonical::SeedDocument;
use crate::resume::dashboard::{
    BulletGauge, CoverageItem, Kpi, MigrationPoint, SecurityCoverage, SkillUsage, VelocityQuarter,
};
use crate::resume::metrics::{load_metrics, CategorySummary, MetricsSnapshot, OrgCount, YearCount};
use crate::resume::projection::{
    load_projection, project_skills, section_graph, ResumeSectionDto, SectionGraphDto, SkillDto,
};
use crate::resume::reconcile::{run_reconciliation, ReconcileReport};
use crate::resume::store::StoreCounts;
use crate::state::AppState;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// GET /api/resume
pub async fn handle_get_resume(
    State(state): State<AppState>,
) -> Result<Json<Vec<ResumeSectionDto>>, AppError> {
    let store = state.store.as_ref();
    let projection = state
        .caches
        .projection
        .get_or_load(|| load_projection(store))
        .await?;
    Ok(Json(projection))
}

/// GET /api/resume/sections
///
/// The stored section → entry → bullet graph, unsorted by display order.
pub async fn handle_get_sections(
    State(state): State<AppState>,
) -> Result<Json<Vec<SectionGraphDto>>, AppError> {
    let sections = state.store.load_sections().await?;
    Ok(Json(section_graph(&sections)))
}

/// GET /api/resume/skills
pub async fn handle_get_skills(
    State(state): State<AppState>,
) -> Result<Json<Vec<SkillDto>>, AppError> {
    let skills = state.store.load_skills().await?;
    Ok(Json(project_skills(&skills)))
}

/// POST /api/resume/reconcile
///
/// Maintenance trigger. Requires `x-admin-token` to match `ADMIN_TOKEN`;
/// disabled entirely when no token is configured.
pub async fn handle_reconcile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ReconcileReport>, AppError> {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return Err(AppError::Forbidden);
    };
    let provided = headers
        .get(ADMIN_TOKEN_HEADER)
        .map(|v| v.as_bytes())
        .unwrap_or_default();
    if !token_matches(provided, expected) {
        return Err(AppError::Unauthorized);
    }

    let seed = SeedDocument::load(state.config.seed_path.as_deref())?;
    let report = run_reconciliation(state.store.as_ref(), &seed).await?;
    if report.committed {
        state.caches.invalidate().await;
    }
    info!("Maintenance reconciliation finished (committed: {})", report.committed);
    Ok(Json(report))
}

/// Constant time in the token contents. Only the length can leak.
fn token_matches(provided: &[u8], expected: &str) -> bool {
    bool::from(provided.ct_eq(expected.as_bytes()))
}

/// GET /api/debug/db-stats
pub async fn handle_db_stats(State(state): State<AppState>) -> Result<Json<StoreCounts>, AppError> {
    let store = state.store.as_ref();
    let counts = state.caches.stats.get_or_load(|| store.counts()).await?;
    Ok(Json(counts))
}

async fn cached_metrics(state: &AppState) -> Result<MetricsSnapshot, AppError> {
    let store = state.store.as_ref();
    state.caches.metrics.get_or_load(|| load_metrics(store)).await
}

/// GET /api/metrics/entries-per-year
pub async fn handle_entries_per_year(
    State(state): State<AppState>,
) -> Result<Json<Vec<YearCount>>, AppError> {
    Ok(Json(cached_metrics(&state).await?.entries_per_year))
}

/// GET /api/metrics/entries-by-org
pub async fn handle_entries_by_org(
    State(state): State<AppState>,
) -> Result<Json<Vec<OrgCount>>, AppError> {
    Ok(Json(cached_metrics(&state).await?.entries_by_org))
}

/// GET /api/metrics/skills-by-category
pub async fn handle_skills_by_category(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategorySummary>>, AppError> {
    Ok(Json(cached_metrics(&state).await?.skills_by_category))
}

/// GET /api/metrics/kpis
pub async fn handle_kpis(State(state): State<AppState>) -> Json<Vec<Kpi>> {
    Json(state.dashboard.kpis.clone())
}

/// GET /api/metrics/velocity
pub async fn handle_velocity(State(state): State<AppState>) -> Json<Vec<VelocityQuarter>> {
    Json(state.dashboard.velocity.clone())
}

/// GET /api/metrics/migrations
pub async fn handle_migrations(State(state): State<AppState>) -> Json<Vec<MigrationPoint>> {
    Json(state.dashboard.migrations.clone())
}

/// GET /api/metrics/ado-migrations
pub async fn handle_ado_migrations(State(state): State<AppState>) -> Json<BulletGauge> {
    Json(state.dashboard.ado_migrations.clone())
}

/// GET /api/metrics/bi-coverage
pub async fn handle_bi_coverage(State(state): State<AppState>) -> Json<Vec<CoverageItem>> {
    Json(state.dashboard.bi_coverage.clone())
}

/// GET /api/metrics/security-coverage
pub async fn handle_security_coverage(
    State(state): State<AppState>,
) -> Json<Vec<SecurityCoverage>> {
    Json(state.dashboard.security_coverage.clone())
}

/// GET /api/metrics/skills-rolling
pub async fn handle_skills_rolling(State(state): State<AppState>) -> Json<Vec<SkillUsage>> {
    Json(state.dashboard.skills_rolling.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_matches_exact_bytes_only() {
        assert!(token_matches(b"s3cret", "s3cret"));
        assert!(!token_matches(b"s3creT", "s3cret"));
        assert!(!token_matches(b"s3cre", "s3cret"));
        assert!(!token_matches(b"", "s3cret"));
    }
}
