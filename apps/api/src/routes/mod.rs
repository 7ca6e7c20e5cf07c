pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::resume::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/healthz", get(health::readiness_handler))
        .route("/api/health", get(health::api_health_handler))
        // Resume read path
        .route("/api/resume", get(handlers::handle_get_resume))
        .route("/api/resume/sections", get(handlers::handle_get_sections))
        // Controller-style casing used by existing site clients.
        .route("/api/Resume/sections", get(handlers::handle_get_sections))
        .route("/api/resume/skills", get(handlers::handle_get_skills))
        // Maintenance
        .route("/api/resume/reconcile", post(handlers::handle_reconcile))
        .route("/api/debug/db-stats", get(handlers::handle_db_stats))
        // Dashboard metrics
        .route(
            "/api/metrics/entries-per-year",
            get(handlers::handle_entries_per_year),
        )
        .route(
            "/api/metrics/entries-by-org",
            get(handlers::handle_entries_by_org),
        )
        .route(
            "/api/metrics/skills-by-category",
            get(handlers::handle_skills_by_category),
        )
        // Fixed dashboard feeds
        .route("/api/metrics/kpis", get(handlers::handle_kpis))
        .route("/api/metrics/velocity", get(handlers::handle_velocity))
        .route("/api/metrics/migrations", get(handlers::handle_migrations))
        .route(
            "/api/metrics/ado-migrations",
            get(handlers::handle_ado_migrations),
        )
        .route("/api/metrics/bi-coverage", get(handlers::handle_bi_coverage))
        .route(
            "/api/metrics/security-coverage",
            get(handlers::handle_security_coverage),
        )
        .route(
            "/api/metrics/skills-rolling",
            get(handlers::handle_skills_rolling),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::resume::cache::ResumeCaches;
    use crate::resume::canonical::SeedDocument;
    use crate::resume::dashboard::DashboardFixture;
    use crate::resume::handlers::ADMIN_TOKEN_HEADER;
    use crate::resume::reconcile::run_reconciliation;
    use crate::resume::store::memory::MemoryResumeStore;

    async fn seeded_state(admin_token: Option<&str>) -> (AppState, Arc<MemoryResumeStore>) {
        let store = Arc::new(MemoryResumeStore::new());
        run_reconciliation(store.as_ref(), &SeedDocument::builtin().unwrap())
            .await
            .unwrap();
        let config = Config {
            admin_token: admin_token.map(str::to_string),
            ..Config::for_tests()
        };
        let state = AppState {
            store: store.clone(),
            caches: Arc::new(ResumeCaches::new(config.cache_ttls(), None)),
            dashboard: Arc::new(DashboardFixture::builtin().unwrap()),
            config,
        };
        (state, store)
    }

    async fn send(state: AppState, req: Request<Body>) -> (StatusCode, Value) {
        let response = build_router(state).oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn reconcile(token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/api/resume/reconcile");
        if let Some(token) = token {
            builder = builder.header(ADMIN_TOKEN_HEADER, token);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_get_resume_returns_projection() {
        let (state, _) = seeded_state(None).await;
        let (status, body) = send(state, get("/api/resume")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["sectionTitle"], "Experience");
        assert_eq!(body[1]["sectionTitle"], "Education");
        let entry = &body[0]["entries"][0];
        assert_eq!(entry["organization"], "U.S. Department of the Treasury");
        assert!(entry["endDate"].is_null());
        assert_eq!(entry["bulletPoints"][0]["order"], 0);
    }

    #[tokio::test]
    async fn test_get_resume_serves_cached_copy() {
        let (state, store) = seeded_state(None).await;
        send(state.clone(), get("/api/resume")).await;

        store.set_unavailable(true);
        let (status, body) = send(state, get("/api/resume")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_store_outage_maps_to_500_and_503() {
        let (state, store) = seeded_state(None).await;
        store.set_unavailable(true);

        let (status, body) = send(state.clone(), get("/api/debug/db-stats")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "DATABASE_ERROR");

        let (status, _) = send(state, get("/healthz")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_reconcile_requires_configured_token() {
        let (state, _) = seeded_state(None).await;
        let (status, _) = send(state, reconcile(Some("anything"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (state, _) = seeded_state(Some("s3cret")).await;
        let (status, body) = send(state.clone(), reconcile(None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");

        let (status, _) = send(state, reconcile(Some("wrong"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_reconcile_with_token_is_noop_on_seeded_store() {
        let (state, _) = seeded_state(Some("s3cret")).await;
        let (status, body) = send(state, reconcile(Some("s3cret"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["committed"], false);
        assert_eq!(body["entriesUnchanged"], 1);
    }

    #[tokio::test]
    async fn test_stats_and_metrics() {
        let (state, _) = seeded_state(None).await;

        let (_, stats) = send(state.clone(), get("/api/debug/db-stats")).await;
        assert_eq!(stats["sections"], 2);
        assert_eq!(stats["entries"], 1);
        assert_eq!(stats["items"], 8);

        let (_, years) = send(state.clone(), get("/api/metrics/entries-per-year")).await;
        assert_eq!(years[0]["year"], 2022);

        let (_, orgs) = send(state.clone(), get("/api/metrics/entries-by-org")).await;
        assert_eq!(orgs[0]["count"], 1);

        let (_, categories) = send(state, get("/api/metrics/skills-by-category")).await;
        assert!(categories
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c["category"] == "Data" && c["count"] == 2));
    }

    #[tokio::test]
    async fn test_stats_served_from_cache_until_invalidated() {
        let (state, store) = seeded_state(None).await;
        let (_, before) = send(state.clone(), get("/api/debug/db-stats")).await;

        // Rows written behind the cache's back stay invisible until invalidation.
        let mut seed = SeedDocument::builtin().unwrap();
        seed.sections[0].records.clear();
        run_reconciliation(store.as_ref(), &seed).await.unwrap();
        let (_, cached) = send(state.clone(), get("/api/debug/db-stats")).await;
        assert_eq!(cached, before);

        state.caches.invalidate().await;
        let (_, fresh) = send(state, get("/api/debug/db-stats")).await;
        assert_eq!(fresh["entries"], 0);
    }

    #[tokio::test]
    async fn test_metrics_survive_store_outage_once_cached() {
        let (state, store) = seeded_state(None).await;
        send(state.clone(), get("/api/metrics/entries-per-year")).await;

        store.set_unavailable(true);
        let (status, orgs) = send(state, get("/api/metrics/entries-by-org")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(orgs[0]["org"], "U.S. Department of the Treasury");
    }

    #[tokio::test]
    async fn test_sections_endpoint_returns_stored_graph() {
        let (state, _) = seeded_state(None).await;
        for uri in ["/api/resume/sections", "/api/Resume/sections"] {
            let (status, body) = send(state.clone(), get(uri)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body[0]["sectionTitle"], "Experience");
            assert_eq!(body[0]["displayOrder"], 0);
            assert_eq!(body[0]["entries"][0]["bulletPoints"].as_array().map(Vec::len), Some(10));
            assert_eq!(body[1]["entries"].as_array().map(Vec::len), Some(0));
        }
    }

    #[tokio::test]
    async fn test_dashboard_feeds() {
        let (state, _) = seeded_state(None).await;

        let (status, kpis) = send(state.clone(), get("/api/metrics/kpis")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(kpis[0]["label"], "SLO compliance");
        assert_eq!(kpis[3]["prefix"], "$");

        let (_, velocity) = send(state.clone(), get("/api/metrics/velocity")).await;
        assert_eq!(velocity[0]["period"], "2024-Q1");

        let (_, migrations) = send(state.clone(), get("/api/metrics/migrations")).await;
        assert_eq!(migrations[2]["migrated"], 612);

        let (_, gauge) = send(state.clone(), get("/api/metrics/ado-migrations")).await;
        assert_eq!(gauge["target"], 85);

        let (_, bi) = send(state.clone(), get("/api/metrics/bi-coverage")).await;
        assert_eq!(bi.as_array().map(Vec::len), Some(2));

        let (_, security) = send(state.clone(), get("/api/metrics/security-coverage")).await;
        assert_eq!(security[4]["pct"], 68);

        let (_, rolling) = send(state, get("/api/metrics/skills-rolling")).await;
        assert_eq!(rolling[0]["skill"], "Blazor");
    }

    #[tokio::test]
    async fn test_skills_endpoint_sorted_by_category() {
        let (state, _) = seeded_state(None).await;
        let (status, body) = send(state, get("/api/resume/skills")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["category"], "Analytics");
        assert_eq!(body[0]["proficiencyLevel"], 8);
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let (state, _) = seeded_state(None).await;
        let (status, body) = send(state.clone(), get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let (status, _) = send(state, get("/healthz")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
