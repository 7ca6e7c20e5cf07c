use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use folio::config::Config;
use folio::db::{create_pool, run_migrations};
use folio::resume::cache::ResumeCaches;
use folio::resume::canonical::SeedDocument;
use folio::resume::dashboard::DashboardFixture;
use folio::resume::reconcile::run_reconciliation;
use folio::resume::store::{PgResumeStore, ResumeStore};
use folio::routes::build_router;
use folio::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Folio API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL and bring the schema up to date
    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;
    let store: Arc<dyn ResumeStore> = Arc::new(PgResumeStore::new(db));

    // Initialize read caches (Redis when configured)
    let redis = config
        .redis_url
        .as_deref()
        .map(redis::Client::open)
        .transpose()?;
    let ttls = config.cache_ttls();
    info!(
        "Read caches: {} (ttl resume {}s, stats {}s, metrics {}s)",
        if redis.is_some() { "redis" } else { "in-process" },
        ttls.projection,
        ttls.stats,
        ttls.metrics
    );
    let caches = Arc::new(ResumeCaches::new(ttls, redis));

    // Reconcile stored resume data with the canonical seed
    if config.reconcile_on_startup {
        let seed = SeedDocument::load(config.seed_path.as_deref())?;
        info!(
            "Reconciling against seed v{} ({})",
            seed.version,
            config
                .seed_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "built-in".to_string())
        );
        let report = run_reconciliation(store.as_ref(), &seed).await?;
        if report.committed {
            caches.invalidate().await;
        }
    } else {
        info!("Startup reconciliation disabled");
    }

    let dashboard = Arc::new(DashboardFixture::builtin()?);

    // Build app state
    let state = AppState {
        store,
        caches,
        dashboard,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to the site origin once it is configurable

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
