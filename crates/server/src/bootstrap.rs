//! Application assembly.
//!
//! Bootstrap order matters: config, database, migrations, outlet seed,
//! catalogue load, then the tool router and HTTP router. A failure in
//! any step aborts startup with an actionable error.

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::HeaderValue;
use axum::http::Method;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use kopi_agent::{
    CalculatorTool, DialogueOrchestrator, OutletsTool, ProductCatalogue, ProductSummarizer,
    ProductsTool, ToolRouter,
};
use kopi_core::config::{AppConfig, ConfigError, LoadOptions};
use kopi_core::{MetricsCollector, PlannerAction, RuleBasedPlanner};
use kopi_db::{
    connect_with_settings, fixtures, migrations, DbPool, MemoryStore, OutletRepository,
    RepositoryError, SqlMemoryStore, SqlOutletRepository,
};
use secrecy::ExposeSecret;

use crate::state::AppState;
use crate::{chat, conversations, health, metrics_api, rate_limit, request_id, tools_api};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub router: Router,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("outlet seeding failed: {0}")]
    Seed(#[source] RepositoryError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let outlet_repo: Arc<dyn OutletRepository> =
        Arc::new(SqlOutletRepository::new(db_pool.clone()));
    let seeded = fixtures::seed_outlets_if_empty(outlet_repo.as_ref())
        .await
        .map_err(BootstrapError::Seed)?;
    if seeded > 0 {
        info!(
            event_name = "system.bootstrap.outlets_seeded",
            correlation_id = "bootstrap",
            seeded,
            "outlet directory seeded"
        );
    }

    let store: Arc<dyn MemoryStore> = Arc::new(SqlMemoryStore::new(db_pool.clone()));
    let metrics = Arc::new(MetricsCollector::new());
    let catalogue = Arc::new(ProductCatalogue::load(
        &config.catalogue.index_path,
        &config.catalogue.metadata_path,
    ));
    let summarizer = config.summarizer.enabled().then(|| {
        let api_key = config
            .summarizer
            .api_key
            .as_ref()
            .map(|key| key.expose_secret().to_string())
            .unwrap_or_default();
        Arc::new(ProductSummarizer::new(
            api_key.into(),
            config.summarizer.base_url.clone(),
            config.summarizer.model.clone(),
            Duration::from_secs(config.summarizer.timeout_secs),
        ))
    });

    let products = Arc::new(ProductsTool::new(Arc::clone(&catalogue), summarizer.clone()));
    let outlets = Arc::new(OutletsTool::new(Arc::clone(&outlet_repo)));

    let mut tool_router = ToolRouter::new();
    tool_router.register(PlannerAction::CallCalculator, Box::new(CalculatorTool));
    tool_router.register(
        PlannerAction::CallProducts,
        Box::new(ProductsTool::new(Arc::clone(&catalogue), summarizer)),
    );
    tool_router.register(
        PlannerAction::CallOutlets,
        Box::new(OutletsTool::new(Arc::clone(&outlet_repo))),
    );

    let orchestrator = Arc::new(DialogueOrchestrator::new(
        Arc::clone(&store),
        Arc::new(RuleBasedPlanner::new()),
        tool_router,
        Arc::clone(&metrics),
    ));

    let state = AppState {
        orchestrator,
        store,
        metrics,
        products,
        outlets,
        db_pool: db_pool.clone(),
    };
    let router = build_router(state, &config);

    info!(
        event_name = "system.bootstrap.complete",
        correlation_id = "bootstrap",
        planner = "rule_based",
        summarizer_enabled = config.summarizer.enabled(),
        "application bootstrap complete"
    );

    Ok(Application { config, db_pool, router })
}

pub fn build_router(state: AppState, config: &AppConfig) -> Router {
    let limiter = Arc::new(rate_limit::RateLimiter::new(config.rate_limit.clone()));

    let cors = cors_layer(&config.server.cors_allowed_origins);

    Router::new()
        .route("/chat", post(chat::handle))
        .route("/health", get(health::health))
        .route("/metrics", get(metrics_api::snapshot))
        .route("/conversations", get(conversations::list))
        .route(
            "/conversations/{id}",
            get(conversations::show).delete(conversations::remove),
        )
        .route("/tools/calculator", post(tools_api::calculate))
        .route("/tools/products", get(tools_api::products))
        .route("/products", get(tools_api::products))
        .route("/tools/outlets", get(tools_api::outlets))
        .with_state(state)
        .layer(middleware::from_fn_with_state(limiter, rate_limit::enforce))
        .layer(middleware::from_fn(request_id::propagate))
        .layer(cors)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any)
}
