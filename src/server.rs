//! # Server Configuration
//!
//! Router, shared state and OpenAPI document for the triage service.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::actions::{ActionExecutor, GitHubActionExecutor, GitHubExecutorConfig, RetryPolicy};
use crate::aggregator::MetricsAggregator;
use crate::clock::{SharedClock, SystemClock};
use crate::config::AppConfig;
use crate::handlers;
use crate::intake::IntakeService;
use crate::repositories::RuleRepository;
use crate::seeds;
use crate::telemetry::{self, TraceContext};
use crate::webhook_verification::SignatureVerifier;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub intake: IntakeService,
    pub aggregator: MetricsAggregator,
}

impl AppState {
    /// Wires the stores, verifier and executor from configuration.
    pub fn new(
        config: AppConfig,
        db: Arc<DatabaseConnection>,
        clock: SharedClock,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        let intake = IntakeService::new(
            db.clone(),
            clock.clone(),
            SignatureVerifier::new(config.webhook_github_secret.clone()),
            executor,
            RetryPolicy::from(&config.action_retry),
            config.action_dispatch,
        );
        let aggregator = MetricsAggregator::new(db.clone(), clock);

        Self {
            db,
            config: Arc::new(config),
            intake,
            aggregator,
        }
    }

    /// State backed by the system clock and the GitHub REST API.
    pub fn from_config(config: AppConfig, db: Arc<DatabaseConnection>) -> Self {
        let executor = Arc::new(GitHubActionExecutor::new(GitHubExecutorConfig::from(&config)));
        Self::new(config, db, Arc::new(SystemClock), executor)
    }
}

/// Runs each request inside a task-local trace context.
async fn trace_context_middleware(req: Request, next: Next) -> Response {
    let context = TraceContext::from_headers(req.headers());
    telemetry::with_trace_context(context, next.run(req)).await
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route(
            "/webhooks/github",
            post(handlers::webhooks::ingest_github_webhook),
        )
        .route("/rules", get(handlers::rules::list_rules))
        .route("/events", get(handlers::events::list_events))
        .route("/alerts", get(handlers::alerts::list_alerts))
        .route("/failures", get(handlers::failures::list_failures))
        .route(
            "/metrics/overview",
            get(handlers::overview::metrics_overview),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_context_middleware))
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let addr = config
        .bind_addr()
        .with_context(|| format!("Invalid server address: {}", config.api_bind_addr))?;

    let db = Arc::new(db);
    let state = AppState::from_config(config, db.clone());

    if let Some(path) = state.config.rules_file.as_deref() {
        let seeds = seeds::load_rule_seeds(path)?;
        let clock: SharedClock = Arc::new(SystemClock);
        let created = seeds::seed_rules(&RuleRepository::new(db), seeds, &clock).await?;
        tracing::info!(rules_file = path, created, "Applied rule seeds");
    }

    let profile = state.config.profile.clone();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::webhooks::ingest_github_webhook,
        crate::handlers::rules::list_rules,
        crate::handlers::events::list_events,
        crate::handlers::alerts::list_alerts,
        crate::handlers::failures::list_failures,
        crate::handlers::overview::metrics_overview,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::handlers::HealthResponse,
            crate::handlers::webhooks::WebhookAcceptResponse,
            crate::handlers::webhooks::ActionSummaryResponse,
            crate::handlers::rules::RuleInfo,
            crate::handlers::rules::RulesResponse,
            crate::handlers::events::EventInfo,
            crate::handlers::alerts::AlertInfo,
            crate::handlers::failures::FailureInfo,
            crate::aggregator::Overview,
        )
    ),
    tags(
        (name = "root", description = "Service information and health"),
        (name = "webhooks", description = "GitHub webhook intake"),
        (name = "rules", description = "Matching rules"),
        (name = "events", description = "Stored deliveries"),
        (name = "alerts", description = "Raised alerts"),
        (name = "failures", description = "Terminal action failures"),
        (name = "metrics", description = "Windowed aggregates")
    ),
    info(
        title = "Triage API",
        description = "GitHub webhook triage: rule matching, alerts and automated label/comment actions",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
