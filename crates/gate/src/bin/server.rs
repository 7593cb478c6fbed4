//! Moderail Gate Server
//!
//! HTTP front for the moderation engine. The transport is a thin adapter:
//! every core guarantee (interception, latency stamping, failsafe) lives in
//! the engine, not here.

use anyhow::Context;
use axum::error_handling::HandleErrorLayer;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower::buffer::BufferLayer;
use tower::limit::RateLimitLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use moderail_gate::{
    ModerationEngine, ModerationRequest, ModerationResult, Rule, RuleStore,
};

/// Application state
struct AppState {
    engine: ModerationEngine,
    store: Arc<RuleStore>,
}

#[derive(Debug, serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    rules: usize,
}

#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = Arc::new(RuleStore::new());

    // Optional YAML seed, e.g. MODERAIL_RULES=deploy/rules.yaml
    if let Ok(path) = std::env::var("MODERAIL_RULES") {
        let yaml = std::fs::read_to_string(&path)
            .with_context(|| format!("reading rule file {path}"))?;
        let count = store
            .load_yaml(&yaml)
            .with_context(|| format!("loading rule file {path}"))?;
        tracing::info!(count, path, "seeded rules");
    }

    let state = Arc::new(AppState {
        engine: ModerationEngine::new(store.clone()),
        store,
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/moderate", post(moderate))
        .route("/rules", get(list_rules).post(upsert_rule))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|err: BoxError| async move {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Unhandled internal error: {err}"),
                    )
                }))
                .layer(BufferLayer::new(1024))
                .layer(RateLimitLayer::new(
                    1000,
                    std::time::Duration::from_secs(60),
                )),
        )
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3002".to_string());
    let addr = format!("0.0.0.0:{port}");

    tracing::info!("Moderail gate server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        rules: state.store.len(),
    })
}

async fn moderate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ModerationRequest>,
) -> Json<ModerationResult> {
    Json(state.engine.moderate(request).await)
}

async fn list_rules(State(state): State<Arc<AppState>>) -> Json<Vec<Rule>> {
    Json(state.store.all())
}

async fn upsert_rule(
    State(state): State<Arc<AppState>>,
    Json(rule): Json<Rule>,
) -> Result<Json<Rule>, (StatusCode, Json<ErrorResponse>)> {
    match state.store.upsert(rule.clone()) {
        Ok(()) => Ok(Json(rule)),
        Err(error) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: error.to_string(),
            }),
        )),
    }
}

async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.engine.metrics().export_prometheus()
}
