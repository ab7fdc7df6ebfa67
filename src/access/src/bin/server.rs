//! # Access Control HTTP Server
//!
//! HTTP surface for the Casebook access-control engine, used by route
//! guards and navigation rendering in the embedding application.
//!
//! ## Endpoints
//!
//! - `POST /v1/check` - Decision with its reason (internal diagnostics)
//! - `POST /v1/guard` - 204 / 401 / 403 / 503 without a reason
//! - `POST /v1/menu` - Filtered navigation catalog
//! - `POST /v1/invalidate/:subject_id` - Drop a subject's cached grants
//! - `POST /v1/reload` - Re-read the policy table file
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics (separate port)
//!
//! ## Configuration
//!
//! See [`casebook_access::ServerConfig`]; `RUST_LOG` sets the log level
//! (default: info).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    serve, Router,
};
use casebook_access::{
    config::{load_grant_seed, IdentityDirectoryConfig},
    AccessError, AccessService, CheckOutcome, EngineConfig, GrantSource, GuardOutcome,
    IdentityResolver, InMemoryGrantSource, ResolutionEngine, ResourceNode, RoleClassPolicyTable,
    ServerConfig,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Shared application state
#[derive(Clone)]
struct AppState {
    service: AccessService,
    config: Arc<ServerConfig>,
    start_time: std::time::Instant,
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

/// Application error type
#[derive(Debug)]
enum AppError {
    Unauthenticated,
    Config(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "subject could not be resolved".to_string(),
            ),
            AppError::Config(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_config", msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Unauthenticated(_) => AppError::Unauthenticated,
            AccessError::InvalidConfig(msg) => AppError::Config(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Check / guard request body
#[derive(Debug, Deserialize)]
struct CheckRequest {
    subject_id: String,
    resource: String,
    #[serde(default)]
    action: Option<String>,
}

/// Menu request body
#[derive(Debug, Deserialize)]
struct MenuRequest {
    subject_id: String,
    catalog: ResourceNode,
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    version: String,
}

/// Metrics response (Prometheus format)
struct MetricsResponse {
    metrics: String,
}

impl IntoResponse for MetricsResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            self.metrics,
        )
            .into_response()
    }
}

/// POST /v1/check - Decision with reason
async fn check(
    State(state): State<AppState>,
    Json(req): Json<CheckRequest>,
) -> Result<Json<CheckOutcome>, AppError> {
    let outcome = state
        .service
        .check(&req.subject_id, &req.resource, req.action.as_deref())
        .await?;

    info!(
        "Access check: subject={} resource={} -> {} ({})",
        req.subject_id,
        req.resource,
        if outcome.allowed { "ALLOW" } else { "DENY" },
        outcome.reason
    );

    Ok(Json(outcome))
}

/// POST /v1/guard - Route guard outcome without the reason
async fn guard(State(state): State<AppState>, Json(req): Json<CheckRequest>) -> Response {
    let outcome = state
        .service
        .guard(&req.subject_id, &req.resource, req.action.as_deref())
        .await;

    let (status, error) = match outcome {
        GuardOutcome::Proceed => return StatusCode::NO_CONTENT.into_response(),
        GuardOutcome::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
        GuardOutcome::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
        GuardOutcome::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
    };

    (status, Json(serde_json::json!({ "error": error }))).into_response()
}

/// POST /v1/menu - Filtered catalog
async fn menu(
    State(state): State<AppState>,
    Json(req): Json<MenuRequest>,
) -> Result<Json<ResourceNode>, AppError> {
    let menu = state.service.menu(&req.subject_id, &req.catalog).await?;
    Ok(Json(menu))
}

/// POST /v1/invalidate/:subject_id - Drop cached grants
async fn invalidate(State(state): State<AppState>, Path(subject_id): Path<String>) -> StatusCode {
    state.service.invalidate(&subject_id);
    StatusCode::NO_CONTENT
}

/// A policy file that cannot be read or parsed is a configuration problem
fn policy_file_error(err: AccessError) -> AppError {
    match err {
        AccessError::Io(e) => AppError::Config(format!("policy file unreadable: {}", e)),
        other => other.into(),
    }
}

/// POST /v1/reload - Re-read the policy table
async fn reload(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    let policy = state
        .config
        .load_policy_config()
        .map_err(policy_file_error)?;
    state.service.reload_policies(&policy)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /health - Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        version: casebook_access::VERSION.to_string(),
    })
}

/// GET /metrics - Prometheus metrics endpoint
async fn metrics(State(state): State<AppState>) -> MetricsResponse {
    let engine = state.service.engine();
    let cache = engine.cache_stats();

    let mut metrics = format!(
        "# HELP access_uptime_seconds Server uptime in seconds\n\
         # TYPE access_uptime_seconds gauge\n\
         access_uptime_seconds {}\n\
         \n\
         # HELP access_grant_cache_entries Cached subjects\n\
         # TYPE access_grant_cache_entries gauge\n\
         access_grant_cache_entries {}\n\
         \n\
         # HELP access_grant_cache_hits_total Grant cache hits\n\
         # TYPE access_grant_cache_hits_total counter\n\
         access_grant_cache_hits_total {}\n\
         \n\
         # HELP access_grant_cache_misses_total Grant cache misses\n\
         # TYPE access_grant_cache_misses_total counter\n\
         access_grant_cache_misses_total {}\n\
         \n",
        state.start_time.elapsed().as_secs(),
        cache.entries,
        cache.hits,
        cache.misses,
    );

    if let Some(collector) = engine.metrics() {
        metrics.push_str(&collector.export_prometheus());
    }

    MetricsResponse { metrics }
}

/// Create the HTTP router with all endpoints
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/v1/check", post(check))
        .route("/v1/guard", post(guard))
        .route("/v1/menu", post(menu))
        .route("/v1/invalidate/:subject_id", post(invalidate))
        .route("/v1/reload", post(reload))
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(trace).layer(cors))
        .with_state(state)
}

/// Create the metrics router
fn create_metrics_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Pick the grant source: PostgreSQL when configured, otherwise the seed file
async fn grant_source(config: &ServerConfig) -> anyhow::Result<Arc<dyn GrantSource>> {
    #[cfg(feature = "postgres")]
    if let Some(url) = &config.database_url {
        info!("Using PostgreSQL grant source");
        let source = casebook_access::grant::PostgresGrantSource::new(url).await?;
        return Ok(Arc::new(source));
    }

    #[cfg(not(feature = "postgres"))]
    if config.database_url.is_some() {
        tracing::warn!("DATABASE_URL set but the postgres feature is disabled; using in-memory grants");
    }

    let rows = match &config.grants_file {
        Some(path) => load_grant_seed(path)?,
        None => Vec::new(),
    };
    info!("Using in-memory grant source with {} rows", rows.len());
    Ok(Arc::new(InMemoryGrantSource::with_rows(rows)))
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Starting graceful shutdown");
}

/// Main server entrypoint
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Casebook Access Server v{}", casebook_access::VERSION);

    let config = ServerConfig::from_env();
    info!("Configuration:");
    info!("  Port: {}", config.port);
    info!("  Metrics Port: {}", config.metrics_port);
    info!("  Grant cache TTL: {:?}", config.cache.ttl);
    info!("  Grant fetch timeout: {:?}", config.cache.fetch_timeout);

    let policy = config.load_policy_config()?;
    let table = RoleClassPolicyTable::from_config(&policy)?;

    let identity_store = match &config.subjects_file {
        Some(path) => IdentityDirectoryConfig::from_file(path)?.into_store(),
        None => IdentityDirectoryConfig::default().into_store(),
    };

    let source = grant_source(&config).await?;
    let engine = Arc::new(ResolutionEngine::with_config(
        table,
        source,
        EngineConfig {
            cache_config: config.cache.clone(),
            enable_metrics: true,
        },
    ));
    let service = AccessService::new(IdentityResolver::new(Arc::new(identity_store)), engine);

    let state = AppState {
        service,
        config: Arc::new(config.clone()),
        start_time: std::time::Instant::now(),
    };

    let app = create_router(state.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let metrics_app = create_metrics_router(state);
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));

    info!("Starting HTTP server on {}", addr);
    info!("Starting metrics server on {}", metrics_addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr).await?;

    let server = serve(listener, app.into_make_service()).with_graceful_shutdown(shutdown_signal());
    let metrics_server =
        serve(metrics_listener, metrics_app.into_make_service()).with_graceful_shutdown(shutdown_signal());

    tokio::try_join!(
        async {
            server.await.map_err(|e| {
                error!("HTTP server error: {}", e);
                e
            })
        },
        async {
            metrics_server.await.map_err(|e| {
                error!("Metrics server error: {}", e);
                e
            })
        }
    )?;

    info!("Servers shut down gracefully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use casebook_access::config::PolicyConfig;

    #[test]
    fn test_missing_policy_file_is_unprocessable() {
        let err = PolicyConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, AccessError::Io(_)));

        let response = policy_file_error(err).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_malformed_policy_file_is_unprocessable() {
        let err = PolicyConfig::from_json("{ not json").unwrap_err();

        let response = policy_file_error(err).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_unauthenticated_maps_to_401() {
        let response = AppError::from(AccessError::Unauthenticated("unknown".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
