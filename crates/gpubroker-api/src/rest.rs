//! REST API handlers

use axum::{
    extract::{Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use gpubroker_core::{ApiConfig, BrokerError, Lease, Slot};
use gpubroker_pool::ResourcePool;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::debug;

use crate::error::ApiError;

/// Application state shared across handlers
pub struct AppState {
    pub pool: Arc<ResourcePool>,
}

/// Create the API router.
///
/// Paths outside `/api` fall through to the dashboard directory when one is
/// configured. A panicking handler yields a 500 for that request only.
pub fn create_router(pool: Arc<ResourcePool>, config: &ApiConfig) -> Router {
    let state = Arc::new(AppState { pool });

    let mut router = Router::new()
        .route("/api/status", get(get_status))
        .route("/api/claim", post(claim))
        .route("/api/release", post(release))
        .with_state(state);

    if let Some(dir) = &config.dashboard_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    if config.cors_enabled {
        router = router.layer(cors_layer(&config.cors_origins));
    }

    router
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    }
}

/// `?user_id=` query parameter
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

impl UserQuery {
    fn require_user(self) -> Result<String, ApiError> {
        match self.user_id {
            Some(user_id) if !user_id.is_empty() => Ok(user_id),
            _ => Err(BrokerError::BadRequest("user_id required".to_string()).into()),
        }
    }
}

/// Get the state of every GPU slot
async fn get_status(State(state): State<Arc<AppState>>) -> Json<Vec<Slot>> {
    Json(state.pool.snapshot().await)
}

/// Claim a GPU for a user
async fn claim(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Lease>, ApiError> {
    let user_id = query.require_user()?;
    debug!(user_id = %user_id, "Claim requested");

    let lease = state.pool.claim(&user_id).await?;
    Ok(Json(lease))
}

/// Release a user's GPU
async fn release(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<StatusCode, ApiError> {
    let user_id = query.require_user()?;
    debug!(user_id = %user_id, "Release requested");

    state.pool.release(&user_id).await?;
    Ok(StatusCode::OK)
}
