//! HTTP Handlers
//!
//! REST API endpoints for registration, login and user management.

use crate::config::AppConfig;
use crate::error::AuthError;
use crate::extractors::{AuthUser, JsonBody};
use crate::health;
use crate::middleware;
use crate::models::*;
use crate::service::AuthService;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(auth: Arc<AuthService>, config: AppConfig) -> Self {
        Self {
            auth,
            config: Arc::new(config),
        }
    }
}

// ============================================
// Route Builder
// ============================================

/// Create the application router with all layers
pub fn create_routes(state: AppState) -> Router {
    // Public routes (no authentication required)
    let public = Router::new()
        .route("/", get(root))
        .route("/api/v1/users/register", post(register))
        .route("/api/v1/users/login", post(login));

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/api/v1/users/me", get(get_current_user))
        .route("/api/v1/users", get(list_users))
        .route(
            "/api/v1/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let mut router = Router::new().merge(public).merge(protected);
    if state.config.enable_health_checks {
        router = router.merge(health::routes());
    }

    let mut router = router.with_state(state.clone());

    if state.config.enable_security_headers {
        router = middleware::with_security_headers(router);
    }
    if let Some(cors) = middleware::cors_layer(&state.config.allowed_origins) {
        router = router.layer(cors);
    }

    middleware::with_request_tracing(router)
}

// ============================================
// Service Info
// ============================================

/// GET /
pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    let config = &state.config;
    Json(serde_json::json!({
        "message": format!("Welcome to {}", config.app_name),
        "version": config.version,
        "environment": config.environment.as_str(),
        "health_check": if config.enable_health_checks {
            "/api/v1/health/ready"
        } else {
            "disabled"
        }
    }))
}

// ============================================
// Registration / Login
// ============================================

/// POST /api/v1/users/register
///
/// Register a new user account
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let user = state.auth.register(req).await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// POST /api/v1/users/login
///
/// Authenticate user and return an access token
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    req.validate()?;

    let response = state.auth.login(req).await?;

    Ok(Json(response))
}

// ============================================
// User Profile / Management
// ============================================

/// GET /api/v1/users/me
///
/// Get current user profile
pub async fn get_current_user(user: AuthUser) -> Json<UserResponse> {
    Json(UserResponse::from(user.into_inner()))
}

/// GET /api/v1/users
pub async fn list_users(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AuthError> {
    let users: Vec<UserResponse> = state
        .auth
        .list_users(params)
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();

    Ok(Json(users))
}

/// GET /api/v1/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AuthError> {
    let user = state.auth.get_user(id).await?;

    Ok(Json(UserResponse::from(user)))
}

/// PUT /api/v1/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let user = state.auth.update_user(&actor, id, req).await?;

    Ok(Json(UserResponse::from(user)))
}

/// DELETE /api/v1/users/:id
///
/// Deactivates the account; records are never removed
pub async fn delete_user(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AuthError> {
    state.auth.deactivate_user(&actor, id).await?;

    Ok(StatusCode::NO_CONTENT)
}
