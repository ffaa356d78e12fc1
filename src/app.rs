use std::sync::Arc;

use axum::http::Method;
use axum::routing::get;
use axum::{Json, Router};
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::docs;
use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::reports::ReportConfig;
use crate::routes::{
    auth, careers, courses, dashboard, enrollments, grades, health, instructors, persons, rbac, reports, sections,
    students, users,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub reports: Arc<ReportConfig>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, reports: ReportConfig) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            reports: Arc::new(reports),
        }
    }
}

/// Builds the router from environment configuration.
pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let report_config = ReportConfig::from_env();
    Ok(create_router(AppState::new(pool, jwt_config, report_config)))
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let openapi = docs::openapi_json();

    Router::new()
        .nest("/auth", auth::routes())
        .nest("/api", health::routes().merge(dashboard::routes()))
        .nest("/rbac", rbac::routes())
        .nest("/users", users::routes())
        .nest("/persons", persons::routes())
        .nest("/careers", careers::routes())
        .nest("/courses", courses::routes())
        .nest("/students", students::routes())
        .nest("/instructors", instructors::routes())
        .nest("/sections", sections::routes())
        .nest("/enrollments", enrollments::routes())
        .nest("/grades", grades::routes())
        .nest("/reports", reports::routes())
        .route(
            "/api-docs/openapi.json",
            get(move || {
                let openapi = Arc::clone(&openapi);
                async move { Json((*openapi).clone()) }
            }),
        )
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
