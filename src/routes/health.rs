use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database does not answer
    pub status: &'static str,
    pub db_ok: bool,
    pub db_error: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Service and database status", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => Json(HealthResponse {
            status: "ok",
            db_ok: true,
            db_error: None,
        }),
        Err(err) => {
            tracing::warn!(error = %err, "health check could not reach the database");
            Json(HealthResponse {
                status: "degraded",
                db_ok: false,
                db_error: Some(err.to_string()),
            })
        }
    }
}
