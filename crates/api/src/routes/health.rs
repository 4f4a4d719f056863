//! Health check endpoint.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use sqlx::PgPool;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}

/// Returns 200 OK if the server and database are healthy, 503 otherwise.
async fn health_check(State(pool): State<PgPool>) -> Response {
    let db_status = match sqlx::query("SELECT 1").fetch_one(&pool).await {
        Ok(_) => "healthy",
        Err(e) => {
            tracing::error!("database health check failed: {e}");
            "unhealthy"
        }
    };

    let response = HealthResponse {
        status: if db_status == "healthy" { "ok" } else { "degraded" }.to_string(),
        database: db_status.to_string(),
    };

    let status_code = if db_status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response)).into_response()
}

pub fn routes() -> Router<PgPool> {
    Router::new().route("/health", get(health_check))
}
