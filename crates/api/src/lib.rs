//! Producer-side API server.
//!
//! This is the HTTP surface that creates domain entities and, in the same transaction,
//! stages the outbox events those entities imply. The relay engine (the `relay` crate) is a
//! separate process from this one; the two share nothing but the database and the `outbox`
//! table's contract.

pub mod config;
pub mod error;
pub mod routes;

use axum::Router;
use axum::http::HeaderValue;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the application router. `cors_origin` of `"*"` allows any origin; otherwise it is
/// parsed as a single allowed origin header value.
pub fn create_router(pool: PgPool, cors_origin: &str) -> Router {
    let cors = if cors_origin == "*" {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origin = cors_origin
            .parse::<HeaderValue>()
            .unwrap_or_else(|_| panic!("invalid CORS_ALLOWED_ORIGIN: {cors_origin}"));
        CorsLayer::new().allow_origin(origin).allow_methods(Any).allow_headers(Any)
    };

    Router::new()
        .merge(routes::health::routes())
        .merge(routes::widgets::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(pool)
}

/// Run the API server. Blocks until the listener is closed.
pub async fn run_api(pool: PgPool, config: &config::Config) -> anyhow::Result<()> {
    let app = create_router(pool, &config.cors_allowed_origin);
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("API server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
