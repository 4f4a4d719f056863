//! Demo domain entity: a `widget`, created by a business use-case that stages an outbox
//! event in the very same transaction (§4.1's "same transaction as your write" contract).
//!
//! `widget` plays the role the source system's `CreateUser` use case plays: a producer that
//! opens one transaction, writes its own row, calls the producer facade, and commits or
//! rolls back both writes together. It carries no other business meaning.

use crate::error::ApiError;
use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use outbox_core::{DestinationType, NewEvent};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateWidgetRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct WidgetResponse {
    pub id: Uuid,
    pub name: String,
}

/// Create a widget and stage a `widget.created` event in the same transaction.
///
/// On success both rows are durable: the widget and an outbox row in `PENDING`. On any
/// failure the transaction rolls back and neither exists — see
/// `outbox_producer::stage`'s atomicity contract.
async fn create_widget(
    State(pool): State<PgPool>,
    Json(req): Json<CreateWidgetRequest>,
) -> Result<(StatusCode, Json<WidgetResponse>), ApiError> {
    let mut txn = pool.begin().await?;

    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO widgets (id, name) VALUES ($1, $2)")
        .bind(id)
        .bind(&req.name)
        .execute(&mut *txn)
        .await?;

    let event = NewEvent::new(
        "widget.created",
        DestinationType::TaskQueue,
        json!({ "id": id, "name": req.name }),
    )
    .map_err(outbox_core::StageError::Serialize)?;

    outbox_producer::stage(&mut txn, event).await?;

    txn.commit().await?;

    Ok((StatusCode::CREATED, Json(WidgetResponse { id, name: req.name })))
}

pub fn routes() -> Router<PgPool> {
    Router::new().route("/widgets", post(create_widget))
}
