//! Notification ingestion routes.
//!
//! Submission is idempotent at creation: a duplicate `id` is rejected
//! before anything is enqueued. Persist-then-enqueue is not transactional;
//! if the enqueue fails the record stays `pending` and the caller gets a
//! failure envelope.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use pushline_common::envelope::Envelope;
use pushline_common::error::AppError;
use pushline_common::types::{PushMessage, PushProvider, PushRecord};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", post(submit_notification))
        .route("/api/notifications/{id}", get(get_notification))
}

/// Inbound submission payload.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitNotification {
    pub id: String,
    pub title: String,
    pub body: String,
    pub token: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub data: Option<HashMap<String, String>>,
    #[serde(default)]
    pub provider: PushProvider,
}

impl SubmitNotification {
    /// Validate required fields (non-empty after trim) and produce the
    /// queue payload.
    pub fn into_message(self) -> Result<PushMessage, AppError> {
        let id = self.id.trim().to_string();
        let title = self.title.trim().to_string();
        let body = self.body.trim().to_string();
        let token = self.token.trim().to_string();

        for (field, value) in [
            ("id", &id),
            ("title", &title),
            ("body", &body),
            ("token", &token),
        ] {
            if value.is_empty() {
                return Err(AppError::Validation(format!("{field} must not be empty")));
            }
        }

        Ok(PushMessage {
            id,
            title,
            body,
            token,
            image: self.image,
            url: self.url,
            data: self.data,
            provider: self.provider,
        })
    }
}

/// POST /api/notifications — Accept a notification for delivery.
async fn submit_notification(
    State(state): State<AppState>,
    Json(req): Json<SubmitNotification>,
) -> Result<Json<Envelope<PushRecord>>, AppError> {
    let msg = req.into_message()?;

    let record = state.store.insert_pending(&msg).await?;
    state.queue.push(&msg).await?;

    tracing::info!(id = %record.id, "Notification accepted");
    Ok(Json(Envelope::ok(record, "notification accepted")))
}

/// GET /api/notifications/:id — Delivery status of a submitted notification.
async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<PushRecord>>, AppError> {
    let record = state
        .store
        .find(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification {id} not found")))?;

    Ok(Json(Envelope::ok(record, "ok")))
}
