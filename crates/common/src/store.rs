//! Notification record store — persisted lifecycle state for every
//! submitted notification.
//!
//! Ownership is split: the ingestion API is the only writer that creates
//! records, the delivery worker is the only writer that mutates
//! `status`/`retry_count` afterwards. The store is not transactionally
//! coupled to the queue, so callers must tolerate a missing record.

use sqlx::PgPool;

use crate::error::AppError;
use crate::types::{DeliveryStatus, PushMessage, PushRecord};

/// Postgres-backed store for [`PushRecord`] rows.
#[derive(Clone)]
pub struct NotificationStore {
    pool: PgPool,
}

impl NotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a fresh record with status `pending`.
    ///
    /// A duplicate `id` surfaces as [`AppError::Conflict`] — submission is
    /// idempotent at creation time.
    pub async fn insert_pending(&self, msg: &PushMessage) -> Result<PushRecord, AppError> {
        let record: PushRecord = sqlx::query_as(
            r#"
            INSERT INTO push_notifications (id, title, body, token, status, retry_count)
            VALUES ($1, $2, $3, $4, 'pending', 0)
            RETURNING *
            "#,
        )
        .bind(&msg.id)
        .bind(&msg.title)
        .bind(&msg.body)
        .bind(&msg.token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let err = AppError::from(e);
            if err.is_unique_violation() {
                AppError::Conflict(format!("Notification {} already exists", msg.id))
            } else {
                err
            }
        })?;

        tracing::info!(id = %record.id, "Notification record created");
        Ok(record)
    }

    pub async fn find(&self, id: &str) -> Result<Option<PushRecord>, AppError> {
        let record: Option<PushRecord> =
            sqlx::query_as("SELECT * FROM push_notifications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(record)
    }

    /// Set the final status of an attempt. Returns `false` when no record
    /// exists for `id` (the queue message is then the only trace left).
    pub async fn set_status(&self, id: &str, status: DeliveryStatus) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE push_notifications SET status = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark an attempt failed and advance the retry count in one statement,
    /// so status and count never diverge under a crash between them.
    /// Returns the new retry count, or `None` when the record is missing.
    pub async fn fail_and_bump_retry(&self, id: &str) -> Result<Option<i32>, AppError> {
        let count: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE push_notifications
            SET status = 'failed', retry_count = retry_count + 1, updated_at = now()
            WHERE id = $1
            RETURNING retry_count
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(count) = count {
            tracing::info!(id = %id, retry_count = count, "Retry count advanced");
        } else {
            tracing::warn!(id = %id, "Record not found for retry increment");
        }
        Ok(count)
    }
}
