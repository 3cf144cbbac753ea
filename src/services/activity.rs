//! Audit-trail writes. Logging is best effort: a failed insert is reported
//! and swallowed so it can never fail the request that triggered it.

use serde_json::Value;
use sqlx::PgPool;

pub async fn log_activity(
    pool: &PgPool,
    user_id: Option<i32>,
    action: &str,
    entity_type: &str,
    entity_id: Option<i32>,
    details: Option<&Value>,
) {
    let details_json = details.map(|d| d.to_string());

    let result = sqlx::query(
        "INSERT INTO activity_log (user_id, action, entity_type, entity_id, details)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(user_id)
    .bind(action)
    .bind(entity_type)
    .bind(entity_id)
    .bind(details_json)
    .execute(pool)
    .await;

    if let Err(e) = result {
        tracing::error!(error = ?e, action = action, entity_type = entity_type, "Failed to log activity");
    }
}
