use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::api::PaginationParams;
use crate::app::AppState;
use crate::auth::permissions::load_permissions;
use crate::auth::RequireAuth;
use crate::domain::activity::ActivityEntry;
use crate::error::{ApiError, ApiResult};

/// Newest-first audit trail. Visible to masters and to anyone who can invite
/// users (company admins).
pub async fn list_activity(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<Vec<ActivityEntry>>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    if !perms.is_master && !perms.can_invite {
        return Err(ApiError::Forbidden(
            "You do not have permission to view the activity log".into(),
        ));
    }

    let entries = sqlx::query_as::<_, ActivityEntry>(
        "SELECT a.id, a.user_id, u.name AS user_name, u.email AS user_email,
                a.action, a.entity_type, a.entity_id, a.details, a.created_at
         FROM activity_log a
         LEFT JOIN users u ON u.id = a.user_id
         ORDER BY a.created_at DESC
         LIMIT $1 OFFSET $2",
    )
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Json(entries))
}
