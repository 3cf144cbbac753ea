use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::{Created, MessageResponse};
use crate::app::AppState;
use crate::auth::permissions::load_permissions;
use crate::auth::RequireAuth;
use crate::domain::entities::{Approval, ApprovalInput};
use crate::error::{ApiError, ApiResult};
use crate::services::activity::log_activity;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalFilter {
    pub stage_id: Option<i32>,
}

pub async fn list_approvals(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ApprovalFilter>,
) -> ApiResult<Json<Vec<Approval>>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_view()?;

    let approvals = match filter.stage_id {
        Some(stage_id) => {
            sqlx::query_as::<_, Approval>(
                "SELECT * FROM approvals WHERE stage_id = $1 ORDER BY sort_order, id",
            )
            .bind(stage_id)
            .fetch_all(&state.db)
            .await?
        }
        None => {
            sqlx::query_as::<_, Approval>("SELECT * FROM approvals ORDER BY sort_order, id")
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(Json(approvals))
}

pub async fn create_approval(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(input): Json<ApprovalInput>,
) -> ApiResult<Created<Approval>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    let approval = sqlx::query_as::<_, Approval>(
        "INSERT INTO approvals (stage_id, name, approval_number, status, sort_order)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(input.stage_id)
    .bind(input.name.trim())
    .bind(&input.approval_number)
    .bind(&input.status)
    .bind(input.sort_order.unwrap_or(0))
    .fetch_one(&state.db)
    .await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "create",
        "approval",
        Some(approval.id),
        Some(&serde_json::json!({"name": approval.name})),
    )
    .await;

    Ok(Created(approval))
}

pub async fn update_approval(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(input): Json<ApprovalInput>,
) -> ApiResult<Json<Approval>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    let approval = sqlx::query_as::<_, Approval>(
        "UPDATE approvals SET stage_id = $2, name = $3, approval_number = $4, status = $5,
                sort_order = COALESCE($6, sort_order), updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(input.stage_id)
    .bind(input.name.trim())
    .bind(&input.approval_number)
    .bind(&input.status)
    .bind(input.sort_order)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("Approval not found".into()))?;

    log_activity(
        &state.db,
        Some(auth.id),
        "update",
        "approval",
        Some(id),
        Some(&serde_json::json!({"name": approval.name})),
    )
    .await;

    Ok(Json(approval))
}

pub async fn delete_approval(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<MessageResponse> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_delete()?;

    let result = sqlx::query("DELETE FROM approvals WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Approval not found".into()));
    }

    log_activity(&state.db, Some(auth.id), "delete", "approval", Some(id), None).await;

    Ok(MessageResponse::new("Approval deleted"))
}
