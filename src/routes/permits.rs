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
use crate::domain::entities::{Permit, PermitInput};
use crate::error::{ApiError, ApiResult};
use crate::services::activity::log_activity;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitFilter {
    pub stage_id: Option<i32>,
}

pub async fn list_permits(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<PermitFilter>,
) -> ApiResult<Json<Vec<Permit>>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_view()?;

    let permits = match filter.stage_id {
        Some(stage_id) => {
            sqlx::query_as::<_, Permit>(
                "SELECT * FROM permits WHERE stage_id = $1 ORDER BY sort_order, id",
            )
            .bind(stage_id)
            .fetch_all(&state.db)
            .await?
        }
        None => {
            sqlx::query_as::<_, Permit>("SELECT * FROM permits ORDER BY sort_order, id")
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(Json(permits))
}

pub async fn create_permit(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(input): Json<PermitInput>,
) -> ApiResult<Created<Permit>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    let permit = sqlx::query_as::<_, Permit>(
        "INSERT INTO permits (stage_id, name, permit_number, status, sort_order)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(input.stage_id)
    .bind(input.name.trim())
    .bind(&input.permit_number)
    .bind(&input.status)
    .bind(input.sort_order.unwrap_or(0))
    .fetch_one(&state.db)
    .await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "create",
        "permit",
        Some(permit.id),
        Some(&serde_json::json!({"name": permit.name})),
    )
    .await;

    Ok(Created(permit))
}

pub async fn update_permit(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(input): Json<PermitInput>,
) -> ApiResult<Json<Permit>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    let permit = sqlx::query_as::<_, Permit>(
        "UPDATE permits SET stage_id = $2, name = $3, permit_number = $4, status = $5,
                sort_order = COALESCE($6, sort_order), updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(input.stage_id)
    .bind(input.name.trim())
    .bind(&input.permit_number)
    .bind(&input.status)
    .bind(input.sort_order)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("Permit not found".into()))?;

    log_activity(
        &state.db,
        Some(auth.id),
        "update",
        "permit",
        Some(id),
        Some(&serde_json::json!({"name": permit.name})),
    )
    .await;

    Ok(Json(permit))
}

pub async fn delete_permit(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<MessageResponse> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_delete()?;

    let result = sqlx::query("DELETE FROM permits WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Permit not found".into()));
    }

    log_activity(&state.db, Some(auth.id), "delete", "permit", Some(id), None).await;

    Ok(MessageResponse::new("Permit deleted"))
}
