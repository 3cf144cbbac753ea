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
use crate::domain::entities::{LotSubgroup, LotSubgroupInput};
use crate::error::{ApiError, ApiResult};
use crate::services::activity::log_activity;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgroupFilter {
    pub lot_id: Option<i32>,
}

pub async fn list_subgroups(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<SubgroupFilter>,
) -> ApiResult<Json<Vec<LotSubgroup>>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_view()?;

    let subgroups = match filter.lot_id {
        Some(lot_id) => {
            sqlx::query_as::<_, LotSubgroup>(
                "SELECT * FROM lot_subgroups WHERE lot_id = $1 ORDER BY sort_order, id",
            )
            .bind(lot_id)
            .fetch_all(&state.db)
            .await?
        }
        None => {
            sqlx::query_as::<_, LotSubgroup>("SELECT * FROM lot_subgroups ORDER BY sort_order, id")
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(Json(subgroups))
}

pub async fn create_subgroup(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(input): Json<LotSubgroupInput>,
) -> ApiResult<Created<LotSubgroup>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    let subgroup = sqlx::query_as::<_, LotSubgroup>(
        "INSERT INTO lot_subgroups (lot_id, name, description, sort_order)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(input.lot_id)
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(input.sort_order.unwrap_or(0))
    .fetch_one(&state.db)
    .await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "create",
        "lot_subgroup",
        Some(subgroup.id),
        Some(&serde_json::json!({"name": subgroup.name})),
    )
    .await;

    Ok(Created(subgroup))
}

pub async fn update_subgroup(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(input): Json<LotSubgroupInput>,
) -> ApiResult<Json<LotSubgroup>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    let subgroup = sqlx::query_as::<_, LotSubgroup>(
        "UPDATE lot_subgroups SET lot_id = $2, name = $3, description = $4,
                sort_order = COALESCE($5, sort_order), updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(input.lot_id)
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(input.sort_order)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("Subgroup not found".into()))?;

    log_activity(
        &state.db,
        Some(auth.id),
        "update",
        "lot_subgroup",
        Some(id),
        Some(&serde_json::json!({"name": subgroup.name})),
    )
    .await;

    Ok(Json(subgroup))
}

pub async fn delete_subgroup(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<MessageResponse> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_delete()?;

    let result = sqlx::query("DELETE FROM lot_subgroups WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Subgroup not found".into()));
    }

    log_activity(
        &state.db,
        Some(auth.id),
        "delete",
        "lot_subgroup",
        Some(id),
        None,
    )
    .await;

    Ok(MessageResponse::new("Subgroup deleted"))
}
