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
use crate::domain::entities::{Lot, LotInput, LotPatch};
use crate::error::{ApiError, ApiResult};
use crate::services::activity::log_activity;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotFilter {
    pub stage_id: Option<i32>,
}

pub async fn list_lots(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<LotFilter>,
) -> ApiResult<Json<Vec<Lot>>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_view()?;

    let lots = match filter.stage_id {
        Some(stage_id) => {
            sqlx::query_as::<_, Lot>(
                "SELECT * FROM lots WHERE stage_id = $1 ORDER BY sort_order, id",
            )
            .bind(stage_id)
            .fetch_all(&state.db)
            .await?
        }
        None => {
            sqlx::query_as::<_, Lot>("SELECT * FROM lots ORDER BY sort_order, id")
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(Json(lots))
}

pub async fn get_lot(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Lot>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_view()?;

    let lot = sqlx::query_as::<_, Lot>("SELECT * FROM lots WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Lot not found".into()))?;

    Ok(Json(lot))
}

pub async fn create_lot(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(input): Json<LotInput>,
) -> ApiResult<Created<Lot>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    if input.lot_number.trim().is_empty() {
        return Err(ApiError::BadRequest("Lot number is required".into()));
    }

    let lot = sqlx::query_as::<_, Lot>(
        "INSERT INTO lots (stage_id, lot_number, address, area, frontage, depth,
                street_name, status, price, price_per_sqm, custom_data, sort_order)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING *",
    )
    .bind(input.stage_id)
    .bind(input.lot_number.trim())
    .bind(&input.address)
    .bind(input.area)
    .bind(input.frontage)
    .bind(input.depth)
    .bind(&input.street_name)
    .bind(&input.status)
    .bind(input.price)
    .bind(input.price_per_sqm)
    .bind(&input.custom_data)
    .bind(input.sort_order.unwrap_or(0))
    .fetch_one(&state.db)
    .await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "create",
        "lot",
        Some(lot.id),
        Some(&serde_json::json!({"lotNumber": lot.lot_number})),
    )
    .await;

    Ok(Created(lot))
}

/// Partial update: absent fields are left untouched. Serves both PUT and
/// PATCH on /lots/:id.
pub async fn update_lot(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(patch): Json<LotPatch>,
) -> ApiResult<Json<Lot>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    let lot = sqlx::query_as::<_, Lot>(
        "UPDATE lots SET
            lot_number = COALESCE($2, lot_number),
            address = COALESCE($3, address),
            area = COALESCE($4, area),
            frontage = COALESCE($5, frontage),
            depth = COALESCE($6, depth),
            street_name = COALESCE($7, street_name),
            status = COALESCE($8, status),
            price = COALESCE($9, price),
            price_per_sqm = COALESCE($10, price_per_sqm),
            custom_data = COALESCE($11, custom_data),
            sort_order = COALESCE($12, sort_order),
            updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&patch.lot_number)
    .bind(&patch.address)
    .bind(patch.area)
    .bind(patch.frontage)
    .bind(patch.depth)
    .bind(&patch.street_name)
    .bind(&patch.status)
    .bind(patch.price)
    .bind(patch.price_per_sqm)
    .bind(&patch.custom_data)
    .bind(patch.sort_order)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("Lot not found".into()))?;

    log_activity(
        &state.db,
        Some(auth.id),
        "update",
        "lot",
        Some(id),
        Some(&serde_json::json!({"lotNumber": lot.lot_number})),
    )
    .await;

    Ok(Json(lot))
}

pub async fn delete_lot(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<MessageResponse> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_delete()?;

    let lot = sqlx::query_as::<_, Lot>("SELECT * FROM lots WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Lot not found".into()))?;

    sqlx::query("DELETE FROM lots WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "delete",
        "lot",
        Some(id),
        Some(&serde_json::json!({"lotNumber": lot.lot_number})),
    )
    .await;

    Ok(MessageResponse::new("Lot deleted"))
}
