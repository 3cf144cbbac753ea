//! Land budget views. A stage view returns that stage's line items plus the
//! lot area summed from its lots; a precinct view adds per-stage breakdowns.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::{Created, MessageResponse};
use crate::app::AppState;
use crate::auth::permissions::load_permissions;
use crate::auth::RequireAuth;
use crate::domain::land_budget::{category_catalogue, Category, LandBudgetItem, LandBudgetItemInput};
use crate::error::{ApiError, ApiResult};
use crate::services::activity::log_activity;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetQuery {
    pub stage_id: Option<i32>,
    pub precinct_id: Option<i32>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
struct StageSummary {
    id: i32,
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StageBudget {
    mode: &'static str,
    items: Vec<LandBudgetItem>,
    categories: Vec<Category>,
    lot_area_sqm: Decimal,
    lot_area_ha: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrecinctBudget {
    mode: &'static str,
    items: Vec<LandBudgetItem>,
    categories: Vec<Category>,
    stages: Vec<StageSummary>,
    stage_data: BTreeMap<i32, Vec<LandBudgetItem>>,
    lot_area_sqm: Decimal,
    lot_area_ha: Decimal,
}

pub async fn get_land_budget(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(query): Query<BudgetQuery>,
) -> ApiResult<Response> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_view()?;

    if let Some(stage_id) = query.stage_id {
        let items = sqlx::query_as::<_, LandBudgetItem>(
            "SELECT * FROM land_budget_items WHERE stage_id = $1 ORDER BY sort_order, id",
        )
        .bind(stage_id)
        .fetch_all(&state.db)
        .await?;

        let lot_area_sqm: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(area), 0) FROM lots WHERE stage_id = $1",
        )
        .bind(stage_id)
        .fetch_one(&state.db)
        .await?;

        return Ok(Json(StageBudget {
            mode: "stage",
            items,
            categories: category_catalogue(),
            lot_area_sqm,
            lot_area_ha: lot_area_sqm / dec!(10000),
        })
        .into_response());
    }

    if let Some(precinct_id) = query.precinct_id {
        let items = sqlx::query_as::<_, LandBudgetItem>(
            "SELECT * FROM land_budget_items WHERE precinct_id = $1 ORDER BY sort_order, id",
        )
        .bind(precinct_id)
        .fetch_all(&state.db)
        .await?;

        let stages = sqlx::query_as::<_, StageSummary>(
            "SELECT id, name FROM stages WHERE precinct_id = $1 ORDER BY sort_order, id",
        )
        .bind(precinct_id)
        .fetch_all(&state.db)
        .await?;

        let stage_items = sqlx::query_as::<_, LandBudgetItem>(
            "SELECT i.* FROM land_budget_items i
             JOIN stages s ON s.id = i.stage_id
             WHERE s.precinct_id = $1
             ORDER BY i.sort_order, i.id",
        )
        .bind(precinct_id)
        .fetch_all(&state.db)
        .await?;

        let mut stage_data: BTreeMap<i32, Vec<LandBudgetItem>> = BTreeMap::new();
        for item in stage_items {
            if let Some(stage_id) = item.stage_id {
                stage_data.entry(stage_id).or_default().push(item);
            }
        }

        let lot_area_sqm: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(l.area), 0) FROM lots l
             JOIN stages s ON s.id = l.stage_id
             WHERE s.precinct_id = $1",
        )
        .bind(precinct_id)
        .fetch_one(&state.db)
        .await?;

        return Ok(Json(PrecinctBudget {
            mode: "precinct",
            items,
            categories: category_catalogue(),
            stages,
            stage_data,
            lot_area_sqm,
            lot_area_ha: lot_area_sqm / dec!(10000),
        })
        .into_response());
    }

    Err(ApiError::BadRequest("stageId or precinctId is required".into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecinctItemRequest {
    pub precinct_id: i32,
    #[serde(flatten)]
    pub item: LandBudgetItemInput,
}

/// Upsert keyed on (precinct, category, subcategory). NULL subcategories
/// compare equal here, hence IS NOT DISTINCT FROM.
pub async fn upsert_precinct_item(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<PrecinctItemRequest>,
) -> ApiResult<Response> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    if req.item.category.trim().is_empty() {
        return Err(ApiError::BadRequest("Category is required".into()));
    }

    let existing = sqlx::query_as::<_, LandBudgetItem>(
        "UPDATE land_budget_items
         SET area_ha = $4, custom_name = COALESCE($5, custom_name), updated_at = now()
         WHERE precinct_id = $1 AND category = $2
           AND subcategory IS NOT DISTINCT FROM $3
         RETURNING *",
    )
    .bind(req.precinct_id)
    .bind(req.item.category.trim())
    .bind(&req.item.subcategory)
    .bind(req.item.area_ha)
    .bind(&req.item.custom_name)
    .fetch_optional(&state.db)
    .await?;

    if let Some(item) = existing {
        log_activity(
            &state.db,
            Some(auth.id),
            "update",
            "land_budget_item",
            Some(item.id),
            Some(&serde_json::json!({"category": item.category})),
        )
        .await;
        return Ok(Json(item).into_response());
    }

    let item = sqlx::query_as::<_, LandBudgetItem>(
        "INSERT INTO land_budget_items
            (precinct_id, category, subcategory, custom_name, area_ha, is_custom, sort_order)
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(req.precinct_id)
    .bind(req.item.category.trim())
    .bind(&req.item.subcategory)
    .bind(&req.item.custom_name)
    .bind(req.item.area_ha)
    .bind(i32::from(req.item.is_custom.unwrap_or(false)))
    .bind(req.item.sort_order.unwrap_or(0))
    .fetch_one(&state.db)
    .await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "create",
        "land_budget_item",
        Some(item.id),
        Some(&serde_json::json!({"category": item.category})),
    )
    .await;

    Ok(Created(item).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageItemsRequest {
    pub stage_id: i32,
    pub items: Vec<LandBudgetItemInput>,
}

/// Bulk upsert of a stage's worksheet. Rows without an area are only written
/// if they already exist, so blank cells do not create noise.
pub async fn save_stage_items(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<StageItemsRequest>,
) -> ApiResult<Json<Vec<LandBudgetItem>>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    let mut tx = state.db.begin().await?;
    let mut saved = Vec::with_capacity(req.items.len());

    for input in &req.items {
        if input.category.trim().is_empty() {
            continue;
        }

        let updated = sqlx::query_as::<_, LandBudgetItem>(
            "UPDATE land_budget_items
             SET area_ha = $4, custom_name = COALESCE($5, custom_name), updated_at = now()
             WHERE stage_id = $1 AND category = $2
               AND subcategory IS NOT DISTINCT FROM $3
             RETURNING *",
        )
        .bind(req.stage_id)
        .bind(input.category.trim())
        .bind(&input.subcategory)
        .bind(input.area_ha)
        .bind(&input.custom_name)
        .fetch_optional(&mut *tx)
        .await?;

        match updated {
            Some(item) => saved.push(item),
            None => {
                if input.area_ha.is_none() {
                    continue;
                }
                let item = sqlx::query_as::<_, LandBudgetItem>(
                    "INSERT INTO land_budget_items
                        (stage_id, category, subcategory, custom_name, area_ha, is_custom, sort_order)
                     VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
                )
                .bind(req.stage_id)
                .bind(input.category.trim())
                .bind(&input.subcategory)
                .bind(&input.custom_name)
                .bind(input.area_ha)
                .bind(i32::from(input.is_custom.unwrap_or(false)))
                .bind(input.sort_order.unwrap_or(0))
                .fetch_one(&mut *tx)
                .await?;
                saved.push(item);
            }
        }
    }

    tx.commit().await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "update",
        "land_budget",
        Some(req.stage_id),
        Some(&serde_json::json!({"items": saved.len()})),
    )
    .await;

    Ok(Json(saved))
}

pub async fn delete_item(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<MessageResponse> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_delete()?;

    let item = sqlx::query_as::<_, LandBudgetItem>(
        "SELECT * FROM land_budget_items WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("Budget item not found".into()))?;

    if item.is_custom == 0 {
        return Err(ApiError::BadRequest(
            "Cannot delete default categories".into(),
        ));
    }

    sqlx::query("DELETE FROM land_budget_items WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "delete",
        "land_budget_item",
        Some(id),
        Some(&serde_json::json!({"category": item.category})),
    )
    .await;

    Ok(MessageResponse::new("Budget item removed"))
}
