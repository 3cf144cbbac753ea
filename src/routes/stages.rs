//! Stages carry the registration/settlement timeline. The *_actual flags
//! mark a date as confirmed rather than forecast.

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
use crate::domain::entities::{Stage, StageInput};
use crate::error::{ApiError, ApiResult};
use crate::services::activity::log_activity;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageFilter {
    pub precinct_id: Option<i32>,
}

pub async fn list_stages(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<StageFilter>,
) -> ApiResult<Json<Vec<Stage>>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_view()?;

    let stages = match filter.precinct_id {
        Some(precinct_id) => {
            sqlx::query_as::<_, Stage>(
                "SELECT * FROM stages WHERE precinct_id = $1 ORDER BY sort_order, id",
            )
            .bind(precinct_id)
            .fetch_all(&state.db)
            .await?
        }
        None => {
            sqlx::query_as::<_, Stage>("SELECT * FROM stages ORDER BY sort_order, id")
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(Json(stages))
}

pub async fn create_stage(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(input): Json<StageInput>,
) -> ApiResult<Created<Stage>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    let stage = sqlx::query_as::<_, Stage>(
        "INSERT INTO stages (precinct_id, name, description,
                registration_date, registration_date_actual,
                settlement_date, settlement_date_actual, sort_order)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
    )
    .bind(input.precinct_id)
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(input.registration_date)
    .bind(input.registration_date_actual.map(i32::from).unwrap_or(0))
    .bind(input.settlement_date)
    .bind(input.settlement_date_actual.map(i32::from).unwrap_or(0))
    .bind(input.sort_order.unwrap_or(0))
    .fetch_one(&state.db)
    .await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "create",
        "stage",
        Some(stage.id),
        Some(&serde_json::json!({"name": stage.name})),
    )
    .await;

    Ok(Created(stage))
}

pub async fn update_stage(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(input): Json<StageInput>,
) -> ApiResult<Json<Stage>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    // dates are set as provided (clearing is allowed); flags keep their
    // previous value when absent
    let stage = sqlx::query_as::<_, Stage>(
        "UPDATE stages SET precinct_id = $2, name = $3, description = $4,
                registration_date = $5,
                registration_date_actual = COALESCE($6, registration_date_actual),
                settlement_date = $7,
                settlement_date_actual = COALESCE($8, settlement_date_actual),
                sort_order = COALESCE($9, sort_order),
                updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(input.precinct_id)
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(input.registration_date)
    .bind(input.registration_date_actual.map(i32::from))
    .bind(input.settlement_date)
    .bind(input.settlement_date_actual.map(i32::from))
    .bind(input.sort_order)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("Stage not found".into()))?;

    log_activity(
        &state.db,
        Some(auth.id),
        "update",
        "stage",
        Some(id),
        Some(&serde_json::json!({"name": stage.name})),
    )
    .await;

    Ok(Json(stage))
}

pub async fn delete_stage(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<MessageResponse> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_delete()?;

    let result = sqlx::query("DELETE FROM stages WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Stage not found".into()));
    }

    log_activity(&state.db, Some(auth.id), "delete", "stage", Some(id), None).await;

    Ok(MessageResponse::new("Stage deleted"))
}
