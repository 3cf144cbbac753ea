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
use crate::domain::entities::{Precinct, PrecinctInput};
use crate::error::{ApiError, ApiResult};
use crate::services::activity::log_activity;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecinctFilter {
    pub project_id: Option<i32>,
}

pub async fn list_precincts(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<PrecinctFilter>,
) -> ApiResult<Json<Vec<Precinct>>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_view()?;

    let precincts = match filter.project_id {
        Some(project_id) => {
            sqlx::query_as::<_, Precinct>(
                "SELECT * FROM precincts WHERE project_id = $1 ORDER BY sort_order, id",
            )
            .bind(project_id)
            .fetch_all(&state.db)
            .await?
        }
        None => {
            sqlx::query_as::<_, Precinct>("SELECT * FROM precincts ORDER BY sort_order, id")
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(Json(precincts))
}

pub async fn create_precinct(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(input): Json<PrecinctInput>,
) -> ApiResult<Created<Precinct>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    let precinct = sqlx::query_as::<_, Precinct>(
        "INSERT INTO precincts (project_id, name, description, sort_order)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(input.project_id)
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(input.sort_order.unwrap_or(0))
    .fetch_one(&state.db)
    .await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "create",
        "precinct",
        Some(precinct.id),
        Some(&serde_json::json!({"name": precinct.name})),
    )
    .await;

    Ok(Created(precinct))
}

pub async fn update_precinct(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(input): Json<PrecinctInput>,
) -> ApiResult<Json<Precinct>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    let precinct = sqlx::query_as::<_, Precinct>(
        "UPDATE precincts SET project_id = $2, name = $3, description = $4,
                sort_order = COALESCE($5, sort_order), updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(input.project_id)
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(input.sort_order)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("Precinct not found".into()))?;

    log_activity(
        &state.db,
        Some(auth.id),
        "update",
        "precinct",
        Some(id),
        Some(&serde_json::json!({"name": precinct.name})),
    )
    .await;

    Ok(Json(precinct))
}

pub async fn delete_precinct(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<MessageResponse> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_delete()?;

    let result = sqlx::query("DELETE FROM precincts WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Precinct not found".into()));
    }

    log_activity(&state.db, Some(auth.id), "delete", "precinct", Some(id), None).await;

    Ok(MessageResponse::new("Precinct deleted"))
}
