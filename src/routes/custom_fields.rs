//! User-defined lot columns. Deletes are soft so historical lot data keyed
//! by field_key stays interpretable; re-creating a key reactivates it.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::{Created, MessageResponse};
use crate::app::AppState;
use crate::auth::permissions::load_permissions;
use crate::auth::RequireAuth;
use crate::domain::activity::CustomField;
use crate::error::{ApiError, ApiResult};
use crate::services::activity::log_activity;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldFilter {
    pub entity_type: Option<String>,
}

pub async fn list_custom_fields(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<CustomFieldFilter>,
) -> ApiResult<Json<Vec<CustomField>>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_view()?;

    let fields = match &filter.entity_type {
        Some(entity_type) => {
            sqlx::query_as::<_, CustomField>(
                "SELECT * FROM custom_fields
                 WHERE entity_type = $1 AND is_active = 1
                 ORDER BY sort_order, id",
            )
            .bind(entity_type)
            .fetch_all(&state.db)
            .await?
        }
        None => {
            sqlx::query_as::<_, CustomField>(
                "SELECT * FROM custom_fields ORDER BY entity_type, sort_order, id",
            )
            .fetch_all(&state.db)
            .await?
        }
    };

    Ok(Json(fields))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldInput {
    pub entity_type: String,
    pub field_key: String,
    pub field_label: String,
    #[serde(default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

pub async fn create_custom_field(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(input): Json<CustomFieldInput>,
) -> ApiResult<Response> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    if input.field_key.trim().is_empty() || input.field_label.trim().is_empty() {
        return Err(ApiError::BadRequest("Field key and label are required".into()));
    }

    let existing: Option<i32> = sqlx::query_scalar(
        "SELECT id FROM custom_fields WHERE entity_type = $1 AND field_key = $2",
    )
    .bind(&input.entity_type)
    .bind(input.field_key.trim())
    .fetch_optional(&state.db)
    .await?;

    // same key again means reactivate, not duplicate
    let response = match existing {
        Some(id) => {
            let field = sqlx::query_as::<_, CustomField>(
                "UPDATE custom_fields SET is_active = 1, field_label = $2,
                        field_type = COALESCE($3, field_type),
                        sort_order = COALESCE($4, sort_order)
                 WHERE id = $1 RETURNING *",
            )
            .bind(id)
            .bind(input.field_label.trim())
            .bind(&input.field_type)
            .bind(input.sort_order)
            .fetch_one(&state.db)
            .await?;
            Json(field).into_response()
        }
        None => {
            let field = sqlx::query_as::<_, CustomField>(
                "INSERT INTO custom_fields (entity_type, field_key, field_label, field_type, sort_order)
                 VALUES ($1, $2, $3, $4, $5) RETURNING *",
            )
            .bind(&input.entity_type)
            .bind(input.field_key.trim())
            .bind(input.field_label.trim())
            .bind(input.field_type.as_deref().unwrap_or("text"))
            .bind(input.sort_order.unwrap_or(0))
            .fetch_one(&state.db)
            .await?;
            Created(field).into_response()
        }
    };

    log_activity(
        &state.db,
        Some(auth.id),
        "create",
        "custom_field",
        None,
        Some(&serde_json::json!({"fieldKey": input.field_key.trim()})),
    )
    .await;

    Ok(response)
}

pub async fn delete_custom_field(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<MessageResponse> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    let result = sqlx::query("UPDATE custom_fields SET is_active = 0 WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Custom field not found".into()));
    }

    log_activity(&state.db, Some(auth.id), "delete", "custom_field", Some(id), None).await;

    Ok(MessageResponse::new("Custom field removed"))
}
