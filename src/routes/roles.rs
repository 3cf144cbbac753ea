//! Role definitions. Any authenticated user may list them; only masters may
//! change them.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::{Created, MessageResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::users::{Role, RoleInput, User};
use crate::error::{ApiError, ApiResult};
use crate::services::activity::log_activity;

fn require_master(user: &User) -> ApiResult<()> {
    if user.is_master() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Only master users can manage roles".into()))
    }
}

pub async fn list_roles(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Role>>> {
    let roles = sqlx::query_as::<_, Role>("SELECT * FROM roles ORDER BY id")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(roles))
}

pub async fn create_role(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(input): Json<RoleInput>,
) -> ApiResult<Created<Role>> {
    require_master(&auth.user)?;
    if input.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Role name is required".into()));
    }

    let role = sqlx::query_as::<_, Role>(
        "INSERT INTO roles (name, description, can_view, can_edit, can_delete, can_invite, can_manage_roles)
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(i32::from(input.can_view))
    .bind(i32::from(input.can_edit))
    .bind(i32::from(input.can_delete))
    .bind(i32::from(input.can_invite))
    .bind(i32::from(input.can_manage_roles))
    .fetch_one(&state.db)
    .await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "create",
        "role",
        Some(role.id),
        Some(&serde_json::json!({"name": role.name})),
    )
    .await;

    Ok(Created(role))
}

pub async fn update_role(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(input): Json<RoleInput>,
) -> ApiResult<Json<Role>> {
    require_master(&auth.user)?;

    let role = sqlx::query_as::<_, Role>(
        "UPDATE roles SET name = $2, description = $3,
                can_view = $4, can_edit = $5, can_delete = $6,
                can_invite = $7, can_manage_roles = $8
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(i32::from(input.can_view))
    .bind(i32::from(input.can_edit))
    .bind(i32::from(input.can_delete))
    .bind(i32::from(input.can_invite))
    .bind(i32::from(input.can_manage_roles))
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("Role not found".into()))?;

    log_activity(&state.db, Some(auth.id), "update", "role", Some(id), None).await;

    Ok(Json(role))
}

pub async fn delete_role(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<MessageResponse> {
    require_master(&auth.user)?;

    let result = sqlx::query("DELETE FROM roles WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Role not found".into()));
    }

    log_activity(&state.db, Some(auth.id), "delete", "role", Some(id), None).await;

    Ok(MessageResponse::new("Role deleted"))
}
