//! Access grants: which user holds which role on which entity.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;

use crate::api::{Created, MessageResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::users::{AccessRecord, User};
use crate::error::{ApiError, ApiResult};
use crate::services::activity::log_activity;

const ACCESS_SELECT: &str = "SELECT ua.id, ua.user_id, u.name AS user_name, u.email AS user_email,
        ua.role_id, r.name AS role_name, ua.entity_type, ua.entity_id,
        r.can_view, r.can_edit, r.can_delete, r.can_invite, r.can_manage_roles,
        ua.created_at
 FROM user_access ua
 JOIN users u ON u.id = ua.user_id
 JOIN roles r ON r.id = ua.role_id";

pub(crate) async fn access_records_for_user(
    pool: &PgPool,
    user_id: i32,
) -> ApiResult<Vec<AccessRecord>> {
    let records = sqlx::query_as::<_, AccessRecord>(&format!(
        "{ACCESS_SELECT} WHERE ua.user_id = $1 ORDER BY ua.id"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(records)
}

/// Master users may manage any entity; everyone else needs a manage-roles
/// grant on that specific entity.
pub(crate) async fn can_manage_entity(
    pool: &PgPool,
    user: &User,
    entity_type: &str,
    entity_id: i32,
) -> ApiResult<bool> {
    if user.is_master() {
        return Ok(true);
    }
    let found: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM user_access ua
         JOIN roles r ON r.id = ua.role_id
         WHERE ua.user_id = $1 AND ua.entity_type = $2 AND ua.entity_id = $3
           AND r.can_manage_roles = 1
         LIMIT 1",
    )
    .bind(user.id)
    .bind(entity_type)
    .bind(entity_id)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<i32>,
    pub user_id: Option<i32>,
}

pub async fn list_access(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<AccessFilter>,
) -> ApiResult<Json<Vec<AccessRecord>>> {
    let records = sqlx::query_as::<_, AccessRecord>(&format!(
        "{ACCESS_SELECT}
         WHERE ($1::text IS NULL OR ua.entity_type = $1)
           AND ($2::int IS NULL OR ua.entity_id = $2)
           AND ($3::int IS NULL OR ua.user_id = $3)
         ORDER BY ua.id"
    ))
    .bind(&filter.entity_type)
    .bind(filter.entity_id)
    .bind(filter.user_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRequest {
    pub user_id: i32,
    pub role_id: i32,
    pub entity_type: String,
    pub entity_id: i32,
}

/// Grant a role, or change the role if the user already has one on the
/// entity.
pub async fn grant_access(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<GrantRequest>,
) -> ApiResult<Created<AccessRecord>> {
    if !can_manage_entity(&state.db, &auth.user, &req.entity_type, req.entity_id).await? {
        return Err(ApiError::Forbidden(
            "You do not have permission to manage access for this entity".into(),
        ));
    }

    let existing: Option<i32> = sqlx::query_scalar(
        "SELECT id FROM user_access
         WHERE user_id = $1 AND entity_type = $2 AND entity_id = $3",
    )
    .bind(req.user_id)
    .bind(&req.entity_type)
    .bind(req.entity_id)
    .fetch_optional(&state.db)
    .await?;

    let access_id: i32 = match existing {
        Some(id) => {
            sqlx::query("UPDATE user_access SET role_id = $2 WHERE id = $1")
                .bind(id)
                .bind(req.role_id)
                .execute(&state.db)
                .await?;
            id
        }
        None => {
            sqlx::query_scalar(
                "INSERT INTO user_access (user_id, role_id, entity_type, entity_id, granted_by)
                 VALUES ($1, $2, $3, $4, $5) RETURNING id",
            )
            .bind(req.user_id)
            .bind(req.role_id)
            .bind(&req.entity_type)
            .bind(req.entity_id)
            .bind(auth.id)
            .fetch_one(&state.db)
            .await?
        }
    };

    let record = sqlx::query_as::<_, AccessRecord>(&format!(
        "{ACCESS_SELECT} WHERE ua.id = $1"
    ))
    .bind(access_id)
    .fetch_one(&state.db)
    .await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "create",
        "user_access",
        Some(access_id),
        Some(&serde_json::json!({
            "userId": req.user_id,
            "roleId": req.role_id,
            "entityType": req.entity_type,
            "entityId": req.entity_id,
        })),
    )
    .await;

    Ok(Created(record))
}

pub async fn revoke_access(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<MessageResponse> {
    #[derive(sqlx::FromRow)]
    struct GrantRow {
        entity_type: String,
        entity_id: i32,
    }

    let grant = sqlx::query_as::<_, GrantRow>(
        "SELECT entity_type, entity_id FROM user_access WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("Access record not found".into()))?;

    if !can_manage_entity(&state.db, &auth.user, &grant.entity_type, grant.entity_id).await? {
        return Err(ApiError::Forbidden(
            "You do not have permission to manage access for this entity".into(),
        ));
    }

    sqlx::query("DELETE FROM user_access WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;

    log_activity(&state.db, Some(auth.id), "delete", "user_access", Some(id), None).await;

    Ok(MessageResponse::new("Access revoked"))
}
