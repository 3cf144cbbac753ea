//! Invitations carry a role grant for a user who may not have an account
//! yet. Inviting an address that already has an account grants access
//! directly instead of minting a token.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, MessageResponse};
use crate::app::AppState;
use crate::auth::permissions::load_permissions;
use crate::auth::RequireAuth;
use crate::domain::users::User;
use crate::error::{ApiError, ApiResult};
use crate::services::activity::log_activity;

const INVITE_TTL_DAYS: i64 = 7;

async fn can_invite_to(
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
           AND r.can_invite = 1
         LIMIT 1",
    )
    .bind(user.id)
    .bind(entity_type)
    .bind(entity_id)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InvitationView {
    pub id: i32,
    pub email: String,
    pub token: Uuid,
    pub role_id: i32,
    pub role_name: String,
    pub entity_type: String,
    pub entity_id: i32,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<i32>,
}

pub async fn list_invitations(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<InvitationFilter>,
) -> ApiResult<Json<Vec<InvitationView>>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_invite()?;

    let invitations = sqlx::query_as::<_, InvitationView>(
        "SELECT i.id, i.email, i.token, i.role_id, r.name AS role_name,
                i.entity_type, i.entity_id, i.expires_at, i.accepted_at, i.created_at
         FROM invitations i
         JOIN roles r ON r.id = i.role_id
         WHERE ($1::text IS NULL OR i.entity_type = $1)
           AND ($2::int IS NULL OR i.entity_id = $2)
         ORDER BY i.created_at DESC",
    )
    .bind(&filter.entity_type)
    .bind(filter.entity_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(invitations))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    pub email: String,
    pub role_id: i32,
    pub entity_type: String,
    pub entity_id: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteCreated {
    pub id: i32,
    pub token: Uuid,
    pub invite_url: String,
}

pub async fn create_invitation(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<InviteRequest>,
) -> ApiResult<Response> {
    if req.email.trim().is_empty() {
        return Err(ApiError::BadRequest("Email is required".into()));
    }
    if !can_invite_to(&state.db, &auth.user, &req.entity_type, req.entity_id).await? {
        return Err(ApiError::Forbidden(
            "You do not have permission to invite users".into(),
        ));
    }

    let email = req.email.trim().to_lowercase();
    let existing_user: Option<i32> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;

    // Existing accounts get the grant immediately; no token round-trip
    if let Some(user_id) = existing_user {
        let already: Option<i32> = sqlx::query_scalar(
            "SELECT id FROM user_access
             WHERE user_id = $1 AND entity_type = $2 AND entity_id = $3",
        )
        .bind(user_id)
        .bind(&req.entity_type)
        .bind(req.entity_id)
        .fetch_optional(&state.db)
        .await?;
        if already.is_some() {
            return Err(ApiError::Conflict(
                "User already has access to this group".into(),
            ));
        }

        sqlx::query(
            "INSERT INTO user_access (user_id, role_id, entity_type, entity_id, granted_by)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user_id)
        .bind(req.role_id)
        .bind(&req.entity_type)
        .bind(req.entity_id)
        .bind(auth.id)
        .execute(&state.db)
        .await?;

        log_activity(
            &state.db,
            Some(auth.id),
            "create",
            "user_access",
            None,
            Some(&serde_json::json!({"userId": user_id, "entityType": req.entity_type, "entityId": req.entity_id})),
        )
        .await;

        return Ok(MessageResponse::new("Access granted to existing user").into_response());
    }

    let token = Uuid::new_v4();
    let id: i32 = sqlx::query_scalar(
        "INSERT INTO invitations (email, token, role_id, entity_type, entity_id, invited_by, expires_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
    )
    .bind(&email)
    .bind(token)
    .bind(req.role_id)
    .bind(&req.entity_type)
    .bind(req.entity_id)
    .bind(auth.id)
    .bind(Utc::now() + Duration::days(INVITE_TTL_DAYS))
    .fetch_one(&state.db)
    .await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "create",
        "invitation",
        Some(id),
        Some(&serde_json::json!({"email": email})),
    )
    .await;

    Ok(Created(InviteCreated {
        id,
        token,
        invite_url: format!("/invite/{token}"),
    })
    .into_response())
}

pub async fn delete_invitation(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<MessageResponse> {
    #[derive(sqlx::FromRow)]
    struct InviteRow {
        entity_type: String,
        entity_id: i32,
    }

    let invitation =
        sqlx::query_as::<_, InviteRow>("SELECT entity_type, entity_id FROM invitations WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Invitation not found".into()))?;

    if !can_invite_to(&state.db, &auth.user, &invitation.entity_type, invitation.entity_id).await? {
        return Err(ApiError::Forbidden(
            "You do not have permission to invite users".into(),
        ));
    }

    sqlx::query("DELETE FROM invitations WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;

    log_activity(&state.db, Some(auth.id), "delete", "invitation", Some(id), None).await;

    Ok(MessageResponse::new("Invitation deleted"))
}
