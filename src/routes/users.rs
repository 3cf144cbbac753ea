//! User administration. Masters see and manage everyone; company admins
//! (manage-roles grant) manage users within their companies; everyone may
//! update their own profile.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::Created;
use crate::app::AppState;
use crate::auth::password::hash_password;
use crate::auth::permissions::load_permissions;
use crate::auth::RequireAuth;
use crate::domain::users::{AccessRecord, User, UserProfile};
use crate::error::{ApiError, ApiResult};
use crate::services::activity::log_activity;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub is_master: bool,
    pub is_active: bool,
    pub theme: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<i32>,
    pub access_list: Vec<AccessRecord>,
}

fn user_view(user: &User, access_list: Vec<AccessRecord>) -> UserView {
    // the primary company grant decorates the flat fields
    let company_grant = access_list.iter().find(|a| a.entity_type == "company");
    UserView {
        id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        is_master: user.is_master(),
        is_active: user.is_active(),
        theme: user.theme.clone(),
        last_login: user.last_login,
        created_at: user.created_at,
        role_id: company_grant.map(|a| a.role_id),
        role_name: company_grant.map(|a| a.role_name.clone()),
        company_id: company_grant.map(|a| a.entity_id),
        access_list,
    }
}

pub async fn list_users(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<UserView>>> {
    let perms = load_permissions(&state.db, &auth.user).await?;

    let users: Vec<User> = if perms.is_master {
        sqlx::query_as("SELECT * FROM users ORDER BY name")
            .fetch_all(&state.db)
            .await?
    } else {
        perms.require_manage_roles()?;
        if perms.company_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query_as(
                "SELECT DISTINCT u.* FROM users u
                 JOIN user_access ua ON ua.user_id = u.id
                 WHERE ua.entity_type = 'company' AND ua.entity_id = ANY($1)
                 ORDER BY u.name",
            )
            .bind(&perms.company_ids)
            .fetch_all(&state.db)
            .await?
        }
    };

    if users.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let user_ids: Vec<i32> = users.iter().map(|u| u.id).collect();
    let records = sqlx::query_as::<_, AccessRecord>(
        "SELECT ua.id, ua.user_id, u.name AS user_name, u.email AS user_email,
                ua.role_id, r.name AS role_name, ua.entity_type, ua.entity_id,
                r.can_view, r.can_edit, r.can_delete, r.can_invite, r.can_manage_roles,
                ua.created_at
         FROM user_access ua
         JOIN users u ON u.id = ua.user_id
         JOIN roles r ON r.id = ua.role_id
         WHERE ua.user_id = ANY($1)
         ORDER BY ua.id",
    )
    .bind(&user_ids)
    .fetch_all(&state.db)
    .await?;

    let mut by_user: HashMap<i32, Vec<AccessRecord>> = HashMap::new();
    for record in records {
        by_user.entry(record.user_id).or_default().push(record);
    }

    let views = users
        .iter()
        .map(|u| user_view(u, by_user.remove(&u.id).unwrap_or_default()))
        .collect();
    Ok(Json(views))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub is_master: bool,
    #[serde(default)]
    pub role_id: Option<i32>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity_id: Option<i32>,
}

pub async fn create_user(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<Created<UserProfile>> {
    if !auth.is_master() {
        return Err(ApiError::Forbidden(
            "Only master users can create accounts".into(),
        ));
    }
    if req.email.trim().is_empty() || req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Email and name are required".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "Password must be at least 8 characters".into(),
        ));
    }

    let email = req.email.trim().to_lowercase();
    let existing: Option<i32> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict(
            "An account with this email already exists".into(),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (email, password_hash, name, is_master)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(&email)
    .bind(&password_hash)
    .bind(req.name.trim())
    .bind(i32::from(req.is_master))
    .fetch_one(&state.db)
    .await?;

    if let (Some(role_id), Some(entity_type), Some(entity_id)) =
        (req.role_id, &req.entity_type, req.entity_id)
    {
        sqlx::query(
            "INSERT INTO user_access (user_id, role_id, entity_type, entity_id, granted_by)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id)
        .bind(role_id)
        .bind(entity_type)
        .bind(entity_id)
        .bind(auth.id)
        .execute(&state.db)
        .await?;
    }

    log_activity(
        &state.db,
        Some(auth.id),
        "create",
        "user",
        Some(user.id),
        Some(&serde_json::json!({"email": user.email})),
    )
    .await;

    Ok(Created(UserProfile::from(&user)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_master: Option<bool>,
    #[serde(default)]
    pub role_id: Option<i32>,
    #[serde(default)]
    pub company_id: Option<i32>,
}

pub async fn update_user(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserProfile>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    let is_self = auth.id == id;

    let mut can_admin = perms.is_master;
    if !can_admin && !is_self && perms.can_manage_roles && !perms.company_ids.is_empty() {
        let shares_company: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM user_access
             WHERE user_id = $1 AND entity_type = 'company' AND entity_id = ANY($2)
             LIMIT 1",
        )
        .bind(id)
        .bind(&perms.company_ids)
        .fetch_optional(&state.db)
        .await?;
        can_admin = shares_company.is_some();
    }
    if !can_admin && !is_self {
        return Err(ApiError::Forbidden(
            "You do not have permission to update this user".into(),
        ));
    }

    let password_hash = match req.password.as_deref() {
        Some(p) if !p.is_empty() => {
            if p.len() < 8 {
                return Err(ApiError::BadRequest(
                    "Password must be at least 8 characters".into(),
                ));
            }
            Some(hash_password(p)?)
        }
        _ => None,
    };
    let email = req.email.as_deref().map(|e| e.trim().to_lowercase());

    // account flags are master-only
    let is_active = req.is_active.filter(|_| perms.is_master).map(i32::from);
    let is_master = req.is_master.filter(|_| perms.is_master).map(i32::from);

    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET
            name = COALESCE($2, name),
            email = COALESCE($3, email),
            password_hash = COALESCE($4, password_hash),
            is_active = COALESCE($5, is_active),
            is_master = COALESCE($6, is_master),
            updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&req.name)
    .bind(&email)
    .bind(&password_hash)
    .bind(is_active)
    .bind(is_master)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    // Role reassignment replaces the user's company grant
    if let Some(role_id) = req.role_id {
        if perms.is_master || perms.can_manage_roles {
            let company_id = req.company_id.or_else(|| perms.company_ids.first().copied());
            if let Some(company_id) = company_id {
                sqlx::query("DELETE FROM user_access WHERE user_id = $1 AND entity_type = 'company'")
                    .bind(id)
                    .execute(&state.db)
                    .await?;
                sqlx::query(
                    "INSERT INTO user_access (user_id, role_id, entity_type, entity_id, granted_by)
                     VALUES ($1, $2, 'company', $3, $4)",
                )
                .bind(id)
                .bind(role_id)
                .bind(company_id)
                .bind(auth.id)
                .execute(&state.db)
                .await?;
            }
        }
    }

    log_activity(&state.db, Some(auth.id), "update", "user", Some(id), None).await;

    Ok(Json(UserProfile::from(&user)))
}
