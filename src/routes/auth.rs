//! Registration, login, sessions, password resets and the user theme.

use axum::{
    extract::State,
    Json,
};
use axum_extra::extract::CookieJar;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, MessageResponse};
use crate::app::AppState;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::session::{
    clear_session_cookie, create_session, delete_session, delete_user_sessions, session_cookie,
};
use crate::auth::{RequireAuth, SESSION_COOKIE};
use crate::domain::users::{AccessRecord, Invitation, PasswordReset, User, UserProfile};
use crate::error::{ApiError, ApiResult};
use crate::routes::user_access::access_records_for_user;
use crate::services::activity::log_activity;

const THEMES: &[&str] = &["default", "tokyo-night", "console", "ocean"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEnvelope {
    pub user: UserProfile,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<UserEnvelope>)> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest("Email and password are required".into()));
    }

    let email = req.email.trim().to_lowercase();
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".into()))?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::Unauthorized("Invalid email or password".into()));
    }
    if !user.is_active() {
        return Err(ApiError::Forbidden("Account is disabled".into()));
    }

    sqlx::query("UPDATE users SET last_login = now() WHERE id = $1")
        .bind(user.id)
        .execute(&state.db)
        .await?;

    let session = create_session(&state.db, user.id, state.settings.session_ttl_days).await?;
    log_activity(&state.db, Some(user.id), "login", "user", Some(user.id), None).await;

    tracing::info!(user_id = user.id, "User logged in");

    let cookie = session_cookie(
        session.id,
        state.settings.session_ttl_days,
        !state.settings.env.is_dev(),
    );
    Ok((
        jar.add(cookie),
        Json(UserEnvelope {
            user: UserProfile::from(&user),
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub invite_token: Option<String>,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(CookieJar, Created<UserEnvelope>)> {
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

    // Registration via invitation grants the invited role on acceptance
    let invitation = match &req.invite_token {
        Some(token) => {
            let token = Uuid::parse_str(token)
                .map_err(|_| ApiError::BadRequest("Invalid invitation token".into()))?;
            let invitation = sqlx::query_as::<_, Invitation>(
                "SELECT * FROM invitations
                 WHERE token = $1 AND accepted_at IS NULL AND expires_at > now()",
            )
            .bind(token)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| ApiError::BadRequest("Invalid or expired invitation".into()))?;

            if invitation.email.to_lowercase() != email {
                return Err(ApiError::BadRequest(
                    "Invitation was issued for a different email address".into(),
                ));
            }
            Some(invitation)
        }
        None => None,
    };

    let password_hash = hash_password(&req.password)?;
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (email, password_hash, name) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&email)
    .bind(&password_hash)
    .bind(req.name.trim())
    .fetch_one(&state.db)
    .await?;

    if let Some(invitation) = invitation {
        sqlx::query(
            "INSERT INTO user_access (user_id, role_id, entity_type, entity_id, granted_by)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id)
        .bind(invitation.role_id)
        .bind(&invitation.entity_type)
        .bind(invitation.entity_id)
        .bind(invitation.invited_by)
        .execute(&state.db)
        .await?;

        sqlx::query("UPDATE invitations SET accepted_at = now() WHERE id = $1")
            .bind(invitation.id)
            .execute(&state.db)
            .await?;
    }

    let session = create_session(&state.db, user.id, state.settings.session_ttl_days).await?;
    log_activity(&state.db, Some(user.id), "create", "user", Some(user.id), None).await;

    tracing::info!(user_id = user.id, "User registered");

    let cookie = session_cookie(
        session.id,
        state.settings.session_ttl_days,
        !state.settings.env.is_dev(),
    );
    Ok((
        jar.add(cookie),
        Created(UserEnvelope {
            user: UserProfile::from(&user),
        }),
    ))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, MessageResponse)> {
    if let Some(session_id) = jar
        .get(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
    {
        delete_session(&state.db, session_id).await?;
    }
    Ok((jar.add(clear_session_cookie()), MessageResponse::new("Logged out")))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: Option<MeUser>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeUser {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub theme: String,
    pub access: Vec<AccessRecord>,
}

/// Current user, or `{"user": null}` when the session is missing or stale.
/// Stale cookies are cleared rather than rejected so the frontend can treat
/// this endpoint as a session probe.
pub async fn me(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<MeResponse>)> {
    let Some(session_id) = jar
        .get(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
    else {
        return Ok((jar, Json(MeResponse { user: None })));
    };

    let user = sqlx::query_as::<_, User>(
        "SELECT u.* FROM sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.id = $1 AND s.expires_at > now()",
    )
    .bind(session_id)
    .fetch_optional(&state.db)
    .await?;

    let Some(user) = user.filter(User::is_active) else {
        return Ok((jar.add(clear_session_cookie()), Json(MeResponse { user: None })));
    };

    let access = access_records_for_user(&state.db, user.id).await?;
    Ok((
        jar,
        Json(MeResponse {
            user: Some(MeUser {
                profile: UserProfile::from(&user),
                theme: user.theme.clone().unwrap_or_else(|| "default".to_string()),
                access,
            }),
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordResponse {
    pub message: String,
    /// Dev-only echo of the token; there is no mail delivery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_token: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_reset_url: Option<String>,
}

/// Always responds with the same message so the endpoint cannot be used to
/// probe which addresses have accounts.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<ForgotPasswordResponse>> {
    let email = req.email.trim().to_lowercase();
    let mut dev_token = None;

    if !email.is_empty() {
        let user_id: Option<i32> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(&state.db)
            .await?;

        if let Some(user_id) = user_id {
            let token = Uuid::new_v4();
            sqlx::query(
                "INSERT INTO password_resets (user_id, token, expires_at) VALUES ($1, $2, $3)",
            )
            .bind(user_id)
            .bind(token)
            .bind(Utc::now() + Duration::hours(1))
            .execute(&state.db)
            .await?;

            if state.settings.env.is_dev() {
                dev_token = Some(token);
            }
        }
    }

    Ok(Json(ForgotPasswordResponse {
        message: "If an account exists for that address, a reset link has been issued".into(),
        dev_reset_url: dev_token.map(|t| format!("/reset-password/{t}")),
        dev_token,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Single-use token; a successful reset drops every existing session and
/// logs the user straight in.
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<(CookieJar, Json<UserEnvelope>)> {
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "Password must be at least 8 characters".into(),
        ));
    }
    let token = Uuid::parse_str(&req.token)
        .map_err(|_| ApiError::BadRequest("Invalid reset token".into()))?;

    let reset = sqlx::query_as::<_, PasswordReset>(
        "SELECT * FROM password_resets
         WHERE token = $1 AND used_at IS NULL AND expires_at > now()",
    )
    .bind(token)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::BadRequest("Invalid or expired reset token".into()))?;

    let password_hash = hash_password(&req.password)?;
    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(reset.user_id)
    .bind(&password_hash)
    .fetch_one(&state.db)
    .await?;

    sqlx::query("UPDATE password_resets SET used_at = now() WHERE id = $1")
        .bind(reset.id)
        .execute(&state.db)
        .await?;

    delete_user_sessions(&state.db, user.id).await?;
    let session = create_session(&state.db, user.id, state.settings.session_ttl_days).await?;
    log_activity(&state.db, Some(user.id), "update", "user", Some(user.id), None).await;

    tracing::info!(user_id = user.id, "Password reset completed");

    let cookie = session_cookie(
        session.id,
        state.settings.session_ttl_days,
        !state.settings.env.is_dev(),
    );
    Ok((
        jar.add(cookie),
        Json(UserEnvelope {
            user: UserProfile::from(&user),
        }),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeResponse {
    pub theme: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeRequest {
    pub theme: String,
}

pub async fn get_theme(auth: RequireAuth) -> Json<ThemeResponse> {
    Json(ThemeResponse {
        theme: auth.theme.clone().unwrap_or_else(|| "default".to_string()),
    })
}

pub async fn update_theme(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ThemeRequest>,
) -> ApiResult<Json<ThemeResponse>> {
    if !THEMES.contains(&req.theme.as_str()) {
        return Err(ApiError::BadRequest("Invalid theme".into()));
    }

    sqlx::query("UPDATE users SET theme = $2, updated_at = now() WHERE id = $1")
        .bind(auth.id)
        .bind(&req.theme)
        .execute(&state.db)
        .await?;

    Ok(Json(ThemeResponse { theme: req.theme }))
}
