use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use uuid::Uuid;

use super::session::SESSION_COOKIE;
use crate::app::AppState;
use crate::domain::users::User;
use crate::error::ErrorResponse;

/// Extractor that requires a valid session cookie.
///
/// Example:
/// ```ignore
/// async fn protected_route(auth: RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}", auth.name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth {
    pub user: User,
    pub session_id: Uuid,
}

impl std::ops::Deref for RequireAuth {
    type Target = User;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingSession,
    InvalidSession,
    Database(sqlx::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::MissingSession => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Not authenticated",
            ),
            AuthError::InvalidSession => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Invalid or expired session",
            ),
            AuthError::Database(e) => {
                tracing::error!(error = ?e, "Session lookup failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred",
                )
            }
        };

        let body = ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            request_id: None,
        };

        (status, Json(body)).into_response()
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let session_id = jar
            .get(SESSION_COOKIE)
            .ok_or(AuthError::MissingSession)
            .and_then(|c| Uuid::parse_str(c.value()).map_err(|_| AuthError::InvalidSession))?;

        // Expiry is enforced in the query; disabled accounts fail closed.
        let user = sqlx::query_as::<_, User>(
            "SELECT u.* FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.id = $1 AND s.expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&state.db)
        .await
        .map_err(AuthError::Database)?
        .ok_or(AuthError::InvalidSession)?;

        if !user.is_active() {
            return Err(AuthError::InvalidSession);
        }

        Ok(RequireAuth { user, session_id })
    }
}
