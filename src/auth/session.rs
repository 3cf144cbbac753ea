//! Cookie-backed sessions stored in Postgres.

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::users::Session;
use crate::error::ApiResult;

pub const SESSION_COOKIE: &str = "session";

pub async fn create_session(pool: &PgPool, user_id: i32, ttl_days: i64) -> ApiResult<Session> {
    let session = sqlx::query_as::<_, Session>(
        "INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(Utc::now() + Duration::days(ttl_days))
    .fetch_one(pool)
    .await?;

    Ok(session)
}

pub async fn delete_session(pool: &PgPool, session_id: Uuid) -> ApiResult<()> {
    sqlx::query("DELETE FROM sessions WHERE id = $1")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Drop all sessions for a user, e.g. after a password reset.
pub async fn delete_user_sessions(pool: &PgPool, user_id: i32) -> ApiResult<()> {
    sqlx::query("DELETE FROM sessions WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Build the session cookie. HttpOnly and SameSite=Strict; Secure outside dev.
pub fn session_cookie(session_id: Uuid, ttl_days: i64, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, session_id.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_secure(secure);
    cookie.set_max_age(time::Duration::days(ttl_days));
    cookie
}

/// Expired cookie that instructs the browser to drop the session.
pub fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_max_age(time::Duration::ZERO);
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_attributes() {
        let id = Uuid::new_v4();
        let cookie = session_cookie(id, 7, true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), id.to_string());
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.secure(), Some(true));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }
}
