//! Users, sessions, roles, access grants, invitations and reset tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    /// 1 = master user (bypasses all permission checks)
    pub is_master: i32,
    pub is_active: i32,
    pub theme: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_master(&self) -> bool {
        self.is_master == 1
    }

    pub fn is_active(&self) -> bool {
        self.is_active == 1
    }
}

/// Public shape of a user, safe to return from the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub is_master: bool,
}

impl From<&User> for UserProfile {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            name: u.name.clone(),
            is_master: u.is_master(),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub can_view: i32,
    pub can_edit: i32,
    pub can_delete: i32,
    pub can_invite: i32,
    pub can_manage_roles: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub can_view: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
    #[serde(default)]
    pub can_invite: bool,
    #[serde(default)]
    pub can_manage_roles: bool,
}

/// A user's access record joined with its role, as returned by
/// GET /user-access and embedded in GET /auth/me.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AccessRecord {
    pub id: i32,
    pub user_id: i32,
    pub user_name: String,
    pub user_email: String,
    pub role_id: i32,
    pub role_name: String,
    pub entity_type: String,
    pub entity_id: i32,
    pub can_view: i32,
    pub can_edit: i32,
    pub can_delete: i32,
    pub can_invite: i32,
    pub can_manage_roles: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: i32,
    pub email: String,
    pub token: Uuid,
    pub role_id: i32,
    pub entity_type: String,
    pub entity_id: i32,
    pub invited_by: i32,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PasswordReset {
    pub id: i32,
    pub user_id: i32,
    pub token: Uuid,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
