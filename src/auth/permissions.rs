//! Role-based permission aggregation.
//!
//! A user's effective permissions are the OR of the role flags across all of
//! their access grants. Master users hold every permission implicitly.

use sqlx::{FromRow, PgPool};

use crate::domain::users::User;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone)]
pub struct UserPermissions {
    pub user_id: i32,
    pub is_master: bool,
    pub can_view: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_invite: bool,
    pub can_manage_roles: bool,
    /// Companies the user has a direct grant on
    pub company_ids: Vec<i32>,
}

#[derive(Debug, FromRow)]
struct AccessFlags {
    entity_type: String,
    entity_id: i32,
    can_view: i32,
    can_edit: i32,
    can_delete: i32,
    can_invite: i32,
    can_manage_roles: i32,
}

impl UserPermissions {
    pub fn master(user_id: i32) -> Self {
        Self {
            user_id,
            is_master: true,
            can_view: true,
            can_edit: true,
            can_delete: true,
            can_invite: true,
            can_manage_roles: true,
            company_ids: Vec::new(),
        }
    }

    fn from_flags(user_id: i32, records: &[AccessFlags]) -> Self {
        Self {
            user_id,
            is_master: false,
            can_view: records.iter().any(|a| a.can_view == 1),
            can_edit: records.iter().any(|a| a.can_edit == 1),
            can_delete: records.iter().any(|a| a.can_delete == 1),
            can_invite: records.iter().any(|a| a.can_invite == 1),
            can_manage_roles: records.iter().any(|a| a.can_manage_roles == 1),
            company_ids: records
                .iter()
                .filter(|a| a.entity_type == "company")
                .map(|a| a.entity_id)
                .collect(),
        }
    }

    pub fn require_view(&self) -> ApiResult<()> {
        if self.can_view {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "You do not have permission to view this resource".into(),
            ))
        }
    }

    pub fn require_edit(&self) -> ApiResult<()> {
        if self.can_edit {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "You do not have permission to edit this resource".into(),
            ))
        }
    }

    pub fn require_delete(&self) -> ApiResult<()> {
        if self.can_delete {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "You do not have permission to delete this resource".into(),
            ))
        }
    }

    pub fn require_invite(&self) -> ApiResult<()> {
        if self.can_invite {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "You do not have permission to invite users".into(),
            ))
        }
    }

    pub fn require_manage_roles(&self) -> ApiResult<()> {
        if self.can_manage_roles {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "You do not have permission to manage roles".into(),
            ))
        }
    }
}

/// Aggregate permissions across all of the user's access grants.
pub async fn load_permissions(pool: &PgPool, user: &User) -> ApiResult<UserPermissions> {
    if user.is_master() {
        return Ok(UserPermissions::master(user.id));
    }

    let records = sqlx::query_as::<_, AccessFlags>(
        "SELECT ua.entity_type, ua.entity_id,
                r.can_view, r.can_edit, r.can_delete, r.can_invite, r.can_manage_roles
         FROM user_access ua
         JOIN roles r ON r.id = ua.role_id
         WHERE ua.user_id = $1",
    )
    .bind(user.id)
    .fetch_all(pool)
    .await?;

    Ok(UserPermissions::from_flags(user.id, &records))
}

/// Permissions scoped to one company. `None` means no grant at all.
pub async fn company_permissions(
    pool: &PgPool,
    user: &User,
    company_id: i32,
) -> ApiResult<Option<UserPermissions>> {
    if user.is_master() {
        let mut perms = UserPermissions::master(user.id);
        perms.company_ids = vec![company_id];
        return Ok(Some(perms));
    }

    let records = sqlx::query_as::<_, AccessFlags>(
        "SELECT ua.entity_type, ua.entity_id,
                r.can_view, r.can_edit, r.can_delete, r.can_invite, r.can_manage_roles
         FROM user_access ua
         JOIN roles r ON r.id = ua.role_id
         WHERE ua.user_id = $1 AND ua.entity_type = 'company' AND ua.entity_id = $2",
    )
    .bind(user.id)
    .bind(company_id)
    .fetch_all(pool)
    .await?;

    if records.is_empty() {
        return Ok(None);
    }

    Ok(Some(UserPermissions::from_flags(user.id, &records)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(entity_id: i32, view: i32, edit: i32) -> AccessFlags {
        AccessFlags {
            entity_type: "company".into(),
            entity_id,
            can_view: view,
            can_edit: edit,
            can_delete: 0,
            can_invite: 0,
            can_manage_roles: 0,
        }
    }

    #[test]
    fn permissions_or_across_grants() {
        let records = vec![flags(1, 1, 0), flags(2, 0, 1)];
        let perms = UserPermissions::from_flags(7, &records);
        assert!(perms.can_view);
        assert!(perms.can_edit);
        assert!(!perms.can_delete);
        assert_eq!(perms.company_ids, vec![1, 2]);
    }

    #[test]
    fn master_holds_everything() {
        let perms = UserPermissions::master(1);
        assert!(perms.require_view().is_ok());
        assert!(perms.require_edit().is_ok());
        assert!(perms.require_delete().is_ok());
        assert!(perms.require_invite().is_ok());
        assert!(perms.require_manage_roles().is_ok());
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let perms = UserPermissions::from_flags(7, &[flags(1, 1, 0)]);
        let err = perms.require_edit().unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}
