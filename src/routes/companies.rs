//! Companies are the tenancy root. Listing is scoped to the caller's grants;
//! creating one makes the creator its Admin.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::{Created, MessageResponse};
use crate::app::AppState;
use crate::auth::permissions::{company_permissions, load_permissions};
use crate::auth::RequireAuth;
use crate::domain::entities::{Company, CompanyInput};
use crate::error::{ApiError, ApiResult};
use crate::services::activity::log_activity;

pub async fn list_companies(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Company>>> {
    let perms = load_permissions(&state.db, &auth.user).await?;

    let companies = if perms.is_master {
        sqlx::query_as::<_, Company>("SELECT * FROM companies ORDER BY name")
            .fetch_all(&state.db)
            .await?
    } else {
        // no grants is an empty list, not an error
        if perms.company_ids.is_empty() {
            return Ok(Json(Vec::new()));
        }
        perms.require_view()?;
        sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = ANY($1) ORDER BY name")
            .bind(&perms.company_ids)
            .fetch_all(&state.db)
            .await?
    };

    Ok(Json(companies))
}

/// Any authenticated user may create a company; they become its Admin.
pub async fn create_company(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(input): Json<CompanyInput>,
) -> ApiResult<Created<Company>> {
    if input.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Company name is required".into()));
    }

    tracing::info!(user_id = auth.id, name = %input.name, "Creating company");

    let company = sqlx::query_as::<_, Company>(
        "INSERT INTO companies (name, abn, owners, created_by)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(input.name.trim())
    .bind(&input.abn)
    .bind(&input.owners)
    .bind(auth.id)
    .fetch_one(&state.db)
    .await?;

    let admin_role: Option<i32> =
        sqlx::query_scalar("SELECT id FROM roles WHERE name = 'Admin' LIMIT 1")
            .fetch_optional(&state.db)
            .await?;
    if let Some(role_id) = admin_role {
        sqlx::query(
            "INSERT INTO user_access (user_id, role_id, entity_type, entity_id, granted_by)
             VALUES ($1, $2, 'company', $3, $1)",
        )
        .bind(auth.id)
        .bind(role_id)
        .bind(company.id)
        .execute(&state.db)
        .await?;
    } else {
        tracing::warn!(company_id = company.id, "No Admin role; creator has no grant");
    }

    log_activity(
        &state.db,
        Some(auth.id),
        "create",
        "company",
        Some(company.id),
        Some(&serde_json::json!({"name": company.name})),
    )
    .await;

    Ok(Created(company))
}

pub async fn update_company(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(input): Json<CompanyInput>,
) -> ApiResult<Json<Company>> {
    let allowed = company_permissions(&state.db, &auth.user, id)
        .await?
        .is_some_and(|p| p.can_edit);
    if !allowed {
        return Err(ApiError::Forbidden(
            "You do not have permission to edit this company".into(),
        ));
    }

    let company = sqlx::query_as::<_, Company>(
        "UPDATE companies SET name = $2, abn = $3, owners = $4, updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(input.name.trim())
    .bind(&input.abn)
    .bind(&input.owners)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("Company not found".into()))?;

    log_activity(
        &state.db,
        Some(auth.id),
        "update",
        "company",
        Some(id),
        Some(&serde_json::json!({"name": company.name})),
    )
    .await;

    Ok(Json(company))
}

/// Only the master or the original creator may delete a company.
pub async fn delete_company(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<MessageResponse> {
    let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Company not found".into()))?;

    if !auth.is_master() && company.created_by != Some(auth.id) {
        return Err(ApiError::Forbidden(
            "You do not have permission to delete this company".into(),
        ));
    }

    sqlx::query("DELETE FROM companies WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "delete",
        "company",
        Some(id),
        Some(&serde_json::json!({"name": company.name})),
    )
    .await;

    Ok(MessageResponse::new("Company deleted"))
}
