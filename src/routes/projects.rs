use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::{Created, MessageResponse};
use crate::app::AppState;
use crate::auth::permissions::load_permissions;
use crate::auth::RequireAuth;
use crate::domain::entities::{Project, ProjectInput};
use crate::error::{ApiError, ApiResult};
use crate::services::activity::log_activity;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFilter {
    pub company_id: Option<i32>,
}

pub async fn list_projects(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ProjectFilter>,
) -> ApiResult<Json<Vec<Project>>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_view()?;

    let projects = match filter.company_id {
        Some(company_id) => {
            sqlx::query_as::<_, Project>(
                "SELECT * FROM projects WHERE company_id = $1 ORDER BY sort_order, id",
            )
            .bind(company_id)
            .fetch_all(&state.db)
            .await?
        }
        None => {
            sqlx::query_as::<_, Project>("SELECT * FROM projects ORDER BY sort_order, id")
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(Json(projects))
}

pub async fn create_project(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(input): Json<ProjectInput>,
) -> ApiResult<Created<Project>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    tracing::info!(user_id = auth.id, name = %input.name, "Creating project");

    let project = sqlx::query_as::<_, Project>(
        "INSERT INTO projects (company_id, name, description, sort_order)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(input.company_id)
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(input.sort_order.unwrap_or(0))
    .fetch_one(&state.db)
    .await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "create",
        "project",
        Some(project.id),
        Some(&serde_json::json!({"name": project.name})),
    )
    .await;

    Ok(Created(project))
}

pub async fn update_project(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(input): Json<ProjectInput>,
) -> ApiResult<Json<Project>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    let project = sqlx::query_as::<_, Project>(
        "UPDATE projects SET company_id = $2, name = $3, description = $4,
                sort_order = COALESCE($5, sort_order), updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(input.company_id)
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(input.sort_order)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("Project not found".into()))?;

    log_activity(
        &state.db,
        Some(auth.id),
        "update",
        "project",
        Some(id),
        Some(&serde_json::json!({"name": project.name})),
    )
    .await;

    Ok(Json(project))
}

pub async fn delete_project(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<MessageResponse> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_delete()?;

    let result = sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Project not found".into()));
    }

    log_activity(&state.db, Some(auth.id), "delete", "project", Some(id), None).await;

    Ok(MessageResponse::new("Project deleted"))
}
