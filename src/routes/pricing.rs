use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::MessageResponse;
use crate::app::AppState;
use crate::auth::permissions::load_permissions;
use crate::auth::RequireAuth;
use crate::domain::pricing::{ProductPricing, SavePricingRequest};
use crate::error::{ApiError, ApiResult};
use crate::services::activity::log_activity;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingFilter {
    pub project_id: Option<i32>,
}

pub async fn list_pricing(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<PricingFilter>,
) -> ApiResult<Json<Vec<ProductPricing>>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_view()?;

    let project_id = filter
        .project_id
        .ok_or_else(|| ApiError::BadRequest("projectId is required".into()))?;

    let products = sqlx::query_as::<_, ProductPricing>(
        "SELECT * FROM product_pricing WHERE project_id = $1 ORDER BY sort_order, id",
    )
    .bind(project_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(products))
}

/// Replaces the project's whole price matrix in one transaction.
pub async fn save_pricing(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SavePricingRequest>,
) -> ApiResult<Json<Vec<ProductPricing>>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    let mut tx = state.db.begin().await?;

    sqlx::query("DELETE FROM product_pricing WHERE project_id = $1")
        .bind(req.project_id)
        .execute(&mut *tx)
        .await?;

    let mut saved = Vec::with_capacity(req.products.len());
    for (index, product) in req.products.iter().enumerate() {
        let row = sqlx::query_as::<_, ProductPricing>(
            "INSERT INTO product_pricing
                (project_id, product_name, frontage, depth, base_area,
                 base_price, price_per_sqm, balance_rate, sort_order)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
        )
        .bind(req.project_id)
        .bind(product.resolved_name())
        .bind(product.frontage)
        .bind(product.depth)
        .bind(product.resolved_base_area())
        .bind(product.resolved_base_price())
        .bind(product.resolved_price_per_sqm())
        .bind(product.resolved_balance_rate())
        .bind(index as i32)
        .fetch_one(&mut *tx)
        .await?;
        saved.push(row);
    }

    tx.commit().await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "update",
        "product_pricing",
        Some(req.project_id),
        Some(&serde_json::json!({"products": saved.len()})),
    )
    .await;

    Ok(Json(saved))
}

pub async fn delete_product(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<MessageResponse> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    let result = sqlx::query("DELETE FROM product_pricing WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Product not found".into()));
    }

    log_activity(
        &state.db,
        Some(auth.id),
        "delete",
        "product_pricing",
        Some(id),
        None,
    )
    .await;

    Ok(MessageResponse::new("Product removed"))
}
