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
use crate::domain::entities::{Invoice, InvoiceInput};
use crate::error::{ApiError, ApiResult};
use crate::services::activity::log_activity;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceFilter {
    pub stage_id: Option<i32>,
}

pub async fn list_invoices(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<InvoiceFilter>,
) -> ApiResult<Json<Vec<Invoice>>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_view()?;

    let invoices = match filter.stage_id {
        Some(stage_id) => {
            sqlx::query_as::<_, Invoice>(
                "SELECT * FROM invoices WHERE stage_id = $1 ORDER BY sort_order, id",
            )
            .bind(stage_id)
            .fetch_all(&state.db)
            .await?
        }
        None => {
            sqlx::query_as::<_, Invoice>("SELECT * FROM invoices ORDER BY sort_order, id")
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(Json(invoices))
}

pub async fn create_invoice(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(input): Json<InvoiceInput>,
) -> ApiResult<Created<Invoice>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    if input.invoice_number.trim().is_empty() {
        return Err(ApiError::BadRequest("Invoice number is required".into()));
    }

    let invoice = sqlx::query_as::<_, Invoice>(
        "INSERT INTO invoices (stage_id, invoice_number, amount, status, sort_order)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(input.stage_id)
    .bind(input.invoice_number.trim())
    .bind(input.amount)
    .bind(&input.status)
    .bind(input.sort_order.unwrap_or(0))
    .fetch_one(&state.db)
    .await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "create",
        "invoice",
        Some(invoice.id),
        Some(&serde_json::json!({"invoiceNumber": invoice.invoice_number})),
    )
    .await;

    Ok(Created(invoice))
}

pub async fn update_invoice(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(input): Json<InvoiceInput>,
) -> ApiResult<Json<Invoice>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    let invoice = sqlx::query_as::<_, Invoice>(
        "UPDATE invoices SET stage_id = $2, invoice_number = $3, amount = $4, status = $5,
                sort_order = COALESCE($6, sort_order), updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(input.stage_id)
    .bind(input.invoice_number.trim())
    .bind(input.amount)
    .bind(&input.status)
    .bind(input.sort_order)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("Invoice not found".into()))?;

    log_activity(
        &state.db,
        Some(auth.id),
        "update",
        "invoice",
        Some(id),
        Some(&serde_json::json!({"invoiceNumber": invoice.invoice_number})),
    )
    .await;

    Ok(Json(invoice))
}

pub async fn delete_invoice(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<MessageResponse> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_delete()?;

    let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Invoice not found".into()));
    }

    log_activity(&state.db, Some(auth.id), "delete", "invoice", Some(id), None).await;

    Ok(MessageResponse::new("Invoice deleted"))
}
