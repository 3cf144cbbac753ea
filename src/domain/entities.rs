//! The development hierarchy: companies own projects, projects contain
//! precincts, precincts contain stages, and stages carry the sellable lots
//! along with their permits, approvals and invoices.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: i32,
    pub name: String,
    pub abn: Option<String>,
    pub owners: Option<String>,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInput {
    pub name: String,
    #[serde(default)]
    pub abn: Option<String>,
    #[serde(default)]
    pub owners: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i32,
    pub company_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    pub company_id: i32,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Precinct {
    pub id: i32,
    pub project_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecinctInput {
    pub project_id: i32,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: i32,
    pub precinct_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub registration_date: Option<DateTime<Utc>>,
    /// 0 = forecast/pending, 1 = actual confirmed
    pub registration_date_actual: i32,
    pub settlement_date: Option<DateTime<Utc>>,
    pub settlement_date_actual: i32,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageInput {
    pub precinct_id: i32,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub registration_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub registration_date_actual: Option<bool>,
    #[serde(default)]
    pub settlement_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub settlement_date_actual: Option<bool>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Lot {
    pub id: i32,
    pub stage_id: i32,
    pub lot_number: String,
    pub address: Option<String>,
    pub area: Option<Decimal>,
    pub frontage: Option<Decimal>,
    pub depth: Option<Decimal>,
    pub street_name: Option<String>,
    pub status: Option<String>,
    pub price: Option<Decimal>,
    pub price_per_sqm: Option<Decimal>,
    pub custom_data: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotInput {
    pub stage_id: i32,
    pub lot_number: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub area: Option<Decimal>,
    #[serde(default)]
    pub frontage: Option<Decimal>,
    #[serde(default)]
    pub depth: Option<Decimal>,
    #[serde(default)]
    pub street_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub price_per_sqm: Option<Decimal>,
    #[serde(default)]
    pub custom_data: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

/// Partial update used by PUT /lots and PATCH /lots/:id. Absent fields are
/// left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotPatch {
    pub lot_number: Option<String>,
    pub address: Option<String>,
    pub area: Option<Decimal>,
    pub frontage: Option<Decimal>,
    pub depth: Option<Decimal>,
    pub street_name: Option<String>,
    pub status: Option<String>,
    pub price: Option<Decimal>,
    pub price_per_sqm: Option<Decimal>,
    pub custom_data: Option<String>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LotSubgroup {
    pub id: i32,
    pub lot_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotSubgroupInput {
    pub lot_id: i32,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Permit {
    pub id: i32,
    pub stage_id: i32,
    pub name: String,
    pub permit_number: Option<String>,
    pub status: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitInput {
    pub stage_id: i32,
    pub name: String,
    #[serde(default)]
    pub permit_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    pub id: i32,
    pub stage_id: i32,
    pub name: String,
    pub approval_number: Option<String>,
    pub status: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalInput {
    pub stage_id: i32,
    pub name: String,
    #[serde(default)]
    pub approval_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: i32,
    pub stage_id: i32,
    pub invoice_number: String,
    pub amount: Option<Decimal>,
    pub status: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceInput {
    pub stage_id: i32,
    pub invoice_number: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}
