use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Audit-trail row joined with the acting user's name/email.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: i32,
    pub user_id: Option<i32>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<i32>,
    /// JSON blob with action-specific context
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserPreference {
    pub id: i32,
    pub entity_type: String,
    pub entity_id: i32,
    pub pref_key: String,
    pub pref_value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CustomField {
    pub id: i32,
    pub entity_type: String,
    pub field_key: String,
    pub field_label: String,
    pub field_type: String,
    pub is_active: i32,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}
