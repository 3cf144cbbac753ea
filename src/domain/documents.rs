use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: i32,
    pub entity_type: String,
    pub entity_id: i32,
    /// Storage filename under the upload directory (not the original name)
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i32,
    /// 'permit_plan', 'plan_subdivision' or 'other'
    pub document_type: String,
    pub extracted_data: Option<String>,
    pub ai_processed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn is_pdf(&self) -> bool {
        self.mime_type == "application/pdf"
    }
}
