//! Per-entity UI preferences, stored as key/value pairs.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::MessageResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::activity::UserPreference;
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceFilter {
    pub entity_type: String,
    pub entity_id: i32,
}

pub async fn get_preferences(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<PreferenceFilter>,
) -> ApiResult<Json<BTreeMap<String, String>>> {
    let rows: Vec<UserPreference> = sqlx::query_as(
        "SELECT * FROM user_preferences
         WHERE entity_type = $1 AND entity_id = $2",
    )
    .bind(&filter.entity_type)
    .bind(filter.entity_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(preference_map(rows)))
}

fn preference_map(rows: Vec<UserPreference>) -> BTreeMap<String, String> {
    rows.into_iter().map(|p| (p.pref_key, p.pref_value)).collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceInput {
    pub entity_type: String,
    pub entity_id: i32,
    pub pref_key: String,
    pub pref_value: String,
}

pub async fn save_preference(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(input): Json<PreferenceInput>,
) -> ApiResult<MessageResponse> {
    let existing: Option<i32> = sqlx::query_scalar(
        "SELECT id FROM user_preferences
         WHERE entity_type = $1 AND entity_id = $2 AND pref_key = $3",
    )
    .bind(&input.entity_type)
    .bind(input.entity_id)
    .bind(&input.pref_key)
    .fetch_optional(&state.db)
    .await?;

    match existing {
        Some(id) => {
            sqlx::query("UPDATE user_preferences SET pref_value = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(&input.pref_value)
                .execute(&state.db)
                .await?;
        }
        None => {
            sqlx::query(
                "INSERT INTO user_preferences (entity_type, entity_id, pref_key, pref_value)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(&input.entity_type)
            .bind(input.entity_id)
            .bind(&input.pref_key)
            .bind(&input.pref_value)
            .execute(&state.db)
            .await?;
        }
    }

    Ok(MessageResponse::new("Preference saved"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(key: &str, value: &str) -> UserPreference {
        UserPreference {
            id: 1,
            entity_type: "stage".into(),
            entity_id: 5,
            pref_key: key.into(),
            pref_value: value.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn preferences_collapse_to_key_value_map() {
        let map = preference_map(vec![row("columns", "area,frontage"), row("sort", "asc")]);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("columns").map(String::as_str), Some("area,frontage"));
        assert_eq!(map.get("sort").map(String::as_str), Some("asc"));
    }
}
