//! Document upload and the AI analysis endpoints.
//!
//! Uploaded plans live on disk via Storage; everything else here is prompt
//! assembly, a vision call, and total parsing of whatever comes back. PDFs go
//! to Gemini whole; images go to the caller's chosen provider with fallback.

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::{Created, MessageResponse};
use crate::app::AppState;
use crate::auth::permissions::load_permissions;
use crate::auth::RequireAuth;
use crate::domain::documents::Document;
use crate::domain::entities::Lot;
use crate::domain::extraction::{
    BoxCalibration, CalibrationFeedback, Comparison, Correction, CorrectionHistoryItem,
    CrossRefMatch, Easement, ExtractedLot, ExtractionResult, LotSnapshot, PosLot, PosPage,
    VerifyPage,
};
use crate::error::{ApiError, ApiResult};
use crate::services::activity::log_activity;
use crate::services::extraction::{
    clean_ocr_value, extraction_prompt, merge_extraction_results, ocr_prompt, parse_extraction_reply,
    parse_model_json, ExtractionType,
};
use crate::services::storage::Storage;
use crate::services::verification::{
    attach_lot_ids, box_calibration_context, calibration_context, calibration_prompt,
    compare_pos, correction_history_context, cross_reference, cross_reference_prompt,
    final_verify_prompt, lot_summary, pos_analysis_prompt,
};
use crate::services::vision::{ImagePart, Provider};

const EXTRACT_MAX_TOKENS: u32 = 8192;
const VERIFY_MAX_TOKENS: u32 = 8192;
const CROSS_REF_MAX_TOKENS: u32 = 4096;
const POS_MAX_TOKENS: u32 = 8192;
const OCR_MAX_TOKENS: u32 = 50;
/// Follow-up calls allowed when the model signals it ran out of budget
const MAX_CONTINUATIONS: usize = 3;
/// Region OCR reads Gemini first and falls back to Grok
const OCR_PROVIDERS: [Provider; 2] = [Provider::Gemini, Provider::Grok];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<i32>,
}

pub async fn list_documents(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<DocumentFilter>,
) -> ApiResult<Json<Vec<Document>>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_view()?;

    let documents = sqlx::query_as::<_, Document>(
        "SELECT * FROM documents
         WHERE ($1::text IS NULL OR entity_type = $1)
           AND ($2::int IS NULL OR entity_id = $2)
         ORDER BY created_at DESC",
    )
    .bind(&filter.entity_type)
    .bind(filter.entity_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(documents))
}

pub async fn upload_document(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Created<Document>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_edit()?;

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut original_name: Option<String> = None;
    let mut mime_type: Option<String> = None;
    let mut entity_type: Option<String> = None;
    let mut entity_id: Option<i32> = None;
    let mut document_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                original_name = field.file_name().map(str::to_string);
                mime_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {e}")))?;
                file_bytes = Some(bytes.to_vec());
            }
            "entityType" => {
                entity_type = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {e}")))?,
                );
            }
            "entityId" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {e}")))?;
                entity_id = text.trim().parse().ok();
            }
            "documentType" => {
                document_type = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {e}")))?,
                );
            }
            _ => {}
        }
    }

    let bytes = file_bytes.ok_or_else(|| ApiError::BadRequest("No file provided".into()))?;
    let entity_type =
        entity_type.ok_or_else(|| ApiError::BadRequest("entityType is required".into()))?;
    let entity_id = entity_id.ok_or_else(|| ApiError::BadRequest("entityId is required".into()))?;
    let original_name = original_name.unwrap_or_else(|| "upload".to_string());
    let mime_type = mime_type.unwrap_or_else(|| "application/octet-stream".to_string());
    let document_type = document_type.unwrap_or_else(|| "other".to_string());

    let filename = Storage::generate_filename(&original_name);
    state.storage.save(&filename, &bytes).await?;

    let document = sqlx::query_as::<_, Document>(
        "INSERT INTO documents
            (entity_type, entity_id, filename, original_name, mime_type, size, document_type)
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(&entity_type)
    .bind(entity_id)
    .bind(&filename)
    .bind(&original_name)
    .bind(&mime_type)
    .bind(bytes.len() as i32)
    .bind(&document_type)
    .fetch_one(&state.db)
    .await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "create",
        "document",
        Some(document.id),
        Some(&serde_json::json!({"name": document.original_name})),
    )
    .await;

    Ok(Created(document))
}

pub async fn delete_document(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<MessageResponse> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_delete()?;

    let document = fetch_document(&state, id).await?;

    if let Err(e) = state.storage.delete(&document.filename).await {
        tracing::warn!(document_id = id, error = %e, "Failed to remove stored file");
    }

    sqlx::query("DELETE FROM documents WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "delete",
        "document",
        Some(id),
        Some(&serde_json::json!({"name": document.original_name})),
    )
    .await;

    Ok(MessageResponse::new("Document deleted"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractRequest {
    pub extraction_type: Option<String>,
    pub provider: Option<String>,
    pub hints: Option<String>,
    /// Stages still to read, resuming an extraction the continuation budget
    /// did not finish
    pub continue_from: Vec<String>,
    /// Stages already captured in an earlier call
    pub exclude_stages: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    #[serde(flatten)]
    pub result: ExtractionResult,
    pub used_model: &'static str,
}

/// Run lot extraction over a stored plan. When the model reports it ran out
/// of output budget mid-plan, follow up with continuation requests and merge
/// the pages.
pub async fn extract_document(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<ExtractRequest>,
) -> ApiResult<Json<ExtractResponse>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_view()?;

    let document = fetch_document(&state, id).await?;
    let bytes = state.storage.read(&document.filename).await?;
    let encoded = BASE64.encode(&bytes);

    let extraction_type = ExtractionType::parse(req.extraction_type.as_deref().unwrap_or("stage"));
    let provider = Provider::parse(req.provider.as_deref().unwrap_or("gemini"));
    let hints = req.hints.unwrap_or_default();

    let prompt = extraction_prompt(extraction_type, &hints, &req.continue_from, &req.exclude_stages);
    let (content, mut used_model) =
        call_vision(&state, &document, provider, &prompt, &encoded, EXTRACT_MAX_TOKENS).await?;

    let first = parse_extraction_reply(&content);
    let mut exclude = req.exclude_stages.clone();
    exclude.extend(first.stages.iter().map(|s| s.stage_name.clone()));
    let mut remaining = first.remaining_stages.clone();
    let mut more = first.has_more;
    let mut pages = vec![first];

    for _ in 0..MAX_CONTINUATIONS {
        if !more || remaining.is_empty() {
            break;
        }
        tracing::info!(document_id = id, stages = ?remaining, "Continuing extraction");

        let prompt = extraction_prompt(extraction_type, &hints, &remaining, &exclude);
        let (content, model) =
            call_vision(&state, &document, provider, &prompt, &encoded, EXTRACT_MAX_TOKENS).await?;
        used_model = model;

        let page = parse_extraction_reply(&content);
        exclude.extend(page.stages.iter().map(|s| s.stage_name.clone()));
        remaining = page.remaining_stages.clone();
        more = page.has_more;
        pages.push(page);
    }

    let result = if pages.len() > 1 {
        merge_extraction_results(pages, extraction_type)
    } else {
        pages.pop().unwrap_or_default()
    };

    let serialized = serde_json::to_string(&result)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to serialize extraction: {e}")))?;
    sqlx::query("UPDATE documents SET extracted_data = $2, ai_processed = now() WHERE id = $1")
        .bind(id)
        .bind(&serialized)
        .execute(&state.db)
        .await?;

    log_activity(
        &state.db,
        Some(auth.id),
        "extract",
        "document",
        Some(id),
        Some(&serde_json::json!({
            "lots": result.lots.len(),
            "stages": result.stages.len(),
            "model": used_model,
        })),
    )
    .await;

    Ok(Json(ExtractResponse { result, used_model }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifyRequest {
    pub provider: Option<String>,
    /// Client-side screenshot of the plan region; preferred over the stored
    /// file when present
    pub captured_image: Option<String>,
    pub existing_lots: Vec<LotSnapshot>,
    pub correction_history: Vec<CorrectionHistoryItem>,
    pub calibration_data: Vec<CalibrationFeedback>,
    pub box_calibration: Vec<BoxCalibration>,
    pub return_image: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub lots_found: Vec<ExtractedLot>,
    pub corrections: Vec<Correction>,
    pub new_lots: Vec<ExtractedLot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub used_model: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
}

/// Verify stored lot values against the plan. With no lots supplied this is
/// the first calibration pass; otherwise the model gets the calibration
/// feedback and emits targeted corrections.
pub async fn verify_document(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<Json<VerifyResponse>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_view()?;

    let document = fetch_document(&state, id).await?;
    let provider = Provider::parse(req.provider.as_deref().unwrap_or("gemini"));

    let correction_ctx = correction_history_context(&req.correction_history);
    let mut calibration_ctx = calibration_context(&req.calibration_data);
    calibration_ctx.push_str(&box_calibration_context(&req.box_calibration));

    let prompt = if req.existing_lots.is_empty() {
        calibration_prompt(&correction_ctx)
    } else {
        final_verify_prompt(&lot_summary(&req.existing_lots), &calibration_ctx, &correction_ctx)
    };

    let (content, used_model) = match &req.captured_image {
        Some(data_url) => {
            let (mime, payload) = split_data_url(data_url);
            state
                .vision
                .analyze(
                    provider,
                    &prompt,
                    ImagePart {
                        mime_type: &mime,
                        base64_data: payload,
                    },
                    VERIFY_MAX_TOKENS,
                )
                .await?
        }
        None => {
            let bytes = state.storage.read(&document.filename).await?;
            let encoded = BASE64.encode(&bytes);
            call_vision(&state, &document, provider, &prompt, &encoded, VERIFY_MAX_TOKENS).await?
        }
    };

    let page = match parse_model_json(&content)
        .and_then(|v| serde_json::from_value::<VerifyPage>(v).ok())
    {
        Some(page) => page,
        None => VerifyPage {
            summary: Some("Could not parse AI response".into()),
            ..Default::default()
        },
    };

    let corrections = attach_lot_ids(page.corrections, &req.existing_lots);

    let image_base64 = if req.return_image {
        req.captured_image
            .as_deref()
            .map(|d| split_data_url(d).1.to_string())
    } else {
        None
    };

    log_activity(
        &state.db,
        Some(auth.id),
        "extract",
        "document",
        Some(id),
        Some(&serde_json::json!({
            "action": "verify",
            "corrections": corrections.len(),
            "model": used_model,
        })),
    )
    .await;

    Ok(Json(VerifyResponse {
        lots_found: page.lots_found,
        corrections,
        new_lots: page.new_lots,
        summary: page.summary,
        used_model,
        image_base64,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrossRefRequest {
    pub provider: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CrossRefReply {
    lots_found: Vec<ExtractedLot>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossRefResponse {
    pub matches: Vec<CrossRefMatch>,
    pub corrections: Vec<Correction>,
    pub summary: String,
    pub used_model: &'static str,
}

/// Read a survey plan and compare what it shows against the stored lots of a
/// stage or precinct.
pub async fn cross_reference_document(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<CrossRefRequest>,
) -> ApiResult<Json<CrossRefResponse>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_view()?;

    let document = fetch_document(&state, id).await?;
    let entity_type = req.entity_type.as_deref().unwrap_or("stage");
    let entity_id = req
        .entity_id
        .ok_or_else(|| ApiError::BadRequest("entityId is required".into()))?;

    let existing = load_lot_snapshots(&state, entity_type, entity_id).await?;
    if existing.is_empty() {
        return Err(ApiError::BadRequest(
            "No lots found to cross-reference".into(),
        ));
    }

    let lot_numbers: Vec<&str> = existing.iter().map(|l| l.lot_number.as_str()).collect();
    let prompt = cross_reference_prompt(&lot_numbers.join(", "));

    let provider = Provider::parse(req.provider.as_deref().unwrap_or("gemini"));
    let bytes = state.storage.read(&document.filename).await?;
    let encoded = BASE64.encode(&bytes);
    let (content, used_model) =
        call_vision(&state, &document, provider, &prompt, &encoded, CROSS_REF_MAX_TOKENS).await?;

    let reply = parse_model_json(&content)
        .and_then(|v| serde_json::from_value::<CrossRefReply>(v).ok())
        .unwrap_or_default();

    let (matches, corrections) = cross_reference(&existing, &reply.lots_found);
    let discrepancies = matches.iter().filter(|m| m.has_discrepancy).count();
    let summary = format!(
        "Cross-referenced {} lots, {} discrepancies found",
        matches.len(),
        discrepancies
    );

    log_activity(
        &state.db,
        Some(auth.id),
        "extract",
        "document",
        Some(id),
        Some(&serde_json::json!({
            "action": "cross_reference",
            "matches": matches.len(),
            "discrepancies": discrepancies,
        })),
    )
    .await;

    Ok(Json(CrossRefResponse {
        matches,
        corrections,
        summary,
        used_model,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PosRequest {
    pub provider: Option<String>,
    pub stage_id: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PosStats {
    pub total_lots: usize,
    pub matches: usize,
    pub variances: usize,
    pub new_data: usize,
    pub lots_with_easements: usize,
    pub total_corrections: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PosResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ps_number: Option<String>,
    pub comparisons: Vec<Comparison>,
    pub corrections: Vec<Correction>,
    pub new_lots: Vec<PosLot>,
    pub general_easements: Vec<Easement>,
    pub stats: PosStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub used_model: &'static str,
}

/// Full plan-of-subdivision analysis: measurements, easements, encumbrances
/// and restrictions, compared against the stage's stored lots.
pub async fn analyze_pos(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<PosRequest>,
) -> ApiResult<Json<PosResponse>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_view()?;

    let document = fetch_document(&state, id).await?;
    let stage_id = req
        .stage_id
        .ok_or_else(|| ApiError::BadRequest("stageId is required".into()))?;

    let existing = load_lot_snapshots(&state, "stage", stage_id).await?;
    let targets = if existing.is_empty() {
        "Extract all lots found".to_string()
    } else {
        existing
            .iter()
            .map(|l| l.lot_number.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let prompt = pos_analysis_prompt(&targets);

    let provider = Provider::parse(req.provider.as_deref().unwrap_or("gemini"));
    let bytes = state.storage.read(&document.filename).await?;
    let encoded = BASE64.encode(&bytes);
    let (content, used_model) =
        call_vision(&state, &document, provider, &prompt, &encoded, POS_MAX_TOKENS).await?;

    let page = parse_model_json(&content)
        .and_then(|v| serde_json::from_value::<PosPage>(v).ok())
        .unwrap_or_default();

    let (comparisons, corrections, new_lots) = compare_pos(&existing, page.lots_analyzed);

    use crate::domain::extraction::ComparisonStatus;
    let stats = PosStats {
        total_lots: comparisons.len(),
        matches: comparisons
            .iter()
            .filter(|c| c.status == ComparisonStatus::Match)
            .count(),
        variances: comparisons
            .iter()
            .filter(|c| c.status == ComparisonStatus::Variance)
            .count(),
        new_data: comparisons
            .iter()
            .filter(|c| c.status == ComparisonStatus::NewData)
            .count(),
        lots_with_easements: comparisons
            .iter()
            .filter(|c| !c.new_info.easements.is_empty())
            .count(),
        total_corrections: corrections.len(),
    };

    log_activity(
        &state.db,
        Some(auth.id),
        "extract",
        "document",
        Some(id),
        Some(&serde_json::json!({
            "action": "analyze_pos",
            "lots": stats.total_lots,
            "variances": stats.variances,
        })),
    )
    .await;

    Ok(Json(PosResponse {
        ps_number: page.ps_number,
        comparisons,
        corrections,
        new_lots,
        general_easements: page.general_easements,
        stats,
        summary: page.summary,
        used_model,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OcrRequest {
    pub image: String,
    pub field_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResponse {
    pub value: String,
    pub raw: String,
}

/// OCR a small cropped region of a plan, e.g. one dimension label. The
/// region is tiny and the reply is a handful of tokens.
pub async fn ocr_region(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<OcrRequest>,
) -> ApiResult<Json<OcrResponse>> {
    let perms = load_permissions(&state.db, &auth.user).await?;
    perms.require_view()?;

    if req.image.is_empty() {
        return Err(ApiError::BadRequest("image is required".into()));
    }

    let (mime, payload) = split_data_url(&req.image);
    let prompt = ocr_prompt(req.field_type.as_deref().unwrap_or(""));

    let (content, _) = state
        .vision
        .analyze_with_fallback(
            &OCR_PROVIDERS,
            &prompt,
            ImagePart {
                mime_type: &mime,
                base64_data: payload,
            },
            OCR_MAX_TOKENS,
        )
        .await?;

    Ok(Json(OcrResponse {
        value: clean_ocr_value(&content),
        raw: content,
    }))
}

async fn fetch_document(state: &AppState, id: i32) -> ApiResult<Document> {
    sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".into()))
}

/// Route the call by document type: PDFs must go to Gemini inline, images use
/// the caller's provider with fallback.
async fn call_vision(
    state: &AppState,
    document: &Document,
    provider: Provider,
    prompt: &str,
    encoded: &str,
    max_tokens: u32,
) -> ApiResult<(String, &'static str)> {
    if document.is_pdf() {
        state.vision.analyze_pdf(prompt, encoded, max_tokens).await
    } else {
        state
            .vision
            .analyze(
                provider,
                prompt,
                ImagePart {
                    mime_type: &document.mime_type,
                    base64_data: encoded,
                },
                max_tokens,
            )
            .await
    }
}

/// Split a data URL into (mime type, base64 payload). Bare base64 passes
/// through with an image/png default.
fn split_data_url(data: &str) -> (String, &str) {
    if let Some((head, payload)) = data.split_once(',') {
        if let Some(meta) = head.strip_prefix("data:") {
            let mime = meta.split(';').next().unwrap_or("image/png");
            let mime = if mime.is_empty() { "image/png" } else { mime };
            return (mime.to_string(), payload);
        }
    }
    ("image/png".to_string(), data)
}

async fn load_lot_snapshots(
    state: &AppState,
    entity_type: &str,
    entity_id: i32,
) -> ApiResult<Vec<LotSnapshot>> {
    let lots = match entity_type {
        "precinct" => {
            sqlx::query_as::<_, Lot>(
                "SELECT l.* FROM lots l
                 JOIN stages s ON s.id = l.stage_id
                 WHERE s.precinct_id = $1
                 ORDER BY l.sort_order, l.id",
            )
            .bind(entity_id)
            .fetch_all(&state.db)
            .await?
        }
        _ => {
            sqlx::query_as::<_, Lot>(
                "SELECT * FROM lots WHERE stage_id = $1 ORDER BY sort_order, id",
            )
            .bind(entity_id)
            .fetch_all(&state.db)
            .await?
        }
    };

    Ok(lots.iter().map(snapshot).collect())
}

fn snapshot(lot: &Lot) -> LotSnapshot {
    LotSnapshot {
        id: lot.id,
        lot_number: lot.lot_number.clone(),
        area: lot.area.map(|d| d.to_string()),
        frontage: lot.frontage.map(|d| d.to_string()),
        depth: lot.depth.map(|d| d.to_string()),
        street_name: lot.street_name.clone(),
        status: lot.status.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_splits_mime_and_payload() {
        let (mime, payload) = split_data_url("data:image/jpeg;base64,AAAA");
        assert_eq!(mime, "image/jpeg");
        assert_eq!(payload, "AAAA");
    }

    #[test]
    fn bare_base64_defaults_to_png() {
        let (mime, payload) = split_data_url("AAAA");
        assert_eq!(mime, "image/png");
        assert_eq!(payload, "AAAA");
    }

    #[test]
    fn data_url_without_mime_defaults_to_png() {
        let (mime, payload) = split_data_url("data:;base64,BBBB");
        assert_eq!(mime, "image/png");
        assert_eq!(payload, "BBBB");
    }

    #[test]
    fn extract_request_carries_continuation_lists() {
        let req: ExtractRequest = serde_json::from_str(
            r#"{"extractionType":"precinct","continueFrom":["Stage 4"],"excludeStages":["Stage 1","Stage 2"]}"#,
        )
        .unwrap();
        assert_eq!(req.continue_from, ["Stage 4"]);
        assert_eq!(req.exclude_stages, ["Stage 1", "Stage 2"]);

        let bare: ExtractRequest = serde_json::from_str("{}").unwrap();
        assert!(bare.continue_from.is_empty());
        assert!(bare.exclude_stages.is_empty());
    }

    #[test]
    fn ocr_reads_gemini_then_grok() {
        assert_eq!(OCR_PROVIDERS, [Provider::Gemini, Provider::Grok]);
    }
}
