//! Types exchanged with the vision models and returned by the document
//! analysis endpoints.
//!
//! Model output keeps measurements as strings. Plans often carry values like
//! "approx. 450" or "0.045 ha" and the models echo whatever is printed, so
//! numeric interpretation happens at comparison time, not at parse time.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A lot as read off a permit plan or plan of subdivision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedLot {
    pub lot_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontage: Option<String>,
    /// Second road boundary on corner lots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontage_secondary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedStage {
    pub stage_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_number: Option<String>,
    #[serde(default)]
    pub lots: Vec<ExtractedLot>,
}

/// Parsed payload of one extraction call. Stage-level plans fill `lots`,
/// precinct-level plans fill `stages`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    #[serde(default)]
    pub lots: Vec<ExtractedLot>,
    #[serde(default)]
    pub stages: Vec<ExtractedStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Model signalled it ran out of output budget before listing everything
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remaining_stages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_remaining_lots: Option<i64>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.lots.is_empty() && self.stages.is_empty()
    }

    pub fn empty_with_summary(summary: impl Into<String>) -> Self {
        Self {
            summary: Some(summary.into()),
            ..Default::default()
        }
    }
}

/// One suggested field change, keyed back to a database lot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correction {
    pub lot_id: i32,
    pub lot_number: String,
    pub field: String,
    pub current_value: String,
    pub new_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difference: Option<String>,
}

/// Lot snapshot sent to verification/cross-reference so the model knows what
/// to check against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotSnapshot {
    pub id: i32,
    pub lot_number: String,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub frontage: Option<String>,
    #[serde(default)]
    pub depth: Option<String>,
    #[serde(default)]
    pub street_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// One lot's worth of field values the user confirmed or corrected during
/// calibration sampling.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationFeedback {
    pub lot_number: String,
    pub ai_values: CalibrationValues,
    pub user_values: CalibrationValues,
    pub corrections: CalibrationFlags,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationValues {
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub frontage: String,
    #[serde(default)]
    pub depth: String,
    #[serde(default)]
    pub street_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationFlags {
    #[serde(default)]
    pub area: bool,
    #[serde(default)]
    pub frontage: bool,
    #[serde(default)]
    pub depth: bool,
    #[serde(default)]
    pub street_name: bool,
}

/// Calibration captured by drawing boxes around the printed values on the
/// plan image. Carries per-field AI-vs-user pairs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxCalibration {
    pub lot_number: String,
    #[serde(default)]
    pub fields: Vec<BoxCalibrationField>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxCalibrationField {
    pub name: String,
    #[serde(default)]
    pub ai_value: String,
    #[serde(default)]
    pub user_value: String,
}

/// A correction the user previously applied, fed back as learning context.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionHistoryItem {
    pub lot_number: String,
    pub field: String,
    #[serde(default)]
    pub old_value: String,
    #[serde(default)]
    pub new_value: String,
}

/// Per-lot outcome of cross-referencing a survey plan against stored data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossRefMatch {
    pub lot_number: String,
    pub lot_id: i32,
    pub has_discrepancy: bool,
    pub discrepancies: Vec<Discrepancy>,
    pub existing: LotMeasurements,
    pub extracted: LotMeasurements,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Discrepancy {
    pub field: String,
    pub existing: String,
    pub extracted: String,
}

/// Per-lot outcome of comparing a plan of subdivision against stored data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub lot_number: String,
    pub lot_id: i32,
    pub status: ComparisonStatus,
    pub existing: LotMeasurements,
    pub extracted: LotMeasurements,
    pub variances: Vec<Variance>,
    pub new_info: NewInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    Match,
    Variance,
    NewData,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotMeasurements {
    pub area: Option<String>,
    pub frontage: Option<String>,
    pub depth: Option<String>,
    pub street_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Variance {
    pub field: String,
    pub existing: String,
    pub extracted: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difference: Option<String>,
}

/// Survey detail a plan of subdivision adds beyond bare measurements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInfo {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub boundaries: Vec<Boundary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub easements: Vec<Easement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub encumbrances: Vec<Encumbrance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restrictions: Vec<Restriction>,
}

impl NewInfo {
    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
            && self.easements.is_empty()
            && self.encumbrances.is_empty()
            && self.restrictions.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boundary {
    pub length: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Easement {
    /// Plan label, e.g. "E-1"
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub r#type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beneficiary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_lots: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encumbrance {
    #[serde(default)]
    pub r#type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restriction {
    #[serde(default)]
    pub r#type: String,
    #[serde(default)]
    pub description: String,
}

/// Lot record from a plan of subdivision, including survey detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PosLot {
    pub lot_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontage_secondary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub boundaries: Vec<Boundary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub easements: Vec<Easement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub encumbrances: Vec<Encumbrance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restrictions: Vec<Restriction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
}

/// Raw payload of one POS analysis call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PosPage {
    #[serde(default)]
    pub ps_number: Option<String>,
    #[serde(default)]
    pub lots_analyzed: Vec<PosLot>,
    #[serde(default)]
    pub general_easements: Vec<Easement>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Raw payload of one verification call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPage {
    #[serde(default)]
    pub lots_found: Vec<ExtractedLot>,
    #[serde(default)]
    pub corrections: Vec<RawCorrection>,
    #[serde(default)]
    pub new_lots: Vec<ExtractedLot>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Correction as the model emits it, before we attach the lot id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCorrection {
    pub lot_number: String,
    pub field: String,
    #[serde(default)]
    pub current_value: Option<String>,
    #[serde(default)]
    pub correct_value: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Parse a measurement string as printed on a plan. Takes the first number
/// and ignores units and annotations like "approx.".
pub fn parse_measurement(raw: &str) -> Option<f64> {
    static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
    let re = NUMBER
        .get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").ok())
        .as_ref()?;
    re.find(raw)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_result_tolerates_sparse_json() {
        let json = r#"{"lots": [{"lotNumber": "101", "area": "450"}], "summary": "Found 1 lot"}"#;
        let parsed: ExtractionResult = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.lots.len(), 1);
        assert_eq!(parsed.lots[0].lot_number, "101");
        assert_eq!(parsed.lots[0].area.as_deref(), Some("450"));
        assert!(parsed.lots[0].frontage.is_none());
        assert!(!parsed.has_more);
        assert!(parsed.stages.is_empty());
    }

    #[test]
    fn extraction_result_reads_continuation_fields() {
        let json = r#"{
            "stages": [{"stageName": "Stage 1", "stageNumber": "1", "lots": []}],
            "hasMore": true,
            "remainingStages": ["Stage 2", "Stage 3"],
            "estimatedRemainingLots": 50
        }"#;
        let parsed: ExtractionResult = serde_json::from_str(json).unwrap();
        assert!(parsed.has_more);
        assert_eq!(parsed.remaining_stages, vec!["Stage 2", "Stage 3"]);
        assert_eq!(parsed.estimated_remaining_lots, Some(50));
    }

    #[test]
    fn pos_lot_reads_easements() {
        let json = r#"{
            "lotNumber": "101",
            "area": "450.5",
            "easements": [
                {"id": "E-1", "type": "drainage", "width": "2.0m", "purpose": "stormwater", "beneficiary": "Council"}
            ]
        }"#;
        let lot: PosLot = serde_json::from_str(json).unwrap();
        assert_eq!(lot.easements.len(), 1);
        assert_eq!(lot.easements[0].id, "E-1");
        assert_eq!(lot.easements[0].r#type, "drainage");
    }

    #[test]
    fn parse_measurement_strips_units() {
        assert_eq!(parse_measurement("450 m²"), Some(450.0));
        assert_eq!(parse_measurement("15.00"), Some(15.0));
        assert_eq!(parse_measurement("approx. 32.5m"), Some(32.5));
        assert_eq!(parse_measurement("unknown"), None);
        assert_eq!(parse_measurement(""), None);
    }

    #[test]
    fn comparison_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ComparisonStatus::NewData).unwrap(),
            "\"new_data\""
        );
    }
}
