//! Verification and cross-reference logic: calibration context building,
//! systematic error detection, and tolerance-based comparison of extracted
//! values against stored lots.
//!
//! Tolerances reflect what matters on the ground: half a square metre of
//! area, a tenth of a metre of frontage or depth.

use std::collections::HashMap;

use crate::domain::extraction::{
    parse_measurement, BoxCalibration, CalibrationFeedback, Comparison, ComparisonStatus,
    Correction, CorrectionHistoryItem, CrossRefMatch, Discrepancy, ExtractedLot, LotMeasurements,
    LotSnapshot, NewInfo, PosLot, RawCorrection, Variance,
};

pub const AREA_TOLERANCE: f64 = 0.5;
pub const LENGTH_TOLERANCE: f64 = 0.1;
/// Confidence assigned to corrections derived from a survey document
pub const SURVEY_CONFIDENCE: f64 = 0.85;
/// A diff pattern counts as systematic above this mean magnitude
const SYSTEMATIC_THRESHOLD: f64 = 0.5;

pub fn correction_history_context(history: &[CorrectionHistoryItem]) -> String {
    if history.is_empty() {
        return String::new();
    }

    let examples: Vec<String> = history
        .iter()
        .map(|c| {
            format!(
                "- {} for Lot {}: changed from \"{}\" to \"{}\"",
                c.field, c.lot_number, c.old_value, c.new_value
            )
        })
        .collect();

    format!(
        "\nLEARNING FROM PREVIOUS USER CORRECTIONS:\n{}\n",
        examples.join("\n")
    )
}

pub fn calibration_context(feedback: &[CalibrationFeedback]) -> String {
    let examples: Vec<String> = feedback
        .iter()
        .filter(|cf| {
            cf.corrections.area
                || cf.corrections.frontage
                || cf.corrections.depth
                || cf.corrections.street_name
        })
        .map(|cf| {
            let mut parts = Vec::new();
            if cf.corrections.area {
                parts.push(format!(
                    "area: AI said \"{}\" but correct is \"{}\"",
                    cf.ai_values.area, cf.user_values.area
                ));
            }
            if cf.corrections.frontage {
                parts.push(format!(
                    "frontage: AI said \"{}\" but correct is \"{}\"",
                    cf.ai_values.frontage, cf.user_values.frontage
                ));
            }
            if cf.corrections.depth {
                parts.push(format!(
                    "depth: AI said \"{}\" but correct is \"{}\"",
                    cf.ai_values.depth, cf.user_values.depth
                ));
            }
            if cf.corrections.street_name {
                parts.push(format!(
                    "street: AI said \"{}\" but correct is \"{}\"",
                    cf.ai_values.street_name, cf.user_values.street_name
                ));
            }
            format!("Lot {}: {}", cf.lot_number, parts.join(", "))
        })
        .collect();

    if examples.is_empty() {
        return String::new();
    }

    format!(
        "\nCRITICAL CALIBRATION - USER VERIFIED THESE SAMPLES AND FOUND ERRORS:\n{}\n\n\
         IMPORTANT: Based on these calibration samples, you likely made SYSTEMATIC ERRORS.\n\
         For example, if you misread frontage as \"10\" when it was \"15\" for multiple lots, apply this correction pattern to ALL lots.\n\
         Re-examine the image carefully and correct ALL similar errors across all lots.\n",
        examples.join("\n")
    )
}

/// Mean signed difference per field when the user's box calibration shows a
/// consistent direction. Two or more same-sign numeric diffs with a mean
/// magnitude above the threshold counts as systematic.
pub fn detect_systematic_errors(feedback: &[BoxCalibration]) -> Vec<(String, f64)> {
    let mut diffs: HashMap<&str, Vec<f64>> = HashMap::new();

    for lot in feedback {
        for field in &lot.fields {
            if field.user_value.is_empty() || field.ai_value == field.user_value {
                continue;
            }
            if !matches!(field.name.as_str(), "area" | "frontage" | "depth") {
                continue;
            }
            if let (Some(ai), Some(user)) = (
                parse_measurement(&field.ai_value),
                parse_measurement(&field.user_value),
            ) {
                diffs.entry(field.name.as_str()).or_default().push(user - ai);
            }
        }
    }

    let mut patterns: Vec<(String, f64)> = diffs
        .into_iter()
        .filter_map(|(field, ds)| {
            if ds.len() < 2 {
                return None;
            }
            let all_same_sign = ds.iter().all(|d| *d > 0.0) || ds.iter().all(|d| *d < 0.0);
            let mean = ds.iter().sum::<f64>() / ds.len() as f64;
            (all_same_sign && mean.abs() > SYSTEMATIC_THRESHOLD).then(|| (field.to_string(), mean))
        })
        .collect();
    patterns.sort_by(|a, b| a.0.cmp(&b.0));
    patterns
}

pub fn box_calibration_context(feedback: &[BoxCalibration]) -> String {
    let mut examples: Vec<String> = Vec::new();
    for lot in feedback {
        let corrections: Vec<String> = lot
            .fields
            .iter()
            .filter(|f| !f.user_value.is_empty() && f.ai_value != f.user_value)
            .map(|f| format!("{}: AI=\"{}\" -> Correct=\"{}\"", f.name, f.ai_value, f.user_value))
            .collect();
        if !corrections.is_empty() {
            examples.push(format!("Lot {}: {}", lot.lot_number, corrections.join(", ")));
        }
    }

    if examples.is_empty() {
        return String::new();
    }

    let mut warnings = String::new();
    for (field, mean) in detect_systematic_errors(feedback) {
        warnings.push_str(&format!(
            "\n- {}: You consistently {} by ~{:.1}. Add {}{:.1} to all {} values.",
            field.to_uppercase(),
            if mean > 0.0 { "UNDERESTIMATED" } else { "OVERESTIMATED" },
            mean.abs(),
            if mean > 0.0 { "+" } else { "" },
            mean,
            field
        ));
    }

    let mut context = format!(
        "\nVISUAL CALIBRATION - USER DREW BOXES AROUND CORRECT VALUES:\n{}\n",
        examples.join("\n")
    );
    if !warnings.is_empty() {
        context.push_str(&format!("\nDETECTED SYSTEMATIC ERRORS:{warnings}\n"));
    }
    context.push_str(
        "\nCRITICAL: Apply these EXACT corrections to the sample lots, and apply the same patterns to ALL other lots.\n\
         For every lot, re-read the values from the image using the calibration as a guide.\n",
    );
    context
}

/// First-pass prompt: extract everything so the user can sample lots for
/// calibration.
pub fn calibration_prompt(correction_context: &str) -> String {
    format!(
        r#"You are analyzing a subdivision plan image. Extract ALL lot information visible.
{correction_context}
WHAT TO LOOK FOR:
- Lot labels: "Lot 101", "101", "L101" inside polygon boundaries
- Area text: "500 m2", "500sqm", "0.050 ha" (convert ha x 10000 to m2)
- Boundary lengths: numbers adjacent to boundary lines (e.g., "15.00", "32.50")
- Road names / road reserve outlines to identify frontage side

MEASUREMENT DEFINITIONS:
- **Lot Number**: Exact identifier as shown ("Lot 101", "101", "6101")
- **Area**: Total lot area in m2. Record the number only.
- **Frontage**: The lot boundary (or sum of boundaries) that abuts a road reserve.
  - CORNER LOTS: Primary frontage = longest road-abutting boundary; record secondary separately.
- **Depth**: Distance from frontage to rear boundary.
  - IRREGULAR LOTS: Use maximum perpendicular distance from frontage to rear.
  - BATTLE-AXE/HANDLE LOTS: Note as "handle lot" - depth may not be meaningful.
- **Street Name**: The road the primary frontage faces.

PITFALLS TO AVOID:
- Don't collapse corner lot's two frontages into one number
- Battle-axe lots have narrow access legs; treat carefully
- Dimension numbers are usually aligned with boundary lines or have dimension ticks
- Areas may be approximate on permit plans; POS values are authoritative

Return ONLY valid JSON (no markdown):
{{
  "lotsFound": [{{"lotNumber": "101", "area": "450", "frontage": "15", "frontageSecondary": "", "depth": "30", "streetName": "Main St", "notes": ""}}],
  "summary": "Found X lots on this page"
}}"#
    )
}

/// Second-pass prompt: re-extract with the calibration applied and emit
/// corrections against the stored values.
pub fn final_verify_prompt(
    lot_summary: &str,
    calibration_context: &str,
    correction_context: &str,
) -> String {
    format!(
        r#"Analyze this subdivision plan image VERY CAREFULLY.
{calibration_context}
{correction_context}
EXISTING DATABASE VALUES TO VERIFY:
{lot_summary}

YOUR TASK:
1. The calibration above shows EXACTLY what errors you made on sample lots
2. You MUST generate corrections for EVERY lot where the database value differs from what's in the image
3. For the calibrated sample lots, use the EXACT user-provided correct values
4. For all OTHER lots, re-read the image carefully - you likely made the same systematic errors

CRITICAL: Generate a "corrections" entry for EVERY value that needs to change. Compare each database value above against what you see in the image. If they differ, add a correction.

Return ONLY valid JSON (no markdown):
{{
  "lotsFound": [{{"lotNumber": "1", "area": "450", "frontage": "15", "depth": "30", "streetName": "Main St"}}],
  "corrections": [{{"lotNumber": "1", "field": "area", "currentValue": "400", "correctValue": "450", "confidence": 0.95}}],
  "newLots": [],
  "summary": "Applied calibration: corrected X values across Y lots"
}}"#
    )
}

/// One line per stored lot for embedding in a verify prompt.
pub fn lot_summary(existing: &[LotSnapshot]) -> String {
    existing
        .iter()
        .map(|lot| {
            format!(
                "Lot {}: area={}, frontage={}, depth={}, street={}",
                lot.lot_number,
                lot.area.as_deref().unwrap_or("?"),
                lot.frontage.as_deref().unwrap_or("?"),
                lot.depth.as_deref().unwrap_or("?"),
                lot.street_name.as_deref().unwrap_or("?")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn snapshot_field<'a>(lot: &'a LotSnapshot, field: &str) -> Option<&'a str> {
    match field {
        "area" => lot.area.as_deref(),
        "frontage" => lot.frontage.as_deref(),
        "depth" => lot.depth.as_deref(),
        "streetName" | "street_name" => lot.street_name.as_deref(),
        "status" => lot.status.as_deref(),
        _ => None,
    }
}

/// Attach database lot ids to model-emitted corrections. Models sometimes
/// prefix lot numbers with "Lot "; corrections for unknown lots are dropped.
pub fn attach_lot_ids(raw: Vec<RawCorrection>, existing: &[LotSnapshot]) -> Vec<Correction> {
    raw.into_iter()
        .filter_map(|c| {
            let lot = existing.iter().find(|l| {
                l.lot_number == c.lot_number || l.lot_number == format!("Lot {}", c.lot_number)
            })?;
            let current = c
                .current_value
                .clone()
                .or_else(|| snapshot_field(lot, &c.field).map(String::from))
                .unwrap_or_default();
            Some(Correction {
                lot_id: lot.id,
                lot_number: c.lot_number,
                field: c.field,
                current_value: current,
                new_value: c.correct_value.unwrap_or_default(),
                confidence: c.confidence,
                difference: None,
            })
        })
        .collect()
}

pub fn cross_reference_prompt(lot_numbers: &str) -> String {
    format!(
        r#"You are analyzing a PLAN OF SUBDIVISION (POS) - a survey-grade document prepared by a licensed surveyor.

POS CHARACTERISTICS:
- PS number (e.g., PS 9xxxxxx) once lodged/created
- Every lot labeled (Lot 1, Lot 2, Lot 101, etc.)
- Lot areas (almost always) in m2 or ha for large parcels
- Boundary dimensions (lengths) on most/all lot boundaries
- Bearings and survey control references may appear
- Road reserves, easements (E-1, E-2), restrictions, reserves, common property
- Title block, scale, north point, sheet numbering
- May be multiple sheets

TARGET LOT NUMBERS TO FIND: {lot_numbers}

EXTRACT FOR EACH LOT:
1. **Lot Number**: Exact as shown (normalize "Lot 101" = "101")
2. **Area**: In m2 (POS is authoritative - record exact value). Convert ha x 10000 to m2.
3. **Frontage**: Boundary length(s) abutting road reserve
   - CORNER LOTS: Primary frontage (longest road boundary) AND secondary frontage
   - Sum multiple segments if frontage is split
4. **Depth**: Distance from frontage to rear boundary
   - For irregular lots: max perpendicular distance from frontage to rear
5. **Street Name**: Road the primary frontage faces

WHAT TO LOOK FOR:
- Lot labels inside polygons: "Lot 101", "101", "L101"
- Area text near lot: "500 m2", "500sqm", "0.050 ha"
- Dimension numbers along boundary lines: "15.00", "32.50" (usually aligned with boundary or with dimension ticks)
- Road reserve labels to identify which boundary is frontage

PITFALLS:
- POS is the SOURCE OF TRUTH for areas and boundary lengths - use exact values
- Multi-sheet plans: lots may be on different pages
- Don't confuse easement dimensions with lot boundaries
- Corner lots have TWO frontages - capture both
- Battle-axe lots: frontage is the narrow access leg width

Return ONLY valid JSON:
{{"lotsFound": [{{"lotNumber": "101", "area": "450.5", "frontage": "15.00", "frontageSecondary": "12.00", "depth": "30.00", "streetName": "Main St", "confidence": "high", "notes": ""}}], "summary": "Found X lots on this page"}}"#
    )
}

fn outside_tolerance(extracted: Option<&str>, existing: Option<&str>, tolerance: f64) -> bool {
    let Some(extracted) = extracted.filter(|s| !s.is_empty()) else {
        return false;
    };
    let ext = parse_measurement(extracted).unwrap_or(0.0);
    let cur = existing.and_then(parse_measurement).unwrap_or(0.0);
    (ext - cur).abs() > tolerance
}

/// Compare survey-extracted lots against stored lots. Returns per-lot match
/// records and the corrections implied by the discrepancies.
pub fn cross_reference(
    existing: &[LotSnapshot],
    extracted: &[ExtractedLot],
) -> (Vec<CrossRefMatch>, Vec<Correction>) {
    // keep last occurrence per lot number
    let mut unique: HashMap<&str, &ExtractedLot> = HashMap::new();
    for lot in extracted {
        unique.insert(lot.lot_number.as_str(), lot);
    }

    let mut matches = Vec::new();
    let mut corrections = Vec::new();

    for lot in existing {
        let Some(found) = unique.get(lot.lot_number.as_str()) else {
            continue;
        };

        let mut discrepancies = Vec::new();
        let checks = [
            ("area", found.area.as_deref(), lot.area.as_deref(), AREA_TOLERANCE),
            ("frontage", found.frontage.as_deref(), lot.frontage.as_deref(), LENGTH_TOLERANCE),
            ("depth", found.depth.as_deref(), lot.depth.as_deref(), LENGTH_TOLERANCE),
        ];
        for (field, ext, cur, tolerance) in checks {
            if outside_tolerance(ext, cur, tolerance) {
                discrepancies.push(Discrepancy {
                    field: field.to_string(),
                    existing: cur.unwrap_or("").to_string(),
                    extracted: ext.unwrap_or("").to_string(),
                });
            }
        }

        for disc in &discrepancies {
            corrections.push(Correction {
                lot_id: lot.id,
                lot_number: lot.lot_number.clone(),
                field: disc.field.clone(),
                current_value: disc.existing.clone(),
                new_value: disc.extracted.clone(),
                confidence: Some(SURVEY_CONFIDENCE),
                difference: None,
            });
        }

        matches.push(CrossRefMatch {
            lot_number: lot.lot_number.clone(),
            lot_id: lot.id,
            has_discrepancy: !discrepancies.is_empty(),
            discrepancies,
            existing: LotMeasurements {
                area: lot.area.clone(),
                frontage: lot.frontage.clone(),
                depth: lot.depth.clone(),
                street_name: lot.street_name.clone(),
            },
            extracted: LotMeasurements {
                area: found.area.clone(),
                frontage: found.frontage.clone(),
                depth: found.depth.clone(),
                street_name: found.street_name.clone(),
            },
        });
    }

    (matches, corrections)
}

/// De-duplicate POS lots by lot number, preferring the record that carries
/// more easement detail.
pub fn dedupe_pos_lots(lots: Vec<PosLot>) -> Vec<PosLot> {
    let mut unique: Vec<PosLot> = Vec::new();
    for lot in lots {
        match unique.iter_mut().find(|l| l.lot_number == lot.lot_number) {
            Some(existing) => {
                if lot.easements.len() > existing.easements.len() {
                    *existing = lot;
                }
            }
            None => unique.push(lot),
        }
    }
    unique
}

fn signed_difference(ext: f64, cur: f64, unit: &str, decimals: usize) -> String {
    let diff = ext - cur;
    format!("{}{:.*}{}", if diff > 0.0 { "+" } else { "" }, decimals, diff, unit)
}

/// Compare POS lots against stored lots. Extracted lots with no stored
/// counterpart are returned separately as new lots.
pub fn compare_pos(
    existing: &[LotSnapshot],
    pos_lots: Vec<PosLot>,
) -> (Vec<Comparison>, Vec<Correction>, Vec<PosLot>) {
    let mut unique = dedupe_pos_lots(pos_lots);
    let mut comparisons = Vec::new();
    let mut corrections = Vec::new();

    for lot in existing {
        let found_idx = unique.iter().position(|l| l.lot_number == lot.lot_number);
        let Some(idx) = found_idx else {
            comparisons.push(Comparison {
                lot_number: lot.lot_number.clone(),
                lot_id: lot.id,
                status: ComparisonStatus::Match,
                existing: LotMeasurements {
                    area: lot.area.clone(),
                    frontage: lot.frontage.clone(),
                    depth: lot.depth.clone(),
                    street_name: lot.street_name.clone(),
                },
                extracted: LotMeasurements::default(),
                variances: Vec::new(),
                new_info: NewInfo::default(),
            });
            continue;
        };
        let found = unique.remove(idx);

        let mut variances = Vec::new();
        if outside_tolerance(found.area.as_deref(), lot.area.as_deref(), AREA_TOLERANCE) {
            let ext = found.area.as_deref().and_then(parse_measurement).unwrap_or(0.0);
            let cur = lot.area.as_deref().and_then(parse_measurement).unwrap_or(0.0);
            variances.push(Variance {
                field: "area".into(),
                existing: lot.area.clone().unwrap_or_else(|| "-".into()),
                extracted: found.area.clone().unwrap_or_default(),
                difference: Some(signed_difference(ext, cur, " m2", 1)),
            });
        }
        if outside_tolerance(found.frontage.as_deref(), lot.frontage.as_deref(), LENGTH_TOLERANCE) {
            let ext = found.frontage.as_deref().and_then(parse_measurement).unwrap_or(0.0);
            let cur = lot.frontage.as_deref().and_then(parse_measurement).unwrap_or(0.0);
            variances.push(Variance {
                field: "frontage".into(),
                existing: lot.frontage.clone().unwrap_or_else(|| "-".into()),
                extracted: found.frontage.clone().unwrap_or_default(),
                difference: Some(signed_difference(ext, cur, "m", 2)),
            });
        }
        if outside_tolerance(found.depth.as_deref(), lot.depth.as_deref(), LENGTH_TOLERANCE) {
            let ext = found.depth.as_deref().and_then(parse_measurement).unwrap_or(0.0);
            let cur = lot.depth.as_deref().and_then(parse_measurement).unwrap_or(0.0);
            variances.push(Variance {
                field: "depth".into(),
                existing: lot.depth.clone().unwrap_or_else(|| "-".into()),
                extracted: found.depth.clone().unwrap_or_default(),
                difference: Some(signed_difference(ext, cur, "m", 2)),
            });
        }

        let new_info = NewInfo {
            boundaries: found.boundaries.clone(),
            easements: found.easements.clone(),
            encumbrances: found.encumbrances.clone(),
            restrictions: found.restrictions.clone(),
        };

        let status = if !variances.is_empty() {
            ComparisonStatus::Variance
        } else if !new_info.is_empty() {
            ComparisonStatus::NewData
        } else {
            ComparisonStatus::Match
        };

        for variance in &variances {
            corrections.push(Correction {
                lot_id: lot.id,
                lot_number: lot.lot_number.clone(),
                field: variance.field.clone(),
                current_value: variance.existing.clone(),
                new_value: variance.extracted.clone(),
                confidence: None,
                difference: variance.difference.clone(),
            });
        }

        comparisons.push(Comparison {
            lot_number: lot.lot_number.clone(),
            lot_id: lot.id,
            status,
            existing: LotMeasurements {
                area: lot.area.clone(),
                frontage: lot.frontage.clone(),
                depth: lot.depth.clone(),
                street_name: lot.street_name.clone(),
            },
            extracted: LotMeasurements {
                area: found.area.clone(),
                frontage: found.frontage.clone(),
                depth: found.depth.clone(),
                street_name: found.street_name.clone(),
            },
            variances,
            new_info,
        });
    }

    // whatever is left was found on the plan but is not in the database
    (comparisons, corrections, unique)
}

pub fn pos_analysis_prompt(lot_numbers: &str) -> String {
    format!(
        r#"You are analyzing a PLAN OF SUBDIVISION (POS) - a survey-grade legal document.

DOCUMENT TYPE: Plan of Subdivision (PS number e.g., PS 9xxxxxx)
This is the AUTHORITATIVE source for lot boundaries, areas, and encumbrances.

TARGET LOTS: {lot_numbers}

EXTRACT FOR EACH LOT:

1. **BOUNDARIES & DIMENSIONS**:
   - Lot Number: Exact as shown
   - Area: In m2 (convert ha x 10000). THIS IS AUTHORITATIVE.
   - Frontage: Primary road boundary length (meters)
   - Frontage Secondary: For corner lots, the secondary road boundary
   - Depth: Distance from frontage to rear (max perpendicular for irregular lots)
   - Street Name: Road the primary frontage faces
   - All boundary lengths with bearings if shown

2. **EASEMENTS** (Critical - look for E-1, E-2, etc.):
   - Easement ID: E-1, E-2, etc.
   - Type: drainage, sewerage, electricity, carriageway, pedestrian access, etc.
   - Width: e.g., "2.0m wide", "3.0m wide"
   - Purpose: What the easement is for
   - Beneficiary: Who benefits (council, electricity company, lot owner, etc.)
   - Which lots are affected

3. **ENCUMBRANCES & RESTRICTIONS**:
   - Restrictive covenants (building envelopes, materials, heights)
   - Section 173 agreements
   - Caveats
   - Building exclusion zones
   - Any notations affecting the lot

4. **OTHER IMPACTS**:
   - Common property boundaries
   - Reserve land
   - Drainage reserves
   - Public open space contributions
   - Any notes or annotations affecting the lot

WHERE TO LOOK:
- Lot polygons with labels inside
- Area text: "450 m2", "0.045 ha"
- Boundary dimensions along lines: "15.00", "32.50"
- Easement hatching (diagonal lines) with labels E-1, E-2
- Legend/schedule of easements
- Notes section
- Title block annotations

Return ONLY valid JSON:
{{
  "psNumber": "PS 9xxxxxx",
  "lotsAnalyzed": [
    {{
      "lotNumber": "101",
      "area": "450.5",
      "frontage": "15.00",
      "frontageSecondary": "12.00",
      "depth": "30.00",
      "streetName": "Main Street",
      "boundaries": [
        {{"length": "15.00", "bearing": "N45E", "description": "front boundary to Main Street"}}
      ],
      "easements": [
        {{"id": "E-1", "type": "drainage", "width": "2.0m", "purpose": "stormwater drainage", "beneficiary": "Council"}}
      ],
      "encumbrances": [
        {{"type": "restriction", "description": "Building envelope - setback 6m from front boundary"}}
      ],
      "restrictions": [
        {{"type": "covenant", "description": "Single dwelling only"}}
      ],
      "notes": "Corner lot",
      "confidence": "high"
    }}
  ],
  "generalEasements": [
    {{"id": "E-1", "type": "drainage", "width": "2.0m", "affectedLots": ["101", "102", "103"]}}
  ],
  "summary": "Analyzed X lots, found Y easements affecting Z lots"
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::extraction::BoxCalibrationField;

    fn snapshot(id: i32, number: &str, area: &str, frontage: &str, depth: &str) -> LotSnapshot {
        LotSnapshot {
            id,
            lot_number: number.to_string(),
            area: Some(area.to_string()),
            frontage: Some(frontage.to_string()),
            depth: Some(depth.to_string()),
            street_name: Some("Main St".to_string()),
            status: None,
        }
    }

    fn extracted(number: &str, area: &str, frontage: &str, depth: &str) -> ExtractedLot {
        ExtractedLot {
            lot_number: number.to_string(),
            area: Some(area.to_string()),
            frontage: Some(frontage.to_string()),
            depth: Some(depth.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn cross_reference_flags_values_outside_tolerance() {
        let existing = vec![snapshot(1, "101", "450", "15.0", "30.0")];
        // area off by 1.0, frontage within 0.1, depth off by 0.2
        let found = vec![extracted("101", "451", "15.05", "30.2")];

        let (matches, corrections) = cross_reference(&existing, &found);
        assert_eq!(matches.len(), 1);
        assert!(matches[0].has_discrepancy);
        let fields: Vec<&str> = corrections.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["area", "depth"]);
        assert!(corrections.iter().all(|c| c.confidence == Some(SURVEY_CONFIDENCE)));
    }

    #[test]
    fn cross_reference_within_tolerance_is_clean() {
        let existing = vec![snapshot(1, "101", "450", "15.0", "30.0")];
        let found = vec![extracted("101", "450.3", "15.05", "30.05")];

        let (matches, corrections) = cross_reference(&existing, &found);
        assert!(!matches[0].has_discrepancy);
        assert!(corrections.is_empty());
    }

    #[test]
    fn attach_lot_ids_tolerates_lot_prefix() {
        let existing = vec![LotSnapshot {
            id: 9,
            lot_number: "Lot 101".to_string(),
            area: Some("400".to_string()),
            frontage: None,
            depth: None,
            street_name: None,
            status: None,
        }];
        let raw = vec![RawCorrection {
            lot_number: "101".to_string(),
            field: "area".to_string(),
            current_value: None,
            correct_value: Some("450".to_string()),
            confidence: Some(0.95),
        }];

        let corrections = attach_lot_ids(raw, &existing);
        assert_eq!(corrections.len(), 1);
        assert_eq!(corrections[0].lot_id, 9);
        assert_eq!(corrections[0].current_value, "400");
        assert_eq!(corrections[0].new_value, "450");
    }

    #[test]
    fn attach_lot_ids_drops_unknown_lots() {
        let raw = vec![RawCorrection {
            lot_number: "999".to_string(),
            field: "area".to_string(),
            current_value: None,
            correct_value: Some("450".to_string()),
            confidence: None,
        }];
        assert!(attach_lot_ids(raw, &[]).is_empty());
    }

    fn box_lot(number: &str, fields: Vec<(&str, &str, &str)>) -> BoxCalibration {
        BoxCalibration {
            lot_number: number.to_string(),
            fields: fields
                .into_iter()
                .map(|(name, ai, user)| BoxCalibrationField {
                    name: name.to_string(),
                    ai_value: ai.to_string(),
                    user_value: user.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn systematic_error_detected_when_diffs_share_sign() {
        let feedback = vec![
            box_lot("101", vec![("frontage", "10", "15")]),
            box_lot("102", vec![("frontage", "11", "16")]),
        ];
        let patterns = detect_systematic_errors(&feedback);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].0, "frontage");
        assert!((patterns[0].1 - 5.0).abs() < f64::EPSILON);

        let context = box_calibration_context(&feedback);
        assert!(context.contains("UNDERESTIMATED"));
        assert!(context.contains("frontage"));
    }

    #[test]
    fn mixed_sign_diffs_are_not_systematic() {
        let feedback = vec![
            box_lot("101", vec![("depth", "30", "32")]),
            box_lot("102", vec![("depth", "33", "31")]),
        ];
        assert!(detect_systematic_errors(&feedback).is_empty());
    }

    #[test]
    fn single_diff_is_not_systematic() {
        let feedback = vec![box_lot("101", vec![("area", "400", "450")])];
        assert!(detect_systematic_errors(&feedback).is_empty());
    }

    #[test]
    fn compare_pos_classifies_statuses() {
        let existing = vec![
            snapshot(1, "101", "450", "15.0", "30.0"),
            snapshot(2, "102", "380", "12.0", "32.0"),
            snapshot(3, "103", "500", "16.0", "31.0"),
        ];
        let pos = vec![
            // variance on area
            PosLot {
                lot_number: "101".into(),
                area: Some("452".into()),
                frontage: Some("15.0".into()),
                depth: Some("30.0".into()),
                frontage_secondary: None,
                street_name: None,
                boundaries: vec![],
                easements: vec![],
                encumbrances: vec![],
                restrictions: vec![],
                notes: None,
                confidence: None,
            },
            // clean match but carries an easement
            PosLot {
                lot_number: "102".into(),
                area: Some("380".into()),
                frontage: Some("12.0".into()),
                depth: Some("32.0".into()),
                frontage_secondary: None,
                street_name: None,
                boundaries: vec![],
                easements: vec![crate::domain::extraction::Easement {
                    id: "E-1".into(),
                    r#type: "drainage".into(),
                    width: Some("2.0m".into()),
                    purpose: None,
                    beneficiary: None,
                    affected_lots: vec![],
                }],
                encumbrances: vec![],
                restrictions: vec![],
                notes: None,
                confidence: None,
            },
            // not in database
            PosLot {
                lot_number: "201".into(),
                area: Some("600".into()),
                frontage: None,
                depth: None,
                frontage_secondary: None,
                street_name: None,
                boundaries: vec![],
                easements: vec![],
                encumbrances: vec![],
                restrictions: vec![],
                notes: None,
                confidence: None,
            },
        ];

        let (comparisons, corrections, new_lots) = compare_pos(&existing, pos);
        assert_eq!(comparisons.len(), 3);
        assert_eq!(comparisons[0].status, ComparisonStatus::Variance);
        assert_eq!(comparisons[1].status, ComparisonStatus::NewData);
        // lot 103 absent from the plan counts as a match with no extracted data
        assert_eq!(comparisons[2].status, ComparisonStatus::Match);
        assert_eq!(corrections.len(), 1);
        assert_eq!(corrections[0].difference.as_deref(), Some("+2.0 m2"));
        assert_eq!(new_lots.len(), 1);
        assert_eq!(new_lots[0].lot_number, "201");
    }

    #[test]
    fn dedupe_prefers_richer_easement_record() {
        let bare = PosLot {
            lot_number: "101".into(),
            area: None,
            frontage: None,
            frontage_secondary: None,
            depth: None,
            street_name: None,
            boundaries: vec![],
            easements: vec![],
            encumbrances: vec![],
            restrictions: vec![],
            notes: None,
            confidence: None,
        };
        let mut rich = bare.clone();
        rich.easements.push(crate::domain::extraction::Easement {
            id: "E-1".into(),
            r#type: "sewerage".into(),
            width: None,
            purpose: None,
            beneficiary: None,
            affected_lots: vec![],
        });

        let deduped = dedupe_pos_lots(vec![bare, rich]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].easements.len(), 1);
    }
}
