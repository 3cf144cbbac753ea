//! Prompt construction and reply parsing for plan extraction.
//!
//! Vision models return JSON wrapped in varying amounts of markdown and
//! chatter, frequently truncated mid-array. Parsing here is total: any reply,
//! however mangled, produces an ExtractionResult rather than an error.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::domain::extraction::{ExtractedLot, ExtractedStage, ExtractionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionType {
    /// Single-stage plan: flat lot list
    Stage,
    /// Multi-stage plan: lots grouped per stage
    Precinct,
}

impl ExtractionType {
    pub fn parse(s: &str) -> Self {
        match s {
            "precinct" => Self::Precinct,
            _ => Self::Stage,
        }
    }
}

const STAGE_PROMPT: &str = r#"You are analyzing a PERMIT PLAN or PLAN OF SUBDIVISION image. Extract ALL lot information visible.

DOCUMENT TYPES:
- **Permit Plans**: Show intended layout, staging, lot outlines. May have approximate dimensions.
- **Plan of Subdivision (POS)**: Survey-grade document with PS number, precise areas and boundary dimensions.

WHAT TO LOOK FOR:
- Lot labels: "Lot 101", "101", "L101" inside polygon boundaries
- Area text: "500 m2", "500sqm", "0.050 ha" (convert ha to m2 by multiplying by 10000)
- Boundary lengths: numbers adjacent to boundary lines (e.g., "15.00", "32.50")
- Road names / road reserve outlines to identify frontage side
- Stage boundary lines and labels (Stage 1, Stage 2...)

MEASUREMENT DEFINITIONS:
- **Lot Number**: Exact identifier as shown ("Lot 101", "101", "6101")
- **Area**: Total lot area in m2. Record the number only.
- **Frontage**: The lot boundary (or sum of boundaries) that abuts a road reserve.
  - For CORNER LOTS: Primary frontage = longest road-abutting boundary; note secondary frontage separately.
- **Depth**: Distance from frontage to rear boundary.
  - For IRREGULAR LOTS: Use maximum perpendicular distance from frontage to rear.
  - For BATTLE-AXE/HANDLE LOTS: Depth may not be meaningful; note as "handle lot".
- **Street Name**: The road the primary frontage faces.

PITFALLS TO AVOID:
- Don't collapse corner lot's two frontages into one number
- Battle-axe lots have narrow access legs; treat carefully
- Areas may be "approx." on permit plans

Return ONLY valid JSON, no markdown:
{"lots": [{"lotNumber": "101", "area": "450", "frontage": "15", "frontageSecondary": "", "depth": "30", "streetName": "Main St", "notes": ""}], "summary": "Found X lots"}"#;

const PRECINCT_PROMPT: &str = r#"You are analyzing a PERMIT PLAN (endorsed planning document) showing a MULTI-STAGE SUBDIVISION.

DOCUMENT CHARACTERISTICS:
- Site/subdivision layout ("Proposed Subdivision Plan", "Plan of Development", "Masterplan", "Staging Plan")
- Lot outlines (polylines), lot numbers, sometimes lot areas
- Road names, road reserves, reserves, common property
- Stage boundary lines and labels (Stage 1, Stage 2...)
- Legend, north point, scale bar, drawing number, revision

WHAT TO EXTRACT:
1. **Stage Information**: Stage names/numbers ("Stage 1", "Stage 61A", "61A")
2. **For EACH lot within each stage**:
   - Lot Number: Exact as shown ("Lot 101", "101", "6101")
   - Area: In m2 (convert ha x 10000). May be approximate on permit plans.
   - Frontage: Boundary abutting road reserve (meters)
     - CORNER LOTS: Record primary (longest road boundary) AND secondary frontage
   - Depth: Perpendicular distance from frontage to rear (meters)
     - IRREGULAR LOTS: Use max perpendicular depth
   - Street Name: Road the primary frontage faces

FRONTAGE & DEPTH RULES:
- Frontage = lot boundary that abuts a road reserve
- Depth = distance from road boundary back to rear boundary
- For irregular lots: depth = maximum perpendicular distance from frontage to rear
- Battle-axe/handle lots: frontage is the narrow access leg width; note in comments

LOOK FOR:
- Lot labels inside polygons: "Lot 101", "101", "L101"
- Area text: "500 m2", "500sqm", "0.050 ha"
- Dimension numbers along boundary lines: "15.00", "32.50"
- Road reserve labels to identify frontage side

PITFALLS:
- Permit plans may omit areas or show "approx." values
- Don't miss lots on other parts of the plan
- Corner lots have TWO frontages - capture both
- Multi-sheet plans may have lots on different pages

IMPORTANT: If there is more data visible that you cannot include due to response limits, add this to your response:
"hasMore": true, "remainingStages": ["Stage X", "Stage Y"], "estimatedRemainingLots": 50

CRITICAL: You MUST extract EVERY individual lot with its data. Do NOT just list stage summaries - extract the actual lot numbers, areas, and dimensions for each lot visible in the image. If you cannot read a value, use "unknown" but still include the lot entry.

Return ONLY valid JSON:
{"stages": [{"stageName": "Stage 1", "stageNumber": "1", "lots": [{"lotNumber": "101", "area": "450", "frontage": "15", "frontageSecondary": "12", "depth": "30", "streetName": "Main St", "notes": "corner lot"}]}], "summary": "X stages, Y total lots", "hasMore": false}"#;

/// Build the extraction prompt, layering user hints and continuation context
/// ahead of the base instructions.
pub fn extraction_prompt(
    extraction_type: ExtractionType,
    hints: &str,
    continue_from: &[String],
    exclude_stages: &[String],
) -> String {
    let mut prompt = match extraction_type {
        ExtractionType::Stage => STAGE_PROMPT.to_string(),
        ExtractionType::Precinct => PRECINCT_PROMPT.to_string(),
    };

    if !hints.trim().is_empty() {
        prompt = format!(
            "USER-PROVIDED CONTEXT (use this to improve extraction accuracy):\n{}\n\n\
             IMPORTANT: Use the above context to:\n\
             - Identify the correct stage names and numbers\n\
             - Understand the lot numbering pattern (e.g., if lots start with stage number)\n\
             - Focus on the specific stages and streets mentioned\n\
             - Validate your extraction against this context\n\n{}",
            hints.trim(),
            prompt
        );
    }

    if !continue_from.is_empty() {
        prompt = format!(
            "CONTINUATION REQUEST: You previously extracted some stages. Now extract ONLY these remaining stages: {}.\n\
             DO NOT extract stages: {} (already extracted).\n\n{}",
            continue_from.join(", "),
            exclude_stages.join(", "),
            prompt
        );
    }

    prompt
}

fn fence_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").ok())
        .as_ref()
}

fn trailing_comma_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*([}\]])").ok()).as_ref()
}

/// Pull the JSON object out of a model reply: strip code fences, take the
/// outermost braces, drop trailing commas.
pub fn clean_model_json(content: &str) -> String {
    let mut text = match fence_re() {
        Some(re) => re.replace_all(content, "$1").into_owned(),
        None => content.to_string(),
    };

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            text = text[start..=end].to_string();
        }
    }

    if let Some(re) = trailing_comma_re() {
        text = re.replace_all(&text, "$1").into_owned();
    }

    text
}

/// Parse a model reply into JSON after cleanup. None if the reply holds no
/// parseable object.
pub fn parse_model_json(content: &str) -> Option<Value> {
    serde_json::from_str(&clean_model_json(content)).ok()
}

/// Parse an extraction reply. Truncated JSON falls back to recovering
/// whatever complete lot objects are present; nothing here ever errors.
pub fn parse_extraction_reply(content: &str) -> ExtractionResult {
    if let Some(value) = parse_model_json(content) {
        if let Ok(result) = serde_json::from_value::<ExtractionResult>(value) {
            return result;
        }
    }

    // Truncated reply: salvage individual lot objects
    let lots = recover_partial_lots(content);
    if !lots.is_empty() {
        let n = lots.len();
        return ExtractionResult {
            lots,
            summary: Some(format!("Extracted {n} lots (partial recovery)")),
            ..Default::default()
        };
    }

    let preview: String = content.chars().take(200).collect();
    ExtractionResult::empty_with_summary(format!("Could not parse AI response. Raw: {preview}..."))
}

fn recover_partial_lots(content: &str) -> Vec<ExtractedLot> {
    static LOTS_ARRAY: OnceLock<Option<Regex>> = OnceLock::new();
    static LOT_OBJECT: OnceLock<Option<Regex>> = OnceLock::new();

    let Some(array_re) = LOTS_ARRAY
        .get_or_init(|| Regex::new(r#"(?s)"lots"\s*:\s*\[(.*)"#).ok())
        .as_ref()
    else {
        return Vec::new();
    };
    let Some(object_re) = LOT_OBJECT
        .get_or_init(|| Regex::new(r"\{[^{}]+\}").ok())
        .as_ref()
    else {
        return Vec::new();
    };

    let Some(captures) = array_re.captures(content) else {
        return Vec::new();
    };
    let Some(body) = captures.get(1) else {
        return Vec::new();
    };

    object_re
        .find_iter(body.as_str())
        .filter_map(|m| serde_json::from_str::<ExtractedLot>(m.as_str()).ok())
        .filter(|lot| !lot.lot_number.is_empty())
        .collect()
}

/// Merge per-page results. Stages merge by name with lots deduplicated by
/// lot number (first page wins); flat lot lists deduplicate the same way.
pub fn merge_extraction_results(
    results: Vec<ExtractionResult>,
    extraction_type: ExtractionType,
) -> ExtractionResult {
    let page_count = results.len();

    match extraction_type {
        ExtractionType::Precinct => {
            let mut stage_map: BTreeMap<String, ExtractedStage> = BTreeMap::new();
            let mut order: Vec<String> = Vec::new();

            for result in results {
                for stage in result.stages {
                    let key = if stage.stage_name.is_empty() {
                        stage
                            .stage_number
                            .clone()
                            .unwrap_or_else(|| "Unknown".to_string())
                    } else {
                        stage.stage_name.clone()
                    };

                    match stage_map.get_mut(&key) {
                        Some(existing) => {
                            for lot in stage.lots {
                                if !existing.lots.iter().any(|l| l.lot_number == lot.lot_number) {
                                    existing.lots.push(lot);
                                }
                            }
                        }
                        None => {
                            order.push(key.clone());
                            stage_map.insert(key, stage);
                        }
                    }
                }
            }

            let stages: Vec<ExtractedStage> = order
                .into_iter()
                .filter_map(|k| stage_map.remove(&k))
                .collect();
            let total_lots: usize = stages.iter().map(|s| s.lots.len()).sum();

            ExtractionResult {
                summary: Some(format!(
                    "Found {} stages with {} total lots (from {} pages)",
                    stages.len(),
                    total_lots,
                    page_count
                )),
                stages,
                ..Default::default()
            }
        }
        ExtractionType::Stage => {
            let mut lots: Vec<ExtractedLot> = Vec::new();
            for result in results {
                for lot in result.lots {
                    if !lots.iter().any(|l| l.lot_number == lot.lot_number) {
                        lots.push(lot);
                    }
                }
            }

            ExtractionResult {
                summary: Some(format!(
                    "Found {} lots (from {} pages)",
                    lots.len(),
                    page_count
                )),
                lots,
                ..Default::default()
            }
        }
    }
}

/// OCR prompt for a small cropped image region.
pub fn ocr_prompt(field_type: &str) -> String {
    let mut prompt = String::from("Extract the text/number from this image region. ");
    prompt.push_str(match field_type {
        "area" => "This should be an area measurement (likely in square meters or sqm). Return ONLY the numeric value with unit if shown (e.g., \"450 sqm\" or \"450\").",
        "frontage" => "This should be a frontage measurement (width in meters). Return ONLY the numeric value (e.g., \"15\" or \"15.5m\").",
        "depth" => "This should be a depth measurement (length in meters). Return ONLY the numeric value (e.g., \"30\" or \"30.2m\").",
        _ => "Return ONLY the text or number visible in this region.",
    });
    prompt.push_str(" Do not include any explanation, just the value.");
    prompt
}

/// Trim an OCR reply down to the bare value.
pub fn clean_ocr_value(raw: &str) -> String {
    static PREFIX: OnceLock<Option<Regex>> = OnceLock::new();
    static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();

    let mut value = raw.trim().to_string();
    if let Some(re) = PREFIX
        .get_or_init(|| {
            Regex::new(r"(?i)^(the |value is |it shows |this is |area:|frontage:|depth:)\s*").ok()
        })
        .as_ref()
    {
        value = re.replace(&value, "").trim().to_string();
    }

    if let Some(re) = NUMBER
        .get_or_init(|| Regex::new(r"(?i)[\d.,]+\s*(?:sqm|sq\.?\s*m|m2|m|meters?)?").ok())
        .as_ref()
    {
        if let Some(m) = re.find(&value) {
            value = m.as_str().trim().to_string();
        }
    }

    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json() {
        let reply = "Here you go:\n```json\n{\"lots\": [{\"lotNumber\": \"101\", \"area\": \"450\"}], \"summary\": \"Found 1 lots\"}\n```";
        let result = parse_extraction_reply(reply);
        assert_eq!(result.lots.len(), 1);
        assert_eq!(result.lots[0].lot_number, "101");
    }

    #[test]
    fn fixes_trailing_commas() {
        let reply = r#"{"lots": [{"lotNumber": "101", "area": "450",}], "summary": "x",}"#;
        let result = parse_extraction_reply(reply);
        assert_eq!(result.lots.len(), 1);
    }

    #[test]
    fn takes_outermost_object_amid_chatter() {
        let reply = "Sure! {\"lots\": [{\"lotNumber\": \"5\"}]} Hope that helps.";
        let result = parse_extraction_reply(reply);
        assert_eq!(result.lots.len(), 1);
        assert_eq!(result.lots[0].lot_number, "5");
    }

    #[test]
    fn recovers_lots_from_truncated_json() {
        let reply = r#"{"lots": [{"lotNumber": "101", "area": "450"}, {"lotNumber": "102", "area": "380"}, {"lotNumber": "103", "are"#;
        let result = parse_extraction_reply(reply);
        assert_eq!(result.lots.len(), 2);
        assert!(result
            .summary
            .as_deref()
            .is_some_and(|s| s.contains("partial recovery")));
    }

    #[test]
    fn garbage_reply_yields_empty_result() {
        let result = parse_extraction_reply("I could not find any lots in this image, sorry.");
        assert!(result.is_empty());
        assert!(result.summary.is_some());
    }

    #[test]
    fn merge_precinct_dedupes_lots_within_stage() {
        let lot = |n: &str| ExtractedLot {
            lot_number: n.to_string(),
            ..Default::default()
        };
        let page = |stage: &str, lots: Vec<ExtractedLot>| ExtractionResult {
            stages: vec![ExtractedStage {
                stage_name: stage.to_string(),
                stage_number: None,
                lots,
            }],
            ..Default::default()
        };

        let merged = merge_extraction_results(
            vec![
                page("Stage 1", vec![lot("101"), lot("102")]),
                page("Stage 1", vec![lot("102"), lot("103")]),
                page("Stage 2", vec![lot("201")]),
            ],
            ExtractionType::Precinct,
        );

        assert_eq!(merged.stages.len(), 2);
        assert_eq!(merged.stages[0].lots.len(), 3);
        assert_eq!(merged.stages[1].lots.len(), 1);
        assert!(merged
            .summary
            .as_deref()
            .is_some_and(|s| s.contains("2 stages with 4 total lots")));
    }

    #[test]
    fn merge_stage_keeps_first_occurrence() {
        let lot = |n: &str, area: &str| ExtractedLot {
            lot_number: n.to_string(),
            area: Some(area.to_string()),
            ..Default::default()
        };
        let page = |lots: Vec<ExtractedLot>| ExtractionResult {
            lots,
            ..Default::default()
        };

        let merged = merge_extraction_results(
            vec![
                page(vec![lot("101", "450")]),
                page(vec![lot("101", "999"), lot("102", "380")]),
            ],
            ExtractionType::Stage,
        );

        assert_eq!(merged.lots.len(), 2);
        assert_eq!(merged.lots[0].area.as_deref(), Some("450"));
    }

    #[test]
    fn continuation_prefix_lists_stages() {
        let prompt = extraction_prompt(
            ExtractionType::Precinct,
            "",
            &["Stage 3".to_string()],
            &["Stage 1".to_string(), "Stage 2".to_string()],
        );
        assert!(prompt.starts_with("CONTINUATION REQUEST"));
        assert!(prompt.contains("ONLY these remaining stages: Stage 3"));
        assert!(prompt.contains("DO NOT extract stages: Stage 1, Stage 2"));
    }

    #[test]
    fn hints_lead_the_prompt() {
        let prompt = extraction_prompt(
            ExtractionType::Stage,
            "Lots are numbered 61xx for Stage 61",
            &[],
            &[],
        );
        assert!(prompt.starts_with("USER-PROVIDED CONTEXT"));
        assert!(prompt.contains("61xx"));
    }

    #[test]
    fn ocr_value_cleanup() {
        assert_eq!(clean_ocr_value("The value is 450 sqm"), "450 sqm");
        assert_eq!(clean_ocr_value("area: 15.5m"), "15.5m");
        assert_eq!(clean_ocr_value("  30.2  "), "30.2");
    }
}
