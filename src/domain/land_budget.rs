//! Land-budget line items and the fixed category catalogue.
//!
//! The catalogue mirrors the planning-scheme structure: site area, transport,
//! community, education, open space (encumbered/credited), net residential
//! area (residential + roads) and non-residential areas, with calculated
//! totals interleaved. Users may add custom subcategories; only those are
//! deletable.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LandBudgetItem {
    pub id: i32,
    pub precinct_id: Option<i32>,
    pub stage_id: Option<i32>,
    pub category: String,
    pub subcategory: Option<String>,
    /// User-defined label for custom subcategories
    pub custom_name: Option<String>,
    pub area_ha: Option<Decimal>,
    pub is_custom: i32,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandBudgetItemInput {
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub area_ha: Option<Decimal>,
    #[serde(default)]
    pub is_custom: Option<bool>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subcategory {
    pub key: &'static str,
    pub name: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_percent_of_nsa: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub key: &'static str,
    pub name: &'static str,
    pub is_header: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_calculated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<&'static str>,
    pub subcategories: Vec<Subcategory>,
}

fn sub(key: &'static str, name: &'static str) -> Subcategory {
    Subcategory {
        key,
        name,
        is_percent_of_nsa: false,
    }
}

/// The fixed category structure. Not user-editable.
pub fn category_catalogue() -> Vec<Category> {
    vec![
        Category {
            key: "totalSiteArea",
            name: "Total Site Area",
            is_header: true,
            is_calculated: false,
            parent: None,
            subcategories: vec![],
        },
        Category {
            key: "transport",
            name: "Transport",
            is_header: true,
            is_calculated: false,
            parent: None,
            subcategories: vec![
                sub("arterialRoads", "Arterial Roads"),
                sub("roadWidening", "Road Widening"),
            ],
        },
        Category {
            key: "community",
            name: "Community",
            is_header: true,
            is_calculated: false,
            parent: None,
            subcategories: vec![
                sub("community", "Community"),
                sub("communityConstructed", "Community (constructed)"),
                sub("communityStadiumDrive", "Community (stadium drive)"),
            ],
        },
        Category {
            key: "education",
            name: "Education",
            is_header: true,
            is_calculated: false,
            parent: None,
            subcategories: vec![
                sub("governmentSchool", "Government School"),
                sub("nonGovernmentSchool", "Non Government School"),
            ],
        },
        Category {
            key: "openSpaceNetwork",
            name: "Open Space Network",
            is_header: true,
            is_calculated: false,
            parent: None,
            subcategories: vec![],
        },
        Category {
            key: "encumberedOpenSpace",
            name: "Encumbered Open Space",
            is_header: true,
            is_calculated: false,
            parent: Some("openSpaceNetwork"),
            subcategories: vec![
                sub("infrastructureEasements", "Infrastructure Easements"),
                sub("drainage", "Drainage"),
                sub("conservationAreas", "Conservation Areas"),
            ],
        },
        Category {
            key: "creditedOpenSpace",
            name: "Credited Open Space",
            is_header: true,
            is_calculated: false,
            parent: Some("openSpaceNetwork"),
            subcategories: vec![
                sub("regionalPark", "Regional Park"),
                sub("sportsReservesInside", "Sports Reserves inside regional parks"),
                sub("sportsReservesOutside", "Sports Reserves outside regional parks"),
                sub("localNetworkParks", "Local Network Parks"),
                sub("linearParks", "Linear Parks"),
            ],
        },
        Category {
            key: "total",
            name: "Total",
            is_header: true,
            is_calculated: true,
            parent: None,
            subcategories: vec![],
        },
        Category {
            key: "netResidentialArea",
            name: "Net Residential Area (NRA)",
            is_header: true,
            is_calculated: false,
            parent: None,
            subcategories: vec![],
        },
        Category {
            key: "residential",
            name: "Residential",
            is_header: true,
            is_calculated: false,
            parent: Some("netResidentialArea"),
            subcategories: vec![
                sub("standardResidential", "Standard Residential Areas"),
                sub("townCentreResidential", "Town Centre Residential Areas"),
                sub("mixedUseResidential", "Mixed Use Sites with Residential (Section B)"),
            ],
        },
        Category {
            key: "roads",
            name: "Roads",
            is_header: true,
            is_calculated: false,
            parent: Some("netResidentialArea"),
            subcategories: vec![
                sub("connectorRoads", "Connector Roads"),
                Subcategory {
                    key: "localRoads",
                    name: "Local Roads",
                    is_percent_of_nsa: true,
                },
            ],
        },
        Category {
            key: "totalNRA",
            name: "Total Net Residential Area (NRA)",
            is_header: true,
            is_calculated: true,
            parent: None,
            subcategories: vec![],
        },
        Category {
            key: "nonResidentialAreas",
            name: "Non Residential Areas",
            is_header: true,
            is_calculated: false,
            parent: None,
            subcategories: vec![
                sub("majorActivityCentre", "Major Activity Centre"),
                sub("localActivityCentre", "Local Activity Centre"),
            ],
        },
        Category {
            key: "totalNDA",
            name: "Total Net Developable Area (NDA)",
            is_header: true,
            is_calculated: true,
            parent: None,
            subcategories: vec![],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_has_expected_shape() {
        let cats = category_catalogue();
        assert_eq!(cats.len(), 14);

        let open_space_children: Vec<_> = cats
            .iter()
            .filter(|c| c.parent == Some("openSpaceNetwork"))
            .map(|c| c.key)
            .collect();
        assert_eq!(
            open_space_children,
            vec!["encumberedOpenSpace", "creditedOpenSpace"]
        );

        let calculated: Vec<_> = cats.iter().filter(|c| c.is_calculated).map(|c| c.key).collect();
        assert_eq!(calculated, vec!["total", "totalNRA", "totalNDA"]);
    }

    #[test]
    fn local_roads_flagged_as_percent_of_nsa() {
        let cats = category_catalogue();
        let roads = cats.iter().find(|c| c.key == "roads").unwrap();
        let local = roads
            .subcategories
            .iter()
            .find(|s| s.key == "localRoads")
            .unwrap();
        assert!(local.is_percent_of_nsa);
    }
}
