use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Per-project price matrix row. Each product is a frontage/depth combination
/// with a base price; area beyond base_area is charged at balance_rate per
/// square metre.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductPricing {
    pub id: i32,
    pub project_id: i32,
    pub product_name: String,
    pub frontage: Decimal,
    pub depth: Decimal,
    pub base_area: Decimal,
    pub base_price: Decimal,
    pub price_per_sqm: Decimal,
    pub balance_rate: Decimal,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPricingInput {
    #[serde(default)]
    pub product_name: Option<String>,
    pub frontage: Decimal,
    pub depth: Decimal,
    #[serde(default)]
    pub base_area: Option<Decimal>,
    #[serde(default)]
    pub base_price: Option<Decimal>,
    #[serde(default)]
    pub price_per_sqm: Option<Decimal>,
    #[serde(default)]
    pub balance_rate: Option<Decimal>,
}

impl ProductPricingInput {
    /// Name defaults to "{frontage}x{depth}".
    pub fn resolved_name(&self) -> String {
        match &self.product_name {
            Some(n) if !n.trim().is_empty() => n.clone(),
            _ => format!("{}x{}", self.frontage, self.depth),
        }
    }

    pub fn resolved_base_area(&self) -> Decimal {
        self.base_area.unwrap_or(self.frontage * self.depth)
    }

    pub fn resolved_base_price(&self) -> Decimal {
        self.base_price.unwrap_or(Decimal::ZERO)
    }

    pub fn resolved_price_per_sqm(&self) -> Decimal {
        self.price_per_sqm.unwrap_or(Decimal::ZERO)
    }

    pub fn resolved_balance_rate(&self) -> Decimal {
        self.balance_rate.unwrap_or(dec!(50))
    }
}

/// Replace-all payload for POST /pricing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePricingRequest {
    pub project_id: i32,
    pub products: Vec<ProductPricingInput>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(frontage: Decimal, depth: Decimal) -> ProductPricingInput {
        ProductPricingInput {
            product_name: None,
            frontage,
            depth,
            base_area: None,
            base_price: None,
            price_per_sqm: None,
            balance_rate: None,
        }
    }

    #[test]
    fn name_defaults_to_dimensions() {
        let p = input(dec!(12.5), dec!(28));
        assert_eq!(p.resolved_name(), "12.5x28");
        assert_eq!(p.resolved_base_area(), dec!(350.0));
        assert_eq!(p.resolved_balance_rate(), dec!(50));
        assert_eq!(p.resolved_base_price(), Decimal::ZERO);
    }

    #[test]
    fn explicit_values_win() {
        let mut p = input(dec!(10), dec!(30));
        p.product_name = Some("Corner special".into());
        p.base_area = Some(dec!(290));
        p.base_price = Some(dec!(310000));
        p.balance_rate = Some(dec!(65));
        assert_eq!(p.resolved_name(), "Corner special");
        assert_eq!(p.resolved_base_area(), dec!(290));
        assert_eq!(p.resolved_balance_rate(), dec!(65));
    }

    #[test]
    fn blank_name_falls_back() {
        let mut p = input(dec!(14), dec!(32));
        p.product_name = Some("   ".into());
        assert_eq!(p.resolved_name(), "14x32");
    }
}
