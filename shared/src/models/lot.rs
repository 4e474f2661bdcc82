//! Lot models and lifecycle

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A group of birds placed together, the unit of cost and production accounting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    pub id: Uuid,
    pub building_id: Uuid,
    /// Unique lot code (e.g., "LC-2025-0001")
    pub code: String,
    pub name: Option<String>,
    pub lot_type: LotType,
    pub status: LotStatus,
    pub breed: Option<String>,
    pub supplier: Option<String>,
    /// Birds placed at creation. Never changes.
    pub initial_quantity: i32,
    pub current_quantity: i32,
    /// Placed birds whose costs this lot currently carries
    pub cost_basis_quantity: i32,
    pub placement_date: NaiveDate,
    /// Age of the birds in days when placed
    pub age_at_placement: i32,
    pub expected_end_date: Option<NaiveDate>,
    pub actual_end_date: Option<NaiveDate>,
    pub chick_price_per_unit: Option<Decimal>,
    pub transport_cost: Option<Decimal>,
    pub other_initial_costs: Option<Decimal>,
    pub target_weight_g: Option<Decimal>,
    pub target_fcr: Option<Decimal>,
    pub target_laying_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub parent_lot_id: Option<Uuid>,
    pub split_date: Option<NaiveDate>,
    pub split_ratio: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lot {
    /// Age of the birds in days on `today`
    pub fn age_days(&self, today: NaiveDate) -> i64 {
        age_days(self.placement_date, self.age_at_placement, today)
    }

    pub fn age_weeks(&self, today: NaiveDate) -> i64 {
        self.age_days(today) / 7
    }
}

pub fn age_days(placement_date: NaiveDate, age_at_placement: i32, today: NaiveDate) -> i64 {
    (today - placement_date).num_days() + i64::from(age_at_placement)
}

/// Production type of a lot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LotType {
    /// Meat birds
    Broiler,
    /// Egg-laying hens
    Layer,
}

impl LotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotType::Broiler => "broiler",
            LotType::Layer => "layer",
        }
    }

    /// Parse a stored or submitted value, ignoring case
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "broiler" => Some(LotType::Broiler),
            "layer" => Some(LotType::Layer),
            _ => None,
        }
    }

    /// Prefix used in generated lot codes
    pub fn code_prefix(&self) -> &'static str {
        match self {
            LotType::Broiler => "LC",
            LotType::Layer => "LP",
        }
    }
}

impl std::fmt::Display for LotType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LotType::Broiler => write!(f, "Broiler"),
            LotType::Layer => write!(f, "Layer"),
        }
    }
}

/// Lifecycle status of a lot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LotStatus {
    Preparation,
    Active,
    Completed,
    Suspended,
    /// Soft-deleted; hidden from listings and reports
    Deleted,
}

impl LotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotStatus::Preparation => "preparation",
            LotStatus::Active => "active",
            LotStatus::Completed => "completed",
            LotStatus::Suspended => "suspended",
            LotStatus::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "preparation" => Some(LotStatus::Preparation),
            "active" => Some(LotStatus::Active),
            "completed" => Some(LotStatus::Completed),
            "suspended" => Some(LotStatus::Suspended),
            "deleted" => Some(LotStatus::Deleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for LotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generate a lot code from the type prefix, year and per-year sequence
pub fn generate_lot_code(lot_type: LotType, year: i32, sequence: i32) -> String {
    format!("{}-{}-{:04}", lot_type.code_prefix(), year, sequence)
}

/// Parent and children of a lot, ordered by split date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitHistory {
    pub lot_id: Uuid,
    pub parent: Option<SplitRelative>,
    pub children: Vec<SplitRelative>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitRelative {
    pub id: Uuid,
    pub code: String,
    pub name: Option<String>,
    pub building_id: Uuid,
    pub initial_quantity: i32,
    pub current_quantity: i32,
    pub split_date: Option<NaiveDate>,
    pub split_ratio: Option<Decimal>,
    pub status: LotStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lot_code_format() {
        assert_eq!(generate_lot_code(LotType::Broiler, 2025, 7), "LC-2025-0007");
        assert_eq!(generate_lot_code(LotType::Layer, 2024, 1234), "LP-2024-1234");
    }

    #[test]
    fn test_parse_ignores_case() {
        assert_eq!(LotType::parse("Layer"), Some(LotType::Layer));
        assert_eq!(LotType::parse(" BROILER "), Some(LotType::Broiler));
        assert_eq!(LotType::parse("duck"), None);
        assert_eq!(LotStatus::parse("Active"), Some(LotStatus::Active));
    }

    #[test]
    fn test_age_includes_age_at_placement() {
        let placed = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        assert_eq!(age_days(placed, 1, today), 15);
        assert_eq!(age_days(placed, 120, today), 134);
    }
}
