//! Daily production records: mortality, feed, water, weight and eggs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::round_rate;

/// Recorded cause of death
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MortalityCause {
    Disease,
    HeatStress,
    ColdStress,
    Crushing,
    Culling,
    Predator,
    Accident,
    LayingAccident,
    Dehydration,
    Unknown,
    Other,
}

impl MortalityCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            MortalityCause::Disease => "disease",
            MortalityCause::HeatStress => "heat_stress",
            MortalityCause::ColdStress => "cold_stress",
            MortalityCause::Crushing => "crushing",
            MortalityCause::Culling => "culling",
            MortalityCause::Predator => "predator",
            MortalityCause::Accident => "accident",
            MortalityCause::LayingAccident => "laying_accident",
            MortalityCause::Dehydration => "dehydration",
            MortalityCause::Unknown => "unknown",
            MortalityCause::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "disease" => Some(MortalityCause::Disease),
            "heat_stress" => Some(MortalityCause::HeatStress),
            "cold_stress" => Some(MortalityCause::ColdStress),
            "crushing" => Some(MortalityCause::Crushing),
            "culling" => Some(MortalityCause::Culling),
            "predator" => Some(MortalityCause::Predator),
            "accident" => Some(MortalityCause::Accident),
            "laying_accident" => Some(MortalityCause::LayingAccident),
            "dehydration" => Some(MortalityCause::Dehydration),
            "unknown" => Some(MortalityCause::Unknown),
            "other" => Some(MortalityCause::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MortalityRecord {
    pub id: Uuid,
    pub lot_id: Uuid,
    pub date: NaiveDate,
    pub quantity: i32,
    pub cause: MortalityCause,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConsumption {
    pub id: Uuid,
    pub lot_id: Uuid,
    pub date: NaiveDate,
    pub quantity_kg: Decimal,
    pub feed_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterConsumption {
    pub id: Uuid,
    pub lot_id: Uuid,
    pub date: NaiveDate,
    pub quantity_liters: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Sampled average live weight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightRecord {
    pub id: Uuid,
    pub lot_id: Uuid,
    pub date: NaiveDate,
    pub average_weight_g: Decimal,
    pub sample_size: Option<i32>,
    pub age_days: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Egg counts collected on one day, by grade
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EggCounts {
    pub normal: i32,
    pub cracked: i32,
    pub dirty: i32,
    pub small: i32,
    pub double_yolk: i32,
    pub soft_shell: i32,
}

impl EggCounts {
    pub fn total(&self) -> i32 {
        self.normal + self.cracked + self.dirty + self.small + self.double_yolk + self.soft_shell
    }

    /// Eggs that can go to market; dirty eggs can be cleaned
    pub fn sellable(&self) -> i32 {
        self.normal + self.dirty + self.double_yolk
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EggProduction {
    pub id: Uuid,
    pub lot_id: Uuid,
    pub date: NaiveDate,
    pub counts: EggCounts,
    pub total_eggs: i32,
    pub sellable_eggs: i32,
    /// Hens present when the eggs were collected
    pub hen_count: Option<i32>,
    pub laying_rate: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// Eggs per hen as a percentage, undefined for an empty flock
pub fn laying_rate(total_eggs: i32, hen_count: i32) -> Option<Decimal> {
    if hen_count <= 0 {
        return None;
    }
    Some(round_rate(
        Decimal::from(total_eggs) / Decimal::from(hen_count) * Decimal::ONE_HUNDRED,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_egg_totals() {
        let counts = EggCounts {
            normal: 800,
            cracked: 10,
            dirty: 20,
            small: 5,
            double_yolk: 3,
            soft_shell: 2,
        };
        assert_eq!(counts.total(), 840);
        assert_eq!(counts.sellable(), 823);
    }

    #[test]
    fn test_laying_rate() {
        assert_eq!(laying_rate(850, 1000), Some(Decimal::from_str("85.00").unwrap()));
        assert_eq!(laying_rate(2, 3), Some(Decimal::from_str("66.67").unwrap()));
        assert_eq!(laying_rate(10, 0), None);
    }

    #[test]
    fn test_mortality_cause_parse() {
        assert_eq!(MortalityCause::parse("Heat_Stress"), Some(MortalityCause::HeatStress));
        assert_eq!(MortalityCause::parse("aliens"), None);
    }
}
