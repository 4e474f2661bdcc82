//! Lot statistics derivation
//!
//! A snapshot is always derived wholesale from aggregates of the raw record
//! streams; it is never patched field by field.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::LotType;
use crate::types::round_rate;

/// Decimal places kept for feed per egg
const FEED_PER_EGG_SCALE: u32 = 4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LotProfile {
    pub lot_type: LotType,
    pub initial_quantity: i32,
    pub current_quantity: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightPoint {
    pub date: NaiveDate,
    pub average_weight_g: Decimal,
}

/// Aggregates over every record store of one lot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsInputs {
    pub total_mortality: i64,
    pub total_eggs: i64,
    /// Mean of the recorded daily laying rates
    pub laying_rate_avg: Option<Decimal>,
    pub laying_rate_max: Option<Decimal>,
    pub total_feed_kg: Decimal,
    pub total_water_liters: Decimal,
    /// Most recent weight record, by date then creation time
    pub latest_weight: Option<WeightPoint>,
    /// Most recent weight record dated before `latest_weight`
    pub previous_weight: Option<WeightPoint>,
    pub total_sales: Decimal,
    pub total_expenses: Decimal,
}

/// Derived per-lot statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotStats {
    pub total_mortality: i64,
    pub mortality_rate: Decimal,
    pub total_eggs: i64,
    pub average_laying_rate: Decimal,
    pub peak_laying_rate: Decimal,
    pub eggs_per_hen_housed: Decimal,
    pub current_weight_g: Option<Decimal>,
    pub daily_gain_g: Option<Decimal>,
    pub total_feed_kg: Decimal,
    pub feed_conversion_ratio: Option<Decimal>,
    pub feed_per_egg_kg: Option<Decimal>,
    pub total_water_liters: Decimal,
    pub water_feed_ratio: Option<Decimal>,
    pub total_sales: Decimal,
    pub total_expenses: Decimal,
    pub gross_margin: Decimal,
}

/// Derive the snapshot for a lot from its aggregates
pub fn derive(profile: &LotProfile, inputs: &StatsInputs) -> LotStats {
    let initial = Decimal::from(profile.initial_quantity);
    let mut stats = LotStats {
        total_mortality: inputs.total_mortality,
        mortality_rate: per_hundred(Decimal::from(inputs.total_mortality), initial),
        total_feed_kg: inputs.total_feed_kg,
        total_water_liters: inputs.total_water_liters,
        water_feed_ratio: quotient(inputs.total_water_liters, inputs.total_feed_kg).map(round_rate),
        total_sales: inputs.total_sales,
        total_expenses: inputs.total_expenses,
        gross_margin: inputs.total_sales - inputs.total_expenses,
        ..LotStats::default()
    };

    match profile.lot_type {
        LotType::Layer => {
            let eggs = Decimal::from(inputs.total_eggs);
            stats.total_eggs = inputs.total_eggs;
            stats.average_laying_rate = inputs.laying_rate_avg.map(round_rate).unwrap_or_default();
            stats.peak_laying_rate = inputs.laying_rate_max.unwrap_or_default();
            stats.eggs_per_hen_housed = quotient(eggs, initial).map(round_rate).unwrap_or_default();
            stats.feed_per_egg_kg = quotient(inputs.total_feed_kg, eggs)
                .map(|v| v.round_dp(FEED_PER_EGG_SCALE));
        }
        LotType::Broiler => {
            let weight = inputs.latest_weight.map(|w| w.average_weight_g);
            stats.current_weight_g = weight;
            stats.daily_gain_g = daily_gain(inputs.latest_weight, inputs.previous_weight);
            stats.feed_conversion_ratio = weight.and_then(|w| {
                let live_kg = w / Decimal::ONE_THOUSAND * Decimal::from(profile.current_quantity);
                quotient(inputs.total_feed_kg, live_kg).map(round_rate)
            });
        }
    }

    stats
}

fn daily_gain(latest: Option<WeightPoint>, previous: Option<WeightPoint>) -> Option<Decimal> {
    let (latest, previous) = (latest?, previous?);
    let days = (latest.date - previous.date).num_days();
    if days <= 0 {
        return None;
    }
    Some(round_rate(
        (latest.average_weight_g - previous.average_weight_g) / Decimal::from(days),
    ))
}

/// `numerator / denominator`, defined only for a positive denominator
fn quotient(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    (denominator > Decimal::ZERO).then(|| numerator / denominator)
}

fn per_hundred(part: Decimal, whole: Decimal) -> Decimal {
    quotient(part * Decimal::ONE_HUNDRED, whole)
        .map(round_rate)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    fn broiler(initial: i32, current: i32) -> LotProfile {
        LotProfile {
            lot_type: LotType::Broiler,
            initial_quantity: initial,
            current_quantity: current,
        }
    }

    #[test]
    fn test_broiler_stats() {
        let inputs = StatsInputs {
            total_mortality: 50,
            total_feed_kg: dec("3325"),
            total_water_liters: dec("6650"),
            latest_weight: Some(WeightPoint { date: day(20), average_weight_g: dec("1750") }),
            previous_weight: Some(WeightPoint { date: day(13), average_weight_g: dec("1050") }),
            total_sales: dec("900000"),
            total_expenses: dec("700000"),
            ..StatsInputs::default()
        };
        let stats = derive(&broiler(1000, 950), &inputs);

        assert_eq!(stats.mortality_rate, dec("5.00"));
        assert_eq!(stats.current_weight_g, Some(dec("1750")));
        assert_eq!(stats.daily_gain_g, Some(dec("100")));
        // 3325 / (1.75 * 950)
        assert_eq!(stats.feed_conversion_ratio, Some(dec("2.00")));
        assert_eq!(stats.water_feed_ratio, Some(dec("2.00")));
        assert_eq!(stats.gross_margin, dec("200000"));
        assert_eq!(stats.total_eggs, 0);
        assert_eq!(stats.feed_per_egg_kg, None);
    }

    #[test]
    fn test_fcr_undefined_without_weight_or_birds() {
        let inputs = StatsInputs {
            total_feed_kg: dec("100"),
            ..StatsInputs::default()
        };
        assert_eq!(derive(&broiler(100, 100), &inputs).feed_conversion_ratio, None);

        let weighed = StatsInputs {
            latest_weight: Some(WeightPoint { date: day(1), average_weight_g: dec("500") }),
            ..inputs
        };
        assert_eq!(derive(&broiler(100, 0), &weighed).feed_conversion_ratio, None);
    }

    #[test]
    fn test_layer_stats() {
        let profile = LotProfile {
            lot_type: LotType::Layer,
            initial_quantity: 2000,
            current_quantity: 1980,
        };
        let inputs = StatsInputs {
            total_mortality: 20,
            total_eggs: 50_000,
            laying_rate_avg: Some(dec("84.456")),
            laying_rate_max: Some(dec("93.10")),
            total_feed_kg: dec("6000"),
            latest_weight: Some(WeightPoint { date: day(2), average_weight_g: dec("1800") }),
            ..StatsInputs::default()
        };
        let stats = derive(&profile, &inputs);

        assert_eq!(stats.mortality_rate, dec("1.00"));
        assert_eq!(stats.average_laying_rate, dec("84.46"));
        assert_eq!(stats.peak_laying_rate, dec("93.10"));
        assert_eq!(stats.eggs_per_hen_housed, dec("25.00"));
        assert_eq!(stats.feed_per_egg_kg, Some(dec("0.12")));
        assert_eq!(stats.current_weight_g, None);
        assert_eq!(stats.feed_conversion_ratio, None);
    }

    #[test]
    fn test_zero_initial_quantity() {
        let inputs = StatsInputs {
            total_mortality: 3,
            ..StatsInputs::default()
        };
        assert_eq!(derive(&broiler(0, 0), &inputs).mortality_rate, Decimal::ZERO);
    }

    #[test]
    fn test_same_day_weights_have_no_gain() {
        let point = WeightPoint { date: day(5), average_weight_g: dec("900") };
        assert_eq!(daily_gain(Some(point), Some(point)), None);
        assert_eq!(daily_gain(Some(point), None), None);
    }

    #[test]
    fn test_derive_is_deterministic() {
        let inputs = StatsInputs {
            total_mortality: 7,
            total_feed_kg: dec("120.5"),
            total_sales: dec("10"),
            ..StatsInputs::default()
        };
        let profile = broiler(500, 493);
        assert_eq!(derive(&profile, &inputs), derive(&profile, &inputs));
    }
}
