//! Lot statistics tests
//!
//! - Stats idempotence: the same aggregates always give the same snapshot
//! - Mortality rate stays within 0..=100 while deaths do not exceed placement
//! - Broiler and layer snapshots only carry their own metrics

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::models::LotType;
use shared::stats::{derive, LotProfile, StatsInputs, WeightPoint};

fn profile(lot_type: LotType, initial: i32, current: i32) -> LotProfile {
    LotProfile {
        lot_type,
        initial_quantity: initial,
        current_quantity: current,
    }
}

fn weight(day: u32, grams: i64) -> WeightPoint {
    WeightPoint {
        date: NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
        average_weight_g: Decimal::from(grams),
    }
}

#[test]
fn test_broiler_snapshot_has_no_egg_metrics() {
    let inputs = StatsInputs {
        total_eggs: 500,
        total_feed_kg: Decimal::from(3000),
        latest_weight: Some(weight(20, 1500)),
        previous_weight: Some(weight(10, 1000)),
        ..StatsInputs::default()
    };
    let stats = derive(&profile(LotType::Broiler, 1000, 1000), &inputs);
    assert_eq!(stats.total_eggs, 0);
    assert_eq!(stats.feed_per_egg_kg, None);
    assert_eq!(stats.daily_gain_g, Some(Decimal::from(50)));
    assert_eq!(stats.feed_conversion_ratio, Some(Decimal::from(2)));
}

#[test]
fn test_layer_snapshot_has_no_growth_metrics() {
    let inputs = StatsInputs {
        total_eggs: 9000,
        laying_rate_avg: Some(Decimal::from(90)),
        laying_rate_max: Some(Decimal::from(95)),
        total_feed_kg: Decimal::from(1080),
        latest_weight: Some(weight(20, 1800)),
        ..StatsInputs::default()
    };
    let stats = derive(&profile(LotType::Layer, 1000, 990), &inputs);
    assert_eq!(stats.current_weight_g, None);
    assert_eq!(stats.feed_conversion_ratio, None);
    assert_eq!(stats.eggs_per_hen_housed, Decimal::from(9));
    assert_eq!(stats.feed_per_egg_kg, Some(Decimal::new(12, 2)));
}

#[test]
fn test_empty_lot_has_zero_rates() {
    let stats = derive(&profile(LotType::Broiler, 0, 0), &StatsInputs::default());
    assert_eq!(stats.mortality_rate, Decimal::ZERO);
    assert_eq!(stats.water_feed_ratio, None);
}

fn any_inputs() -> impl Strategy<Value = StatsInputs> {
    (
        0i64..10_000,
        0i64..1_000_000,
        0i64..10_000_000,
        0i64..10_000_000,
        0i64..100_000_000,
        0i64..100_000_000,
        prop::option::of(100i64..5_000),
    )
        .prop_map(|(mortality, eggs, feed, water, sales, expenses, grams)| StatsInputs {
            total_mortality: mortality,
            total_eggs: eggs,
            laying_rate_avg: Some(Decimal::new(8512, 2)),
            laying_rate_max: Some(Decimal::new(9650, 2)),
            total_feed_kg: Decimal::new(feed, 3),
            total_water_liters: Decimal::new(water, 3),
            latest_weight: grams.map(|g| weight(15, g)),
            previous_weight: grams.map(|g| weight(8, g / 2)),
            total_sales: Decimal::new(sales, 2),
            total_expenses: Decimal::new(expenses, 2),
        })
}

proptest! {
    #[test]
    fn prop_stats_idempotent(inputs in any_inputs(), layer in any::<bool>(), initial in 1i32..100_000) {
        let lot_type = if layer { LotType::Layer } else { LotType::Broiler };
        let lot = profile(lot_type, initial, initial);
        prop_assert_eq!(derive(&lot, &inputs), derive(&lot, &inputs.clone()));
    }

    #[test]
    fn prop_mortality_rate_bounded(initial in 1i32..100_000, seed in 0i64..100_000) {
        let deaths = seed % (i64::from(initial) + 1);
        let inputs = StatsInputs { total_mortality: deaths, ..StatsInputs::default() };
        let stats = derive(&profile(LotType::Layer, initial, initial - deaths as i32), &inputs);
        prop_assert!(stats.mortality_rate >= Decimal::ZERO);
        prop_assert!(stats.mortality_rate <= Decimal::ONE_HUNDRED);
    }

    #[test]
    fn prop_margin_is_sales_minus_expenses(inputs in any_inputs()) {
        let stats = derive(&profile(LotType::Broiler, 1000, 900), &inputs);
        prop_assert_eq!(stats.gross_margin, inputs.total_sales - inputs.total_expenses);
    }
}
