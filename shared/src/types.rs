//! Common types used across the platform

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Decimal places of the currency's minimum unit
pub const MONEY_SCALE: u32 = 2;

/// Decimal places kept for rates and percentages
pub const RATE_SCALE: u32 = 2;

/// Decimal places stored for a lot's split ratio
pub const SPLIT_RATIO_SCALE: u32 = 4;

/// Round a monetary amount to the currency's minimum unit
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a rate or percentage for storage and display
pub fn round_rate(rate: Decimal) -> Decimal {
    rate.round_dp_with_strategy(RATE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Inclusive date range for queries. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn bounded(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    /// A range whose start lies after its end matches nothing
    pub fn is_inverted(&self) -> bool {
        matches!((self.start, self.end), (Some(s), Some(e)) if s > e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(Decimal::from_str("10.005").unwrap()), Decimal::from_str("10.01").unwrap());
        assert_eq!(round_money(Decimal::from_str("10.004").unwrap()), Decimal::from_str("10.00").unwrap());
    }

    #[test]
    fn test_date_range_contains() {
        let d = |m, day| NaiveDate::from_ymd_opt(2025, m, day).unwrap();
        let range = DateRange::bounded(d(1, 1), d(1, 31));
        assert!(range.contains(d(1, 1)));
        assert!(range.contains(d(1, 31)));
        assert!(!range.contains(d(2, 1)));
        assert!(DateRange::default().contains(d(6, 15)));
        assert!(DateRange::bounded(d(2, 1), d(1, 1)).is_inverted());
    }
}
